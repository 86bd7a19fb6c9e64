/*!
 * Wait Multiplexer Properties
 * Range and idempotence properties checked with proptest
 */

use crate::fakes::{thread, FakeManager, FakeRegistry};
use pal_sync::objects::ObjectType;
use pal_sync::synch::{WaitMultiplexer, WaitOutcome, WaitPolicy, WaitRequest, WakeupReason};
use pal_sync::{PalError, Timeout, MAXIMUM_WAIT_OBJECTS};
use proptest::prelude::*;

fn timeout_strategy() -> impl Strategy<Value = Timeout> {
    prop_oneof![
        Just(Timeout::POLL),
        (1u32..1_000).prop_map(Timeout::Millis),
        Just(Timeout::Infinite),
    ]
}

proptest! {
    #[test]
    fn prop_count_outside_range_is_invalid(
        count in prop_oneof![Just(0usize), (MAXIMUM_WAIT_OBJECTS + 1)..256],
        wait_all in any::<bool>(),
        timeout in timeout_strategy(),
    ) {
        let mut registry = FakeRegistry::new();
        let handle = registry.add(ObjectType::Event, true);
        let manager = FakeManager::new();
        let mux = WaitMultiplexer::with_policy(&registry, &manager, WaitPolicy::full());
        let baseline = registry.strong_counts();

        let handles = vec![handle; count];
        let result = mux.wait(
            &thread(),
            &WaitRequest::new(&handles).wait_all(wait_all).timeout(timeout),
        );

        prop_assert!(matches!(result, Err(PalError::InvalidParameter(_))));
        prop_assert_eq!(manager.created(), 0);
        prop_assert_eq!(registry.strong_counts(), baseline);
        prop_assert!(registry.object(handle).signaled());
    }

    #[test]
    fn prop_wait_all_flag_irrelevant_for_one_handle(
        signaled in any::<bool>(),
        timeout in timeout_strategy(),
    ) {
        let run = |wait_all: bool| {
            let mut registry = FakeRegistry::new();
            let handle = registry.add(ObjectType::Thread, signaled);
            let manager = FakeManager::new();
            manager.script(Ok((WakeupReason::WaitSucceeded, 0)));
            let mux = WaitMultiplexer::new(&registry, &manager);
            let result = mux.wait(
                &thread(),
                &WaitRequest::single(&handle).wait_all(wait_all).timeout(timeout),
            );
            let object = registry.object(handle);
            (result, object.consumed(), object.registrations(), manager.blocks())
        };

        prop_assert_eq!(run(false), run(true));
    }

    #[test]
    fn prop_poll_never_mutates_unsignaled_objects(
        count in 1usize..=MAXIMUM_WAIT_OBJECTS,
        wait_all in any::<bool>(),
        repeats in 1usize..5,
    ) {
        let mut registry = FakeRegistry::new();
        let handles: Vec<_> = (0..count)
            .map(|_| registry.add(ObjectType::Event, false))
            .collect();
        let manager = FakeManager::new();
        let mux = WaitMultiplexer::with_policy(&registry, &manager, WaitPolicy::full());
        let me = thread();

        for _ in 0..repeats {
            let outcome = mux.wait(
                &me,
                &WaitRequest::new(&handles).wait_all(wait_all).timeout(Timeout::POLL),
            );
            prop_assert_eq!(outcome, Ok(WaitOutcome::TimedOut));
        }

        for handle in &handles {
            let object = registry.object(*handle);
            prop_assert!(!object.signaled());
            prop_assert_eq!(object.consumed(), 0);
            prop_assert!(object.registrations().is_empty());
        }
        prop_assert_eq!(manager.blocks(), 0);
        prop_assert_eq!(manager.live(), 0);
    }

    #[test]
    fn prop_wait_any_picks_lowest_signaled(
        pattern in proptest::collection::vec(any::<bool>(), 1..=MAXIMUM_WAIT_OBJECTS),
    ) {
        prop_assume!(pattern.iter().any(|&s| s));
        let mut registry = FakeRegistry::new();
        let handles: Vec<_> = pattern
            .iter()
            .map(|&signaled| registry.add(ObjectType::Event, signaled))
            .collect();
        let manager = FakeManager::new();
        let mux = WaitMultiplexer::with_policy(&registry, &manager, WaitPolicy::full());

        let expected = pattern.iter().position(|&s| s);
        let outcome = mux.wait(&thread(), &WaitRequest::new(&handles).timeout(Timeout::POLL));
        prop_assert_eq!(outcome, Ok(WaitOutcome::Satisfied { index: expected }));

        let consumed: usize = handles.iter().map(|h| registry.object(*h).consumed()).sum();
        prop_assert_eq!(consumed, 1);
    }
}
