/*!
 * PAL Integration Tests
 * Real threads, real objects, the numeric Win32-style surface
 */

use pal_sync::core::limits::{
    ERROR_INTERNAL_ERROR, ERROR_INVALID_HANDLE, ERROR_INVALID_PARAMETER, ERROR_NOT_OWNER,
    ERROR_NOT_SUPPORTED, STILL_ACTIVE,
};
use pal_sync::{
    Handle, Pal, PalConfig, PalError, SyncConfig, Timeout, WaitOutcome, WaitRequest, INFINITE,
    WAIT_ABANDONED_0, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn full_pal() -> Pal {
    Pal::with_config(PalConfig::full())
}

#[test]
fn test_wait_on_thread_returns_when_it_finishes() {
    let pal = Pal::new();
    let start = Instant::now();
    let handle = pal
        .create_thread(|| {
            thread::sleep(Duration::from_millis(50));
            3
        })
        .unwrap();

    assert_eq!(pal.wait_for_single_object(handle, 0), WAIT_TIMEOUT);
    assert_eq!(pal.get_exit_code_thread(handle), Ok(STILL_ACTIVE));
    assert_eq!(pal.wait_for_single_object(handle, 5_000), WAIT_OBJECT_0);
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(pal.get_exit_code_thread(handle), Ok(3));

    // Terminated threads stay signaled
    assert_eq!(pal.wait_for_single_object(handle, 0), WAIT_OBJECT_0);
}

#[test]
fn test_signal_before_expiry_unblocks_promptly() {
    let pal = Pal::with_config(PalConfig::default().with_sync(SyncConfig::no_spin()));
    let handle = pal
        .create_thread(|| {
            thread::sleep(Duration::from_millis(30));
            0
        })
        .unwrap();

    let start = Instant::now();
    let outcome = pal
        .wait(&WaitRequest::single(&handle).timeout(Timeout::from_millis(10_000)))
        .unwrap();
    assert_eq!(outcome, WaitOutcome::Satisfied { index: Some(0) });
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_abandoned_mutex_grants_ownership() {
    let pal = full_pal();
    let (tx, rx) = mpsc::channel();
    let owner_pal = pal.clone();
    let owner = pal
        .create_thread(move || {
            let mutex = owner_pal.create_mutex(true).unwrap();
            tx.send(mutex).unwrap();
            0
        })
        .unwrap();

    let mutex = rx.recv().unwrap();
    assert_eq!(pal.wait_for_single_object(owner, INFINITE), WAIT_OBJECT_0);

    assert_eq!(pal.wait_for_single_object(mutex, 1_000), WAIT_ABANDONED_0);
    assert_eq!(pal.current_thread().owned_mutex_count(), 1);

    // Recursive acquire by the new owner is a plain success
    assert_eq!(pal.wait_for_single_object(mutex, 0), WAIT_OBJECT_0);
    pal.release_mutex(mutex).unwrap();
    pal.release_mutex(mutex).unwrap();
    assert!(pal.object(mutex).unwrap().is_signaled());
    assert_eq!(pal.current_thread().owned_mutex_count(), 0);
}

#[test]
fn test_abandonment_wakes_blocked_waiter() {
    let pal = full_pal();
    let (tx, rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let owner_pal = pal.clone();
    pal.create_thread(move || {
        let mutex = owner_pal.create_mutex(true).unwrap();
        tx.send(mutex).unwrap();
        let _ = release_rx.recv();
        0
    })
    .unwrap();

    let mutex = rx.recv().unwrap();
    assert_eq!(pal.wait_for_single_object(mutex, 0), WAIT_TIMEOUT);

    let waiter_pal = pal.clone();
    let waiter = thread::spawn(move || waiter_pal.wait_for_single_object(mutex, 5_000));
    thread::sleep(Duration::from_millis(30));
    release_tx.send(()).unwrap();

    assert_eq!(waiter.join().unwrap(), WAIT_ABANDONED_0);
}

#[test]
fn test_foreign_thread_exit_abandons_mutex() {
    let pal = full_pal();
    let owner_pal = pal.clone();
    let mutex = thread::spawn(move || owner_pal.create_mutex(true).unwrap())
        .join()
        .unwrap();

    assert_eq!(pal.wait_for_single_object(mutex, 1_000), WAIT_ABANDONED_0);
    assert_eq!(pal.current_thread().owned_mutex_count(), 1);
    pal.release_mutex(mutex).unwrap();
    assert_eq!(pal.wait_for_single_object(mutex, 0), WAIT_OBJECT_0);
    pal.release_mutex(mutex).unwrap();
}

#[test]
fn test_foreign_thread_exit_wakes_blocked_waiter() {
    let pal = full_pal();
    let (tx, rx) = mpsc::channel();
    let (exit_tx, exit_rx) = mpsc::channel::<()>();
    let owner_pal = pal.clone();
    let owner = thread::spawn(move || {
        tx.send(owner_pal.create_mutex(true).unwrap()).unwrap();
        let _ = exit_rx.recv();
    });

    let mutex = rx.recv().unwrap();
    let waiter_pal = pal.clone();
    let waiter = thread::spawn(move || waiter_pal.wait_for_single_object(mutex, 5_000));
    thread::sleep(Duration::from_millis(30));
    exit_tx.send(()).unwrap();
    owner.join().unwrap();

    assert_eq!(waiter.join().unwrap(), WAIT_ABANDONED_0);
}

#[test]
fn test_auto_reset_event_wakes_exactly_one() {
    let pal = full_pal();
    let event = pal.create_event(false, false).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pal = pal.clone();
            thread::spawn(move || pal.wait_for_single_object(event, 500))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    pal.set_event(event).unwrap();

    let codes: Vec<u32> = waiters.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(codes.iter().filter(|&&c| c == WAIT_OBJECT_0).count(), 1);
    assert_eq!(codes.iter().filter(|&&c| c == WAIT_TIMEOUT).count(), 2);
    assert!(!pal.object(event).unwrap().is_signaled());
}

#[test]
fn test_manual_reset_event_wakes_all() {
    let pal = full_pal();
    let event = pal.create_event(true, false).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pal = pal.clone();
            thread::spawn(move || pal.wait_for_single_object(event, 5_000))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    pal.set_event(event).unwrap();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), WAIT_OBJECT_0);
    }
    assert!(pal.object(event).unwrap().is_signaled());
    pal.reset_event(event).unwrap();
    assert_eq!(pal.wait_for_single_object(event, 0), WAIT_TIMEOUT);
}

#[test]
fn test_wait_all_consumes_only_when_complete() {
    let pal = full_pal();
    let first = pal.create_event(false, false).unwrap();
    let second = pal.create_event(false, false).unwrap();

    let waiter_pal = pal.clone();
    let waiter =
        thread::spawn(move || waiter_pal.wait_for_multiple_objects(&[first, second], true, 5_000));

    thread::sleep(Duration::from_millis(30));
    pal.set_event(first).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert!(pal.object(first).unwrap().is_signaled());

    pal.set_event(second).unwrap();
    assert_eq!(waiter.join().unwrap(), WAIT_OBJECT_0);
    assert!(!pal.object(first).unwrap().is_signaled());
    assert!(!pal.object(second).unwrap().is_signaled());
}

#[test]
fn test_wait_any_reports_signaling_index() {
    let pal = full_pal();
    let handles = [
        pal.create_event(false, false).unwrap(),
        pal.create_event(false, false).unwrap(),
        pal.create_event(false, false).unwrap(),
    ];

    let waiter_pal = pal.clone();
    let waiter =
        thread::spawn(move || waiter_pal.wait_for_multiple_objects(&handles, false, 5_000));
    thread::sleep(Duration::from_millis(30));
    pal.set_event(handles[2]).unwrap();

    assert_eq!(waiter.join().unwrap(), WAIT_OBJECT_0 + 2);
    for handle in handles {
        assert!(!pal.object(handle).unwrap().is_signaled());
        assert_eq!(pal.object(handle).unwrap().waiter_count(), 0);
    }
}

#[test]
fn test_timed_out_waiter_consumes_nothing() {
    let pal = full_pal();
    let event = pal.create_event(false, false).unwrap();

    assert_eq!(pal.wait_for_single_object(event, 30), WAIT_TIMEOUT);
    pal.set_event(event).unwrap();
    assert!(pal.object(event).unwrap().is_signaled());
    assert_eq!(pal.object(event).unwrap().waiter_count(), 0);
    assert!(!pal.current_thread().is_waiting());
}

#[test]
fn test_reference_counts_restored() {
    let pal = full_pal();
    let signaled = pal.create_event(true, true).unwrap();
    let idle = pal.create_event(true, false).unwrap();
    let signaled_object = pal.object(signaled).unwrap();
    let idle_object = pal.object(idle).unwrap();
    let baseline = (Arc::strong_count(&signaled_object), Arc::strong_count(&idle_object));

    let _ = pal.wait_for_single_object(signaled, 0);
    let _ = pal.wait_for_single_object(idle, 0);
    let _ = pal.wait_for_single_object(idle, 10);
    let _ = pal.wait_for_multiple_objects(&[signaled, idle], true, 10);
    let _ = pal.wait_for_multiple_objects(&[signaled, signaled], true, 0);
    let _ = pal.wait_for_multiple_objects(&[idle, Handle(0xDEAD0)], false, 0);
    let _ = pal.wait_for_multiple_objects_ex(&[idle], false, 0, true);

    assert_eq!(
        (Arc::strong_count(&signaled_object), Arc::strong_count(&idle_object)),
        baseline
    );
    assert_eq!(idle_object.waiter_count(), 0);
    assert_eq!(pal.current_thread().registered_count(), 0);
}

#[test]
fn test_failures_set_last_error() {
    let pal = Pal::new();
    let thread_handle = pal.create_thread(|| 0).unwrap();
    let event = pal.create_event(true, true).unwrap();

    assert_eq!(pal.wait_for_multiple_objects(&[], false, 0), WAIT_FAILED);
    assert_eq!(pal.get_last_error(), ERROR_INVALID_PARAMETER);

    assert_eq!(pal.wait_for_single_object(event, 0), WAIT_FAILED);
    assert_eq!(pal.get_last_error(), ERROR_INVALID_HANDLE);

    assert_eq!(
        pal.wait_for_multiple_objects(&[thread_handle, thread_handle], false, 0),
        WAIT_FAILED
    );
    assert_eq!(pal.get_last_error(), ERROR_NOT_SUPPORTED);

    assert_eq!(
        pal.wait_for_multiple_objects_ex(&[thread_handle], false, 0, true),
        WAIT_FAILED
    );
    assert_eq!(pal.get_last_error(), ERROR_INTERNAL_ERROR);

    let full = full_pal();
    let a = full.create_event(false, true).unwrap();
    assert_eq!(full.wait_for_multiple_objects(&[a, a], true, 0), WAIT_FAILED);
    assert_eq!(full.get_last_error(), ERROR_INVALID_PARAMETER);
}

#[test]
fn test_closed_handle_recycled_and_unresolvable() {
    let pal = Pal::new();
    let first = pal.create_thread(|| 0).unwrap();
    assert_eq!(pal.wait_for_single_object(first, 5_000), WAIT_OBJECT_0);
    pal.close_handle(first).unwrap();

    assert_eq!(pal.wait_for_single_object(first, 0), WAIT_FAILED);
    assert_eq!(pal.get_last_error(), ERROR_INVALID_HANDLE);
    assert_eq!(pal.close_handle(first), Err(PalError::InvalidHandle(first)));

    let second = pal.create_event(false, false).unwrap();
    assert_eq!(second, first);
}

#[test]
fn test_release_by_non_owner_fails() {
    let pal = full_pal();
    let mutex = pal.create_mutex(true).unwrap();

    let other = pal.clone();
    let (result, last_error) = thread::spawn(move || {
        let result = other.release_mutex(mutex);
        (result, other.get_last_error())
    })
    .join()
    .unwrap();

    assert_eq!(result, Err(PalError::NotOwner));
    assert_eq!(last_error, ERROR_NOT_OWNER);
    pal.release_mutex(mutex).unwrap();
}

#[cfg(unix)]
#[test]
fn test_process_handle_signaled_on_exit() {
    let pal = Pal::new();
    let handle = pal
        .spawn_process(std::process::Command::new("sh").args(["-c", "exit 3"]))
        .unwrap();

    assert_eq!(pal.wait_for_single_object(handle, 10_000), WAIT_OBJECT_0);
    assert_eq!(pal.get_exit_code_process(handle), Ok(3));
}
