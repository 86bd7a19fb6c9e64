/*!
 * Wait Multiplexer
 *
 * Blocks the calling thread until one (wait-any) or all (wait-all) of up to
 * 64 objects are signaled, or the timeout passes.
 *
 * # Flow
 *
 * Validating -> Resolving -> PreChecking -> one of
 * - FastSatisfied: consume through the controller(s) and return
 * - FastTimeout: zero timeout, nothing registered
 * - Registering -> Blocked -> Woken: register on every object, release the
 *   controllers, block in the manager, map the wakeup reason
 *
 * Cleanup is structural: the pinned objects and the controllers live in
 * `WaitArray`s dropped on every exit path. Controllers are declared after the
 * objects so they are released first, and they are released explicitly
 * before the thread blocks.
 */

use super::policy::WaitPolicy;
use super::traits::{SynchManager, WaitController, WaitType, WakeupReason};
use crate::core::data_structures::WaitArray;
use crate::core::errors::{PalError, PalResult};
use crate::core::guard::Guard;
use crate::core::limits::{MAXIMUM_WAIT_OBJECTS, WAIT_ABANDONED_0, WAIT_OBJECT_0, WAIT_TIMEOUT};
use crate::core::types::{Handle, Timeout};
use crate::monitoring::{span_wait, WaitSpan};
use crate::objects::{ObjectRegistry, PalThread};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Parameters of one wait call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRequest<'h> {
    pub handles: &'h [Handle],
    pub wait_all: bool,
    pub timeout: Timeout,
    pub alertable: bool,
    /// Queue ahead of existing waiters on each object
    pub prioritize: bool,
}

impl<'h> WaitRequest<'h> {
    /// Wait-any with no timeout
    pub fn new(handles: &'h [Handle]) -> Self {
        Self {
            handles,
            wait_all: false,
            timeout: Timeout::Infinite,
            alertable: false,
            prioritize: false,
        }
    }

    pub fn single(handle: &'h Handle) -> Self {
        Self::new(std::slice::from_ref(handle))
    }

    pub fn wait_all(mut self, wait_all: bool) -> Self {
        self.wait_all = wait_all;
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn alertable(mut self, alertable: bool) -> Self {
        self.alertable = alertable;
        self
    }

    pub fn prioritize(mut self, prioritize: bool) -> Self {
        self.prioritize = prioritize;
        self
    }
}

/// Successful result of a wait
///
/// `index` is the satisfying object for wait-any and `None` for wait-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    Satisfied { index: Option<usize> },
    Abandoned { index: Option<usize> },
    TimedOut,
}

impl WaitOutcome {
    fn signaled(abandoned: bool, index: Option<usize>) -> Self {
        if abandoned {
            WaitOutcome::Abandoned { index }
        } else {
            WaitOutcome::Satisfied { index }
        }
    }

    /// Numeric result code: `WAIT_OBJECT_0 + i`, `WAIT_ABANDONED_0 + i` or
    /// `WAIT_TIMEOUT`
    pub fn code(self) -> u32 {
        // index < MAXIMUM_WAIT_OBJECTS, so the cast cannot truncate
        match self {
            WaitOutcome::Satisfied { index } => WAIT_OBJECT_0 + index.unwrap_or(0) as u32,
            WaitOutcome::Abandoned { index } => WAIT_ABANDONED_0 + index.unwrap_or(0) as u32,
            WaitOutcome::TimedOut => WAIT_TIMEOUT,
        }
    }

    pub fn index(self) -> Option<usize> {
        match self {
            WaitOutcome::Satisfied { index } | WaitOutcome::Abandoned { index } => index,
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn is_abandoned(self) -> bool {
        matches!(self, WaitOutcome::Abandoned { .. })
    }
}

/// Mid-algorithm collaborator failures surface as a fixed internal error;
/// the collaborator's own error is only logged
fn internal(context: &str) -> PalError {
    PalError::Internal(context.to_owned())
}

/// Stateless wait orchestrator over a registry and a synchronization manager
pub struct WaitMultiplexer<'p, R, M> {
    registry: &'p R,
    manager: &'p M,
    policy: WaitPolicy,
}

impl<'p, R, M> WaitMultiplexer<'p, R, M>
where
    R: ObjectRegistry,
    M: SynchManager<Object = R::Object>,
{
    /// Multiplexer with the restricted default policy
    pub fn new(registry: &'p R, manager: &'p M) -> Self {
        Self::with_policy(registry, manager, WaitPolicy::default())
    }

    pub fn with_policy(registry: &'p R, manager: &'p M, policy: WaitPolicy) -> Self {
        Self {
            registry,
            manager,
            policy,
        }
    }

    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Single-handle convenience form of [`wait`](Self::wait)
    pub fn wait_one(
        &self,
        thread: &Arc<PalThread>,
        handle: Handle,
        timeout: Timeout,
    ) -> PalResult<WaitOutcome> {
        self.wait(thread, &WaitRequest::single(&handle).timeout(timeout))
    }

    pub fn wait(&self, thread: &Arc<PalThread>, request: &WaitRequest<'_>) -> PalResult<WaitOutcome> {
        let span = span_wait(request.handles.len(), request.wait_all, request.timeout);
        let _entered = span.enter();

        let result = self.run(thread, request, &span);
        match &result {
            Ok(outcome) => span.record_outcome(outcome),
            Err(e) => {
                span.record_error(&e.to_string());
                debug!(thread = %thread.id(), error = %e, code = e.code(), "wait failed");
            }
        }
        result
    }

    fn run(
        &self,
        thread: &Arc<PalThread>,
        request: &WaitRequest<'_>,
        span: &WaitSpan,
    ) -> PalResult<WaitOutcome> {
        let handles = request.handles;
        let count = handles.len();

        if count == 0 || count > MAXIMUM_WAIT_OBJECTS {
            return Err(PalError::InvalidParameter(format!(
                "{} handles, expected 1 to {}",
                count, MAXIMUM_WAIT_OBJECTS
            )));
        }

        let wait_type = WaitType::for_request(count, request.wait_all);
        let wait_all = wait_type.is_wait_all();

        let mut objects = WaitArray::with_capacity(count)?;
        self.registry
            .reference_objects(handles, self.policy.allowed, &mut objects)?;

        if count > 1 && !self.policy.multi_object {
            return Err(PalError::NotSupported(
                "waiting on more than one object".into(),
            ));
        }

        if wait_all {
            for i in 0..count - 1 {
                for j in i + 1..count {
                    if Arc::ptr_eq(&objects[i], &objects[j]) {
                        return Err(PalError::InvalidParameter(format!(
                            "handles {} and {} (indices {} and {}) name the same object",
                            handles[i], handles[j], i, j
                        )));
                    }
                }
            }
        }

        let mut controllers = WaitArray::with_capacity(count)?;
        self.manager
            .wait_controllers(thread, &objects, &mut controllers)
            .map_err(|e| {
                error!(thread = %thread.id(), error = %e, "could not obtain wait controllers");
                internal("wait controllers unavailable")
            })?;

        if request.alertable {
            return Err(PalError::Internal("alertable waits are not supported".into()));
        }

        // Wait-any stops at the lowest signaled index
        let mut signaled_count = 0;
        let mut signaled_index = None;
        let mut abandoned = false;
        for (i, controller) in controllers.iter().enumerate() {
            let status = controller.can_wait_without_blocking().map_err(|e| {
                error!(index = i, handle = %handles[i], error = %e, "non-blocking check failed");
                internal("non-blocking check failed")
            })?;
            abandoned |= status.abandoned;
            if status.satisfied {
                signaled_count += 1;
                signaled_index = Some(i);
                if !wait_all {
                    break;
                }
            }
        }

        let need_to_block = signaled_count == 0 || (wait_all && signaled_count < count);

        if !need_to_block {
            span.record_path("fast");
            let (range, index) = if wait_all {
                (0..count, None)
            } else {
                let i = signaled_index
                    .ok_or_else(|| PalError::Internal("no signaled index recorded".into()))?;
                (i..i + 1, Some(i))
            };
            // Controllers hold the objects steady since the check, so a consume
            // failure is a broken controller; objects already consumed cannot
            // be given back.
            for (i, controller) in controllers[range.clone()].iter().enumerate() {
                controller
                    .release_waiting_thread_without_blocking()
                    .map_err(|e| {
                        error!(index = range.start + i, error = %e, "consume without blocking failed");
                        internal("consume without blocking failed")
                    })?;
            }
            return Ok(WaitOutcome::signaled(abandoned, index));
        }

        if request.timeout.is_poll() {
            span.record_path("poll");
            return Ok(WaitOutcome::TimedOut);
        }

        span.record_path("blocked");
        let registered = controllers
            .iter()
            .enumerate()
            .try_for_each(|(i, controller)| {
                controller.register_waiting_thread(
                    wait_type,
                    i,
                    request.alertable,
                    request.prioritize,
                )
            });
        // Never block while holding a controller
        controllers.release()?;
        if let Err(e) = registered {
            error!(thread = %thread.id(), error = %e, "waiter registration failed");
            self.manager.unregister_waiting_thread(thread);
            return Err(e);
        }

        let (reason, index) = self
            .manager
            .block_thread(thread, request.timeout, request.alertable)?;

        let signaled_abandoned = match reason {
            WakeupReason::WaitSucceeded => false,
            WakeupReason::MutexAbandoned => true,
            WakeupReason::WaitTimeout => return Ok(WaitOutcome::TimedOut),
            other => {
                warn!(thread = %thread.id(), reason = ?other, "thread woken with failure");
                return Err(PalError::Internal(format!("wakeup reason {:?}", other)));
            }
        };

        if wait_all {
            return Ok(WaitOutcome::signaled(signaled_abandoned, None));
        }
        if index >= count {
            error!(index, count, "signaled index out of range");
            return Err(PalError::Internal(format!(
                "signaled index {} out of range for {} objects",
                index, count
            )));
        }
        Ok(WaitOutcome::signaled(signaled_abandoned, Some(index)))
    }
}
