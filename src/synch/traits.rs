/*!
 * Synchronization Manager Traits
 * The seams the wait multiplexer drives: per-object controllers and blocking
 */

use crate::core::data_structures::WaitArray;
use crate::core::errors::PalResult;
use crate::core::types::Timeout;
use crate::objects::PalThread;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a waiter is registered on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitType {
    SingleObject,
    MultipleObjectsWaitOne,
    MultipleObjectsWaitAll,
}

impl WaitType {
    pub fn for_request(count: usize, wait_all: bool) -> Self {
        match (count, wait_all) {
            (1, _) => WaitType::SingleObject,
            (_, true) => WaitType::MultipleObjectsWaitAll,
            (_, false) => WaitType::MultipleObjectsWaitOne,
        }
    }

    #[inline]
    pub fn is_wait_all(self) -> bool {
        self == WaitType::MultipleObjectsWaitAll
    }
}

/// Why a blocked thread woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeupReason {
    WaitSucceeded,
    MutexAbandoned,
    WaitTimeout,
    WaitFailed,
    Alerted,
}

/// Result of a non-blocking check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerStatus {
    /// The calling thread could proceed without blocking
    pub satisfied: bool,
    /// The object is a mutex whose owner terminated while holding it
    pub abandoned: bool,
}

/// Per-(object, wait call) capability
///
/// Released by drop. Implementations serialize against concurrent signalers
/// for as long as they are alive.
pub trait WaitController {
    fn can_wait_without_blocking(&self) -> PalResult<ControllerStatus>;

    /// Consume the object's signal on behalf of the waiting thread
    ///
    /// Only called after `can_wait_without_blocking` reported the object
    /// satisfied, with this controller still alive. Implementations must not
    /// fail in that state: a wait-all consumes several objects in a row and
    /// has no way to give back the ones already consumed.
    fn release_waiting_thread_without_blocking(&self) -> PalResult<()>;

    fn register_waiting_thread(
        &self,
        wait_type: WaitType,
        index: usize,
        alertable: bool,
        prioritize: bool,
    ) -> PalResult<()>;
}

/// Cross-thread wait protocol
pub trait SynchManager {
    type Object;
    type Controller<'a>: WaitController
    where
        Self: 'a;

    /// Append one controller per object to `controllers`, in order
    fn wait_controllers<'a>(
        &'a self,
        thread: &Arc<PalThread>,
        objects: &[Arc<Self::Object>],
        controllers: &mut WaitArray<Self::Controller<'a>>,
    ) -> PalResult<()>;

    /// Suspend `thread` until a registered object wakes it or `timeout` passes
    ///
    /// Must be called with no controller alive. Returns the wakeup reason and,
    /// for wait-any, the index of the object that woke the thread.
    fn block_thread(
        &self,
        thread: &Arc<PalThread>,
        timeout: Timeout,
        alertable: bool,
    ) -> PalResult<(WakeupReason, usize)>;

    /// Drop every registration `thread` holds without blocking
    fn unregister_waiting_thread(&self, thread: &Arc<PalThread>);
}
