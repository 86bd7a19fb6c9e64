/*!
 * Wait Controller
 * Holds the synchronization lock for one object during one wait call
 */

use super::traits::{ControllerStatus, WaitController, WaitType};
use crate::core::errors::{PalError, PalResult};
use crate::objects::object::WaiterEntry;
use crate::objects::{PalObject, PalThread};
use parking_lot::ReentrantMutexGuard;
use std::sync::Arc;
use tracing::{debug, trace};

/// Controller handed out by `SynchronizationManager::wait_controllers`
///
/// While any controller is alive the calling thread owns the manager's
/// synchronization lock, so no signaler can observe a half-registered wait.
pub struct SynchWaitController<'a> {
    _lock: ReentrantMutexGuard<'a, ()>,
    object: Arc<PalObject>,
    thread: Arc<PalThread>,
}

impl<'a> SynchWaitController<'a> {
    pub(crate) fn new(
        lock: ReentrantMutexGuard<'a, ()>,
        object: Arc<PalObject>,
        thread: Arc<PalThread>,
    ) -> Self {
        Self {
            _lock: lock,
            object,
            thread,
        }
    }

    pub fn object(&self) -> &Arc<PalObject> {
        &self.object
    }
}

impl WaitController for SynchWaitController<'_> {
    fn can_wait_without_blocking(&self) -> PalResult<ControllerStatus> {
        let data = self.object.lock_data();
        Ok(ControllerStatus {
            satisfied: data.state.is_signaled_for(self.thread.id()),
            abandoned: data.state.is_abandoned(),
        })
    }

    fn release_waiting_thread_without_blocking(&self) -> PalResult<()> {
        let acquired = self.object.lock_data().state.acquire(self.thread.id())?;
        if acquired.new_owner {
            self.thread.add_owned_mutex(Arc::clone(&self.object));
        }
        trace!(
            thread = %self.thread.id(),
            object_type = %self.object.object_type(),
            abandoned = acquired.abandoned,
            "signal consumed without blocking"
        );
        Ok(())
    }

    fn register_waiting_thread(
        &self,
        wait_type: WaitType,
        index: usize,
        alertable: bool,
        prioritize: bool,
    ) -> PalResult<()> {
        if alertable {
            return Err(PalError::Internal("alertable registration".into()));
        }
        if !self.thread.parker().arm() {
            return Err(PalError::Internal(format!(
                "thread {} has an undelivered wakeup",
                self.thread.id()
            )));
        }

        self.object.add_waiter(
            WaiterEntry {
                thread: Arc::clone(&self.thread),
                index,
                wait_type,
            },
            prioritize,
        );
        self.thread.push_wait_object(Arc::clone(&self.object));

        debug!(
            thread = %self.thread.id(),
            object_type = %self.object.object_type(),
            index,
            ?wait_type,
            prioritize,
            "waiter registered"
        );
        Ok(())
    }
}
