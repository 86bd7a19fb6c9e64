/*!
 * Synchronization Manager
 *
 * Cross-thread side of the wait protocol: hands out wait controllers, parks
 * blocked threads, and delivers signals to registered waiters.
 *
 * # Locking
 *
 * A single reentrant synchronization lock orders every wait registration,
 * every signal delivery and every wakeup arbitration. Each controller holds
 * its own guard on it, so a multi-object wait is registered atomically with
 * respect to signalers. Lock order: synch lock -> object data -> thread parker.
 */

use super::controller::SynchWaitController;
use super::traits::{SynchManager, WakeupReason};
use crate::core::data_structures::WaitArray;
use crate::core::errors::{PalError, PalResult};
use crate::core::sync::SyncConfig;
use crate::core::types::Timeout;
use crate::objects::object::WaiterEntry;
use crate::objects::{PalObject, PalThread, SynchState};
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

#[inline]
fn wakeup_reason(abandoned: bool) -> WakeupReason {
    if abandoned {
        WakeupReason::MutexAbandoned
    } else {
        WakeupReason::WaitSucceeded
    }
}

pub struct SynchronizationManager {
    synch_lock: ReentrantMutex<()>,
    config: SyncConfig,
}

impl SynchronizationManager {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            synch_lock: ReentrantMutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Wake every registered waiter the object's current state can satisfy
    ///
    /// Waiters are visited in list order. Single and wait-any waiters consume
    /// this object; wait-all waiters are woken only when their whole set is
    /// acquirable, and then consume all of it.
    pub fn signal_object(&self, object: &Arc<PalObject>) -> PalResult<()> {
        let _lock = self.synch_lock.lock();

        for entry in object.waiters_snapshot() {
            if !entry.thread.parker().is_armed() {
                continue;
            }

            let wakeup = if entry.wait_type.is_wait_all() {
                Self::try_satisfy_wait_all(&entry)?
            } else {
                Self::try_satisfy_one(object, &entry)?
            };

            if let Some(wakeup) = wakeup {
                if !entry.thread.parker().unpark(wakeup) {
                    error!(thread = %entry.thread.id(), "armed waiter rejected wakeup");
                    return Err(PalError::Internal("wakeup delivery failed".into()));
                }
                debug!(
                    thread = %entry.thread.id(),
                    reason = ?wakeup.0,
                    index = wakeup.1,
                    "waiter woken"
                );
            }
        }
        Ok(())
    }

    fn try_satisfy_one(
        object: &Arc<PalObject>,
        entry: &WaiterEntry,
    ) -> PalResult<Option<(WakeupReason, usize)>> {
        let tid = entry.thread.id();
        let acquired = {
            let mut data = object.lock_data();
            if !data.state.is_signaled_for(tid) {
                return Ok(None);
            }
            data.state.acquire(tid)?
        };
        if acquired.new_owner {
            entry.thread.add_owned_mutex(Arc::clone(object));
        }
        Ok(Some((wakeup_reason(acquired.abandoned), entry.index)))
    }

    fn try_satisfy_wait_all(entry: &WaiterEntry) -> PalResult<Option<(WakeupReason, usize)>> {
        let tid = entry.thread.id();
        let wait_set = entry.thread.wait_set_snapshot();
        if !wait_set
            .iter()
            .all(|object| object.lock_data().state.is_signaled_for(tid))
        {
            return Ok(None);
        }

        // Checked under the same synch lock, so no acquire below can fail
        // after an earlier one succeeded
        let mut abandoned = false;
        for object in &wait_set {
            let acquired = object.lock_data().state.acquire(tid).map_err(|e| {
                error!(thread = %tid, error = %e, "wait-all acquire failed after check");
                PalError::Internal("wait-all acquire failed".into())
            })?;
            if acquired.new_owner {
                entry.thread.add_owned_mutex(Arc::clone(object));
            }
            abandoned |= acquired.abandoned;
        }
        Ok(Some((wakeup_reason(abandoned), 0)))
    }

    pub fn set_event(&self, event: &Arc<PalObject>) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        event.lock_data().state.set_event(true)?;
        self.signal_object(event)
    }

    pub fn reset_event(&self, event: &Arc<PalObject>) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        event.lock_data().state.set_event(false)
    }

    /// Track a mutex created already owned by `thread`
    pub fn record_mutex_owner(&self, thread: &Arc<PalThread>, mutex: &Arc<PalObject>) {
        let _lock = self.synch_lock.lock();
        thread.add_owned_mutex(Arc::clone(mutex));
    }

    /// Drop one level of ownership; the mutex is signaled once fully released
    pub fn release_mutex(&self, thread: &Arc<PalThread>, mutex: &Arc<PalObject>) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        let released = mutex.lock_data().state.release_mutex(thread.id())?;
        if released {
            thread.remove_owned_mutex(mutex);
            self.signal_object(mutex)?;
        }
        Ok(())
    }

    /// Abandon every mutex the thread still owns and wake their waiters
    ///
    /// Returns how many mutexes were abandoned.
    pub fn abandon_owned_mutexes(&self, thread: &PalThread) -> PalResult<usize> {
        let _lock = self.synch_lock.lock();
        let tid = thread.id();
        let mut abandoned = 0;

        for mutex in thread.take_owned_mutexes() {
            {
                let mut data = mutex.lock_data();
                if !matches!(data.state, SynchState::Mutex { owner: Some(owner), .. } if owner == tid)
                {
                    continue;
                }
                data.state.abandon();
            }
            warn!(thread = %tid, "mutex abandoned by terminating thread");
            abandoned += 1;
            self.signal_object(&mutex)?;
        }
        Ok(abandoned)
    }

    /// Abandon the thread's mutexes, then signal its thread object
    pub fn thread_terminated(
        &self,
        thread: &Arc<PalThread>,
        thread_object: &Arc<PalObject>,
        exit_code: u32,
    ) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        let tid = thread.id();
        self.abandon_owned_mutexes(thread)?;

        thread_object.lock_data().state.set_exited(exit_code)?;
        debug!(thread = %tid, exit_code, "thread terminated");
        self.signal_object(thread_object)
    }

    pub fn process_exited(&self, process_object: &Arc<PalObject>, exit_code: u32) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        process_object.lock_data().state.set_exited(exit_code)?;
        debug!(exit_code, "process exited");
        self.signal_object(process_object)
    }

    // Caller holds the synch lock
    fn clear_registrations(thread: &Arc<PalThread>) -> Option<(WakeupReason, usize)> {
        let delivered = thread.parker().disarm();
        for object in thread.take_wait_set() {
            object.remove_waiters_for(thread.id());
        }
        delivered
    }
}

impl Default for SynchronizationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchManager for SynchronizationManager {
    type Object = PalObject;
    type Controller<'a> = SynchWaitController<'a> where Self: 'a;

    fn wait_controllers<'a>(
        &'a self,
        thread: &Arc<PalThread>,
        objects: &[Arc<PalObject>],
        controllers: &mut WaitArray<SynchWaitController<'a>>,
    ) -> PalResult<()> {
        let _lock = self.synch_lock.lock();
        if Self::clear_registrations(thread).is_some() {
            warn!(thread = %thread.id(), "stale wakeup discarded");
        }

        for object in objects {
            let controller = SynchWaitController::new(
                self.synch_lock.lock(),
                Arc::clone(object),
                Arc::clone(thread),
            );
            controllers.push(controller)?;
        }
        Ok(())
    }

    fn block_thread(
        &self,
        thread: &Arc<PalThread>,
        timeout: Timeout,
        alertable: bool,
    ) -> PalResult<(WakeupReason, usize)> {
        if alertable {
            return Err(PalError::Internal("alertable waits are not supported".into()));
        }

        let deadline = timeout.as_duration().map(|d| Instant::now() + d);
        let woken = thread.parker().park(deadline, &self.config);

        // A signaler that won the race before this point has already consumed
        // on our behalf; after it, no signaler can see the registrations.
        let _lock = self.synch_lock.lock();
        let delivered = Self::clear_registrations(thread);
        trace!(thread = %thread.id(), woken, ?delivered, "thread resumed");

        match delivered {
            Some(wakeup) => Ok(wakeup),
            None if deadline.is_some() => Ok((WakeupReason::WaitTimeout, 0)),
            None => {
                warn!(thread = %thread.id(), "infinite wait resumed without a wakeup");
                Ok((WakeupReason::WaitFailed, 0))
            }
        }
    }

    fn unregister_waiting_thread(&self, thread: &Arc<PalThread>) {
        let _lock = self.synch_lock.lock();
        Self::clear_registrations(thread);
    }
}
