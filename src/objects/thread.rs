/*!
 * Compatibility-Layer Threads
 *
 * Per-thread state the synchronization manager needs: the wake slot, the
 * objects the thread is currently registered on, the mutexes it owns, and the
 * Win32-style "last error" value.
 *
 * OS threads are adopted on first use through [`PalThread::current`]. When an
 * adopted thread exits, the thread-local slot abandons any mutex it still
 * owns through the manager it was last bound to.
 */

use super::object::PalObject;
use crate::core::limits::NO_ERROR;
use crate::core::sync::ThreadParker;
use crate::core::types::ThreadId;
use crate::synch::{SynchronizationManager, WakeupReason};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tracing::{dispatcher, Dispatch};

/// Thread-local slot; its destructor runs when the OS thread exits
struct CurrentThread(RefCell<Option<Arc<PalThread>>>);

impl Drop for CurrentThread {
    fn drop(&mut self) {
        if let Some(thread) = self.0.get_mut().take() {
            thread.os_thread_exited();
        }
    }
}

thread_local! {
    static CURRENT_THREAD: CurrentThread = const { CurrentThread(RefCell::new(None)) };
}

/// A thread as seen by the synchronization layer
pub struct PalThread {
    id: ThreadId,
    name: Option<String>,
    last_error: AtomicU32,
    parker: ThreadParker<(WakeupReason, usize)>,
    // Objects this thread is registered on while blocked
    wait_set: Mutex<Vec<Arc<PalObject>>>,
    owned_mutexes: Mutex<Vec<Arc<PalObject>>>,
    // Manager that abandons owned mutexes when the OS thread exits
    manager: Mutex<Weak<SynchronizationManager>>,
}

impl PalThread {
    pub fn new() -> Self {
        Self {
            id: ThreadId::next(),
            name: None,
            last_error: AtomicU32::new(NO_ERROR),
            parker: ThreadParker::new(),
            wait_set: Mutex::new(Vec::new()),
            owned_mutexes: Mutex::new(Vec::new()),
            manager: Mutex::new(Weak::new()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// The calling OS thread's compatibility-layer thread, created on first use
    pub fn current() -> Arc<PalThread> {
        CURRENT_THREAD.with(|current| {
            current
                .0
                .borrow_mut()
                .get_or_insert_with(|| {
                    let name = std::thread::current().name().map(str::to_owned);
                    Arc::new(match name {
                        Some(name) => PalThread::named(name),
                        None => PalThread::new(),
                    })
                })
                .clone()
        })
    }

    /// Bind `thread` to the calling OS thread
    pub(crate) fn set_current(thread: Arc<PalThread>) {
        CURRENT_THREAD.with(|current| *current.0.borrow_mut() = Some(thread));
    }

    /// Route exit-time mutex abandonment through `manager`
    pub fn bind_manager(&self, manager: &Arc<SynchronizationManager>) {
        let mut bound = self.manager.lock();
        if !std::ptr::eq(bound.as_ptr(), Arc::as_ptr(manager)) {
            *bound = Arc::downgrade(manager);
        }
    }

    /// Runs from the thread-local destructor
    fn os_thread_exited(&self) {
        if self.owned_mutex_count() == 0 {
            return;
        }
        let Some(manager) = self.manager.lock().upgrade() else {
            return;
        };
        // Subscriber thread-locals may already be gone; route events nowhere
        dispatcher::with_default(&Dispatch::none(), || {
            let _ = manager.abandon_owned_mutexes(self);
        });
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn last_error(&self) -> u32 {
        self.last_error.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_last_error(&self, code: u32) {
        self.last_error.store(code, Ordering::Relaxed);
    }

    /// True while the thread has registrations a signaler may still satisfy
    pub fn is_waiting(&self) -> bool {
        self.parker.is_armed()
    }

    /// Number of objects the thread is currently registered on
    pub fn registered_count(&self) -> usize {
        self.wait_set.lock().len()
    }

    pub fn owned_mutex_count(&self) -> usize {
        self.owned_mutexes.lock().len()
    }

    #[inline]
    pub(crate) fn parker(&self) -> &ThreadParker<(WakeupReason, usize)> {
        &self.parker
    }

    pub(crate) fn push_wait_object(&self, object: Arc<PalObject>) {
        self.wait_set.lock().push(object);
    }

    pub(crate) fn wait_set_snapshot(&self) -> Vec<Arc<PalObject>> {
        self.wait_set.lock().clone()
    }

    pub(crate) fn take_wait_set(&self) -> Vec<Arc<PalObject>> {
        std::mem::take(&mut *self.wait_set.lock())
    }

    pub(crate) fn add_owned_mutex(&self, mutex: Arc<PalObject>) {
        self.owned_mutexes.lock().push(mutex);
    }

    pub(crate) fn remove_owned_mutex(&self, mutex: &Arc<PalObject>) {
        self.owned_mutexes
            .lock()
            .retain(|owned| !Arc::ptr_eq(owned, mutex));
    }

    pub(crate) fn take_owned_mutexes(&self) -> Vec<Arc<PalObject>> {
        std::mem::take(&mut *self.owned_mutexes.lock())
    }
}

impl Default for PalThread {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PalThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PalThread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("last_error", &self.last_error())
            .finish()
    }
}
