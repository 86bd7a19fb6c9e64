/*!
 * PAL Context
 *
 * Explicitly constructed compatibility-layer context: the handle table, the
 * synchronization manager and the wait policy. Cheap to clone and share
 * across threads.
 *
 * The numeric entry points (`wait_for_*`) follow the Win32 convention: they
 * return a result code and record failures in the calling thread's last error.
 */

use super::config::PalConfig;
use crate::core::errors::{PalError, PalResult};
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::limits::{ABNORMAL_THREAD_EXIT_CODE, STILL_ACTIVE, WAIT_FAILED};
use crate::core::types::{Handle, Timeout};
use crate::objects::{AllowedObjectTypes, HandleTable, ObjectType, PalObject, PalThread};
use crate::synch::{SynchronizationManager, WaitMultiplexer, WaitOutcome, WaitPolicy, WaitRequest};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, error, info};

const EVENT: AllowedObjectTypes = AllowedObjectTypes::new(&[ObjectType::Event]);
const MUTEX: AllowedObjectTypes = AllowedObjectTypes::new(&[ObjectType::Mutex]);
const THREAD: AllowedObjectTypes = AllowedObjectTypes::new(&[ObjectType::Thread]);
const PROCESS: AllowedObjectTypes = AllowedObjectTypes::new(&[ObjectType::Process]);

#[derive(Clone)]
pub struct Pal {
    handles: Arc<HandleTable>,
    manager: Arc<SynchronizationManager>,
    policy: WaitPolicy,
}

impl Pal {
    pub fn new() -> Self {
        Self::with_config(PalConfig::default())
    }

    pub fn with_config(config: PalConfig) -> Self {
        info!(
            multi_object = config.policy.multi_object,
            max_spins = config.sync.max_spins,
            "PAL context created"
        );
        Self {
            handles: Arc::new(HandleTable::new()),
            manager: Arc::new(SynchronizationManager::with_config(config.sync)),
            policy: config.policy,
        }
    }

    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn manager(&self) -> &SynchronizationManager {
        &self.manager
    }

    /// The calling OS thread's compatibility-layer thread, bound to this
    /// context's manager so mutexes it still owns at exit are abandoned
    pub fn current_thread(&self) -> Arc<PalThread> {
        let thread = PalThread::current();
        thread.bind_manager(&self.manager);
        thread
    }

    pub fn get_last_error(&self) -> u32 {
        PalThread::current().last_error()
    }

    /// Resolve a handle of any kind, pinning the object
    pub fn object(&self, handle: Handle) -> PalResult<Arc<PalObject>> {
        self.handles.get(handle, AllowedObjectTypes::all())
    }

    fn multiplexer(&self) -> WaitMultiplexer<'_, HandleTable, SynchronizationManager> {
        WaitMultiplexer::with_policy(&self.handles, &self.manager, self.policy)
    }

    /// Record a failure as the calling thread's last error
    fn record<T>(&self, result: PalResult<T>) -> PalResult<T> {
        if let Err(e) = &result {
            PalThread::current().set_last_error(e.code());
        }
        result
    }

    // Waiting

    pub fn wait(&self, request: &WaitRequest<'_>) -> PalResult<WaitOutcome> {
        self.record(self.multiplexer().wait(&self.current_thread(), request))
    }

    pub fn wait_for_single_object(&self, handle: Handle, milliseconds: u32) -> u32 {
        self.wait_for_multiple_objects_ex(std::slice::from_ref(&handle), false, milliseconds, false)
    }

    pub fn wait_for_multiple_objects(
        &self,
        handles: &[Handle],
        wait_all: bool,
        milliseconds: u32,
    ) -> u32 {
        self.wait_for_multiple_objects_ex(handles, wait_all, milliseconds, false)
    }

    pub fn wait_for_multiple_objects_ex(
        &self,
        handles: &[Handle],
        wait_all: bool,
        milliseconds: u32,
        alertable: bool,
    ) -> u32 {
        let request = WaitRequest::new(handles)
            .wait_all(wait_all)
            .timeout(Timeout::from_millis(milliseconds))
            .alertable(alertable);
        match self.wait(&request) {
            Ok(outcome) => outcome.code(),
            Err(_) => WAIT_FAILED,
        }
    }

    // Events

    pub fn create_event(&self, manual_reset: bool, initial_state: bool) -> PalResult<Handle> {
        let event = Arc::new(PalObject::new_event(manual_reset, initial_state));
        self.record(self.handles.insert(event))
    }

    pub fn set_event(&self, handle: Handle) -> PalResult<()> {
        let result = self
            .handles
            .get(handle, EVENT)
            .and_then(|event| self.manager.set_event(&event));
        self.record(result)
    }

    pub fn reset_event(&self, handle: Handle) -> PalResult<()> {
        let result = self
            .handles
            .get(handle, EVENT)
            .and_then(|event| self.manager.reset_event(&event));
        self.record(result)
    }

    // Mutexes

    pub fn create_mutex(&self, initial_owner: bool) -> PalResult<Handle> {
        let thread = self.current_thread();
        let mutex = Arc::new(PalObject::new_mutex(initial_owner.then(|| thread.id())));
        if initial_owner {
            self.manager.record_mutex_owner(&thread, &mutex);
        }
        let result = self.handles.insert(mutex);
        self.record(result)
    }

    pub fn release_mutex(&self, handle: Handle) -> PalResult<()> {
        let result = self
            .handles
            .get(handle, MUTEX)
            .and_then(|mutex| self.manager.release_mutex(&self.current_thread(), &mutex));
        self.record(result)
    }

    // Threads

    /// Run `f` on a new OS thread; its return value becomes the exit code
    ///
    /// The thread handle is signaled when `f` returns or unwinds. Mutexes the
    /// thread still owns at that point are abandoned.
    pub fn create_thread<F>(&self, f: F) -> PalResult<Handle>
    where
        F: FnOnce() -> u32 + Send + 'static,
    {
        let thread = Arc::new(PalThread::new());
        let object = Arc::new(PalObject::new_thread());
        let handle = self.record(self.handles.insert(Arc::clone(&object)))?;

        let manager = Arc::clone(&self.manager);
        let spawned = std::thread::Builder::new()
            .name(format!("pal-thread-{}", thread.id()))
            .spawn(move || {
                PalThread::set_current(Arc::clone(&thread));
                let mut termination = TerminationGuard::new(manager, thread, object);
                termination.exit_code = f();
            });

        match spawned {
            Ok(_) => {
                debug!(handle = %handle, "thread created");
                Ok(handle)
            }
            Err(e) => {
                error!(error = %e, "thread spawn failed");
                let _ = self.handles.close(handle);
                self.record(Err(PalError::from(e)))
            }
        }
    }

    /// `STILL_ACTIVE` until the thread terminates
    pub fn get_exit_code_thread(&self, handle: Handle) -> PalResult<u32> {
        let result = self
            .handles
            .get(handle, THREAD)
            .map(|thread| thread.state().exit_code().unwrap_or(STILL_ACTIVE));
        self.record(result)
    }

    // Processes

    /// Spawn a child process and return a handle signaled when it exits
    pub fn spawn_process(&self, command: &mut Command) -> PalResult<Handle> {
        let mut child = self.record(command.spawn().map_err(PalError::from))?;
        let pid = child.id();
        let object = Arc::new(PalObject::new_process());
        let handle = self.record(self.handles.insert(Arc::clone(&object)))?;

        let manager = Arc::clone(&self.manager);
        let reaper = std::thread::Builder::new()
            .name(format!("pal-reaper-{}", pid))
            .spawn(move || {
                let exit_code = match child.wait() {
                    Ok(status) => status.code().map_or(ABNORMAL_THREAD_EXIT_CODE, |c| c as u32),
                    Err(e) => {
                        error!(pid, error = %e, "waiting for child failed");
                        ABNORMAL_THREAD_EXIT_CODE
                    }
                };
                if let Err(e) = manager.process_exited(&object, exit_code) {
                    error!(pid, error = %e, "process exit signaling failed");
                }
            });

        match reaper {
            Ok(_) => {
                debug!(handle = %handle, pid, "process spawned");
                Ok(handle)
            }
            Err(e) => {
                let _ = self.handles.close(handle);
                self.record(Err(PalError::from(e)))
            }
        }
    }

    /// `STILL_ACTIVE` until the process exits
    pub fn get_exit_code_process(&self, handle: Handle) -> PalResult<u32> {
        let result = self
            .handles
            .get(handle, PROCESS)
            .map(|process| process.state().exit_code().unwrap_or(STILL_ACTIVE));
        self.record(result)
    }

    pub fn close_handle(&self, handle: Handle) -> PalResult<()> {
        self.record(self.handles.close(handle))
    }
}

impl Default for Pal {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals thread termination when the thread body returns or unwinds
struct TerminationGuard {
    manager: Arc<SynchronizationManager>,
    thread: Arc<PalThread>,
    object: Arc<PalObject>,
    exit_code: u32,
    metadata: GuardMetadata,
    active: bool,
}

impl TerminationGuard {
    fn new(
        manager: Arc<SynchronizationManager>,
        thread: Arc<PalThread>,
        object: Arc<PalObject>,
    ) -> Self {
        let metadata = GuardMetadata::new("thread_termination").with_thread(thread.id());
        Self {
            manager,
            thread,
            object,
            exit_code: ABNORMAL_THREAD_EXIT_CODE,
            metadata,
            active: true,
        }
    }
}

impl Guard for TerminationGuard {
    fn resource_type(&self) -> &'static str {
        "thread_termination"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        if let Err(e) = self
            .manager
            .thread_terminated(&self.thread, &self.object, self.exit_code)
        {
            error!(thread = %self.thread.id(), error = %e, "thread termination signaling failed");
        }
        Ok(())
    }
}

impl GuardDrop for TerminationGuard {
    fn on_drop(&mut self) {
        if self.active {
            debug!(
                thread = %self.thread.id(),
                exit_code = self.exit_code,
                lifetime_us = self.metadata.lifetime_micros(),
                "thread exiting"
            );
            let _ = self.release();
        }
    }
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}
