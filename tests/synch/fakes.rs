/*!
 * Test doubles for the wait multiplexer's collaborators
 *
 * FakeRegistry resolves handles to FakeObjects; FakeManager hands out
 * controllers that count themselves, records every registration, and returns
 * scripted wakeups from block_thread.
 */

use pal_sync::core::data_structures::WaitArray;
use pal_sync::objects::{AllowedObjectTypes, ObjectRegistry, ObjectType, PalThread};
use pal_sync::synch::{ControllerStatus, SynchManager, WaitController, WaitType, WakeupReason};
use pal_sync::{Handle, PalError, PalResult, Timeout};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub wait_type: WaitType,
    pub index: usize,
    pub alertable: bool,
    pub prioritize: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub signaled: bool,
    pub abandoned: bool,
    pub consumed: usize,
    pub checks: usize,
    pub registrations: Vec<Registration>,
}

#[derive(Debug)]
pub struct FakeObject {
    pub kind: ObjectType,
    pub state: Mutex<FakeState>,
}

impl FakeObject {
    pub fn signaled(&self) -> bool {
        self.state.lock().signaled
    }

    pub fn consumed(&self) -> usize {
        self.state.lock().consumed
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.state.lock().registrations.clone()
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    objects: HashMap<Handle, Arc<FakeObject>>,
    next: u32,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next: 4,
        }
    }

    pub fn add(&mut self, kind: ObjectType, signaled: bool) -> Handle {
        let handle = Handle(self.next);
        self.next += 4;
        let object = FakeObject {
            kind,
            state: Mutex::new(FakeState {
                signaled,
                ..FakeState::default()
            }),
        };
        self.objects.insert(handle, Arc::new(object));
        handle
    }

    pub fn add_abandoned(&mut self, kind: ObjectType) -> Handle {
        let handle = self.add(kind, true);
        self.object(handle).state.lock().abandoned = true;
        handle
    }

    pub fn object(&self, handle: Handle) -> &Arc<FakeObject> {
        &self.objects[&handle]
    }

    /// Strong counts of every object, for leak checks
    pub fn strong_counts(&self) -> HashMap<Handle, usize> {
        self.objects
            .iter()
            .map(|(handle, object)| (*handle, Arc::strong_count(object)))
            .collect()
    }
}

impl ObjectRegistry for FakeRegistry {
    type Object = FakeObject;

    fn reference_objects(
        &self,
        handles: &[Handle],
        allowed: AllowedObjectTypes,
        objects: &mut WaitArray<Arc<FakeObject>>,
    ) -> PalResult<()> {
        for &handle in handles {
            let object = match self.objects.get(&handle) {
                Some(object) if allowed.contains(object.kind) => Arc::clone(object),
                _ => {
                    objects.clear();
                    return Err(PalError::InvalidHandle(handle));
                }
            };
            objects.push(object)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeManager {
    pub live_controllers: AtomicUsize,
    pub controllers_created: AtomicUsize,
    pub blocks: AtomicUsize,
    pub live_at_block: AtomicUsize,
    pub unregistered: AtomicUsize,
    pub fail_controllers: AtomicBool,
    pub fail_check: AtomicBool,
    pub fail_register_at: Mutex<Option<usize>>,
    pub fail_consume_at: Mutex<Option<usize>>,
    pub wakeup: Mutex<Option<PalResult<(WakeupReason, usize)>>>,
    pub last_block: Mutex<Option<(Timeout, bool)>>,
}

impl FakeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// What the next block_thread call reports
    pub fn script(&self, wakeup: PalResult<(WakeupReason, usize)>) {
        *self.wakeup.lock() = Some(wakeup);
    }

    pub fn live(&self) -> usize {
        self.live_controllers.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.controllers_created.load(Ordering::SeqCst)
    }

    pub fn blocks(&self) -> usize {
        self.blocks.load(Ordering::SeqCst)
    }
}

pub struct FakeController<'a> {
    manager: &'a FakeManager,
    object: Arc<FakeObject>,
    index: usize,
}

impl Drop for FakeController<'_> {
    fn drop(&mut self) {
        self.manager.live_controllers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WaitController for FakeController<'_> {
    fn can_wait_without_blocking(&self) -> PalResult<ControllerStatus> {
        if self.manager.fail_check.load(Ordering::SeqCst) {
            return Err(PalError::InvalidParameter("check rejected".into()));
        }
        let mut state = self.object.state.lock();
        state.checks += 1;
        Ok(ControllerStatus {
            satisfied: state.signaled,
            abandoned: state.abandoned,
        })
    }

    fn release_waiting_thread_without_blocking(&self) -> PalResult<()> {
        if *self.manager.fail_consume_at.lock() == Some(self.index) {
            return Err(PalError::NotEnoughMemory("consume bookkeeping".into()));
        }
        let mut state = self.object.state.lock();
        if !state.signaled {
            return Err(PalError::Internal("consume of unsignaled object".into()));
        }
        state.signaled = false;
        state.abandoned = false;
        state.consumed += 1;
        Ok(())
    }

    fn register_waiting_thread(
        &self,
        wait_type: WaitType,
        index: usize,
        alertable: bool,
        prioritize: bool,
    ) -> PalResult<()> {
        if *self.manager.fail_register_at.lock() == Some(index) {
            return Err(PalError::NotEnoughMemory("waiter list".into()));
        }
        self.object.state.lock().registrations.push(Registration {
            wait_type,
            index,
            alertable,
            prioritize,
        });
        Ok(())
    }
}

impl SynchManager for FakeManager {
    type Object = FakeObject;
    type Controller<'a> = FakeController<'a> where Self: 'a;

    fn wait_controllers<'a>(
        &'a self,
        _thread: &Arc<PalThread>,
        objects: &[Arc<FakeObject>],
        controllers: &mut WaitArray<FakeController<'a>>,
    ) -> PalResult<()> {
        if self.fail_controllers.load(Ordering::SeqCst) {
            return Err(PalError::NotEnoughMemory("controller pool".into()));
        }
        for (index, object) in objects.iter().enumerate() {
            self.live_controllers.fetch_add(1, Ordering::SeqCst);
            self.controllers_created.fetch_add(1, Ordering::SeqCst);
            controllers.push(FakeController {
                manager: self,
                object: Arc::clone(object),
                index,
            })?;
        }
        Ok(())
    }

    fn block_thread(
        &self,
        _thread: &Arc<PalThread>,
        timeout: Timeout,
        alertable: bool,
    ) -> PalResult<(WakeupReason, usize)> {
        self.blocks.fetch_add(1, Ordering::SeqCst);
        self.live_at_block.store(self.live(), Ordering::SeqCst);
        *self.last_block.lock() = Some((timeout, alertable));
        self.wakeup
            .lock()
            .take()
            .unwrap_or(Ok((WakeupReason::WaitTimeout, 0)))
    }

    fn unregister_waiting_thread(&self, _thread: &Arc<PalThread>) {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn thread() -> Arc<PalThread> {
    Arc::new(PalThread::new())
}
