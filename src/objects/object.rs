/*!
 * Synchronizable Objects
 *
 * Shared, reference-counted objects a thread can wait on. The set of kinds is
 * closed: each kind's signaled-state rules live in one `SynchState` variant,
 * and all state changes happen under the synchronization manager's lock.
 */

use super::thread::PalThread;
use crate::core::errors::{PalError, PalResult};
use crate::core::types::ThreadId;
use crate::synch::WaitType;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Object kinds known to the handle table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Process,
    Thread,
    Mutex,
    Event,
}

impl ObjectType {
    pub const ALL: [ObjectType; 4] = [
        ObjectType::Process,
        ObjectType::Thread,
        ObjectType::Mutex,
        ObjectType::Event,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Process => "process",
            ObjectType::Thread => "thread",
            ObjectType::Mutex => "mutex",
            ObjectType::Event => "event",
        };
        f.write_str(name)
    }
}

/// Set of object kinds a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllowedObjectTypes {
    mask: u8,
}

impl AllowedObjectTypes {
    pub const fn new(types: &[ObjectType]) -> Self {
        let mut mask = 0;
        let mut i = 0;
        while i < types.len() {
            mask |= types[i].bit();
            i += 1;
        }
        Self { mask }
    }

    pub const fn all() -> Self {
        Self::new(&ObjectType::ALL)
    }

    #[inline]
    pub const fn contains(self, object_type: ObjectType) -> bool {
        self.mask & object_type.bit() != 0
    }
}

/// Kinds a wait may name under the restricted policy
pub const WAIT_OBJECT_TYPES: AllowedObjectTypes =
    AllowedObjectTypes::new(&[ObjectType::Process, ObjectType::Thread]);

/// What an acquisition did to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acquired {
    /// The object was a mutex whose previous owner died holding it
    pub abandoned: bool,
    /// The acquiring thread became the mutex owner (not a recursive acquire)
    pub new_owner: bool,
}

/// Kind-specific synchronization state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynchState {
    Event {
        manual_reset: bool,
        signaled: bool,
    },
    Mutex {
        owner: Option<ThreadId>,
        recursion: u32,
        abandoned: bool,
    },
    Thread {
        exit_code: Option<u32>,
    },
    Process {
        exit_code: Option<u32>,
    },
}

impl SynchState {
    pub fn object_type(&self) -> ObjectType {
        match self {
            SynchState::Event { .. } => ObjectType::Event,
            SynchState::Mutex { .. } => ObjectType::Mutex,
            SynchState::Thread { .. } => ObjectType::Thread,
            SynchState::Process { .. } => ObjectType::Process,
        }
    }

    /// Whether `thread` could acquire the object right now
    pub fn is_signaled_for(&self, thread: ThreadId) -> bool {
        match self {
            SynchState::Event { signaled, .. } => *signaled,
            SynchState::Mutex { owner, .. } => owner.is_none() || *owner == Some(thread),
            SynchState::Thread { exit_code } | SynchState::Process { exit_code } => {
                exit_code.is_some()
            }
        }
    }

    /// Whether any thread could acquire the object right now
    pub fn is_signaled(&self) -> bool {
        match self {
            SynchState::Mutex { owner, .. } => owner.is_none(),
            other => other.is_signaled_for(ThreadId(0)),
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, SynchState::Mutex { abandoned: true, .. })
    }

    /// Consume the signal on behalf of `thread`
    ///
    /// Auto-reset events clear, mutexes transfer ownership (or recurse),
    /// terminated threads and exited processes stay signaled.
    pub fn acquire(&mut self, thread: ThreadId) -> PalResult<Acquired> {
        if !self.is_signaled_for(thread) {
            return Err(PalError::Internal(format!(
                "{} is not signaled for thread {}",
                self.object_type(),
                thread
            )));
        }

        let acquired = match self {
            SynchState::Event {
                manual_reset,
                signaled,
            } => {
                if !*manual_reset {
                    *signaled = false;
                }
                Acquired::default()
            }
            SynchState::Mutex {
                owner,
                recursion,
                abandoned,
            } => {
                if owner.is_some() {
                    *recursion = recursion
                        .checked_add(1)
                        .ok_or_else(|| PalError::Internal("mutex recursion overflow".into()))?;
                    Acquired::default()
                } else {
                    *owner = Some(thread);
                    *recursion = 1;
                    Acquired {
                        abandoned: std::mem::take(abandoned),
                        new_owner: true,
                    }
                }
            }
            SynchState::Thread { .. } | SynchState::Process { .. } => Acquired::default(),
        };
        Ok(acquired)
    }

    /// Release one level of mutex ownership
    ///
    /// Returns true when the mutex became unowned.
    pub fn release_mutex(&mut self, thread: ThreadId) -> PalResult<bool> {
        match self {
            SynchState::Mutex {
                owner, recursion, ..
            } => {
                if *owner != Some(thread) {
                    return Err(PalError::NotOwner);
                }
                *recursion -= 1;
                if *recursion == 0 {
                    *owner = None;
                    return Ok(true);
                }
                Ok(false)
            }
            other => Err(PalError::Internal(format!(
                "release_mutex on {}",
                other.object_type()
            ))),
        }
    }

    /// Drop ownership held by a terminated thread and flag the mutex
    pub fn abandon(&mut self) {
        if let SynchState::Mutex {
            owner,
            recursion,
            abandoned,
        } = self
        {
            *owner = None;
            *recursion = 0;
            *abandoned = true;
        }
    }

    pub fn set_event(&mut self, value: bool) -> PalResult<()> {
        match self {
            SynchState::Event { signaled, .. } => {
                *signaled = value;
                Ok(())
            }
            other => Err(PalError::Internal(format!(
                "set_event on {}",
                other.object_type()
            ))),
        }
    }

    /// Record termination of a thread or process
    pub fn set_exited(&mut self, code: u32) -> PalResult<()> {
        match self {
            SynchState::Thread { exit_code } | SynchState::Process { exit_code } => {
                exit_code.get_or_insert(code);
                Ok(())
            }
            other => Err(PalError::Internal(format!(
                "set_exited on {}",
                other.object_type()
            ))),
        }
    }

    pub fn exit_code(&self) -> Option<u32> {
        match self {
            SynchState::Thread { exit_code } | SynchState::Process { exit_code } => *exit_code,
            _ => None,
        }
    }
}

/// A thread registered to be woken by an object
#[derive(Clone)]
pub(crate) struct WaiterEntry {
    pub(crate) thread: Arc<PalThread>,
    pub(crate) index: usize,
    pub(crate) wait_type: WaitType,
}

pub(crate) struct SynchData {
    pub(crate) state: SynchState,
    pub(crate) waiters: VecDeque<WaiterEntry>,
}

/// Shared synchronization object
///
/// Lifetime is governed by `Arc`: the handle table holds one reference per
/// open handle and every in-flight wait pins one more.
pub struct PalObject {
    object_type: ObjectType,
    data: Mutex<SynchData>,
}

impl PalObject {
    fn with_state(state: SynchState) -> Self {
        Self {
            object_type: state.object_type(),
            data: Mutex::new(SynchData {
                state,
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn new_event(manual_reset: bool, initial_state: bool) -> Self {
        Self::with_state(SynchState::Event {
            manual_reset,
            signaled: initial_state,
        })
    }

    pub fn new_mutex(owner: Option<ThreadId>) -> Self {
        Self::with_state(SynchState::Mutex {
            owner,
            recursion: u32::from(owner.is_some()),
            abandoned: false,
        })
    }

    pub fn new_thread() -> Self {
        Self::with_state(SynchState::Thread { exit_code: None })
    }

    pub fn new_process() -> Self {
        Self::with_state(SynchState::Process { exit_code: None })
    }

    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SynchState {
        self.data.lock().state.clone()
    }

    pub fn is_signaled(&self) -> bool {
        self.data.lock().state.is_signaled()
    }

    /// Number of threads currently registered on this object
    pub fn waiter_count(&self) -> usize {
        self.data.lock().waiters.len()
    }

    #[inline]
    pub(crate) fn lock_data(&self) -> MutexGuard<'_, SynchData> {
        self.data.lock()
    }

    pub(crate) fn add_waiter(&self, entry: WaiterEntry, prioritize: bool) {
        let mut data = self.data.lock();
        if prioritize {
            data.waiters.push_front(entry);
        } else {
            data.waiters.push_back(entry);
        }
    }

    pub(crate) fn remove_waiters_for(&self, thread: ThreadId) {
        self.data
            .lock()
            .waiters
            .retain(|entry| entry.thread.id() != thread);
    }

    pub(crate) fn waiters_snapshot(&self) -> Vec<WaiterEntry> {
        self.data.lock().waiters.iter().cloned().collect()
    }
}

impl fmt::Debug for PalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.lock();
        f.debug_struct("PalObject")
            .field("object_type", &self.object_type)
            .field("state", &data.state)
            .field("waiters", &data.waiters.len())
            .finish()
    }
}
