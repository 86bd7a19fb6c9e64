/*!
 * Object Registry
 * Maps opaque handles to shared objects and pins them for the duration of a call
 */

use super::object::{AllowedObjectTypes, PalObject};
use crate::core::data_structures::WaitArray;
use crate::core::errors::{PalError, PalResult};
use crate::core::limits::{FIRST_HANDLE_VALUE, HANDLE_VALUE_STEP};
use crate::core::types::Handle;
use ahash::RandomState;
use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle resolution used by the wait multiplexer
///
/// Pinning is taking an `Arc` clone; releasing is dropping it.
pub trait ObjectRegistry {
    type Object;

    /// Resolve every handle and pin the objects into `objects`, in order
    ///
    /// All or nothing: on failure `objects` is left empty (every reference
    /// pinned so far is released) and the error names the first bad handle.
    fn reference_objects(
        &self,
        handles: &[Handle],
        allowed: AllowedObjectTypes,
        objects: &mut WaitArray<Arc<Self::Object>>,
    ) -> PalResult<()>;
}

/// Handle table
///
/// # Performance
/// - Sharded concurrent map for lock-free-ish lookups from many threads
/// - Lock-free queue for handle value recycling
pub struct HandleTable {
    objects: DashMap<Handle, Arc<PalObject>, RandomState>,
    next_value: AtomicU32,
    free_handles: SegQueue<Handle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            objects: DashMap::with_hasher(RandomState::new()),
            next_value: AtomicU32::new(FIRST_HANDLE_VALUE),
            free_handles: SegQueue::new(),
        }
    }

    /// Register an object and return a fresh handle to it
    pub fn insert(&self, object: Arc<PalObject>) -> PalResult<Handle> {
        let handle = match self.free_handles.pop() {
            Some(recycled) => recycled,
            None => {
                // The counter never wraps: once the next step would overflow it
                // stays put and every later fresh allocation fails
                let value = self
                    .next_value
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
                        value.checked_add(HANDLE_VALUE_STEP)
                    })
                    .map_err(|_| {
                        warn!("handle space exhausted");
                        PalError::NotEnoughMemory("handle space exhausted".into())
                    })?;
                let handle = Handle(value);
                if handle.is_sentinel() {
                    return Err(PalError::NotEnoughMemory("handle space exhausted".into()));
                }
                handle
            }
        };

        debug!(handle = %handle, object_type = %object.object_type(), "handle created");
        self.objects.insert(handle, object);
        Ok(handle)
    }

    /// Resolve and pin one handle
    pub fn get(&self, handle: Handle, allowed: AllowedObjectTypes) -> PalResult<Arc<PalObject>> {
        let object = self
            .objects
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PalError::InvalidHandle(handle))?;

        if !allowed.contains(object.object_type()) {
            debug!(handle = %handle, object_type = %object.object_type(), "object type not allowed");
            return Err(PalError::InvalidHandle(handle));
        }
        Ok(object)
    }

    /// Drop the table's reference; the object lives on while pinned elsewhere
    pub fn close(&self, handle: Handle) -> PalResult<()> {
        match self.objects.remove(&handle) {
            Some(_) => {
                self.free_handles.push(handle);
                debug!(handle = %handle, "handle closed");
                Ok(())
            }
            None => {
                warn!(handle = %handle, "close of unknown handle");
                Err(PalError::InvalidHandle(handle))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry for HandleTable {
    type Object = PalObject;

    fn reference_objects(
        &self,
        handles: &[Handle],
        allowed: AllowedObjectTypes,
        objects: &mut WaitArray<Arc<PalObject>>,
    ) -> PalResult<()> {
        for &handle in handles {
            let pinned = self.get(handle, allowed).and_then(|object| {
                objects.push(object)?;
                Ok(())
            });
            if let Err(e) = pinned {
                objects.clear();
                return Err(e);
            }
        }
        Ok(())
    }
}
