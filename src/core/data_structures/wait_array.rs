/*!
 * Wait Set Working Arrays
 *
 * Per-call storage for pinned objects and wait controllers.
 *
 * # Design: Inline Below a Threshold, Heap Above It
 *
 * Most waits name one or a few objects. Those keep their working set in a
 * fixed inline buffer so the hot path never allocates. Larger sets (up to
 * `MAXIMUM_WAIT_OBJECTS`) go to a heap buffer reserved up front, which keeps
 * worst-case stack frames small. Reservation failure is reported instead of
 * aborting the process.
 */

use crate::core::errors::PalResult;
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::limits::MAXIMUM_STACK_WAITOBJ_ARRAY_SIZE;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};

/// Fixed-size inline buffer
///
/// # Type Parameters
/// - `T`: Element type
/// - `N`: Buffer capacity (compile-time constant)
pub struct FixedBuffer<T, const N: usize> {
    data: [MaybeUninit<T>; N],
    len: usize,
}

impl<T, const N: usize> FixedBuffer<T, N> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            // SAFETY: an array of MaybeUninit needs no initialization
            data: unsafe { MaybeUninit::<[MaybeUninit<T>; N]>::uninit().assume_init() },
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn capacity() -> usize {
        N
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push an element, handing it back if the buffer is full
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.len < N {
            self.data[self.len].write(value);
            self.len += 1;
            Ok(())
        } else {
            Err(value)
        }
    }

    /// Drop every element in index order
    pub fn clear(&mut self) {
        let len = self.len;
        // Shrink first so a panicking destructor cannot cause a double drop
        self.len = 0;
        for slot in &mut self.data[..len] {
            // SAFETY: slots below the old len were initialized by push
            unsafe { slot.assume_init_drop() };
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first len slots are initialized
        unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const T, self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first len slots are initialized
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut T, self.len) }
    }
}

impl<T, const N: usize> Default for FixedBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for FixedBuffer<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}

enum Storage<T> {
    Inline(FixedBuffer<T, MAXIMUM_STACK_WAITOBJ_ARRAY_SIZE>),
    Heap(Vec<T>),
}

/// Working array for one wait call
///
/// Capacity is fixed at construction to the request's handle count. Dropping
/// the array (or calling [`Guard::release`]) drops every element exactly once,
/// which is how pinned object references and wait controllers are returned.
pub struct WaitArray<T> {
    storage: Storage<T>,
    capacity: usize,
    released: bool,
    metadata: GuardMetadata,
}

impl<T> WaitArray<T> {
    /// Reserve room for `capacity` elements
    ///
    /// Small capacities stay inline; larger ones allocate once, failing with
    /// `NotEnoughMemory` if the reservation cannot be satisfied.
    pub fn with_capacity(capacity: usize) -> PalResult<Self> {
        let storage = if capacity <= MAXIMUM_STACK_WAITOBJ_ARRAY_SIZE {
            Storage::Inline(FixedBuffer::new())
        } else {
            let mut heap = Vec::new();
            heap.try_reserve_exact(capacity)?;
            Storage::Heap(heap)
        };

        Ok(Self {
            storage,
            capacity,
            released: false,
            metadata: GuardMetadata::new("wait_array").with_capacity(capacity),
        })
    }

    /// Append an element; never grows past the reserved capacity
    pub fn push(&mut self, value: T) -> GuardResult<()> {
        let len = self.len();
        if len >= self.capacity {
            return Err(GuardError::CapacityExceeded {
                len,
                capacity: self.capacity,
            });
        }

        match &mut self.storage {
            Storage::Inline(buffer) => buffer.push(value).map_err(|_| GuardError::CapacityExceeded {
                len,
                capacity: MAXIMUM_STACK_WAITOBJ_ARRAY_SIZE,
            })?,
            Storage::Heap(heap) => heap.push(value),
        }
        self.released = false;
        Ok(())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when the elements live in the inline buffer
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// Drop all elements, keeping the reservation
    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Inline(buffer) => buffer.clear(),
            Storage::Heap(heap) => heap.clear(),
        }
    }
}

impl<T> Deref for WaitArray<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        match &self.storage {
            Storage::Inline(buffer) => buffer.as_slice(),
            Storage::Heap(heap) => heap.as_slice(),
        }
    }
}

impl<T> DerefMut for WaitArray<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Inline(buffer) => buffer.as_mut_slice(),
            Storage::Heap(heap) => heap.as_mut_slice(),
        }
    }
}

impl<T> Guard for WaitArray<T> {
    fn resource_type(&self) -> &'static str {
        if self.is_inline() {
            "wait_array_inline"
        } else {
            "wait_array_heap"
        }
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        !self.released
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.released {
            return Err(GuardError::AlreadyReleased);
        }
        self.clear();
        self.released = true;
        Ok(())
    }
}

impl<T> GuardDrop for WaitArray<T> {
    fn on_drop(&mut self) {
        if !self.released {
            tracing::trace!(
                resource = self.resource_type(),
                len = self.len(),
                lifetime_us = self.metadata.lifetime_micros(),
                "releasing wait array"
            );
            self.clear();
            self.released = true;
        }
    }
}

impl<T> Drop for WaitArray<T> {
    fn drop(&mut self) {
        self.on_drop();
    }
}
