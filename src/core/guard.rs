/*!
 * Scoped Wait Resources
 *
 * Pinned object references, wait controllers and thread termination signaling
 * are owned by guards: whatever a wait call or a thread body acquires is given
 * back when its guard drops, on every exit path.
 *
 * Implementors:
 *
 * - **WaitArray**: pinned objects and controllers of one wait call. The
 *   controller array is released early, before the caller blocks.
 * - **TerminationGuard**: abandons owned mutexes and signals the thread
 *   object when a PAL thread body returns or unwinds.
 */

use crate::core::types::ThreadId;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Guard capacity exceeded: {len} of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },
}

/// Where and when a guard was taken
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub thread: Option<ThreadId>,
    pub capacity: usize,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            thread: None,
            capacity: 0,
        }
    }

    #[inline]
    pub fn with_thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Number of handles the guarded wait call was sized for
    #[inline]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}

/// Owner of resources acquired for a wait call or a thread lifetime
pub trait Guard {
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// False once the resources have been given back
    fn is_active(&self) -> bool;

    /// Give the resources back before the guard goes out of scope
    ///
    /// A second call fails with `AlreadyReleased` and touches nothing.
    fn release(&mut self) -> GuardResult<()>;
}

/// Drop-time release, split out so it can be traced
pub trait GuardDrop: Guard {
    /// Release whatever `release` has not; must not panic
    fn on_drop(&mut self);
}
