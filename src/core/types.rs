/*!
 * Core Types
 * Common types used across the compatibility layer
 */

use super::limits::{FIRST_HANDLE_VALUE, INFINITE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Opaque, process-local name for a synchronization object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u32);

impl Handle {
    /// Never resolves
    pub const NULL: Handle = Handle(0);

    /// Never resolves (`INVALID_HANDLE_VALUE`)
    pub const INVALID: Handle = Handle(u32::MAX);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for values the handle table never hands out
    #[inline]
    pub const fn is_sentinel(self) -> bool {
        self.0 < FIRST_HANDLE_VALUE || self.0 == u32::MAX
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of a thread known to the compatibility layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

impl ThreadId {
    /// Allocate a process-unique thread id
    pub fn next() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long a wait may block
///
/// `Millis(0)` polls; `Infinite` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeout {
    Millis(u32),
    Infinite,
}

impl Timeout {
    /// Check the objects and return without blocking
    pub const POLL: Timeout = Timeout::Millis(0);

    /// Interpret a raw millisecond count, honoring the `INFINITE` sentinel
    #[inline]
    pub const fn from_millis(ms: u32) -> Self {
        if ms == INFINITE {
            Timeout::Infinite
        } else {
            Timeout::Millis(ms)
        }
    }

    /// Raw millisecond count, `INFINITE` for no timeout
    #[inline]
    pub const fn as_millis(self) -> u32 {
        match self {
            Timeout::Millis(ms) => ms,
            Timeout::Infinite => INFINITE,
        }
    }

    #[inline]
    pub const fn is_poll(self) -> bool {
        matches!(self, Timeout::Millis(0))
    }

    /// `None` when the wait never expires
    #[inline]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Timeout::Millis(ms) => Some(Duration::from_millis(u64::from(ms))),
            Timeout::Infinite => None,
        }
    }
}

impl From<Duration> for Timeout {
    /// Saturates just below the `INFINITE` sentinel
    fn from(duration: Duration) -> Self {
        let ms = duration.as_millis().min(u128::from(INFINITE - 1)) as u32;
        Timeout::Millis(ms)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Millis(ms) => write!(f, "{}ms", ms),
            Timeout::Infinite => write!(f, "infinite"),
        }
    }
}
