/*!
 * Thread Parker
 *
 * One-shot wake slot for a single blocked thread, built on
 * parking_lot::Mutex + Condvar.
 *
 * # Protocol
 *
 * The owning thread `arm()`s the parker, publishes itself to signalers, then
 * `park()`s. A signaler calls `unpark(value)`, which only succeeds while the
 * parker is armed, so at most one value is ever delivered per wait. The owner
 * finishes with `disarm()`, which returns the delivered value (if any) and
 * closes the slot. Because `unpark` and `disarm` serialize on the same mutex,
 * a value is either delivered before `disarm` or rejected after it; a waiter
 * that gives up can never lose a wakeup that a signaler believed it delivered.
 */

use super::config::SyncConfig;
use super::spinwait::spin_until;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParkState<T> {
    Idle,
    Armed,
    Notified(T),
}

/// Wake slot for one thread
pub struct ThreadParker<T: Copy> {
    state: Mutex<ParkState<T>>,
    condvar: Condvar,
    /// Lock-free mirror of `Notified` for the spin phase
    notified: AtomicBool,
}

impl<T: Copy> ThreadParker<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ParkState::Idle),
            condvar: Condvar::new(),
            notified: AtomicBool::new(false),
        }
    }

    /// Open the slot for a new wait
    ///
    /// Returns false if the slot is already armed or holds an unconsumed value.
    pub fn arm(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ParkState::Idle => {
                *state = ParkState::Armed;
                self.notified.store(false, Ordering::Release);
                true
            }
            ParkState::Armed => true,
            ParkState::Notified(_) => false,
        }
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        matches!(*self.state.lock(), ParkState::Armed)
    }

    /// Deliver `value` to an armed parker and wake it
    ///
    /// Returns false if the parker is idle or already notified.
    pub fn unpark(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, ParkState::Armed) {
            return false;
        }
        *state = ParkState::Notified(value);
        self.notified.store(true, Ordering::Release);
        self.condvar.notify_one();
        true
    }

    /// Block until notified or `deadline` passes
    ///
    /// Returns true if a value was delivered. Does not consume it.
    pub fn park(&self, deadline: Option<Instant>, config: &SyncConfig) -> bool {
        if spin_until(config, deadline, || self.notified.load(Ordering::Acquire)) {
            return true;
        }

        let mut state = self.state.lock();
        loop {
            match *state {
                ParkState::Notified(_) => return true,
                ParkState::Idle => return false,
                ParkState::Armed => {}
            }
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut state, deadline).timed_out() {
                        return matches!(*state, ParkState::Notified(_));
                    }
                }
                None => self.condvar.wait(&mut state),
            }
        }
    }

    /// Close the slot, returning the delivered value if there is one
    pub fn disarm(&self) -> Option<T> {
        let mut state = self.state.lock();
        let value = match *state {
            ParkState::Notified(value) => Some(value),
            _ => None,
        };
        *state = ParkState::Idle;
        self.notified.store(false, Ordering::Release);
        value
    }
}

impl<T: Copy> Default for ThreadParker<T> {
    fn default() -> Self {
        Self::new()
    }
}
