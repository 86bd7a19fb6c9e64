/*!
 * Adaptive Spin-Wait with Exponential Backoff
 *
 * Bounded spinning used before a waiter parks. A signal that arrives within
 * a few microseconds of registration is picked up without a condvar round trip.
 *
 * Three phases:
 *
 * 1. **Tight spin**: `spin_loop()` hint
 * 2. **Yield**: `yield_now()` every iteration
 * 3. **Backoff**: exponentially increasing sleep, capped
 */

use super::config::SyncConfig;
use crate::core::limits::{SPIN_MAX_BACKOFF, SPIN_TIGHT_ITERATIONS, SPIN_YIELD_ITERATIONS};
use std::thread;
use std::time::{Duration, Instant};

/// Spin until `check` returns true or the configured budget runs out
///
/// Returns the final value of `check`. Never spins past `deadline`.
pub fn spin_until(config: &SyncConfig, deadline: Option<Instant>, check: impl Fn() -> bool) -> bool {
    if check() {
        return true;
    }
    if !config.spins() {
        return false;
    }

    let start = Instant::now();
    let mut spin_count = 0u32;
    let mut backoff = Duration::from_nanos(1);

    loop {
        if start.elapsed() >= config.spin_duration || spin_count >= config.max_spins {
            return check();
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return check();
        }

        if spin_count < SPIN_TIGHT_ITERATIONS {
            std::hint::spin_loop();
        } else if spin_count < SPIN_YIELD_ITERATIONS {
            thread::yield_now();
        } else {
            thread::sleep(backoff);
            backoff = (backoff * 2).min(SPIN_MAX_BACKOFF);
        }

        if check() {
            return true;
        }
        spin_count += 1;
    }
}
