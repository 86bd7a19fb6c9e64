/*!
 * Synchronization Configuration
 *
 * Runtime tuning for how a blocked thread waits
 */

use crate::core::limits::{DEFAULT_MAX_SPINS, DEFAULT_SPIN_DURATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking configuration
///
/// A waiter first spins with adaptive backoff, then parks on its condvar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Spin duration before parking
    pub spin_duration: Duration,
    /// Maximum spin iterations before parking
    pub max_spins: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spin_duration: DEFAULT_SPIN_DURATION,
            max_spins: DEFAULT_MAX_SPINS,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms wait expected)
    pub const fn low_latency() -> Self {
        Self {
            spin_duration: Duration::from_micros(50),
            max_spins: 500,
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            spin_duration: Duration::from_micros(1),
            max_spins: 10,
        }
    }

    /// Park immediately without spinning
    pub const fn no_spin() -> Self {
        Self {
            spin_duration: Duration::ZERO,
            max_spins: 0,
        }
    }

    /// Whether the spin phase runs at all
    #[inline]
    pub fn spins(&self) -> bool {
        self.max_spins > 0 && !self.spin_duration.is_zero()
    }
}
