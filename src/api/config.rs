/*!
 * PAL Configuration
 * Bundles blocking and wait-policy settings, optionally read from the environment
 */

use crate::core::sync::SyncConfig;
use crate::synch::WaitPolicy;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PalConfig {
    pub sync: SyncConfig,
    pub policy: WaitPolicy,
}

impl PalConfig {
    /// Every object kind waitable, multi-object waits enabled
    pub fn full() -> Self {
        Self {
            sync: SyncConfig::default(),
            policy: WaitPolicy::full(),
        }
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read overrides from the process environment
    ///
    /// Environment variables:
    /// - PAL_WAIT_POLICY: `restricted` (default) or `full`
    /// - PAL_SPIN: `default`, `low_latency`, `long_wait` or `none`
    /// - PAL_SPIN_MAX: maximum spin iterations before parking
    /// - PAL_SPIN_US: spin duration in microseconds
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(policy) = lookup("PAL_WAIT_POLICY") {
            match policy.as_str() {
                "full" => config.policy = WaitPolicy::full(),
                "restricted" => config.policy = WaitPolicy::restricted(),
                other => warn!(value = other, "unknown PAL_WAIT_POLICY, using restricted"),
            }
        }

        if let Some(preset) = lookup("PAL_SPIN") {
            match preset.as_str() {
                "default" => config.sync = SyncConfig::default(),
                "low_latency" => config.sync = SyncConfig::low_latency(),
                "long_wait" => config.sync = SyncConfig::long_wait(),
                "none" => config.sync = SyncConfig::no_spin(),
                other => warn!(value = other, "unknown PAL_SPIN preset"),
            }
        }

        if let Some(raw) = lookup("PAL_SPIN_MAX") {
            match raw.parse::<u32>() {
                Ok(value) => config.sync.max_spins = value,
                Err(e) => warn!(value = %raw, error = %e, "invalid PAL_SPIN_MAX"),
            }
        }

        if let Some(raw) = lookup("PAL_SPIN_US") {
            match raw.parse::<u64>() {
                Ok(value) => config.sync.spin_duration = Duration::from_micros(value),
                Err(e) => warn!(value = %raw, error = %e, "invalid PAL_SPIN_US"),
            }
        }

        config
    }
}
