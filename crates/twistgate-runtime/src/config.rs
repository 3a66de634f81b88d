//! [`GateConfig`] – timing and capacity knobs for a running gate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use twistgate_kernel::{DEFAULT_REMOTE_TIMEOUT, DEFAULT_TICK_PERIOD};
use twistgate_middleware::bus::DEFAULT_CAPACITY;
use twistgate_types::GateError;

/// Configuration bundle for [`TwistGate`][crate::service::TwistGate].
///
/// Every field has a default, so an empty TOML table is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Watchdog period in milliseconds.
    #[serde(default = "default_watchdog_period_ms")]
    pub watchdog_period_ms: u64,

    /// Operator silence tolerated in remote mode, in milliseconds.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Per-topic capacity of the output bus.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_watchdog_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD.as_millis() as u64
}
fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT.as_millis() as u64
}
fn default_bus_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            watchdog_period_ms: default_watchdog_period_ms(),
            remote_timeout_ms: default_remote_timeout_ms(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl GateConfig {
    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Reject values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// [`GateError::Config`] for a zero period, timeout or bus capacity, or
    /// a timeout that is not longer than the period (it could never be
    /// observed between two ticks).
    pub fn validate(&self) -> Result<(), GateError> {
        if self.watchdog_period_ms == 0 {
            return Err(GateError::Config("watchdog_period_ms must be positive".into()));
        }
        if self.bus_capacity == 0 {
            return Err(GateError::Config("bus_capacity must be positive".into()));
        }
        if self.remote_timeout_ms <= self.watchdog_period_ms {
            return Err(GateError::Config(format!(
                "remote_timeout_ms ({}) must exceed watchdog_period_ms ({})",
                self.remote_timeout_ms, self.watchdog_period_ms
            )));
        }
        Ok(())
    }
}
