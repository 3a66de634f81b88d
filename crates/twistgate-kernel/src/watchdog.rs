//! [`WatchdogMonitor`] – the periodic fail-safe check.
//!
//! The monitor owns no timer.  Something outside the kernel calls
//! [`WatchdogMonitor::tick`] on a fixed period ([`DEFAULT_TICK_PERIOD`] in
//! the reference setup).  Each tick, under the shared state lock:
//!
//! 1. **Announce** – if the mode differs from the one seen last tick, publish
//!    its name.  Edge-triggered: an unchanged mode is never re-announced.
//! 2. **Liveness** – in remote mode, a gap longer than the remote timeout
//!    since the last operator fragment raises an emergency.
//! 3. **Stop request** – a stop requested by the operator raises an
//!    emergency.
//! 4. **Fail-safe** – on emergency the mode is forced to autonomous, the
//!    latch is set and the emergency flag is published.  This repeats every
//!    tick for as long as a trigger holds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use twistgate_types::ControlMode;

use crate::state::GateCore;

/// Reference watchdog period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);

/// Reference operator silence tolerated in remote mode.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(1);

/// What a single tick observed and did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Mode name announced this tick, if the mode changed.
    pub announced: Option<&'static str>,
    /// Remote mode with no operator fragment for longer than the timeout.
    pub lost_communication: bool,
    /// The operator's stop request was set.
    pub stop_requested: bool,
}

impl TickReport {
    /// Whether this tick engaged the emergency stop.
    pub fn emergency(&self) -> bool {
        self.lost_communication || self.stop_requested
    }
}

/// Liveness and stop-request monitor sharing state with a
/// [`ModeArbiter`][crate::arbiter::ModeArbiter].
pub struct WatchdogMonitor {
    core: Arc<GateCore>,
    remote_timeout: Duration,
}

impl WatchdogMonitor {
    pub(crate) fn new(core: Arc<GateCore>, remote_timeout: Duration) -> Self {
        Self {
            core,
            remote_timeout,
        }
    }

    /// Maximum tolerated operator silence in remote mode.
    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    /// Run one check against the current time.
    pub fn tick(&self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Run one check as if the current time were `now`.
    pub fn tick_at(&self, now: Instant) -> TickReport {
        let mut state = self.core.lock();
        let mut report = TickReport::default();

        if state.mode != state.announced_mode {
            let name = state.mode.announcement();
            info!(from = %state.announced_mode, to = %state.mode, "control mode changed");
            self.core.sink.publish_ctrl_mode(name);
            state.announced_mode = state.mode;
            report.announced = Some(name);
        }

        if state.mode == ControlMode::Remote {
            let silence = now.saturating_duration_since(state.last_remote_at);
            if silence > self.remote_timeout {
                warn!(
                    silence_ms = silence.as_millis() as u64,
                    timeout_ms = self.remote_timeout.as_millis() as u64,
                    "lost communication with remote operator"
                );
                report.lost_communication = true;
            }
        }

        if state.stop_requested {
            warn!("emergency stop requested by remote operator");
            report.stop_requested = true;
        }

        if report.emergency() {
            state.mode = ControlMode::Autonomous;
            state.emergency_latched = true;
            self.core.sink.publish_emergency_stop(true);
            warn!("emergency stop engaged; control returned to autonomous");
        }

        report
    }

    /// Whether the emergency latch has been set.
    pub fn emergency_latched(&self) -> bool {
        self.core.lock().emergency_latched
    }
}
