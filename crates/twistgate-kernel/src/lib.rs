//! `twistgate-kernel` – Mode Arbitration & Fail-Safe
//!
//! Decides which command source drives the vehicle and stops it when that
//! source goes quiet.  It does not talk to any transport; outputs leave
//! through the [`OutputSink`] trait.
//!
//! # Modules
//!
//! - [`command_buffer`] – [`CommandBuffer`][command_buffer::CommandBuffer]:
//!   the persistent merged [`VehicleCommand`][twistgate_types::VehicleCommand]
//!   and its sequence counter.
//! - [`arbiter`] – [`ModeArbiter`][arbiter::ModeArbiter]: applies remote and
//!   autonomous fragments to the buffer, gated on the current control mode.
//! - [`watchdog`] – [`WatchdogMonitor`][watchdog::WatchdogMonitor]: the
//!   periodic liveness check that announces mode changes and latches the
//!   emergency stop.
//! - [`sink`] – [`OutputSink`][sink::OutputSink]: where merged commands,
//!   emergency flags and mode announcements are delivered.
//!
//! # Shared state
//!
//! The arbiter and the watchdog share one [`GateState`][state::GateState]
//! behind a single mutex.  Every operation takes the lock once, performs its
//! whole read-modify-emit sequence, and releases it, so emissions leave in
//! sequence order and a mode forced by the watchdog is seen by the very next
//! fragment.  Build the pair with [`gate`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use twistgate_kernel::{gate, OutputSink};
//! use twistgate_types::{AccelFragment, AutonomousFragment, Header, VehicleCommand};
//!
//! struct Discard;
//! impl OutputSink for Discard {
//!     fn publish_vehicle_cmd(&self, _: &VehicleCommand) {}
//!     fn publish_emergency_stop(&self, _: bool) {}
//!     fn publish_ctrl_mode(&self, _: &str) {}
//! }
//!
//! let (arbiter, watchdog) = gate(Arc::new(Discard), Duration::from_secs(1));
//! let accepted = arbiter.apply_autonomous_fragment(&AutonomousFragment::Accel(AccelFragment {
//!     header: Header::default(),
//!     accel: 0.4,
//! }));
//! assert!(accepted);
//! assert_eq!(arbiter.snapshot().command.sequence, 1);
//! assert!(!watchdog.tick().emergency());
//! ```

pub mod arbiter;
pub mod command_buffer;
pub mod sink;
pub mod state;
pub mod watchdog;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use arbiter::ModeArbiter;
pub use command_buffer::CommandBuffer;
pub use sink::OutputSink;
pub use state::GateSnapshot;
pub use watchdog::{TickReport, WatchdogMonitor, DEFAULT_REMOTE_TIMEOUT, DEFAULT_TICK_PERIOD};

/// Build an arbiter and a watchdog over the same freshly initialised state.
///
/// The control mode starts autonomous, the emergency latch starts clear and
/// the liveness timestamp starts at the moment of the call.
pub fn gate(sink: Arc<dyn OutputSink>, remote_timeout: Duration) -> (ModeArbiter, WatchdogMonitor) {
    let core = Arc::new(state::GateCore::new(sink, Instant::now()));
    (
        ModeArbiter::new(Arc::clone(&core)),
        WatchdogMonitor::new(core, remote_timeout),
    )
}
