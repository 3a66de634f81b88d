//! `twistgate-runtime` – The Running Gate
//!
//! Puts the kernel to work inside a Tokio process.
//!
//! # Modules
//!
//! - [`service`] – [`TwistGate`][service::TwistGate]: owns the arbiter, the
//!   watchdog task and the output bus, and pumps input adapters into the
//!   arbiter.
//! - [`bus_sink`] – [`BusSink`][bus_sink::BusSink]: the kernel's
//!   [`OutputSink`][twistgate_kernel::OutputSink] backed by the event bus.
//! - [`config`] – [`GateConfig`][config::GateConfig]: watchdog period, remote
//!   timeout and bus capacity.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod bus_sink;
pub mod config;
pub mod service;
pub mod telemetry;

pub use bus_sink::BusSink;
pub use config::GateConfig;
pub use service::{PumpStats, TwistGate, WatchdogHandle, pump};
pub use telemetry::{TracerProviderGuard, init_tracing};

// Re-exported so binaries can hold arbiter handles without a direct
// dependency on twistgate-kernel.
pub use twistgate_kernel::{GateSnapshot, ModeArbiter};
