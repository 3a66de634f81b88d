//! [`TwistGate`] – a running gate.
//!
//! Wires the kernel to the outside world:
//!
//! * outputs go through a [`BusSink`] onto an [`EventBus`];
//! * the [`WatchdogMonitor`] runs on its own Tokio task, ticking every
//!   `watchdog_period_ms`, reachable through a [`WatchdogHandle`];
//! * each input adapter is pumped into the [`ModeArbiter`] by [`pump`],
//!   one task per source so per-source arrival order is kept.
//!
//! # Example
//!
//! ```rust,no_run
//! use twistgate_middleware::JsonLinesSource;
//! use twistgate_runtime::{GateConfig, TwistGate};
//!
//! # async fn run() {
//! let gate = TwistGate::new(GateConfig::default());
//! let watchdog = gate.spawn_watchdog();
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! gate.spawn_source(Box::new(JsonLinesSource::new("stdin", stdin)));
//! // ... later
//! watchdog.shutdown().await;
//! # }
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};
use twistgate_kernel::{ModeArbiter, WatchdogMonitor, gate};
use twistgate_middleware::{EventBus, FragmentSource};

use crate::bus_sink::BusSink;
use crate::config::GateConfig;

/// The gate plus the bus its outputs are published on.
pub struct TwistGate {
    config: GateConfig,
    bus: EventBus,
    arbiter: ModeArbiter,
    watchdog: Arc<WatchdogMonitor>,
}

impl TwistGate {
    /// Build a gate with a fresh bus of `config.bus_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `config.bus_capacity` is zero; run
    /// [`GateConfig::validate`] first.
    pub fn new(config: GateConfig) -> Self {
        let bus = EventBus::new(config.bus_capacity);
        let sink = Arc::new(BusSink::new(bus.clone()));
        let (arbiter, watchdog) = gate(sink, config.remote_timeout());
        info!(
            watchdog_period_ms = config.watchdog_period_ms,
            remote_timeout_ms = config.remote_timeout_ms,
            "twist gate initialised in AUTO mode"
        );
        Self {
            config,
            bus,
            arbiter,
            watchdog: Arc::new(watchdog),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The bus every output is published on.  Subscribe before feeding
    /// fragments to see all of them.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// A handle for direct fragment delivery, e.g. from transport callbacks.
    pub fn arbiter(&self) -> ModeArbiter {
        self.arbiter.clone()
    }

    /// Start the periodic watchdog task.
    ///
    /// The task never finishes on its own; stop it with
    /// [`WatchdogHandle::shutdown`].
    pub fn spawn_watchdog(&self) -> WatchdogHandle {
        let watchdog = Arc::clone(&self.watchdog);
        let period = self.config.watchdog_period();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                watchdog.tick();
            }
        });
        WatchdogHandle { handle }
    }

    /// Pump `source` into the arbiter on its own task.
    pub fn spawn_source(&self, source: Box<dyn FragmentSource>) -> JoinHandle<PumpStats> {
        tokio::spawn(pump(self.arbiter.clone(), source))
    }
}

/// Owner of the spawned watchdog task.
pub struct WatchdogHandle {
    handle: JoinHandle<()>,
}

impl WatchdogHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end.  It only ends if aborted or if it panicked.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }

    /// Abort the task and wait until it is gone.
    pub async fn shutdown(self) {
        self.handle.abort();
        match self.handle.await {
            Err(e) if e.is_panic() => tracing::error!(error = %e, "watchdog task panicked"),
            _ => debug!("watchdog task stopped"),
        }
    }
}

/// Counters returned when a source's stream ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Fragments decoded by the adapter.
    pub received: u64,
    /// Fragments the arbiter accepted and emitted.
    pub accepted: u64,
}

/// Feed every fragment of `source` into `arbiter`, in order, until the
/// stream ends.
#[instrument(skip_all, fields(source = %source.name()))]
pub async fn pump(arbiter: ModeArbiter, source: Box<dyn FragmentSource>) -> PumpStats {
    let mut fragments = source.fragments().await;
    let mut stats = PumpStats::default();
    while let Some(fragment) = fragments.next().await {
        stats.received += 1;
        if arbiter.apply(&fragment) {
            stats.accepted += 1;
        }
    }
    info!(
        received = stats.received,
        accepted = stats.accepted,
        "fragment source closed"
    );
    stats
}
