//! State shared by the arbiter and the watchdog.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use twistgate_types::{ControlMode, VehicleCommand};

use crate::command_buffer::CommandBuffer;
use crate::sink::OutputSink;

/// Everything the arbiter and the watchdog read or write.
///
/// Only ever touched through [`GateCore::lock`].
#[derive(Debug)]
pub(crate) struct GateState {
    /// Current control mode.
    pub(crate) mode: ControlMode,
    /// Mode seen by the previous watchdog tick; drives the edge-triggered
    /// announcement.
    pub(crate) announced_mode: ControlMode,
    /// When the last remote fragment arrived.
    pub(crate) last_remote_at: Instant,
    /// Stop request carried by the most recent remote fragment.
    pub(crate) stop_requested: bool,
    /// Sticky emergency latch.  Once set nothing in this crate clears it.
    pub(crate) emergency_latched: bool,
    pub(crate) buffer: CommandBuffer,
}

/// The lock plus the sink every emission goes to.
pub(crate) struct GateCore {
    state: Mutex<GateState>,
    pub(crate) sink: Arc<dyn OutputSink>,
}

impl GateCore {
    pub(crate) fn new(sink: Arc<dyn OutputSink>, started_at: Instant) -> Self {
        Self {
            state: Mutex::new(GateState {
                mode: ControlMode::Autonomous,
                announced_mode: ControlMode::Autonomous,
                last_remote_at: started_at,
                stop_requested: false,
                emergency_latched: false,
                buffer: CommandBuffer::new(),
            }),
            sink,
        }
    }

    /// Enter the critical section.
    ///
    /// A panic inside a sink poisons the mutex; the state itself is still
    /// consistent at that point (emission is always the last step), so the
    /// guard is recovered instead of propagating the panic to every caller.
    pub(crate) fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> GateSnapshot {
        let state = self.lock();
        GateSnapshot {
            mode: state.mode,
            stop_requested: state.stop_requested,
            emergency_latched: state.emergency_latched,
            command: state.buffer.current().clone(),
        }
    }
}

/// Point-in-time copy of the gate state, taken under the lock.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSnapshot {
    pub mode: ControlMode,
    pub stop_requested: bool,
    pub emergency_latched: bool,
    pub command: VehicleCommand,
}
