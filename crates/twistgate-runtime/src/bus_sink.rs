//! [`BusSink`] – delivers gate outputs onto the [`EventBus`].

use tracing::warn;
use twistgate_kernel::OutputSink;
use twistgate_middleware::EventBus;
use twistgate_types::{Event, EventPayload, VehicleCommand};

const SOURCE: &str = "twistgate-runtime::gate";

/// [`OutputSink`] that wraps every output in an [`Event`] and publishes it
/// on the matching bus topic.
pub struct BusSink {
    bus: EventBus,
}

impl BusSink {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    fn emit(&self, payload: EventPayload) {
        if let Err(e) = self.bus.publish(Event::new(SOURCE, payload)) {
            warn!(error = %e, "failed to publish gate output");
        }
    }
}

impl OutputSink for BusSink {
    fn publish_vehicle_cmd(&self, command: &VehicleCommand) {
        self.emit(EventPayload::VehicleCmd(command.clone()));
    }

    fn publish_emergency_stop(&self, engaged: bool) {
        self.emit(EventPayload::EmergencyStop(engaged));
    }

    fn publish_ctrl_mode(&self, mode_name: &str) {
        self.emit(EventPayload::CtrlMode(mode_name.to_string()));
    }
}
