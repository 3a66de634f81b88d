//! [`OutputSink`] – the gate's only way out.
//!
//! Implementations forward outputs to whatever transport the process uses.
//! Calls are made while the gate's state lock is held, so they must be
//! short and must not block; they are also infallible from the gate's point
//! of view, and a sink that can fail is expected to log and carry on.

use twistgate_types::VehicleCommand;

/// Receiver of everything the arbiter and the watchdog emit.
pub trait OutputSink: Send + Sync {
    /// A merged command snapshot, once per accepted fragment.
    fn publish_vehicle_cmd(&self, command: &VehicleCommand);

    /// The emergency-stop flag, once per watchdog tick while an emergency
    /// condition holds.
    fn publish_emergency_stop(&self, engaged: bool);

    /// The control-mode name (`"AUTO"`, `"REMOTE"` or `"UNDEFINED"`), once
    /// per mode change.
    fn publish_ctrl_mode(&self, mode_name: &str);
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// One recorded emission.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Output {
        VehicleCmd(VehicleCommand),
        EmergencyStop(bool),
        CtrlMode(String),
    }

    /// Sink that remembers every emission in order.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        outputs: Mutex<Vec<Output>>,
    }

    impl RecordingSink {
        pub(crate) fn outputs(&self) -> Vec<Output> {
            self.outputs.lock().unwrap().clone()
        }

        pub(crate) fn commands(&self) -> Vec<VehicleCommand> {
            self.outputs()
                .into_iter()
                .filter_map(|o| match o {
                    Output::VehicleCmd(cmd) => Some(cmd),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn mode_names(&self) -> Vec<String> {
            self.outputs()
                .into_iter()
                .filter_map(|o| match o {
                    Output::CtrlMode(name) => Some(name),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn emergency_count(&self) -> usize {
            self.outputs()
                .iter()
                .filter(|o| matches!(o, Output::EmergencyStop(true)))
                .count()
        }

        pub(crate) fn clear(&self) {
            self.outputs.lock().unwrap().clear();
        }
    }

    impl OutputSink for RecordingSink {
        fn publish_vehicle_cmd(&self, command: &VehicleCommand) {
            self.outputs
                .lock()
                .unwrap()
                .push(Output::VehicleCmd(command.clone()));
        }

        fn publish_emergency_stop(&self, engaged: bool) {
            self.outputs
                .lock()
                .unwrap()
                .push(Output::EmergencyStop(engaged));
        }

        fn publish_ctrl_mode(&self, mode_name: &str) {
            self.outputs
                .lock()
                .unwrap()
                .push(Output::CtrlMode(mode_name.to_string()));
        }
    }
}
