//! `twistgate-types` – shared vocabulary of the TwistGate workspace.
//!
//! Everything that crosses a crate boundary lives here: the control mode, the
//! merged [`VehicleCommand`], the decoded input fragments, the event envelope
//! carried on the bus, and the workspace-wide [`GateError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Control mode
// ────────────────────────────────────────────────────────────────────────────

/// Which command source is authoritative for actuation output.
///
/// Decoded from the raw integer carried by remote fragments.  Values outside
/// the known set are kept verbatim in [`ControlMode::Unrecognized`] rather
/// than coerced to one of the real modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ControlMode {
    /// The autonomous planner drives the vehicle.
    Autonomous,
    /// A remote human operator drives the vehicle.
    Remote,
    /// A raw mode value that maps to neither source.
    Unrecognized(i32),
}

impl ControlMode {
    /// Wire value of [`ControlMode::Autonomous`].
    pub const AUTONOMOUS_RAW: i32 = 1;
    /// Wire value of [`ControlMode::Remote`].
    pub const REMOTE_RAW: i32 = 2;

    /// Decode a raw mode value.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            Self::AUTONOMOUS_RAW => ControlMode::Autonomous,
            Self::REMOTE_RAW => ControlMode::Remote,
            other => ControlMode::Unrecognized(other),
        }
    }

    /// Encode back to the raw wire value.
    pub fn as_raw(self) -> i32 {
        match self {
            ControlMode::Autonomous => Self::AUTONOMOUS_RAW,
            ControlMode::Remote => Self::REMOTE_RAW,
            ControlMode::Unrecognized(raw) => raw,
        }
    }

    /// Name announced on the control-mode output when the mode changes.
    pub fn announcement(self) -> &'static str {
        match self {
            ControlMode::Autonomous => "AUTO",
            ControlMode::Remote => "REMOTE",
            ControlMode::Unrecognized(_) => "UNDEFINED",
        }
    }
}

impl From<i32> for ControlMode {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ControlMode> for i32 {
    fn from(mode: ControlMode) -> Self {
        mode.as_raw()
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::Unrecognized(raw) => write!(f, "UNDEFINED({raw})"),
            other => f.write_str(other.announcement()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Merged output
// ────────────────────────────────────────────────────────────────────────────

/// Source frame and time of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            frame_id: String::new(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// The merged actuation command handed to the vehicle interface.
///
/// A persistent accumulator: each accepted fragment overwrites only the
/// fields it owns and every other field keeps its last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommand {
    /// Incremented exactly once per accepted fragment.
    pub sequence: u64,
    pub header: Header,
    /// Twist-style linear velocity (m/s) from motion fragments.
    pub twist_linear: f64,
    /// Velocity target from trajectory tracking.  `-1.0` means "no target".
    pub linear_velocity_cmd: f64,
    /// Yaw rate (rad/s).
    pub angular_rate_cmd: f64,
    /// Planner / operator control sub-mode.
    pub mode_field: i32,
    pub gear: i32,
    pub blinker: i32,
    pub accel: f64,
    pub brake: f64,
    pub steer: f64,
    pub steering_angle: f64,
    pub emergency_flag: bool,
}

impl VehicleCommand {
    /// Sentinel stored in [`VehicleCommand::linear_velocity_cmd`] when no
    /// velocity target has been supplied.
    pub const NO_VELOCITY_TARGET: f64 = -1.0;
}

impl Default for VehicleCommand {
    fn default() -> Self {
        Self {
            sequence: 0,
            header: Header::default(),
            twist_linear: 0.0,
            linear_velocity_cmd: Self::NO_VELOCITY_TARGET,
            angular_rate_cmd: 0.0,
            mode_field: 0,
            gear: 0,
            blinker: 0,
            accel: 0.0,
            brake: 0.0,
            steer: 0.0,
            steering_angle: 0.0,
            emergency_flag: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input fragments
// ────────────────────────────────────────────────────────────────────────────

/// Operator command from the remote console.  Always processed; it is also
/// the channel through which the operator switches the control mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFragment {
    #[serde(flatten)]
    pub header: Header,
    pub requested_mode: ControlMode,
    #[serde(default)]
    pub emergency_request: bool,
    #[serde(default)]
    pub accel: f64,
    #[serde(default)]
    pub brake: f64,
    #[serde(default)]
    pub steer: f64,
    #[serde(default)]
    pub gear: i32,
    #[serde(default)]
    pub blinker: i32,
    #[serde(default)]
    pub control_submode: i32,
}

/// Twist command from the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionFragment {
    #[serde(flatten)]
    pub header: Header,
    pub linear_velocity: f64,
    pub angular_rate: f64,
}

/// Planner mode change.  A value of `0` or `-1` means "unset" and resets
/// the merged command before the new value is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerModeFragment {
    #[serde(flatten)]
    pub header: Header,
    pub mode_value: i32,
}

impl PlannerModeFragment {
    /// Whether this value clears the merged command.
    pub fn is_reset(&self) -> bool {
        self.mode_value == 0 || self.mode_value == -1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearFragment {
    pub gear: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelFragment {
    #[serde(flatten)]
    pub header: Header,
    pub accel: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteerFragment {
    #[serde(flatten)]
    pub header: Header,
    pub steer: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrakeFragment {
    #[serde(flatten)]
    pub header: Header,
    pub brake: f64,
}

/// Velocity and steering-angle targets from the trajectory tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFragment {
    #[serde(flatten)]
    pub header: Header,
    pub target_velocity: f64,
    pub target_steering_angle: f64,
}

/// A fragment produced by the autonomous stack.  Only authoritative while
/// the control mode is [`ControlMode::Autonomous`].
#[derive(Debug, Clone, PartialEq)]
pub enum AutonomousFragment {
    Motion(MotionFragment),
    PlannerMode(PlannerModeFragment),
    Gear(GearFragment),
    Accel(AccelFragment),
    Steer(SteerFragment),
    Brake(BrakeFragment),
    TrajectoryCmd(TrajectoryFragment),
}

impl AutonomousFragment {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AutonomousFragment::Motion(_) => "motion",
            AutonomousFragment::PlannerMode(_) => "planner_mode",
            AutonomousFragment::Gear(_) => "gear",
            AutonomousFragment::Accel(_) => "accel",
            AutonomousFragment::Steer(_) => "steer",
            AutonomousFragment::Brake(_) => "brake",
            AutonomousFragment::TrajectoryCmd(_) => "trajectory_cmd",
        }
    }
}

/// Any decoded fragment, as delivered by an input adapter.
///
/// On the wire the variant is selected by a `"kind"` field, e.g.
/// `{"kind": "accel", "frame_id": "base_link", "accel": 0.3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireFragment", into = "WireFragment")]
pub enum Fragment {
    Remote(RemoteFragment),
    Autonomous(AutonomousFragment),
}

impl Fragment {
    pub fn kind(&self) -> &'static str {
        match self {
            Fragment::Remote(_) => "remote",
            Fragment::Autonomous(fragment) => fragment.kind(),
        }
    }
}

/// Flat, internally tagged wire form of [`Fragment`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireFragment {
    Remote(RemoteFragment),
    Motion(MotionFragment),
    PlannerMode(PlannerModeFragment),
    Gear(GearFragment),
    Accel(AccelFragment),
    Steer(SteerFragment),
    Brake(BrakeFragment),
    TrajectoryCmd(TrajectoryFragment),
}

impl From<WireFragment> for Fragment {
    fn from(wire: WireFragment) -> Self {
        use AutonomousFragment as A;
        match wire {
            WireFragment::Remote(f) => Fragment::Remote(f),
            WireFragment::Motion(f) => Fragment::Autonomous(A::Motion(f)),
            WireFragment::PlannerMode(f) => Fragment::Autonomous(A::PlannerMode(f)),
            WireFragment::Gear(f) => Fragment::Autonomous(A::Gear(f)),
            WireFragment::Accel(f) => Fragment::Autonomous(A::Accel(f)),
            WireFragment::Steer(f) => Fragment::Autonomous(A::Steer(f)),
            WireFragment::Brake(f) => Fragment::Autonomous(A::Brake(f)),
            WireFragment::TrajectoryCmd(f) => Fragment::Autonomous(A::TrajectoryCmd(f)),
        }
    }
}

impl From<Fragment> for WireFragment {
    fn from(fragment: Fragment) -> Self {
        use AutonomousFragment as A;
        match fragment {
            Fragment::Remote(f) => WireFragment::Remote(f),
            Fragment::Autonomous(A::Motion(f)) => WireFragment::Motion(f),
            Fragment::Autonomous(A::PlannerMode(f)) => WireFragment::PlannerMode(f),
            Fragment::Autonomous(A::Gear(f)) => WireFragment::Gear(f),
            Fragment::Autonomous(A::Accel(f)) => WireFragment::Accel(f),
            Fragment::Autonomous(A::Steer(f)) => WireFragment::Steer(f),
            Fragment::Autonomous(A::Brake(f)) => WireFragment::Brake(f),
            Fragment::Autonomous(A::TrajectoryCmd(f)) => WireFragment::TrajectoryCmd(f),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the output bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "twistgate-runtime::sink"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// The three kinds of output the gate produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// Merged command snapshot, one per accepted fragment.
    VehicleCmd(VehicleCommand),
    /// Emergency-stop flag, repeated every watchdog tick while an emergency
    /// condition holds.
    EmergencyStop(bool),
    /// Control-mode name, published only when the mode changes.
    CtrlMode(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type for the fallible edges of the workspace: adapters, the bus,
/// and configuration loading.  The arbiter and watchdog never fail.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Fragment Decode Error: {0}")]
    Decode(String),

    #[error("Bus Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_mode_decodes_known_values() {
        assert_eq!(ControlMode::from_raw(1), ControlMode::Autonomous);
        assert_eq!(ControlMode::from_raw(2), ControlMode::Remote);
    }

    #[test]
    fn control_mode_keeps_unrecognized_values() {
        let mode = ControlMode::from_raw(7);
        assert_eq!(mode, ControlMode::Unrecognized(7));
        assert_eq!(mode.as_raw(), 7);
        assert_eq!(mode.announcement(), "UNDEFINED");
    }

    #[test]
    fn announcement_names() {
        assert_eq!(ControlMode::Autonomous.announcement(), "AUTO");
        assert_eq!(ControlMode::Remote.announcement(), "REMOTE");
    }

    #[test]
    fn default_command_has_no_velocity_target() {
        let cmd = VehicleCommand::default();
        assert_eq!(cmd.sequence, 0);
        assert_eq!(cmd.linear_velocity_cmd, -1.0);
        assert_eq!(cmd.accel, 0.0);
        assert!(!cmd.emergency_flag);
    }

    #[test]
    fn planner_mode_reset_values() {
        let fragment = |mode_value| PlannerModeFragment {
            header: Header::default(),
            mode_value,
        };
        assert!(fragment(0).is_reset());
        assert!(fragment(-1).is_reset());
        assert!(!fragment(1).is_reset());
    }

    #[test]
    fn remote_fragment_decodes_from_kind_tagged_json() {
        let json = r#"{
            "kind": "remote",
            "frame_id": "console",
            "timestamp": "2024-01-01T00:00:00Z",
            "requested_mode": 2,
            "accel": 0.3,
            "steer": 0.1
        }"#;
        let fragment: Fragment = serde_json::from_str(json).unwrap();
        match fragment {
            Fragment::Remote(remote) => {
                assert_eq!(remote.requested_mode, ControlMode::Remote);
                assert_eq!(remote.header.frame_id, "console");
                assert!((remote.accel - 0.3).abs() < f64::EPSILON);
                assert!(!remote.emergency_request);
            }
            other => panic!("unexpected fragment: {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_survives_json_decoding() {
        let json = r#"{"kind": "remote", "requested_mode": 5}"#;
        let fragment: Fragment = serde_json::from_str(json).unwrap();
        assert!(matches!(
            fragment,
            Fragment::Remote(RemoteFragment {
                requested_mode: ControlMode::Unrecognized(5),
                ..
            })
        ));
    }

    #[test]
    fn gear_fragment_needs_no_header() {
        let fragment: Fragment = serde_json::from_str(r#"{"kind": "gear", "gear": 3}"#).unwrap();
        assert_eq!(fragment.kind(), "gear");
        assert_eq!(
            fragment,
            Fragment::Autonomous(AutonomousFragment::Gear(GearFragment { gear: 3 }))
        );
    }

    #[test]
    fn trajectory_fragment_serializes_with_kind_tag() {
        let fragment = Fragment::Autonomous(AutonomousFragment::TrajectoryCmd(
            TrajectoryFragment {
                header: Header::default(),
                target_velocity: 4.0,
                target_steering_angle: -0.2,
            },
        ));
        let value = serde_json::to_value(&fragment).unwrap();
        assert_eq!(value["kind"], "trajectory_cmd");
        assert_eq!(value["target_velocity"], 4.0);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<Fragment, _> = serde_json::from_str(r#"{"kind": "warp_drive"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn event_payload_is_topic_tagged() {
        let event = Event::new("test", EventPayload::CtrlMode("REMOTE".into()));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["payload"]["topic"], "ctrl_mode");
        assert_eq!(value["payload"]["data"], "REMOTE");
    }

    #[test]
    fn gate_error_display() {
        let err = GateError::Decode("missing field `accel`".to_string());
        assert!(err.to_string().contains("Fragment Decode Error"));

        let io = GateError::from(std::io::Error::other("closed"));
        assert!(io.to_string().contains("closed"));
    }
}
