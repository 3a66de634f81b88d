//! [`ModeArbiter`] – merges command fragments under mode gating.
//!
//! Two entry points, one per source:
//!
//! | Source | Entry point | Authoritative when |
//! |--------|-------------|--------------------|
//! | Remote operator | [`ModeArbiter::apply_remote_fragment`] | always (it sets the mode) |
//! | Autonomous stack | [`ModeArbiter::apply_autonomous_fragment`] | mode is [`ControlMode::Autonomous`] |
//!
//! A fragment from a source that is not authoritative is dropped without an
//! error.  Every accepted fragment bumps the sequence number by one and is
//! emitted to the [`OutputSink`][crate::sink::OutputSink] exactly once,
//! inside the same critical section that mutated the buffer.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use twistgate_types::{AutonomousFragment, ControlMode, Fragment, RemoteFragment};

use crate::state::{GateCore, GateSnapshot};

/// Applies fragments from both command sources to the shared merged
/// command.
///
/// Cheap to clone; clones share the same state, so one handle can be given
/// to every transport callback thread.
#[derive(Clone)]
pub struct ModeArbiter {
    core: Arc<GateCore>,
}

impl ModeArbiter {
    pub(crate) fn new(core: Arc<GateCore>) -> Self {
        Self { core }
    }

    /// Route any decoded fragment to the matching entry point.
    ///
    /// Returns `true` when the fragment was accepted and emitted.
    pub fn apply(&self, fragment: &Fragment) -> bool {
        match fragment {
            Fragment::Remote(remote) => self.apply_remote_fragment(remote),
            Fragment::Autonomous(autonomous) => self.apply_autonomous_fragment(autonomous),
        }
    }

    /// Apply an operator fragment received now.
    pub fn apply_remote_fragment(&self, fragment: &RemoteFragment) -> bool {
        self.apply_remote_fragment_at(fragment, Instant::now())
    }

    /// Apply an operator fragment received at `received_at`.
    ///
    /// The stop request and the liveness timestamp are always recorded, the
    /// requested mode unless latched (see below).  Actuation fields are
    /// copied only when the resulting mode is [`ControlMode::Remote`].
    ///
    /// While the emergency latch is set the mode stays
    /// [`ControlMode::Autonomous`] whatever the operator requests: a latched
    /// gate never returns to remote control, so the requested mode is
    /// dropped even though liveness and the stop request are still recorded.
    pub fn apply_remote_fragment_at(&self, fragment: &RemoteFragment, received_at: Instant) -> bool {
        let mut state = self.core.lock();
        state.last_remote_at = received_at;
        state.stop_requested = fragment.emergency_request;

        if state.emergency_latched {
            if fragment.requested_mode != ControlMode::Autonomous {
                warn!(
                    requested = %fragment.requested_mode,
                    "emergency latched; ignoring remote mode request"
                );
            }
            return false;
        }

        state.mode = fragment.requested_mode;
        if state.mode != ControlMode::Remote {
            debug!(mode = %state.mode, "remote fragment recorded without actuation");
            return false;
        }

        let command = state.buffer.commit(Some(&fragment.header), |cmd| {
            cmd.twist_linear = fragment.accel;
            cmd.angular_rate_cmd = 0.0;
            cmd.steering_angle = fragment.steer;
            cmd.accel = fragment.accel;
            cmd.brake = fragment.brake;
            cmd.steer = fragment.steer;
            cmd.gear = fragment.gear;
            cmd.blinker = fragment.blinker;
            cmd.mode_field = fragment.control_submode;
            cmd.emergency_flag = fragment.emergency_request;
        });
        self.core.sink.publish_vehicle_cmd(command);
        true
    }

    /// Apply a fragment from the autonomous stack.
    ///
    /// A silent no-op unless the mode is [`ControlMode::Autonomous`].  Each
    /// kind touches only the fields it owns; a planner-mode value of `0` or
    /// `-1` first resets the whole command to its defaults.
    pub fn apply_autonomous_fragment(&self, fragment: &AutonomousFragment) -> bool {
        let mut state = self.core.lock();
        if state.mode != ControlMode::Autonomous {
            debug!(
                kind = fragment.kind(),
                mode = %state.mode,
                "dropping autonomous fragment; source not authoritative"
            );
            return false;
        }

        let buffer = &mut state.buffer;
        let command = match fragment {
            AutonomousFragment::Motion(f) => buffer.commit(Some(&f.header), |cmd| {
                cmd.twist_linear = f.linear_velocity;
                cmd.angular_rate_cmd = f.angular_rate;
            }),
            AutonomousFragment::PlannerMode(f) => {
                if f.is_reset() {
                    debug!(mode_value = f.mode_value, "planner mode unset; resetting command");
                    buffer.reset();
                }
                buffer.commit(Some(&f.header), |cmd| cmd.mode_field = f.mode_value)
            }
            AutonomousFragment::Gear(f) => buffer.commit(None, |cmd| cmd.gear = f.gear),
            AutonomousFragment::Accel(f) => buffer.commit(Some(&f.header), |cmd| cmd.accel = f.accel),
            AutonomousFragment::Steer(f) => buffer.commit(Some(&f.header), |cmd| cmd.steer = f.steer),
            AutonomousFragment::Brake(f) => buffer.commit(Some(&f.header), |cmd| cmd.brake = f.brake),
            AutonomousFragment::TrajectoryCmd(f) => buffer.commit(Some(&f.header), |cmd| {
                cmd.linear_velocity_cmd = f.target_velocity;
                cmd.steering_angle = f.target_steering_angle;
            }),
        };
        self.core.sink.publish_vehicle_cmd(command);
        true
    }

    /// Copy of the current mode, latch and merged command.
    pub fn snapshot(&self) -> GateSnapshot {
        self.core.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::recording::{Output, RecordingSink};
    use crate::{DEFAULT_REMOTE_TIMEOUT, gate};
    use chrono::Utc;
    use std::thread;
    use twistgate_types::{
        AccelFragment, BrakeFragment, GearFragment, Header, MotionFragment, PlannerModeFragment,
        SteerFragment, TrajectoryFragment, VehicleCommand,
    };

    fn setup() -> (ModeArbiter, crate::WatchdogMonitor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let (arbiter, watchdog) = gate(sink.clone(), DEFAULT_REMOTE_TIMEOUT);
        (arbiter, watchdog, sink)
    }

    fn header() -> Header {
        Header {
            frame_id: "base_link".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn remote(mode: ControlMode) -> RemoteFragment {
        RemoteFragment {
            header: Header {
                frame_id: "console".to_string(),
                timestamp: Utc::now(),
            },
            requested_mode: mode,
            emergency_request: false,
            accel: 0.3,
            brake: 0.0,
            steer: 0.1,
            gear: 1,
            blinker: 2,
            control_submode: 3,
        }
    }

    fn accel(value: f64) -> AutonomousFragment {
        AutonomousFragment::Accel(AccelFragment {
            header: header(),
            accel: value,
        })
    }

    fn every_autonomous_kind() -> Vec<AutonomousFragment> {
        vec![
            AutonomousFragment::Motion(MotionFragment {
                header: header(),
                linear_velocity: 2.0,
                angular_rate: 0.5,
            }),
            AutonomousFragment::PlannerMode(PlannerModeFragment {
                header: header(),
                mode_value: 0,
            }),
            AutonomousFragment::Gear(GearFragment { gear: 4 }),
            accel(0.9),
            AutonomousFragment::Steer(SteerFragment {
                header: header(),
                steer: -0.4,
            }),
            AutonomousFragment::Brake(BrakeFragment {
                header: header(),
                brake: 0.6,
            }),
            AutonomousFragment::TrajectoryCmd(TrajectoryFragment {
                header: header(),
                target_velocity: 5.0,
                target_steering_angle: 0.2,
            }),
        ]
    }

    #[test]
    fn starts_autonomous_with_default_command() {
        let (arbiter, _, sink) = setup();
        let snap = arbiter.snapshot();
        assert_eq!(snap.mode, ControlMode::Autonomous);
        assert!(!snap.emergency_latched);
        assert_eq!(snap.command, VehicleCommand::default());
        assert!(sink.outputs().is_empty());
    }

    #[test]
    fn autonomous_fragments_dropped_in_remote_mode() {
        let (arbiter, _, sink) = setup();
        assert!(arbiter.apply_remote_fragment(&remote(ControlMode::Remote)));
        let before = arbiter.snapshot().command;
        sink.clear();

        for fragment in every_autonomous_kind() {
            assert!(!arbiter.apply_autonomous_fragment(&fragment));
        }

        assert_eq!(arbiter.snapshot().command, before);
        assert!(sink.outputs().is_empty(), "no emission for dropped fragments");
    }

    #[test]
    fn every_accepted_fragment_advances_sequence_by_one() {
        let (arbiter, _, sink) = setup();
        for (i, fragment) in every_autonomous_kind().iter().enumerate() {
            assert!(arbiter.apply_autonomous_fragment(fragment));
            assert_eq!(arbiter.snapshot().command.sequence, i as u64 + 1);
        }
        let sequences: Vec<u64> = sink.commands().iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn gear_fragment_counts_as_accepted() {
        let (arbiter, _, sink) = setup();
        assert!(arbiter.apply_autonomous_fragment(&AutonomousFragment::Gear(GearFragment {
            gear: 3
        })));
        let cmd = arbiter.snapshot().command;
        assert_eq!(cmd.gear, 3);
        assert_eq!(cmd.sequence, 1);
        assert_eq!(sink.commands().len(), 1);
    }

    #[test]
    fn accel_fragment_changes_only_accel() {
        let (arbiter, _, _) = setup();
        arbiter.apply_autonomous_fragment(&AutonomousFragment::Motion(MotionFragment {
            header: header(),
            linear_velocity: 1.5,
            angular_rate: -0.2,
        }));
        arbiter.apply_autonomous_fragment(&AutonomousFragment::Brake(BrakeFragment {
            header: header(),
            brake: 0.25,
        }));
        let before = arbiter.snapshot().command;

        arbiter.apply_autonomous_fragment(&accel(0.8));
        let after = arbiter.snapshot().command;

        assert_eq!(
            after,
            VehicleCommand {
                sequence: before.sequence + 1,
                header: after.header.clone(),
                accel: 0.8,
                ..before
            }
        );
    }

    #[test]
    fn planner_mode_zero_resets_before_applying() {
        let (arbiter, _, _) = setup();
        arbiter.apply_autonomous_fragment(&accel(0.7));
        arbiter.apply_autonomous_fragment(&AutonomousFragment::TrajectoryCmd(TrajectoryFragment {
            header: header(),
            target_velocity: 3.0,
            target_steering_angle: 0.3,
        }));

        arbiter.apply_autonomous_fragment(&AutonomousFragment::PlannerMode(PlannerModeFragment {
            header: header(),
            mode_value: 0,
        }));

        let cmd = arbiter.snapshot().command;
        assert_eq!(cmd.sequence, 3);
        assert_eq!(cmd.linear_velocity_cmd, -1.0);
        assert_eq!(cmd.accel, 0.0);
        assert_eq!(cmd.steering_angle, 0.0);
        assert_eq!(cmd.mode_field, 0);
    }

    #[test]
    fn planner_mode_nonzero_keeps_other_fields() {
        let (arbiter, _, _) = setup();
        arbiter.apply_autonomous_fragment(&accel(0.7));
        arbiter.apply_autonomous_fragment(&AutonomousFragment::PlannerMode(PlannerModeFragment {
            header: header(),
            mode_value: 2,
        }));

        let cmd = arbiter.snapshot().command;
        assert_eq!(cmd.mode_field, 2);
        assert!((cmd.accel - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn remote_fragment_switches_mode_and_copies_fields() {
        let (arbiter, _, sink) = setup();
        arbiter.apply_autonomous_fragment(&AutonomousFragment::Motion(MotionFragment {
            header: header(),
            linear_velocity: 1.0,
            angular_rate: 0.9,
        }));

        assert!(arbiter.apply_remote_fragment(&remote(ControlMode::Remote)));

        let snap = arbiter.snapshot();
        assert_eq!(snap.mode, ControlMode::Remote);
        let cmd = &snap.command;
        assert_eq!(cmd.sequence, 2);
        assert!((cmd.accel - 0.3).abs() < f64::EPSILON);
        assert_eq!(cmd.brake, 0.0);
        assert!((cmd.steer - 0.1).abs() < f64::EPSILON);
        assert_eq!(cmd.angular_rate_cmd, 0.0);
        assert_eq!((cmd.gear, cmd.blinker, cmd.mode_field), (1, 2, 3));
        assert_eq!(cmd.header.frame_id, "console");
        assert_eq!(sink.commands().last(), Some(cmd));
    }

    #[test]
    fn remote_fragment_requesting_auto_records_but_does_not_emit() {
        let (arbiter, _, sink) = setup();
        assert!(!arbiter.apply_remote_fragment(&remote(ControlMode::Autonomous)));
        assert_eq!(arbiter.snapshot().command.sequence, 0);
        assert!(sink.outputs().is_empty());
    }

    #[test]
    fn remote_fragment_records_stop_request_in_any_mode() {
        let (arbiter, _, _) = setup();
        let mut stop = remote(ControlMode::Autonomous);
        stop.emergency_request = true;
        arbiter.apply_remote_fragment(&stop);
        assert!(arbiter.snapshot().stop_requested);
    }

    #[test]
    fn unrecognized_mode_is_stored_and_gates_both_sources() {
        let (arbiter, _, sink) = setup();
        assert!(!arbiter.apply_remote_fragment(&remote(ControlMode::Unrecognized(9))));
        assert_eq!(arbiter.snapshot().mode, ControlMode::Unrecognized(9));

        assert!(!arbiter.apply_autonomous_fragment(&accel(0.5)));
        assert!(sink.outputs().is_empty());
    }

    #[test]
    fn latched_emergency_pins_autonomous_mode() {
        let (arbiter, watchdog, sink) = setup();
        let mut stop = remote(ControlMode::Remote);
        stop.emergency_request = true;
        arbiter.apply_remote_fragment(&stop);
        assert!(watchdog.tick().emergency());
        sink.clear();

        assert!(!arbiter.apply_remote_fragment(&remote(ControlMode::Remote)));
        let snap = arbiter.snapshot();
        assert_eq!(snap.mode, ControlMode::Autonomous);
        assert!(snap.emergency_latched);
        assert!(!sink.outputs().iter().any(|o| matches!(o, Output::VehicleCmd(_))));

        // The planner keeps driving once it is authoritative again.
        assert!(arbiter.apply_autonomous_fragment(&accel(0.1)));
    }

    #[test]
    fn concurrent_fragments_never_lose_a_sequence_number() {
        let (arbiter, _, sink) = setup();
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let arbiter = arbiter.clone();
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let fragment = if t % 2 == 0 {
                            accel(i as f64)
                        } else {
                            AutonomousFragment::Gear(GearFragment { gear: i as i32 })
                        };
                        assert!(arbiter.apply_autonomous_fragment(&fragment));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = (THREADS * PER_THREAD) as u64;
        assert_eq!(arbiter.snapshot().command.sequence, total);
        let sequences: Vec<u64> = sink.commands().iter().map(|c| c.sequence).collect();
        let expected: Vec<u64> = (1..=total).collect();
        assert_eq!(sequences, expected, "emissions leave in sequence order");
    }
}
