//! The perception-to-command control policy.
//!
//! One `step` per cycle: (optional detection, optional distance, wall clock)
//! in, an optional command update plus a status label out. The only state
//! carried across cycles is the sticky-sit flag and the time of the last
//! detection; every other decision is a pure function of the cycle's inputs.
//!
//! Evaluation order matters and is fixed:
//! 1. no detection → sit (sticky), scan (past loss timeout), or hold;
//! 2. detection without a valid distance → hold (explicit no-op, never a
//!    fallback to zero velocity; transient depth noise must not jitter the
//!    robot);
//! 3. valid fix → clear sticky sit, reset the loss timer, steer;
//! 4. proximity dominates the distance bands (nearest-first tie-break).

use std::fmt;
use std::time::{Duration, Instant};

use crate::command::{Command, Pose, VelocityLimits};
use crate::depth::DistanceSample;

/// Status label for one cycle. Logged and asserted on in tests; nothing
/// branches on it outside this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Searching,
    Approaching,
    Creeping,
    Holding,
    Backing,
    TooClose,
    Sitting,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControllerState::Searching => "SEARCHING",
            ControllerState::Approaching => "APPROACHING",
            ControllerState::Creeping => "CREEPING",
            ControllerState::Holding => "HOLDING",
            ControllerState::Backing => "BACKING",
            ControllerState::TooClose => "TOO_CLOSE",
            ControllerState::Sitting => "SITTING",
        };
        f.write_str(label)
    }
}

/// What the policy saw this cycle: the tracked detection reduced to the
/// values steering needs.
#[derive(Clone, Copy, Debug)]
pub struct TargetObservation {
    /// Detection center, x pixel coordinate.
    pub center_x: f32,
    /// Width of the frame the detection came from.
    pub frame_width: u32,
    /// Depth estimate for the detection center.
    pub distance: DistanceSample,
}

/// Control thresholds and speeds. Every value here is deliberately named
/// configuration rather than a literal in the decision code; deployments
/// disagree on the exact numbers.
#[derive(Clone, Copy, Debug)]
pub struct PolicySettings {
    /// Standoff distance the controller tries to hold, meters.
    pub setpoint_m: f32,
    /// Half-width of the no-correction band around the setpoint, meters.
    pub hold_band_m: f32,
    /// Distance error beyond which the controller approaches at full
    /// forward speed, meters.
    pub approach_band_m: f32,
    /// Normalized turn-speed magnitude below which yaw is zeroed.
    pub turn_dead_band: f32,
    /// Forward speed for APPROACHING and CREEPING, m/s.
    pub forward_speed: f32,
    /// Reverse speed magnitude for BACKING, m/s.
    pub reverse_speed: f32,
    /// Reverse speed magnitude for TOO_CLOSE, m/s.
    pub backoff_speed: f32,
    /// Yaw rate of the fixed scan command, rad/s.
    pub scan_yaw: f32,
    /// How long after the last detection the scan kicks in.
    pub loss_timeout: Duration,
    /// When enabled, proximity below `sit_distance_m` sits the robot down
    /// instead of backing off.
    pub sit_override: bool,
    pub sit_distance_m: f32,
    /// Proximity below which the velocity variant backs off.
    pub too_close_m: f32,
    /// Hard per-axis velocity bounds applied to every emitted command.
    pub limits: VelocityLimits,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            setpoint_m: 0.45,
            hold_band_m: 0.05,
            approach_band_m: 0.40,
            turn_dead_band: 0.08,
            forward_speed: 0.30,
            reverse_speed: 0.12,
            backoff_speed: 0.15,
            scan_yaw: 0.40,
            loss_timeout: Duration::from_millis(500),
            sit_override: true,
            sit_distance_m: 0.50,
            too_close_m: 0.15,
            limits: VelocityLimits::default(),
        }
    }
}

/// Outcome of one policy cycle.
///
/// `command: None` means "leave the channel alone"; the previous command
/// keeps driving the robot. This is how both the pre-timeout search window
/// and the invalid-depth no-op are expressed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleDecision {
    pub state: ControllerState,
    pub command: Option<Command>,
}

/// The finite-state control policy.
pub struct ControlPolicy {
    settings: PolicySettings,
    sticky_sit: bool,
    last_detection_at: Option<Instant>,
}

impl ControlPolicy {
    pub fn new(settings: PolicySettings) -> Self {
        Self {
            settings,
            sticky_sit: false,
            last_detection_at: None,
        }
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    /// True while the sit override holds the robot down.
    pub fn is_sitting(&self) -> bool {
        self.sticky_sit
    }

    /// Evaluate one cycle.
    pub fn step(&mut self, now: Instant, observation: Option<&TargetObservation>) -> CycleDecision {
        let Some(observation) = observation else {
            return self.step_without_detection(now);
        };

        let Some(distance) = observation.distance.valid() else {
            // Detection without a usable distance: suppress the update.
            // Deliberately not a zero-velocity fallback, and deliberately
            // before the sticky-sit clear and the loss-timer reset.
            return CycleDecision {
                state: ControllerState::Searching,
                command: None,
            };
        };

        self.sticky_sit = false;
        self.last_detection_at = Some(now);

        let turn = self.turn_speed(observation);

        if self.settings.sit_override && distance < self.settings.sit_distance_m {
            // Immediate proximity dominates all other steering.
            self.sticky_sit = true;
            return CycleDecision {
                state: ControllerState::Sitting,
                command: Some(Command::Pose(Pose::Sit)),
            };
        }

        let error = distance - self.settings.setpoint_m;
        let (state, vx, vyaw) = if distance < self.settings.too_close_m {
            (ControllerState::TooClose, -self.settings.backoff_speed, turn * 0.5)
        } else if error.abs() < self.settings.hold_band_m {
            (ControllerState::Holding, 0.0, turn)
        } else if error > self.settings.approach_band_m {
            (ControllerState::Approaching, self.settings.forward_speed, turn * 0.7)
        } else if error > 0.0 {
            (ControllerState::Creeping, self.settings.forward_speed, turn * 0.8)
        } else {
            (ControllerState::Backing, -self.settings.reverse_speed, turn * 0.6)
        };

        CycleDecision {
            state,
            command: Some(Command::velocity(vx, 0.0, vyaw).clamped(&self.settings.limits)),
        }
    }

    fn step_without_detection(&mut self, now: Instant) -> CycleDecision {
        if self.sticky_sit {
            // Keep re-asserting the sit; the flag only clears on a renewed
            // detection with a valid distance.
            return CycleDecision {
                state: ControllerState::Sitting,
                command: Some(Command::Pose(Pose::Sit)),
            };
        }

        // Seed the loss timer on the first cycle so a robot that never sees
        // the target starts scanning one timeout after startup.
        let reference = *self.last_detection_at.get_or_insert(now);
        if now.duration_since(reference) > self.settings.loss_timeout {
            let scan = Command::velocity(0.0, 0.0, self.settings.scan_yaw)
                .clamped(&self.settings.limits);
            return CycleDecision {
                state: ControllerState::Searching,
                command: Some(scan),
            };
        }

        CycleDecision {
            state: ControllerState::Searching,
            command: None,
        }
    }

    /// Normalized turn speed from the horizontal pixel error, zeroed inside
    /// the dead-band. A detection right of center yields a negative (turn
    /// right) yaw; left of center a positive one.
    fn turn_speed(&self, observation: &TargetObservation) -> f32 {
        let half_width = observation.frame_width as f32 / 2.0;
        if half_width <= 0.0 {
            return 0.0;
        }
        let error = observation.center_x - half_width;
        let turn = -error / half_width;
        if turn.abs() < self.settings.turn_dead_band {
            0.0
        } else {
            turn
        }
    }
}
