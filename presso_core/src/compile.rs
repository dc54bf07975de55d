//! Profile-to-motion-command compiler.
//!
//! Each segment between two consecutive profile points becomes one motion
//! command for the remote stepper controller, assuming a symmetric
//! accelerate-then-decelerate (triangular) velocity profile that starts and
//! ends at rest:
//!
//! ```text
//! dt        = trunc(t2) - trunc(t1)                  (s)
//! steps     = round(dp / bar_per_rev * steps_per_rev)
//! a         = round(2 * |steps| / dt^2)              (steps/s^2)
//! v         = round(|steps| / dt)                    (steps/s)
//! ```
//!
//! All rounding is half-to-even. Note that `v` is the mean velocity over the
//! segment, not the triangular peak (`a * dt / 2`); the controller firmware
//! expects exactly these values, so they are kept.

use serde::Serialize;

use crate::config::ActuatorConstants;
use crate::fixed_point::{round_half_even_i64, round_half_even_u64, truncate_seconds};
use crate::profile::Profile;

/// One actuator move, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotionCommand {
    /// Start time in whole seconds.
    pub t: i64,
    /// Signed step count; positive raises pressure.
    pub s: i64,
    /// Velocity in steps per second.
    pub v: u64,
    /// Acceleration in steps per second squared.
    pub a: u64,
}

/// Rotational sense implied by the sign of a step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pressure increasing.
    Clockwise,
    /// Pressure decreasing.
    CounterClockwise,
    None,
}

impl Direction {
    pub fn of_steps(steps: i64) -> Self {
        match steps.signum() {
            1 => Direction::Clockwise,
            -1 => Direction::CounterClockwise,
            _ => Direction::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Clockwise => "clockwise",
            Direction::CounterClockwise => "counterclockwise",
            Direction::None => "none",
        }
    }
}

impl MotionCommand {
    pub fn direction(&self) -> Direction {
        Direction::of_steps(self.s)
    }
}

/// Why a segment produced no command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Truncated end time is not after the truncated start time.
    NonPositiveDuration { dt: i64 },
}

/// Result of compiling one segment. A skipped segment is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    Command(MotionCommand),
    Skipped(SkipReason),
}

impl SegmentOutcome {
    pub fn command(self) -> Option<MotionCommand> {
        match self {
            SegmentOutcome::Command(c) => Some(c),
            SegmentOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SegmentOutcome::Skipped(_))
    }
}

/// Signed step count for a pressure change of `dp` bar.
#[inline]
fn steps_for_delta(dp: f64, constants: &ActuatorConstants) -> i64 {
    let rotations = dp / constants.bar_per_revolution;
    round_half_even_i64(rotations * f64::from(constants.steps_per_revolution))
}

/// Compile the segment `(t1, p1) -> (t2, p2)` into a motion command.
pub fn compile_segment(
    t1: f64,
    p1: f64,
    t2: f64,
    p2: f64,
    constants: &ActuatorConstants,
) -> SegmentOutcome {
    let t1 = truncate_seconds(t1);
    let t2 = truncate_seconds(t2);
    let dt = t2.saturating_sub(t1);
    if dt <= 0 {
        return SegmentOutcome::Skipped(SkipReason::NonPositiveDuration { dt });
    }

    let steps = steps_for_delta(p2 - p1, constants);
    let abs_steps = steps.unsigned_abs() as f64;
    let dt = dt as f64;
    let a = round_half_even_u64(2.0 * abs_steps / (dt * dt));
    let v = round_half_even_u64(abs_steps / dt);

    SegmentOutcome::Command(MotionCommand {
        t: t1,
        s: steps,
        v,
        a,
    })
}

/// Steps needed to bring the actuator from `current_bar` to `target_bar`
/// before a shot. Same rounding as the segment compiler.
pub fn preset_steps(current_bar: f64, target_bar: f64, constants: &ActuatorConstants) -> i64 {
    steps_for_delta(target_bar - current_bar, constants)
}

/// Ordered motion commands for a whole profile; immutable once compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandSequence(Vec<MotionCommand>);

impl CommandSequence {
    pub fn commands(&self) -> &[MotionCommand] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MotionCommand> {
        self.0.iter()
    }

    /// Wire form: compact JSON array of `{"t","s","v","a"}` objects.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
    }

    /// Sum of all signed steps, i.e. the net actuator displacement.
    pub fn net_steps(&self) -> i64 {
        self.0.iter().fold(0i64, |acc, c| acc.saturating_add(c.s))
    }
}

impl From<Vec<MotionCommand>> for CommandSequence {
    fn from(v: Vec<MotionCommand>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a MotionCommand;
    type IntoIter = std::slice::Iter<'a, MotionCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compiled sequence plus the indices of segments that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub sequence: CommandSequence,
    /// Index `i` means the segment from point `i` to point `i + 1`.
    pub skipped: Vec<(usize, SkipReason)>,
}

/// Compile every adjacent pair of points, recording skipped segments.
pub fn compile_report(profile: &Profile, constants: &ActuatorConstants) -> CompileReport {
    let mut report = CompileReport::default();
    for (i, pair) in profile.points().windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        match compile_segment(a.time, a.pressure, b.time, b.pressure, constants) {
            SegmentOutcome::Command(cmd) => report.sequence.0.push(cmd),
            SegmentOutcome::Skipped(reason) => {
                tracing::debug!(segment = i, ?reason, "segment skipped");
                report.skipped.push((i, reason));
            }
        }
    }
    report
}

/// Compile a profile into its command sequence. Empty and single-point
/// profiles yield an empty sequence.
pub fn compile(profile: &Profile, constants: &ActuatorConstants) -> CommandSequence {
    compile_report(profile, constants).sequence
}
