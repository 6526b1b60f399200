//! Walk trajectory generation and leg inverse kinematics.
//!
//! [`WalkSolver`] is the seam between the gait engine and the maths: given a
//! parameter snapshot and a time step it advances the phase and returns the
//! twelve leg joint angles.  [`IkWalk`] is the built-in open-loop solver:
//!
//! 1. each foot follows a cubic Hermite swing curve (forward, lateral, yaw)
//!    and a lift curve, then slides back linearly during support; the right
//!    leg runs half a cycle behind the left one;
//! 2. the trunk sways laterally with a shaped sine;
//! 3. a closed-form 6-DOF leg solver turns each hip→ankle target into joint
//!    angles, keeping the sole parallel to the ground.
//!
//! All time-dependent amplitudes scale with `enabled_gain`, so a disabled
//! walk resolves to a static stance.

use std::f64::consts::{PI, TAU};

use strider_types::StriderError;

use crate::params::GaitParameters;

/// Joint angles of one leg, radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegAngles {
    pub hip_yaw: f64,
    pub hip_roll: f64,
    pub hip_pitch: f64,
    pub knee: f64,
    pub ankle_pitch: f64,
    pub ankle_roll: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkOutput {
    pub left: LegAngles,
    pub right: LegAngles,
}

/// Produces leg joint angles for one control step.
pub trait WalkSolver: Send + Sync {
    /// Advance `phase` (in `[0, 1)`) by `dt` seconds of walk and return the
    /// resulting leg angles.  On error `phase` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::Unreachable`] when a foot target lies outside
    /// the leg's workspace.
    fn solve(
        &self,
        params: &GaitParameters,
        dt: f64,
        phase: &mut f64,
    ) -> Result<WalkOutput, StriderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// Foot pose relative to the hip: forward, lateral (left positive), vertical
/// drop from hip to ankle, yaw.
#[derive(Debug, Clone, Copy)]
struct FootTarget {
    x: f64,
    y: f64,
    drop: f64,
    yaw: f64,
}

/// Built-in analytic walk solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct IkWalk;

impl WalkSolver for IkWalk {
    fn solve(
        &self,
        params: &GaitParameters,
        dt: f64,
        phase: &mut f64,
    ) -> Result<WalkOutput, StriderError> {
        let next = (*phase + dt * params.freq).rem_euclid(1.0);

        let shape = swing_shape(next + params.swing_phase, params.swing_pause, params.swing_vel);
        let sway = params.swing_gain * params.enabled_gain * shape;
        let roll_sway = params.swing_roll_gain * params.enabled_gain * shape;

        let left_target = foot_target(params, next, Side::Left, sway)?;
        let right_target = foot_target(params, (next + 0.5).rem_euclid(1.0), Side::Right, sway)?;

        let left = leg_ik(params, left_target, Side::Left, roll_sway)?;
        let right = leg_ik(params, right_target, Side::Right, roll_sway)?;

        *phase = next;
        Ok(WalkOutput { left, right })
    }
}

/// Cubic Hermite interpolation on `u ∈ [0, 1]`.
fn hermite(u: f64, p0: f64, p1: f64, m0: f64, m1: f64) -> f64 {
    let u2 = u * u;
    let u3 = u2 * u;
    (2.0 * u3 - 3.0 * u2 + 1.0) * p0
        + (u3 - 2.0 * u2 + u) * m0
        + (-2.0 * u3 + 3.0 * u2) * p1
        + (u3 - u2) * m1
}

/// Periodic lateral swing profile in `[-1, 1]`.
fn swing_shape(q: f64, pause: f64, vel: f64) -> f64 {
    let s = (TAU * q).sin();
    let smoothed = if vel > 0.0 { (vel * s).tanh() / vel.tanh() } else { s };
    if pause > 0.0 {
        (smoothed / (1.0 - 2.0 * pause).max(1e-3)).clamp(-1.0, 1.0)
    } else {
        smoothed
    }
}

/// Swing-then-support displacement of amplitude `amp` for a leg phase `p`.
fn stride(p: f64, swing_len: f64, amp: f64, up_vel: f64, down_vel: f64) -> f64 {
    if p < swing_len {
        let u = p / swing_len;
        hermite(u, -amp / 2.0, amp / 2.0, up_vel * amp / 4.0, -down_vel * amp / 4.0)
    } else {
        let v = (p - swing_len) / (1.0 - swing_len);
        amp / 2.0 - amp * v
    }
}

fn lift(p: f64, swing_len: f64, rise: f64, up_vel: f64, down_vel: f64) -> f64 {
    if p >= swing_len {
        return 0.0;
    }
    let u = p / swing_len;
    if u < 0.5 {
        hermite(2.0 * u, 0.0, rise, up_vel * rise / 4.0, 0.0)
    } else {
        hermite(2.0 * u - 1.0, rise, 0.0, 0.0, -down_vel * rise / 4.0)
    }
}

fn foot_target(
    params: &GaitParameters,
    leg_phase: f64,
    side: Side,
    sway: f64,
) -> Result<FootTarget, StriderError> {
    let gain = params.enabled_gain;
    let swing_len = (0.5 * (1.0 - params.support_phase_ratio)).clamp(0.05, 0.5);

    let x = stride(
        leg_phase,
        swing_len,
        params.step_gain * gain,
        params.step_up_vel,
        params.step_down_vel,
    );
    let y = stride(
        leg_phase,
        swing_len,
        params.lateral_gain * gain,
        params.step_up_vel,
        params.step_down_vel,
    );
    let yaw = stride(
        leg_phase,
        swing_len,
        params.turn_gain * gain,
        params.step_up_vel,
        params.step_down_vel,
    );
    let z = lift(
        leg_phase,
        swing_len,
        params.rise_gain * gain,
        params.rise_up_vel,
        params.rise_down_vel,
    );

    let (extra_x, extra_y, extra_z, extra_yaw) = match side {
        Side::Left => (
            params.extra_left_x,
            params.extra_left_y,
            params.extra_left_z,
            params.extra_left_yaw,
        ),
        Side::Right => (
            params.extra_right_x,
            params.extra_right_y,
            params.extra_right_z,
            params.extra_right_yaw,
        ),
    };

    let target = FootTarget {
        x: x - params.trunk_x_offset + extra_x,
        y: side.sign() * params.foot_y_offset + y - sway - params.trunk_y_offset + extra_y,
        drop: params.dist_hip_to_knee + params.dist_knee_to_ankle
            - params.trunk_z_offset
            - z
            - extra_z,
        yaw: yaw + extra_yaw,
    };

    // The foot must stay on its own side of the trunk midline.
    let lateral = side.sign() * params.dist_feet_lateral / 2.0 + target.y;
    if side.sign() * lateral <= 0.0 {
        return Err(StriderError::Unreachable(format!(
            "{side:?} foot crosses the midline (y = {lateral:.3})"
        )));
    }
    Ok(target)
}

fn leg_ik(
    params: &GaitParameters,
    target: FootTarget,
    side: Side,
    roll_sway: f64,
) -> Result<LegAngles, StriderError> {
    let a = params.dist_hip_to_knee;
    let b = params.dist_knee_to_ankle;

    let (sin, cos) = target.yaw.sin_cos();
    let x = cos * target.x + sin * target.y;
    let y = -sin * target.x + cos * target.y;

    let roll = y.atan2(target.drop);
    let sagittal = y.hypot(target.drop);
    let d = x.hypot(sagittal);
    if d >= a + b || d <= (a - b).abs() {
        return Err(StriderError::Unreachable(format!(
            "{side:?} ankle at {d:.3} m, leg reach {:.3}..{:.3} m",
            (a - b).abs(),
            a + b
        )));
    }

    let knee = PI - ((a * a + b * b - d * d) / (2.0 * a * b)).clamp(-1.0, 1.0).acos();
    let alpha = ((a * a + d * d - b * b) / (2.0 * a * d)).clamp(-1.0, 1.0).acos();
    let thigh = x.atan2(sagittal) + alpha;

    let (extra_pitch, extra_roll) = match side {
        Side::Left => (params.extra_left_pitch, params.extra_left_roll),
        Side::Right => (params.extra_right_pitch, params.extra_right_roll),
    };

    Ok(LegAngles {
        hip_yaw: target.yaw,
        hip_roll: roll + params.trunk_roll + roll_sway,
        hip_pitch: thigh + params.trunk_pitch,
        knee,
        ankle_pitch: knee - thigh + extra_pitch,
        ankle_roll: -roll + extra_roll,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walking(step: f64) -> GaitParameters {
        GaitParameters {
            enabled_gain: 1.0,
            step_gain: step,
            ..GaitParameters::default()
        }
    }

    #[test]
    fn hermite_hits_its_endpoints() {
        assert!((hermite(0.0, -1.0, 2.0, 5.0, 5.0) + 1.0).abs() < 1e-12);
        assert!((hermite(1.0, -1.0, 2.0, 5.0, 5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stride_is_continuous_at_phase_wrap() {
        let swing_len = 0.45;
        let start = stride(0.0, swing_len, 0.06, 4.0, 0.0);
        let end = stride(1.0 - 1e-9, swing_len, 0.06, 4.0, 0.0);
        assert!((start - end).abs() < 1e-6);
    }

    #[test]
    fn phase_advances_and_wraps() {
        let solver = IkWalk;
        let params = walking(0.0);
        let mut phase = 0.99;
        solver.solve(&params, 0.02, &mut phase).unwrap();
        assert!((phase - 0.02).abs() < 1e-9);
    }

    #[test]
    fn full_cycle_is_reachable_with_default_tuning() {
        let solver = IkWalk;
        let params = walking(0.05);
        let mut phase = 0.0;
        for _ in 0..200 {
            let out = solver.solve(&params, 0.02, &mut phase).unwrap();
            assert!(out.left.knee > 0.0 && out.right.knee > 0.0);
        }
    }

    #[test]
    fn disabled_walk_is_symmetric_stance() {
        let solver = IkWalk;
        let params = GaitParameters::default();
        let mut phase = 0.3;
        let out = solver.solve(&params, 0.02, &mut phase).unwrap();
        assert!((out.left.knee - out.right.knee).abs() < 1e-9);
        assert!((out.left.hip_pitch - out.right.hip_pitch).abs() < 1e-9);
        assert!((out.left.hip_roll + out.right.hip_roll).abs() < 1e-9);
        assert_eq!(out.left.hip_yaw, 0.0);
    }

    #[test]
    fn sole_stays_flat_in_the_sagittal_plane() {
        let solver = IkWalk;
        let params = GaitParameters {
            trunk_pitch: 0.0,
            ..walking(0.04)
        };
        let mut phase = 0.0;
        for _ in 0..20 {
            let out = solver.solve(&params, 0.02, &mut phase).unwrap();
            for leg in [out.left, out.right] {
                let sum = leg.hip_pitch - leg.knee + leg.ankle_pitch;
                assert!(sum.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn overextended_leg_is_unreachable_and_keeps_phase() {
        let solver = IkWalk;
        let params = GaitParameters {
            trunk_z_offset: -0.05,
            ..GaitParameters::default()
        };
        let mut phase = 0.4;
        let err = solver.solve(&params, 0.02, &mut phase).unwrap_err();
        assert!(matches!(err, StriderError::Unreachable(_)));
        assert!((phase - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn crossing_feet_are_unreachable() {
        let solver = IkWalk;
        let params = GaitParameters {
            extra_left_y: -0.2,
            ..GaitParameters::default()
        };
        let mut phase = 0.0;
        assert!(solver.solve(&params, 0.02, &mut phase).is_err());
    }
}
