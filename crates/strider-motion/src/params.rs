//! [`GaitParameters`] – the tunable shape of the walk.
//!
//! Lengths are metres, angles radians, phase quantities fractions of a full
//! two-step cycle.  Only four fields change while walking (`step_gain`,
//! `lateral_gain`, `turn_gain`, `enabled_gain`); the rest are tuning.

use serde::{Deserialize, Serialize};
use strider_hal::LegGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitParameters {
    // ─── Leg geometry ───────────────────────────────────────────────────────
    pub dist_hip_to_knee: f64,
    pub dist_knee_to_ankle: f64,
    pub dist_ankle_to_ground: f64,
    /// Lateral distance between the feet in the zero pose.
    pub dist_feet_lateral: f64,

    // ─── Timing ─────────────────────────────────────────────────────────────
    /// Full walk cycle frequency, Hz.
    pub freq: f64,
    /// `0.0` walk disabled, `1.0` walk fully enabled.
    pub enabled_gain: f64,
    /// Share of the cycle spent in double support, in `[0, 1]`.
    pub support_phase_ratio: f64,

    // ─── Dynamic gains ──────────────────────────────────────────────────────
    /// Forward length of each step (> 0 forward).
    pub step_gain: f64,
    /// Lateral length of each step (> 0 left).
    pub lateral_gain: f64,
    /// Yaw rotation per step (> 0 turns left).
    pub turn_gain: f64,

    // ─── Foot trajectory ────────────────────────────────────────────────────
    /// Outward offset of both feet.
    pub foot_y_offset: f64,
    /// Foot lift height.
    pub rise_gain: f64,
    pub step_up_vel: f64,
    pub step_down_vel: f64,
    pub rise_up_vel: f64,
    pub rise_down_vel: f64,

    // ─── Trunk ──────────────────────────────────────────────────────────────
    /// > 0 lowers the trunk.
    pub trunk_z_offset: f64,
    pub trunk_x_offset: f64,
    pub trunk_y_offset: f64,
    pub trunk_pitch: f64,
    pub trunk_roll: f64,
    /// Lateral trunk oscillation amplitude.
    pub swing_gain: f64,
    pub swing_roll_gain: f64,
    pub swing_phase: f64,
    /// Phase share, in `[0, 0.5)`, during which the swing holds on one side.
    pub swing_pause: f64,
    /// Swing smoothness; `0` is a pure sine.
    pub swing_vel: f64,

    // ─── Extra per-foot offsets ─────────────────────────────────────────────
    pub extra_left_x: f64,
    pub extra_left_y: f64,
    pub extra_left_z: f64,
    pub extra_left_yaw: f64,
    pub extra_left_pitch: f64,
    pub extra_left_roll: f64,
    pub extra_right_x: f64,
    pub extra_right_y: f64,
    pub extra_right_z: f64,
    pub extra_right_yaw: f64,
    pub extra_right_pitch: f64,
    pub extra_right_roll: f64,
}

impl GaitParameters {
    /// Default tuning for a robot with the given leg geometry.  The walk
    /// starts disabled, stepping in place.
    pub fn for_geometry(geometry: LegGeometry) -> Self {
        Self {
            dist_hip_to_knee: geometry.hip_to_knee,
            dist_knee_to_ankle: geometry.knee_to_ankle,
            dist_ankle_to_ground: geometry.ankle_to_ground,
            dist_feet_lateral: geometry.feet_lateral,
            freq: 1.5,
            enabled_gain: 0.0,
            support_phase_ratio: 0.1,
            step_gain: 0.0,
            lateral_gain: 0.0,
            turn_gain: 0.0,
            foot_y_offset: 0.035,
            rise_gain: 0.035,
            step_up_vel: 4.0,
            step_down_vel: 0.0,
            rise_up_vel: 4.0,
            rise_down_vel: 0.0,
            trunk_z_offset: 0.02,
            trunk_x_offset: 0.01,
            trunk_y_offset: 0.0,
            trunk_pitch: 0.15,
            trunk_roll: 0.0,
            swing_gain: 0.02,
            swing_roll_gain: 0.0,
            swing_phase: 0.25,
            swing_pause: 0.0,
            swing_vel: 4.0,
            extra_left_x: 0.0,
            extra_left_y: 0.0,
            extra_left_z: 0.0,
            extra_left_yaw: 0.0,
            extra_left_pitch: 0.0,
            extra_left_roll: 0.0,
            extra_right_x: 0.0,
            extra_right_y: 0.0,
            extra_right_z: 0.0,
            extra_right_yaw: 0.0,
            extra_right_pitch: 0.0,
            extra_right_roll: 0.0,
        }
    }

    /// Directional gains `(step, lateral, turn)`.
    pub fn gains(&self) -> [f64; 3] {
        [self.step_gain, self.lateral_gain, self.turn_gain]
    }

    pub fn zero_gains(&mut self) {
        self.step_gain = 0.0;
        self.lateral_gain = 0.0;
        self.turn_gain = 0.0;
    }

    pub fn is_enabled(&self) -> bool {
        (self.enabled_gain - 1.0).abs() < f64::EPSILON
    }
}

impl Default for GaitParameters {
    fn default() -> Self {
        Self::for_geometry(LegGeometry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_disabled_in_place() {
        let p = GaitParameters::default();
        assert_eq!(p.enabled_gain, 0.0);
        assert_eq!(p.gains(), [0.0, 0.0, 0.0]);
        assert!((p.freq - 1.5).abs() < f64::EPSILON);
        assert!(!p.is_enabled());
    }

    #[test]
    fn geometry_is_copied() {
        let geometry = LegGeometry {
            hip_to_knee: 0.2,
            knee_to_ankle: 0.18,
            ankle_to_ground: 0.05,
            feet_lateral: 0.1,
        };
        let p = GaitParameters::for_geometry(geometry);
        assert_eq!(p.dist_hip_to_knee, 0.2);
        assert_eq!(p.dist_knee_to_ankle, 0.18);
        assert_eq!(p.dist_feet_lateral, 0.1);
    }

    #[test]
    fn zero_gains_keeps_enable_flag() {
        let mut p = GaitParameters {
            step_gain: 0.04,
            lateral_gain: -0.01,
            turn_gain: 0.2,
            enabled_gain: 1.0,
            ..GaitParameters::default()
        };
        p.zero_gains();
        assert_eq!(p.gains(), [0.0, 0.0, 0.0]);
        assert!(p.is_enabled());
    }
}
