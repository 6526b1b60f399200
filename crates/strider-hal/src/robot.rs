//! [`RobotModel`] – joint table and leg geometry of the humanoid.
//!
//! The model maps stable joint names onto bus ids and carries the per-joint
//! mounting calibration (`inverse` sign and zero `offset`) that the motor
//! driver applies before converting degrees to encoder ticks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strider_types::{JointId, StriderError};

/// Canonical joint names.
pub mod joints {
    pub const HEAD_YAW: &str = "head_yaw";
    pub const HEAD_PITCH: &str = "head_pitch";

    pub const LEFT_SHOULDER_PITCH: &str = "left_shoulder_pitch";
    pub const LEFT_SHOULDER_ROLL: &str = "left_shoulder_roll";
    pub const LEFT_ELBOW: &str = "left_elbow";
    pub const RIGHT_SHOULDER_PITCH: &str = "right_shoulder_pitch";
    pub const RIGHT_SHOULDER_ROLL: &str = "right_shoulder_roll";
    pub const RIGHT_ELBOW: &str = "right_elbow";

    pub const LEFT_HIP_YAW: &str = "left_hip_yaw";
    pub const LEFT_HIP_ROLL: &str = "left_hip_roll";
    pub const LEFT_HIP_PITCH: &str = "left_hip_pitch";
    pub const LEFT_KNEE: &str = "left_knee";
    pub const LEFT_ANKLE_PITCH: &str = "left_ankle_pitch";
    pub const LEFT_ANKLE_ROLL: &str = "left_ankle_roll";
    pub const RIGHT_HIP_YAW: &str = "right_hip_yaw";
    pub const RIGHT_HIP_ROLL: &str = "right_hip_roll";
    pub const RIGHT_HIP_PITCH: &str = "right_hip_pitch";
    pub const RIGHT_KNEE: &str = "right_knee";
    pub const RIGHT_ANKLE_PITCH: &str = "right_ankle_pitch";
    pub const RIGHT_ANKLE_ROLL: &str = "right_ankle_roll";
}

/// One servo of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    pub id: JointId,
    /// Mounting direction, `1.0` or `-1.0`.
    #[serde(default = "default_inverse")]
    pub inverse: f32,
    /// Zero calibration, degrees.
    #[serde(default)]
    pub offset: f32,
}

fn default_inverse() -> f32 {
    1.0
}

impl JointSpec {
    fn new(name: &str, id: JointId, inverse: f32) -> Self {
        Self {
            name: name.to_string(),
            id,
            inverse,
            offset: 0.0,
        }
    }

    /// Angle to command on the servo for a kinematic angle `deg`.
    pub fn to_servo_degrees(&self, deg: f32) -> f32 {
        self.inverse * (deg + self.offset)
    }
}

/// Leg link lengths, metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegGeometry {
    pub hip_to_knee: f64,
    pub knee_to_ankle: f64,
    pub ankle_to_ground: f64,
    /// Lateral distance between the feet in the zero pose.
    pub feet_lateral: f64,
}

impl Default for LegGeometry {
    fn default() -> Self {
        Self {
            hip_to_knee: 0.12,
            knee_to_ankle: 0.12,
            ankle_to_ground: 0.04,
            feet_lateral: 0.09,
        }
    }
}

/// Serialisable description of the robot, usually a `[robot]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    #[serde(default)]
    pub geometry: LegGeometry,
    #[serde(default = "default_joints")]
    pub joints: Vec<JointSpec>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            geometry: LegGeometry::default(),
            joints: default_joints(),
        }
    }
}

fn default_joints() -> Vec<JointSpec> {
    use joints::*;
    vec![
        JointSpec::new(HEAD_YAW, 1, 1.0),
        JointSpec::new(HEAD_PITCH, 2, 1.0),
        JointSpec::new(RIGHT_SHOULDER_PITCH, 3, -1.0),
        JointSpec::new(RIGHT_SHOULDER_ROLL, 4, -1.0),
        JointSpec::new(RIGHT_ELBOW, 5, -1.0),
        JointSpec::new(LEFT_SHOULDER_PITCH, 6, 1.0),
        JointSpec::new(LEFT_SHOULDER_ROLL, 7, 1.0),
        JointSpec::new(LEFT_ELBOW, 8, 1.0),
        JointSpec::new(RIGHT_HIP_YAW, 9, -1.0),
        JointSpec::new(RIGHT_HIP_ROLL, 10, -1.0),
        JointSpec::new(RIGHT_HIP_PITCH, 11, -1.0),
        JointSpec::new(RIGHT_KNEE, 12, -1.0),
        JointSpec::new(RIGHT_ANKLE_PITCH, 13, -1.0),
        JointSpec::new(RIGHT_ANKLE_ROLL, 14, -1.0),
        JointSpec::new(LEFT_HIP_YAW, 15, 1.0),
        JointSpec::new(LEFT_HIP_ROLL, 16, 1.0),
        JointSpec::new(LEFT_HIP_PITCH, 17, 1.0),
        JointSpec::new(LEFT_KNEE, 18, 1.0),
        JointSpec::new(LEFT_ANKLE_PITCH, 19, 1.0),
        JointSpec::new(LEFT_ANKLE_ROLL, 20, 1.0),
    ]
}

/// Validated, indexed robot description.  Immutable once built; share it
/// with `Arc`.
#[derive(Debug, Clone)]
pub struct RobotModel {
    geometry: LegGeometry,
    joints: Vec<JointSpec>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<JointId, usize>,
}

impl RobotModel {
    /// Build a model from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::Config`] on duplicate joint names or ids, or on
    /// non-positive link lengths.
    pub fn from_config(config: &RobotConfig) -> Result<Self, StriderError> {
        let g = &config.geometry;
        if g.hip_to_knee <= 0.0 || g.knee_to_ankle <= 0.0 || g.ankle_to_ground < 0.0 {
            return Err(StriderError::Config(format!(
                "invalid leg geometry {g:?}"
            )));
        }

        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, joint) in config.joints.iter().enumerate() {
            if by_name.insert(joint.name.clone(), idx).is_some() {
                return Err(StriderError::Config(format!(
                    "duplicate joint name '{}'",
                    joint.name
                )));
            }
            if by_id.insert(joint.id, idx).is_some() {
                return Err(StriderError::Config(format!(
                    "duplicate joint id {} ('{}')",
                    joint.id, joint.name
                )));
            }
        }

        Ok(Self {
            geometry: config.geometry,
            joints: config.joints.clone(),
            by_name,
            by_id,
        })
    }

    pub fn geometry(&self) -> LegGeometry {
        self.geometry
    }

    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    pub fn joint_ids(&self) -> Vec<JointId> {
        self.joints.iter().map(|j| j.id).collect()
    }

    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        self.by_name.get(name).map(|&idx| self.joints[idx].id)
    }

    /// Resolve a joint name, failing with a configuration error when the
    /// robot has no such joint.
    pub fn require(&self, name: &str) -> Result<JointId, StriderError> {
        self.joint_id(name)
            .ok_or_else(|| StriderError::Config(format!("robot has no joint '{name}'")))
    }

    pub fn joint(&self, id: JointId) -> Option<&JointSpec> {
        self.by_id.get(&id).map(|&idx| &self.joints[idx])
    }
}

impl Default for RobotModel {
    fn default() -> Self {
        let config = RobotConfig::default();
        let by_name = config
            .joints
            .iter()
            .enumerate()
            .map(|(idx, j)| (j.name.clone(), idx))
            .collect();
        let by_id = config
            .joints
            .iter()
            .enumerate()
            .map(|(idx, j)| (j.id, idx))
            .collect();
        Self {
            geometry: config.geometry,
            joints: config.joints,
            by_name,
            by_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_has_twenty_joints() {
        let model = RobotModel::default();
        assert_eq!(model.joints().len(), 20);
        assert_eq!(model.joint_id(joints::HEAD_YAW), Some(1));
        assert_eq!(model.joint_id(joints::LEFT_ANKLE_ROLL), Some(20));
        assert_eq!(model.joint(12).map(|j| j.name.as_str()), Some(joints::RIGHT_KNEE));
    }

    #[test]
    fn from_config_matches_default() {
        let model = RobotModel::from_config(&RobotConfig::default()).unwrap();
        assert_eq!(model.joint_ids(), RobotModel::default().joint_ids());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut config = RobotConfig::default();
        config.joints[1].id = config.joints[0].id;
        assert!(matches!(
            RobotModel::from_config(&config),
            Err(StriderError::Config(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut config = RobotConfig::default();
        config.joints[1].name = config.joints[0].name.clone();
        assert!(RobotModel::from_config(&config).is_err());
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut config = RobotConfig::default();
        config.geometry.hip_to_knee = 0.0;
        assert!(RobotModel::from_config(&config).is_err());
    }

    #[test]
    fn servo_degrees_apply_calibration() {
        let spec = JointSpec {
            name: "j".to_string(),
            id: 1,
            inverse: -1.0,
            offset: 5.0,
        };
        assert!((spec.to_servo_degrees(10.0) - (-15.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn require_unknown_joint_is_config_error() {
        let model = RobotModel::default();
        assert!(model.require("tail").is_err());
    }
}
