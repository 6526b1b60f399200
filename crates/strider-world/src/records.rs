//! Sub-records of the world model.
//!
//! Each record is a plain value type guarded by its own lock inside
//! [`WorldModel`][crate::WorldModel]; readers always receive a copy.

use serde::{Deserialize, Serialize};
use strider_types::{
    ButtonState, FallDirection, GameControlData, ImuData, JointDegrees, PlayerInfo,
    RemoteCommand, SupportFoot,
};

/// `[world]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Id of the local robot in the roster.
    pub player_id: u8,
    /// Teammate reports older than this are flagged stale.
    pub roster_stale_after_ms: u64,
    /// Trunk pitch/roll beyond this angle counts as fallen.
    pub fall_threshold_deg: f32,
    /// Camera frames without a fresh ball sighting before the ball is stale.
    pub ball_stale_frames: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            player_id: 1,
            roster_stale_after_ms: 3000,
            fall_threshold_deg: 40.0,
            ball_stale_frames: 30,
        }
    }
}

/// Orientation and pose of the local robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfState {
    pub imu: ImuData,
    pub imu_lost: bool,
    pub fall: FallDirection,
    /// Global pose on the field: metres, metres, degrees.
    pub x: f32,
    pub y: f32,
    pub dir: f32,
}

impl SelfState {
    pub fn is_fallen(&self) -> bool {
        self.fall != FallDirection::None
    }
}

/// Latest ball observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BallObservation {
    /// Global field coordinates, metres.
    pub global: [f32; 2],
    /// Robot-relative coordinates, metres (x forward, y left).
    pub relative: [f32; 2],
    /// Image coordinates of the detection.
    pub pixel: [i32; 2],
    /// Horizontal bearing, degrees.
    pub alpha: f32,
    /// Vertical bearing, degrees.
    pub beta: f32,
    pub visible: bool,
    /// Camera frames since the last sighting.
    pub stale_frames: u32,
}

impl BallObservation {
    /// Planar distance from the robot, metres.
    pub fn distance(&self) -> f32 {
        self.relative[0].hypot(self.relative[1])
    }
}

/// Roster entry as returned by [`WorldModel::players`][crate::WorldModel::players].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub info: PlayerInfo,
    /// No report received within the stale window.
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    pub low_power: bool,
    pub connected: bool,
    pub voltage: f32,
}

/// Realized gait velocity and the pose integrated from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    /// Last applied `(step, lateral, turn)` per gait cycle.
    pub velocity: [f64; 3],
    /// Dead-reckoned pose relative to the start: metres, metres, radians.
    pub x: f64,
    pub y: f64,
    pub dir: f64,
    pub cycles: u64,
}

/// Selector for [`WorldModel::snapshot`][crate::WorldModel::snapshot].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubRecord {
    SelfState,
    Ball,
    GameControl,
    Roster,
    Remote,
    SupportFoot,
    Power,
    Buttons,
    Odometry,
    JointFeedback,
}

/// Copy of one sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldSnapshot {
    SelfState(SelfState),
    Ball(BallObservation),
    GameControl(GameControlData),
    Roster(Vec<RosterEntry>),
    Remote(RemoteCommand),
    SupportFoot(SupportFoot),
    Power(PowerState),
    Buttons(ButtonState),
    Odometry(Odometry),
    JointFeedback(JointDegrees),
}
