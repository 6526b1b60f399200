//! `strider-types` – shared vocabulary of the locomotion core.
//!
//! Every crate in the workspace speaks in these types: joint-degree maps
//! travelling from motion producers to the actuator bus, the operating mode
//! that gates those producers, the sensor events pushed into the world model,
//! and the single [`StriderError`] type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Servo identifier on the actuator bus.
pub type JointId = u8;

/// Target angle per joint, in degrees.
pub type JointDegrees = BTreeMap<JointId, f32>;

// ────────────────────────────────────────────────────────────────────────────
// Motion arbitration
// ────────────────────────────────────────────────────────────────────────────

/// Coarse state of the motion system.  Decides which [`MotionProducer`] may
/// drive the body joints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Neutral stance; the gait engine decelerates here between bouts.
    #[default]
    Ready,
    /// A scripted action owns the body.
    Act,
    /// The gait engine owns the body.
    Walk,
    /// Motion halted (safe stop or shutdown); only a stance pose may be held.
    Stopped,
}

impl OperatingMode {
    /// Whether `producer` may write body joints while in this mode.
    pub fn admits(self, producer: MotionProducer) -> bool {
        matches!(
            (self, producer),
            (OperatingMode::Ready, MotionProducer::Gait)
                | (OperatingMode::Ready, MotionProducer::Stance)
                | (OperatingMode::Walk, MotionProducer::Gait)
                | (OperatingMode::Act, MotionProducer::Action)
                | (OperatingMode::Stopped, MotionProducer::Stance)
        )
    }
}

/// Identity of a component writing body joint targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionProducer {
    Gait,
    Action,
    Stance,
}

/// Who asked for a mode change.  Only the action engine may complete an ACT
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeSource {
    Gait,
    Action,
    Behavior,
    Supervisor,
}

/// One body command as it sits in the outgoing mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCommand {
    pub producer: MotionProducer,
    pub degrees: JointDegrees,
}

// ────────────────────────────────────────────────────────────────────────────
// Robot state
// ────────────────────────────────────────────────────────────────────────────

/// Direction the robot is falling (or lying) in, derived from trunk pitch
/// and roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallDirection {
    #[default]
    None,
    Forward,
    Backward,
    Left,
    Right,
}

impl FallDirection {
    /// Classify a trunk attitude.  Pitch dominates roll; angles within
    /// `threshold_deg` of upright are [`FallDirection::None`].
    pub fn classify(pitch_deg: f32, roll_deg: f32, threshold_deg: f32) -> Self {
        if pitch_deg > threshold_deg {
            FallDirection::Forward
        } else if pitch_deg < -threshold_deg {
            FallDirection::Backward
        } else if roll_deg > threshold_deg {
            FallDirection::Left
        } else if roll_deg < -threshold_deg {
            FallDirection::Right
        } else {
            FallDirection::None
        }
    }
}

/// Which leg currently bears the load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportFoot {
    #[default]
    Double,
    Left,
    Right,
}

/// Raw IMU sample.  Angles are in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    /// Linear acceleration (x, y, z), m/s².
    pub accel: [f32; 3],
    /// Angular velocity (x, y, z), deg/s.
    pub gyro: [f32; 3],
}

/// Payload of an ORIENTATION event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationReading {
    pub imu: ImuData,
    /// The IMU reader lost its serial link; values are the last known ones.
    pub lost: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    pub button_1: bool,
    pub button_2: bool,
}

/// Primary game phase announced by the game controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Initial,
    Ready,
    Set,
    Playing,
    Finished,
}

/// Snapshot of the latest game-controller packet relevant to this robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameControlData {
    pub state: GameState,
    pub secondary_state: u8,
    pub first_half: bool,
    pub kick_off_team: u8,
    pub secs_remaining: i16,
    pub our_score: u8,
    pub their_score: u8,
    /// This robot is currently penalized.
    pub penalized: bool,
}

/// Report a robot broadcasts about itself (or that we keep about ourselves).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u8,
    pub x: f32,
    pub y: f32,
    pub dir: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub can_see: bool,
}

/// Payload of a JOINT_FEEDBACK event, published by the motor driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointFeedback {
    /// Bus voltage in volts, `0.0` until the first successful read.
    pub voltage: f32,
    pub low_power: bool,
    pub connected: bool,
    pub degrees: JointDegrees,
}

/// Metadata of a captured camera frame.  Pixels stay with the vision stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
}

/// Operator command received by the remote-control server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RemoteCommand {
    #[default]
    None,
    Walk {
        step: f32,
        lateral: f32,
        turn_deg: f32,
        enabled: bool,
    },
    Action(String),
    Look {
        yaw_deg: f32,
        pitch_deg: f32,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor events
// ────────────────────────────────────────────────────────────────────────────

/// Discriminant of a [`SensorPayload`], used for subscription routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Orientation,
    Button,
    GameControl,
    TeammateMsg,
    JointFeedback,
    CameraFrame,
}

impl SensorKind {
    pub const ALL: [SensorKind; 6] = [
        SensorKind::Orientation,
        SensorKind::Button,
        SensorKind::GameControl,
        SensorKind::TeammateMsg,
        SensorKind::JointFeedback,
        SensorKind::CameraFrame,
    ];
}

/// Typed sensor data.  The shape of each variant is fixed per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorPayload {
    Orientation(OrientationReading),
    Button(ButtonState),
    GameControl(GameControlData),
    TeammateMsg(PlayerInfo),
    JointFeedback(JointFeedback),
    CameraFrame(CameraFrame),
}

impl SensorPayload {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorPayload::Orientation(_) => SensorKind::Orientation,
            SensorPayload::Button(_) => SensorKind::Button,
            SensorPayload::GameControl(_) => SensorKind::GameControl,
            SensorPayload::TeammateMsg(_) => SensorKind::TeammateMsg,
            SensorPayload::JointFeedback(_) => SensorKind::JointFeedback,
            SensorPayload::CameraFrame(_) => SensorKind::CameraFrame,
        }
    }
}

/// A stamped sensor event as pushed through the sensor hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub timestamp: DateTime<Utc>,
    /// e.g. `"imu"`, `"motor"`, `"gamectrl"`
    pub source: String,
    pub payload: SensorPayload,
}

impl SensorEvent {
    /// Stamp `payload` with the current time.
    pub fn new(source: impl Into<String>, payload: SensorPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.payload.kind()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every crate of the core.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StriderError {
    #[error("Failed to open device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Pose not reachable: {0}")]
    Unreachable(String),

    #[error("Actuator bus not connected")]
    NotConnected,

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Thread Error: {0}")]
    Thread(String),
}
