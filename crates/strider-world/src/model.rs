//! [`WorldModel`] – concurrently read and written fusion store.
//!
//! Sensor threads push events through the [`SensorHub`][strider_middleware::SensorHub],
//! the gait thread writes odometry, the behavior tick reads everything.  Each
//! sub-record sits behind its own lock so a writer of one record never blocks
//! readers of another.  There is no atomicity across records: a reader that
//! needs two of them takes two snapshots.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strider_middleware::SensorHub;
//! use strider_types::{GameControlData, GameState, SensorEvent, SensorKind, SensorPayload};
//! use strider_world::{WorldConfig, WorldModel};
//!
//! let hub = SensorHub::new();
//! let world = Arc::new(WorldModel::new(WorldConfig::default()));
//! hub.attach(SensorKind::GameControl, world.clone());
//!
//! hub.publish(SensorEvent::new(
//!     "gamectrl",
//!     SensorPayload::GameControl(GameControlData {
//!         state: GameState::Set,
//!         ..GameControlData::default()
//!     }),
//! ));
//! assert_eq!(world.game_control().state, GameState::Set);
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use strider_middleware::SensorSubscriber;
use strider_types::{
    ButtonState, FallDirection, GameControlData, JointDegrees, JointFeedback, OrientationReading,
    PlayerInfo, RemoteCommand, SensorEvent, SensorPayload, SupportFoot,
};
use tracing::{debug, info, warn};

use crate::records::{
    BallObservation, Odometry, PowerState, RosterEntry, SelfState, SubRecord, WorldConfig,
    WorldSnapshot,
};

struct Heard {
    info: PlayerInfo,
    heard_at: Instant,
    stale: bool,
}

/// The shared world model.  Construct once and hand out `Arc` clones.
pub struct WorldModel {
    config: WorldConfig,
    self_state: RwLock<SelfState>,
    ball: RwLock<BallObservation>,
    game_control: RwLock<GameControlData>,
    roster: RwLock<BTreeMap<u8, Heard>>,
    remote: RwLock<RemoteCommand>,
    support_foot: RwLock<SupportFoot>,
    power: RwLock<PowerState>,
    buttons: RwLock<ButtonState>,
    odometry: RwLock<Odometry>,
    joint_degrees: RwLock<JointDegrees>,
}

impl WorldModel {
    pub fn new(config: WorldConfig) -> Self {
        let mut roster = BTreeMap::new();
        roster.insert(
            config.player_id,
            Heard {
                info: PlayerInfo {
                    id: config.player_id,
                    ..PlayerInfo::default()
                },
                heard_at: Instant::now(),
                stale: false,
            },
        );
        Self {
            config,
            self_state: RwLock::new(SelfState::default()),
            ball: RwLock::new(BallObservation::default()),
            game_control: RwLock::new(GameControlData::default()),
            roster: RwLock::new(roster),
            remote: RwLock::new(RemoteCommand::None),
            support_foot: RwLock::new(SupportFoot::default()),
            power: RwLock::new(PowerState::default()),
            buttons: RwLock::new(ButtonState::default()),
            odometry: RwLock::new(Odometry::default()),
            joint_degrees: RwLock::new(JointDegrees::new()),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ─── Writers ────────────────────────────────────────────────────────────

    fn apply_orientation(&self, reading: &OrientationReading) {
        let fall = FallDirection::classify(
            reading.imu.pitch,
            reading.imu.roll,
            self.config.fall_threshold_deg,
        );
        let previous = {
            let mut s = self.self_state.write();
            let previous = (s.fall, s.imu_lost);
            s.imu = reading.imu;
            s.imu_lost = reading.lost;
            s.fall = fall;
            s.dir = reading.imu.yaw;
            previous
        };
        self.update_own_entry(|info| info.dir = reading.imu.yaw);

        if previous.0 != fall {
            info!(fall = ?fall, pitch = reading.imu.pitch, roll = reading.imu.roll, "fall state changed");
        }
        if reading.lost && !previous.1 {
            warn!("IMU link lost, keeping last orientation");
        }
    }

    fn apply_joint_feedback(&self, feedback: &JointFeedback) {
        {
            let mut power = self.power.write();
            if feedback.low_power && !power.low_power {
                warn!(voltage = feedback.voltage, "supply voltage low");
            }
            *power = PowerState {
                low_power: feedback.low_power,
                connected: feedback.connected,
                voltage: feedback.voltage,
            };
        }
        *self.joint_degrees.write() = feedback.degrees.clone();
    }

    fn upsert_teammate(&self, info: PlayerInfo) {
        let mut roster = self.roster.write();
        roster.insert(
            info.id,
            Heard {
                info,
                heard_at: Instant::now(),
                stale: false,
            },
        );
    }

    fn update_own_entry(&self, f: impl FnOnce(&mut PlayerInfo)) {
        let id = self.config.player_id;
        let mut roster = self.roster.write();
        let entry = roster.entry(id).or_insert_with(|| Heard {
            info: PlayerInfo {
                id,
                ..PlayerInfo::default()
            },
            heard_at: Instant::now(),
            stale: false,
        });
        f(&mut entry.info);
        entry.heard_at = Instant::now();
        entry.stale = false;
    }

    /// Store a ball observation produced by the vision stack.  A visible ball
    /// resets the staleness counter and is mirrored into the local robot's
    /// roster entry.
    pub fn set_ball_observation(&self, mut observation: BallObservation) {
        if observation.visible {
            observation.stale_frames = 0;
        }
        *self.ball.write() = observation;
        self.update_own_entry(|info| {
            info.ball_x = observation.global[0];
            info.ball_y = observation.global[1];
            info.can_see = observation.visible;
        });
    }

    /// Store the localized global pose.  `dir` is in degrees.
    pub fn set_self_pose(&self, x: f32, y: f32, dir: f32) {
        {
            let mut s = self.self_state.write();
            s.x = x;
            s.y = y;
            s.dir = dir;
        }
        self.update_own_entry(|info| {
            info.x = x;
            info.y = y;
            info.dir = dir;
        });
    }

    /// Record the velocity the gait realized in one cycle and integrate it
    /// into the dead-reckoned pose.
    pub fn record_odometry(&self, velocity: [f64; 3]) {
        let mut odo = self.odometry.write();
        let (sin, cos) = odo.dir.sin_cos();
        odo.x += velocity[0] * cos - velocity[1] * sin;
        odo.y += velocity[0] * sin + velocity[1] * cos;
        odo.dir += velocity[2];
        odo.velocity = velocity;
        odo.cycles += 1;
    }

    pub fn set_support_foot(&self, foot: SupportFoot) {
        *self.support_foot.write() = foot;
    }

    pub fn set_remote_command(&self, command: RemoteCommand) {
        debug!(command = ?command, "remote command received");
        *self.remote.write() = command;
    }

    pub fn reset_remote_command(&self) {
        *self.remote.write() = RemoteCommand::None;
    }

    /// Forget which teammates see the ball.  The local robot's own entry and
    /// every positional field are left alone.
    pub fn reset_hear_info(&self) {
        let own = self.config.player_id;
        for (id, heard) in self.roster.write().iter_mut() {
            if *id != own {
                heard.info.can_see = false;
            }
        }
    }

    // ─── Readers ────────────────────────────────────────────────────────────

    pub fn self_state(&self) -> SelfState {
        *self.self_state.read()
    }

    pub fn fall_direction(&self) -> FallDirection {
        self.self_state.read().fall
    }

    pub fn ball(&self) -> BallObservation {
        *self.ball.read()
    }

    /// Whether the ball was seen within the last `ball_stale_frames` frames.
    pub fn ball_is_fresh(&self) -> bool {
        let ball = self.ball.read();
        ball.visible && ball.stale_frames < self.config.ball_stale_frames
    }

    pub fn game_control(&self) -> GameControlData {
        self.game_control.read().clone()
    }

    /// Every roster entry, ordered by id.  Entries not heard from within the
    /// stale window are flagged, never evicted; the local robot never goes
    /// stale.
    pub fn players(&self) -> Vec<RosterEntry> {
        let stale_after = Duration::from_millis(self.config.roster_stale_after_ms);
        let own = self.config.player_id;
        let mut roster = self.roster.write();
        roster
            .iter_mut()
            .map(|(id, heard)| {
                if *id != own && heard.heard_at.elapsed() > stale_after {
                    heard.stale = true;
                }
                RosterEntry {
                    info: heard.info,
                    stale: heard.stale,
                }
            })
            .collect()
    }

    pub fn player(&self, id: u8) -> Option<PlayerInfo> {
        self.roster.read().get(&id).map(|h| h.info)
    }

    pub fn remote_command(&self) -> RemoteCommand {
        self.remote.read().clone()
    }

    pub fn support_foot(&self) -> SupportFoot {
        *self.support_foot.read()
    }

    pub fn power(&self) -> PowerState {
        *self.power.read()
    }

    pub fn buttons(&self) -> ButtonState {
        *self.buttons.read()
    }

    pub fn odometry(&self) -> Odometry {
        *self.odometry.read()
    }

    pub fn joint_degrees(&self) -> JointDegrees {
        self.joint_degrees.read().clone()
    }

    /// Copy out one sub-record.
    pub fn snapshot(&self, record: SubRecord) -> WorldSnapshot {
        match record {
            SubRecord::SelfState => WorldSnapshot::SelfState(self.self_state()),
            SubRecord::Ball => WorldSnapshot::Ball(self.ball()),
            SubRecord::GameControl => WorldSnapshot::GameControl(self.game_control()),
            SubRecord::Roster => WorldSnapshot::Roster(self.players()),
            SubRecord::Remote => WorldSnapshot::Remote(self.remote_command()),
            SubRecord::SupportFoot => WorldSnapshot::SupportFoot(self.support_foot()),
            SubRecord::Power => WorldSnapshot::Power(self.power()),
            SubRecord::Buttons => WorldSnapshot::Buttons(self.buttons()),
            SubRecord::Odometry => WorldSnapshot::Odometry(self.odometry()),
            SubRecord::JointFeedback => WorldSnapshot::JointFeedback(self.joint_degrees()),
        }
    }
}

impl SensorSubscriber for WorldModel {
    fn on_sensor_event(&self, event: &SensorEvent) {
        match &event.payload {
            SensorPayload::Orientation(reading) => self.apply_orientation(reading),
            SensorPayload::Button(state) => *self.buttons.write() = *state,
            SensorPayload::GameControl(data) => {
                let mut gc = self.game_control.write();
                if gc.state != data.state {
                    info!(from = ?gc.state, to = ?data.state, "game state changed");
                }
                *gc = data.clone();
            }
            SensorPayload::TeammateMsg(info) => self.upsert_teammate(*info),
            SensorPayload::JointFeedback(feedback) => self.apply_joint_feedback(feedback),
            SensorPayload::CameraFrame(_) => {
                let mut ball = self.ball.write();
                ball.stale_frames = ball.stale_frames.saturating_add(1);
            }
        }
    }
}
