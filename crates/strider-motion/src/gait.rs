//! [`GaitEngine`] – the fixed-frequency walk thread.
//!
//! One gait cycle (one full two-step period) is produced per loop
//! iteration:
//!
//! 1. copy the [`GaitParameters`] under their lock;
//! 2. in `Ready` zero the directional gains; in `Walk` with the walk
//!    disabled, request `Ready` and skip;
//! 3. if the new direction conflicts with the one applied last cycle, zero
//!    all three gains ([`resolve_direction_conflict`]);
//! 4. integrate `floor(control_hz / freq) + 1` sub-steps through the
//!    [`WalkSolver`], pushing each result into the body mailbox with bounded
//!    backoff;
//! 5. persist the applied gains, record them as odometry and, when the cycle
//!    ran in `Ready`, disable the walk and leave `Ready`.
//!
//! Every solved sub-step also publishes the support foot to the world
//! model; a cycle that does not step reports both feet down.
//!
//! A fallen robot never steps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strider_hal::RobotModel;
use strider_hal::robot::joints;
use strider_middleware::SensorSubscriber;
use strider_types::{
    FallDirection, JointDegrees, JointId, ModeSource, MotionProducer, OperatingMode, SensorEvent,
    SensorPayload, StriderError, SupportFoot,
};
use strider_world::WorldModel;
use tracing::{debug, info, warn};

use crate::adapter::{EnqueueOutcome, MotionAdapter};
use crate::ik::{IkWalk, LegAngles, WalkOutput, WalkSolver};
use crate::params::GaitParameters;
use crate::worker::PeriodicWorker;

const ZERO_TOLERANCE: f64 = 1e-6;

fn is_zero(v: f64) -> bool {
    v.abs() < ZERO_TOLERANCE
}

/// Arm joint targets held while walking, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmPose {
    pub left_shoulder_pitch: f32,
    pub left_elbow: f32,
    pub right_shoulder_pitch: f32,
    pub right_elbow: f32,
}

impl Default for ArmPose {
    fn default() -> Self {
        Self {
            left_shoulder_pitch: 40.0,
            left_elbow: -90.0,
            right_shoulder_pitch: 40.0,
            right_elbow: 90.0,
        }
    }
}

/// `[gait]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitConfig {
    /// Sub-step rate, Hz.
    pub control_hz: f64,
    pub fall_threshold_deg: f32,
    pub params: GaitParameters,
    pub arm_pose: ArmPose,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            control_hz: 50.0,
            fall_threshold_deg: 40.0,
            params: GaitParameters::default(),
            arm_pose: ArmPose::default(),
        }
    }
}

/// State owned by the gait loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaitPhaseState {
    pub phase: f64,
    /// Walk time integrated so far, seconds.
    pub time: f64,
    /// Gains applied during the previous cycle.
    pub x0: f64,
    pub y0: f64,
    pub d0: f64,
}

/// What one call to [`GaitEngine::step_cycle`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleReport {
    /// A walk cycle was integrated.
    pub ran: bool,
    pub substeps_sent: usize,
    pub ik_failures: usize,
    /// Sub-steps dropped because the mailbox stayed full.
    pub starved: usize,
    /// The mode stopped admitting the gait mid-cycle.
    pub rejected: bool,
    /// `(step, lateral, turn)` actually applied.
    pub applied: [f64; 3],
}

/// Zero every gain when the requested direction conflicts with the previous
/// cycle's: stepping while the last cycle moved sideways or turned, moving
/// sideways after stepping or turning, turning after stepping or moving
/// sideways.  Changing direction therefore always passes through one cycle
/// in place.
pub fn resolve_direction_conflict(gains: [f64; 3], last: [f64; 3]) -> [f64; 3] {
    let [step, lateral, turn] = gains;
    let [x0, y0, d0] = last;
    let conflict = (!is_zero(step) && (!is_zero(y0) || !is_zero(d0)))
        || (!is_zero(lateral) && (!is_zero(x0) || !is_zero(d0)))
        || (!is_zero(turn) && (!is_zero(x0) || !is_zero(y0)));
    if conflict { [0.0; 3] } else { gains }
}

/// Foot on the ground at walk `phase`.  The left leg swings during the
/// first `swing_len` of the cycle, the right leg half a cycle later; in
/// between both feet are down.
pub fn support_foot_at(phase: f64, support_phase_ratio: f64) -> SupportFoot {
    let swing_len = (0.5 * (1.0 - support_phase_ratio)).clamp(0.05, 0.5);
    if phase.rem_euclid(1.0) < swing_len {
        SupportFoot::Right
    } else if (phase + 0.5).rem_euclid(1.0) < swing_len {
        SupportFoot::Left
    } else {
        SupportFoot::Double
    }
}

struct LegJointIds {
    hip_yaw: JointId,
    hip_roll: JointId,
    hip_pitch: JointId,
    knee: JointId,
    ankle_pitch: JointId,
    ankle_roll: JointId,
}

impl LegJointIds {
    fn resolve(model: &RobotModel, names: [&str; 6]) -> Result<Self, StriderError> {
        Ok(Self {
            hip_yaw: model.require(names[0])?,
            hip_roll: model.require(names[1])?,
            hip_pitch: model.require(names[2])?,
            knee: model.require(names[3])?,
            ankle_pitch: model.require(names[4])?,
            ankle_roll: model.require(names[5])?,
        })
    }

    fn write(&self, angles: &LegAngles, out: &mut JointDegrees) {
        out.insert(self.hip_yaw, angles.hip_yaw.to_degrees() as f32);
        out.insert(self.hip_roll, angles.hip_roll.to_degrees() as f32);
        out.insert(self.hip_pitch, angles.hip_pitch.to_degrees() as f32);
        out.insert(self.knee, angles.knee.to_degrees() as f32);
        out.insert(self.ankle_pitch, angles.ankle_pitch.to_degrees() as f32);
        out.insert(self.ankle_roll, angles.ankle_roll.to_degrees() as f32);
    }
}

struct GaitJoints {
    left: LegJointIds,
    right: LegJointIds,
    arms: [(JointId, f32); 4],
}

impl GaitJoints {
    fn resolve(model: &RobotModel, arm_pose: &ArmPose) -> Result<Self, StriderError> {
        Ok(Self {
            left: LegJointIds::resolve(
                model,
                [
                    joints::LEFT_HIP_YAW,
                    joints::LEFT_HIP_ROLL,
                    joints::LEFT_HIP_PITCH,
                    joints::LEFT_KNEE,
                    joints::LEFT_ANKLE_PITCH,
                    joints::LEFT_ANKLE_ROLL,
                ],
            )?,
            right: LegJointIds::resolve(
                model,
                [
                    joints::RIGHT_HIP_YAW,
                    joints::RIGHT_HIP_ROLL,
                    joints::RIGHT_HIP_PITCH,
                    joints::RIGHT_KNEE,
                    joints::RIGHT_ANKLE_PITCH,
                    joints::RIGHT_ANKLE_ROLL,
                ],
            )?,
            arms: [
                (model.require(joints::LEFT_SHOULDER_PITCH)?, arm_pose.left_shoulder_pitch),
                (model.require(joints::LEFT_ELBOW)?, arm_pose.left_elbow),
                (model.require(joints::RIGHT_SHOULDER_PITCH)?, arm_pose.right_shoulder_pitch),
                (model.require(joints::RIGHT_ELBOW)?, arm_pose.right_elbow),
            ],
        })
    }

    fn degrees(&self, output: &WalkOutput) -> JointDegrees {
        let mut out = JointDegrees::new();
        self.left.write(&output.left, &mut out);
        self.right.write(&output.right, &mut out);
        out.extend(self.arms);
        out
    }
}

/// The walk engine.  Construct with [`GaitEngine::new`], attach it to the
/// sensor hub for ORIENTATION, then [`start`][GaitEngine::start] it.
pub struct GaitEngine {
    control_hz: f64,
    fall_threshold_deg: f32,
    params: Mutex<GaitParameters>,
    state: Mutex<GaitPhaseState>,
    solver: Box<dyn WalkSolver>,
    joints: GaitJoints,
    adapter: Arc<MotionAdapter>,
    world: Arc<WorldModel>,
    fallen: AtomicBool,
    cycles: AtomicU64,
    worker: PeriodicWorker,
}

impl GaitEngine {
    /// Build an engine with the built-in [`IkWalk`] solver.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::Config`] when the robot model lacks a leg or
    /// arm joint, or when `control_hz` is not positive.
    pub fn new(
        config: GaitConfig,
        model: &RobotModel,
        adapter: Arc<MotionAdapter>,
        world: Arc<WorldModel>,
    ) -> Result<Arc<Self>, StriderError> {
        Self::with_solver(config, model, adapter, world, Box::new(IkWalk))
    }

    pub fn with_solver(
        config: GaitConfig,
        model: &RobotModel,
        adapter: Arc<MotionAdapter>,
        world: Arc<WorldModel>,
        solver: Box<dyn WalkSolver>,
    ) -> Result<Arc<Self>, StriderError> {
        if config.control_hz <= 0.0 {
            return Err(StriderError::Config(format!(
                "gait.control_hz must be positive, got {}",
                config.control_hz
            )));
        }
        Ok(Arc::new(Self {
            control_hz: config.control_hz,
            fall_threshold_deg: config.fall_threshold_deg,
            params: Mutex::new(config.params),
            state: Mutex::new(GaitPhaseState::default()),
            solver,
            joints: GaitJoints::resolve(model, &config.arm_pose)?,
            adapter,
            world,
            fallen: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            worker: PeriodicWorker::new("gait"),
        }))
    }

    /// Set the dynamic gains.  `turn_deg` is converted to radians, `enabled`
    /// to `1.0` / `0.0`.
    pub fn set_params(&self, step: f64, lateral: f64, turn_deg: f64, enabled: bool) {
        let mut p = self.params.lock();
        p.step_gain = step;
        p.lateral_gain = lateral;
        p.turn_gain = turn_deg.to_radians();
        p.enabled_gain = if enabled { 1.0 } else { 0.0 };
    }

    /// Apply an arbitrary multi-field update atomically.
    pub fn update_params(&self, f: impl FnOnce(&mut GaitParameters)) {
        f(&mut self.params.lock());
    }

    pub fn params(&self) -> GaitParameters {
        *self.params.lock()
    }

    pub fn phase_state(&self) -> GaitPhaseState {
        *self.state.lock()
    }

    pub fn is_fallen(&self) -> bool {
        self.fallen.load(Ordering::SeqCst)
    }

    /// Number of loop iterations so far; used as a liveness counter.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run one gait cycle.  Called by the engine thread; public so tests
    /// and tools can step the gait synchronously.
    pub fn step_cycle(&self) -> CycleReport {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let report = self.run_cycle();
        if !report.ran {
            self.world.set_support_foot(SupportFoot::Double);
        }
        report
    }

    fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut params = *self.params.lock();
        let mode = self.adapter.mode();
        match mode {
            OperatingMode::Ready => params.zero_gains(),
            OperatingMode::Walk if !params.is_enabled() => {
                self.adapter
                    .request_mode_change(ModeSource::Gait, OperatingMode::Ready);
                return report;
            }
            OperatingMode::Walk => {}
            OperatingMode::Act | OperatingMode::Stopped => return report,
        }
        if !params.is_enabled() || self.is_fallen() {
            return report;
        }
        if params.freq <= 0.0 {
            warn!(freq = params.freq, "gait frequency not positive, cycle skipped");
            return report;
        }

        let mut state = self.state.lock();
        let last = [state.x0, state.y0, state.d0];
        let gains = resolve_direction_conflict(params.gains(), last);
        if gains != params.gains() {
            debug!(requested = ?params.gains(), last = ?last, "direction change, stepping in place");
        }
        params.step_gain = gains[0];
        params.lateral_gain = gains[1];
        params.turn_gain = gains[2];

        let dt = 1.0 / self.control_hz;
        let budget = Duration::from_secs_f64(dt);
        let substeps = (self.control_hz / params.freq).floor() as usize + 1;
        report.ran = true;

        for _ in 0..substeps {
            state.time += dt;
            match self.solver.solve(&params, dt, &mut state.phase) {
                Err(e) => {
                    warn!(error = %e, time = state.time, "walk sub-step skipped");
                    report.ik_failures += 1;
                }
                Ok(output) => {
                    self.world
                        .set_support_foot(support_foot_at(state.phase, params.support_phase_ratio));
                    let degrees = self.joints.degrees(&output);
                    match self
                        .adapter
                        .enqueue_with_backoff(MotionProducer::Gait, degrees, budget)
                    {
                        EnqueueOutcome::Accepted => report.substeps_sent += 1,
                        EnqueueOutcome::TimedOut => {
                            warn!(time = state.time, "joint command mailbox full, sub-step dropped");
                            report.starved += 1;
                        }
                        EnqueueOutcome::Rejected => {
                            report.rejected = true;
                            break;
                        }
                    }
                }
            }
        }

        state.x0 = gains[0];
        state.y0 = gains[1];
        state.d0 = gains[2];
        drop(state);
        report.applied = gains;
        self.world.record_odometry(gains);

        if self.adapter.mode() == OperatingMode::Ready {
            self.params.lock().enabled_gain = 0.0;
            self.adapter.leave_ready(ModeSource::Gait);
        }
        report
    }

    /// Neutral standing pose: the walk solved at phase zero with no gains,
    /// no foot lift and no trunk swing, plus the arm pose.
    ///
    /// # Errors
    ///
    /// Returns the solver's error when the pose is out of reach.
    pub fn stance_pose(&self) -> Result<JointDegrees, StriderError> {
        let mut params = *self.params.lock();
        params.zero_gains();
        params.rise_gain = 0.0;
        params.swing_gain = 0.0;
        params.swing_roll_gain = 0.0;
        let mut phase = 0.0;
        let output = self.solver.solve(&params, 0.0, &mut phase)?;
        Ok(self.joints.degrees(&output))
    }

    /// Offer the stance pose to the body mailbox as the stance producer.
    /// Never blocks; `false` when the pose could not be solved or the
    /// current mode does not admit stance commands.
    pub fn hold_stance(&self) -> bool {
        match self.stance_pose() {
            Ok(degrees) => self
                .adapter
                .enqueue_joint_degrees(MotionProducer::Stance, degrees),
            Err(e) => {
                warn!(error = %e, "stance pose unreachable");
                false
            }
        }
    }

    pub fn start(self: &Arc<Self>) -> Result<(), StriderError> {
        let engine = Arc::downgrade(self);
        self.worker
            .start(Duration::from_secs_f64(1.0 / self.control_hz), move || {
                match engine.upgrade() {
                    Some(engine) => {
                        engine.step_cycle();
                        true
                    }
                    None => false,
                }
            })
    }

    pub fn stop(&self) {
        self.worker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl SensorSubscriber for GaitEngine {
    fn on_sensor_event(&self, event: &SensorEvent) {
        if let SensorPayload::Orientation(reading) = &event.payload {
            let fall = FallDirection::classify(
                reading.imu.pitch,
                reading.imu.roll,
                self.fall_threshold_deg,
            );
            let fallen = fall != FallDirection::None;
            if self.fallen.swap(fallen, Ordering::SeqCst) != fallen {
                info!(fall = ?fall, "gait fall state changed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread::{self, JoinHandle};
    use strider_hal::JointCommandSource;
    use strider_types::{ImuData, OrientationReading};
    use strider_world::WorldConfig;

    struct Fixture {
        gait: Arc<GaitEngine>,
        adapter: Arc<MotionAdapter>,
        world: Arc<WorldModel>,
    }

    fn fixture() -> Fixture {
        let adapter = Arc::new(MotionAdapter::new());
        let world = Arc::new(WorldModel::new(WorldConfig::default()));
        let gait = GaitEngine::new(
            GaitConfig::default(),
            &RobotModel::default(),
            adapter.clone(),
            world.clone(),
        )
        .unwrap();
        Fixture {
            gait,
            adapter,
            world,
        }
    }

    fn into_walk(adapter: &MotionAdapter) {
        adapter.leave_ready(ModeSource::Gait);
        adapter.request_mode_change(ModeSource::Action, OperatingMode::Walk);
        assert_eq!(adapter.mode(), OperatingMode::Walk);
    }

    /// Consumer standing in for the motor driver.
    struct Drain {
        stop: Arc<AtomicBool>,
        received: Arc<AtomicUsize>,
        handle: JoinHandle<()>,
    }

    impl Drain {
        fn spawn(adapter: &Arc<MotionAdapter>) -> Self {
            let stop = Arc::new(AtomicBool::new(false));
            let received = Arc::new(AtomicUsize::new(0));
            let handle = {
                let adapter = Arc::clone(adapter);
                let stop = Arc::clone(&stop);
                let received = Arc::clone(&received);
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        if adapter.take_body().is_some() {
                            received.fetch_add(1, Ordering::SeqCst);
                        } else {
                            thread::yield_now();
                        }
                    }
                })
            };
            Self {
                stop,
                received,
                handle,
            }
        }

        fn finish(self) -> usize {
            self.stop.store(true, Ordering::SeqCst);
            self.handle.join().unwrap();
            self.received.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn tie_break_keeps_a_fresh_start() {
        assert_eq!(
            resolve_direction_conflict([0.05, 0.0, 0.0], [0.0, 0.0, 0.0]),
            [0.05, 0.0, 0.0]
        );
    }

    #[test]
    fn tie_break_zeroes_direction_switch() {
        assert_eq!(
            resolve_direction_conflict([0.0, 0.03, 0.0], [0.05, 0.0, 0.0]),
            [0.0; 3]
        );
        assert_eq!(
            resolve_direction_conflict([0.0, 0.0, 0.2], [0.0, 0.02, 0.0]),
            [0.0; 3]
        );
        assert_eq!(
            resolve_direction_conflict([0.04, 0.0, 0.0], [0.0, 0.0, -0.1]),
            [0.0; 3]
        );
    }

    #[test]
    fn tie_break_allows_same_direction() {
        assert_eq!(
            resolve_direction_conflict([0.03, 0.0, 0.0], [0.05, 0.0, 0.0]),
            [0.03, 0.0, 0.0]
        );
    }

    #[test]
    fn set_params_converts_units() {
        let f = fixture();
        f.gait.set_params(0.02, -0.01, 90.0, true);
        let p = f.gait.params();
        assert_eq!(p.step_gain, 0.02);
        assert_eq!(p.lateral_gain, -0.01);
        assert!((p.turn_gain - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(p.enabled_gain, 1.0);
        f.gait.set_params(0.0, 0.0, 0.0, false);
        assert_eq!(f.gait.params().enabled_gain, 0.0);
    }

    #[test]
    fn support_foot_follows_the_leg_phase() {
        assert_eq!(support_foot_at(0.2, 0.1), SupportFoot::Right);
        assert_eq!(support_foot_at(0.7, 0.1), SupportFoot::Left);
        assert_eq!(support_foot_at(0.47, 0.1), SupportFoot::Double);
        assert_eq!(support_foot_at(0.97, 0.1), SupportFoot::Double);
    }

    #[test]
    fn disabled_walk_requests_ready() {
        let f = fixture();
        into_walk(&f.adapter);
        f.world.set_support_foot(SupportFoot::Left);
        let report = f.gait.step_cycle();
        assert!(!report.ran);
        assert_eq!(f.world.support_foot(), SupportFoot::Double);
        assert_eq!(f.adapter.mode(), OperatingMode::Ready);
    }

    #[test]
    fn ready_cycle_steps_in_place_then_leaves_ready() {
        let f = fixture();
        f.gait.set_params(0.04, 0.0, 0.0, true);
        let drain = Drain::spawn(&f.adapter);
        let report = f.gait.step_cycle();
        let received = drain.finish();

        assert!(report.ran);
        assert_eq!(report.applied, [0.0; 3]);
        // floor(50 / 1.5) + 1
        assert_eq!(report.substeps_sent, 34);
        assert!(received <= 34);
        assert_eq!(f.gait.params().enabled_gain, 0.0);
        // Last mode was READY (initial), so the exit goes to ACT.
        assert_eq!(f.adapter.mode(), OperatingMode::Act);
        assert_eq!(f.world.odometry().cycles, 1);
    }

    #[test]
    fn walk_cycle_applies_and_persists_gains() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.set_params(0.04, 0.0, 0.0, true);

        let drain = Drain::spawn(&f.adapter);
        let first = f.gait.step_cycle();
        assert_eq!(first.applied, [0.04, 0.0, 0.0]);
        assert_eq!(first.substeps_sent, 34);
        assert_eq!(f.gait.phase_state().x0, 0.04);
        assert_eq!(f.world.odometry().velocity, [0.04, 0.0, 0.0]);
        // 34 sub-steps of 0.03 cycle end just past the phase origin.
        assert_eq!(f.world.support_foot(), SupportFoot::Right);

        // Switching straight to a side step passes through a cycle in place.
        f.gait.set_params(0.0, 0.03, 0.0, true);
        let second = f.gait.step_cycle();
        assert_eq!(second.applied, [0.0; 3]);
        let third = f.gait.step_cycle();
        drain.finish();
        assert_eq!(third.applied, [0.0, 0.03, 0.0]);
        assert_eq!(f.adapter.mode(), OperatingMode::Walk);
    }

    #[test]
    fn commands_carry_the_arm_pose() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.set_params(0.0, 0.0, 0.0, true);

        let adapter = Arc::clone(&f.adapter);
        let reader = thread::spawn(move || {
            loop {
                if let Some(cmd) = adapter.take_body() {
                    return cmd;
                }
                thread::yield_now();
            }
        });
        let gait = Arc::clone(&f.gait);
        let stepper = thread::spawn(move || gait.step_cycle());
        let cmd = reader.join().unwrap();
        let drain = Drain::spawn(&f.adapter);
        stepper.join().unwrap();
        drain.finish();

        assert_eq!(cmd.producer, MotionProducer::Gait);
        assert_eq!(cmd.degrees.len(), 16);
        assert_eq!(cmd.degrees[&6], 40.0);
        assert_eq!(cmd.degrees[&8], -90.0);
        assert_eq!(cmd.degrees[&5], 90.0);
    }

    #[test]
    fn unconsumed_mailbox_starves_but_does_not_block() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.update_params(|p| {
            p.enabled_gain = 1.0;
            p.freq = 25.0;
        });
        // floor(50 / 25) + 1 = 3 sub-steps; the first fills the slot.
        let report = f.gait.step_cycle();
        assert_eq!(report.substeps_sent, 1);
        assert_eq!(report.starved, 2);
    }

    #[test]
    fn act_mode_produces_nothing() {
        let f = fixture();
        f.adapter.leave_ready(ModeSource::Gait);
        f.gait.set_params(0.04, 0.0, 0.0, true);
        let report = f.gait.step_cycle();
        assert!(!report.ran);
        assert!(f.adapter.body_buffer_empty());
    }

    #[test]
    fn fallen_robot_does_not_step() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.set_params(0.04, 0.0, 0.0, true);
        f.gait.on_sensor_event(&SensorEvent::new(
            "imu",
            SensorPayload::Orientation(OrientationReading {
                imu: ImuData {
                    pitch: 85.0,
                    ..ImuData::default()
                },
                lost: false,
            }),
        ));
        assert!(f.gait.is_fallen());
        assert!(!f.gait.step_cycle().ran);
        assert!(f.adapter.body_buffer_empty());
    }

    #[test]
    fn ik_failure_skips_substeps() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.update_params(|p| {
            p.enabled_gain = 1.0;
            p.trunk_z_offset = -0.1;
        });
        let report = f.gait.step_cycle();
        assert!(report.ran);
        assert_eq!(report.substeps_sent, 0);
        assert_eq!(report.ik_failures, 34);
    }

    /// Counts every solve and the ones that saw inconsistent gains.
    struct RecordingSolver {
        solves: Arc<AtomicUsize>,
        moving: Arc<AtomicUsize>,
        torn: Arc<AtomicUsize>,
    }

    impl WalkSolver for RecordingSolver {
        fn solve(
            &self,
            params: &GaitParameters,
            _dt: f64,
            _phase: &mut f64,
        ) -> Result<WalkOutput, StriderError> {
            self.solves.fetch_add(1, Ordering::SeqCst);
            // The writer keeps all three gains equal to `swing_gain`; the
            // direction tie-break may only zero them together.
            let gains_agree = params.step_gain == params.lateral_gain
                && params.lateral_gain == params.turn_gain;
            let from_one_write = params.step_gain == 0.0 || params.step_gain == params.swing_gain;
            if !(gains_agree && from_one_write) {
                self.torn.fetch_add(1, Ordering::SeqCst);
            }
            if params.step_gain != 0.0 {
                self.moving.fetch_add(1, Ordering::SeqCst);
            }
            Ok(WalkOutput::default())
        }
    }

    #[test]
    fn solver_never_sees_a_torn_parameter_set() {
        let adapter = Arc::new(MotionAdapter::new());
        let world = Arc::new(WorldModel::new(WorldConfig::default()));
        let solves = Arc::new(AtomicUsize::new(0));
        let moving = Arc::new(AtomicUsize::new(0));
        let torn = Arc::new(AtomicUsize::new(0));
        let gait = GaitEngine::with_solver(
            GaitConfig::default(),
            &RobotModel::default(),
            adapter.clone(),
            world,
            Box::new(RecordingSolver {
                solves: solves.clone(),
                moving: moving.clone(),
                torn: torn.clone(),
            }),
        )
        .unwrap();
        into_walk(&adapter);
        gait.update_params(|p| {
            p.enabled_gain = 1.0;
            p.step_gain = 1e-4;
            p.lateral_gain = 1e-4;
            p.turn_gain = 1e-4;
            p.swing_gain = 1e-4;
        });

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let gait = Arc::clone(&gait);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut k = 1u64;
                while !stop.load(Ordering::SeqCst) {
                    let v = k as f64 * 1e-4;
                    gait.update_params(|p| {
                        p.step_gain = v;
                        p.lateral_gain = v;
                        p.turn_gain = v;
                        p.swing_gain = v;
                    });
                    k = k % 1000 + 1;
                }
            })
        };
        let drain = Drain::spawn(&adapter);
        for _ in 0..40 {
            assert!(gait.step_cycle().ran);
        }
        stop.store(true, Ordering::SeqCst);
        writer.join().unwrap();
        drain.finish();

        assert_eq!(solves.load(Ordering::SeqCst), 40 * 34);
        assert!(moving.load(Ordering::SeqCst) > 0);
        assert_eq!(torn.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stance_pose_is_offered_as_the_stance_producer() {
        let f = fixture();
        f.gait.set_params(0.04, 0.02, 10.0, true);
        f.adapter
            .request_mode_change(ModeSource::Supervisor, OperatingMode::Stopped);

        assert!(f.gait.hold_stance());
        let cmd = f.adapter.take_body().unwrap();
        assert_eq!(cmd.producer, MotionProducer::Stance);
        assert_eq!(cmd.degrees.len(), 16);
        // Both legs mirror each other when standing still.
        let left_knee = cmd.degrees[&RobotModel::default().joint_id(joints::LEFT_KNEE).unwrap()];
        let right_knee = cmd.degrees[&RobotModel::default().joint_id(joints::RIGHT_KNEE).unwrap()];
        assert!((left_knee - right_knee).abs() < 1e-3);
        // Solving the pose leaves the walk state alone.
        assert_eq!(f.gait.phase_state(), GaitPhaseState::default());
        assert_eq!(f.gait.params().step_gain, 0.04);
    }

    #[test]
    fn stance_is_refused_while_acting() {
        let f = fixture();
        f.adapter.leave_ready(ModeSource::Gait);
        assert_eq!(f.adapter.mode(), OperatingMode::Act);
        assert!(!f.gait.hold_stance());
        assert!(f.adapter.body_buffer_empty());
    }

    #[test]
    fn thread_walks_until_stopped() {
        let f = fixture();
        into_walk(&f.adapter);
        f.gait.set_params(0.02, 0.0, 0.0, true);
        let drain = Drain::spawn(&f.adapter);
        f.gait.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while f.world.odometry().cycles == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        f.gait.stop();
        let received = drain.finish();
        assert!(!f.gait.is_running());
        assert!(f.world.odometry().cycles >= 1);
        assert!(received >= 34);
    }
}
