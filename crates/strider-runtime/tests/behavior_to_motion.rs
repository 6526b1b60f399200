//! Behavior decisions travelling through plans, the motion adapter and the
//! engines, with every engine stepped from the test thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use strider_behavior::{BehaviorConfig, BehaviorFsm, MotionHandles, Plan, StateKind, TickContext};
use strider_hal::{JointCommandSource, RobotModel};
use strider_middleware::{SensorHub, SensorSubscriber};
use strider_motion::action::LEFT_KICK;
use strider_motion::{
    ActionConfig, ActionEngine, ActionTick, GaitConfig, GaitEngine, HeadConfig, HeadEngine,
    MotionAdapter,
};
use strider_types::{
    ImuData, ModeSource, OperatingMode, OrientationReading, SensorEvent, SensorKind, SensorPayload,
};
use strider_world::{BallObservation, WorldConfig, WorldModel};

struct Rig {
    world: Arc<WorldModel>,
    motion: MotionHandles,
}

fn rig() -> Rig {
    let model = RobotModel::default();
    let adapter = Arc::new(MotionAdapter::new());
    let world = Arc::new(WorldModel::new(WorldConfig::default()));
    let motion = MotionHandles {
        gait: GaitEngine::new(GaitConfig::default(), &model, adapter.clone(), world.clone())
            .unwrap(),
        action: ActionEngine::new(ActionConfig::default(), &model, adapter.clone()).unwrap(),
        head: HeadEngine::new(HeadConfig::default(), &model, adapter.clone()).unwrap(),
        adapter,
    };
    Rig { world, motion }
}

/// Stand-in for the motor driver: empties the body mailbox until dropped.
struct Drain {
    alive: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drain {
    fn start(adapter: Arc<MotionAdapter>) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        let handle = thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                adapter.take_body();
                thread::yield_now();
            }
        });
        Self {
            alive,
            handle: Some(handle),
        }
    }
}

impl Drop for Drain {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn into_walk(adapter: &MotionAdapter) {
    adapter.request_mode_change(ModeSource::Behavior, OperatingMode::Act);
    adapter.request_mode_change(ModeSource::Action, OperatingMode::Walk);
    assert_eq!(adapter.mode(), OperatingMode::Walk);
}

fn play_to_end(motion: &MotionHandles) -> ActionTick {
    for _ in 0..1000 {
        let tick = motion.action.tick();
        motion.adapter.take_body();
        if matches!(tick, ActionTick::Finished(_) | ActionTick::Interrupted(_)) {
            return tick;
        }
    }
    panic!("action never ended");
}

#[test]
fn kick_from_walk_goes_through_ready_then_back_to_walk() {
    let Rig { motion, .. } = rig();
    into_walk(&motion.adapter);
    motion.gait.set_params(0.03, 0.0, 0.0, true);

    Plan::Action(LEFT_KICK.to_string()).perform(&motion).unwrap();
    assert_eq!(motion.adapter.mode(), OperatingMode::Ready);

    // One in-place gait cycle in Ready, then the gait hands over to Act.
    {
        let _drain = Drain::start(motion.adapter.clone());
        let report = motion.gait.step_cycle();
        assert!(report.ran);
        assert_eq!(report.applied, [0.0, 0.0, 0.0]);
    }
    assert_eq!(motion.adapter.mode(), OperatingMode::Act);
    assert!(!motion.gait.params().is_enabled());

    assert_eq!(play_to_end(&motion), ActionTick::Finished(LEFT_KICK.to_string()));
    assert_eq!(motion.adapter.mode(), OperatingMode::Walk);

    // The walk was disabled by the Ready cycle, so the gait settles in Ready.
    motion.gait.step_cycle();
    assert_eq!(motion.adapter.mode(), OperatingMode::Ready);
}

#[test]
fn fsm_kicks_a_close_ball() {
    let Rig { world, motion } = rig();
    into_walk(&motion.adapter);
    world.set_ball_observation(BallObservation {
        relative: [0.15, -0.03],
        visible: true,
        ..Default::default()
    });

    let mut fsm = BehaviorFsm::new(BehaviorConfig::default());
    let ctx = TickContext::gather(&world, &motion, false);
    for plan in fsm.tick(&ctx) {
        plan.validate().unwrap();
        plan.perform(&motion).unwrap();
    }

    assert_eq!(fsm.current(), Some(StateKind::Kick));
    assert_eq!(motion.action.queued(), 1);
    assert_eq!(motion.adapter.mode(), OperatingMode::Ready);
}

#[test]
fn far_ball_is_approached_with_the_walk() {
    let Rig { world, motion } = rig();
    into_walk(&motion.adapter);
    world.set_ball_observation(BallObservation {
        relative: [1.2, 0.0],
        alpha: 0.0,
        beta: 20.0,
        visible: true,
        ..Default::default()
    });

    let mut fsm = BehaviorFsm::new(BehaviorConfig::default());
    let ctx = TickContext::gather(&world, &motion, false);
    for plan in fsm.tick(&ctx) {
        plan.perform(&motion).unwrap();
    }
    assert_eq!(fsm.current(), Some(StateKind::Approach));

    let report = {
        let _drain = Drain::start(motion.adapter.clone());
        motion.gait.step_cycle()
    };
    assert!(report.ran);
    assert_eq!(report.applied, [0.035, 0.0, 0.0]);
    assert_eq!(world.odometry().velocity, [0.035, 0.0, 0.0]);
    assert_eq!(motion.adapter.mode(), OperatingMode::Walk);
}

#[test]
fn fall_reported_by_the_imu_halts_everything() {
    let Rig { world, motion } = rig();
    let hub = SensorHub::new();
    let world_sub: Arc<dyn SensorSubscriber> = world.clone();
    let gait_sub: Arc<dyn SensorSubscriber> = motion.gait.clone();
    hub.attach_all(world_sub);
    hub.attach(SensorKind::Orientation, gait_sub);
    into_walk(&motion.adapter);
    motion.gait.set_params(0.03, 0.0, 0.0, true);

    hub.publish(SensorEvent::new(
        "imu",
        SensorPayload::Orientation(OrientationReading {
            imu: ImuData {
                pitch: 80.0,
                ..Default::default()
            },
            lost: false,
        }),
    ));
    assert!(motion.gait.is_fallen());
    assert!(!motion.gait.step_cycle().ran);

    let mut fsm = BehaviorFsm::new(BehaviorConfig::default());
    let ctx = TickContext::gather(&world, &motion, false);
    let plans = fsm.tick(&ctx);
    assert_eq!(plans, vec![Plan::Halt]);
    plans[0].perform(&motion).unwrap();
    assert_eq!(motion.adapter.mode(), OperatingMode::Stopped);
    let stance = motion.adapter.take_body().map(|cmd| cmd.producer);
    assert_eq!(stance, Some(strider_types::MotionProducer::Stance));
    assert!(!motion.adapter.enqueue_joint_degrees(
        strider_types::MotionProducer::Gait,
        Default::default()
    ));
}
