//! [`Player`] – the top-level orchestrator.
//!
//! Owns every component and wires them together explicitly:
//!
//! ```text
//!  SensorHub ──► WorldModel ──► BehaviorFsm ──► Plans ──► Gait/Action/Head
//!      │                                                        │
//!      └──► GaitEngine (orientation)            MotionAdapter ◄─┘
//!                                                     │
//!                                   MotorDriver ◄─────┘ (JointCommandSource)
//! ```
//!
//! # Lifecycle
//!
//! 1. [`Player::new`] builds the components; nothing runs yet.
//! 2. [`Player::init`] registers subscribers, starts the motor driver, waits
//!    for the servo chain to answer, starts the engines, plays the `ready`
//!    action and starts the think loop.
//! 3. [`Player::tick`] runs once per `think_period_ms`.
//! 4. [`Player::stop`] stops the think loop and the engines, then the motor
//!    driver, then unregisters the subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strider_behavior::{BehaviorConfig, BehaviorFsm, MotionHandles, Plan, StateKind, TickContext};
use strider_hal::{JointCommandSource, MotorConfig, MotorDriver, RobotConfig, RobotModel, ServoBus};
use strider_middleware::{SensorHub, SensorSubscriber};
use strider_motion::action::READY;
use strider_motion::{
    ActionConfig, ActionEngine, GaitConfig, GaitEngine, HeadConfig, HeadEngine, MotionAdapter,
    PeriodicWorker,
};
use strider_types::{ModeSource, OperatingMode, RemoteCommand, SensorKind, StriderError};
use strider_world::{WorldConfig, WorldModel};
use tracing::{debug, info, warn};

use crate::watchdog::Watchdog;

/// Slice used when sleeping while waiting for the servo chain, so `stop`
/// is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(10);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[player]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub think_period_ms: u64,
    /// Gate behavior on the game controller's state.
    pub use_game_controller: bool,
    /// Follow operator commands instead of the behavior FSM.
    pub use_remote: bool,
    /// Ticks between two `reset_hear_info` calls.
    pub hear_reset_every: u64,
    /// Ticks both buttons must be held to request shutdown.
    pub button_hold_ticks: u64,
    pub connect_poll_ms: u64,
    /// An engine whose cycle counter stalls this long is reported frozen.
    pub watchdog_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            think_period_ms: 20,
            use_game_controller: false,
            use_remote: false,
            hear_reset_every: 50,
            button_hold_ticks: 40,
            connect_poll_ms: 1000,
            watchdog_timeout_ms: 1000,
        }
    }
}

/// Every configuration section the runtime consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub player: PlayerConfig,
    pub world: WorldConfig,
    pub gait: GaitConfig,
    pub motor: MotorConfig,
    pub robot: RobotConfig,
    pub head: HeadConfig,
    pub action: ActionConfig,
    pub behavior: BehaviorConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Player
// ─────────────────────────────────────────────────────────────────────────────

pub struct Player {
    config: PlayerConfig,
    hub: Arc<SensorHub>,
    world: Arc<WorldModel>,
    motion: MotionHandles,
    motor: Arc<MotorDriver>,
    world_sub: Arc<dyn SensorSubscriber>,
    gait_sub: Arc<dyn SensorSubscriber>,
    fsm: Mutex<BehaviorFsm>,
    watchdog: Mutex<Watchdog>,
    alive: AtomicBool,
    shutdown_requested: AtomicBool,
    ticks: AtomicU64,
    button_hold: AtomicU64,
    worker: PeriodicWorker,
}

impl Player {
    /// Build every component from `config`.  `bus` is handed to the motor
    /// driver; `hub` is where the sensor readers publish.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::Config`] when a section is inconsistent (bad
    /// joint table, unknown joint in an action script, non-positive rates).
    pub fn new(
        config: RuntimeConfig,
        hub: Arc<SensorHub>,
        bus: Box<dyn ServoBus>,
    ) -> Result<Arc<Self>, StriderError> {
        if config.player.think_period_ms == 0 {
            return Err(StriderError::Config(
                "player.think_period_ms must be positive".to_string(),
            ));
        }
        let model = Arc::new(RobotModel::from_config(&config.robot)?);
        let adapter = Arc::new(MotionAdapter::new());
        let world = Arc::new(WorldModel::new(config.world));

        let gait = GaitEngine::new(config.gait, &model, adapter.clone(), world.clone())?;
        let action = ActionEngine::new(config.action, &model, adapter.clone())?;
        let head = HeadEngine::new(config.head, &model, adapter.clone())?;

        let source: Arc<dyn JointCommandSource> = adapter.clone();
        let motor = MotorDriver::new(config.motor, model, bus, source, hub.clone());

        let world_sub: Arc<dyn SensorSubscriber> = world.clone();
        let gait_sub: Arc<dyn SensorSubscriber> = gait.clone();

        Ok(Arc::new(Self {
            config: config.player,
            hub,
            world,
            motion: MotionHandles {
                adapter,
                gait,
                action,
                head,
            },
            motor,
            world_sub,
            gait_sub,
            fsm: Mutex::new(BehaviorFsm::new(config.behavior)),
            watchdog: Mutex::new(Watchdog::new()),
            alive: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            button_hold: AtomicU64::new(0),
            worker: PeriodicWorker::new("player"),
        }))
    }

    /// Bring the robot up.  Blocks until the servo chain answers or
    /// [`stop`][Player::stop] is called from another thread.
    ///
    /// # Errors
    ///
    /// Fails when the servo bus cannot be opened or a thread cannot be
    /// spawned.  Nothing is left running in that case.
    pub fn init(self: &Arc<Self>) -> Result<(), StriderError> {
        self.hub.attach_all(self.world_sub.clone());
        self.hub.attach(SensorKind::Orientation, self.gait_sub.clone());
        self.alive.store(true, Ordering::SeqCst);

        if let Err(e) = self.motor.start() {
            self.alive.store(false, Ordering::SeqCst);
            self.unregister();
            return Err(e);
        }

        let poll = Duration::from_millis(self.config.connect_poll_ms);
        while !self.motor.is_connected() {
            if !self.is_alive() {
                info!("stopped while waiting for the servo chain");
                return Ok(());
            }
            warn!("waiting for motor connection, please turn on the power");
            self.sleep_while_alive(poll);
        }

        if let Err(e) = self.start_engines() {
            self.stop();
            return Err(e);
        }

        match self.motion.action.queue_action(READY) {
            Ok(()) => {
                self.motion
                    .adapter
                    .request_mode_change(ModeSource::Supervisor, OperatingMode::Act);
            }
            Err(e) => warn!(error = %e, "no ready action, starting from the current pose"),
        }

        let player = Arc::downgrade(self);
        let started = self
            .worker
            .start(Duration::from_millis(self.config.think_period_ms), move || {
                match player.upgrade() {
                    Some(player) => {
                        player.tick();
                        true
                    }
                    None => false,
                }
            });
        if let Err(e) = started {
            self.stop();
            return Err(e);
        }
        if !self.is_alive() {
            // Stopped from another thread while the engines were starting.
            self.stop();
            return Ok(());
        }
        info!(think_period_ms = self.config.think_period_ms, "player running");
        Ok(())
    }

    fn start_engines(&self) -> Result<(), StriderError> {
        self.motion.gait.start()?;
        self.motion.action.start()?;
        self.motion.head.start()?;

        let timeout = Duration::from_millis(self.config.watchdog_timeout_ms);
        let mut watchdog = self.watchdog.lock();
        for (name, _) in self.cycle_counters() {
            watchdog.register(name, timeout);
        }
        Ok(())
    }

    fn sleep_while_alive(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.is_alive() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }

    fn cycle_counters(&self) -> [(&'static str, u64); 4] {
        [
            ("gait", self.motion.gait.cycle_count()),
            ("action", self.motion.action.cycle_count()),
            ("head", self.motion.head.cycle_count()),
            ("motor", self.motor.cycle_count()),
        ]
    }

    /// One think step.  Called by the player thread; public so tests can
    /// drive the player synchronously.
    pub fn tick(&self) {
        if !self.is_alive() {
            return;
        }
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        self.check_buttons();
        self.check_watchdog();

        if self.config.hear_reset_every > 0 && tick % self.config.hear_reset_every == 0 {
            self.world.reset_hear_info();
        }

        let plans = if self.config.use_remote {
            self.remote_plans()
        } else {
            let ctx = TickContext::gather(
                &self.world,
                &self.motion,
                self.config.use_game_controller,
            );
            self.fsm.lock().tick(&ctx)
        };
        self.perform(&plans);
    }

    fn check_buttons(&self) {
        let buttons = self.world.buttons();
        if buttons.button_1 && buttons.button_2 {
            let held = self.button_hold.fetch_add(1, Ordering::Relaxed) + 1;
            if self.config.button_hold_ticks > 0 && held % self.config.button_hold_ticks == 0 {
                warn!(held_ticks = held, "both buttons held, shutdown requested");
                self.shutdown_requested.store(true, Ordering::SeqCst);
            }
        } else {
            self.button_hold.store(0, Ordering::Relaxed);
        }
    }

    fn check_watchdog(&self) {
        let mut watchdog = self.watchdog.lock();
        for (name, count) in self.cycle_counters() {
            watchdog.observe(name, count);
        }
        for component in watchdog.newly_frozen() {
            warn!(component = %component, "component frozen");
        }
    }

    fn remote_plans(&self) -> Vec<Plan> {
        let command = self.world.remote_command();
        let plan = match command {
            RemoteCommand::None => return Vec::new(),
            RemoteCommand::Walk {
                step,
                lateral,
                turn_deg,
                enabled,
            } => Plan::Walk {
                step: f64::from(step),
                lateral: f64::from(lateral),
                turn_deg: f64::from(turn_deg),
                enabled,
            },
            RemoteCommand::Action(name) => Plan::Action(name),
            RemoteCommand::Look { yaw_deg, pitch_deg } => Plan::Look { yaw_deg, pitch_deg },
        };
        self.world.reset_remote_command();
        vec![plan]
    }

    fn perform(&self, plans: &[Plan]) {
        for plan in plans {
            if let Err(e) = plan.validate() {
                warn!(plan = plan.name(), error = %e, "plan rejected");
                continue;
            }
            if let Err(e) = plan.perform(&self.motion) {
                warn!(plan = plan.name(), error = %e, "plan failed");
            }
        }
        if !plans.is_empty() {
            debug!(count = plans.len(), mode = ?self.motion.adapter.mode(), "plans performed");
        }
    }

    /// Stop everything in the safe order.  Idempotent.
    pub fn stop(&self) {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        self.worker.stop();
        self.motion.gait.stop();
        self.motion.action.stop();
        self.motion.head.stop();
        // Engines are quiescent now; the bus can go.
        self.motor.stop();
        self.unregister();
        if was_alive {
            info!(ticks = self.tick_count(), "player stopped");
        }
    }

    fn unregister(&self) {
        self.hub.detach_all(&self.world_sub);
        self.hub.detach(SensorKind::Orientation, &self.gait_sub);
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Set when the operator held both buttons long enough.  The process
    /// owner decides what to do with it.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn behavior_state(&self) -> Option<StateKind> {
        self.fsm.lock().current()
    }

    pub fn hub(&self) -> &Arc<SensorHub> {
        &self.hub
    }

    pub fn world(&self) -> &Arc<WorldModel> {
        &self.world
    }

    pub fn motion(&self) -> &MotionHandles {
        &self.motion
    }

    pub fn motor(&self) -> &Arc<MotorDriver> {
        &self.motor
    }

    /// Components currently frozen according to the watchdog.
    pub fn frozen_components(&self) -> Vec<String> {
        self.watchdog.lock().check_all()
    }
}
