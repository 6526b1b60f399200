//! [`BehaviorFsm`] – picks a behavior state from the world each tick and
//! collects the plans it emits.
//!
//! On a transition the plans are ordered: exit plans of the old state, enter
//! plans of the new state, then the tick plans of the (new) current state.

use serde::{Deserialize, Serialize};
use strider_types::{GameControlData, GameState, OperatingMode};
use strider_world::{BallObservation, PowerState, SelfState, WorldModel};
use tracing::info;

use crate::plan::{MotionHandles, Plan};
use crate::states::{self, StateKind};

/// `[behavior]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Ball closer than this (metres) is kicked rather than approached.
    pub kick_distance: f32,
    /// Bearing (degrees) within which the robot walks straight at the ball.
    pub align_deg: f32,
    /// Forward step gain while approaching.
    pub max_step: f64,
    pub max_turn_deg: f64,
    /// Turn rate while searching, degrees per step.
    pub search_turn_deg: f64,
    /// Head pitch while standing.
    pub stance_pitch_deg: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            kick_distance: 0.25,
            align_deg: 15.0,
            max_step: 0.035,
            max_turn_deg: 15.0,
            search_turn_deg: 10.0,
            stance_pitch_deg: 30.0,
        }
    }
}

/// Everything a behavior state may look at, copied out once per tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickContext {
    pub self_state: SelfState,
    pub ball: BallObservation,
    pub ball_fresh: bool,
    /// `None` when no game controller is in use.
    pub game: Option<GameControlData>,
    pub power: PowerState,
    pub mode: OperatingMode,
    /// Scripted actions finished so far.
    pub actions_completed: u64,
    /// An action is playing or waiting in the queue.
    pub action_busy: bool,
}

impl TickContext {
    pub fn gather(world: &WorldModel, motion: &MotionHandles, use_game_controller: bool) -> Self {
        Self {
            self_state: world.self_state(),
            ball: world.ball(),
            ball_fresh: world.ball_is_fresh(),
            game: use_game_controller.then(|| world.game_control()),
            power: world.power(),
            mode: motion.adapter.mode(),
            actions_completed: motion.action.completed_count(),
            action_busy: motion.action.is_playing() || motion.action.queued() > 0,
        }
    }
}

/// Choose the state for this tick.  First match wins: low power or fallen,
/// game not running, ball not known, ball far, ball close.
pub fn select_state(ctx: &TickContext, config: &BehaviorConfig) -> StateKind {
    if ctx.power.low_power || ctx.self_state.is_fallen() {
        return StateKind::SafeStop;
    }
    if let Some(game) = &ctx.game {
        if game.state != GameState::Playing || game.penalized {
            return StateKind::Stance;
        }
    }
    if !ctx.ball_fresh {
        StateKind::Search
    } else if ctx.ball.distance() > config.kick_distance {
        StateKind::Approach
    } else {
        StateKind::Kick
    }
}

pub struct BehaviorFsm {
    config: BehaviorConfig,
    current: Option<Box<dyn states::BehaviorState>>,
    transitions: u64,
}

impl BehaviorFsm {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            current: None,
            transitions: 0,
        }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    pub fn current(&self) -> Option<StateKind> {
        self.current.as_ref().map(|s| s.kind())
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Evaluate one tick and return the plans to perform, in order.
    pub fn tick(&mut self, ctx: &TickContext) -> Vec<Plan> {
        let next = select_state(ctx, &self.config);
        let mut plans = Vec::new();

        if self.current() != Some(next) {
            let from = self.current();
            if let Some(old) = self.current.as_mut() {
                plans.extend(old.on_exit(ctx));
            }
            let mut state = states::build(next, &self.config);
            plans.extend(state.on_enter(ctx));
            self.current = Some(state);
            self.transitions += 1;
            info!(from = ?from, to = ?next, "behavior state change");
        }

        if let Some(state) = self.current.as_mut() {
            plans.extend(state.on_tick(ctx));
        }
        plans
    }
}
