//! Concrete behavior states.
//!
//! | State      | Enter                  | Tick                           | Exit          |
//! |------------|------------------------|--------------------------------|---------------|
//! | `Stance`   | stop walking, look up  | –                              | –             |
//! | `Search`   | scan                   | turn in place                  | centre head   |
//! | `Approach` | –                      | track ball, turn or step to it | –             |
//! | `Kick`     | kick with nearer foot  | kick again once finished       | –             |
//! | `SafeStop` | halt                   | –                              | –             |

use serde::{Deserialize, Serialize};
use strider_motion::action::{LEFT_KICK, RIGHT_KICK};
use strider_types::OperatingMode;

use crate::fsm::{BehaviorConfig, TickContext};
use crate::plan::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    Stance,
    Search,
    Approach,
    Kick,
    SafeStop,
}

impl StateKind {
    pub fn name(self) -> &'static str {
        match self {
            StateKind::Stance => "stance",
            StateKind::Search => "search",
            StateKind::Approach => "approach",
            StateKind::Kick => "kick",
            StateKind::SafeStop => "safe_stop",
        }
    }
}

/// A node of the behavior graph.  Each callback returns plans in the order
/// they are to be performed.
pub trait BehaviorState: Send {
    fn kind(&self) -> StateKind;

    fn on_enter(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        Vec::new()
    }

    fn on_exit(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        Vec::new()
    }

    fn on_tick(&mut self, ctx: &TickContext) -> Vec<Plan>;
}

pub fn build(kind: StateKind, config: &BehaviorConfig) -> Box<dyn BehaviorState> {
    match kind {
        StateKind::Stance => Box::new(Stance {
            pitch_deg: config.stance_pitch_deg,
        }),
        StateKind::Search => Box::new(Search {
            turn_deg: config.search_turn_deg,
            pitch_deg: config.stance_pitch_deg,
        }),
        StateKind::Approach => Box::new(Approach {
            align_deg: config.align_deg,
            max_step: config.max_step,
            max_turn_deg: config.max_turn_deg,
        }),
        StateKind::Kick => Box::new(Kick { kicked_at: 0 }),
        StateKind::SafeStop => Box::new(SafeStop),
    }
}

fn stand_still() -> Plan {
    Plan::Walk {
        step: 0.0,
        lateral: 0.0,
        turn_deg: 0.0,
        enabled: false,
    }
}

/// Bearing of the ball from the trunk, degrees, positive to the left.
fn ball_bearing(ctx: &TickContext) -> f32 {
    ctx.ball.relative[1].atan2(ctx.ball.relative[0]).to_degrees()
}

// ─────────────────────────────────────────────────────────────────────────────

pub struct Stance {
    pitch_deg: f32,
}

impl BehaviorState for Stance {
    fn kind(&self) -> StateKind {
        StateKind::Stance
    }

    fn on_enter(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        vec![
            stand_still(),
            Plan::Look {
                yaw_deg: 0.0,
                pitch_deg: self.pitch_deg,
            },
        ]
    }

    fn on_tick(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        Vec::new()
    }
}

/// Search and localize: sweep the head while turning on the spot.
pub struct Search {
    turn_deg: f64,
    pitch_deg: f32,
}

impl BehaviorState for Search {
    fn kind(&self) -> StateKind {
        StateKind::Search
    }

    fn on_enter(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        vec![Plan::Scan]
    }

    fn on_exit(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        vec![Plan::Look {
            yaw_deg: 0.0,
            pitch_deg: self.pitch_deg,
        }]
    }

    fn on_tick(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        vec![Plan::Walk {
            step: 0.0,
            lateral: 0.0,
            turn_deg: self.turn_deg,
            enabled: true,
        }]
    }
}

pub struct Approach {
    align_deg: f32,
    max_step: f64,
    max_turn_deg: f64,
}

impl BehaviorState for Approach {
    fn kind(&self) -> StateKind {
        StateKind::Approach
    }

    fn on_tick(&mut self, ctx: &TickContext) -> Vec<Plan> {
        let look = Plan::Look {
            yaw_deg: ctx.ball.alpha,
            pitch_deg: ctx.ball.beta,
        };
        let bearing = ball_bearing(ctx);
        let walk = if bearing.abs() > self.align_deg {
            Plan::Walk {
                step: 0.0,
                lateral: 0.0,
                turn_deg: f64::from(bearing).clamp(-self.max_turn_deg, self.max_turn_deg),
                enabled: true,
            }
        } else {
            Plan::Walk {
                step: self.max_step,
                lateral: 0.0,
                turn_deg: 0.0,
                enabled: true,
            }
        };
        vec![look, walk]
    }
}

/// Kick with the foot on the ball's side, again after each completed kick
/// while the ball stays in range.
pub struct Kick {
    kicked_at: u64,
}

impl Kick {
    fn kick(&mut self, ctx: &TickContext) -> Plan {
        self.kicked_at = ctx.actions_completed;
        let name = if ctx.ball.relative[1] >= 0.0 {
            LEFT_KICK
        } else {
            RIGHT_KICK
        };
        Plan::Action(name.to_string())
    }
}

impl BehaviorState for Kick {
    fn kind(&self) -> StateKind {
        StateKind::Kick
    }

    fn on_enter(&mut self, ctx: &TickContext) -> Vec<Plan> {
        vec![self.kick(ctx)]
    }

    fn on_tick(&mut self, ctx: &TickContext) -> Vec<Plan> {
        let done = ctx.actions_completed > self.kicked_at;
        if done && !ctx.action_busy && ctx.mode != OperatingMode::Act {
            vec![self.kick(ctx)]
        } else {
            Vec::new()
        }
    }
}

pub struct SafeStop;

impl BehaviorState for SafeStop {
    fn kind(&self) -> StateKind {
        StateKind::SafeStop
    }

    fn on_enter(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        vec![Plan::Halt]
    }

    fn on_tick(&mut self, _ctx: &TickContext) -> Vec<Plan> {
        Vec::new()
    }
}
