//! [`Plan`] – one-shot motion intents emitted by behavior states.
//!
//! A plan is created, validated and performed within a single behavior
//! tick.  `perform` only touches shared parameter state (gait gains, head
//! target, action queue, mode requests) and returns immediately; the engines
//! realise the effect on their own threads.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn handles() -> strider_behavior::MotionHandles { unimplemented!() }
//! use strider_behavior::Plan;
//!
//! let motion = handles();
//! let plan = Plan::Walk { step: 0.03, lateral: 0.0, turn_deg: 0.0, enabled: true };
//! plan.validate().unwrap();
//! plan.perform(&motion).unwrap();
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strider_motion::{ActionEngine, GaitEngine, HeadEngine, MotionAdapter};
use strider_types::{ModeSource, OperatingMode, StriderError};
use tracing::debug;

/// Handles on the motion engines that plans act upon.
#[derive(Clone)]
pub struct MotionHandles {
    pub adapter: Arc<MotionAdapter>,
    pub gait: Arc<GaitEngine>,
    pub action: Arc<ActionEngine>,
    pub head: Arc<HeadEngine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Plan {
    /// Set the walk gains and ask for `Walk`.
    Walk {
        step: f64,
        lateral: f64,
        turn_deg: f64,
        enabled: bool,
    },
    /// Point the head.
    Look { yaw_deg: f32, pitch_deg: f32 },
    /// Sweep the head.
    Scan,
    /// Queue a scripted action and ask for `Act`.
    Action(String),
    /// Stop walking, enter `Stopped` and hold the stance pose.
    Halt,
}

impl Plan {
    pub fn name(&self) -> &'static str {
        match self {
            Plan::Walk { .. } => "walk",
            Plan::Look { .. } => "look",
            Plan::Scan => "scan",
            Plan::Action(_) => "action",
            Plan::Halt => "halt",
        }
    }

    /// Reject plans carrying non-finite numbers or an empty action name.
    pub fn validate(&self) -> Result<(), StriderError> {
        let finite = match self {
            Plan::Walk {
                step,
                lateral,
                turn_deg,
                ..
            } => step.is_finite() && lateral.is_finite() && turn_deg.is_finite(),
            Plan::Look { yaw_deg, pitch_deg } => yaw_deg.is_finite() && pitch_deg.is_finite(),
            Plan::Action(name) => !name.is_empty(),
            Plan::Scan | Plan::Halt => true,
        };
        if finite {
            Ok(())
        } else {
            Err(StriderError::Config(format!("invalid {} plan: {self:?}", self.name())))
        }
    }

    /// Apply the plan.  Never blocks.
    ///
    /// # Errors
    ///
    /// [`Plan::Action`] fails when the action is not in the library.
    pub fn perform(&self, motion: &MotionHandles) -> Result<(), StriderError> {
        debug!(plan = self.name(), "perform");
        match self {
            Plan::Walk {
                step,
                lateral,
                turn_deg,
                enabled,
            } => {
                motion.gait.set_params(*step, *lateral, *turn_deg, *enabled);
                motion
                    .adapter
                    .request_mode_change(ModeSource::Behavior, OperatingMode::Walk);
            }
            Plan::Look { yaw_deg, pitch_deg } => motion.head.look_at(*yaw_deg, *pitch_deg),
            Plan::Scan => motion.head.scan(),
            Plan::Action(name) => {
                motion.action.queue_action(name)?;
                // The gait has to run one cycle in Ready before Act is
                // reachable from Walk.
                motion.gait.update_params(|p| p.enabled_gain = 1.0);
                motion
                    .adapter
                    .request_mode_change(ModeSource::Behavior, OperatingMode::Act);
            }
            Plan::Halt => {
                motion.gait.set_params(0.0, 0.0, 0.0, false);
                let mode = motion
                    .adapter
                    .request_mode_change(ModeSource::Behavior, OperatingMode::Stopped);
                if mode == OperatingMode::Stopped && !motion.gait.hold_stance() {
                    debug!("stance pose not delivered");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_hal::RobotModel;
    use strider_hal::JointCommandSource;
    use strider_motion::{ActionConfig, GaitConfig, HeadConfig, LookMode};
    use strider_types::MotionProducer;
    use strider_world::{WorldConfig, WorldModel};

    fn handles() -> MotionHandles {
        let model = RobotModel::default();
        let adapter = Arc::new(MotionAdapter::new());
        let world = Arc::new(WorldModel::new(WorldConfig::default()));
        MotionHandles {
            gait: GaitEngine::new(GaitConfig::default(), &model, adapter.clone(), world).unwrap(),
            action: ActionEngine::new(ActionConfig::default(), &model, adapter.clone()).unwrap(),
            head: HeadEngine::new(HeadConfig::default(), &model, adapter.clone()).unwrap(),
            adapter,
        }
    }

    #[test]
    fn walk_sets_gains_and_requests_walk() {
        let motion = handles();
        Plan::Walk {
            step: 0.03,
            lateral: 0.0,
            turn_deg: 90.0,
            enabled: true,
        }
        .perform(&motion)
        .unwrap();

        let p = motion.gait.params();
        assert_eq!(p.step_gain, 0.03);
        assert!((p.turn_gain - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(p.enabled_gain, 1.0);
        // From the initial Ready the first walk request goes through Act.
        assert_eq!(motion.adapter.mode(), OperatingMode::Act);
    }

    #[test]
    fn action_is_queued_and_act_requested() {
        let motion = handles();
        Plan::Action("left_kick".into()).perform(&motion).unwrap();
        assert_eq!(motion.action.queued(), 1);
        assert_eq!(motion.adapter.mode(), OperatingMode::Act);
    }

    #[test]
    fn unknown_action_fails_without_mode_change() {
        let motion = handles();
        assert!(Plan::Action("moonwalk".into()).perform(&motion).is_err());
        assert_eq!(motion.adapter.mode(), OperatingMode::Ready);
    }

    #[test]
    fn halt_stops_motion() {
        let motion = handles();
        motion.gait.set_params(0.04, 0.0, 0.0, true);
        Plan::Halt.perform(&motion).unwrap();
        assert_eq!(motion.adapter.mode(), OperatingMode::Stopped);
        assert!(!motion.gait.params().is_enabled());

        // The body is left holding the neutral pose.
        let cmd = motion.adapter.take_body().unwrap();
        assert_eq!(cmd.producer, MotionProducer::Stance);
        assert!(!cmd.degrees.is_empty());
    }

    #[test]
    fn look_and_scan_drive_the_head() {
        let motion = handles();
        Plan::Look {
            yaw_deg: 20.0,
            pitch_deg: 30.0,
        }
        .perform(&motion)
        .unwrap();
        assert_eq!(
            motion.head.mode(),
            LookMode::Fixed {
                yaw_deg: 20.0,
                pitch_deg: 30.0
            }
        );
        Plan::Scan.perform(&motion).unwrap();
        assert_eq!(motion.head.mode(), LookMode::Scan);
    }

    #[test]
    fn validate_rejects_nan_and_empty_names() {
        let bad = Plan::Walk {
            step: f64::NAN,
            lateral: 0.0,
            turn_deg: 0.0,
            enabled: true,
        };
        assert!(bad.validate().is_err());
        assert!(Plan::Action(String::new()).validate().is_err());
        assert!(Plan::Halt.validate().is_ok());
    }
}
