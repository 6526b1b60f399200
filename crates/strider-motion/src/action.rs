//! [`ActionEngine`] – scripted key-frame motions (kicks, getting ready).
//!
//! An action is a list of key frames, each a partial joint pose plus the time
//! to reach it.  While the adapter is in `Act` the engine plays the next
//! queued action, or the stabilisation action when nothing is queued, by
//! linear interpolation at `control_hz`.  When the last frame is reached it
//! hands the body back with an ACT→WALK request, the only source allowed to
//! complete an ACT phase.
//!
//! Frames name joints, not ids, so scripts survive re-wiring the servo chain;
//! names are resolved against the [`RobotModel`] once at construction.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strider_hal::RobotModel;
use strider_hal::robot::joints;
use strider_types::{JointDegrees, ModeSource, MotionProducer, OperatingMode, StriderError};
use tracing::{debug, info, warn};

use crate::adapter::{EnqueueOutcome, MotionAdapter};
use crate::worker::PeriodicWorker;

/// Built-in action names.
pub const READY: &str = "ready";
pub const STABILIZE: &str = "stabilize";
pub const LEFT_KICK: &str = "left_kick";
pub const RIGHT_KICK: &str = "right_kick";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    /// Time to move from the previous frame to this one.
    pub duration_ms: u64,
    /// Target angle per joint name, degrees.  Joints not listed keep their
    /// current target.
    pub joints: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionScript {
    pub name: String,
    pub frames: Vec<KeyFrame>,
}

/// `[action]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub control_hz: f64,
    /// Played when ACT is entered with nothing queued.
    pub stabilize_action: String,
    pub library: Vec<ActionScript>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            control_hz: 50.0,
            stabilize_action: STABILIZE.to_string(),
            library: default_library(),
        }
    }
}

fn frame(duration_ms: u64, joints: &[(&str, f32)]) -> KeyFrame {
    KeyFrame {
        duration_ms,
        joints: joints.iter().map(|(n, d)| (n.to_string(), *d)).collect(),
    }
}

const STANCE: [(&str, f32); 16] = [
    (joints::LEFT_SHOULDER_PITCH, 40.0),
    (joints::LEFT_ELBOW, -90.0),
    (joints::RIGHT_SHOULDER_PITCH, 40.0),
    (joints::RIGHT_ELBOW, 90.0),
    (joints::LEFT_HIP_YAW, 0.0),
    (joints::LEFT_HIP_ROLL, 0.0),
    (joints::LEFT_HIP_PITCH, 27.0),
    (joints::LEFT_KNEE, 42.0),
    (joints::LEFT_ANKLE_PITCH, 23.0),
    (joints::LEFT_ANKLE_ROLL, 0.0),
    (joints::RIGHT_HIP_YAW, 0.0),
    (joints::RIGHT_HIP_ROLL, 0.0),
    (joints::RIGHT_HIP_PITCH, 27.0),
    (joints::RIGHT_KNEE, 42.0),
    (joints::RIGHT_ANKLE_PITCH, 23.0),
    (joints::RIGHT_ANKLE_ROLL, 0.0),
];

/// Kick with `leg` (hip pitch, knee, ankle pitch, hip roll) while standing on
/// `support`.  `lean` is the roll, in degrees, that shifts the weight over
/// the support foot.
fn kick(name: &str, leg: [&str; 4], support: [&str; 2], lean: f32) -> ActionScript {
    let [hip_pitch, knee, ankle_pitch, kick_hip_roll] = leg;
    let [support_hip_roll, support_ankle_roll] = support;
    ActionScript {
        name: name.to_string(),
        frames: vec![
            frame(
                400,
                &[
                    (support_hip_roll, lean),
                    (support_ankle_roll, -lean),
                    (kick_hip_roll, lean),
                ],
            ),
            frame(300, &[(hip_pitch, 55.0), (knee, 95.0), (ankle_pitch, 40.0)]),
            frame(120, &[(hip_pitch, 10.0), (knee, 15.0), (ankle_pitch, 5.0)]),
            frame(300, &[(hip_pitch, 27.0), (knee, 42.0), (ankle_pitch, 23.0)]),
            frame(400, &STANCE),
        ],
    }
}

/// Scripts shipped with the engine.
pub fn default_library() -> Vec<ActionScript> {
    vec![
        ActionScript {
            name: READY.to_string(),
            frames: vec![frame(1000, &STANCE)],
        },
        ActionScript {
            name: STABILIZE.to_string(),
            frames: vec![frame(300, &STANCE)],
        },
        kick(
            LEFT_KICK,
            [
                joints::LEFT_HIP_PITCH,
                joints::LEFT_KNEE,
                joints::LEFT_ANKLE_PITCH,
                joints::LEFT_HIP_ROLL,
            ],
            [joints::RIGHT_HIP_ROLL, joints::RIGHT_ANKLE_ROLL],
            -12.0,
        ),
        kick(
            RIGHT_KICK,
            [
                joints::RIGHT_HIP_PITCH,
                joints::RIGHT_KNEE,
                joints::RIGHT_ANKLE_PITCH,
                joints::RIGHT_HIP_ROLL,
            ],
            [joints::LEFT_HIP_ROLL, joints::LEFT_ANKLE_ROLL],
            12.0,
        ),
    ]
}

struct ResolvedFrame {
    target: JointDegrees,
    steps: usize,
}

struct Playback {
    name: String,
    frame: usize,
    step: usize,
    from: JointDegrees,
}

/// Outcome of one [`ActionEngine::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTick {
    /// Not in `Act`; nothing to do.
    Idle,
    Playing(String),
    /// The named action reached its last frame and the body was handed back.
    Finished(String),
    /// The mode changed mid-action; playback was abandoned.
    Interrupted(String),
}

/// Linear blend from `from` toward `to`.  Joints missing from `from` jump
/// straight to their target.
pub fn interpolate(from: &JointDegrees, to: &JointDegrees, k: f32) -> JointDegrees {
    to.iter()
        .map(|(id, &target)| {
            let start = from.get(id).copied().unwrap_or(target);
            (*id, start + (target - start) * k)
        })
        .collect()
}

pub struct ActionEngine {
    control_hz: f64,
    stabilize: String,
    library: HashMap<String, Vec<ResolvedFrame>>,
    queue: Mutex<VecDeque<String>>,
    playback: Mutex<Option<Playback>>,
    pose: Mutex<JointDegrees>,
    adapter: Arc<MotionAdapter>,
    completed: AtomicU64,
    cycles: AtomicU64,
    worker: PeriodicWorker,
}

impl ActionEngine {
    /// # Errors
    ///
    /// Returns [`StriderError::Config`] when a script names an unknown joint,
    /// has no frames, or the stabilisation action is missing.
    pub fn new(
        config: ActionConfig,
        model: &RobotModel,
        adapter: Arc<MotionAdapter>,
    ) -> Result<Arc<Self>, StriderError> {
        if config.control_hz <= 0.0 {
            return Err(StriderError::Config(format!(
                "action.control_hz must be positive, got {}",
                config.control_hz
            )));
        }

        let mut library = HashMap::new();
        for script in &config.library {
            if script.frames.is_empty() {
                return Err(StriderError::Config(format!(
                    "action '{}' has no frames",
                    script.name
                )));
            }
            let mut frames = Vec::with_capacity(script.frames.len());
            for f in &script.frames {
                let mut target = JointDegrees::new();
                for (name, deg) in &f.joints {
                    target.insert(model.require(name)?, *deg);
                }
                let steps = (f.duration_ms as f64 * config.control_hz / 1000.0).round() as usize;
                frames.push(ResolvedFrame {
                    target,
                    steps: steps.max(1),
                });
            }
            library.insert(script.name.clone(), frames);
        }
        if !library.contains_key(&config.stabilize_action) {
            return Err(StriderError::Config(format!(
                "stabilize action '{}' not in library",
                config.stabilize_action
            )));
        }

        Ok(Arc::new(Self {
            control_hz: config.control_hz,
            stabilize: config.stabilize_action,
            library,
            queue: Mutex::new(VecDeque::new()),
            playback: Mutex::new(None),
            pose: Mutex::new(JointDegrees::new()),
            adapter,
            completed: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            worker: PeriodicWorker::new("action"),
        }))
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.library.contains_key(name)
    }

    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.library.keys().cloned().collect();
        names.sort();
        names
    }

    /// Queue `name` for the next ACT phase.
    pub fn queue_action(&self, name: &str) -> Result<(), StriderError> {
        if !self.has_action(name) {
            return Err(StriderError::Config(format!("unknown action '{name}'")));
        }
        debug!(action = name, "action queued");
        self.queue.lock().push_back(name.to_string());
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.lock().is_some()
    }

    /// Actions played to their last frame so far.
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Advance playback by one control step.
    pub fn tick(&self) -> ActionTick {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let mut playback = self.playback.lock();

        if self.adapter.mode() != OperatingMode::Act {
            return match playback.take() {
                Some(pb) => {
                    info!(action = %pb.name, "action interrupted by mode change");
                    ActionTick::Interrupted(pb.name)
                }
                None => ActionTick::Idle,
            };
        }

        if playback.is_none() {
            let name = self
                .queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.stabilize.clone());
            info!(action = %name, "action started");
            *playback = Some(Playback {
                name,
                frame: 0,
                step: 0,
                from: self.pose.lock().clone(),
            });
        }
        let Some(pb) = playback.as_mut() else {
            return ActionTick::Idle;
        };

        let Some(frames) = self.library.get(&pb.name) else {
            warn!(action = %pb.name, "action vanished from library");
            let name = pb.name.clone();
            *playback = None;
            return ActionTick::Interrupted(name);
        };
        let current = &frames[pb.frame];
        let k = (pb.step + 1) as f32 / current.steps as f32;
        let degrees = interpolate(&pb.from, &current.target, k);
        let budget = Duration::from_secs_f64(1.0 / self.control_hz);

        match self
            .adapter
            .enqueue_with_backoff(MotionProducer::Action, degrees.clone(), budget)
        {
            EnqueueOutcome::Accepted => {
                self.pose.lock().extend(degrees);
                pb.step += 1;
                if pb.step >= current.steps {
                    pb.from.extend(current.target.iter().map(|(id, d)| (*id, *d)));
                    pb.frame += 1;
                    pb.step = 0;
                }
                if pb.frame < frames.len() {
                    return ActionTick::Playing(pb.name.clone());
                }

                let name = pb.name.clone();
                *playback = None;
                drop(playback);
                self.completed.fetch_add(1, Ordering::SeqCst);
                info!(action = %name, "action finished");
                self.adapter
                    .request_mode_change(ModeSource::Action, OperatingMode::Walk);
                ActionTick::Finished(name)
            }
            EnqueueOutcome::TimedOut => {
                debug!(action = %pb.name, "joint mailbox full, frame step retried");
                ActionTick::Playing(pb.name.clone())
            }
            EnqueueOutcome::Rejected => {
                let name = pb.name.clone();
                *playback = None;
                info!(action = %name, "action rejected by mode change");
                ActionTick::Interrupted(name)
            }
        }
    }

    pub fn start(self: &Arc<Self>) -> Result<(), StriderError> {
        let engine = Arc::downgrade(self);
        self.worker
            .start(Duration::from_secs_f64(1.0 / self.control_hz), move || {
                match engine.upgrade() {
                    Some(engine) => {
                        engine.tick();
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
