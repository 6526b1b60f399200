//! [`HeadEngine`] – neck control: hold a fixed gaze or sweep a scan.
//!
//! The head has its own mailbox on the [`MotionAdapter`] and is not subject
//! to mode arbitration, so the robot can keep looking around while walking
//! or kicking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strider_hal::RobotModel;
use strider_hal::robot::joints;
use strider_types::{JointDegrees, JointId, StriderError};
use tracing::debug;

use crate::adapter::MotionAdapter;
use crate::worker::PeriodicWorker;

/// `[head]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    pub control_hz: f64,
    pub yaw_limit_deg: f32,
    pub pitch_min_deg: f32,
    pub pitch_max_deg: f32,
    /// Half-width of the scan sweep.
    pub scan_yaw_deg: f32,
    pub scan_pitch_deg: f32,
    pub scan_speed_deg_s: f32,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            control_hz: 50.0,
            yaw_limit_deg: 110.0,
            pitch_min_deg: -10.0,
            pitch_max_deg: 70.0,
            scan_yaw_deg: 90.0,
            scan_pitch_deg: 45.0,
            scan_speed_deg_s: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LookMode {
    Fixed { yaw_deg: f32, pitch_deg: f32 },
    Scan,
}

#[derive(Debug, Clone, Copy)]
struct Gaze {
    mode: LookMode,
    yaw: f32,
    pitch: f32,
    /// Sweep direction, `1.0` or `-1.0`.
    direction: f32,
}

pub struct HeadEngine {
    config: HeadConfig,
    yaw_id: JointId,
    pitch_id: JointId,
    gaze: Mutex<Gaze>,
    adapter: Arc<MotionAdapter>,
    cycles: AtomicU64,
    worker: PeriodicWorker,
}

impl HeadEngine {
    pub fn new(
        config: HeadConfig,
        model: &RobotModel,
        adapter: Arc<MotionAdapter>,
    ) -> Result<Arc<Self>, StriderError> {
        if config.control_hz <= 0.0 {
            return Err(StriderError::Config(format!(
                "head.control_hz must be positive, got {}",
                config.control_hz
            )));
        }
        Ok(Arc::new(Self {
            yaw_id: model.require(joints::HEAD_YAW)?,
            pitch_id: model.require(joints::HEAD_PITCH)?,
            gaze: Mutex::new(Gaze {
                mode: LookMode::Fixed {
                    yaw_deg: 0.0,
                    pitch_deg: 0.0,
                },
                yaw: 0.0,
                pitch: 0.0,
                direction: 1.0,
            }),
            config,
            adapter,
            cycles: AtomicU64::new(0),
            worker: PeriodicWorker::new("head"),
        }))
    }

    /// Hold a fixed gaze.  Angles are clamped to the neck's range.
    pub fn look_at(&self, yaw_deg: f32, pitch_deg: f32) {
        let yaw = yaw_deg.clamp(-self.config.yaw_limit_deg, self.config.yaw_limit_deg);
        let pitch = pitch_deg.clamp(self.config.pitch_min_deg, self.config.pitch_max_deg);
        self.gaze.lock().mode = LookMode::Fixed {
            yaw_deg: yaw,
            pitch_deg: pitch,
        };
    }

    /// Sweep left and right from the current yaw.
    pub fn scan(&self) {
        let mut gaze = self.gaze.lock();
        if gaze.mode != LookMode::Scan {
            debug!("head scan started");
            gaze.mode = LookMode::Scan;
        }
    }

    pub fn mode(&self) -> LookMode {
        self.gaze.lock().mode
    }

    /// Last commanded `(yaw, pitch)`, degrees.
    pub fn gaze(&self) -> (f32, f32) {
        let gaze = self.gaze.lock();
        (gaze.yaw, gaze.pitch)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Compute this step's head target and offer it to the head mailbox.
    /// Returns `false` if the mailbox was still full.
    pub fn tick(&self) -> bool {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let mut gaze = self.gaze.lock();
        match gaze.mode {
            LookMode::Fixed { yaw_deg, pitch_deg } => {
                gaze.yaw = yaw_deg;
                gaze.pitch = pitch_deg;
            }
            LookMode::Scan => {
                let limit = self.config.scan_yaw_deg.min(self.config.yaw_limit_deg);
                let step = self.config.scan_speed_deg_s / self.config.control_hz as f32;
                let mut yaw = gaze.yaw + gaze.direction * step;
                if yaw >= limit {
                    yaw = limit;
                    gaze.direction = -1.0;
                } else if yaw <= -limit {
                    yaw = -limit;
                    gaze.direction = 1.0;
                }
                gaze.yaw = yaw;
                gaze.pitch = self
                    .config
                    .scan_pitch_deg
                    .clamp(self.config.pitch_min_deg, self.config.pitch_max_deg);
            }
        }
        let target = JointDegrees::from([(self.yaw_id, gaze.yaw), (self.pitch_id, gaze.pitch)]);
        drop(gaze);
        self.adapter.enqueue_head(target)
    }

    pub fn start(self: &Arc<Self>) -> Result<(), StriderError> {
        let engine = Arc::downgrade(self);
        self.worker
            .start(Duration::from_secs_f64(1.0 / self.config.control_hz), move || {
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

#[cfg(test)]
mod tests {
    use super::*;
    use strider_hal::JointCommandSource;

    fn engine() -> (Arc<HeadEngine>, Arc<MotionAdapter>) {
        let adapter = Arc::new(MotionAdapter::new());
        let head =
            HeadEngine::new(HeadConfig::default(), &RobotModel::default(), adapter.clone()).unwrap();
        (head, adapter)
    }

    #[test]
    fn fixed_gaze_reaches_the_head_mailbox() {
        let (head, adapter) = engine();
        head.look_at(30.0, 20.0);
        assert!(head.tick());
        let degs = adapter.take_head().unwrap();
        assert_eq!(degs[&1], 30.0);
        assert_eq!(degs[&2], 20.0);
    }

    #[test]
    fn look_at_clamps_to_range() {
        let (head, _) = engine();
        head.look_at(500.0, -90.0);
        assert_eq!(
            head.mode(),
            LookMode::Fixed {
                yaw_deg: 110.0,
                pitch_deg: -10.0
            }
        );
    }

    #[test]
    fn full_mailbox_is_reported() {
        let (head, _) = engine();
        assert!(head.tick());
        assert!(!head.tick());
    }

    #[test]
    fn scan_sweeps_between_limits() {
        let (head, adapter) = engine();
        head.scan();
        let mut min: f32 = 0.0;
        let mut max: f32 = 0.0;
        // 90°/s at 50 Hz: 1.8° per step, a full sweep is 200 steps.
        for _ in 0..400 {
            head.tick();
            adapter.take_head();
            let (yaw, pitch) = head.gaze();
            min = min.min(yaw);
            max = max.max(yaw);
            assert_eq!(pitch, 45.0);
        }
        assert_eq!(max, 90.0);
        assert_eq!(min, -90.0);
    }
}
