//! [`MotorDriver`] – the periodic thread that owns the servo bus.
//!
//! The driver runs at its own cadence, independent of the motion engines:
//!
//! 1. While the chain is disconnected it pings a reference servo every
//!    `connect_retry_ms`.  On the first answer it reads the supply voltage,
//!    enables torque and marks the bus connected.
//! 2. While connected it drains the head and body outboxes of its
//!    [`JointCommandSource`], merges them into the current pose, converts
//!    degrees to encoder ticks through the [`RobotModel`] calibration and
//!    sync-writes every position.  LEDs toggle and the voltage is re-read
//!    once per `led_toggle_ms`.
//! 3. Every tick it publishes a JOINT_FEEDBACK event on the [`SensorHub`].
//!
//! A failed write drops the driver back into the disconnected state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strider_middleware::SensorHub;
use strider_types::{
    JointCommand, JointDegrees, JointFeedback, JointId, SensorEvent, SensorPayload, StriderError,
};
use tracing::{debug, info, warn};

use crate::bus::{ServoBus, degrees_to_ticks};
use crate::robot::RobotModel;

/// Where the driver pulls its joint targets from.
///
/// Both methods must be non-blocking: they take whatever sits in the
/// respective mailbox and leave it empty.
pub trait JointCommandSource: Send + Sync {
    /// Pending body command, if any.
    fn take_body(&self) -> Option<JointCommand>;

    /// Pending head (neck) targets, if any.
    fn take_head(&self) -> Option<JointDegrees>;
}

/// `[motor]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Serial device of the servo chain.
    pub device: String,
    pub period_ms: u64,
    /// Below this supply voltage the robot reports low power.
    pub min_volt: f32,
    /// Servo probed while waiting for the chain to power up.
    pub ping_joint: JointId,
    pub led_toggle_ms: u64,
    pub connect_retry_ms: u64,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            period_ms: 10,
            min_volt: 14.8,
            ping_joint: 1,
            led_toggle_ms: 1000,
            connect_retry_ms: 1000,
        }
    }
}

#[derive(Default)]
struct DriverState {
    pose: JointDegrees,
    /// Last successful supply reading; `None` until one succeeded.
    voltage: Option<f32>,
    led: bool,
    last_ping: Option<Instant>,
    last_led: Option<Instant>,
}

/// Owner of the servo bus.  Construct with [`MotorDriver::new`], then
/// [`start`][MotorDriver::start] the thread.
pub struct MotorDriver {
    config: MotorConfig,
    model: Arc<RobotModel>,
    bus: Mutex<Box<dyn ServoBus>>,
    source: Arc<dyn JointCommandSource>,
    hub: Arc<SensorHub>,
    state: Mutex<DriverState>,
    connected: AtomicBool,
    alive: AtomicBool,
    cycles: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MotorDriver {
    pub fn new(
        config: MotorConfig,
        model: Arc<RobotModel>,
        bus: Box<dyn ServoBus>,
        source: Arc<dyn JointCommandSource>,
        hub: Arc<SensorHub>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            model,
            bus: Mutex::new(bus),
            source,
            hub,
            state: Mutex::new(DriverState::default()),
            connected: AtomicBool::new(false),
            alive: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            handle: Mutex::new(None),
        })
    }

    /// Open the bus and spawn the driver thread.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::DeviceOpen`] when the bus cannot be opened and
    /// [`StriderError::Thread`] when the thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> Result<(), StriderError> {
        if self.alive.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.bus.lock().open() {
            self.alive.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!(device = %self.config.device, period_ms = self.config.period_ms, "motor driver started");

        let driver = Arc::clone(self);
        let period = Duration::from_millis(self.config.period_ms);
        let handle = thread::Builder::new()
            .name("motor".to_string())
            .spawn(move || {
                while driver.alive.load(Ordering::SeqCst) {
                    driver.tick();
                    thread::sleep(period);
                }
            })
            .map_err(|e| {
                self.alive.store(false, Ordering::SeqCst);
                StriderError::Thread(e.to_string())
            })?;
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop the thread, release torque and close the bus.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("motor thread panicked");
            }
        }

        let ids = self.model.joint_ids();
        let mut bus = self.bus.lock();
        if self.connected.swap(false, Ordering::SeqCst) {
            if let Err(e) = bus.set_torque(&ids, false) {
                warn!(error = %e, "failed to release torque");
            }
        }
        bus.close();
        info!(device = %self.config.device, "motor driver stopped");
    }

    /// One driver iteration.  Called by the thread; public so tests can step
    /// the driver deterministically.
    pub fn tick(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let mut bus = self.bus.lock();

        if self.connected.load(Ordering::SeqCst) {
            if let Some(head) = self.source.take_head() {
                state.pose.extend(head);
            }
            if let Some(cmd) = self.source.take_body() {
                state.pose.extend(cmd.degrees);
            }

            let positions: Vec<(JointId, u32)> = state
                .pose
                .iter()
                .filter_map(|(&id, &deg)| {
                    self.model
                        .joint(id)
                        .map(|spec| (id, degrees_to_ticks(spec.to_servo_degrees(deg))))
                })
                .collect();
            if !positions.is_empty() {
                if let Err(e) = bus.write_positions(&positions) {
                    warn!(error = %e, "position write failed, bus marked disconnected");
                    self.connected.store(false, Ordering::SeqCst);
                }
            }

            let toggle = Duration::from_millis(self.config.led_toggle_ms);
            if state.last_led.is_none_or(|t| now.duration_since(t) >= toggle) {
                state.last_led = Some(now);
                state.led = !state.led;
                let ids = self.model.joint_ids();
                if let Err(e) = bus.set_led(&ids, state.led) {
                    debug!(error = %e, "led toggle failed");
                }
                match bus.read_voltage(self.config.ping_joint) {
                    Ok(v) => state.voltage = Some(v),
                    Err(e) => debug!(error = %e, "voltage read failed"),
                }
            }
        } else {
            let retry = Duration::from_millis(self.config.connect_retry_ms);
            if state.last_ping.is_none_or(|t| now.duration_since(t) >= retry) {
                state.last_ping = Some(now);
                match bus.ping(self.config.ping_joint) {
                    Ok(()) => {
                        match bus.read_voltage(self.config.ping_joint) {
                            Ok(v) => state.voltage = Some(v),
                            Err(e) => debug!(error = %e, "voltage read failed at connect"),
                        }
                        let ids = self.model.joint_ids();
                        match bus.set_torque(&ids, true) {
                            Ok(()) => {
                                self.connected.store(true, Ordering::SeqCst);
                                info!(voltage = ?state.voltage, "servo chain connected");
                            }
                            Err(e) => warn!(error = %e, "torque enable failed"),
                        }
                    }
                    Err(e) => {
                        warn!(device = %bus.device(), error = %e, "servo chain not responding")
                    }
                }
            }
        }
        drop(bus);

        // Low power is only ever derived from a voltage that was read.
        let feedback = JointFeedback {
            voltage: state.voltage.unwrap_or(0.0),
            low_power: state.voltage.is_some_and(|v| v < self.config.min_volt),
            connected: self.connected.load(Ordering::SeqCst),
            degrees: state.pose.clone(),
        };
        drop(state);

        self.hub
            .publish(SensorEvent::new("motor", SensorPayload::JointFeedback(feedback)));
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Latest merged joint targets, degrees.
    pub fn commanded_pose(&self) -> JointDegrees {
        self.state.lock().pose.clone()
    }

    /// Last supply voltage read from the chain, if any.
    pub fn voltage(&self) -> Option<f32> {
        self.state.lock().voltage
    }

    /// Number of completed ticks; used as a liveness counter.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}
