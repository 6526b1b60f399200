//! In-process servo bus for CI and headless runs.
//!
//! [`SimServoBus`] accepts every command and records it in a shared
//! [`SimBusState`], so tests can assert on what reached the "hardware"
//! without any serial device attached.
//!
//! # Example
//!
//! ```rust
//! use strider_hal::bus::ServoBus;
//! use strider_hal::sim::SimServoBus;
//!
//! let mut bus = SimServoBus::new("sim0");
//! let state = bus.state();
//! bus.open().unwrap();
//! bus.write_positions(&[(1, 2048)]).unwrap();
//! assert_eq!(state.lock().positions[&1], 2048);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use strider_types::{JointId, StriderError};

use crate::bus::ServoBus;

/// Everything the simulated bus has been told so far.
#[derive(Debug, Clone)]
pub struct SimBusState {
    pub open: bool,
    /// Reject `open()` with a device error.
    pub fail_open: bool,
    /// Number of pings that fail before the chain "powers up".
    pub pings_until_connected: u32,
    pub pings: u32,
    pub voltage: f32,
    /// Fail every `read_voltage`.
    pub fail_voltage_read: bool,
    pub torque: bool,
    pub led: bool,
    pub positions: BTreeMap<JointId, u32>,
    pub writes: u64,
}

impl Default for SimBusState {
    fn default() -> Self {
        Self {
            open: false,
            fail_open: false,
            pings_until_connected: 0,
            pings: 0,
            voltage: 16.4,
            fail_voltage_read: false,
            torque: false,
            led: false,
            positions: BTreeMap::new(),
            writes: 0,
        }
    }
}

/// Simulated servo chain.  Cloning the [`state`][SimServoBus::state] handle
/// lets a test observe the bus after it has been moved into a driver.
pub struct SimServoBus {
    device: String,
    state: Arc<Mutex<SimBusState>>,
}

impl SimServoBus {
    pub fn new(device: impl Into<String>) -> Self {
        Self::with_state(device, SimBusState::default())
    }

    pub fn with_state(device: impl Into<String>, state: SimBusState) -> Self {
        Self {
            device: device.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Shared view of the recorded bus state.
    pub fn state(&self) -> Arc<Mutex<SimBusState>> {
        Arc::clone(&self.state)
    }

    fn ensure_open(&self, state: &SimBusState) -> Result<(), StriderError> {
        if state.open {
            Ok(())
        } else {
            Err(StriderError::HardwareFault {
                component: self.device.clone(),
                details: "bus is closed".to_string(),
            })
        }
    }
}

impl ServoBus for SimServoBus {
    fn device(&self) -> &str {
        &self.device
    }

    fn open(&mut self) -> Result<(), StriderError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(StriderError::DeviceOpen {
                device: self.device.clone(),
                details: "simulated open failure".to_string(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn ping(&mut self, id: JointId) -> Result<(), StriderError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        state.pings += 1;
        if state.pings > state.pings_until_connected {
            Ok(())
        } else {
            Err(StriderError::HardwareFault {
                component: format!("servo {id}"),
                details: "no status packet".to_string(),
            })
        }
    }

    fn read_voltage(&mut self, id: JointId) -> Result<f32, StriderError> {
        let state = self.state.lock();
        self.ensure_open(&state)?;
        if state.fail_voltage_read {
            return Err(StriderError::HardwareFault {
                component: format!("servo {id}"),
                details: "voltage register unreadable".to_string(),
            });
        }
        Ok(state.voltage)
    }

    fn set_torque(&mut self, _ids: &[JointId], enabled: bool) -> Result<(), StriderError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        state.torque = enabled;
        Ok(())
    }

    fn set_led(&mut self, _ids: &[JointId], on: bool) -> Result<(), StriderError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        state.led = on;
        Ok(())
    }

    fn write_positions(&mut self, positions: &[(JointId, u32)]) -> Result<(), StriderError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        for &(id, ticks) in positions {
            state.positions.insert(id, ticks);
        }
        state.writes += 1;
        Ok(())
    }
}
