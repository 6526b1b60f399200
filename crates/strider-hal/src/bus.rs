//! Generic `ServoBus` trait for a daisy-chained servo network.
//!
//! Drivers implement this trait for a concrete protocol; the
//! [`MotorDriver`][crate::motor::MotorDriver] only ever talks to the trait,
//! so the serial layer can be swapped (or simulated) without touching the
//! motion code.

use strider_types::{JointId, StriderError};

/// Encoder resolution of one full turn.
pub const TICKS_PER_TURN: u32 = 4096;
/// Tick value of the mechanical zero.
pub const ZERO_TICK: u32 = 2048;

/// A chain of position-controlled servos sharing one device handle.
pub trait ServoBus: Send {
    /// Device path or name, used in log and error messages.
    fn device(&self) -> &str;

    /// Open the device.
    ///
    /// # Errors
    ///
    /// Returns [`StriderError::DeviceOpen`] when the port cannot be opened or
    /// configured.
    fn open(&mut self) -> Result<(), StriderError>;

    /// Release the device.  Closing an unopened bus is a no-op.
    fn close(&mut self);

    /// Probe servo `id`.  Succeeds once the chain is powered.
    fn ping(&mut self, id: JointId) -> Result<(), StriderError>;

    /// Read the supply voltage (volts) seen by servo `id`.
    fn read_voltage(&mut self, id: JointId) -> Result<f32, StriderError>;

    fn set_torque(&mut self, ids: &[JointId], enabled: bool) -> Result<(), StriderError>;

    fn set_led(&mut self, ids: &[JointId], on: bool) -> Result<(), StriderError>;

    /// Sync-write goal positions, in encoder ticks.
    fn write_positions(&mut self, positions: &[(JointId, u32)]) -> Result<(), StriderError>;
}

/// Convert a joint angle in degrees to encoder ticks, saturating at the
/// encoder range.
pub fn degrees_to_ticks(deg: f32) -> u32 {
    let per_tick = 360.0 / TICKS_PER_TURN as f32;
    let ticks = deg / per_tick + ZERO_TICK as f32;
    ticks.round().clamp(0.0, (TICKS_PER_TURN - 1) as f32) as u32
}

/// Inverse of [`degrees_to_ticks`].
pub fn ticks_to_degrees(ticks: u32) -> f32 {
    (ticks as i64 - ZERO_TICK as i64) as f32 * (360.0 / TICKS_PER_TURN as f32)
}
