//! `strider-hal` – actuator side of the core.
//!
//! Everything that touches the servo bus lives here, behind traits so the
//! motion layer never depends on a concrete driver.
//!
//! # Modules
//!
//! - [`bus`] – [`ServoBus`][bus::ServoBus]: the device-level contract of a
//!   servo chain (open, ping, torque, sync-write positions) plus the
//!   degree ↔ tick conversion.
//! - [`sim`] – [`SimServoBus`][sim::SimServoBus]: in-process bus that records
//!   every write, for tests and headless runs.
//! - [`robot`] – [`RobotModel`][robot::RobotModel]: joint table and leg
//!   geometry.
//! - [`motor`] – [`MotorDriver`][motor::MotorDriver]: the periodic thread that
//!   drains the joint-command outbox and drives the bus.

pub mod bus;
pub mod motor;
pub mod robot;
pub mod sim;

pub use bus::ServoBus;
pub use motor::{JointCommandSource, MotorConfig, MotorDriver};
pub use robot::{JointSpec, LegGeometry, RobotConfig, RobotModel};
pub use sim::{SimBusState, SimServoBus};
