//! `strider-world` – the robot's shared picture of itself and the field.
//!
//! # Modules
//!
//! - [`records`] – value types of the individual sub-records (self state,
//!   ball, roster, power, odometry…) and the [`WorldSnapshot`] selector.
//! - [`model`] – [`WorldModel`]: one lock per sub-record, fed by the sensor
//!   hub and read by the behavior layer.

pub mod model;
pub mod records;

pub use model::WorldModel;
pub use records::{
    BallObservation, Odometry, PowerState, RosterEntry, SelfState, SubRecord, WorldConfig,
    WorldSnapshot,
};
