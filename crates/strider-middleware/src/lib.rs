//! `strider-middleware` – sensor event routing.
//!
//! Sensor readers push typed [`SensorEvent`][strider_types::SensorEvent]s
//! into a [`SensorHub`]; the hub forwards each event, synchronously and on
//! the publishing thread, to the subscribers attached for that event's kind.
//!
//! # Modules
//!
//! - [`hub`] – [`SensorHub`] and the [`SensorSubscriber`] trait.

pub mod hub;

pub use hub::{SensorHub, SensorSubscriber};
