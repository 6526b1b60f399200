//! `strider-runtime` – process-level orchestration of the locomotion core.
//!
//! # Modules
//!
//! - [`player`] – [`Player`][player::Player]: builds every component from a
//!   [`RuntimeConfig`][player::RuntimeConfig], brings the robot up in order,
//!   runs the think tick (buttons, watchdog, remote control or behavior FSM)
//!   and shuts down with the engines stopping before the servo bus closes.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: reports engines whose
//!   cycle counters stopped moving.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber, with an OTLP span exporter when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

pub mod player;
pub mod telemetry;
pub mod watchdog;

pub use player::{Player, PlayerConfig, RuntimeConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use watchdog::Watchdog;
