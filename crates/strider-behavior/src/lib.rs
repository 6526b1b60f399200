//! `strider-behavior` – turns the world model into motion intents.
//!
//! # Modules
//!
//! - [`plan`] – [`Plan`]: closed set of one-shot intents (`Walk`, `Look`,
//!   `Scan`, `Action`, `Halt`) and the [`MotionHandles`] they act on.
//! - [`states`] – [`BehaviorState`] trait and the stance, search, approach,
//!   kick and safe-stop states.
//! - [`fsm`] – [`BehaviorFsm`]: per-tick state selection from a
//!   [`TickContext`] snapshot.

pub mod fsm;
pub mod plan;
pub mod states;

pub use fsm::{BehaviorConfig, BehaviorFsm, TickContext, select_state};
pub use plan::{MotionHandles, Plan};
pub use states::{BehaviorState, StateKind};
