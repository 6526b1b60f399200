//! `strider-motion` – everything that moves the body.
//!
//! # Modules
//!
//! - [`adapter`] – [`MotionAdapter`]: operating-mode state machine and the
//!   single-slot joint mailboxes drained by the motor driver.
//! - [`params`] – [`GaitParameters`].
//! - [`ik`] – [`WalkSolver`] trait and the built-in [`IkWalk`] solver.
//! - [`gait`] – [`GaitEngine`]: the fixed-frequency walk thread.
//! - [`action`] – [`ActionEngine`]: scripted key-frame motions.
//! - [`head`] – [`HeadEngine`]: fixed look and scan sweep.
//! - [`worker`] – [`PeriodicWorker`], the thread wrapper shared by the
//!   engines.

pub mod action;
pub mod adapter;
pub mod gait;
pub mod head;
pub mod ik;
pub mod params;
pub mod worker;

pub use action::{ActionConfig, ActionEngine, ActionScript, ActionTick, KeyFrame};
pub use adapter::{EnqueueOutcome, MotionAdapter};
pub use gait::{ArmPose, CycleReport, GaitConfig, GaitEngine, GaitPhaseState};
pub use head::{HeadConfig, HeadEngine, LookMode};
pub use ik::{IkWalk, LegAngles, WalkOutput, WalkSolver};
pub use params::GaitParameters;
pub use worker::PeriodicWorker;
