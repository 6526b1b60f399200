//! [`MotionAdapter`] – the single arbitration point between motion producers
//! and the actuator bus.
//!
//! The adapter owns two things:
//!
//! - the [`OperatingMode`] state machine, mutated only through
//!   [`MotionAdapter::request_mode_change`] and [`MotionAdapter::leave_ready`];
//! - the outgoing body and head mailboxes, each a single-slot
//!   `crossbeam_channel::bounded(1)`.
//!
//! A producer may write the body mailbox only while the current mode admits
//! it, and only when the slot is empty.  The motor driver drains both
//! mailboxes through the [`JointCommandSource`] impl.
//!
//! # Mode transitions
//!
//! | Current | Target | Committed |
//! |---|---|---|
//! | any | same | unchanged |
//! | any | `Stopped` | `Stopped` |
//! | `Stopped` | other | `Ready` |
//! | `Walk` | `Ready` or `Act` | `Ready` |
//! | `Ready` | `Act` or `Walk` | `Walk` if the previous mode was `Act`, else `Act` |
//! | `Act` | `Walk` | `Walk` only for [`ModeSource::Action`], else `Act` |
//! | `Act` | `Ready` | `Ready` |
//!
//! # Example
//!
//! ```rust
//! use strider_motion::MotionAdapter;
//! use strider_types::{ModeSource, OperatingMode};
//!
//! let adapter = MotionAdapter::new();
//! // Leaving READY alternates; the first exit goes to ACT.
//! assert_eq!(adapter.request_mode_change(ModeSource::Behavior, OperatingMode::Walk), OperatingMode::Act);
//! // Only the action engine may complete an ACT phase.
//! assert_eq!(adapter.request_mode_change(ModeSource::Behavior, OperatingMode::Walk), OperatingMode::Act);
//! assert_eq!(adapter.request_mode_change(ModeSource::Action, OperatingMode::Walk), OperatingMode::Walk);
//! ```

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use strider_hal::JointCommandSource;
use strider_types::{JointCommand, JointDegrees, ModeSource, MotionProducer, OperatingMode};
use tracing::{debug, info};

/// Sleep between attempts of [`MotionAdapter::enqueue_with_backoff`].
pub const BACKOFF_SLEEP: Duration = Duration::from_micros(500);
const SPIN_ATTEMPTS: u32 = 8;

/// Result of [`MotionAdapter::enqueue_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// The current mode does not admit the producer.
    Rejected,
    /// The slot stayed occupied for the whole budget.
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModeState {
    current: OperatingMode,
    last: OperatingMode,
}

/// Mode committed for `target` given the current state.
fn resolve_transition(
    state: ModeState,
    source: ModeSource,
    target: OperatingMode,
) -> OperatingMode {
    use OperatingMode::*;
    match (state.current, target) {
        (current, target) if current == target => current,
        (_, Stopped) => Stopped,
        (Stopped, _) => Ready,
        (Walk, Ready | Act) => Ready,
        (Ready, Act | Walk) => ready_exit(state.last),
        (Act, Walk) if source == ModeSource::Action => Walk,
        (Act, Walk) => Act,
        (Act, Ready) => Ready,
        // Only reached for same-mode pairs, handled by the first arm.
        (current, _) => current,
    }
}

fn ready_exit(last: OperatingMode) -> OperatingMode {
    if last == OperatingMode::Act {
        OperatingMode::Walk
    } else {
        OperatingMode::Act
    }
}

enum Attempt {
    Sent,
    NotAdmitted,
    Full(JointCommand),
}

/// Mode state machine plus the outgoing joint mailboxes.  Share with `Arc`.
pub struct MotionAdapter {
    mode: Mutex<ModeState>,
    body_tx: Sender<JointCommand>,
    body_rx: Receiver<JointCommand>,
    head_tx: Sender<JointDegrees>,
    head_rx: Receiver<JointDegrees>,
}

impl Default for MotionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionAdapter {
    pub fn new() -> Self {
        let (body_tx, body_rx) = bounded(1);
        let (head_tx, head_rx) = bounded(1);
        Self {
            mode: Mutex::new(ModeState::default()),
            body_tx,
            body_rx,
            head_tx,
            head_rx,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode.lock().current
    }

    /// Mode held before the most recent committed change.
    pub fn last_mode(&self) -> OperatingMode {
        self.mode.lock().last
    }

    /// Ask for `target`; returns the mode actually committed.
    pub fn request_mode_change(&self, source: ModeSource, target: OperatingMode) -> OperatingMode {
        let mut state = self.mode.lock();
        let next = resolve_transition(*state, source, target);
        self.commit(&mut state, next, source);
        next
    }

    /// Leave `Ready` by the alternation rule.  Does nothing unless the
    /// current mode is `Ready`; returns the mode in force afterwards.
    pub fn leave_ready(&self, source: ModeSource) -> OperatingMode {
        let mut state = self.mode.lock();
        if state.current != OperatingMode::Ready {
            return state.current;
        }
        let next = ready_exit(state.last);
        self.commit(&mut state, next, source);
        next
    }

    fn commit(&self, state: &mut ModeState, next: OperatingMode, source: ModeSource) {
        if next == state.current {
            return;
        }
        info!(from = ?state.current, to = ?next, source = ?source, "operating mode changed");
        state.last = state.current;
        state.current = next;

        // A pending command from a producer the new mode no longer admits
        // never reaches the bus.  Producers need this lock to send, so the
        // slot cannot be refilled concurrently.
        if let Ok(cmd) = self.body_rx.try_recv() {
            if next.admits(cmd.producer) {
                let _ = self.body_tx.try_send(cmd);
            } else {
                debug!(producer = ?cmd.producer, "discarded pending body command");
            }
        }
    }

    fn try_enqueue(&self, cmd: JointCommand) -> Attempt {
        let state = self.mode.lock();
        if !state.current.admits(cmd.producer) {
            return Attempt::NotAdmitted;
        }
        match self.body_tx.try_send(cmd) {
            Ok(()) => Attempt::Sent,
            Err(TrySendError::Full(cmd)) => Attempt::Full(cmd),
            Err(TrySendError::Disconnected(_)) => Attempt::NotAdmitted,
        }
    }

    /// Offer body targets once.  Returns `false` when the producer is not
    /// admitted by the current mode or the slot is occupied.
    pub fn enqueue_joint_degrees(&self, producer: MotionProducer, degrees: JointDegrees) -> bool {
        matches!(
            self.try_enqueue(JointCommand { producer, degrees }),
            Attempt::Sent
        )
    }

    /// Offer body targets, retrying while the slot is occupied until `budget`
    /// has elapsed.  Spins briefly, then sleeps [`BACKOFF_SLEEP`] between
    /// attempts.
    pub fn enqueue_with_backoff(
        &self,
        producer: MotionProducer,
        degrees: JointDegrees,
        budget: Duration,
    ) -> EnqueueOutcome {
        let deadline = Instant::now() + budget;
        let mut cmd = JointCommand { producer, degrees };
        let mut attempts = 0u32;
        loop {
            match self.try_enqueue(cmd) {
                Attempt::Sent => return EnqueueOutcome::Accepted,
                Attempt::NotAdmitted => return EnqueueOutcome::Rejected,
                Attempt::Full(back) => cmd = back,
            }
            if Instant::now() >= deadline {
                return EnqueueOutcome::TimedOut;
            }
            attempts += 1;
            if attempts < SPIN_ATTEMPTS {
                std::hint::spin_loop();
            } else {
                std::thread::sleep(BACKOFF_SLEEP);
            }
        }
    }

    pub fn body_buffer_empty(&self) -> bool {
        self.body_rx.is_empty()
    }

    /// Offer head targets.  The head mailbox is not mode-gated.
    pub fn enqueue_head(&self, degrees: JointDegrees) -> bool {
        self.head_tx.try_send(degrees).is_ok()
    }

    pub fn head_buffer_empty(&self) -> bool {
        self.head_rx.is_empty()
    }
}

impl JointCommandSource for MotionAdapter {
    fn take_body(&self) -> Option<JointCommand> {
        self.body_rx.try_recv().ok()
    }

    fn take_head(&self) -> Option<JointDegrees> {
        self.head_rx.try_recv().ok()
    }
}
