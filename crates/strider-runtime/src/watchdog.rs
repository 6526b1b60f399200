//! [`Watchdog`] – liveness monitor for the periodic engines.
//!
//! Every engine exposes a monotonically increasing cycle counter.  The player
//! feeds those counters to [`Watchdog::observe`] once per tick; a counter that
//! moved counts as a heartbeat.  A component whose heartbeat is older than
//! its timeout is *frozen*.  Frozen components are reported, never
//! restarted: the decision is left to the operator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct ComponentEntry {
    last_heartbeat: Instant,
    timeout: Duration,
    last_count: Option<u64>,
    /// Already returned by [`Watchdog::newly_frozen`] since the last
    /// heartbeat.
    reported: bool,
}

impl ComponentEntry {
    fn beat(&mut self) {
        self.last_heartbeat = Instant::now();
        self.reported = false;
    }

    fn is_frozen(&self) -> bool {
        self.last_heartbeat.elapsed() > self.timeout
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// # Example
///
/// ```
/// use std::time::Duration;
/// use strider_runtime::watchdog::Watchdog;
///
/// let mut wd = Watchdog::new();
/// wd.register("gait", Duration::from_secs(1));
/// wd.observe("gait", 42);
///
/// assert!(wd.check_all().is_empty());
/// ```
#[derive(Default)]
pub struct Watchdog {
    components: HashMap<String, ComponentEntry>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component_id` with a maximum heartbeat `timeout`.  The
    /// component starts healthy; re-registering resets its deadline.
    pub fn register(&mut self, component_id: &str, timeout: Duration) {
        self.components.insert(
            component_id.to_string(),
            ComponentEntry {
                last_heartbeat: Instant::now(),
                timeout,
                last_count: None,
                reported: false,
            },
        );
    }

    /// Feed the current cycle counter of `component_id`.  A changed counter
    /// is a heartbeat; the first observation only sets the baseline.
    /// Unknown components are ignored.
    pub fn observe(&mut self, component_id: &str, count: u64) {
        if let Some(entry) = self.components.get_mut(component_id) {
            if entry.last_count.is_some_and(|c| c != count) {
                entry.beat();
            }
            entry.last_count = Some(count);
        }
    }

    /// Ids of all frozen components, sorted.
    pub fn check_all(&self) -> Vec<String> {
        let mut frozen: Vec<String> = self
            .components
            .iter()
            .filter(|(_, entry)| entry.is_frozen())
            .map(|(id, _)| id.clone())
            .collect();
        frozen.sort();
        frozen
    }

    /// Frozen components not yet returned by a previous call.  A component
    /// is reported again only after it recovered and froze anew.
    pub fn newly_frozen(&mut self) -> Vec<String> {
        let mut frozen: Vec<String> = self
            .components
            .iter_mut()
            .filter(|(_, entry)| entry.is_frozen() && !entry.reported)
            .map(|(id, entry)| {
                entry.reported = true;
                id.clone()
            })
            .collect();
        frozen.sort();
        frozen
    }
}
