//! Fixed-period OS thread with a cooperative stop flag.
//!
//! Every motion engine runs on one of these.  The loop body is a closure that
//! is called once per period; [`PeriodicWorker::stop`] clears the alive flag
//! and joins, so the engine is guaranteed to be quiescent when `stop`
//! returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strider_types::StriderError;
use tracing::{info, warn};

pub struct PeriodicWorker {
    name: String,
    alive: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alive: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the thread.  `tick` returns `false` to end the loop early (its
    /// owner went away).  Starting a running worker is a no-op.
    pub fn start<F>(&self, period: Duration, mut tick: F) -> Result<(), StriderError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self.alive.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let alive = Arc::clone(&self.alive);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                while alive.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    if !tick() {
                        break;
                    }
                    if let Some(rest) = period.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                alive.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.alive.store(false, Ordering::SeqCst);
                StriderError::Thread(format!("{}: {e}", self.name))
            })?;
        *self.handle.lock() = Some(handle);
        info!(engine = %self.name, period_ms = period.as_millis() as u64, "engine started");
        Ok(())
    }

    /// Clear the alive flag and join the thread.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!(engine = %self.name, "engine thread panicked");
            }
            info!(engine = %self.name, "engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
