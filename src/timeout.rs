//! Timeout race
//!
//! A countdown armed for one run. If it elapses it invokes the supplied
//! callback; the run's settlement logic decides whether that still
//! matters. Disarming is idempotent and safe from inside the callback.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

/// Owned countdown handle of one execution
#[derive(Debug, Default)]
pub struct TimeoutRace {
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutRace {
    /// Create a disarmed race
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the countdown
    ///
    /// A zero duration leaves the timeout disabled and returns false.
    /// Re-arming replaces any countdown already running. Must be called
    /// from within a Tokio runtime.
    pub fn arm<F>(&self, duration_ms: u64, on_timeout: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if duration_ms == 0 {
            return false;
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            on_timeout();
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
        trace!(duration_ms, "Timeout armed");
        true
    }

    /// Cancel the countdown; returns false if nothing was armed
    pub fn disarm(&self) -> bool {
        match self.timer.lock().take() {
            Some(handle) => {
                handle.abort();
                trace!("Timeout disarmed");
                true
            }
            None => false,
        }
    }

    /// Whether a countdown is pending
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TimeoutRace {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}
