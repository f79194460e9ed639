//! Execution status tracking
//!
//! The status of an execution only ever moves forward:
//!
//! ```text
//! PENDING -> RUNNING -> RESOLVED
//!                    -> REJECTED -> FAULTED
//! ```
//!
//! A run that ends through the failure path is recorded as REJECTED at
//! settlement and then FAULTED once the failure reaches the outer future.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of an execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Constructed, `run` not called yet
    #[default]
    Pending,
    /// Work has been started and has not settled
    Running,
    /// Work settled through the failure path
    Rejected,
    /// Work settled through the success path
    Resolved,
    /// Reserved for execution types that track post-settlement work
    Finished,
    /// The run's failure reached the caller
    Faulted,
}

impl Status {
    /// Get the status name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Rejected => "REJECTED",
            Status::Resolved => "RESOLVED",
            Status::Finished => "FINISHED",
            Status::Faulted => "FAULTED",
        }
    }

    /// Whether the run has settled one way or another
    pub fn is_settled(&self) -> bool {
        !matches!(self, Status::Pending | Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LifecycleState {
    status: Status,
    started_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
}

/// Owns the status of one execution and enforces legal transitions
///
/// Every mutator reports whether it actually moved the status, so callers
/// can make at-most-once decisions without holding the lock themselves.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in the PENDING state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// When the run started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().started_at
    }

    /// When the run settled
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().settled_at
    }

    /// PENDING -> RUNNING
    ///
    /// Fails for any other starting state; an instance runs once.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status != Status::Pending {
            return Err(Error::AlreadyRun);
        }
        state.status = Status::Running;
        state.started_at = Some(Utc::now());
        debug!(from = %Status::Pending, to = %Status::Running, "Execution status changed");
        Ok(())
    }

    /// RUNNING -> RESOLVED
    pub fn resolve(&self) -> bool {
        self.settle(Status::Resolved)
    }

    /// RUNNING -> REJECTED
    pub fn reject(&self) -> bool {
        self.settle(Status::Rejected)
    }

    fn settle(&self, to: Status) -> bool {
        let mut state = self.state.lock();
        if state.status != Status::Running {
            return false;
        }
        state.status = to;
        state.settled_at = Some(Utc::now());
        debug!(from = %Status::Running, to = %to, "Execution status changed");
        true
    }

    /// {RUNNING, REJECTED} -> FAULTED
    ///
    /// A RESOLVED run never faults.
    pub fn fault(&self) -> bool {
        let mut state = self.state.lock();
        let from = state.status;
        match from {
            Status::Running | Status::Rejected => {
                state.status = Status::Faulted;
                if state.settled_at.is_none() {
                    state.settled_at = Some(Utc::now());
                }
                debug!(from = %from, to = %Status::Faulted, "Execution status changed");
                true
            }
            _ => false,
        }
    }
}
