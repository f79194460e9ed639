//! The `Executable` capability
//!
//! Concrete execution types implement [`Executable`]: they supply their
//! work and their option schema, and inherit the whole lifecycle from
//! [`Execution`](crate::Execution). Work reports its outcome through a
//! [`Completion`] handle rather than through its return value, so it may
//! hand the handle to spawned tasks and settle later.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::Level;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::execution::Shared;
use crate::logger::SharedLogger;
use crate::options::{OptionSchema, Options};
use crate::status::Status;

// ─────────────────────────────────────────────────────────────────
// Executable
// ─────────────────────────────────────────────────────────────────

/// A unit of asynchronous work with a declared option schema
#[async_trait]
pub trait Executable: Send + Sync {
    /// Name used in logs and programming errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Declared options; resolved afresh for every run
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
    }

    /// Start the work and eventually settle `completion`
    ///
    /// Returning an error rejects the run. Returning `Ok(())` without
    /// settling leaves the run pending until the completion handle is
    /// used or the timeout elapses. The returned future is dropped once
    /// the run settles.
    async fn execute(&self, ctx: ExecutionContext, completion: Completion) -> Result<()> {
        let _ = (ctx, completion);
        Err(Error::must_override_execute(self.name()))
    }

    /// Report a faulted run; the default logs the error description
    fn error(&self, ctx: &ExecutionContext, err: &Error) {
        log_error(ctx, err);
    }
}

/// Default fault report: the error description through the run's logger
pub fn log_error(ctx: &ExecutionContext, err: &Error) {
    ctx.logger().log_at(Level::ERROR, &err.to_string());
}

#[async_trait]
impl<T: Executable + ?Sized> Executable for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn options(&self) -> OptionSchema {
        (**self).options()
    }

    async fn execute(&self, ctx: ExecutionContext, completion: Completion) -> Result<()> {
        (**self).execute(ctx, completion).await
    }

    fn error(&self, ctx: &ExecutionContext, err: &Error) {
        (**self).error(ctx, err)
    }
}

// ─────────────────────────────────────────────────────────────────
// Execution Context
// ─────────────────────────────────────────────────────────────────

/// Read-only view of one run, handed to the work
#[derive(Clone)]
pub struct ExecutionContext {
    pub(crate) id: Uuid,
    pub(crate) inputs: Arc<Vec<Value>>,
    pub(crate) options: Arc<Options>,
    pub(crate) logger: SharedLogger,
    pub(crate) timeout_ms: u64,
    pub(crate) shared: Arc<Shared>,
}

impl ExecutionContext {
    /// Execution identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Inputs of the run, empty when the execution ignores them
    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    /// Effective options of the run
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// One effective option
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// One effective option as a string
    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(Value::as_str)
    }

    /// Logger of the run
    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    /// Armed timeout in milliseconds, 0 when disabled
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Current status of the execution
    pub fn status(&self) -> Status {
        self.shared.lifecycle.status()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("inputs", &self.inputs.len())
            .field("options", &self.options)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Completion
// ─────────────────────────────────────────────────────────────────

/// Settles a run; only the first call on any clone has an effect
#[derive(Clone)]
pub struct Completion {
    pub(crate) shared: Arc<Shared>,
}

impl Completion {
    /// Settle the run successfully; returns false if it already settled
    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.shared.settle(Ok(value.into()))
    }

    /// Settle the run with a failure; returns false if it already settled
    pub fn reject(&self, err: Error) -> bool {
        self.shared.settle(Err(err))
    }

    /// Reject with a plain message
    pub fn reject_with(&self, message: impl Into<String>) -> bool {
        self.reject(Error::rejected(message))
    }

    /// Whether the run has left RUNNING
    pub fn is_settled(&self) -> bool {
        self.shared.lifecycle.status().is_settled()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}
