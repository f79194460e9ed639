//! Execution template
//!
//! Wraps an [`Executable`] with everything a run needs: status tracking,
//! input normalisation, option resolution, the timeout race and the
//! fault path. [`Execution::run`] is the single entry point.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ExecutionConfig, RunSettings};
use crate::error::{Error, Result};
use crate::events::{EventKind, ExecutionEvent, Listener, ListenerId, Listeners};
use crate::executable::{Completion, Executable, ExecutionContext};
use crate::logger::{SharedLogger, TracingLogger};
use crate::options::Options;
use crate::status::{Lifecycle, Status};
use crate::timeout::TimeoutRace;

// ─────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────

/// Ordered input records of a run
///
/// A single non-array value becomes a one-element sequence and `null`
/// becomes an empty one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs(Vec<Value>);

impl Inputs {
    /// No inputs
    pub fn empty() -> Self {
        Self::default()
    }

    /// Consume into the records
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Value> for Inputs {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Inputs(Vec::new()),
            Value::Array(items) => Inputs(items),
            other => Inputs(vec![other]),
        }
    }
}

impl From<Option<Value>> for Inputs {
    fn from(value: Option<Value>) -> Self {
        value.map(Inputs::from).unwrap_or_default()
    }
}

impl From<Vec<Value>> for Inputs {
    fn from(items: Vec<Value>) -> Self {
        Inputs(items)
    }
}

// ─────────────────────────────────────────────────────────────────
// Shared Run State
// ─────────────────────────────────────────────────────────────────

/// State reachable from completion handles and the timer task
pub(crate) struct Shared {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) listeners: Listeners,
    timer: TimeoutRace,
    outcome: Mutex<Option<oneshot::Sender<Result<Value>>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            listeners: Listeners::new(),
            timer: TimeoutRace::new(),
            outcome: Mutex::new(None),
        }
    }

    /// Settle the run at most once
    ///
    /// Taking the outcome sender is the linearisation point: whoever takes
    /// it decides the terminal status, every later caller is a no-op.
    pub(crate) fn settle(&self, outcome: Result<Value>) -> bool {
        let Some(tx) = self.outcome.lock().take() else {
            return false;
        };
        self.timer.disarm();

        let moved = match &outcome {
            Ok(_) => self.lifecycle.resolve(),
            Err(_) => self.lifecycle.reject(),
        };
        if !moved {
            return false;
        }
        let _ = tx.send(outcome);
        true
    }

    fn on_timeout(&self, timeout_ms: u64) {
        if self.lifecycle.status() != Status::Running {
            return;
        }
        warn!(timeout_ms, "Execution timed out");
        self.listeners.emit(&ExecutionEvent::Timeout);
        self.settle(Err(Error::timeout(timeout_ms)));
    }

    /// Abandon the run without delivering an outcome
    fn abandon(&self) {
        self.outcome.lock().take();
        self.timer.disarm();
    }
}

/// Abandons a run whose caller stopped polling before it settled
struct AbandonOnDrop<'a> {
    shared: Option<&'a Shared>,
    id: Uuid,
}

impl<'a> AbandonOnDrop<'a> {
    fn new(shared: &'a Shared, id: Uuid) -> Self {
        Self {
            shared: Some(shared),
            id,
        }
    }

    fn defuse(&mut self) {
        self.shared = None;
    }
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.abandon();
            warn!(execution_id = %self.id, "Execution dropped before it settled");
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Instance Settings
// ─────────────────────────────────────────────────────────────────

struct Seeded {
    timeout_ms: u64,
    ignore: bool,
    logger: SharedLogger,
    timeout_handler: Option<ListenerId>,
    inputs: Arc<Vec<Value>>,
    options: Arc<Options>,
}

// ─────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────

/// A single-use run of an [`Executable`]
pub struct Execution<E: Executable> {
    id: Uuid,
    work: E,
    shared: Arc<Shared>,
    seeded: Mutex<Seeded>,
}

impl<E: Executable> Execution<E> {
    /// Create a PENDING execution with default configuration
    pub fn new(work: E) -> Self {
        Self::with_config(work, ExecutionConfig::default())
    }

    /// Create a PENDING execution from a typed configuration
    pub fn with_config(work: E, config: ExecutionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            work,
            shared: Arc::new(Shared::new()),
            seeded: Mutex::new(Seeded {
                timeout_ms: config.timeout_ms,
                ignore: config.ignore,
                logger: TracingLogger::shared(),
                timeout_handler: None,
                inputs: Arc::new(Vec::new()),
                options: Arc::new(Options::new()),
            }),
        }
    }

    /// Replace the logger
    pub fn with_logger(self, logger: SharedLogger) -> Self {
        self.seeded.lock().logger = logger;
        self
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The wrapped work
    pub fn work(&self) -> &E {
        &self.work
    }

    pub fn status(&self) -> Status {
        self.shared.lifecycle.status()
    }

    /// Inputs as observed by the work: empty while `ignore` is set
    pub fn inputs(&self) -> Vec<Value> {
        let seeded = self.seeded.lock();
        if seeded.ignore {
            Vec::new()
        } else {
            seeded.inputs.as_ref().clone()
        }
    }

    /// Effective options of the latest run
    pub fn options(&self) -> Options {
        self.seeded.lock().options.as_ref().clone()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.seeded.lock().timeout_ms
    }

    pub fn is_ignored(&self) -> bool {
        self.seeded.lock().ignore
    }

    pub fn set_ignore(&self, ignore: bool) {
        self.seeded.lock().ignore = ignore;
    }

    pub fn logger(&self) -> SharedLogger {
        self.seeded.lock().logger.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lifecycle.started_at()
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lifecycle.settled_at()
    }

    // ─────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────

    /// Observe a lifecycle notification
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ExecutionEvent<'_>) + Send + Sync + 'static,
    {
        self.shared.listeners.on(kind, listener)
    }

    /// Stop observing
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.off(id)
    }

    // ─────────────────────────────────────────────────────────────
    // Timeout
    // ─────────────────────────────────────────────────────────────

    /// Configure the timeout and optionally observe it
    ///
    /// A zero duration clears the timeout instead. Returns the id of the
    /// registered observer, if one was given.
    pub fn set_timeout(&self, timeout_ms: u64, on_timeout: Option<Listener>) -> Option<ListenerId> {
        if timeout_ms == 0 {
            self.clear_timeout(None);
            return None;
        }

        let id = on_timeout.map(|listener| self.shared.listeners.on_shared(EventKind::Timeout, listener));
        let mut seeded = self.seeded.lock();
        seeded.timeout_ms = timeout_ms;
        if id.is_some() {
            seeded.timeout_handler = id;
        }
        id
    }

    /// Disable the timeout, cancel a pending countdown, and drop the
    /// given observer (or the one registered by `set_timeout`)
    pub fn clear_timeout(&self, on_timeout: Option<ListenerId>) {
        let handler = {
            let mut seeded = self.seeded.lock();
            seeded.timeout_ms = 0;
            match on_timeout {
                Some(id) => {
                    if seeded.timeout_handler == Some(id) {
                        seeded.timeout_handler = None;
                    }
                    Some(id)
                }
                None => seeded.timeout_handler.take(),
            }
        };
        self.shared.timer.disarm();
        if let Some(id) = handler {
            self.shared.listeners.off(id);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Run
    // ─────────────────────────────────────────────────────────────

    /// Run with inputs and option overrides
    pub async fn run(&self, inputs: impl Into<Inputs>, overrides: Option<Options>) -> Result<Value> {
        self.run_with(inputs, overrides, None, RunSettings::default()).await
    }

    /// Run with inputs, option overrides, a logger and per-run settings
    ///
    /// Settles with the value the work resolved with, or fails with the
    /// rejection, the timeout, or a programming error. Failures other than
    /// programming errors fault the execution, notify `error` observers and
    /// reach [`Executable::error`] before they are returned.
    ///
    /// Dropping the returned future before it settles abandons the run: the
    /// timeout is disarmed, no notification fires and later completions
    /// are ignored.
    pub async fn run_with(
        &self,
        inputs: impl Into<Inputs>,
        overrides: Option<Options>,
        logger: Option<SharedLogger>,
        settings: RunSettings,
    ) -> Result<Value> {
        self.shared.lifecycle.start()?;

        let ctx = self.seed(inputs.into(), overrides, logger, settings);
        let (tx, mut rx) = oneshot::channel();
        *self.shared.outcome.lock() = Some(tx);
        let mut guard = AbandonOnDrop::new(&self.shared, self.id);

        info!(
            execution_id = %self.id,
            execution = self.work.name(),
            inputs = ctx.inputs.len(),
            timeout_ms = ctx.timeout_ms,
            "Execution started"
        );
        self.shared.listeners.emit(&ExecutionEvent::Execute);
        self.arm_timeout(ctx.timeout_ms);

        let completion = Completion {
            shared: self.shared.clone(),
        };
        let work = self.work.execute(ctx.clone(), completion);
        tokio::pin!(work);

        let received = tokio::select! {
            biased;
            received = &mut rx => received,
            returned = &mut work => match returned {
                Ok(()) => (&mut rx).await,
                Err(err) if err.is_programming_error() => {
                    guard.defuse();
                    self.shared.abandon();
                    self.shared.lifecycle.fault();
                    error!(execution_id = %self.id, error = %err, "Execution is not runnable");
                    return Err(err);
                }
                Err(err) => {
                    self.shared.settle(Err(err));
                    (&mut rx).await
                }
            },
        };
        guard.defuse();

        let outcome = received
            .unwrap_or_else(|_| Err(Error::Internal("Execution outcome was dropped".to_string())));

        match outcome {
            Ok(value) => {
                info!(execution_id = %self.id, status = %self.status(), "Execution resolved");
                Ok(value)
            }
            Err(err) => Err(self.fault(&ctx, err)),
        }
    }

    fn seed(
        &self,
        inputs: Inputs,
        overrides: Option<Options>,
        logger: Option<SharedLogger>,
        settings: RunSettings,
    ) -> ExecutionContext {
        let options = self.work.options().resolve(overrides.as_ref());

        let mut seeded = self.seeded.lock();
        if let Some(timeout_ms) = settings.timeout_ms {
            seeded.timeout_ms = timeout_ms;
        }
        if let Some(ignore) = settings.ignore {
            seeded.ignore = ignore;
        }
        if let Some(logger) = logger.or(settings.logger) {
            seeded.logger = logger;
        }
        seeded.inputs = Arc::new(inputs.into_vec());
        seeded.options = Arc::new(options);

        let observed = if seeded.ignore {
            Arc::new(Vec::new())
        } else {
            seeded.inputs.clone()
        };
        debug!(
            execution_id = %self.id,
            ignore = seeded.ignore,
            options = ?seeded.options,
            "Execution seeded"
        );

        ExecutionContext {
            id: self.id,
            inputs: observed,
            options: seeded.options.clone(),
            logger: seeded.logger.clone(),
            timeout_ms: seeded.timeout_ms,
            shared: self.shared.clone(),
        }
    }

    fn arm_timeout(&self, timeout_ms: u64) {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.timer.arm(timeout_ms, move || {
            if let Some(shared) = shared.upgrade() {
                shared.on_timeout(timeout_ms);
            }
        });
    }

    fn fault(&self, ctx: &ExecutionContext, err: Error) -> Error {
        self.shared.lifecycle.fault();
        error!(execution_id = %self.id, error = %err.format_for_log(), "Execution faulted");
        self.shared.listeners.emit(&ExecutionEvent::Error(&err));
        self.work.error(ctx, &err);
        err
    }
}

impl<E: Executable> std::fmt::Debug for Execution<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.id)
            .field("name", &self.work.name())
            .field("status", &self.status())
            .field("timeout_ms", &self.timeout_ms())
            .finish()
    }
}
