//! Execution Core - single-use, cancellable asynchronous executions
//!
//! An [`Execution`] wraps one piece of work implementing [`Executable`]
//! and gives it a uniform lifecycle:
//! - status tracking (PENDING -> RUNNING -> RESOLVED / REJECTED -> FAULTED)
//! - option resolution from a declared [`OptionSchema`] plus caller overrides
//! - an optional timeout racing the work's completion
//! - `execute` / `timeout` / `error` notifications and an overridable
//!   error report
//!
//! Execution types can be written as Rust types implementing
//! [`Executable`], or declared from closures through [`Extension`].

pub mod config;
pub mod error;
pub mod events;
pub mod executable;
pub mod execution;
pub mod extension;
pub mod logger;
pub mod logging;
pub mod options;
pub mod status;
pub mod timeout;

pub use config::{ExecutionConfig, LoggingSettings, RunSettings, Settings};
pub use error::{Error, ErrorCode, Result, TIMEOUT_MESSAGE};
pub use events::{EventKind, ExecutionEvent, Listener, ListenerId};
pub use executable::{Completion, Executable, ExecutionContext};
pub use execution::{Execution, Inputs};
pub use extension::{Definition, Extension, ExtensionRegistry};
pub use logger::{Logger, SharedLogger, TracingLogger};
pub use options::{OptionDescriptor, OptionSchema, OptionSpec, Options};
pub use status::Status;
pub use timeout::TimeoutRace;
