//! Logger capability injected into executions
//!
//! Executions only ever need to record a message. The default sink
//! forwards to `tracing`; callers can inject anything else.

use std::fmt;
use std::sync::Arc;

use tracing::Level;

/// Sink for messages recorded by an execution
pub trait Logger: Send + Sync {
    /// Record a message
    fn log(&self, message: &str);

    /// Record a message at a level; sinks without levels just log it
    fn log_at(&self, level: Level, message: &str) {
        let _ = level;
        self.log(message);
    }
}

/// Shared logger handle
pub type SharedLogger = Arc<dyn Logger>;

/// Default logger: forwards messages as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    /// Shared handle to the default logger
    pub fn shared() -> SharedLogger {
        Arc::new(TracingLogger)
    }
}

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "execution_core", "{}", message);
    }

    fn log_at(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "execution_core", "{}", message),
            Level::WARN => tracing::warn!(target: "execution_core", "{}", message),
            Level::INFO => tracing::info!(target: "execution_core", "{}", message),
            Level::DEBUG => tracing::debug!(target: "execution_core", "{}", message),
            _ => tracing::trace!(target: "execution_core", "{}", message),
        }
    }
}

impl fmt::Debug for dyn Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Plain {
        lines: Mutex<Vec<String>>,
    }

    impl Logger for Plain {
        fn log(&self, message: &str) {
            self.lines.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_log_at_defaults_to_log() {
        let logger = Plain::default();
        logger.log_at(Level::ERROR, "boom");
        assert_eq!(*logger.lines.lock(), vec!["boom".to_string()]);
    }

    #[test]
    fn test_tracing_logger_accepts_all_levels() {
        let logger = TracingLogger::shared();
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            logger.log_at(level, "message");
        }
        logger.log("plain");
    }
}
