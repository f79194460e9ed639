//! Common test utilities and fixtures
//!
//! Provides a capturing logger and the Concat execution type used across
//! the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use execution_core::{
    Completion, Executable, ExecutionContext, Logger, OptionDescriptor, OptionSchema, Options,
    Result,
};

/// Logger that keeps every message for later assertions
#[derive(Default)]
pub struct CapturingLogger {
    lines: Mutex<Vec<String>>,
}

impl CapturingLogger {
    pub fn shared() -> Arc<CapturingLogger> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Logger for CapturingLogger {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Joins the `contents` of every input record on the `separator` option
///
/// `delay_ms` postpones the resolution to exercise the timeout race.
#[derive(Debug, Clone, Default)]
pub struct Concat {
    pub delay_ms: u64,
}

impl Concat {
    pub fn delayed(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

#[async_trait]
impl Executable for Concat {
    fn name(&self) -> &str {
        "Concat"
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new().describe(
            "separator",
            OptionDescriptor::new()
                .default_value("\n")
                .kind("string")
                .label("separator string")
                .placeholder("concatenated input will be joined on this string"),
        )
    }

    async fn execute(&self, ctx: ExecutionContext, completion: Completion) -> Result<()> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        let separator = ctx.option_str("separator").unwrap_or("\n");
        let contents = ctx
            .inputs()
            .iter()
            .map(|record| match &record["contents"] {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator);
        completion.resolve(json!({ "contents": contents }));
        Ok(())
    }
}

/// The three-file input fixture
pub fn three_files() -> Value {
    json!([
        {"contents": "file1"},
        {"contents": "file2"},
        {"contents": "file3"}
    ])
}

/// Build an overrides map from a JSON object literal
pub fn overrides(value: Value) -> Options {
    value.as_object().cloned().unwrap_or_default()
}
