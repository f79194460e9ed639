//! Declarative execution types
//!
//! [`Extension`] declares an execution type from a [`Definition`]: an
//! optional `execute` body, an option schema, and an optional error hook.
//! Extending an extension layers the child's declarations over the
//! parent's, so a chain of specialisations inherits every ancestor's
//! options and falls back to the nearest ancestor's work and error hook.
//! [`ExtensionRegistry`] keeps declared types by name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::executable::{log_error, Completion, Executable, ExecutionContext};
use crate::execution::Execution;
use crate::options::OptionSchema;

/// Name of the root type every extension chain starts from
pub const BASE_TYPE_NAME: &str = "Execution";

/// Boxed `execute` body
pub type ExecuteFn =
    Arc<dyn Fn(ExecutionContext, Completion) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Boxed error hook
pub type ErrorFn = Arc<dyn Fn(&ExecutionContext, &Error) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────
// Definition
// ─────────────────────────────────────────────────────────────────

/// What one level of an extension chain declares
#[derive(Clone, Default)]
pub struct Definition {
    name: Option<String>,
    options: OptionSchema,
    execute: Option<ExecuteFn>,
    error: Option<ErrorFn>,
}

impl Definition {
    /// Start a definition for a named type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Declare options
    pub fn options(mut self, options: OptionSchema) -> Self {
        self.options = options;
        self
    }

    /// Supply asynchronous work
    pub fn execute<F, Fut>(mut self, execute: F) -> Self
    where
        F: Fn(ExecutionContext, Completion) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let execute: ExecuteFn = Arc::new(move |ctx: ExecutionContext, completion: Completion| {
            execute(ctx, completion).boxed()
        });
        self.execute = Some(execute);
        self
    }

    /// Supply work that starts synchronously
    pub fn execute_sync<F>(mut self, execute: F) -> Self
    where
        F: Fn(&ExecutionContext, Completion) -> Result<()> + Send + Sync + 'static,
    {
        let execute: ExecuteFn = Arc::new(move |ctx: ExecutionContext, completion: Completion| {
            let result = execute(&ctx, completion);
            async move { result }.boxed()
        });
        self.execute = Some(execute);
        self
    }

    /// Replace the fault report
    pub fn on_error<F>(mut self, error: F) -> Self
    where
        F: Fn(&ExecutionContext, &Error) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(error));
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Extension
// ─────────────────────────────────────────────────────────────────

/// An execution type declared from definitions
#[derive(Clone)]
pub struct Extension {
    name: String,
    lineage: Vec<String>,
    options: OptionSchema,
    execute: Option<ExecuteFn>,
    error: Option<ErrorFn>,
}

impl Extension {
    /// The root type: no options, no work
    pub fn base() -> Self {
        Self {
            name: BASE_TYPE_NAME.to_string(),
            lineage: vec![BASE_TYPE_NAME.to_string()],
            options: OptionSchema::new(),
            execute: None,
            error: None,
        }
    }

    /// Declare a type directly on top of the root type
    pub fn define(definition: Definition) -> Self {
        Self::base().extend(definition)
    }

    /// Declare a specialisation of this type
    pub fn extend(&self, definition: Definition) -> Extension {
        let name = definition
            .name
            .unwrap_or_else(|| format!("{}::extended", self.name));
        let mut lineage = self.lineage.clone();
        lineage.push(name.clone());

        debug!(name = %name, parent = %self.name, "Extension declared");

        Extension {
            name,
            lineage,
            options: self.options.extended_with(&definition.options),
            execute: definition.execute.or_else(|| self.execute.clone()),
            error: definition.error.or_else(|| self.error.clone()),
        }
    }

    /// Type names from the root to this type
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Whether this type or an ancestor supplies work
    pub fn has_execute(&self) -> bool {
        self.execute.is_some()
    }

    /// Create a PENDING execution of this type
    pub fn instantiate(&self) -> Execution<Extension> {
        Execution::new(self.clone())
    }

    /// Create a PENDING execution of this type from a configuration
    pub fn instantiate_with(&self, config: ExecutionConfig) -> Execution<Extension> {
        Execution::with_config(self.clone(), config)
    }
}

#[async_trait]
impl Executable for Extension {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> OptionSchema {
        self.options.clone()
    }

    async fn execute(&self, ctx: ExecutionContext, completion: Completion) -> Result<()> {
        match &self.execute {
            Some(execute) => execute(ctx, completion).await,
            None => Err(Error::must_override_execute(&self.name)),
        }
    }

    fn error(&self, ctx: &ExecutionContext, err: &Error) {
        match &self.error {
            Some(error) => error(ctx, err),
            None => log_error(ctx, err),
        }
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("options", &self.options)
            .field("has_execute", &self.execute.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Extension Registry
// ─────────────────────────────────────────────────────────────────

/// Declared execution types by name
#[derive(Default)]
pub struct ExtensionRegistry {
    types: RwLock<HashMap<String, Arc<Extension>>>,
}

impl ExtensionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declared type under its name
    pub fn register(&self, extension: Extension) -> Result<Arc<Extension>> {
        let mut types = self.types.write();
        let name = extension.name().to_string();
        if types.contains_key(&name) {
            return Err(Error::TypeConflict(name));
        }
        let extension = Arc::new(extension);
        types.insert(name.clone(), extension.clone());
        info!(name = %name, "Execution type registered");
        Ok(extension)
    }

    /// Declare and register a type on top of the root type
    pub fn define(&self, definition: Definition) -> Result<Arc<Extension>> {
        self.register(Extension::define(definition))
    }

    /// Declare and register a specialisation of a registered type
    pub fn extend(&self, parent: &str, definition: Definition) -> Result<Arc<Extension>> {
        let parent = self.get(parent).ok_or_else(|| Error::TypeNotFound(parent.to_string()))?;
        self.register(parent.extend(definition))
    }

    /// Look up a type
    pub fn get(&self, name: &str) -> Option<Arc<Extension>> {
        self.types.read().get(name).cloned()
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a PENDING execution of a registered type
    pub fn instantiate(
        &self,
        name: &str,
        config: ExecutionConfig,
    ) -> Result<Execution<Arc<Extension>>> {
        let extension = self.get(name).ok_or_else(|| Error::TypeNotFound(name.to_string()))?;
        Ok(Execution::with_config(extension, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use serde_json::json;

    fn greeter() -> Extension {
        Extension::define(
            Definition::new("Greeter")
                .options(OptionSchema::new().value("greeting", "hello"))
                .execute_sync(|ctx, completion| {
                    let greeting = ctx.option_str("greeting").unwrap_or_default().to_string();
                    completion.resolve(json!(greeting));
                    Ok(())
                }),
        )
    }

    #[test]
    fn test_lineage() {
        let loud = greeter().extend(Definition::new("LoudGreeter"));
        assert_eq!(loud.lineage(), &["Execution", "Greeter", "LoudGreeter"]);
        assert_eq!(loud.name(), "LoudGreeter");
        assert!(loud.has_execute());
        assert!(!Extension::base().has_execute());
    }

    #[test]
    fn test_unnamed_extension_derives_name() {
        let child = greeter().extend(Definition::default());
        assert_eq!(child.name(), "Greeter::extended");
    }

    #[tokio::test]
    async fn test_child_inherits_execute_and_layers_options() {
        let child = greeter().extend(
            Definition::new("Polite").options(OptionSchema::new().value("greeting", "good day")),
        );
        let execution = child.instantiate();
        let value = execution.run(serde_json::Value::Null, None).await.unwrap();
        assert_eq!(value, json!("good day"));
        assert_eq!(execution.status(), Status::Resolved);
    }

    #[tokio::test]
    async fn test_base_requires_execute() {
        let execution = Extension::base().instantiate();
        let err = execution.run(serde_json::Value::Null, None).await.unwrap_err();
        assert!(matches!(err, Error::MustOverrideExecute { ref type_name } if type_name == "Execution"));
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let registry = ExtensionRegistry::new();
        registry.register(greeter()).unwrap();
        registry
            .extend("Greeter", Definition::new("Shouter"))
            .unwrap();

        assert_eq!(registry.names(), vec!["Greeter".to_string(), "Shouter".to_string()]);
        assert!(registry.get("Shouter").unwrap().has_execute());
        assert!(matches!(registry.register(greeter()), Err(Error::TypeConflict(_))));
        assert!(matches!(
            registry.extend("Missing", Definition::new("Orphan")),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_instantiate() {
        let registry = ExtensionRegistry::new();
        registry.register(greeter()).unwrap();

        let execution = registry
            .instantiate("Greeter", ExecutionConfig::default().timeout_ms(1_000))
            .unwrap();
        assert_eq!(execution.timeout_ms(), 1_000);
        assert_eq!(execution.run(serde_json::Value::Null, None).await.unwrap(), json!("hello"));
        assert!(registry.instantiate("Nope", ExecutionConfig::default()).is_err());
    }
}
