//! Invocation target registry.
//!
//! A job's work is identified by a string target of the form
//! `"module:function"`. Modules and functions are registered at process
//! startup; resolution happens lazily at fire time, so a job referencing a
//! target that is not yet registered persists fine and only fails (with a
//! FAILURE log entry) when it actually fires.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::error::{ExecutionError, TargetError};

/// Deserialized arguments handed to a target at fire time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    /// Positional arguments.
    pub args: Vec<String>,
    /// Keyword arguments.
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl Invocation {
    /// Deserialize the stored argument strings immediately before invocation.
    ///
    /// `args` is comma-separated (empty segments dropped); `kwargs` is a JSON
    /// object or empty.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if `kwargs` is not a JSON object.
    pub fn parse(args: &str, kwargs: &str) -> Result<Self, ExecutionError> {
        let args = args
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let kwargs = if kwargs.trim().is_empty() {
            serde_json::Map::new()
        } else {
            match serde_json::from_str::<serde_json::Value>(kwargs) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ExecutionError::new("kwargs must be a JSON object"));
                }
                Err(e) => {
                    return Err(ExecutionError::new(format!("invalid kwargs JSON: {e}")));
                }
            }
        };

        Ok(Self { args, kwargs })
    }
}

type AsyncTargetFn =
    dyn Fn(Invocation) -> BoxFuture<'static, Result<String, ExecutionError>> + Send + Sync;
type SyncTargetFn = dyn Fn(Invocation) -> Result<String, ExecutionError> + Send + Sync;

/// A callable registered under an invocation target.
///
/// Both flavors are invoked transparently by the dispatch layer: async
/// handlers are awaited, sync handlers run on a blocking worker so a
/// long-running synchronous job cannot stall the scheduler's timer loop.
#[derive(Clone)]
pub enum TargetHandler {
    /// Suspension-capable callable.
    Async(Arc<AsyncTargetFn>),
    /// Plain synchronous callable.
    Sync(Arc<SyncTargetFn>),
}

impl TargetHandler {
    /// Wrap an async closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ExecutionError>> + Send + 'static,
    {
        Self::Async(Arc::new(move |inv| Box::pin(f(inv))))
    }

    /// Wrap a sync closure.
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> Result<String, ExecutionError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Invoke the callable with deserialized arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the callable fails (or a sync callable
    /// panics on its blocking worker).
    pub async fn invoke(&self, invocation: Invocation) -> Result<String, ExecutionError> {
        match self {
            Self::Async(f) => f(invocation).await,
            Self::Sync(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(invocation))
                    .await
                    .map_err(|e| ExecutionError::new(format!("callable panicked: {e}")))?
            }
        }
    }
}

impl std::fmt::Debug for TargetHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Async(_) => f.write_str("TargetHandler::Async"),
            Self::Sync(_) => f.write_str("TargetHandler::Sync"),
        }
    }
}

/// Registry mapping invocation targets to callables.
///
/// Populated at process startup; shared read-mostly across the scheduler and
/// the API layer.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    modules: RwLock<HashMap<String, HashMap<String, TargetHandler>>>,
}

impl TargetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable under `"module:function"`.
    ///
    /// Re-registering a target replaces the previous callable.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::BadTarget`] for a malformed target string.
    pub fn register(
        &self,
        target: &str,
        handler: TargetHandler,
    ) -> Result<(), TargetError> {
        let (module, function) = split_target(target)?;
        let mut modules = self.modules.write();
        modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), handler);
        Ok(())
    }

    /// Resolve a target to its callable.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] if the target string is malformed, the module
    /// is not registered, or the function is absent.
    pub fn resolve(&self, target: &str) -> Result<TargetHandler, TargetError> {
        let (module, function) = split_target(target)?;
        let modules = self.modules.read();
        let functions = modules
            .get(module)
            .ok_or_else(|| TargetError::ModuleNotFound(module.to_string()))?;
        functions
            .get(function)
            .cloned()
            .ok_or_else(|| TargetError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            })
    }

    /// Whether a target is currently registered.
    pub fn contains(&self, target: &str) -> bool {
        self.resolve(target).is_ok()
    }
}

/// Split `"module:function"` into its location and symbol parts.
fn split_target(target: &str) -> Result<(&str, &str), TargetError> {
    match target.split_once(':') {
        Some((module, function)) if !module.is_empty() && !function.is_empty() => {
            Ok((module, function))
        }
        _ => Err(TargetError::BadTarget(target.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_registry() -> TargetRegistry {
        let registry = TargetRegistry::new();
        registry
            .register(
                "demo:echo",
                TargetHandler::from_sync(|inv| Ok(inv.args.join(" "))),
            )
            .unwrap();
        registry
            .register(
                "demo:async_echo",
                TargetHandler::from_async(|inv| async move { Ok(inv.args.join(" ")) }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn resolve_errors_are_precise() {
        let registry = echo_registry();

        assert!(registry.resolve("demo:echo").is_ok());
        assert!(matches!(
            registry.resolve("missing:echo"),
            Err(TargetError::ModuleNotFound(m)) if m == "missing"
        ));
        assert!(matches!(
            registry.resolve("demo:missing"),
            Err(TargetError::FunctionNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("no-colon"),
            Err(TargetError::BadTarget(_))
        ));
        assert!(matches!(
            registry.resolve(":fn"),
            Err(TargetError::BadTarget(_))
        ));
    }

    #[test]
    fn contains_matches_resolve() {
        let registry = echo_registry();
        assert!(registry.contains("demo:echo"));
        assert!(!registry.contains("demo:missing"));
    }

    #[tokio::test]
    async fn invoke_sync_and_async() {
        let registry = echo_registry();
        let inv = Invocation::parse("hello,world", "").unwrap();

        let sync = registry.resolve("demo:echo").unwrap();
        assert_eq!(sync.invoke(inv.clone()).await.unwrap(), "hello world");

        let async_h = registry.resolve("demo:async_echo").unwrap();
        assert_eq!(async_h.invoke(inv).await.unwrap(), "hello world");
    }

    #[test]
    fn invocation_parsing() {
        let inv = Invocation::parse("a, b,,c", r#"{"depth": 2}"#).unwrap();
        assert_eq!(inv.args, vec!["a", "b", "c"]);
        assert_eq!(inv.kwargs["depth"], 2);

        let empty = Invocation::parse("", "").unwrap();
        assert!(empty.args.is_empty());
        assert!(empty.kwargs.is_empty());

        assert!(Invocation::parse("", "[1,2]").is_err());
        assert!(Invocation::parse("", "{bad json").is_err());
    }
}
