//! Builtin invocation targets.
//!
//! These are the sample callables registered under the `system` module at
//! startup, so a fresh install has something to schedule and a manual run
//! to try out.

use chrono::Utc;
use tracing::info;

use tickd_core::{ExecutionError, TargetError, TargetHandler, TargetRegistry};

/// Register the builtin `system:*` targets.
pub fn register_builtin(registry: &TargetRegistry) -> Result<(), TargetError> {
    registry.register(
        "system:heartbeat",
        TargetHandler::from_async(|_inv| async {
            let now = Utc::now().to_rfc3339();
            info!(at = %now, "heartbeat");
            Ok(format!("heartbeat at {now}"))
        }),
    )?;

    registry.register(
        "system:echo",
        TargetHandler::from_sync(|inv| {
            if inv.args.is_empty() && inv.kwargs.is_empty() {
                Ok("echo".to_string())
            } else {
                Ok(format!(
                    "echo: args={} kwargs={}",
                    inv.args.join(","),
                    serde_json::Value::Object(inv.kwargs)
                ))
            }
        }),
    )?;

    registry.register(
        "system:sleep",
        TargetHandler::from_async(|inv| async move {
            let seconds = match inv.kwargs.get("seconds") {
                Some(v) => v
                    .as_u64()
                    .ok_or_else(|| ExecutionError::new("'seconds' must be a non-negative integer"))?,
                None => 1,
            };
            tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
            Ok(format!("slept {seconds}s"))
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickd_core::Invocation;

    #[tokio::test]
    async fn builtin_targets_resolve_and_run() {
        let registry = TargetRegistry::new();
        register_builtin(&registry).unwrap();

        for target in ["system:heartbeat", "system:echo", "system:sleep"] {
            assert!(registry.contains(target), "missing {target}");
        }

        let echo = registry.resolve("system:echo").unwrap();
        let out = echo
            .invoke(Invocation::parse("a,b", r#"{"n":1}"#).unwrap())
            .await
            .unwrap();
        assert!(out.contains("a,b"));
        assert!(out.contains("\"n\":1"));
    }

    #[tokio::test]
    async fn sleep_rejects_bad_seconds() {
        let registry = TargetRegistry::new();
        register_builtin(&registry).unwrap();

        let sleep = registry.resolve("system:sleep").unwrap();
        let err = sleep
            .invoke(Invocation::parse("", r#"{"seconds":"lots"}"#).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("seconds"));
    }
}
