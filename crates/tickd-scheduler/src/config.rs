//! Scheduler configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler tuning knobs, deserialized from the daemon's config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker pool capacity for executor groups without an override.
    pub default_pool_size: usize,

    /// Per-executor-group pool capacity overrides.
    pub executors: HashMap<String, usize>,

    /// How late a fire may start before it counts as a misfire.
    pub misfire_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_pool_size: 4,
            executors: HashMap::new(),
            misfire_grace_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    /// Pool capacity for an executor group, clamped to at least 1.
    pub fn pool_size(&self, executor: &str) -> usize {
        self.executors
            .get(executor)
            .copied()
            .unwrap_or(self.default_pool_size)
            .max(1)
    }

    /// Misfire grace as a wall-clock duration.
    pub fn misfire_grace(&self) -> Duration {
        Duration::from_millis(self.misfire_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_falls_back_to_default() {
        let mut config = SchedulerConfig::default();
        config.executors.insert("heavy".to_string(), 16);
        config.executors.insert("broken".to_string(), 0);

        assert_eq!(config.pool_size("heavy"), 16);
        assert_eq!(config.pool_size("default"), 4);
        assert_eq!(config.pool_size("broken"), 1);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SchedulerConfig = toml_like_from_json("{}");
        assert_eq!(config.default_pool_size, 4);
        assert_eq!(config.misfire_grace_ms, 5_000);

        let config: SchedulerConfig =
            toml_like_from_json(r#"{"default_pool_size": 8, "executors": {"io": 2}}"#);
        assert_eq!(config.pool_size("io"), 2);
        assert_eq!(config.pool_size("cpu"), 8);
    }

    fn toml_like_from_json(s: &str) -> SchedulerConfig {
        serde_json::from_str(s).unwrap()
    }
}
