//! Bounded worker pools, one per executor group.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::SchedulerConfig;

/// Lazily-created semaphore pools keyed by executor group. Capacity comes
/// from the scheduler config (per-group overrides, then the default).
pub struct ExecutorPools {
    config: SchedulerConfig,
    pools: DashMap<String, Arc<Semaphore>>,
}

impl ExecutorPools {
    /// Create the pool set.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            pools: DashMap::new(),
        }
    }

    /// Get (or create) the pool for an executor group.
    pub fn get(&self, executor: &str) -> Arc<Semaphore> {
        self.pools
            .entry(executor.to_string())
            .or_insert_with(|| {
                let capacity = self.config.pool_size(executor);
                debug!(executor, capacity, "executor pool created");
                Arc::new(Semaphore::new(capacity))
            })
            .clone()
    }

    /// Free slots in an executor group's pool.
    pub fn available(&self, executor: &str) -> usize {
        self.get(executor).available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pools_are_sized_from_config() {
        let mut config = SchedulerConfig::default();
        config.executors.insert("io".to_string(), 2);
        let pools = ExecutorPools::new(config);

        assert_eq!(pools.available("io"), 2);
        assert_eq!(pools.available("default"), 4);

        let _a = pools.get("io").acquire_owned().await.unwrap();
        let _b = pools.get("io").acquire_owned().await.unwrap();
        assert_eq!(pools.available("io"), 0);
        assert_eq!(pools.available("default"), 4);
    }

    #[tokio::test]
    async fn same_group_shares_one_pool() {
        let pools = ExecutorPools::new(SchedulerConfig::default());
        let first = pools.get("default");
        let second = pools.get("default");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
