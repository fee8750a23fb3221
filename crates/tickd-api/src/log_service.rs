//! Execution log service.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use tickd_core::JobExecutionLog;
use tickd_store::{LogFilter, LogStore, Page, PageRequest};

use crate::error::ServiceError;

/// Read/delete surface over the execution log history.
pub struct LogService {
    store: Arc<dyn LogStore>,
}

impl LogService {
    /// Create the service over a log store.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// List execution logs matching a filter, newest first.
    pub async fn list_logs(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> Result<Page<JobExecutionLog>, ServiceError> {
        Ok(self.store.list(filter, page).await?)
    }

    /// Delete logs by id, returning how many existed.
    pub async fn delete_logs(&self, ids: &[Uuid]) -> Result<u64, ServiceError> {
        let deleted = self.store.delete(ids).await?;
        info!(deleted, "execution logs deleted");
        Ok(deleted)
    }

    /// Delete the entire log history, returning how many rows existed.
    pub async fn clear_logs(&self) -> Result<u64, ServiceError> {
        let cleared = self.store.clear().await?;
        info!(cleared, "execution log history cleared");
        Ok(cleared)
    }
}
