//! Execution log writer.

use std::sync::Arc;

use tracing::{error, warn};

use tickd_core::JobExecutionLog;
use tickd_store::LogStore;

/// Writes execution log records without ever failing the run that produced
/// them: a store failure is retried once, then the record is dropped with a
/// diagnostic.
pub struct LogWriter {
    store: Arc<dyn LogStore>,
}

impl LogWriter {
    /// Create a writer over a log store.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Append one record, best-effort.
    pub async fn write(&self, log: &JobExecutionLog) {
        if let Err(first) = self.store.record(log).await {
            warn!(
                job = %log.job_name,
                error = %first,
                "log write failed, retrying once"
            );
            if let Err(second) = self.store.record(log).await {
                error!(
                    job = %log.job_name,
                    log_id = %log.id,
                    error = %second,
                    "dropping execution log record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tickd_core::{JobDefinition, TriggerSpec};
    use tickd_store::{LogFilter, MemoryLogStore, PageRequest};

    #[tokio::test]
    async fn write_records_through_store() {
        let store = Arc::new(MemoryLogStore::new());
        let writer = LogWriter::new(store.clone());

        let def =
            JobDefinition::new("writer", "default", "demo:echo", TriggerSpec::interval_secs(5));
        let now = Utc::now();
        writer
            .write(&JobExecutionLog::success(&def, "manual", "ok", now, now))
            .await;

        let page = store
            .list(&LogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
