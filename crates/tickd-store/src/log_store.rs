//! Execution log store: append-only history of firing attempts.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use tickd_core::{JobExecutionLog, LogStatus};

use crate::error::StoreError;
use crate::job_store::parse_utc;
use crate::page::{Page, PageRequest};
use crate::schema::init_schema;

/// Query filter for the log list surface.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Substring match on the denormalized job name.
    pub job_name_contains: Option<String>,
    /// Exact match on the denormalized job group.
    pub group: Option<String>,
    /// Exact match on the outcome.
    pub status: Option<LogStatus>,
    /// Only logs fired at or after this instant.
    pub fired_after: Option<DateTime<Utc>>,
    /// Only logs fired at or before this instant.
    pub fired_before: Option<DateTime<Utc>>,
}

impl LogFilter {
    fn matches(&self, log: &JobExecutionLog) -> bool {
        if let Some(name) = &self.job_name_contains {
            if !log.job_name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if log.job_group != *group {
                return false;
            }
        }
        if let Some(status) = self.status {
            if log.status != status {
                return false;
            }
        }
        if let Some(after) = self.fired_after {
            if log.fired_at < after {
                return false;
            }
        }
        if let Some(before) = self.fired_before {
            if log.fired_at > before {
                return false;
            }
        }
        true
    }
}

/// Execution log store trait. Records are append-only; the only mutations
/// are bulk delete and clear.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one log record.
    async fn record(&self, log: &JobExecutionLog) -> Result<(), StoreError>;

    /// List records matching a filter, newest first.
    async fn list(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> Result<Page<JobExecutionLog>, StoreError>;

    /// Delete records by id, returning how many existed.
    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError>;

    /// Delete every record, returning how many existed.
    async fn clear(&self) -> Result<u64, StoreError>;
}

/// In-memory log store for testing.
#[derive(Default)]
pub struct MemoryLogStore {
    logs: tokio::sync::RwLock<Vec<JobExecutionLog>>,
}

impl MemoryLogStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn record(&self, log: &JobExecutionLog) -> Result<(), StoreError> {
        self.logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> Result<Page<JobExecutionLog>, StoreError> {
        let logs = self.logs.read().await;
        let mut matching: Vec<_> = logs.iter().filter(|l| filter.matches(l)).cloned().collect();
        matching.sort_by(|a, b| b.fired_at.cmp(&a.fired_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(rows, total, page))
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut logs = self.logs.write().await;
        let before = logs.len();
        logs.retain(|l| !ids.contains(&l.id));
        Ok((before - logs.len()) as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut logs = self.logs.write().await;
        let count = logs.len() as u64;
        logs.clear();
        Ok(count)
    }
}

const LOG_COLUMNS: &str = "id, job_id, job_name, job_group, executor, invoke_target, \
     job_args, job_kwargs, trigger_descriptor, status, message, exception, duration_ms, \
     fired_at, finished_at";

/// SQLite-backed log store.
pub struct SqliteLogStore {
    conn: Connection,
}

impl SqliteLogStore {
    /// Open a file-backed store, creating the schema if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        // The job store may share this database file on its own connection.
        conn.call(|conn| {
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            init_schema(conn)
        })
        .await?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (tests and throwaway setups).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| init_schema(conn)).await?;
        Ok(Self { conn })
    }

    /// Reuse an already-open connection (shares the database file with the
    /// job store).
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn row_to_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobExecutionLog> {
    use rusqlite::types::Type;

    let decode = |idx: usize, e: uuid::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    };

    let id: String = row.get(0)?;
    let job_id: String = row.get(1)?;
    let status: String = row.get(9)?;
    let fired_at: String = row.get(13)?;
    let finished_at: String = row.get(14)?;

    Ok(JobExecutionLog {
        id: Uuid::parse_str(&id).map_err(|e| decode(0, e))?,
        job_id: Uuid::parse_str(&job_id).map_err(|e| decode(1, e))?,
        job_name: row.get(2)?,
        job_group: row.get(3)?,
        executor: row.get(4)?,
        invoke_target: row.get(5)?,
        args: row.get(6)?,
        kwargs: row.get(7)?,
        trigger_descriptor: row.get(8)?,
        status: LogStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                Type::Text,
                Box::new(std::io::Error::other(format!("unknown log status: '{status}'"))),
            )
        })?,
        message: row.get(10)?,
        exception: row.get(11)?,
        duration_ms: row.get(12)?,
        fired_at: parse_utc(13, &fired_at)?,
        finished_at: parse_utc(14, &finished_at)?,
    })
}

fn log_where_clause(filter: &LogFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(name) = &filter.job_name_contains {
        conditions.push("job_name LIKE ?");
        params.push(format!("%{name}%"));
    }
    if let Some(group) = &filter.group {
        conditions.push("job_group = ?");
        params.push(group.clone());
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(status.as_str().to_string());
    }
    if let Some(after) = filter.fired_after {
        conditions.push("fired_at >= ?");
        params.push(after.to_rfc3339());
    }
    if let Some(before) = filter.fired_before {
        conditions.push("fired_at <= ?");
        params.push(before.to_rfc3339());
    }
    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, params)
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn record(&self, log: &JobExecutionLog) -> Result<(), StoreError> {
        let log = log.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO job_logs (id, job_id, job_name, job_group, executor, \
                     invoke_target, job_args, job_kwargs, trigger_descriptor, status, message, \
                     exception, duration_ms, fired_at, finished_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        log.id.to_string(),
                        log.job_id.to_string(),
                        log.job_name,
                        log.job_group,
                        log.executor,
                        log.invoke_target,
                        log.args,
                        log.kwargs,
                        log.trigger_descriptor,
                        log.status.as_str(),
                        log.message,
                        log.exception,
                        log.duration_ms,
                        log.fired_at.to_rfc3339(),
                        log.finished_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> Result<Page<JobExecutionLog>, StoreError> {
        let (clause, params) = log_where_clause(filter);
        let (rows, total) = self
            .conn
            .call(move |conn| {
                let total: u64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM job_logs{clause}"),
                    rusqlite::params_from_iter(params.iter()),
                    |row| row.get(0),
                )?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS} FROM job_logs{clause} \
                     ORDER BY fired_at DESC, id DESC LIMIT {} OFFSET {}",
                    page.limit(),
                    page.offset()
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), row_to_log)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((rows, total))
            })
            .await?;
        Ok(Page::new(rows, total, page))
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let deleted = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let deleted = conn.execute(
                    &format!("DELETE FROM job_logs WHERE id IN ({placeholders})"),
                    rusqlite::params_from_iter(ids.iter()),
                )?;
                Ok(deleted as u64)
            })
            .await?;
        Ok(deleted)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let deleted = self
            .conn
            .call(|conn| {
                let deleted = conn.execute("DELETE FROM job_logs", [])?;
                Ok(deleted as u64)
            })
            .await?;
        Ok(deleted)
    }
}
