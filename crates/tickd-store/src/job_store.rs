//! Job registry store: durable CRUD for job definitions.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use tickd_core::{
    ConcurrencyPolicy, JobDefinition, JobStatus, JobUpdate, MisfirePolicy, TriggerSpec,
};

use crate::error::StoreError;
use crate::page::{Page, PageRequest};
use crate::schema::init_schema;

/// Query filter for the job list surface.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Substring match on the job name.
    pub name_contains: Option<String>,
    /// Exact match on the job group.
    pub group: Option<String>,
    /// Substring match on the invocation target.
    pub target_contains: Option<String>,
    /// Exact match on the scheduling status.
    pub status: Option<JobStatus>,
}

impl JobFilter {
    fn matches(&self, def: &JobDefinition) -> bool {
        if let Some(name) = &self.name_contains {
            if !def.name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if def.group != *group {
                return false;
            }
        }
        if let Some(target) = &self.target_contains {
            if !def.invoke_target.contains(target.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if def.status != status {
                return false;
            }
        }
        true
    }
}

/// Job registry store trait.
///
/// Mutating operations return only after the write is durable, so callers
/// can resynchronize live scheduler state immediately afterwards.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Get a job definition by id.
    async fn get(&self, id: Uuid) -> Result<Option<JobDefinition>, StoreError>;

    /// Find a definition describing the same work (natural-key equality on
    /// name/group/executor/target/args/kwargs/trigger). Used as the
    /// uniqueness probe before add/edit.
    async fn find_matching(&self, def: &JobDefinition)
        -> Result<Option<JobDefinition>, StoreError>;

    /// List definitions matching a filter, paged.
    async fn list(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobDefinition>, StoreError>;

    /// Load all definitions with status NORMAL, for scheduler startup.
    async fn load_enabled(&self) -> Result<Vec<JobDefinition>, StoreError>;

    /// Insert a new definition.
    async fn add(&self, def: &JobDefinition) -> Result<(), StoreError>;

    /// Apply a partial update and return the updated definition.
    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<JobDefinition, StoreError>;

    /// Delete a definition. Deleting an absent id is a no-op.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Persist the job's next computed fire time so a restart can detect
    /// misfires. Best-effort: absent rows are ignored.
    async fn save_next_fire_time(
        &self,
        id: Uuid,
        next: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
}

/// In-memory job store for testing.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: tokio::sync::RwLock<HashMap<Uuid, JobDefinition>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<JobDefinition>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_matching(
        &self,
        def: &JobDefinition,
    ) -> Result<Option<JobDefinition>, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .find(|existing| existing.same_work_as(def))
            .cloned())
    }

    async fn list(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobDefinition>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<_> = jobs.values().filter(|d| filter.matches(d)).cloned().collect();
        matching.sort_by(|a, b| a.create_time.cmp(&b.create_time).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(rows, total, page))
    }

    async fn load_enabled(&self) -> Result<Vec<JobDefinition>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut enabled: Vec<_> = jobs
            .values()
            .filter(|d| d.status == JobStatus::Normal)
            .cloned()
            .collect();
        enabled.sort_by_key(|d| d.create_time);
        Ok(enabled)
    }

    async fn add(&self, def: &JobDefinition) -> Result<(), StoreError> {
        self.jobs.write().await.insert(def.id, def.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<JobDefinition, StoreError> {
        let mut jobs = self.jobs.write().await;
        let def = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        update.apply(def);
        Ok(def.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn save_next_fire_time(
        &self,
        id: Uuid,
        next: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        if let Some(def) = self.jobs.write().await.get_mut(&id) {
            def.next_fire_time = next;
        }
        Ok(())
    }
}

const JOB_COLUMNS: &str = "id, job_name, job_group, executor, invoke_target, job_args, \
     job_kwargs, trigger_spec, misfire_policy, concurrency, status, next_fire_time, \
     create_by, create_time, update_by, update_time, remark";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Connection,
}

impl SqliteJobStore {
    /// Open a file-backed store, creating the schema if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        // The log store may share this database file on its own connection.
        conn.call(|conn| {
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            init_schema(conn)
        })
        .await?;
        debug!(path = %path.as_ref().display(), "job store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory store (tests and throwaway setups).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| init_schema(conn)).await?;
        Ok(Self { conn })
    }

    /// Reuse an already-open connection (shares the database file with the
    /// log store).
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn decode_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn bad_enum(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    decode_err(
        idx,
        std::io::Error::other(format!("unknown {what}: '{value}'")),
    )
}

pub(crate) fn parse_utc(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err(idx, e))
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobDefinition> {
    let id: String = row.get(0)?;
    let trigger_json: String = row.get(7)?;
    let misfire: String = row.get(8)?;
    let concurrency: String = row.get(9)?;
    let status: String = row.get(10)?;
    let next_fire: Option<String> = row.get(11)?;
    let create_time: String = row.get(13)?;
    let update_time: String = row.get(15)?;

    let trigger: TriggerSpec =
        serde_json::from_str(&trigger_json).map_err(|e| decode_err(7, e))?;

    Ok(JobDefinition {
        id: Uuid::parse_str(&id).map_err(|e| decode_err(0, e))?,
        name: row.get(1)?,
        group: row.get(2)?,
        executor: row.get(3)?,
        invoke_target: row.get(4)?,
        args: row.get(5)?,
        kwargs: row.get(6)?,
        trigger,
        misfire_policy: MisfirePolicy::parse(&misfire)
            .ok_or_else(|| bad_enum(8, "misfire policy", &misfire))?,
        concurrency: ConcurrencyPolicy::parse(&concurrency)
            .ok_or_else(|| bad_enum(9, "concurrency policy", &concurrency))?,
        status: JobStatus::parse(&status).ok_or_else(|| bad_enum(10, "job status", &status))?,
        next_fire_time: next_fire.as_deref().map(|s| parse_utc(11, s)).transpose()?,
        create_by: row.get(12)?,
        create_time: parse_utc(13, &create_time)?,
        update_by: row.get(14)?,
        update_time: parse_utc(15, &update_time)?,
        remark: row.get(16)?,
    })
}

fn insert_job(conn: &rusqlite::Connection, def: &JobDefinition) -> rusqlite::Result<()> {
    let trigger_json = serde_json::to_string(&def.trigger)
        .map_err(|e| decode_err(7, e))?;
    conn.execute(
        "INSERT INTO jobs (id, job_name, job_group, executor, invoke_target, job_args, \
         job_kwargs, trigger_spec, misfire_policy, concurrency, status, next_fire_time, \
         create_by, create_time, update_by, update_time, remark) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            def.id.to_string(),
            def.name,
            def.group,
            def.executor,
            def.invoke_target,
            def.args,
            def.kwargs,
            trigger_json,
            def.misfire_policy.as_str(),
            def.concurrency.as_str(),
            def.status.as_str(),
            def.next_fire_time.map(|t| t.to_rfc3339()),
            def.create_by,
            def.create_time.to_rfc3339(),
            def.update_by,
            def.update_time.to_rfc3339(),
            def.remark,
        ],
    )?;
    Ok(())
}

fn job_where_clause(filter: &JobFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(name) = &filter.name_contains {
        conditions.push("job_name LIKE ?");
        params.push(format!("%{name}%"));
    }
    if let Some(group) = &filter.group {
        conditions.push("job_group = ?");
        params.push(group.clone());
    }
    if let Some(target) = &filter.target_contains {
        conditions.push("invoke_target LIKE ?");
        params.push(format!("%{target}%"));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(status.as_str().to_string());
    }
    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, params)
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<JobDefinition>, StoreError> {
        let def = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
                match stmt.query_row([id.to_string()], row_to_job) {
                    Ok(def) => Ok(Some(def)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(def)
    }

    async fn find_matching(
        &self,
        def: &JobDefinition,
    ) -> Result<Option<JobDefinition>, StoreError> {
        let probe = def.clone();
        let trigger_json = serde_json::to_string(&probe.trigger)
            .map_err(|e| StoreError::CorruptRow(e.to_string()))?;
        let found = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE job_name = ?1 AND job_group = ?2 \
                     AND executor = ?3 AND invoke_target = ?4 AND job_args = ?5 \
                     AND job_kwargs = ?6 AND trigger_spec = ?7"
                ))?;
                match stmt.query_row(
                    params![
                        probe.name,
                        probe.group,
                        probe.executor,
                        probe.invoke_target,
                        probe.args,
                        probe.kwargs,
                        trigger_json,
                    ],
                    row_to_job,
                ) {
                    Ok(def) => Ok(Some(def)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(found)
    }

    async fn list(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobDefinition>, StoreError> {
        let (clause, params) = job_where_clause(filter);
        let (rows, total) = self
            .conn
            .call(move |conn| {
                let total: u64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM jobs{clause}"),
                    rusqlite::params_from_iter(params.iter()),
                    |row| row.get(0),
                )?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs{clause} \
                     ORDER BY create_time, id LIMIT {} OFFSET {}",
                    page.limit(),
                    page.offset()
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((rows, total))
            })
            .await?;
        Ok(Page::new(rows, total, page))
    }

    async fn load_enabled(&self) -> Result<Vec<JobDefinition>, StoreError> {
        let jobs = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'normal' ORDER BY create_time"
                ))?;
                let rows = stmt
                    .query_map([], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(jobs)
    }

    async fn add(&self, def: &JobDefinition) -> Result<(), StoreError> {
        let def = def.clone();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                insert_job(&tx, &def)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<JobDefinition, StoreError> {
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut def = {
                    let mut stmt =
                        tx.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
                    match stmt.query_row([id.to_string()], row_to_job) {
                        Ok(def) => def,
                        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    }
                };
                update.apply(&mut def);
                tx.execute("DELETE FROM jobs WHERE id = ?1", [id.to_string()])?;
                insert_job(&tx, &def)?;
                tx.commit()?;
                Ok(Some(def))
            })
            .await?;
        updated.ok_or(StoreError::JobNotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM jobs WHERE id = ?1", [id.to_string()])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn save_next_fire_time(
        &self,
        id: Uuid,
        next: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE jobs SET next_fire_time = ?1 WHERE id = ?2",
                    params![next.map(|t| t.to_rfc3339()), id.to_string()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
