//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Job definitions: one row per job id, the durable source of truth
CREATE TABLE IF NOT EXISTS jobs (
    id              TEXT PRIMARY KEY,
    job_name        TEXT NOT NULL,
    job_group       TEXT NOT NULL DEFAULT 'default',
    executor        TEXT NOT NULL DEFAULT 'default',
    invoke_target   TEXT NOT NULL,
    job_args        TEXT NOT NULL DEFAULT '',
    job_kwargs      TEXT NOT NULL DEFAULT '',
    trigger_spec    TEXT NOT NULL,
    misfire_policy  TEXT NOT NULL,
    concurrency     TEXT NOT NULL,
    status          TEXT NOT NULL,
    next_fire_time  TEXT,
    create_by       TEXT NOT NULL DEFAULT '',
    create_time     TEXT NOT NULL,
    update_by       TEXT NOT NULL DEFAULT '',
    update_time     TEXT NOT NULL,
    remark          TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_jobs_name_group ON jobs(job_name, job_group);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

-- Execution logs: append-only, one row per firing attempt.
-- Job fields are denormalized copies taken at fire time.
CREATE TABLE IF NOT EXISTS job_logs (
    id                  TEXT PRIMARY KEY,
    job_id              TEXT NOT NULL,
    job_name            TEXT NOT NULL,
    job_group           TEXT NOT NULL,
    executor            TEXT NOT NULL,
    invoke_target       TEXT NOT NULL,
    job_args            TEXT NOT NULL DEFAULT '',
    job_kwargs          TEXT NOT NULL DEFAULT '',
    trigger_descriptor  TEXT NOT NULL DEFAULT '',
    status              TEXT NOT NULL,
    message             TEXT NOT NULL DEFAULT '',
    exception           TEXT,
    duration_ms         INTEGER NOT NULL DEFAULT 0,
    fired_at            TEXT NOT NULL,
    finished_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_logs_name ON job_logs(job_name);
CREATE INDEX IF NOT EXISTS idx_job_logs_status ON job_logs(status);
CREATE INDEX IF NOT EXISTS idx_job_logs_fired_at ON job_logs(fired_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_both_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in ["jobs", "job_logs"] {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
                .unwrap();
            assert!(stmt.exists([table]).unwrap(), "missing table {table}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
