//! Durable persistence for tickd.
//!
//! Two tables back the scheduler: `jobs` (one row per job id, the source of
//! truth for what should run and when) and `job_logs` (append-only, one row
//! per firing attempt). They are joined only by the denormalized job fields
//! copied into each log row.
//!
//! Every store ships in two flavors, following the usual pattern here:
//! a SQLite implementation for production and an in-memory implementation
//! for tests.

pub mod error;
pub mod job_store;
pub mod log_store;
pub mod page;
pub mod schema;

pub use error::StoreError;
pub use job_store::{JobFilter, JobStore, MemoryJobStore, SqliteJobStore};
pub use log_store::{LogFilter, LogStore, MemoryLogStore, SqliteLogStore};
pub use page::{Page, PageRequest};
