//! In-memory trigger scheduler for tickd.
//!
//! The scheduler owns the live trigger table and the dispatch loops; the
//! durable job registry lives in `tickd-store`. A restart rebuilds the
//! table from the store (`Scheduler::load_from_store`), applying each job's
//! misfire policy to occurrences that came due while the process was down.

pub mod config;
pub mod error;
pub mod guard;
pub mod log_writer;
pub mod pool;
pub mod reconcile;
pub mod scheduler;

mod dispatch;

pub use config::SchedulerConfig;
pub use error::ScheduleError;
pub use guard::{Admission, ExecutionGuard, RunPermit};
pub use log_writer::LogWriter;
pub use pool::ExecutorPools;
pub use reconcile::{collect_missed, reconcile};
pub use scheduler::Scheduler;
