//! Core types for the tickd job scheduler.
//!
//! This crate defines the data model shared by the store, scheduler and API
//! layers:
//!
//! - **JobDefinition**: a persisted, recurring job and its policies
//! - **TriggerSpec**: cron or fixed-interval fire time computation
//! - **TargetRegistry**: string-encoded invocation targets resolved at fire time
//! - **JobExecutionLog**: the immutable record of one firing attempt

pub mod error;
pub mod job;
pub mod log;
pub mod target;
pub mod trigger;

pub use error::{ExecutionError, TargetError, TriggerSpecError};
pub use job::{ConcurrencyPolicy, JobDefinition, JobStatus, JobUpdate, MisfirePolicy};
pub use log::{JobExecutionLog, LogStatus};
pub use target::{Invocation, TargetHandler, TargetRegistry};
pub use trigger::TriggerSpec;
