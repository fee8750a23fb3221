//! Service surface for the job registry and execution logs.
//!
//! This is the layer a web frontend would consume. It owns validation
//! (trigger specs, invocation-target hygiene, duplicate probes) and the
//! store-then-scheduler resynchronization that keeps the durable registry
//! and the live trigger table in agreement.

pub mod error;
pub mod job_service;
pub mod log_service;

pub use error::ServiceError;
pub use job_service::JobService;
pub use log_service::LogService;
