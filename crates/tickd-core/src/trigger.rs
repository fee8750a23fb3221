//! Trigger specifications: cron expressions and fixed intervals.
//!
//! A trigger spec is a rule producing a sequence of future fire timestamps.
//! Fire time computation is deterministic: given the same `after` instant,
//! `next_fire_time` always returns the same result, and the result is
//! strictly greater than `after`.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::error::TriggerSpecError;

/// A trigger specification for a recurring job.
///
/// Cron expressions use the 6/7-field format with a leading seconds field
/// (`sec min hour day-of-month month day-of-week [year]`), e.g.
/// `"0 */5 * * * *"` for every 5 minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Cron-based trigger.
    Cron {
        /// The cron expression.
        expression: String,
    },
    /// Fixed-interval trigger.
    Interval {
        /// Interval between fires, in milliseconds.
        every_ms: u64,
    },
}

impl TriggerSpec {
    /// Create a cron trigger spec.
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::Cron {
            expression: expression.into(),
        }
    }

    /// Create a fixed-interval trigger spec from seconds.
    pub fn interval_secs(secs: u64) -> Self {
        Self::Interval {
            every_ms: secs * 1000,
        }
    }

    /// Create a fixed-interval trigger spec from milliseconds.
    pub fn interval_ms(every_ms: u64) -> Self {
        Self::Interval { every_ms }
    }

    /// Validate the spec without registering it.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerSpecError`] for a malformed cron expression or a
    /// zero-length interval.
    pub fn validate(&self) -> Result<(), TriggerSpecError> {
        match self {
            Self::Cron { expression } => {
                Schedule::from_str(expression).map_err(|e| TriggerSpecError::InvalidCron {
                    expression: expression.clone(),
                    reason: e.to_string(),
                })?;
                Ok(())
            }
            Self::Interval { every_ms } => {
                if *every_ms == 0 {
                    return Err(TriggerSpecError::ZeroInterval);
                }
                Ok(())
            }
        }
    }

    /// Compute the next fire time strictly after `after`.
    ///
    /// Returns `None` for a cron schedule with no remaining occurrences
    /// (e.g. a spec pinned to a past year).
    ///
    /// # Errors
    ///
    /// Returns [`TriggerSpecError`] if the spec itself is malformed.
    pub fn next_fire_time(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, TriggerSpecError> {
        match self {
            Self::Cron { expression } => {
                let schedule =
                    Schedule::from_str(expression).map_err(|e| TriggerSpecError::InvalidCron {
                        expression: expression.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(schedule.after(&after).next())
            }
            Self::Interval { every_ms } => {
                if *every_ms == 0 {
                    return Err(TriggerSpecError::ZeroInterval);
                }
                Ok(Some(after + Duration::milliseconds(*every_ms as i64)))
            }
        }
    }

    /// Human-readable trigger descriptor, recorded in execution logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Cron { expression } => format!("cron[{expression}]"),
            Self::Interval { every_ms } => format!("interval[{every_ms}ms]"),
        }
    }
}
