//! Daemon configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use tickd_scheduler::SchedulerConfig;

/// Top-level daemon configuration, loaded from a TOML file. Every field has
/// a default, and a missing file yields the default configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path (jobs and execution logs share one file).
    pub db_path: PathBuf,

    /// Directory for rolling log files. Unset disables file logging.
    pub log_dir: Option<PathBuf>,

    /// Scheduler tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("tickd.db"),
            log_dir: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}
