//! tickd - persistent, dynamically-invoked job scheduler daemon.
//!
//! Main entry point: CLI parsing, tracing setup, store/scheduler wiring and
//! graceful shutdown.

mod config;
mod targets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tickd_api::{JobService, ServiceError};
use tickd_core::{JobDefinition, JobStatus, TargetRegistry, TriggerSpec};
use tickd_scheduler::Scheduler;
use tickd_store::{JobFilter, JobStore, LogStore, PageRequest, SqliteJobStore, SqliteLogStore};

use crate::config::Config;

/// tickd CLI.
#[derive(Parser)]
#[command(name = "tickd")]
#[command(about = "Persistent, dynamically-invoked job scheduler")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/tickd.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon in the foreground (default)
    Run {
        /// Override the SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Override the rolling log file directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

/// Initialize tracing with console output and, when a log directory is
/// configured, a daily-rolling file appender.
fn init_tracing(log_dir: Option<&PathBuf>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("tickd")
                .filename_suffix("log")
                .max_log_files(30)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            // Keep the writer guard alive for the program duration.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (db_override, log_dir_override) = match cli.command {
        None => (None, None),
        Some(Commands::Run { db, log_dir }) => (db, log_dir),
    };

    let mut config = Config::load(&cli.config)?;
    if let Some(db) = db_override {
        config.db_path = db;
    }
    if let Some(dir) = log_dir_override {
        config.log_dir = Some(dir);
    }

    init_tracing(config.log_dir.as_ref())?;
    run(config).await
}

/// Run the daemon in the foreground until ctrl-c.
async fn run(config: Config) -> anyhow::Result<()> {
    info!("starting tickd v{}", env!("CARGO_PKG_VERSION"));

    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let job_store = Arc::new(
        SqliteJobStore::open(&config.db_path)
            .await
            .context("opening job store")?,
    );
    let log_store = Arc::new(
        SqliteLogStore::open(&config.db_path)
            .await
            .context("opening log store")?,
    );

    let registry = Arc::new(TargetRegistry::new());
    targets::register_builtin(&registry).context("registering builtin targets")?;

    let scheduler = Scheduler::new(
        config.scheduler.clone(),
        job_store.clone() as Arc<dyn JobStore>,
        log_store.clone() as Arc<dyn LogStore>,
        registry.clone(),
    );

    let loaded = scheduler.load_from_store().await.context("loading jobs")?;

    let jobs = JobService::new(
        job_store.clone() as Arc<dyn JobStore>,
        scheduler.clone(),
        registry.clone(),
    );
    seed_default_jobs(&jobs, job_store.as_ref()).await?;
    info!(
        loaded,
        db = %config.db_path.display(),
        "tickd running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    scheduler.shutdown().await;
    Ok(())
}

/// On a fresh database, seed the sample jobs so a new install has
/// something visible to schedule and run.
async fn seed_default_jobs(jobs: &JobService, store: &dyn JobStore) -> anyhow::Result<()> {
    let existing = store
        .list(&JobFilter::default(), PageRequest::new(1, 1))
        .await?;
    if existing.total > 0 {
        return Ok(());
    }

    let samples = vec![
        JobDefinition::new(
            "heartbeat",
            "system",
            "system:heartbeat",
            TriggerSpec::interval_secs(60),
        )
        .with_remark("builtin sample: logs a heartbeat every minute"),
        JobDefinition::new(
            "nightly-echo",
            "system",
            "system:echo",
            TriggerSpec::cron("0 0 3 * * *"),
        )
        .with_args("good,night")
        .with_status(JobStatus::Paused)
        .with_remark("builtin sample: paused cron job"),
    ];

    for def in samples {
        match jobs.add_job(def).await {
            Ok(id) => info!(id = %id, "sample job seeded"),
            Err(ServiceError::Invalid(msg)) => warn!(%msg, "skipping sample job"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
