//! Engine configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use shared_utils::config::{get_env_parsed_or, get_env_var, ConfigError};

/// Runtime knobs for the scheduler loop and worker pool.
///
/// Every field has a production default except `database_url`, which must be
/// provided. Parse failures are errors, not silent fallbacks.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database path/URL (`DATABASE_URL`, required).
    pub database_url: String,
    /// Directory for the durable dispatch queue (`DISPATCH_QUEUE_DIR`).
    pub queue_dir: PathBuf,
    /// Infrastructure-level attempts per queue job (`DISPATCH_MAX_RETRIES`).
    pub dispatch_max_retries: u32,
    /// Base for the queue's exponential backoff (`DISPATCH_RETRY_DELAY_MS`).
    pub dispatch_retry_delay: Duration,
    /// Scheduler tick period (`SCHEDULER_PERIOD_SECS`).
    pub scheduler_period: Duration,
    /// Tasks claimed per tick (`CLAIM_BATCH_SIZE`).
    pub claim_batch_size: i64,
    /// Worker threads on this host (`WORKER_COUNT`).
    pub worker_count: usize,
    /// Host-wide placement rate cap (`CALLS_PER_MINUTE`).
    pub calls_per_minute: u32,
    /// Age after which an `in-progress` claim is considered orphaned
    /// (`ORPHAN_THRESHOLD_SECS`).
    pub orphan_threshold_secs: u64,
    /// Hard cap on graceful shutdown (`SHUTDOWN_GRACE_SECS`).
    pub shutdown_grace: Duration,
    /// Deadline imposed on each placer invocation (`PLACER_DEADLINE_SECS`).
    pub placer_deadline: Duration,
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = Self {
            database_url: get_env_var("DATABASE_URL")?,
            queue_dir: PathBuf::from(get_env_parsed_or(
                "DISPATCH_QUEUE_DIR",
                "./dispatch-queue".to_string(),
            )?),
            dispatch_max_retries: get_env_parsed_or("DISPATCH_MAX_RETRIES", 3)?,
            dispatch_retry_delay: Duration::from_millis(get_env_parsed_or(
                "DISPATCH_RETRY_DELAY_MS",
                5000,
            )?),
            scheduler_period: Duration::from_secs(get_env_parsed_or(
                "SCHEDULER_PERIOD_SECS",
                60,
            )?),
            claim_batch_size: get_env_parsed_or("CLAIM_BATCH_SIZE", 50)?,
            worker_count: get_env_parsed_or("WORKER_COUNT", 50)?,
            calls_per_minute: get_env_parsed_or("CALLS_PER_MINUTE", 50)?,
            orphan_threshold_secs: get_env_parsed_or("ORPHAN_THRESHOLD_SECS", 600)?,
            shutdown_grace: Duration::from_secs(get_env_parsed_or("SHUTDOWN_GRACE_SECS", 10)?),
            placer_deadline: Duration::from_secs(get_env_parsed_or("PLACER_DEADLINE_SECS", 30)?),
        };
        cfg.validate()
            .map_err(|reason| ConfigError::InvalidEnvVar {
                name: "EngineConfig".into(),
                value: String::new(),
                reason,
            })?;
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("DATABASE_URL must be non-empty".into());
        }
        if self.claim_batch_size <= 0 {
            return Err("CLAIM_BATCH_SIZE must be greater than 0".into());
        }
        if self.worker_count == 0 {
            return Err("WORKER_COUNT must be greater than 0".into());
        }
        if self.calls_per_minute == 0 {
            return Err("CALLS_PER_MINUTE must be greater than 0".into());
        }
        if self.scheduler_period.is_zero() {
            return Err("SCHEDULER_PERIOD_SECS must be greater than 0".into());
        }
        if self.dispatch_max_retries == 0 {
            return Err("DISPATCH_MAX_RETRIES must be greater than 0".into());
        }
        Ok(())
    }

    /// Claim look-ahead: one period plus a minute, so a task whose instant
    /// falls between ticks is picked up by the earlier tick.
    pub fn claim_horizon(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.scheduler_period).unwrap_or(chrono::Duration::seconds(60))
            + chrono::Duration::seconds(60)
    }

    /// Orphan threshold as a chrono duration for gateway calls.
    pub fn orphan_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.orphan_threshold_secs as i64)
    }
}
