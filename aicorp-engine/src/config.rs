//! Simulation settings.
//!
//! Every knob is a CLI flag with an `AICORP_*` env override; the binary
//! flattens [`Settings`] into its own argument struct.

use std::time::Duration;

use clap::Args;

use crate::error::ConfigError;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Employees hired per manager at bootstrap
    #[arg(long, env = "AICORP_MIN_POOL_SIZE", default_value_t = 2)]
    pub min_pool_size: usize,

    /// Upper bound on employees per skill
    #[arg(long, env = "AICORP_MAX_POOL_SIZE", default_value_t = 50)]
    pub max_pool_size: usize,

    /// Busy/total ratio at which a skill scales up
    #[arg(long, env = "AICORP_SCALE_THRESHOLD", default_value_t = 0.8)]
    pub scale_threshold: f64,

    /// Concurrent completion calls across the whole organization
    #[arg(long, env = "AICORP_COMPLETION_PERMITS", default_value_t = 5)]
    pub completion_permits: usize,

    /// Per-call completion timeout (seconds)
    #[arg(long, env = "AICORP_COMPLETION_TIMEOUT_SECS", default_value_t = 300)]
    pub completion_timeout_secs: u64,

    #[arg(long, env = "AICORP_WORK_QUEUE_CAPACITY", default_value_t = 10)]
    pub work_queue_capacity: usize,

    #[arg(long, env = "AICORP_REVIEW_QUEUE_CAPACITY", default_value_t = 100)]
    pub review_queue_capacity: usize,

    #[arg(long, env = "AICORP_MAX_REPORTS", default_value_t = 10)]
    pub max_reports: usize,

    /// Non-terminal pipelines allowed at once
    #[arg(long, env = "AICORP_MAX_ACTIVE_PIPELINES", default_value_t = 5)]
    pub max_active_pipelines: usize,

    /// C-suite rejections before a pipeline is rejected outright
    #[arg(long, env = "AICORP_MAX_CSUITE_REVISIONS", default_value_t = 3)]
    pub max_csuite_revisions: u32,

    /// Delay between pipeline starts (ms)
    #[arg(long, env = "AICORP_PIPELINE_INTERVAL_MS", default_value_t = 15_000)]
    pub pipeline_interval_ms: u64,

    /// Poll delay while paused or unseeded (ms)
    #[arg(long, env = "AICORP_IDLE_POLL_MS", default_value_t = 5_000)]
    pub idle_poll_ms: u64,

    /// Poll delay while at the active pipeline limit (ms)
    #[arg(long, env = "AICORP_CAPACITY_POLL_MS", default_value_t = 10_000)]
    pub capacity_poll_ms: u64,

    /// Timeout for each persistence call (ms)
    #[arg(long, env = "AICORP_STORE_TIMEOUT_MS", default_value_t = 5_000)]
    pub store_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_pool_size: 2,
            max_pool_size: 50,
            scale_threshold: 0.8,
            completion_permits: 5,
            completion_timeout_secs: 300,
            work_queue_capacity: 10,
            review_queue_capacity: 100,
            max_reports: 10,
            max_active_pipelines: 5,
            max_csuite_revisions: 3,
            pipeline_interval_ms: 15_000,
            idle_poll_ms: 5_000,
            capacity_poll_ms: 10_000,
            store_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_pool_size > self.max_pool_size {
            return Err(ConfigError::PoolBounds {
                min: self.min_pool_size,
                max: self.max_pool_size,
            });
        }
        if !(self.scale_threshold > 0.0 && self.scale_threshold <= 1.0) {
            return Err(ConfigError::Threshold(self.scale_threshold));
        }
        for (name, value) in [
            ("max_pool_size", self.max_pool_size),
            ("completion_permits", self.completion_permits),
            ("work_queue_capacity", self.work_queue_capacity),
            ("review_queue_capacity", self.review_queue_capacity),
            ("max_active_pipelines", self.max_active_pipelines),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn pipeline_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn capacity_poll(&self) -> Duration {
        Duration::from_millis(self.capacity_poll_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn defaults_match_flag_defaults() {
        let parsed = Cli::parse_from(["aicorp"]).settings;
        let default = Settings::default();
        assert_eq!(parsed.min_pool_size, default.min_pool_size);
        assert_eq!(parsed.max_pool_size, default.max_pool_size);
        assert_eq!(parsed.completion_permits, default.completion_permits);
        assert_eq!(parsed.pipeline_interval_ms, default.pipeline_interval_ms);
        assert!(default.validate().is_ok());
    }

    #[test]
    fn flags_override() {
        let parsed = Cli::parse_from(["aicorp", "--max-pool-size", "4", "--scale-threshold", "0.5"]).settings;
        assert_eq!(parsed.max_pool_size, 4);
        assert_eq!(parsed.scale_threshold, 0.5);
    }

    #[test]
    fn invalid_settings_rejected() {
        let s = Settings { min_pool_size: 5, max_pool_size: 4, ..Default::default() };
        assert!(matches!(s.validate(), Err(ConfigError::PoolBounds { min: 5, max: 4 })));

        let s = Settings { scale_threshold: 0.0, ..Default::default() };
        assert!(matches!(s.validate(), Err(ConfigError::Threshold(_))));

        let s = Settings { completion_permits: 0, ..Default::default() };
        assert!(matches!(s.validate(), Err(ConfigError::Zero("completion_permits"))));
    }
}
