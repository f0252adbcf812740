//! Engine configuration loaded from `STOCKFORGE_*` environment variables.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stockforge_core::LocationCode;
use stockforge_observability::LogFormat;

use crate::collaborators::RateLimitPolicy;

pub const ENV_RECEIVING_LOCATION: &str = "STOCKFORGE_RECEIVING_LOCATION";
pub const ENV_AUTO_RELEASE_INTERVAL_SECS: &str = "STOCKFORGE_AUTO_RELEASE_INTERVAL_SECS";
pub const ENV_AUTO_RELEASE_BATCH_LIMIT: &str = "STOCKFORGE_AUTO_RELEASE_BATCH_LIMIT";
pub const ENV_RATE_LIMIT_MAX: &str = "STOCKFORGE_RATE_LIMIT_MAX";
pub const ENV_RATE_LIMIT_WINDOW_SECS: &str = "STOCKFORGE_RATE_LIMIT_WINDOW_SECS";
pub const ENV_RATE_LIMIT_POLICY: &str = "STOCKFORGE_RATE_LIMIT_POLICY";
pub const ENV_LOG_FORMAT: &str = "STOCKFORGE_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Putaway location for ASN lines that name none.
    pub receiving_location: LocationCode,
    pub auto_release_interval: Duration,
    /// Maximum HOLD candidates per reconciler run; `None` means all.
    pub auto_release_batch_limit: Option<usize>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_policy: RateLimitPolicy,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            receiving_location: LocationCode::receiving(),
            auto_release_interval: Duration::from_secs(300),
            auto_release_batch_limit: None,
            rate_limit_max: 60,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_policy: RateLimitPolicy::FailOpen,
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_RECEIVING_LOCATION) {
            config.receiving_location = LocationCode::parse(&raw)
                .with_context(|| format!("{ENV_RECEIVING_LOCATION}='{raw}'"))?;
        }
        if let Some(raw) = get(ENV_AUTO_RELEASE_INTERVAL_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_AUTO_RELEASE_INTERVAL_SECS}='{raw}'"))?;
            anyhow::ensure!(secs > 0, "{ENV_AUTO_RELEASE_INTERVAL_SECS} must be positive");
            config.auto_release_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = get(ENV_AUTO_RELEASE_BATCH_LIMIT) {
            let limit: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_AUTO_RELEASE_BATCH_LIMIT}='{raw}'"))?;
            config.auto_release_batch_limit = Some(limit);
        }
        if let Some(raw) = get(ENV_RATE_LIMIT_MAX) {
            config.rate_limit_max = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_RATE_LIMIT_MAX}='{raw}'"))?;
        }
        if let Some(raw) = get(ENV_RATE_LIMIT_WINDOW_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_RATE_LIMIT_WINDOW_SECS}='{raw}'"))?;
            anyhow::ensure!(secs > 0, "{ENV_RATE_LIMIT_WINDOW_SECS} must be positive");
            config.rate_limit_window = Duration::from_secs(secs);
        }
        if let Some(raw) = get(ENV_RATE_LIMIT_POLICY) {
            config.rate_limit_policy = raw
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("{ENV_RATE_LIMIT_POLICY}='{raw}'"))?;
        }
        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = raw
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("{ENV_LOG_FORMAT}='{raw}'"))?;
        }

        Ok(config)
    }

    /// Install the process-wide tracing subscriber in the configured format.
    pub fn init_logging(&self) {
        stockforge_observability::init_with(self.log_format);
    }
}
