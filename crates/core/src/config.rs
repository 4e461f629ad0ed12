//! Session coordinator configuration

use crate::error::Result;
use crate::validation::{ValidateConfig, validators};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and naming knobs for the coordinator. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity after which the session is left to expire on its own
    pub idle_threshold_ms: u64,

    /// Lead time before expiry at which a renewal is attempted
    pub refresh_skew_ms: u64,

    /// Period of the refresh check
    pub tick_interval_ms: u64,

    /// Period of the liveness signal
    pub heartbeat_interval_ms: u64,

    /// Backend origin; empty means the page's own origin
    pub backend_url: String,

    /// Storage key holding the token in both tiers
    pub storage_key: String,

    /// Name of the cross-tab channel
    pub channel_name: String,

    /// Where expired tabs are sent
    pub login_path: String,
}

impl SessionConfig {
    /// Default idle threshold: 30 minutes
    pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 30 * 60 * 1000;
    /// Default refresh skew: 2 minutes
    pub const DEFAULT_REFRESH_SKEW_MS: u64 = 2 * 60 * 1000;
    /// Default refresh check period: 30 seconds
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 30 * 1000;
    /// Default heartbeat period: 5 minutes
    pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5 * 60 * 1000;

    pub const REFRESH_PATH: &'static str = "/auth/refresh";
    pub const HEARTBEAT_PATH: &'static str = "/auth/heartbeat";

    /// Load from a TOML document layered over the defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by `TABSESSION_*` environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("TABSESSION").try_parsing(true))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Thresholds the refresh scheduler decides with
    #[must_use]
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            idle_threshold_ms: i64::try_from(self.idle_threshold_ms).unwrap_or(i64::MAX),
            refresh_skew_ms: i64::try_from(self.refresh_skew_ms).unwrap_or(i64::MAX),
        }
    }

    /// Absolute or origin-relative URL of the refresh endpoint
    #[must_use]
    pub fn refresh_url(&self) -> String {
        self.endpoint(Self::REFRESH_PATH)
    }

    /// Absolute or origin-relative URL of the heartbeat endpoint
    #[must_use]
    pub fn heartbeat_url(&self) -> String {
        self.endpoint(Self::HEARTBEAT_PATH)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.backend_url.trim_end_matches('/'))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: Self::DEFAULT_IDLE_THRESHOLD_MS,
            refresh_skew_ms: Self::DEFAULT_REFRESH_SKEW_MS,
            tick_interval_ms: Self::DEFAULT_TICK_INTERVAL_MS,
            heartbeat_interval_ms: Self::DEFAULT_HEARTBEAT_INTERVAL_MS,
            backend_url: String::new(),
            storage_key: "token".to_string(),
            channel_name: "tabsession".to_string(),
            login_path: "/login".to_string(),
        }
    }
}

impl ValidateConfig for SessionConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        const DAY_MS: u64 = 24 * 60 * 60 * 1000;

        validators::validate_range(self.idle_threshold_ms, 1, 7 * DAY_MS, "idle_threshold_ms")?;
        validators::validate_range(self.refresh_skew_ms, 0, DAY_MS, "refresh_skew_ms")?;
        // Browser timers take a signed 32-bit delay.
        validators::validate_range(
            self.tick_interval_ms,
            1,
            u64::from(u32::MAX >> 1),
            "tick_interval_ms",
        )?;
        validators::validate_range(
            self.heartbeat_interval_ms,
            1,
            u64::from(u32::MAX >> 1),
            "heartbeat_interval_ms",
        )?;
        validators::validate_not_empty(&self.storage_key, "storage_key")?;
        validators::validate_not_empty(&self.channel_name, "channel_name")?;
        validators::validate_absolute_path(&self.login_path, "login_path")?;
        if !self.backend_url.is_empty() && !self.backend_url.starts_with('/') {
            validators::validate_url(&self.backend_url, "backend_url")?;
        }
        Ok(())
    }
}

/// The two thresholds a refresh decision depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub idle_threshold_ms: i64,
    pub refresh_skew_ms: i64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        SessionConfig::default().refresh_policy()
    }
}
