use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Live update hub settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Number of recent broadcasts kept for replay
    pub retention: usize,
    #[serde(rename = "heartbeat_interval_secs", with = "duration_secs")]
    pub heartbeat_interval: Duration,
    /// Per-subscriber queue length before a viewer counts as lagging
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            retention: 50,
            heartbeat_interval: Duration::from_secs(15),
            subscriber_buffer: 64,
        }
    }
}

impl HubConfig {
    pub const MAX_RETENTION: usize = 10_000;
    pub const MAX_SUBSCRIBER_BUFFER: usize = 65_536;

    /// Rejects values the hub cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_RETENTION).contains(&self.retention) {
            return Err(BoardError::ConfigError(format!(
                "retention must be between 1 and {}, got {}",
                Self::MAX_RETENTION,
                self.retention
            )));
        }
        if !(1..=Self::MAX_SUBSCRIBER_BUFFER).contains(&self.subscriber_buffer) {
            return Err(BoardError::ConfigError(format!(
                "subscriber_buffer must be between 1 and {}, got {}",
                Self::MAX_SUBSCRIBER_BUFFER,
                self.subscriber_buffer
            )));
        }
        // interval_at panics on a zero period
        if self.heartbeat_interval.is_zero() {
            return Err(BoardError::ConfigError(
                "heartbeat interval must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for wiring the board core into a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_file: PathBuf,
    pub usage_log_file: Option<PathBuf>,
    pub hub: HubConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data").join("board.json"),
            usage_log_file: None,
            hub: HubConfig::default(),
        }
    }
}

impl CoreConfig {
    pub const DATA_FILE_VAR: &'static str = "BOARD_DATA_FILE";
    pub const USAGE_LOG_VAR: &'static str = "USAGE_LOG_FILE";
    pub const RETENTION_VAR: &'static str = "HUB_RETENTION";
    pub const HEARTBEAT_VAR: &'static str = "HUB_HEARTBEAT_SECS";

    /// Parses a JSON config document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BoardError::ConfigError(e.to_string()))?;
        config.hub.validate()?;
        Ok(config)
    }

    /// Defaults overridden by process environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key/value source
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup(Self::DATA_FILE_VAR) {
            self.data_file = PathBuf::from(path);
        }
        if let Some(path) = lookup(Self::USAGE_LOG_VAR) {
            self.usage_log_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(Self::RETENTION_VAR) {
            self.hub.retention = parse_number(Self::RETENTION_VAR, &value)?;
        }
        if let Some(value) = lookup(Self::HEARTBEAT_VAR) {
            let secs: u64 = parse_number(Self::HEARTBEAT_VAR, &value)?;
            if secs == 0 {
                return Err(BoardError::ConfigError(format!(
                    "{} must be at least 1",
                    Self::HEARTBEAT_VAR
                )));
            }
            self.hub.heartbeat_interval = Duration::from_secs(secs);
        }
        self.hub.validate()?;
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BoardError::ConfigError(format!("{} is not a valid number: '{}'", key, value)))
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
