//! Append-only JSON-lines log of user actions.

use crate::error::{BoardError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub timestamp: String,
    pub action_type: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl UsageEvent {
    /// Creates an event stamped with the current time
    pub fn now(action_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self::at(Utc::now(), action_type, action)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        action_type: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            action_type: action_type.into(),
            action: action.into(),
            user_id: None,
            referrer: None,
            user_agent: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.timestamp.trim().is_empty()
            || self.action_type.trim().is_empty()
            || self.action.trim().is_empty()
        {
            return Err(BoardError::invalid(
                "usage event requires timestamp, actionType, and action",
            ));
        }
        Ok(())
    }
}

/// Appends usage events to a file, one JSON object per line
#[derive(Debug, Clone)]
pub struct UsageLogger {
    file_path: PathBuf,
}

impl UsageLogger {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub async fn record(&self, event: &UsageEvent) -> Result<()> {
        event.validate()?;

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_appends_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let logger = UsageLogger::new(temp_dir.path().join("logs").join("usage.log"));

        logger
            .record(&UsageEvent::now("card", "create").with_user("alice"))
            .await
            .unwrap();
        logger
            .record(&UsageEvent::now("page", "view").with_user_agent("test-agent"))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: UsageEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.action, "create");
        assert_eq!(first.user_id.as_deref(), Some("alice"));
        assert!(lines[1].contains("\"userAgent\":\"test-agent\""));
        assert!(!lines[1].contains("userId"));
    }

    #[tokio::test]
    async fn test_record_rejects_incomplete_event() {
        let temp_dir = TempDir::new().unwrap();
        let logger = UsageLogger::new(temp_dir.path().join("usage.log"));

        let err = logger.record(&UsageEvent::now("card", "")).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert!(!logger.path().exists());
    }

    #[test]
    fn test_timestamp_format() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = UsageEvent::at(at, "card", "move").with_referrer("/board");
        assert_eq!(event.timestamp, "2024-05-01T12:00:00.000Z");
        assert_eq!(event.referrer.as_deref(), Some("/board"));
    }
}
