use crate::{
    domain::board::BoardConfig,
    error::{Result, SprintboardError},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tracker-wide settings, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Reject starting a sprint while another sprint of the project is active
    pub enforce_single_active_sprint: bool,
    pub board: BoardConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enforce_single_active_sprint: true,
            board: BoardConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TrackerConfig =
            toml::from_str(contents).map_err(|e| SprintboardError::ConfigError(e.to_string()))?;
        config.board.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SprintboardError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issue::IssueStatus;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!(config.enforce_single_active_sprint);
    }

    #[test]
    fn test_custom_columns() {
        let toml = r#"
enforce_single_active_sprint = false

[[board.columns]]
name = "Backlog"
status = "TODO"

[[board.columns]]
name = "Doing"
status = "IN_PROGRESS"

[[board.columns]]
name = "Review"
status = "IN_REVIEW"

[[board.columns]]
name = "Shipped"
status = "DONE"
"#;
        let config = TrackerConfig::from_toml_str(toml).unwrap();

        assert!(!config.enforce_single_active_sprint);
        assert_eq!(
            config.board.get_column_for_status(&IssueStatus::Done).unwrap().name,
            "Shipped"
        );
    }

    #[test]
    fn test_incomplete_columns_rejected() {
        let toml = r#"
[[board.columns]]
name = "Backlog"
status = "TODO"
"#;
        let err = TrackerConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, SprintboardError::ConfigError(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = TrackerConfig::from_toml_str("board = 3").unwrap_err();
        assert!(matches!(err, SprintboardError::ConfigError(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = TrackerConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(TrackerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "enforce_single_active_sprint = false\n")
            .await
            .unwrap();

        let config = TrackerConfig::load(&path).await.unwrap();
        assert!(!config.enforce_single_active_sprint);
    }
}
