//! Configuration loaded from `~/.tidyops/config.json`.
//!
//! Every field has a serde default so the engine runs with no config file at
//! all: local SQLite backend, 60-second scan interval.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Seconds between scan ticks.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Override for the SQLite database path. Useful for dev isolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Remote document store credentials. Presence selects the document
    /// backend; absence falls back to local SQLite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore: Option<FirestoreConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            database_path: None,
            firestore: None,
        }
    }
}

/// Document store connection settings (Firestore REST).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_scan_interval() -> u64 {
    60
}

fn default_api_base() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

/// Load configuration from `~/.tidyops/config.json`.
///
/// A missing file is not an error; the engine runs on defaults.
pub fn load_config() -> Result<Config, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    let config_path = home.join(".tidyops").join("config.json");

    if !config_path.exists() {
        log::info!(
            "No config file at {}, running with defaults",
            config_path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").expect("parse");
        assert_eq!(config.scan_interval_secs, 60);
        assert!(config.database_path.is_none());
        assert!(config.firestore.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config: Config = serde_json::from_str(
            r#"{
                "scanIntervalSecs": 300,
                "databasePath": "/tmp/tidyops-dev.db",
                "firestore": {
                    "projectId": "tidyops-prod",
                    "apiKey": "abc123"
                }
            }"#,
        )
        .expect("parse");

        assert_eq!(config.scan_interval_secs, 300);
        assert_eq!(config.database_path.as_deref(), Some("/tmp/tidyops-dev.db"));
        let firestore = config.firestore.expect("firestore config");
        assert_eq!(firestore.project_id, "tidyops-prod");
        assert_eq!(firestore.api_base, "https://firestore.googleapis.com/v1");
    }
}
