use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempsense_common::sensor::SensorConfig;
use tempsense_common::telemetry::{BrokerAddressError, EndpointError, SinkConfig};

/// Environment variable naming the configuration file when no argument is given.
pub const CONFIG_ENV: &str = "TEMPSENSE_CONFIG";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("interval_secs must be greater than zero")]
    InvalidInterval,

    #[error("invalid line protocol endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),

    #[error("invalid MQTT broker address: {0}")]
    InvalidBrokerAddress(#[from] BrokerAddressError),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("no configuration file given and no configuration directory found")]
    NoConfigDir,
}

/// Startup configuration. Loaded once and never changed afterwards.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_entity_id")]
    pub entity_id: String,
    #[serde(default)]
    pub sensor: SensorConfig,
    pub sink: SinkConfig,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_entity_id() -> String {
    "Pi-One".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&text)
    }

    /// Parses and validates a configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.entity_id.trim().is_empty() {
            return Err(ConfigError::MissingField("entity_id"));
        }

        match &self.sink {
            SinkConfig::LineProtocol(config) => {
                config.write_url()?;
                if config.database.trim().is_empty() {
                    return Err(ConfigError::MissingField("database"));
                }
            }
            SinkConfig::Mqtt(config) => {
                config.broker_address()?;
                if config.client_id.trim().is_empty() {
                    return Err(ConfigError::MissingField("client_id"));
                }
                if config.topic_root.trim_matches('/').is_empty() {
                    return Err(ConfigError::MissingField("topic_root"));
                }
            }
            SinkConfig::Dummy => {}
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Picks the configuration file: the command line argument, then `$TEMPSENSE_CONFIG`, then
/// `config.json` in the user's configuration directory.
pub fn config_path(arg: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = arg.or_else(|| std::env::var(CONFIG_ENV).ok()) {
        return Ok(PathBuf::from(path));
    }

    directories::ProjectDirs::from("", "", "tempsense")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .ok_or(ConfigError::NoConfigDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(r#"{ "sink": { "kind": "dummy" } }"#).unwrap();

        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.entity_id, "Pi-One");
        assert_eq!(config.sensor, SensorConfig::default());
    }

    #[test]
    fn test_line_protocol_config() {
        let config = Config::from_json(
            r#"{
                "interval_secs": 60,
                "sink": {
                    "kind": "line_protocol",
                    "uri": "http://influx.local:8086",
                    "database": "telemetry",
                    "username": "pi",
                    "password": "secret"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.interval(), Duration::from_secs(60));
        assert!(matches!(config.sink, SinkConfig::LineProtocol(_)));
    }

    #[test]
    fn test_malformed_broker_address() {
        let error = Config::from_json(
            r#"{ "sink": { "kind": "mqtt", "broker": "localhost", "client_id": "pi-one", "topic_root": "home/pi-one" } }"#,
        )
        .unwrap_err();

        assert!(matches!(error, ConfigError::InvalidBrokerAddress(_)));
    }

    #[test]
    fn test_invalid_settings() {
        let error = Config::from_json(r#"{ "interval_secs": 0, "sink": { "kind": "dummy" } }"#)
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidInterval));

        let error = Config::from_json(
            r#"{ "sink": { "kind": "line_protocol", "uri": "ftp://influx", "database": "telemetry" } }"#,
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidEndpoint(_)));

        let error = Config::from_json(
            r#"{ "sink": { "kind": "line_protocol", "uri": "http://influx", "database": " " } }"#,
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::MissingField("database")));

        let error = Config::from_json(
            r#"{ "sink": { "kind": "mqtt", "broker": "localhost:1883", "client_id": "pi-one", "topic_root": "/" } }"#,
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::MissingField("topic_root")));

        let error = Config::from_json(r#"{ "sensor": { "kind": "dummy" } }"#).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let error = Config::load(Path::new("/nonexistent/tempsense.json")).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn test_config_path_prefers_argument() {
        let path = config_path(Some("/etc/tempsense.json".into())).unwrap();
        assert_eq!(path, PathBuf::from("/etc/tempsense.json"));
    }
}
