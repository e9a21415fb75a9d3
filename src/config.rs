use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound on any single row-lock wait
    pub lock_timeout_ms: u64,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Startup attempts before giving up on the database
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            max_connections: 10,
            acquire_timeout_ms: 5000,
            connect_attempts: 10,
            connect_backoff_ms: 2000,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.postgres_url = Some(url);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the stores cannot honor.
    ///
    /// A zero lock timeout means "wait forever" to PostgreSQL and "never
    /// wait" to the in-memory store, so it is refused outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.lock_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "store.max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 3000
"#;

    #[test]
    fn test_minimal_config_uses_store_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 3000);
        assert!(config.postgres_url.is_none());
        assert_eq!(config.store.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.store.connect_attempts, 10);
    }

    #[test]
    fn test_partial_store_section() {
        let yaml = format!("{MINIMAL}store:\n  lock_timeout_ms: 250\n");
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.store.lock_timeout_ms, 250);
        assert_eq!(config.store.max_connections, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load("does-not-exist").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_zero_lock_timeout_is_rejected() {
        let yaml = format!("{MINIMAL}store:\n  lock_timeout_ms: 0\n");
        let config = AppConfig::from_yaml(&yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("lock_timeout_ms"));

        assert!(AppConfig::from_yaml(MINIMAL).unwrap().validate().is_ok());
    }
}
