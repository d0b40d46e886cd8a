//! Layered configuration, teacher pattern: `figment` with `Env` over
//! `Toml::file` over `Serialized` defaults.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Aggregator,
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Bounds how long `POST /api/v1/sync/trigger` waits for a cycle.
    pub trigger_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "zmc-alarm-sync".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            trigger_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/zmc_alarms".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_secs: 10,
            max_retries: 5,
            retry_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub enabled: bool,
    pub base_url: String,
    pub alerts_path: String,
    pub silences_path: String,
    pub health_path: String,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_interval_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:9093".to_string(),
            alerts_path: "/api/v2/alerts".to_string(),
            silences_path: "/api/v2/silences".to_string(),
            health_path: "/-/healthy".to_string(),
            timeout_secs: 10,
            retry_count: 3,
            retry_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectIncidentConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub default_priority: String,
    pub team: Option<String>,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_interval_secs: u64,
}

impl Default for DirectIncidentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.opsgenie.com".to_string(),
            api_key: String::new(),
            default_priority: "P3".to_string(),
            team: None,
            timeout_secs: 10,
            retry_count: 3,
            retry_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub aggregator: AggregatorConfig,
    pub direct: DirectIncidentConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Aggregator,
            aggregator: AggregatorConfig::default(),
            direct: DirectIncidentConfig::default(),
        }
    }
}

impl BackendConfig {
    /// Reject ambiguous configuration: more than one backend enabled, or the
    /// enabled flag disagreeing with `mode`.
    pub fn validate(&self) -> Result<()> {
        if self.aggregator.enabled && self.direct.enabled {
            return Err(Error::Config(
                "only one of backend.aggregator.enabled / backend.direct.enabled may be true".to_string(),
            ));
        }
        match self.mode {
            BackendMode::Aggregator if self.direct.enabled => {
                return Err(Error::Config(
                    "backend.mode=aggregator but backend.direct.enabled=true".to_string(),
                ));
            }
            BackendMode::Direct if self.aggregator.enabled => {
                return Err(Error::Config(
                    "backend.mode=direct but backend.aggregator.enabled=true".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub scan_interval_secs: u64,
    pub sync_on_startup: bool,
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_secs: u64,
    pub auto_remove_on_clear: bool,
    pub allowed_levels: Option<Vec<String>>,
    pub allowed_severities: Option<Vec<String>>,
    pub static_labels: std::collections::HashMap<String, String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            sync_on_startup: true,
            heartbeat_enabled: true,
            heartbeat_interval_secs: 300,
            auto_remove_on_clear: true,
            allowed_levels: None,
            allowed_severities: None,
            static_labels: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load from env (`SYNC_` prefixed) over `./config.toml` over defaults.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SYNC_").split("_"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.backend.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let config = Config::default();
        assert!(config.backend.validate().is_ok());
    }

    #[test]
    fn conflicting_backend_flags_are_rejected() {
        let mut config = Config::default();
        config.backend.aggregator.enabled = true;
        config.backend.direct.enabled = true;
        assert!(config.backend.validate().is_err());
    }

    #[test]
    fn mode_disagreeing_with_enabled_flag_is_rejected() {
        let mut config = Config::default();
        config.backend.mode = BackendMode::Direct;
        config.backend.aggregator.enabled = true;
        assert!(config.backend.validate().is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("SYNC_SERVICE_PORT", "9999");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("SYNC_").split("_"))
            .extract()
            .unwrap();
        assert_eq!(config.service.port, 9999);
        std::env::remove_var("SYNC_SERVICE_PORT");
    }
}
