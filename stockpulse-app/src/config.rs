//! Configuration loading for the StockPulse client.
//!
//! Required fields have no defaults; `log_limit`, `log_format` and `agents`
//! may be omitted.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulseConfig {
    pub scheduler_base_url: String,
    pub agent_base_url: String,
    pub events_ws_endpoint: String,
    pub manager_agent_id: String,
    pub schedule_id: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    #[serde(default = "default_log_limit")]
    pub log_limit: usize,
    pub store_path: PathBuf,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Display names for agents whose status events omit one.
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_limit() -> usize {
    10
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or STOCKPULSE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl PulseConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: PulseConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_scheme(
            "scheduler_base_url",
            &self.scheduler_base_url,
            &["http://", "https://"],
        )?;
        require_scheme("agent_base_url", &self.agent_base_url, &["http://", "https://"])?;
        require_scheme("events_ws_endpoint", &self.events_ws_endpoint, &["ws://", "wss://"])?;
        if self.manager_agent_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "manager_agent_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.schedule_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "schedule_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self
            .auth
            .api_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "auth.api_key",
                reason: "must not be blank when set".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.log_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "log_limit",
                reason: "must be > 0".to_string(),
            });
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self
            .agents
            .iter()
            .any(|agent| agent.id.trim().is_empty() || agent.name.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "agents",
                reason: "every agent needs a non-empty id and name".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.auth.api_key.as_deref()
    }
}

fn require_scheme(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if !schemes.iter().any(|scheme| value.starts_with(scheme)) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("must start with one of {}", schemes.join(", ")),
        });
    }
    Ok(())
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("STOCKPULSE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
