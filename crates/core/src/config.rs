// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: YAML file loading, defaults, validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("agent.uuid is not a valid UUID: {0}")]
    InvalidUuid(String),
    #[error("tls.cert_file, tls.key_file and tls.ca_file must all be set for mTLS")]
    PartialTls,
}

/// Top-level agent configuration.
///
/// Mirrors the sections of `/etc/phpborg-agent/config.yaml`. Unset options
/// fall back to the defaults below; `server.url`, `agent.uuid` and
/// `agent.name` are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub borg_ssh: BorgSshConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
    pub tls: TlsConfig,
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL prefixed to every API path (e.g. `https://phpborg.example.com/api`).
    pub url: String,
    /// Disable server certificate verification. Development only.
    pub insecure_skip_verify: bool,
}

/// Agent identity. Durable across restarts; immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub uuid: String,
    pub name: String,
    pub max_concurrent_tasks: usize,
    /// Set at runtime from the binary version; never read from the file.
    #[serde(skip)]
    pub version: String,
}

/// Remote archiver endpoint reached over SSH.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BorgSshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub private_key_path: String,
    /// Remote repository root on the backup server.
    pub backup_path: String,
}

/// Poll and heartbeat cadence, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    #[serde(rename = "interval")]
    pub interval_secs: u64,
    #[serde(rename = "heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

/// Log verbosity and destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path. Empty means stdout.
    pub file: String,
}

/// mTLS identity triple. All-or-nothing: setting only some of the three
/// paths is a configuration error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
    pub ca_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            agent: AgentConfig::default(),
            borg_ssh: BorgSshConfig::default(),
            polling: PollingConfig::default(),
            logging: LoggingConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            name: String::new(),
            max_concurrent_tasks: 2,
            version: String::new(),
        }
    }
}

impl Default for BorgSshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 2222,
            user: "phpborg-borg".to_string(),
            private_key_path: String::new(),
            backup_path: String::new(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            heartbeat_interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

impl Config {
    /// Load a config file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and the all-or-nothing TLS rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.is_empty() {
            return Err(ConfigError::MissingField("server.url"));
        }
        if self.agent.uuid.is_empty() {
            return Err(ConfigError::MissingField("agent.uuid"));
        }
        if uuid::Uuid::parse_str(&self.agent.uuid).is_err() {
            return Err(ConfigError::InvalidUuid(self.agent.uuid.clone()));
        }
        if self.agent.name.is_empty() {
            return Err(ConfigError::MissingField("agent.name"));
        }

        let tls_set = [&self.tls.cert_file, &self.tls.key_file, &self.tls.ca_file];
        let configured = tls_set.iter().filter(|p| !p.is_empty()).count();
        if configured != 0 && configured != tls_set.len() {
            return Err(ConfigError::PartialTls);
        }

        Ok(())
    }

    /// True when the full mTLS triple is configured.
    pub fn use_tls(&self) -> bool {
        !self.tls.cert_file.is_empty()
            && !self.tls.key_file.is_empty()
            && !self.tls.ca_file.is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.polling.heartbeat_interval_secs.max(1))
    }
}

/// Platform default path of the config file.
pub fn default_config_path() -> PathBuf {
    #[cfg(windows)]
    {
        program_data().join("phpborg-agent").join("config.yaml")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/etc/phpborg-agent/config.yaml")
    }
}

/// Platform default path of the agent log file.
pub fn default_log_path() -> PathBuf {
    #[cfg(windows)]
    {
        program_data()
            .join("phpborg-agent")
            .join("logs")
            .join("agent.log")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/var/log/phpborg-agent/agent.log")
    }
}

/// World-writable temp directory used for self-update staging. Must live
/// outside the installation prefix so the service manager's filesystem
/// protections do not apply to it.
pub fn default_temp_dir() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var_os("TEMP")
            .or_else(|| std::env::var_os("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}

/// Platform default restore destination for `backup_restore` tasks.
pub fn default_restore_dir() -> PathBuf {
    #[cfg(windows)]
    {
        program_data().join("phpborg-agent").join("restore")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/var/restore")
    }
}

#[cfg(windows)]
fn program_data() -> PathBuf {
    std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
