//! Server configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! gives a working server on the standard lobby port. The binary layers
//! command-line flags on top of whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` isn't set.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the server can be told at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the lobby listens on.
    pub bind: String,
    /// Port hosted game servers listen on; probes go here.
    pub game_port: u16,
    pub supported_protocol_versions: Vec<u32>,
    /// Silence before the server sends `PING`.
    pub idle_timeout_secs: u64,
    /// Silence after `PING` before the client is dropped.
    pub ping_timeout_secs: u64,
    /// How long a relogin target has to show it's alive.
    pub relogin_timeout_secs: u64,
    /// Deadline for the probe that follows `GAME_OPEN`.
    pub probe_timeout_secs: u64,
    pub reprobe_interval_secs: u64,
    pub reprobe_timeout_secs: u64,
    /// Keep anonymous clients off registered users' names.
    pub reserve_registered_names: bool,
    /// Message of the day shown after login.
    pub motd: Option<String>,
    /// Credential file. Without one only anonymous logins succeed.
    pub credentials: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:7395".to_string(),
            game_port: 7396,
            supported_protocol_versions: vec![0],
            idle_timeout_secs: 10,
            ping_timeout_secs: 10,
            relogin_timeout_secs: 6,
            probe_timeout_secs: 6,
            reprobe_interval_secs: 120,
            reprobe_timeout_secs: 120,
            reserve_registered_names: true,
            motd: None,
            credentials: None,
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Rejects settings the engine can't work with.
    ///
    /// All timeouts must be non-zero, and the relogin check must finish
    /// before the idle timer would ping the old session anyway.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("ping_timeout_secs", self.ping_timeout_secs),
            ("relogin_timeout_secs", self.relogin_timeout_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("reprobe_interval_secs", self.reprobe_interval_secs),
            ("reprobe_timeout_secs", self.reprobe_timeout_secs),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be positive")));
        }
        if self.relogin_timeout_secs >= self.idle_timeout_secs {
            return Err(ConfigError::Invalid(
                "relogin_timeout_secs must be shorter than idle_timeout_secs".into(),
            ));
        }
        if self.supported_protocol_versions.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_protocol_versions must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn relogin_timeout(&self) -> Duration {
        Duration::from_secs(self.relogin_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn reprobe_interval(&self) -> Duration {
        Duration::from_secs(self.reprobe_interval_secs)
    }

    pub fn reprobe_timeout(&self) -> Duration {
        Duration::from_secs(self.reprobe_timeout_secs)
    }

    pub fn supports_protocol(&self, version: u32) -> bool {
        self.supported_protocol_versions.contains(&version)
    }
}
