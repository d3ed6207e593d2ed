//! Client configuration.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use diaglink_logcat::DEFAULT_CAPTURE_COMMAND;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::trust::COMPANION_FINGERPRINTS;

/// Environment variable pointing at a JSON config file.
pub const CONFIG_ENV: &str = "DIAGLINK_CONFIG";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Host package identity.
    pub package: String,
    /// Metadata sent with the handshake.
    pub metadata: HashMap<String, Value>,
    pub trust: TrustConfig,
    pub log_relay: LogRelayConfig,
    /// Install the process-wide panic hook.
    pub crash_reporting: bool,
    /// Upper bound on how long a crash report may delay the panic hook chain.
    pub crash_report_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            package: default_package(),
            metadata: HashMap::new(),
            trust: TrustConfig::default(),
            log_relay: LogRelayConfig::default(),
            crash_reporting: true,
            crash_report_timeout_ms: 2_000,
        }
    }
}

/// Companion trust settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrustConfig {
    /// Accepted credential fingerprints (hex SHA-1).
    pub fingerprints: Vec<String>,
    /// Where the companion's credential is read from.
    pub credential_path: Option<PathBuf>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            fingerprints: COMPANION_FINGERPRINTS.iter().map(|f| (*f).to_string()).collect(),
            credential_path: None,
        }
    }
}

impl TrustConfig {
    /// Configured credential path, or the per-user default.
    #[must_use]
    pub fn credential_path(&self) -> PathBuf {
        self.credential_path
            .clone()
            .unwrap_or_else(default_credential_path)
    }
}

/// Log relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogRelayConfig {
    /// Advertise the relay capability to the companion.
    pub enabled: bool,
    /// Capture command line.
    pub command: String,
    /// Extra arguments appended to the command, typically filter specs.
    pub filters: Vec<String>,
}

impl Default for LogRelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: DEFAULT_CAPTURE_COMMAND.to_string(),
            filters: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is not valid config JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Load from `DIAGLINK_CONFIG` if set, defaults otherwise.
    ///
    /// # Errors
    /// Returns error if the referenced file cannot be read or parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    #[must_use]
    pub const fn crash_report_timeout(&self) -> Duration {
        Duration::from_millis(self.crash_report_timeout_ms)
    }
}

fn default_package() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-user location of the companion credential.
#[must_use]
pub fn default_credential_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("diaglink")
        .join("companion.cred")
}
