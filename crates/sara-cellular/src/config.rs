//! Modem configuration.
//!
//! All fields have defaults, so a YAML file only needs to name what it
//! changes:
//!
//! ```yaml
//! baud_rate: 115200
//! command_timeout_ms: 2000
//! credentials:
//!   root_ca: "amazon-root.pem"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Names of the files the module stages HTTP transfers in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingFiles {
    /// Upload source and GET response file.
    pub staging: String,
    /// POST response file.
    pub result: String,
}

impl Default for StagingFiles {
    fn default() -> Self {
        StagingFiles {
            staging: "TEMP.DAT".to_string(),
            result: "RESULT.DAT".to_string(),
        }
    }
}

/// Names of the TLS credentials stored on the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialFiles {
    pub root_ca: String,
    pub device_cert: String,
    pub device_key: String,
}

impl Default for CredentialFiles {
    fn default() -> Self {
        CredentialFiles {
            root_ca: "root-CA.pem".to_string(),
            device_cert: "deviceCert.pem".to_string(),
            device_key: "deviceCert.key".to_string(),
        }
    }
}

/// Timing and naming parameters of the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial link baud rate applied by `init`.
    pub baud_rate: u32,
    /// Timeout for ordinary command responses.
    pub command_timeout_ms: u64,
    /// Timeout for file system prompts and acknowledgments.
    pub file_timeout_ms: u64,
    /// Timeout for a single liveness probe.
    pub probe_timeout_ms: u64,
    /// Time allowed from power-on until the module must answer.
    pub boot_timeout_ms: u64,
    /// Pause between liveness probes while booting.
    pub boot_poll_interval_ms: u64,
    /// Attempts at reading a valid subscriber identity.
    pub imsi_attempts: u32,
    /// Pause between subscriber identity attempts.
    pub imsi_retry_delay_ms: u64,
    /// Pause before starting an extended network search.
    pub scan_settle_delay_ms: u64,
    /// Pause after the first scan result before aborting the search.
    pub scan_drain_delay_ms: u64,
    pub files: StagingFiles,
    pub credentials: CredentialFiles,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            baud_rate: 115_200,
            command_timeout_ms: 1_000,
            file_timeout_ms: 10_000,
            probe_timeout_ms: 500,
            boot_timeout_ms: 10_000,
            boot_poll_interval_ms: 100,
            imsi_attempts: 20,
            imsi_retry_delay_ms: 100,
            scan_settle_delay_ms: 1_000,
            scan_drain_delay_ms: 50,
            files: StagingFiles::default(),
            credentials: CredentialFiles::default(),
        }
    }
}

impl ModemConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_millis(self.file_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_millis(self.boot_timeout_ms)
    }

    pub fn boot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.boot_poll_interval_ms)
    }

    pub fn imsi_retry_delay(&self) -> Duration {
        Duration::from_millis(self.imsi_retry_delay_ms)
    }

    pub fn scan_settle_delay(&self) -> Duration {
        Duration::from_millis(self.scan_settle_delay_ms)
    }

    pub fn scan_drain_delay(&self) -> Duration {
        Duration::from_millis(self.scan_drain_delay_ms)
    }
}
