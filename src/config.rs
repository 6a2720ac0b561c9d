//! Configuration module for Rustinfra.
//!
//! Handles the global run configuration: concurrency, command timeout and
//! default execution arguments. Values can be loaded from a TOML file or
//! built programmatically; every field has a sensible default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Global run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum concurrent fact resolutions across hosts.
    pub forks: usize,

    /// Default command timeout in seconds.
    pub timeout: u64,

    /// Treat fact failures as warnings instead of failing the host.
    pub ignore_errors: bool,

    /// Run fact commands under sudo by default.
    pub sudo: bool,

    /// Default sudo target user.
    pub sudo_user: Option<String>,

    /// Default su target user.
    pub su_user: Option<String>,

    /// Default shell used to execute commands; `None` means the transport
    /// default (`sh`).
    pub shell_executable: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forks: 5,
            timeout: 10,
            ignore_errors: false,
            sudo: false,
            sudo_user: None,
            su_user: None,
            shell_executable: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.forks == 0 {
            return Err(Error::Config("forks must be at least 1".to_string()));
        }
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be at least 1 second".to_string()));
        }
        Ok(())
    }
}
