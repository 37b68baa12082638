//! Taskweave Configuration Module
//!
//! Config is stored in `~/.config/taskweave/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables (`WORKFLOW_GATEWAY_URL`, `WORKFLOW_GATEWAY_TOKEN`,
//!    `TASKWEAVE_MAX_ITERATIONS`)
//! 3. Config file
//! 4. Defaults
//!
//! ```toml
//! [gateway]
//! url = "https://gateway.internal"
//! timeout_secs = 15
//!
//! [refine]
//! max_iterations = 5
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, WeaveError};
use crate::refine::RefinementConfig;

pub const ENV_GATEWAY_URL: &str = "WORKFLOW_GATEWAY_URL";
pub const ENV_GATEWAY_TOKEN: &str = "WORKFLOW_GATEWAY_TOKEN";
pub const ENV_MAX_ITERATIONS: &str = "TASKWEAVE_MAX_ITERATIONS";

pub const DEFAULT_VALIDATE_PATH: &str = "/api/v1/workflows/validate";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeaveConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub refine: RefinementConfig,
}

/// Remote validation gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://gateway.internal`
    pub url: Option<String>,

    /// Sent as a bearer token when present
    pub token: Option<String>,

    pub timeout_secs: u64,

    /// Joined onto `url`
    pub validate_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            validate_path: DEFAULT_VALIDATE_PATH.to_string(),
        }
    }
}

impl WeaveConfig {
    /// Returns `~/.config/taskweave/` on Unix, `%APPDATA%/taskweave/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskweave")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| WeaveError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WeaveError::Config {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env`](Self::with_env) with an explicit variable source
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(url) = non_empty(ENV_GATEWAY_URL) {
            self.gateway.url = Some(url);
        }
        if let Some(token) = non_empty(ENV_GATEWAY_TOKEN) {
            self.gateway.token = Some(token);
        }
        if let Some(raw) = non_empty(ENV_MAX_ITERATIONS) {
            match raw.parse::<usize>() {
                Ok(max) => self.refine.max_iterations = max,
                Err(_) => warn!(value = %raw, "Ignoring non-numeric {}", ENV_MAX_ITERATIONS),
            }
        }

        self
    }
}
