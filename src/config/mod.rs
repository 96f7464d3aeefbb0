//! User configuration for ecsgraph.
//!
//! The configuration lives in `~/.ecsgraph/config.toml` (`%LOCALAPPDATA%\ecsgraph`
//! on Windows). The location can be overridden with the `ECSGRAPH_CONFIG`
//! environment variable or the `--config` flag. A missing file is not an
//! error; every setting has a default.
//!
//! ```toml
//! # Default output format of `ecsgraph convert`
//! output = "yaml"
//!
//! # Pin the container log region instead of using the stack's region
//! region = "eu-west-1"
//!
//! # Filesystems backing project volumes, by volume name
//! [filesystems]
//! data = "fs-0123456789abcdef0"
//! ```

pub mod parser;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub use parser::parse_config;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "ECSGRAPH_CONFIG";

/// Serialization format of a rendered template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

/// Settings read from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Volume name → id of the filesystem backing it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filesystems: BTreeMap<String, String>,

    /// Region the container log driver writes to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Format used when `convert` is not given `--format`.
    pub output: OutputFormat,
}

impl CompilerConfig {
    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `None`. Missing files yield the defaults.
    ///
    /// # Errors
    ///
    /// Fails when an existing file cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load and parse the file at `path`.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Location of the configuration file: `ECSGRAPH_CONFIG` when set,
    /// otherwise the per-user default.
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("ecsgraph")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".ecsgraph")
        };

        Ok(config_dir.join("config.toml"))
    }
}
