//! TOML parsing for configuration files.

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a TOML configuration file into `T`.
///
/// # Errors
///
/// Fails when the file cannot be read or its content does not match `T`. Both
/// errors carry the file path as context.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
