//! Command-line interface for ecsgraph.
//!
//! # Commands
//!
//! - `convert` - compile a project file into a template (JSON or YAML)
//! - `validate` - check that a project can be compiled
//!
//! # Global Options
//!
//! - `--verbose` - enable debug logging
//! - `--quiet` - log errors only
//! - `--config` - use a specific configuration file
//!
//! Logs are written to stderr so a template printed on stdout can be piped
//! straight into other tools. `RUST_LOG` takes precedence over both flags.
//!
//! # Examples
//!
//! ```bash
//! ecsgraph convert                          # compose.yaml in the current directory
//! ecsgraph convert app/compose.yaml -f yaml # explicit file, YAML output
//! ecsgraph convert -o stack.json            # write to a file
//! ecsgraph --verbose validate               # debug logs while validating
//! ```

mod convert;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{CONFIG_ENV, CompilerConfig};

pub use convert::ConvertCommand;
pub use validate::ValidateCommand;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Explicit configuration file, overriding the default location.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global `tracing` subscriber. Later calls are no-ops.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&self.log_level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Compose to ECS template compiler.
#[derive(Parser)]
#[command(
    name = "ecsgraph",
    about = "Compile compose projects into ECS infrastructure templates",
    version,
    author,
    long_about = "ecsgraph turns a compose-style project file into a dependency-ordered CloudFormation template that runs the project on ECS."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file.
    ///
    /// Defaults to `~/.ecsgraph/config.toml`; a missing file means defaults.
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a project file into a template.
    ///
    /// See [`ConvertCommand`] for options.
    Convert(ConvertCommand),

    /// Check that a project file can be compiled.
    ///
    /// See [`ValidateCommand`] for options.
    Validate(ValidateCommand),
}

impl Cli {
    /// Execute the parsed command line.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let settings = CompilerConfig::load_with_optional(config.config_path.clone()).await?;

        match self.command {
            Commands::Convert(cmd) => cmd.execute_with_config(&settings).await,
            Commands::Validate(cmd) => cmd.execute_with_config(&settings).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_levels() {
        let cli = Cli::parse_from(["ecsgraph", "--verbose", "validate"]);
        assert_eq!(cli.build_config().log_level, "debug");

        let cli = Cli::parse_from(["ecsgraph", "validate", "--quiet"]);
        assert_eq!(cli.build_config().log_level, "error");

        let cli = Cli::parse_from(["ecsgraph", "convert"]);
        let config = cli.build_config();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::parse_from(["ecsgraph", "--config", "/tmp/ecsgraph.toml", "convert"]);
        assert_eq!(cli.build_config().config_path, Some(PathBuf::from("/tmp/ecsgraph.toml")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["ecsgraph", "-v", "-q", "convert"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
