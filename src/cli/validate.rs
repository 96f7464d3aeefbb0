//! `ecsgraph validate`: check that a project can be compiled.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::CompilerConfig;
use crate::convert::Converter;
use crate::project::Project;
use crate::project::project_io::find_project_file_with_optional;

/// Validate a project file.
///
/// By default only the compatibility check runs. `--compile` additionally
/// performs a full conversion and discards the template, which also catches
/// deployment settings and unresolved volumes.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Project file to validate.
    ///
    /// When omitted, `compose.yaml` (or one of its variants) is searched for in
    /// the current directory and its parents.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Also compile the project.
    #[arg(long)]
    pub compile: bool,
}

impl ValidateCommand {
    /// Run validation with the loaded configuration.
    pub async fn execute_with_config(self, config: &CompilerConfig) -> Result<()> {
        let path = find_project_file_with_optional(self.file)?;
        let mut project = Project::load(&path)?;
        let converter = Converter::from_config(config);

        converter.validate(&project)?;
        println!("{} Project '{}' is compatible", "✓".green(), project.name);
        println!("  Services: {}", project.services.len());
        println!("  Networks: {}", project.used_networks().len());
        println!("  Volumes: {}", project.volumes.len());
        println!("  Secrets: {}", project.secrets.len());

        if self.compile {
            let template = converter.convert(&mut project).await?;
            println!("{} Compiles to {} resources", "✓".green(), template.resources.len());
        }
        Ok(())
    }
}
