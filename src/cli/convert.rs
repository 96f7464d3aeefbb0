//! `ecsgraph convert`: compile a project file into a template.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{CompilerConfig, OutputFormat};
use crate::convert::{Converter, render};
use crate::core::FileOps;
use crate::project::Project;
use crate::project::project_io::find_project_file_with_optional;

/// Compile a project into a template.
#[derive(Args, Debug)]
pub struct ConvertCommand {
    /// Project file to compile.
    ///
    /// When omitted, `compose.yaml` (or one of its variants) is searched for in
    /// the current directory and its parents.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Output format; defaults to the `output` setting of the configuration.
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write the template to this file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl ConvertCommand {
    /// Run the conversion with the loaded configuration.
    pub async fn execute_with_config(self, config: &CompilerConfig) -> Result<()> {
        let path = find_project_file_with_optional(self.file)?;
        let mut project = Project::load(&path)?;

        let template = Converter::from_config(config).convert(&mut project).await?;
        let rendered = render(&template, self.format.unwrap_or(config.output))?;

        match self.output {
            Some(output) => {
                FileOps::write_with_context(&output, &rendered, "writing template")
                    .await
                    .with_context(|| format!("Failed to write template for project '{}'", project.name))?;
                eprintln!(
                    "{} Wrote {} resources to {}",
                    "✓".green(),
                    template.resources.len(),
                    output.display()
                );
            }
            None => {
                print!("{rendered}");
                if !rendered.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
