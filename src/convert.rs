//! Project-to-template conversion pipeline.
//!
//! [`Converter::convert`] runs the three stages in order:
//!
//! 1. the [`CompatibilityCheck`] rejects projects that cannot be compiled
//! 2. the [`FilesystemResolver`] resolves one filesystem per project volume
//! 3. the [`Compiler`] builds the template from the project and those ids
//!
//! Nothing is rendered unless all three succeed.

use anyhow::{Context, Result};

use crate::compiler::Compiler;
use crate::config::{CompilerConfig, OutputFormat};
use crate::core::EcsgraphError;
use crate::project::{CompatibilityCheck, DefaultCompatibilityCheck, Project};
use crate::storage::{ConfiguredFilesystems, FilesystemResolver, resolve_filesystems};
use crate::template::Template;

/// Drives a project through validation, storage resolution and compilation.
pub struct Converter<R: FilesystemResolver = ConfiguredFilesystems> {
    check: Box<dyn CompatibilityCheck>,
    resolver: R,
    region: Option<String>,
}

impl Converter<ConfiguredFilesystems> {
    /// Converter resolving volumes from the `[filesystems]` table of `config`.
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(ConfiguredFilesystems::new(config.filesystems.clone())).with_region(config.region.clone())
    }
}

impl<R: FilesystemResolver> Converter<R> {
    /// Converter with the default compatibility check.
    pub fn new(resolver: R) -> Self {
        Self {
            check: Box::new(DefaultCompatibilityCheck),
            resolver,
            region: None,
        }
    }

    /// Replace the compatibility check.
    pub fn with_check(mut self, check: Box<dyn CompatibilityCheck>) -> Self {
        self.check = check;
        self
    }

    /// Pin the container log region.
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// Run the compatibility check alone.
    pub fn validate(&self, project: &Project) -> Result<(), EcsgraphError> {
        self.check.check(project)
    }

    /// Convert `project` into a template.
    ///
    /// File-backed secrets of `project` are rewritten to reference their
    /// generated resources.
    ///
    /// # Errors
    ///
    /// Fails with the first error of any stage, wrapped with the project name.
    pub async fn convert(&self, project: &mut Project) -> Result<Template> {
        self.validate(project)
            .with_context(|| format!("Project '{}' is not compatible with ECS", project.name))?;

        let filesystems = resolve_filesystems(&self.resolver, project)
            .await
            .with_context(|| format!("Failed to resolve volumes of project '{}'", project.name))?;

        Compiler::new()
            .with_filesystems(filesystems)
            .with_region(self.region.clone())
            .compile(project)
            .with_context(|| format!("Failed to compile project '{}'", project.name))
    }
}

/// Serialize a template in the requested format.
pub fn render(template: &Template, format: OutputFormat) -> Result<String, EcsgraphError> {
    match format {
        OutputFormat::Json => template.to_json(),
        OutputFormat::Yaml => template.to_yaml(),
    }
}
