//! ecsgraph - compose projects to ECS infrastructure templates
//!
//! ecsgraph reads a compose-style project (services, networks, volumes and
//! secrets, plus `x-ecs` extension settings) and compiles it into a
//! CloudFormation template that runs the project on ECS: one task definition
//! and service per compose service, with the roles, security groups, load
//! balancer listeners, discovery entries and log group they need.
//!
//! # Architecture Overview
//!
//! A conversion runs in three stages:
//!
//! 1. [`project::CompatibilityCheck`] rejects projects that cannot be compiled
//! 2. [`storage::resolve_filesystems`] finds the filesystem behind every volume
//! 3. [`compiler::Compiler`] builds a [`graph::ResourceGraph`] and wraps it in
//!    a [`template::Template`]
//!
//! [`convert::Converter`] chains the three. Compilation is deterministic: the
//! same project always yields byte-identical output.
//!
//! # Core Modules
//!
//! - [`project`] - the project model, YAML loading and compatibility checks
//! - [`compiler`] - the template assembler and the project-level context
//! - [`builders`] - per-concern resource builders (permissions, exposure,
//!   discovery, compute, storage, autoscaling, rolling updates)
//! - [`graph`] - the resource graph, intrinsic functions, dependency ordering
//! - [`naming`] - logical resource name allocation
//! - [`template`] - the rendered template document
//!
//! ## Supporting Modules
//!
//! - [`cli`] - the `ecsgraph` command line
//! - [`config`] - user configuration (`~/.ecsgraph/config.toml`)
//! - [`core`] - error types and file operation helpers
//! - [`storage`] - filesystem resolution for project volumes
//! - [`constants`] - resource types, principals and other fixed values
//!
//! # Example
//!
//! ```rust,no_run
//! use ecsgraph::convert::{Converter, render};
//! use ecsgraph::config::{CompilerConfig, OutputFormat};
//! use ecsgraph::project::Project;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CompilerConfig::load_with_optional(None).await?;
//! let mut project = Project::load(Path::new("compose.yaml"))?;
//! let template = Converter::from_config(&config).convert(&mut project).await?;
//! println!("{}", render(&template, OutputFormat::Yaml)?);
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod convert;
pub mod core;
pub mod graph;
pub mod naming;
pub mod project;
pub mod storage;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
