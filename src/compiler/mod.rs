//! The template assembler.
//!
//! [`Compiler::compile`] turns a validated [`Project`] into a [`Template`]. It
//! owns the [`ResourceGraph`] for the whole compilation and lends it to each
//! builder in turn:
//!
//! 1. project-level inputs ([`ResourceContext::ensure`]): cluster, network
//!    security groups, load balancer, VPC and subnet parameters
//! 2. project-scoped resources: secrets, log group, volume attachments, the
//!    discovery namespace
//! 3. per service, in name order: roles, task definition, port exposure,
//!    dependencies, rolling-update bounds, discovery entry, the service, and
//!    autoscaling
//! 4. closure and cycle checks
//!
//! Any error aborts the whole compilation. `compile` consumes the compiler, so
//! a partially built graph can never be observed.
//!
//! # Secret Materialization
//!
//! The secret step reads every file-backed secret, declares a secret resource
//! holding its content and then rewrites the project entry through
//! [`Project::materialize_secret`]. This is the only change the compiler makes
//! to its input; it lets the permission and compute builders reference the
//! generated resource instead of a local path. The rewrite is applied to a copy
//! of the project and handed back only once the whole compilation succeeded.

pub mod context;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::builders::autoscaling::{AutoscalingPolicyBuilder, TargetTrackingAutoscaling};
use crate::builders::compute::{self, ServiceInputs, TaskRoles};
use crate::builders::{discovery, exposure, permissions, project_tags, rolling_update, storage, Tag};
use crate::constants::{LOG_GROUP_RESOURCE, resource_types};
use crate::core::{EcsgraphError, FileOps};
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::{Project, ProjectExtensions, SecretSpec, Service, ServiceExtensions};
use crate::template::Template;
pub use context::{LoadBalancerKind, ResourceContext};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogGroupProperties {
    log_group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retention_in_days: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecretProperties {
    description: String,
    secret_string: String,
    tags: Vec<Tag>,
}

/// Compiles one project into a template.
pub struct Compiler {
    graph: ResourceGraph,
    context: ResourceContext,
    autoscaling: Box<dyn AutoscalingPolicyBuilder>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Compiler without shared volumes and with target-tracking autoscaling.
    pub fn new() -> Self {
        Self {
            graph: ResourceGraph::new(),
            context: ResourceContext::default(),
            autoscaling: Box::new(TargetTrackingAutoscaling),
        }
    }

    /// Use filesystem ids resolved ahead of compilation, keyed by volume name.
    pub fn with_filesystems(mut self, filesystems: BTreeMap<String, String>) -> Self {
        self.context.filesystems = filesystems;
        self
    }

    /// Pin the log region instead of using the stack's region.
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.context.region = region;
        self
    }

    /// Replace the autoscaling builder.
    pub fn with_autoscaling(mut self, builder: Box<dyn AutoscalingPolicyBuilder>) -> Self {
        self.autoscaling = builder;
        self
    }

    /// Compile `project` into a complete template.
    ///
    /// File-backed secrets of `project` are rewritten to reference their
    /// generated resources (see the module documentation). The rewrite happens
    /// on a working copy that replaces `project` only when compilation succeeds.
    ///
    /// # Errors
    ///
    /// - [`EcsgraphError::ConfigurationError`] / [`EcsgraphError::ExtensionTypeError`]
    ///   for invalid deployment settings
    /// - [`EcsgraphError::SecretReadError`] when a secret file cannot be read
    /// - [`EcsgraphError::ProvisioningError`] when a volume has no filesystem
    /// - [`EcsgraphError::DuplicateResource`], [`EcsgraphError::MissingDependency`]
    ///   or [`EcsgraphError::CircularDependency`] when the graph is inconsistent
    pub fn compile(mut self, project: &mut Project) -> Result<Template, EcsgraphError> {
        let mut working = project.clone();
        self.assemble(&mut working)?;
        *project = working;
        Ok(Template::new(&project.name, self.context.parameters, self.graph))
    }

    fn assemble(&mut self, project: &mut Project) -> Result<(), EcsgraphError> {
        tracing::info!("Compiling project '{}' ({} services)", project.name, project.services.len());
        let extensions = ProjectExtensions::decode(project)?;

        self.context.ensure(&mut self.graph, project, &extensions)?;
        self.create_secrets(project)?;
        self.create_log_group(project, &extensions)?;
        storage::build_filesystem_resources(&mut self.graph, &self.context, project)?;
        discovery::create_cloud_map(&mut self.graph, &self.context, project)?;

        for service in project.services.values() {
            self.compile_service(project, service)?;
        }

        self.graph.validate_closure()?;
        self.graph.deployment_order()?;
        tracing::info!("Compiled {} resources for project '{}'", self.graph.len(), project.name);
        Ok(())
    }

    fn create_secrets(&mut self, project: &mut Project) -> Result<(), EcsgraphError> {
        let file_backed: Vec<(String, std::path::PathBuf)> = project
            .secrets
            .iter()
            .filter_map(|(name, secret)| match secret {
                SecretSpec::File {
                    path,
                } => Some((name.clone(), path.clone())),
                _ => None,
            })
            .collect();

        for (name, path) in file_backed {
            let path = match &project.working_dir {
                Some(dir) if path.is_relative() => dir.join(&path),
                _ => path,
            };
            let content = read_secret(&name, &path)?;

            let logical = LogicalName::Secret(&name).allocate();
            let properties = SecretProperties {
                description: format!("Secret {name}"),
                secret_string: content,
                tags: project_tags(&project.name),
            };
            self.graph.insert(&logical, Resource::new(resource_types::SECRET, &properties)?)?;
            project.materialize_secret(&name, logical)?;
        }
        Ok(())
    }

    fn create_log_group(&mut self, project: &Project, extensions: &ProjectExtensions) -> Result<(), EcsgraphError> {
        let properties = LogGroupProperties {
            log_group_name: format!("/docker-compose/{}", project.name),
            retention_in_days: extensions.retention_in_days.filter(|days| *days > 0),
        };
        self.graph.insert(LOG_GROUP_RESOURCE, Resource::new(resource_types::LOG_GROUP, &properties)?)
    }

    fn compile_service(&mut self, project: &Project, service: &Service) -> Result<(), EcsgraphError> {
        // settings errors surface before anything is declared for the service
        let extensions = ServiceExtensions::decode(service)?;
        let limits = rolling_update::resolve(service)?;

        let execution_role = permissions::build_execution_role(&mut self.graph, project, service, &extensions)?;
        let task_role = permissions::build_task_role(&mut self.graph, project, service, &extensions)?;
        let roles = TaskRoles {
            execution: &execution_role,
            task: task_role.as_deref(),
        };
        let task_definition =
            compute::build_task_definition(&mut self.graph, &self.context, project, service, &extensions, roles)?;

        let exposure = exposure::build_exposure(&mut self.graph, &self.context, project, service)?;
        let mut dependencies = exposure.listeners;
        dependencies.extend(service.depends_on.iter().map(|dependency| LogicalName::Service(dependency).allocate()));
        for mount in &service.volumes {
            dependencies.extend(storage::mount_targets(&self.context, &mount.source));
        }

        let registry = discovery::create_service_registry(&mut self.graph, service)?;
        let inputs = ServiceInputs {
            task_definition,
            load_balancers: exposure.registrations,
            registry,
            limits,
            dependencies,
        };
        compute::build_service(&mut self.graph, &self.context, project, service, inputs)?;

        if let Some(config) = &extensions.autoscaling {
            self.autoscaling.build(&mut self.graph, &self.context, project, service, config)?;
        }
        tracing::info!(
            "Compiled service '{}' (bounds {}%..{}%)",
            service.name,
            limits.min_percent,
            limits.max_percent
        );
        Ok(())
    }
}

fn read_secret(name: &str, path: &Path) -> Result<String, EcsgraphError> {
    FileOps::read_with_context(path, &format!("secret '{name}'")).map_err(|e| EcsgraphError::SecretReadError {
        secret: name.to_string(),
        message: e.user_message(),
    })
}
