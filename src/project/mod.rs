//! Application model consumed by the compiler.
//!
//! A [`Project`] is the portable, declarative description of a multi-service
//! application: services with their ports, dependencies, deployment settings,
//! volume mounts and secret references, plus the project-level networks,
//! volumes and secrets they refer to. It is read from a compose-style YAML file
//! (see [`Project::load`]) or built programmatically.
//!
//! # Project File Format
//!
//! ```yaml
//! name: shop
//! services:
//!   web:
//!     image: nginx:1.27
//!     ports:
//!       - "8080:80/tcp"
//!     depends_on: [api]
//!     deploy:
//!       replicas: 4
//!       update_config:
//!         parallelism: 1
//!     secrets: [db-password]
//!     x-ecs:
//!       managed-policies:
//!         - arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess
//!   api:
//!     image: example/api:2.3
//! secrets:
//!   db-password:
//!     file: ./secrets/db-password.txt
//! x-ecs:
//!   retention-in-days: 14
//! ```
//!
//! Platform-specific knobs live under `x-ecs` blocks at project, service and
//! `update_config` level. Their recognized keys are decoded once into typed
//! views by the [`extensions`] module.
//!
//! # Ordering
//!
//! Every collection is a `BTreeMap` or `BTreeSet`, so iteration order (and with
//! it the order in which the compiler emits resources) depends only on names.

pub mod extensions;
pub mod project_io;
mod serde_helpers;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::constants::DEFAULT_NETWORK;
use crate::core::EcsgraphError;

pub use extensions::{
    AutoscalingConfig, Extensions, ProjectExtensions, ScalingMetric, ServiceExtensions,
    UpdateExtensions,
};
pub use project_io::find_project_file;
pub use validation::{CompatibilityCheck, DefaultCompatibilityCheck};

/// A named collection of services and the shared resources they use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project name, used as namespace for every generated resource.
    #[serde(default)]
    pub name: String,

    /// Services keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,

    /// Networks keyed by name.
    #[serde(default, deserialize_with = "serde_helpers::map_with_null_values")]
    pub networks: BTreeMap<String, NetworkConfig>,

    /// Volumes keyed by name.
    #[serde(default, deserialize_with = "serde_helpers::map_with_null_values")]
    pub volumes: BTreeMap<String, VolumeConfig>,

    /// Secrets keyed by name.
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretSpec>,

    /// Project-level vendor extensions.
    #[serde(default, rename = "x-ecs", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,

    /// Directory relative secret files are resolved against.
    #[serde(skip)]
    pub working_dir: Option<PathBuf>,
}

impl Project {
    /// Create an empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a service, keyed by its name.
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.insert(service.name.clone(), service);
        self
    }

    /// Add a network with default configuration.
    pub fn with_network(mut self, name: impl Into<String>) -> Self {
        self.networks.insert(name.into(), NetworkConfig::default());
        self
    }

    /// Add a volume with default configuration.
    pub fn with_volume(mut self, name: impl Into<String>) -> Self {
        self.volumes.insert(name.into(), VolumeConfig::default());
        self
    }

    /// Add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, secret: SecretSpec) -> Self {
        self.secrets.insert(name.into(), secret);
        self
    }

    /// Set a project-level extension value.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Rewrite a file-backed secret into a reference to its generated resource.
    ///
    /// This is the one place compilation rewrites the project: once the secret
    /// resource exists, later builders (the execution role policy, container
    /// secret bindings) must observe a resource reference instead of a local
    /// file path. External secrets are never rewritten.
    pub fn materialize_secret(
        &mut self,
        name: &str,
        resource: impl Into<String>,
    ) -> Result<(), EcsgraphError> {
        let secret = self.secrets.get_mut(name).ok_or_else(|| EcsgraphError::Other {
            message: format!("secret '{name}' is not declared"),
        })?;
        if secret.is_external() {
            return Err(EcsgraphError::Other {
                message: format!("external secret '{name}' cannot be materialized"),
            });
        }
        *secret = SecretSpec::Materialized {
            resource: resource.into(),
        };
        Ok(())
    }

    /// Names of every network used by at least one service, including the
    /// implicit default network.
    pub fn used_networks(&self) -> BTreeSet<String> {
        self.services.values().flat_map(Service::effective_networks).collect()
    }
}

/// A deployable unit: one container image plus how it is exposed and scaled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Service name (the key in [`Project::services`]).
    #[serde(skip)]
    pub name: String,

    /// Container image reference.
    #[serde(default)]
    pub image: String,

    /// Command override.
    #[serde(default, deserialize_with = "serde_helpers::command", skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Entrypoint override.
    #[serde(default, deserialize_with = "serde_helpers::command", skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,

    /// Environment variables, sorted by name.
    #[serde(default, deserialize_with = "serde_helpers::environment")]
    pub environment: BTreeMap<String, String>,

    /// Working directory inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// User the container runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Exposed ports, in declaration order.
    #[serde(default)]
    pub ports: Vec<ServicePort>,

    /// Services that must be running before this one.
    #[serde(default, deserialize_with = "serde_helpers::name_set")]
    pub depends_on: BTreeSet<String>,

    /// Networks the service joins. Empty means the default network.
    #[serde(default, deserialize_with = "serde_helpers::name_set")]
    pub networks: BTreeSet<String>,

    /// Deployment settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployConfig>,

    /// Volume mounts.
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,

    /// Secret references.
    #[serde(default)]
    pub secrets: Vec<SecretReference>,

    /// Service-level vendor extensions.
    #[serde(default, rename = "x-ecs", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,
}

impl Service {
    /// Create a service with just a name and image.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Self::default()
        }
    }

    /// Add an exposed port.
    pub fn with_port(mut self, port: ServicePort) -> Self {
        self.ports.push(port);
        self
    }

    /// Join a network.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.networks.insert(network.into());
        self
    }

    /// Depend on another service.
    pub fn with_dependency(mut self, service: impl Into<String>) -> Self {
        self.depends_on.insert(service.into());
        self
    }

    /// Set deployment settings.
    pub fn with_deploy(mut self, deploy: DeployConfig) -> Self {
        self.deploy = Some(deploy);
        self
    }

    /// Mount a volume.
    pub fn with_volume(mut self, mount: VolumeMount) -> Self {
        self.volumes.push(mount);
        self
    }

    /// Reference a secret by name.
    pub fn with_secret(mut self, source: impl Into<String>) -> Self {
        self.secrets.push(SecretReference {
            source: source.into(),
            target: None,
        });
        self
    }

    /// Set a service-level extension value.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Networks the service participates in, falling back to the default network.
    pub fn effective_networks(&self) -> Vec<String> {
        if self.networks.is_empty() {
            vec![DEFAULT_NETWORK.to_string()]
        } else {
            self.networks.iter().cloned().collect()
        }
    }

    /// Declared replica count, if any.
    pub fn replicas(&self) -> Option<u32> {
        self.deploy.as_ref().and_then(|deploy| deploy.replicas)
    }

    /// Whether the service must run on host-attached (EC2) capacity.
    ///
    /// Fargate cannot schedule device reservations, so any reserved device with
    /// the `gpu` capability forces host placement.
    pub fn requires_host_placement(&self) -> bool {
        self.deploy
            .as_ref()
            .and_then(|deploy| deploy.resources.as_ref())
            .and_then(|resources| resources.reservations.as_ref())
            .is_some_and(|reservations| {
                reservations.devices.iter().any(|device| {
                    device.capabilities.iter().any(|capability| capability == "gpu")
                })
            })
    }
}

/// A port exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_helpers::RawPort")]
pub struct ServicePort {
    /// Container-side port.
    pub target: u16,
    /// Platform-side port.
    pub published: u16,
    /// `tcp`, `udp`, or empty for "any".
    pub protocol: String,
}

impl ServicePort {
    /// A TCP port published on the same number.
    pub fn tcp(target: u16) -> Self {
        Self {
            target,
            published: target,
            protocol: "tcp".to_string(),
        }
    }

    /// A port with explicit target, published port and protocol.
    pub fn new(target: u16, published: u16, protocol: impl Into<String>) -> Self {
        Self {
            target,
            published,
            protocol: protocol.into(),
        }
    }
}

/// Deployment settings of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Desired number of running tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    /// Rolling update settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_config: Option<UpdateConfig>,

    /// Resource limits and reservations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl DeployConfig {
    /// Deploy settings with only a replica count.
    pub fn replicas(replicas: u32) -> Self {
        Self {
            replicas: Some(replicas),
            ..Self::default()
        }
    }
}

/// Rolling update settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Number of tasks replaced at a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,

    /// Update-level vendor extensions (`min-percent`, `max-percent`).
    #[serde(default, rename = "x-ecs", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,
}

/// Resource limits and reservations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Upper bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,

    /// Guaranteed resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservations: Option<ResourceReservations>,
}

/// CPU and memory bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Fractional CPU count.
    #[serde(default, deserialize_with = "serde_helpers::cpus", skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,

    /// Memory in bytes.
    #[serde(default, deserialize_with = "serde_helpers::memory", skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

/// Reserved resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceReservations {
    /// Fractional CPU count.
    #[serde(default, deserialize_with = "serde_helpers::cpus", skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,

    /// Memory in bytes.
    #[serde(default, deserialize_with = "serde_helpers::memory", skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    /// Device requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceRequest>,
}

/// A device reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    /// Requested capabilities, e.g. `gpu`.
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Number of devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// A project-level network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// A project-level shared volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Labels, added to the tags used to look up the backing filesystem.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// A volume mounted into a service's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_helpers::RawMount")]
pub struct VolumeMount {
    /// Project volume name.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Directory of the volume to mount instead of its root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    /// Mount read-only.
    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMount {
    /// Mount the root of a volume read-write.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            subpath: None,
            read_only: false,
        }
    }
}

/// A service's reference to a project secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "serde_helpers::RawSecretReference")]
pub struct SecretReference {
    /// Project secret name.
    pub source: String,
    /// Name exposed to the container, defaults to the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl SecretReference {
    /// Name under which the container sees the secret.
    pub fn exposed_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

/// Where a secret's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_helpers::RawSecret")]
pub enum SecretSpec {
    /// Already provisioned; referenced by name or ARN.
    External {
        /// Platform-side name. Defaults to the project secret name.
        name: Option<String>,
    },
    /// Read from a local file and materialized as a new secret resource.
    File {
        /// Path to the file holding the value.
        path: PathBuf,
    },
    /// A file-backed secret after its resource has been created.
    Materialized {
        /// Logical name of the generated secret resource.
        resource: String,
    },
}

impl SecretSpec {
    /// An external secret with an explicit platform-side name.
    pub fn external(name: impl Into<String>) -> Self {
        Self::External {
            name: Some(name.into()),
        }
    }

    /// A file-backed secret.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
        }
    }

    /// Whether the secret is provisioned outside of the template.
    pub fn is_external(&self) -> bool {
        matches!(self, SecretSpec::External { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effective_networks_default() {
        let service = Service::new("web", "nginx");
        assert_eq!(service.effective_networks(), vec!["default".to_string()]);

        let service = service.with_network("back").with_network("front");
        assert_eq!(service.effective_networks(), vec!["back".to_string(), "front".to_string()]);
    }

    #[test]
    fn test_requires_host_placement_for_gpu() {
        let mut service = Service::new("trainer", "example/trainer");
        assert!(!service.requires_host_placement());

        service.deploy = Some(DeployConfig {
            resources: Some(ResourceRequirements {
                limits: None,
                reservations: Some(ResourceReservations {
                    devices: vec![DeviceRequest {
                        capabilities: vec!["gpu".to_string()],
                        count: Some(1),
                    }],
                    ..ResourceReservations::default()
                }),
            }),
            ..DeployConfig::default()
        });
        assert!(service.requires_host_placement());
    }

    #[test]
    fn test_materialize_secret_rewrites_file_secret() {
        let mut project = Project::new("shop").with_secret("db", SecretSpec::file("db.txt"));
        project.materialize_secret("db", "dbSecret").unwrap();
        assert_eq!(
            project.secrets["db"],
            SecretSpec::Materialized {
                resource: "dbSecret".to_string()
            }
        );
    }

    #[test]
    fn test_materialize_secret_rejects_external() {
        let mut project = Project::new("shop").with_secret("db", SecretSpec::external("prod/db"));
        assert!(project.materialize_secret("db", "dbSecret").is_err());
        assert_eq!(project.secrets["db"], SecretSpec::external("prod/db"));
    }

    #[test]
    fn test_used_networks_includes_default() {
        let project = Project::new("shop")
            .with_service(Service::new("web", "nginx"))
            .with_service(Service::new("db", "postgres").with_network("back"));
        let networks: Vec<_> = project.used_networks().into_iter().collect();
        assert_eq!(networks, vec!["back".to_string(), "default".to_string()]);
    }

    #[test]
    fn test_builder_extensions() {
        let service = Service::new("web", "nginx").with_extension("pull-credentials", json!("arn:x"));
        assert_eq!(service.extensions["pull-credentials"], json!("arn:x"));
    }
}
