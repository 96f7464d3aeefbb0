//! Task definitions and service declarations.
//!
//! The task definition describes the single essential container of a service:
//! image, command, environment, port mappings, secrets, volume mounts and log
//! delivery. The service declaration keeps the desired number of those tasks
//! running and wires them to the load balancer, the discovery registry and the
//! project subnets.
//!
//! # Launch Type
//!
//! Services run on Fargate unless they reserve a GPU, in which case they need
//! host (EC2) capacity. The two are mutually exclusive in several places:
//!
//! | | Fargate | EC2 |
//! |-|---------|-----|
//! | `LaunchType` | `FARGATE` | `EC2` |
//! | `PlatformVersion` | pinned | absent |
//! | `AssignPublicIp` | `ENABLED` | `DISABLED` |
//! | task size | from the Fargate size table | limits as declared |

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::discovery::ServiceRegistry;
use super::exposure::LoadBalancerRegistration;
use super::permissions::secret_value_from;
use super::rolling_update::RollingUpdateLimits;
use super::storage::filesystem_id;
use super::{Tag, service_tags};
use crate::compiler::context::ResourceContext;
use crate::constants::{
    DEFAULT_DESIRED_COUNT, FARGATE_PLATFORM_VERSION, FARGATE_SIZES, LOG_GROUP_RESOURCE,
    resource_types,
};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::reference;
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::{Project, ResourceLimits, Service, ServiceExtensions, VolumeMount};

/// Where a service's tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchType {
    /// Fully managed capacity.
    Fargate,
    /// Host capacity registered with the cluster.
    Ec2,
}

impl LaunchType {
    /// Launch type required by a service.
    pub fn for_service(service: &Service) -> Self {
        if service.requires_host_placement() { Self::Ec2 } else { Self::Fargate }
    }

    /// Value of `LaunchType` and `RequiresCompatibilities`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchType::Fargate => "FARGATE",
            LaunchType::Ec2 => "EC2",
        }
    }
}

/// Smallest Fargate task size (CPU units, MiB) that fits the requested limits.
///
/// Returns the minimum size when nothing is requested and `None` when the
/// request exceeds the largest size.
pub fn fargate_size(cpus: Option<f64>, memory_bytes: Option<u64>) -> Option<(u32, u32)> {
    let cpu_units = cpus.map(|cpus| (cpus * 1024.0).ceil() as u32).unwrap_or(0);
    let memory_mib = memory_bytes.map(|bytes| bytes.div_ceil(1 << 20) as u32).unwrap_or(0);

    FARGATE_SIZES.iter().filter(|(cpu, _)| *cpu >= cpu_units).find_map(|(cpu, memories)| {
        memories.iter().find(|memory| **memory >= memory_mib).map(|memory| (*cpu, *memory))
    })
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TaskDefinitionProperties {
    container_definitions: Vec<ContainerDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<String>,
    execution_role_arn: Value,
    family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<String>,
    network_mode: &'static str,
    requires_compatibilities: Vec<&'static str>,
    tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_role_arn: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<TaskVolume>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_point: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<KeyValuePair>,
    essential: bool,
    image: String,
    log_configuration: LogConfiguration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mount_points: Vec<MountPoint>,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    port_mappings: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository_credentials: Option<RepositoryCredentials>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resource_requirements: Vec<ResourceRequirement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secrets: Vec<ContainerSecret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_directory: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyValuePair {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogConfiguration {
    log_driver: &'static str,
    options: BTreeMap<&'static str, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PortMapping {
    container_port: u16,
    host_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MountPoint {
    container_path: String,
    read_only: bool,
    source_volume: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSecret {
    name: String,
    value_from: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RepositoryCredentials {
    credentials_parameter: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRequirement {
    #[serde(rename = "Type")]
    requirement_type: &'static str,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TaskVolume {
    #[serde(rename = "EFSVolumeConfiguration")]
    efs_volume_configuration: EfsVolumeConfiguration,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EfsVolumeConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_config: Option<AuthorizationConfig>,
    filesystem_id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_directory: Option<String>,
    transit_encryption: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AuthorizationConfig {
    access_point_id: Value,
}

/// Roles attached to a task definition.
#[derive(Debug, Clone, Copy)]
pub struct TaskRoles<'a> {
    /// Execution role, always present.
    pub execution: &'a str,
    /// Task role, when the service asked for one.
    pub task: Option<&'a str>,
}

/// Task volume name of a mount. Mounts of a subpath get a volume of their own.
fn task_volume_name(mount: &VolumeMount) -> String {
    match &mount.subpath {
        None => mount.source.clone(),
        Some(subpath) => {
            let suffix: String = subpath
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect();
            format!("{}_{}", mount.source, suffix.trim_matches('_'))
        }
    }
}

/// Subpath as the root directory of its task volume.
fn root_directory(mount: &VolumeMount) -> Option<String> {
    mount.subpath.as_ref().map(|subpath| format!("/{}", subpath.trim_start_matches('/')))
}

fn task_volumes(context: &ResourceContext, service: &Service) -> Result<Vec<TaskVolume>, EcsgraphError> {
    let mut volumes = BTreeMap::new();
    let mut claimed: BTreeMap<String, (&str, Option<String>)> = BTreeMap::new();
    for mount in &service.volumes {
        let name = task_volume_name(mount);
        let root = root_directory(mount);
        if let Some((source, existing)) = claimed.get(&name) {
            if *source == mount.source && *existing == root {
                continue;
            }
            return Err(EcsgraphError::ConfigurationError {
                service: service.name.clone(),
                reason: format!(
                    "mounts of '{}' at {} and '{}' at {} both map to task volume '{}'",
                    source,
                    existing.as_deref().unwrap_or("/"),
                    mount.source,
                    root.as_deref().unwrap_or("/"),
                    name
                ),
            });
        }
        claimed.insert(name.clone(), (&mount.source, root.clone()));
        // an access point pins the root directory, so subpath mounts go without one
        let configuration = match &mount.subpath {
            None => EfsVolumeConfiguration {
                authorization_config: Some(AuthorizationConfig {
                    access_point_id: reference(&LogicalName::Volume(&mount.source).allocate()),
                }),
                filesystem_id: filesystem_id(context, &mount.source)?,
                root_directory: None,
                transit_encryption: "ENABLED",
            },
            Some(_) => EfsVolumeConfiguration {
                authorization_config: None,
                filesystem_id: filesystem_id(context, &mount.source)?,
                root_directory: root,
                transit_encryption: "ENABLED",
            },
        };
        volumes.insert(name.clone(), TaskVolume {
            efs_volume_configuration: configuration,
            name,
        });
    }
    Ok(volumes.into_values().collect())
}

fn gpu_requirements(service: &Service) -> Vec<ResourceRequirement> {
    let gpus: u32 = service
        .deploy
        .iter()
        .filter_map(|deploy| deploy.resources.as_ref())
        .filter_map(|resources| resources.reservations.as_ref())
        .flat_map(|reservations| &reservations.devices)
        .filter(|device| device.capabilities.iter().any(|capability| capability == "gpu"))
        .map(|device| device.count.unwrap_or(1))
        .sum();
    if gpus == 0 {
        Vec::new()
    } else {
        vec![ResourceRequirement {
            requirement_type: "GPU",
            value: gpus.to_string(),
        }]
    }
}

/// Limits used to size the task: declared limits, falling back to reservations.
fn requested_resources(service: &Service) -> ResourceLimits {
    let Some(resources) = service.deploy.as_ref().and_then(|deploy| deploy.resources.as_ref()) else {
        return ResourceLimits::default();
    };
    let limits = resources.limits.clone().unwrap_or_default();
    let reservations = resources.reservations.as_ref();
    ResourceLimits {
        cpus: limits.cpus.or_else(|| reservations.and_then(|r| r.cpus)),
        memory: limits.memory.or_else(|| reservations.and_then(|r| r.memory)),
    }
}

fn task_size(service: &Service, launch_type: LaunchType) -> Result<(Option<String>, Option<String>), EcsgraphError> {
    let requested = requested_resources(service);
    match launch_type {
        LaunchType::Fargate => {
            let (cpu, memory) = fargate_size(requested.cpus, requested.memory).ok_or_else(|| {
                EcsgraphError::configuration(
                    &service.name,
                    "requested cpu and memory exceed every supported Fargate task size",
                )
            })?;
            Ok((Some(cpu.to_string()), Some(memory.to_string())))
        }
        LaunchType::Ec2 => Ok((
            requested.cpus.map(|cpus| ((cpus * 1024.0).ceil() as u32).to_string()),
            requested.memory.map(|bytes| bytes.div_ceil(1 << 20).to_string()),
        )),
    }
}

/// Declare the task definition of a service. Returns its logical name.
pub fn build_task_definition(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    project: &Project,
    service: &Service,
    extensions: &ServiceExtensions,
    roles: TaskRoles<'_>,
) -> Result<String, EcsgraphError> {
    let launch_type = LaunchType::for_service(service);
    let (cpu, memory) = task_size(service, launch_type)?;

    let mut log_options = BTreeMap::new();
    log_options.insert("awslogs-group", reference(LOG_GROUP_RESOURCE));
    log_options.insert("awslogs-region", context.log_region());
    log_options.insert("awslogs-stream-prefix", json!(project.name));

    let secrets = service
        .secrets
        .iter()
        .map(|secret| {
            Ok(ContainerSecret {
                name: secret.exposed_name().to_string(),
                value_from: secret_value_from(project, &secret.source)?,
            })
        })
        .collect::<Result<Vec<_>, EcsgraphError>>()?;

    let container = ContainerDefinition {
        command: service.command.clone(),
        entry_point: service.entrypoint.clone(),
        environment: service
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        essential: true,
        image: service.image.clone(),
        log_configuration: LogConfiguration {
            log_driver: "awslogs",
            options: log_options,
        },
        mount_points: service
            .volumes
            .iter()
            .map(|mount| MountPoint {
                container_path: mount.target.clone(),
                read_only: mount.read_only,
                source_volume: task_volume_name(mount),
            })
            .collect(),
        name: service.name.clone(),
        port_mappings: service
            .ports
            .iter()
            .map(|port| PortMapping {
                container_port: port.target,
                host_port: port.target,
                protocol: (!port.protocol.is_empty()).then(|| port.protocol.to_lowercase()),
            })
            .collect(),
        repository_credentials: extensions.pull_credentials.as_ref().map(|arn| RepositoryCredentials {
            credentials_parameter: arn.clone(),
        }),
        resource_requirements: gpu_requirements(service),
        secrets,
        user: service.user.clone(),
        working_directory: service.working_dir.clone(),
    };

    let properties = TaskDefinitionProperties {
        container_definitions: vec![container],
        cpu,
        execution_role_arn: reference(roles.execution),
        family: format!("{}-{}", project.name, service.name),
        memory,
        network_mode: "awsvpc",
        requires_compatibilities: vec![launch_type.as_str()],
        tags: service_tags(&project.name, &service.name),
        task_role_arn: roles.task.map(reference),
        volumes: task_volumes(context, service)?,
    };
    let name = LogicalName::TaskDefinition(&service.name).allocate();
    graph.insert(&name, Resource::new(resource_types::TASK_DEFINITION, &properties)?)?;
    Ok(name)
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceProperties {
    cluster: Value,
    deployment_configuration: DeploymentConfiguration,
    deployment_controller: DeploymentController,
    desired_count: u32,
    launch_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    load_balancers: Vec<LoadBalancerRegistration>,
    network_configuration: NetworkConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform_version: Option<&'static str>,
    propagate_tags: &'static str,
    scheduling_strategy: &'static str,
    service_registries: Vec<ServiceRegistry>,
    tags: Vec<Tag>,
    task_definition: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeploymentConfiguration {
    maximum_percent: u32,
    minimum_healthy_percent: u32,
}

#[derive(Serialize)]
struct DeploymentController {
    #[serde(rename = "Type")]
    controller_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkConfiguration {
    awsvpc_configuration: AwsvpcConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AwsvpcConfiguration {
    assign_public_ip: &'static str,
    security_groups: Vec<Value>,
    subnets: Vec<Value>,
}

/// Everything the service declaration is assembled from.
#[derive(Debug, Clone)]
pub struct ServiceInputs {
    /// Task definition logical name.
    pub task_definition: String,
    /// Load balancer registrations.
    pub load_balancers: Vec<LoadBalancerRegistration>,
    /// Discovery registration.
    pub registry: ServiceRegistry,
    /// Deployment bounds.
    pub limits: RollingUpdateLimits,
    /// Listeners, dependent services and mount targets.
    pub dependencies: Vec<String>,
}

/// Declare the service itself. Returns its logical name.
pub fn build_service(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    project: &Project,
    service: &Service,
    inputs: ServiceInputs,
) -> Result<String, EcsgraphError> {
    let launch_type = LaunchType::for_service(service);
    let (assign_public_ip, platform_version) = match launch_type {
        LaunchType::Fargate => ("ENABLED", Some(FARGATE_PLATFORM_VERSION)),
        LaunchType::Ec2 => ("DISABLED", None),
    };

    let properties = ServiceProperties {
        cluster: context.cluster.clone(),
        deployment_configuration: DeploymentConfiguration {
            maximum_percent: inputs.limits.max_percent,
            minimum_healthy_percent: inputs.limits.min_percent,
        },
        deployment_controller: DeploymentController {
            controller_type: "ECS",
        },
        desired_count: service.replicas().unwrap_or(DEFAULT_DESIRED_COUNT),
        launch_type: launch_type.as_str(),
        load_balancers: inputs.load_balancers,
        network_configuration: NetworkConfiguration {
            awsvpc_configuration: AwsvpcConfiguration {
                assign_public_ip,
                security_groups: context.service_security_groups(&service.effective_networks())?,
                subnets: context.subnet_ids(),
            },
        },
        platform_version,
        propagate_tags: "SERVICE",
        scheduling_strategy: "REPLICA",
        service_registries: vec![inputs.registry],
        tags: service_tags(&project.name, &service.name),
        task_definition: reference(&inputs.task_definition),
    };
    let name = LogicalName::Service(&service.name).allocate();
    graph.insert(
        &name,
        Resource::new(resource_types::SERVICE, &properties)?.depending_on(inputs.dependencies),
    )?;
    Ok(name)
}
