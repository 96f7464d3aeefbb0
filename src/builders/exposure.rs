//! Port exposure: ingress rules, target groups and listeners.
//!
//! For every port a service exposes, and every network the service joins, one
//! ingress rule opens the port on that network's security group. Rules are
//! keyed by network and target port only, so two services exposing the same
//! port on the same network share one rule. When the same port is exposed over
//! both tcp and udp, the shared rule is widened to every protocol.
//!
//! Each port also gets one target group (keyed by published port) and one
//! listener (keyed by target port) on the project load balancer. Listeners of
//! an application load balancer speak plain HTTP: an HTTPS listener would need
//! a certificate nobody provisions.

use serde::Serialize;
use serde_json::Value;

use super::{Tag, service_tags};
use crate::compiler::context::{LoadBalancerKind, ResourceContext};
use crate::constants::{ALL_PROTOCOLS, ANYWHERE_CIDR, resource_types};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::reference;
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::{Project, Service, ServicePort};

/// Registration of a container port with a target group, as listed on the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerRegistration {
    /// Container receiving the traffic.
    pub container_name: String,
    /// Container-side port.
    pub container_port: u16,
    /// Target group the tasks register with.
    pub target_group_arn: Value,
}

/// What the service declaration needs from the exposure step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exposure {
    /// Listener names, which the service depends on.
    pub listeners: Vec<String>,
    /// Load balancer registrations.
    pub registrations: Vec<LoadBalancerRegistration>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IngressProperties {
    cidr_ip: &'static str,
    description: String,
    from_port: u16,
    group_id: Value,
    ip_protocol: String,
    to_port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TargetGroupProperties {
    port: u16,
    protocol: String,
    tags: Vec<Tag>,
    target_type: &'static str,
    vpc_id: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListenerProperties {
    default_actions: Vec<ListenerAction>,
    load_balancer_arn: Value,
    port: u16,
    protocol: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListenerAction {
    forward_config: ForwardConfig,
    #[serde(rename = "Type")]
    action_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ForwardConfig {
    target_groups: Vec<TargetGroupTuple>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TargetGroupTuple {
    target_group_arn: Value,
}

/// Protocol of the ingress rule: upper-cased, or "every protocol" when empty.
fn ingress_protocol(port: &ServicePort) -> String {
    if port.protocol.is_empty() {
        ALL_PROTOCOLS.to_string()
    } else {
        port.protocol.to_uppercase()
    }
}

/// Protocol of target groups and listeners.
fn load_balancer_protocol(port: &ServicePort, kind: LoadBalancerKind) -> String {
    match kind {
        LoadBalancerKind::Application => "HTTP".to_string(),
        LoadBalancerKind::Network if port.protocol.is_empty() => "TCP_UDP".to_string(),
        LoadBalancerKind::Network => port.protocol.to_uppercase(),
    }
}

/// Declare ingress rules, target groups and listeners for every port of the service.
pub fn build_exposure(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    project: &Project,
    service: &Service,
) -> Result<Exposure, EcsgraphError> {
    let mut exposure = Exposure::default();
    if service.ports.is_empty() {
        return Ok(exposure);
    }
    let load_balancer = context.require_load_balancer()?;
    let networks = service.effective_networks();

    for port in &service.ports {
        for network in &networks {
            build_ingress(graph, context, network, port)?;
        }

        let protocol = load_balancer_protocol(port, context.load_balancer_kind);
        let target_group = LogicalName::TargetGroup {
            service: &service.name,
            protocol: &port.protocol,
            published: port.published,
        }
        .allocate();
        let properties = TargetGroupProperties {
            port: port.target,
            protocol: protocol.clone(),
            tags: service_tags(&project.name, &service.name),
            target_type: "ip",
            vpc_id: context.vpc.clone(),
        };
        graph.insert(&target_group, Resource::new(resource_types::TARGET_GROUP, &properties)?)?;

        let listener = LogicalName::Listener {
            service: &service.name,
            protocol: &port.protocol,
            target: port.target,
        }
        .allocate();
        let properties = ListenerProperties {
            default_actions: vec![ListenerAction {
                forward_config: ForwardConfig {
                    target_groups: vec![TargetGroupTuple {
                        target_group_arn: reference(&target_group),
                    }],
                },
                action_type: "forward",
            }],
            load_balancer_arn: load_balancer.clone(),
            port: port.target,
            protocol,
        };
        graph.insert(
            &listener,
            Resource::new(resource_types::LISTENER, &properties)?.depending_on([&target_group]),
        )?;

        exposure.listeners.push(listener);
        exposure.registrations.push(LoadBalancerRegistration {
            container_name: service.name.clone(),
            container_port: port.target,
            target_group_arn: reference(&target_group),
        });
    }
    Ok(exposure)
}

fn build_ingress(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    network: &str,
    port: &ServicePort,
) -> Result<(), EcsgraphError> {
    let protocol = ingress_protocol(port);
    let properties = IngressProperties {
        cidr_ip: ANYWHERE_CIDR,
        description: format!("{}/{} on {} network", port.target, port.protocol, network),
        from_port: port.target,
        group_id: context.security_group(network)?,
        ip_protocol: protocol,
        to_port: port.target,
    };
    let name = LogicalName::Ingress {
        network,
        target: port.target,
    }
    .allocate();

    if let Some(existing) = graph.get_mut(&name)
        && existing.resource_type == resource_types::SECURITY_GROUP_INGRESS
        && let Some(current) = existing.property("IpProtocol").and_then(Value::as_str).map(str::to_string)
        && current != properties.ip_protocol
    {
        if current != ALL_PROTOCOLS {
            let widened = if properties.ip_protocol == ALL_PROTOCOLS {
                properties
            } else {
                let mut protocols = [current.to_lowercase(), port.protocol.to_lowercase()];
                protocols.sort();
                IngressProperties {
                    description: format!("{}/{} on {} network", port.target, protocols.join("+"), network),
                    ip_protocol: ALL_PROTOCOLS.to_string(),
                    ..properties
                }
            };
            *existing = Resource::new(resource_types::SECURITY_GROUP_INGRESS, &widened)?;
        }
        tracing::debug!("Ingress rule {} covers every protocol", name);
        return Ok(());
    }

    if !graph.insert_shared(&name, Resource::new(resource_types::SECURITY_GROUP_INGRESS, &properties)?)? {
        tracing::warn!("Ingress rule {} is shared by several services", name);
    }
    Ok(())
}
