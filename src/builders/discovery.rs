//! Name-based service discovery.
//!
//! One private DNS namespace (`<project>.local`) per project, attached to the
//! project VPC, and one registry entry per service so services can resolve
//! each other by name. Health state is pushed by the platform through a custom
//! health check rather than probed.

use serde::Serialize;
use serde_json::Value;

use crate::compiler::context::ResourceContext;
use crate::constants::{
    CLOUD_MAP_RESOURCE, DISCOVERY_FAILURE_THRESHOLD, DISCOVERY_RECORD_TTL, resource_types,
};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::{get_att, reference};
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::{Project, Service};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NamespaceProperties {
    description: String,
    name: String,
    vpc: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegistryEntryProperties {
    description: String,
    dns_config: DnsConfig,
    health_check_custom_config: HealthCheckCustomConfig,
    name: String,
    namespace_id: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DnsConfig {
    dns_records: Vec<DnsRecord>,
    routing_policy: &'static str,
}

#[derive(Serialize)]
struct DnsRecord {
    #[serde(rename = "TTL")]
    ttl: u32,
    #[serde(rename = "Type")]
    record_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheckCustomConfig {
    failure_threshold: u32,
}

/// Registration of a service with its discovery entry, as listed on the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistry {
    /// ARN of the registry entry.
    pub registry_arn: Value,
}

/// Declare the project's private DNS namespace.
pub fn create_cloud_map(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    project: &Project,
) -> Result<(), EcsgraphError> {
    let properties = NamespaceProperties {
        description: format!("Service Map for Docker Compose project {}", project.name),
        name: format!("{}.local", project.name),
        vpc: context.vpc.clone(),
    };
    graph.insert(CLOUD_MAP_RESOURCE, Resource::new(resource_types::PRIVATE_DNS_NAMESPACE, &properties)?)
}

/// Declare the registry entry of a service.
pub fn create_service_registry(
    graph: &mut ResourceGraph,
    service: &Service,
) -> Result<ServiceRegistry, EcsgraphError> {
    let properties = RegistryEntryProperties {
        description: format!("{} service discovery entry in Cloud Map", service.name),
        dns_config: DnsConfig {
            dns_records: vec![DnsRecord {
                ttl: DISCOVERY_RECORD_TTL,
                record_type: "A",
            }],
            routing_policy: "MULTIVALUE",
        },
        health_check_custom_config: HealthCheckCustomConfig {
            failure_threshold: DISCOVERY_FAILURE_THRESHOLD,
        },
        name: service.name.clone(),
        namespace_id: reference(CLOUD_MAP_RESOURCE),
    };
    let name = LogicalName::DiscoveryEntry(&service.name).allocate();
    graph.insert(&name, Resource::new(resource_types::DISCOVERY_SERVICE, &properties)?)?;
    Ok(ServiceRegistry {
        registry_arn: get_att(&name, "Arn"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace() {
        let mut graph = ResourceGraph::new();
        let context = ResourceContext {
            vpc: json!("vpc-1"),
            ..ResourceContext::default()
        };
        create_cloud_map(&mut graph, &context, &Project::new("shop")).unwrap();

        let namespace = graph.get("CloudMap").unwrap();
        assert_eq!(namespace.resource_type, "AWS::ServiceDiscovery::PrivateDnsNamespace");
        assert_eq!(namespace.properties["Name"], "shop.local");
        assert_eq!(namespace.properties["Vpc"], "vpc-1");
    }

    #[test]
    fn test_registry_entry() {
        let mut graph = ResourceGraph::new();
        let registry = create_service_registry(&mut graph, &Service::new("web", "nginx")).unwrap();

        assert_eq!(registry.registry_arn, json!({"Fn::GetAtt": ["webServiceDiscoveryEntry", "Arn"]}));
        let entry = &graph.get("webServiceDiscoveryEntry").unwrap().properties;
        assert_eq!(entry["DnsConfig"], json!({"DnsRecords": [{"TTL": 60, "Type": "A"}], "RoutingPolicy": "MULTIVALUE"}));
        assert_eq!(entry["HealthCheckCustomConfig"]["FailureThreshold"], 1);
        assert_eq!(entry["NamespaceId"], json!({"Ref": "CloudMap"}));
        assert_eq!(entry["Name"], "web");
    }
}
