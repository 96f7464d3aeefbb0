//! Project-level networking inputs shared by every service.
//!
//! The context answers "which VPC, which subnets, which cluster, which load
//! balancer, which security group for network N" for the builders. Values are
//! either existing ids taken from the project extensions, or references to
//! resources (and template parameters) the context declares itself in
//! [`ResourceContext::ensure`].

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::builders::{Tag, project_tags};
use crate::constants::{
    ALL_PROTOCOLS, CLUSTER_RESOURCE, LOAD_BALANCER_RESOURCE, PROJECT_TAG, SUBNET_PARAMETERS,
    VPC_PARAMETER, resource_types,
};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::reference;
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::{Project, ProjectExtensions};
use crate::template::Parameter;

/// Tag carrying the network name on security groups.
const NETWORK_TAG: &str = "com.docker.compose.network";

/// Load balancer flavour, chosen from the published ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancerKind {
    /// HTTP(S) routing. Only used when every target port is 80 or 443 over TCP.
    Application,
    /// Layer-4 routing.
    #[default]
    Network,
}

impl LoadBalancerKind {
    /// Choose the kind from every port published by the project.
    pub fn for_project(project: &Project) -> Self {
        let all_http = project.services.values().flat_map(|s| &s.ports).all(|port| {
            let tcp = port.protocol.is_empty() || port.protocol.eq_ignore_ascii_case("tcp");
            tcp && (port.target == 80 || port.target == 443)
        });
        if all_http { Self::Application } else { Self::Network }
    }

    /// Value of the load balancer's `Type` property.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerKind::Application => "application",
            LoadBalancerKind::Network => "network",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ClusterProperties {
    cluster_name: String,
    tags: Vec<Tag>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroupProperties {
    group_description: String,
    vpc_id: Value,
    tags: Vec<Tag>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkIngressProperties {
    description: String,
    group_id: Value,
    ip_protocol: &'static str,
    source_security_group_id: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerProperties {
    scheme: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    security_groups: Vec<Value>,
    subnets: Vec<Value>,
    tags: Vec<Tag>,
    #[serde(rename = "Type")]
    kind: &'static str,
}

/// Project-level resources and ids every service builder reads.
#[derive(Debug, Clone, Default)]
pub struct ResourceContext {
    /// VPC id or parameter reference.
    pub vpc: Value,
    /// Subnet ids or parameter references, with a label used in resource names.
    pub subnets: Vec<(String, Value)>,
    /// Cluster ARN or reference.
    pub cluster: Value,
    /// Load balancer ARN or reference, when any port is published.
    pub load_balancer: Option<Value>,
    /// Flavour of the load balancer.
    pub load_balancer_kind: LoadBalancerKind,
    /// Network name → security group logical name.
    pub security_groups: BTreeMap<String, String>,
    /// Volume name → filesystem id, resolved before compilation.
    pub filesystems: BTreeMap<String, String>,
    /// Fixed deployment region. The stack's own region when unset.
    pub region: Option<String>,
    /// Template parameters the context introduced.
    pub parameters: BTreeMap<String, Parameter>,
}

impl ResourceContext {
    /// Context with pre-resolved filesystem ids.
    pub fn with_filesystems(filesystems: BTreeMap<String, String>) -> Self {
        Self {
            filesystems,
            ..Self::default()
        }
    }

    /// Region used by the container log driver.
    pub fn log_region(&self) -> Value {
        match &self.region {
            Some(region) => json!(region),
            None => reference("AWS::Region"),
        }
    }

    /// Fill in the project-level inputs, declaring whatever the project
    /// extensions don't provide: the cluster, one security group per used
    /// network (with an intra-network ingress rule) and the load balancer.
    pub fn ensure(
        &mut self,
        graph: &mut ResourceGraph,
        project: &Project,
        extensions: &ProjectExtensions,
    ) -> Result<(), EcsgraphError> {
        self.ensure_vpc(extensions);
        self.ensure_cluster(graph, project, extensions)?;
        self.ensure_networks(graph, project)?;
        self.ensure_load_balancer(graph, project, extensions)?;
        Ok(())
    }

    fn ensure_vpc(&mut self, extensions: &ProjectExtensions) {
        self.vpc = match &extensions.vpc {
            Some(vpc) => json!(vpc),
            None => {
                self.parameters.insert(
                    VPC_PARAMETER.to_string(),
                    Parameter::new("AWS::EC2::VPC::Id", "ID of the VPC to deploy into"),
                );
                reference(VPC_PARAMETER)
            }
        };

        self.subnets = if extensions.subnets.is_empty() {
            SUBNET_PARAMETERS
                .iter()
                .enumerate()
                .map(|(i, parameter)| {
                    self.parameters.insert(
                        (*parameter).to_string(),
                        Parameter::new("AWS::EC2::Subnet::Id", format!("SubnetId {}", i + 1)),
                    );
                    (format!("Subnet{}", i + 1), reference(parameter))
                })
                .collect()
        } else {
            extensions
                .subnets
                .iter()
                .enumerate()
                .map(|(i, subnet)| (format!("Subnet{}", i + 1), json!(subnet)))
                .collect()
        };
    }

    fn ensure_cluster(
        &mut self,
        graph: &mut ResourceGraph,
        project: &Project,
        extensions: &ProjectExtensions,
    ) -> Result<(), EcsgraphError> {
        if let Some(cluster) = &extensions.cluster {
            self.cluster = json!(cluster);
            return Ok(());
        }
        let properties = ClusterProperties {
            cluster_name: project.name.clone(),
            tags: project_tags(&project.name),
        };
        graph.insert(CLUSTER_RESOURCE, Resource::new(resource_types::CLUSTER, &properties)?)?;
        self.cluster = reference(CLUSTER_RESOURCE);
        Ok(())
    }

    fn ensure_networks(&mut self, graph: &mut ResourceGraph, project: &Project) -> Result<(), EcsgraphError> {
        for network in project.used_networks() {
            let group = LogicalName::Network(&network).allocate();
            let properties = SecurityGroupProperties {
                group_description: format!("{} Security Group for {} network", project.name, network),
                vpc_id: self.vpc.clone(),
                tags: vec![Tag::new(PROJECT_TAG, &project.name), Tag::new(NETWORK_TAG, &network)],
            };
            graph.insert(&group, Resource::new(resource_types::SECURITY_GROUP, &properties)?)?;

            let ingress = NetworkIngressProperties {
                description: format!("Allow communication within network {network}"),
                group_id: reference(&group),
                ip_protocol: ALL_PROTOCOLS,
                source_security_group_id: reference(&group),
            };
            graph.insert(
                LogicalName::NetworkIngress(&network).allocate(),
                Resource::new(resource_types::SECURITY_GROUP_INGRESS, &ingress)?,
            )?;
            self.security_groups.insert(network, group);
        }
        Ok(())
    }

    fn ensure_load_balancer(
        &mut self,
        graph: &mut ResourceGraph,
        project: &Project,
        extensions: &ProjectExtensions,
    ) -> Result<(), EcsgraphError> {
        if project.services.values().all(|service| service.ports.is_empty()) {
            return Ok(());
        }
        self.load_balancer_kind = LoadBalancerKind::for_project(project);
        if let Some(load_balancer) = &extensions.load_balancer {
            self.load_balancer = Some(json!(load_balancer));
            return Ok(());
        }

        // network load balancers do not take security groups
        let security_groups = match self.load_balancer_kind {
            LoadBalancerKind::Application => {
                self.security_groups.values().map(|group| reference(group)).collect()
            }
            LoadBalancerKind::Network => Vec::new(),
        };
        let properties = LoadBalancerProperties {
            scheme: "internet-facing",
            security_groups,
            subnets: self.subnet_ids(),
            tags: project_tags(&project.name),
            kind: self.load_balancer_kind.as_str(),
        };
        graph.insert(LOAD_BALANCER_RESOURCE, Resource::new(resource_types::LOAD_BALANCER, &properties)?)?;
        self.load_balancer = Some(reference(LOAD_BALANCER_RESOURCE));
        Ok(())
    }

    /// Subnet ids in declaration order.
    pub fn subnet_ids(&self) -> Vec<Value> {
        self.subnets.iter().map(|(_, id)| id.clone()).collect()
    }

    /// Security group references for a service's networks.
    pub fn service_security_groups(&self, networks: &[String]) -> Result<Vec<Value>, EcsgraphError> {
        networks.iter().map(|network| self.security_group(network)).collect()
    }

    /// Security group reference of one network.
    pub fn security_group(&self, network: &str) -> Result<Value, EcsgraphError> {
        self.security_groups.get(network).map(|group| reference(group)).ok_or_else(|| {
            EcsgraphError::Other {
                message: format!("network '{network}' has no security group"),
            }
        })
    }

    /// Load balancer reference, required by services that publish ports.
    pub fn require_load_balancer(&self) -> Result<&Value, EcsgraphError> {
        self.load_balancer.as_ref().ok_or_else(|| EcsgraphError::Other {
            message: "no load balancer available for published ports".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Service, ServicePort};

    #[test]
    fn test_load_balancer_kind() {
        let http = Project::new("shop")
            .with_service(Service::new("web", "nginx").with_port(ServicePort::new(80, 8080, "tcp")));
        assert_eq!(LoadBalancerKind::for_project(&http), LoadBalancerKind::Application);

        let mixed = http.clone().with_service(Service::new("dns", "coredns").with_port(ServicePort::new(53, 53, "udp")));
        assert_eq!(LoadBalancerKind::for_project(&mixed), LoadBalancerKind::Network);
    }

    #[test]
    fn test_ensure_declares_defaults() {
        let project = Project::new("shop")
            .with_service(Service::new("web", "nginx").with_port(ServicePort::tcp(80)))
            .with_service(Service::new("db", "postgres").with_network("back"))
            .with_network("back");
        let mut graph = ResourceGraph::new();
        let mut context = ResourceContext::default();
        context.ensure(&mut graph, &project, &ProjectExtensions::default()).unwrap();

        for name in ["Cluster", "LoadBalancer", "defaultNetwork", "defaultNetworkIngress", "backNetwork", "backNetworkIngress"] {
            assert!(graph.contains(name), "missing {name}");
        }
        assert_eq!(context.vpc, reference("ParameterVPCId"));
        assert_eq!(context.subnets.len(), 2);
        assert_eq!(context.parameters.len(), 3);
        assert_eq!(context.load_balancer_kind, LoadBalancerKind::Application);
        assert_eq!(
            graph.get("LoadBalancer").unwrap().properties["SecurityGroups"],
            json!([{"Ref": "backNetwork"}, {"Ref": "defaultNetwork"}])
        );
    }

    #[test]
    fn test_ensure_uses_existing_infrastructure() {
        let project = Project::new("shop").with_service(Service::new("web", "nginx").with_port(ServicePort::tcp(8080)));
        let extensions = ProjectExtensions {
            vpc: Some("vpc-123".to_string()),
            subnets: vec!["subnet-a".to_string()],
            cluster: Some("arn:cluster".to_string()),
            load_balancer: Some("arn:lb".to_string()),
            ..ProjectExtensions::default()
        };
        let mut graph = ResourceGraph::new();
        let mut context = ResourceContext::default();
        context.ensure(&mut graph, &project, &extensions).unwrap();

        assert!(!graph.contains("Cluster"));
        assert!(!graph.contains("LoadBalancer"));
        assert!(context.parameters.is_empty());
        assert_eq!(context.cluster, json!("arn:cluster"));
        assert_eq!(context.load_balancer, Some(json!("arn:lb")));
        assert_eq!(context.subnets, vec![("Subnet1".to_string(), json!("subnet-a"))]);
    }

    #[test]
    fn test_no_load_balancer_without_ports() {
        let project = Project::new("shop").with_service(Service::new("worker", "busybox"));
        let mut graph = ResourceGraph::new();
        let mut context = ResourceContext::default();
        context.ensure(&mut graph, &project, &ProjectExtensions::default()).unwrap();
        assert!(context.load_balancer.is_none());
        assert!(context.require_load_balancer().is_err());
    }
}
