//! Logical name allocation for template resources.
//!
//! Every resource in the graph is keyed by a logical name derived from the
//! semantic identity of what it declares (a service, a network, a port). The
//! derivation is pure: the same identity always yields the same name, which is
//! what makes repeated compilations of a project byte-identical.
//!
//! # Normalization
//!
//! Logical names may only contain ASCII letters and digits. Every run of other
//! characters is removed; the first letter of each word that followed a removed
//! run is upper-cased, the leading character is kept as written:
//!
//! | Input       | Normalized |
//! |-------------|------------|
//! | `web`       | `web`      |
//! | `my-web`    | `myWeb`    |
//! | `api_v2.db` | `apiV2Db`  |
//!
//! Distinct inputs can still normalize to the same token (`my-web` and `myWeb`).
//! The graph rejects the second declaration with
//! [`EcsgraphError::DuplicateResource`](crate::core::EcsgraphError::DuplicateResource)
//! instead of overwriting the first.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[^a-zA-Z0-9]+").expect("separator pattern is a valid regex")
});

/// Strip non-alphanumeric characters and join the remaining words.
///
/// # Examples
///
/// ```rust
/// use ecsgraph::naming::normalize_resource_name;
///
/// assert_eq!(normalize_resource_name("web"), "web");
/// assert_eq!(normalize_resource_name("my-web"), "myWeb");
/// assert_eq!(normalize_resource_name("--db--"), "db");
/// ```
pub fn normalize_resource_name(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    for word in SEPARATORS.split(raw).filter(|word| !word.is_empty()) {
        if normalized.is_empty() {
            normalized.push_str(word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            normalized.push(first.to_ascii_uppercase());
            normalized.push_str(chars.as_str());
        }
    }
    normalized
}

/// Semantic identity of a template resource.
///
/// [`LogicalName::allocate`] turns it into the resource's key in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalName<'a> {
    /// `<Service>Service`
    Service(&'a str),
    /// `<Service>TaskDefinition`
    TaskDefinition(&'a str),
    /// `<Service>TaskRole`
    TaskRole(&'a str),
    /// `<Service>TaskExecutionRole`
    TaskExecutionRole(&'a str),
    /// `<Service><PROTOCOL><Published>TargetGroup`
    TargetGroup {
        /// Service name
        service: &'a str,
        /// Port protocol as declared
        protocol: &'a str,
        /// Platform-side port
        published: u16,
    },
    /// `<Service><PROTOCOL><Target>Listener`
    Listener {
        /// Service name
        service: &'a str,
        /// Port protocol as declared
        protocol: &'a str,
        /// Container-side port
        target: u16,
    },
    /// `<Network><Target>Ingress`
    Ingress {
        /// Network name
        network: &'a str,
        /// Container-side port
        target: u16,
    },
    /// `<Service>ServiceDiscoveryEntry`
    DiscoveryEntry(&'a str),
    /// `<Secret>Secret`
    Secret(&'a str),
    /// `<Network>Network`
    Network(&'a str),
    /// `<Network>NetworkIngress`, the intra-network rule
    NetworkIngress(&'a str),
    /// `<Volume>Volume`
    Volume(&'a str),
    /// `<Volume>NFSMountTargetOn<Subnet>`
    MountTarget {
        /// Volume name
        volume: &'a str,
        /// Subnet label
        subnet: &'a str,
    },
    /// `<Service>AutoScalingRole`
    AutoScalingRole(&'a str),
    /// `<Service>ScalableTarget`
    ScalableTarget(&'a str),
    /// `<Service>ScalingPolicy`
    ScalingPolicy(&'a str),
}

impl LogicalName<'_> {
    /// Derive the logical name.
    pub fn allocate(&self) -> String {
        let n = normalize_resource_name;
        match *self {
            LogicalName::Service(service) => format!("{}Service", n(service)),
            LogicalName::TaskDefinition(service) => format!("{}TaskDefinition", n(service)),
            LogicalName::TaskRole(service) => format!("{}TaskRole", n(service)),
            LogicalName::TaskExecutionRole(service) => format!("{}TaskExecutionRole", n(service)),
            LogicalName::TargetGroup {
                service,
                protocol,
                published,
            } => format!("{}{}{}TargetGroup", n(service), protocol.to_uppercase(), published),
            LogicalName::Listener {
                service,
                protocol,
                target,
            } => format!("{}{}{}Listener", n(service), protocol.to_uppercase(), target),
            LogicalName::Ingress {
                network,
                target,
            } => format!("{}{}Ingress", n(network), target),
            LogicalName::DiscoveryEntry(service) => format!("{}ServiceDiscoveryEntry", n(service)),
            LogicalName::Secret(secret) => format!("{}Secret", n(secret)),
            LogicalName::Network(network) => format!("{}Network", n(network)),
            LogicalName::NetworkIngress(network) => format!("{}NetworkIngress", n(network)),
            LogicalName::Volume(volume) => format!("{}Volume", n(volume)),
            LogicalName::MountTarget {
                volume,
                subnet,
            } => format!("{}NFSMountTargetOn{}", n(volume), n(subnet)),
            LogicalName::AutoScalingRole(service) => format!("{}AutoScalingRole", n(service)),
            LogicalName::ScalableTarget(service) => format!("{}ScalableTarget", n(service)),
            LogicalName::ScalingPolicy(service) => format!("{}ScalingPolicy", n(service)),
        }
    }
}

impl fmt::Display for LogicalName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.allocate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize_resource_name("web"), "web");
        assert_eq!(normalize_resource_name("my-web"), "myWeb");
        assert_eq!(normalize_resource_name("api_v2.db"), "apiV2Db");
        assert_eq!(normalize_resource_name("front end"), "frontEnd");
        assert_eq!(normalize_resource_name("-leading"), "leading");
        assert_eq!(normalize_resource_name(""), "");
    }

    #[test]
    fn test_normalize_keeps_existing_case() {
        assert_eq!(normalize_resource_name("Web"), "Web");
        assert_eq!(normalize_resource_name("myWeb"), "myWeb");
    }

    #[test]
    fn test_service_scoped_patterns() {
        assert_eq!(LogicalName::Service("web").allocate(), "webService");
        assert_eq!(LogicalName::TaskDefinition("web").allocate(), "webTaskDefinition");
        assert_eq!(LogicalName::TaskRole("web").allocate(), "webTaskRole");
        assert_eq!(LogicalName::TaskExecutionRole("web").allocate(), "webTaskExecutionRole");
        assert_eq!(LogicalName::DiscoveryEntry("web").allocate(), "webServiceDiscoveryEntry");
    }

    #[test]
    fn test_port_patterns_use_different_ports() {
        let target_group = LogicalName::TargetGroup {
            service: "web",
            protocol: "tcp",
            published: 8080,
        };
        let listener = LogicalName::Listener {
            service: "web",
            protocol: "tcp",
            target: 80,
        };
        assert_eq!(target_group.allocate(), "webTCP8080TargetGroup");
        assert_eq!(listener.allocate(), "webTCP80Listener");
        assert_eq!(
            LogicalName::Ingress {
                network: "default",
                target: 80
            }
            .allocate(),
            "default80Ingress"
        );
    }

    #[test]
    fn test_empty_protocol_is_omitted() {
        let listener = LogicalName::Listener {
            service: "dns",
            protocol: "",
            target: 53,
        };
        assert_eq!(listener.allocate(), "dns53Listener");
    }

    #[test]
    fn test_project_scoped_patterns() {
        assert_eq!(LogicalName::Secret("db-password").allocate(), "dbPasswordSecret");
        assert_eq!(LogicalName::Network("back-tier").allocate(), "backTierNetwork");
        assert_eq!(LogicalName::NetworkIngress("default").allocate(), "defaultNetworkIngress");
        assert_eq!(LogicalName::Volume("data").allocate(), "dataVolume");
        assert_eq!(
            LogicalName::MountTarget {
                volume: "data",
                subnet: "Subnet1"
            }
            .allocate(),
            "dataNFSMountTargetOnSubnet1"
        );
    }

    #[test]
    fn test_display_matches_allocate() {
        let name = LogicalName::ScalingPolicy("worker");
        assert_eq!(name.to_string(), "workerScalingPolicy");
    }
}
