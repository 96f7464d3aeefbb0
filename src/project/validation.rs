//! Compatibility pre-validation.
//!
//! Runs before compilation starts; a failing check prevents the compiler from
//! ever seeing the project. The default check collects every problem it finds
//! instead of stopping at the first, so users can fix a project in one pass.

use strsim::levenshtein;

use super::Project;
use crate::constants::DEFAULT_NETWORK;
use crate::core::EcsgraphError;
use crate::graph::DependencyGraph;

/// Decides whether a project can be compiled at all.
pub trait CompatibilityCheck: Send + Sync {
    /// # Errors
    ///
    /// [`EcsgraphError::ProjectValidationError`] listing every problem.
    fn check(&self, project: &Project) -> Result<(), EcsgraphError>;
}

/// Reference and shape checks every project must pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompatibilityCheck;

const SUPPORTED_PROTOCOLS: [&str; 3] = ["tcp", "udp", ""];

impl CompatibilityCheck for DefaultCompatibilityCheck {
    fn check(&self, project: &Project) -> Result<(), EcsgraphError> {
        let mut problems = Vec::new();

        if !is_valid_project_name(&project.name) {
            problems.push(format!(
                "project name '{}' must be non-empty and contain only ASCII letters, digits, '-' or '_'",
                project.name
            ));
        }

        let service_names: Vec<&str> = project.services.keys().map(String::as_str).collect();
        let mut network_names: Vec<&str> = project.networks.keys().map(String::as_str).collect();
        network_names.push(DEFAULT_NETWORK);
        let volume_names: Vec<&str> = project.volumes.keys().map(String::as_str).collect();
        let secret_names: Vec<&str> = project.secrets.keys().map(String::as_str).collect();

        for (name, service) in &project.services {
            if service.image.trim().is_empty() {
                problems.push(format!("service '{name}' has no image"));
            }
            for port in &service.ports {
                if port.target == 0 {
                    problems.push(format!("service '{name}' exposes target port 0"));
                }
                if !SUPPORTED_PROTOCOLS.contains(&port.protocol.to_lowercase().as_str()) {
                    problems.push(format!(
                        "service '{name}' uses unsupported protocol '{}' (expected tcp or udp)",
                        port.protocol
                    ));
                }
            }
            for dependency in &service.depends_on {
                if !project.services.contains_key(dependency) {
                    problems.push(unknown_reference(name, "service", dependency, &service_names));
                }
            }
            for network in &service.networks {
                if !network_names.contains(&network.as_str()) {
                    problems.push(unknown_reference(name, "network", network, &network_names));
                }
            }
            for mount in &service.volumes {
                if !project.volumes.contains_key(&mount.source) {
                    problems.push(unknown_reference(name, "volume", &mount.source, &volume_names));
                }
            }
            for secret in &service.secrets {
                if !project.secrets.contains_key(&secret.source) {
                    problems.push(unknown_reference(name, "secret", &secret.source, &secret_names));
                }
            }
        }

        let mut dependencies = DependencyGraph::new();
        for (name, service) in &project.services {
            dependencies.ensure_node(name);
            for dependency in service.depends_on.iter().filter(|d| project.services.contains_key(*d)) {
                dependencies.add_dependency(name, dependency);
            }
        }
        if let Err(EcsgraphError::CircularDependency {
            chain,
        }) = dependencies.detect_cycles()
        {
            problems.push(format!("services depend on each other in a cycle: {chain}"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EcsgraphError::ProjectValidationError {
                problems,
            })
        }
    }
}

fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn unknown_reference(service: &str, kind: &str, name: &str, available: &[&str]) -> String {
    let mut message = format!("service '{service}' references undefined {kind} '{name}'");
    if let Some(suggestion) = closest_match(name, available) {
        message.push_str(&format!(" (did you mean '{suggestion}'?)"));
    }
    message
}

/// Closest candidate within a third of the name's length.
fn closest_match<'a>(target: &str, available: &[&'a str]) -> Option<&'a str> {
    available
        .iter()
        .map(|candidate| (*candidate, levenshtein(target, candidate)))
        .filter(|(_, distance)| *distance <= target.len().max(3) / 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}
