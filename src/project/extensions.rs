//! Typed views over the `x-ecs` vendor extension blocks.
//!
//! Extensions are an open key/value surface in the project file. Each block is
//! decoded exactly once into a view struct here; a recognized key with the wrong
//! shape is an [`EcsgraphError::ExtensionTypeError`], unknown keys are ignored.
//! Builders only ever read the views.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Project, Service};
use crate::core::EcsgraphError;

/// Raw extension block: key → loosely-typed value.
pub type Extensions = BTreeMap<String, Value>;

/// Recognized extension keys.
pub mod keys {
    /// Log retention in days (project)
    pub const RETENTION_IN_DAYS: &str = "retention-in-days";
    /// Existing VPC id (project)
    pub const VPC: &str = "vpc";
    /// Existing subnet ids (project)
    pub const SUBNETS: &str = "subnets";
    /// Existing cluster ARN (project)
    pub const CLUSTER: &str = "cluster";
    /// Existing load balancer ARN (project)
    pub const LOAD_BALANCER: &str = "loadbalancer";
    /// Inline task role policy document (service)
    pub const ROLE_POLICY: &str = "role-policy";
    /// Managed policy ARNs for the task role (service)
    pub const MANAGED_POLICIES: &str = "managed-policies";
    /// Registry credentials secret ARN (service)
    pub const PULL_CREDENTIALS: &str = "pull-credentials";
    /// Autoscaling settings (service)
    pub const AUTOSCALING: &str = "autoscaling";
    /// Explicit minimum healthy percent (update_config)
    pub const MIN_PERCENT: &str = "min-percent";
    /// Explicit maximum percent (update_config)
    pub const MAX_PERCENT: &str = "max-percent";
}

fn decode<T: DeserializeOwned>(
    extensions: &Extensions,
    scope: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, EcsgraphError> {
    match extensions.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|_| {
            EcsgraphError::ExtensionTypeError {
                scope: scope.to_string(),
                key: key.to_string(),
                expected: expected.to_string(),
            }
        }),
    }
}

/// Project-level extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectExtensions {
    /// Log retention in days. `None` keeps logs forever.
    pub retention_in_days: Option<u32>,
    /// Deploy into this VPC instead of a template parameter.
    pub vpc: Option<String>,
    /// Deploy into these subnets instead of template parameters.
    pub subnets: Vec<String>,
    /// Use this cluster instead of creating one.
    pub cluster: Option<String>,
    /// Use this load balancer instead of creating one.
    pub load_balancer: Option<String>,
}

impl ProjectExtensions {
    /// Decode the project's `x-ecs` block.
    pub fn decode(project: &Project) -> Result<Self, EcsgraphError> {
        let scope = format!("project \"{}\"", project.name);
        let ext = &project.extensions;
        Ok(Self {
            retention_in_days: decode(ext, &scope, keys::RETENTION_IN_DAYS, "a non-negative integer")?,
            vpc: decode(ext, &scope, keys::VPC, "a string")?,
            subnets: decode(ext, &scope, keys::SUBNETS, "a list of strings")?.unwrap_or_default(),
            cluster: decode(ext, &scope, keys::CLUSTER, "a string")?,
            load_balancer: decode(ext, &scope, keys::LOAD_BALANCER, "a string")?,
        })
    }
}

/// Metric tracked by a target-tracking scaling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMetric {
    /// Average CPU utilization, in percent.
    Cpu(u32),
    /// Average memory utilization, in percent.
    Memory(u32),
}

/// Validated `autoscaling` settings of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoscalingConfig {
    /// Minimum task count.
    pub min: u32,
    /// Maximum task count, never zero.
    pub max: u32,
    /// Tracked metric and its target value.
    pub metric: ScalingMetric,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoscaling {
    #[serde(default)]
    min: u32,
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cpu: Option<u32>,
    #[serde(default)]
    memory: Option<u32>,
}

impl RawAutoscaling {
    fn validate(self, service: &str) -> Result<AutoscalingConfig, EcsgraphError> {
        let metric = match (self.cpu, self.memory) {
            (Some(_), Some(_)) => {
                return Err(EcsgraphError::configuration(
                    service,
                    "autoscaling can track either cpu or memory, not both",
                ));
            }
            (Some(cpu), None) => ScalingMetric::Cpu(cpu),
            (None, Some(memory)) => ScalingMetric::Memory(memory),
            (None, None) => {
                return Err(EcsgraphError::configuration(
                    service,
                    "autoscaling requires a cpu or memory target",
                ));
            }
        };
        let max = match self.max {
            Some(max) if max > 0 => max,
            _ => {
                return Err(EcsgraphError::configuration(
                    service,
                    "autoscaling requires max to be set to a positive value",
                ));
            }
        };
        if self.min > max {
            return Err(EcsgraphError::configuration(
                service,
                format!("autoscaling min ({}) is greater than max ({max})", self.min),
            ));
        }
        Ok(AutoscalingConfig {
            min: self.min,
            max,
            metric,
        })
    }
}

/// Service-level extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceExtensions {
    /// Inline policy document for the task role.
    pub role_policy: Option<Value>,
    /// Managed policy ARNs for the task role.
    pub managed_policies: Vec<String>,
    /// Secret holding private registry credentials.
    pub pull_credentials: Option<String>,
    /// Autoscaling settings.
    pub autoscaling: Option<AutoscalingConfig>,
}

impl ServiceExtensions {
    /// Decode a service's `x-ecs` block.
    pub fn decode(service: &Service) -> Result<Self, EcsgraphError> {
        let scope = format!("service \"{}\"", service.name);
        let ext = &service.extensions;

        let role_policy: Option<Value> = decode(ext, &scope, keys::ROLE_POLICY, "a policy document object")?;
        if role_policy.as_ref().is_some_and(|policy| !policy.is_object()) {
            return Err(EcsgraphError::ExtensionTypeError {
                scope,
                key: keys::ROLE_POLICY.to_string(),
                expected: "a policy document object".to_string(),
            });
        }

        let autoscaling: Option<RawAutoscaling> = decode(
            ext,
            &scope,
            keys::AUTOSCALING,
            "a mapping with min, max and cpu or memory",
        )?;

        Ok(Self {
            role_policy,
            managed_policies: decode(ext, &scope, keys::MANAGED_POLICIES, "a list of ARNs")?
                .unwrap_or_default(),
            pull_credentials: decode(ext, &scope, keys::PULL_CREDENTIALS, "an ARN string")?,
            autoscaling: autoscaling.map(|raw| raw.validate(&service.name)).transpose()?,
        })
    }

    /// Whether the service needs a task role of its own.
    pub fn requires_task_role(&self) -> bool {
        self.role_policy.is_some() || !self.managed_policies.is_empty()
    }
}

/// `update_config` extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateExtensions {
    /// Explicit minimum healthy percent.
    pub min_percent: Option<u32>,
    /// Explicit maximum percent.
    pub max_percent: Option<u32>,
}

impl UpdateExtensions {
    /// Decode the `x-ecs` block of a service's `update_config`.
    pub fn decode(service: &Service) -> Result<Self, EcsgraphError> {
        let Some(update) = service.deploy.as_ref().and_then(|deploy| deploy.update_config.as_ref())
        else {
            return Ok(Self::default());
        };
        let scope = format!("update_config of service \"{}\"", service.name);
        Ok(Self {
            min_percent: decode(&update.extensions, &scope, keys::MIN_PERCENT, "a non-negative integer")?,
            max_percent: decode(&update.extensions, &scope, keys::MAX_PERCENT, "a non-negative integer")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{DeployConfig, UpdateConfig};
    use serde_json::json;

    #[test]
    fn test_project_extensions() {
        let project = Project::new("shop")
            .with_extension(keys::RETENTION_IN_DAYS, json!(14))
            .with_extension(keys::SUBNETS, json!(["subnet-1", "subnet-2"]))
            .with_extension("x-unknown", json!("ignored"));
        let ext = ProjectExtensions::decode(&project).unwrap();
        assert_eq!(ext.retention_in_days, Some(14));
        assert_eq!(ext.subnets, vec!["subnet-1", "subnet-2"]);
        assert_eq!(ext.vpc, None);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let project = Project::new("shop").with_extension(keys::RETENTION_IN_DAYS, json!("two weeks"));
        let err = ProjectExtensions::decode(&project).unwrap_err();
        assert_eq!(
            err,
            EcsgraphError::ExtensionTypeError {
                scope: "project \"shop\"".to_string(),
                key: keys::RETENTION_IN_DAYS.to_string(),
                expected: "a non-negative integer".to_string(),
            }
        );
    }

    #[test]
    fn test_service_extensions_task_role() {
        let plain = Service::new("web", "nginx");
        assert!(!ServiceExtensions::decode(&plain).unwrap().requires_task_role());

        let managed = Service::new("web", "nginx").with_extension(keys::MANAGED_POLICIES, json!(["arn:policy"]));
        assert!(ServiceExtensions::decode(&managed).unwrap().requires_task_role());

        let empty = Service::new("web", "nginx").with_extension(keys::MANAGED_POLICIES, json!([]));
        assert!(!ServiceExtensions::decode(&empty).unwrap().requires_task_role());

        let scalar = Service::new("web", "nginx").with_extension(keys::ROLE_POLICY, json!("allow all"));
        assert!(matches!(
            ServiceExtensions::decode(&scalar),
            Err(EcsgraphError::ExtensionTypeError { .. })
        ));
    }

    #[test]
    fn test_autoscaling_validation() {
        let service = |value| Service::new("worker", "busybox").with_extension(keys::AUTOSCALING, value);

        let ok = ServiceExtensions::decode(&service(json!({"min": 1, "max": 4, "cpu": 70}))).unwrap();
        assert_eq!(
            ok.autoscaling,
            Some(AutoscalingConfig {
                min: 1,
                max: 4,
                metric: ScalingMetric::Cpu(70)
            })
        );

        for invalid in [
            json!({"max": 4, "cpu": 70, "memory": 80}),
            json!({"min": 1, "cpu": 70}),
            json!({"max": 0, "memory": 70}),
            json!({"max": 3}),
            json!({"min": 5, "max": 3, "cpu": 50}),
        ] {
            let err = ServiceExtensions::decode(&service(invalid)).unwrap_err();
            assert!(matches!(err, EcsgraphError::ConfigurationError { .. }), "{err:?}");
        }
    }

    #[test]
    fn test_update_extensions() {
        let mut service = Service::new("web", "nginx");
        assert_eq!(UpdateExtensions::decode(&service).unwrap(), UpdateExtensions::default());

        let mut update = UpdateConfig::default();
        update.extensions.insert(keys::MIN_PERCENT.to_string(), json!(50));
        update.extensions.insert(keys::MAX_PERCENT.to_string(), json!(150));
        service.deploy = Some(DeployConfig {
            update_config: Some(update),
            ..DeployConfig::default()
        });

        let ext = UpdateExtensions::decode(&service).unwrap();
        assert_eq!(ext.min_percent, Some(50));
        assert_eq!(ext.max_percent, Some(150));
    }
}
