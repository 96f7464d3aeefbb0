//! IAM roles of a service.
//!
//! Every service gets a task execution role, used by the platform to pull the
//! image and fetch secrets on the task's behalf. It always carries the standard
//! execution and read-only registry managed policies, plus an inline policy
//! granting read access to the secrets the service references and to its
//! registry pull credentials.
//!
//! A task role, the identity of the application code itself, is declared only
//! when the service asks for permissions through `role-policy` or
//! `managed-policies`.

use serde::Serialize;
use serde_json::{Value, json};

use super::{Tag, service_tags};
use crate::constants::{
    ECR_READ_ONLY_POLICY, ECS_TASK_EXECUTION_POLICY, ECS_TASKS_PRINCIPAL, POLICY_VERSION,
    SECRET_READ_ACTIONS, resource_types,
};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::reference;
use crate::graph::{Resource, ResourceGraph};
use crate::naming::{LogicalName, normalize_resource_name};
use crate::project::{Project, SecretSpec, Service, ServiceExtensions};

/// Policy document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version.
    pub version: &'static str,
    /// Statements.
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Document with the given statements.
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    /// Trust policy letting `service_principal` assume the role.
    pub fn assume_role(service_principal: &str) -> Self {
        Self::new(vec![PolicyStatement {
            effect: "Allow",
            principal: Some(Principal {
                service: service_principal.to_string(),
            }),
            action: vec!["sts:AssumeRole".to_string()],
            resource: None,
        }])
    }
}

/// One statement of a policy document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// `Allow` or `Deny`.
    pub effect: &'static str,
    /// Trusted principal, only in trust policies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Actions.
    pub action: Vec<String>,
    /// Resources the actions apply to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<Value>>,
}

impl PolicyStatement {
    /// `Allow` the actions on the resources.
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            effect: "Allow",
            principal: None,
            action: actions.iter().map(|action| (*action).to_string()).collect(),
            resource: Some(resources),
        }
    }
}

/// Service principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    /// Service domain, e.g. `ecs-tasks.amazonaws.com`.
    pub service: String,
}

/// Named inline policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Policy name.
    pub policy_name: String,
    /// Document, either built here or taken verbatim from `role-policy`.
    pub policy_document: Value,
}

/// Properties of an IAM role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleProperties {
    /// Trust policy.
    pub assume_role_policy_document: PolicyDocument,
    /// Attached managed policies.
    #[serde(rename = "ManagedPolicyArns", skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,
    /// Inline policies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
    /// Tags.
    pub tags: Vec<Tag>,
}

/// Value granting access to one of the project's secrets.
///
/// File-backed secrets are referenced through the resource that materialized
/// them. External ones by their platform-side name, which defaults to the
/// project secret name.
pub fn secret_value_from(project: &Project, secret: &str) -> Result<Value, EcsgraphError> {
    match project.secrets.get(secret) {
        Some(SecretSpec::Materialized {
            resource,
        }) => Ok(reference(resource)),
        Some(SecretSpec::External {
            name,
        }) => Ok(json!(name.as_deref().unwrap_or(secret))),
        Some(SecretSpec::File {
            ..
        }) => Err(EcsgraphError::Other {
            message: format!("secret '{secret}' was not materialized before it was referenced"),
        }),
        None => Err(EcsgraphError::Other {
            message: format!("secret '{secret}' is not declared"),
        }),
    }
}

/// Declare the task execution role. Returns its logical name.
pub fn build_execution_role(
    graph: &mut ResourceGraph,
    project: &Project,
    service: &Service,
    extensions: &ServiceExtensions,
) -> Result<String, EcsgraphError> {
    let mut readable = service
        .secrets
        .iter()
        .map(|secret| secret_value_from(project, &secret.source))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(credentials) = &extensions.pull_credentials {
        readable.push(json!(credentials));
    }

    let mut policies = Vec::new();
    if !readable.is_empty() {
        let document = PolicyDocument::new(vec![PolicyStatement::allow(&SECRET_READ_ACTIONS, readable)]);
        policies.push(Policy {
            policy_name: format!("{}GrantAccessToSecrets", normalize_resource_name(&service.name)),
            policy_document: to_value(&document)?,
        });
    }

    let properties = RoleProperties {
        assume_role_policy_document: PolicyDocument::assume_role(ECS_TASKS_PRINCIPAL),
        managed_policy_arns: vec![ECS_TASK_EXECUTION_POLICY.to_string(), ECR_READ_ONLY_POLICY.to_string()],
        policies,
        tags: service_tags(&project.name, &service.name),
    };
    let name = LogicalName::TaskExecutionRole(&service.name).allocate();
    graph.insert(&name, Resource::new(resource_types::ROLE, &properties)?)?;
    Ok(name)
}

/// Declare the task role if the service asks for one.
pub fn build_task_role(
    graph: &mut ResourceGraph,
    project: &Project,
    service: &Service,
    extensions: &ServiceExtensions,
) -> Result<Option<String>, EcsgraphError> {
    if !extensions.requires_task_role() {
        return Ok(None);
    }

    let policies = extensions
        .role_policy
        .iter()
        .map(|document| Policy {
            policy_name: format!("{}Policy", normalize_resource_name(&service.name)),
            policy_document: document.clone(),
        })
        .collect();
    let properties = RoleProperties {
        assume_role_policy_document: PolicyDocument::assume_role(ECS_TASKS_PRINCIPAL),
        managed_policy_arns: extensions.managed_policies.clone(),
        policies,
        tags: service_tags(&project.name, &service.name),
    };
    let name = LogicalName::TaskRole(&service.name).allocate();
    graph.insert(&name, Resource::new(resource_types::ROLE, &properties)?)?;
    Ok(Some(name))
}

fn to_value(document: &PolicyDocument) -> Result<Value, EcsgraphError> {
    serde_json::to_value(document).map_err(|e| EcsgraphError::SerializationError {
        name: "policy document".to_string(),
        reason: e.to_string(),
    })
}
