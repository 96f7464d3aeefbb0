//! The complete infrastructure template handed to the provisioning engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::EcsgraphError;
use crate::graph::ResourceGraph;

/// Template format version understood by the provisioning engine.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// An input parameter supplied when the template is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter type, e.g. `AWS::EC2::VPC::Id`.
    #[serde(rename = "Type")]
    pub parameter_type: String,
    /// Shown to whoever deploys the template.
    pub description: String,
}

impl Parameter {
    /// A parameter of the given type.
    pub fn new(parameter_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            parameter_type: parameter_type.into(),
            description: description.into(),
        }
    }
}

/// Parameters, resources and metadata of one compiled project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Always [`TEMPLATE_FORMAT_VERSION`].
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    /// Free-form description.
    #[serde(rename = "Description")]
    pub description: String,

    /// Deploy-time parameters.
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,

    /// Resource declarations.
    #[serde(rename = "Resources")]
    pub resources: ResourceGraph,
}

impl Template {
    /// Wrap a finished graph.
    pub fn new(
        project: &str,
        parameters: BTreeMap<String, Parameter>,
        resources: ResourceGraph,
    ) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: format!("Containerized application '{project}'"),
            parameters,
            resources,
        }
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, EcsgraphError> {
        serde_json::to_string_pretty(self).map_err(|e| EcsgraphError::SerializationError {
            name: "template".to_string(),
            reason: e.to_string(),
        })
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, EcsgraphError> {
        serde_yaml::to_string(self).map_err(|e| EcsgraphError::SerializationError {
            name: "template".to_string(),
            reason: e.to_string(),
        })
    }
}
