//! Resource builders.
//!
//! Each builder derives one family of resource declarations from the project
//! model and appends them to the [`ResourceGraph`](crate::graph::ResourceGraph)
//! it is handed. Builders never keep the graph past the call and never
//! remove or rename an entry.
//!
//! | Builder | Declares |
//! |---------|----------|
//! | [`permissions`] | task execution role, optional task role |
//! | [`exposure`] | ingress rules, target groups, listeners |
//! | [`discovery`] | private DNS namespace, registry entries |
//! | [`rolling_update`] | nothing; resolves deployment bounds |
//! | [`compute`] | task definition, service |
//! | [`storage`] | mount targets, access points |
//! | [`autoscaling`] | scaling role, scalable target, scaling policy |

pub mod autoscaling;
pub mod compute;
pub mod discovery;
pub mod exposure;
pub mod permissions;
pub mod rolling_update;
pub mod storage;

use serde::{Deserialize, Serialize};

use crate::constants::{PROJECT_TAG, SERVICE_TAG};

/// A resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Tags put on every project-scoped resource.
pub fn project_tags(project: &str) -> Vec<Tag> {
    vec![Tag::new(PROJECT_TAG, project)]
}

/// Tags put on every service-scoped resource.
pub fn service_tags(project: &str, service: &str) -> Vec<Tag> {
    vec![Tag::new(PROJECT_TAG, project), Tag::new(SERVICE_TAG, service)]
}
