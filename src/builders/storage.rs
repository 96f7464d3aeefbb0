//! Shared volume attachments.
//!
//! Every project volume is backed by a network filesystem whose id was resolved
//! before compilation. The filesystem is reachable from every subnet through a
//! mount target, and tasks mount it through an access point named after the
//! volume. Services mounting the volume depend on its mount targets.

use serde::Serialize;
use serde_json::{Value, json};

use super::Tag;
use crate::compiler::context::ResourceContext;
use crate::constants::{PROJECT_TAG, VOLUME_TAG, resource_types};
use crate::core::EcsgraphError;
use crate::graph::{Resource, ResourceGraph};
use crate::naming::LogicalName;
use crate::project::Project;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MountTargetProperties {
    file_system_id: Value,
    security_groups: Vec<Value>,
    subnet_id: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccessPointProperties {
    access_point_tags: Vec<Tag>,
    file_system_id: Value,
}

/// Declare the mount targets and access point of every project volume.
///
/// # Errors
///
/// [`EcsgraphError::ProvisioningError`] when a volume has no resolved filesystem.
pub fn build_filesystem_resources(
    graph: &mut ResourceGraph,
    context: &ResourceContext,
    project: &Project,
) -> Result<(), EcsgraphError> {
    let security_groups = context.service_security_groups(
        &context.security_groups.keys().cloned().collect::<Vec<_>>(),
    )?;

    for volume in project.volumes.keys() {
        let filesystem = filesystem_id(context, volume)?;
        for (label, subnet) in &context.subnets {
            let properties = MountTargetProperties {
                file_system_id: filesystem.clone(),
                security_groups: security_groups.clone(),
                subnet_id: subnet.clone(),
            };
            graph.insert(
                LogicalName::MountTarget {
                    volume,
                    subnet: label,
                }
                .allocate(),
                Resource::new(resource_types::MOUNT_TARGET, &properties)?,
            )?;
        }

        let properties = AccessPointProperties {
            access_point_tags: vec![Tag::new(PROJECT_TAG, &project.name), Tag::new(VOLUME_TAG, volume)],
            file_system_id: filesystem,
        };
        graph.insert(
            LogicalName::Volume(volume).allocate(),
            Resource::new(resource_types::ACCESS_POINT, &properties)?,
        )?;
    }
    Ok(())
}

/// Resolved filesystem id of a volume.
pub fn filesystem_id(context: &ResourceContext, volume: &str) -> Result<Value, EcsgraphError> {
    context.filesystems.get(volume).map(|id| json!(id)).ok_or_else(|| {
        EcsgraphError::ProvisioningError {
            volume: volume.to_string(),
            reason: "filesystem was not resolved before compilation".to_string(),
        }
    })
}

/// Mount target names of a volume, one per subnet.
pub fn mount_targets(context: &ResourceContext, volume: &str) -> Vec<String> {
    context
        .subnets
        .iter()
        .map(|(label, _)| {
            LogicalName::MountTarget {
                volume,
                subnet: label,
            }
            .allocate()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectExtensions, Service};
    use std::collections::BTreeMap;

    fn context_for(project: &Project, graph: &mut ResourceGraph) -> ResourceContext {
        let mut filesystems = BTreeMap::new();
        filesystems.insert("data".to_string(), "fs-123".to_string());
        let mut context = ResourceContext::with_filesystems(filesystems);
        context.ensure(graph, project, &ProjectExtensions::default()).unwrap();
        context
    }

    #[test]
    fn test_mount_targets_per_subnet() {
        let project = Project::new("shop").with_service(Service::new("db", "postgres")).with_volume("data");
        let mut graph = ResourceGraph::new();
        let context = context_for(&project, &mut graph);
        build_filesystem_resources(&mut graph, &context, &project).unwrap();

        let targets = mount_targets(&context, "data");
        assert_eq!(targets, vec!["dataNFSMountTargetOnSubnet1", "dataNFSMountTargetOnSubnet2"]);
        for target in &targets {
            let resource = graph.get(target).unwrap();
            assert_eq!(resource.properties["FileSystemId"], "fs-123");
            assert_eq!(resource.properties["SecurityGroups"], json!([{"Ref": "defaultNetwork"}]));
        }
        let access_point = graph.get("dataVolume").unwrap();
        assert_eq!(access_point.resource_type, "AWS::EFS::AccessPoint");
        assert_eq!(access_point.properties["AccessPointTags"][1]["Value"], "data");
    }

    #[test]
    fn test_unresolved_volume_is_a_provisioning_error() {
        let project = Project::new("shop").with_volume("cache");
        let mut graph = ResourceGraph::new();
        let context = context_for(&project, &mut graph);
        let err = build_filesystem_resources(&mut graph, &context, &project).unwrap_err();
        assert!(matches!(err, EcsgraphError::ProvisioningError { ref volume, .. } if volume == "cache"));
    }
}
