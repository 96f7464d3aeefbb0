//! Shared filesystem resolution.
//!
//! Every project volume is backed by a network filesystem. Before compilation
//! starts, each volume is looked up by its tags through a [`FilesystemResolver`]
//! and created when the lookup comes back empty. Lookups run one volume at a
//! time and the ids are memoized in a map keyed by volume name, which the
//! compiler reads without further synchronization.
//!
//! The tags always contain the project and volume names; volume labels are
//! added on top.

use std::collections::BTreeMap;
use std::future::Future;

use crate::constants::{PROJECT_TAG, VOLUME_TAG};
use crate::core::EcsgraphError;
use crate::project::Project;

/// Tags identifying a volume's filesystem.
pub type FilesystemTags = BTreeMap<String, String>;

/// Finds or provisions the filesystem backing a volume.
pub trait FilesystemResolver: Send + Sync {
    /// Look up a filesystem carrying all `tags`. `Ok(None)` when there is none.
    fn find_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<Option<String>, EcsgraphError>> + Send;

    /// Provision a new filesystem tagged with `tags` and return its id.
    fn create_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<String, EcsgraphError>> + Send;
}

/// Tags of a project volume.
pub fn filesystem_tags(project: &Project, volume: &str) -> FilesystemTags {
    let mut tags = project.volumes.get(volume).map(|config| config.labels.clone()).unwrap_or_default();
    tags.insert(PROJECT_TAG.to_string(), project.name.clone());
    tags.insert(VOLUME_TAG.to_string(), volume.to_string());
    tags
}

/// Resolve the filesystem of every project volume, in name order.
///
/// # Errors
///
/// Fails on the first lookup or creation error; nothing is retried.
pub async fn resolve_filesystems<R: FilesystemResolver>(
    resolver: &R,
    project: &Project,
) -> Result<BTreeMap<String, String>, EcsgraphError> {
    let mut resolved = BTreeMap::new();
    for volume in project.volumes.keys() {
        let tags = filesystem_tags(project, volume);
        let id = match resolver.find_filesystem(&tags).await? {
            Some(id) => {
                tracing::debug!("Volume '{}' uses existing filesystem {}", volume, id);
                id
            }
            None => {
                tracing::info!("Creating filesystem for volume '{}'", volume);
                resolver.create_filesystem(&tags).await?
            }
        };
        resolved.insert(volume.clone(), id);
    }
    Ok(resolved)
}

/// Resolver backed by the `[filesystems]` table of the configuration file.
///
/// Finds filesystems by volume name. It cannot provision new ones, so an
/// unlisted volume fails with a [`EcsgraphError::ProvisioningError`].
#[derive(Debug, Clone, Default)]
pub struct ConfiguredFilesystems {
    filesystems: BTreeMap<String, String>,
}

impl ConfiguredFilesystems {
    /// Resolver over a volume name → filesystem id table.
    pub fn new(filesystems: BTreeMap<String, String>) -> Self {
        Self {
            filesystems,
        }
    }
}

impl FilesystemResolver for ConfiguredFilesystems {
    fn find_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<Option<String>, EcsgraphError>> + Send {
        let found = tags.get(VOLUME_TAG).and_then(|volume| self.filesystems.get(volume)).cloned();
        async move { Ok(found) }
    }

    fn create_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<String, EcsgraphError>> + Send {
        let volume = tags.get(VOLUME_TAG).cloned().unwrap_or_default();
        async move {
            Err(EcsgraphError::ProvisioningError {
                reason: format!(
                    "no filesystem configured for volume '{volume}'; add it to the [filesystems] table"
                ),
                volume,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_tags_include_labels() {
        let mut project = Project::new("shop").with_volume("data");
        project.volumes.get_mut("data").unwrap().labels.insert("tier".to_string(), "gold".to_string());

        let tags = filesystem_tags(&project, "data");
        assert_eq!(tags[PROJECT_TAG], "shop");
        assert_eq!(tags[VOLUME_TAG], "data");
        assert_eq!(tags["tier"], "gold");
    }

    #[tokio::test]
    async fn test_configured_filesystems() {
        let mut table = BTreeMap::new();
        table.insert("data".to_string(), "fs-123".to_string());
        let resolver = ConfiguredFilesystems::new(table);

        let project = Project::new("shop").with_volume("data");
        let resolved = resolve_filesystems(&resolver, &project).await.unwrap();
        assert_eq!(resolved["data"], "fs-123");

        let project = project.with_volume("cache");
        let err = resolve_filesystems(&resolver, &project).await.unwrap_err();
        assert!(matches!(err, EcsgraphError::ProvisioningError { ref volume, .. } if volume == "cache"));
    }
}
