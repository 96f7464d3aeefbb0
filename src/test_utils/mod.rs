//! Test utilities for ecsgraph
//!
//! Helpers shared by unit tests and the integration suite: one-time logging
//! setup, fixture projects and an in-memory [`FilesystemResolver`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ecsgraph::test_utils::{fixtures, init_test_logging};
//!
//! init_test_logging(None);
//! let dir = tempfile::tempdir().unwrap();
//! let path = fixtures::write_project(dir.path(), fixtures::SHOP_PROJECT).unwrap();
//! ```

pub mod fixtures;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::constants::VOLUME_TAG;
use crate::core::EcsgraphError;
use crate::storage::{FilesystemResolver, FilesystemTags};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`. Without either, tests stay
/// silent. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=ecsgraph=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// In-memory filesystem resolver that records every call.
///
/// Known filesystems are looked up by volume name; creating one assigns
/// `fs-created-<volume>`.
#[derive(Debug, Default)]
pub struct RecordingResolver {
    existing: BTreeMap<String, String>,
    lookups: Mutex<Vec<FilesystemTags>>,
    created: Mutex<Vec<String>>,
}

impl RecordingResolver {
    /// Resolver that knows no filesystems; every volume gets created.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing filesystem for `volume`.
    pub fn with_existing(mut self, volume: &str, id: &str) -> Self {
        self.existing.insert(volume.to_string(), id.to_string());
        self
    }

    /// Tags of every lookup, in call order.
    pub fn lookups(&self) -> Vec<FilesystemTags> {
        self.lookups.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Volumes a filesystem was created for, in call order.
    pub fn created(&self) -> Vec<String> {
        self.created.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl FilesystemResolver for RecordingResolver {
    fn find_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<Option<String>, EcsgraphError>> + Send {
        if let Ok(mut calls) = self.lookups.lock() {
            calls.push(tags.clone());
        }
        let found = tags.get(VOLUME_TAG).and_then(|volume| self.existing.get(volume)).cloned();
        async move { Ok(found) }
    }

    fn create_filesystem(
        &self,
        tags: &FilesystemTags,
    ) -> impl Future<Output = Result<String, EcsgraphError>> + Send {
        let volume = tags.get(VOLUME_TAG).cloned().unwrap_or_default();
        if let Ok(mut calls) = self.created.lock() {
            calls.push(volume.clone());
        }
        async move { Ok(format!("fs-created-{volume}")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::storage::resolve_filesystems;

    #[tokio::test]
    async fn test_recording_resolver_finds_then_creates() {
        let resolver = RecordingResolver::new().with_existing("data", "fs-1");
        let project = Project::new("shop").with_volume("data").with_volume("cache");

        let resolved = resolve_filesystems(&resolver, &project).await.unwrap();
        assert_eq!(resolved["data"], "fs-1");
        assert_eq!(resolved["cache"], "fs-created-cache");

        // name order: cache before data
        let lookups = resolver.lookups();
        assert_eq!(lookups.len(), 2);
        assert_eq!(lookups[0][VOLUME_TAG], "cache");
        assert_eq!(resolver.created(), vec!["cache"]);
    }
}
