//! Project file discovery and loading.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::Project;
use crate::core::{EcsgraphError, FileOperation, FileResultExt};

/// File names searched for, in order of preference.
pub const PROJECT_FILE_NAMES: [&str; 4] =
    ["compose.yaml", "compose.yml", "docker-compose.yaml", "docker-compose.yml"];

impl Project {
    /// Load a project from a YAML file.
    ///
    /// Relative secret paths are resolved against the file's directory, and the
    /// project name falls back to that directory's name when the file has no
    /// `name` key.
    ///
    /// # Errors
    ///
    /// - the file cannot be read
    /// - [`EcsgraphError::ProjectParseError`] when the YAML is malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_file_context(
            FileOperation::Read,
            path,
            "reading project file",
        )?;

        let working_dir = path
            .parent()
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .ok_or_else(|| anyhow::anyhow!("Project path has no parent directory"))?;
        let fallback_name = working_dir
            .canonicalize()
            .ok()
            .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_default();

        let mut project = Self::from_yaml_str(&content, &fallback_name)
            .map_err(|e| match e {
                EcsgraphError::ProjectParseError {
                    reason, ..
                } => EcsgraphError::ProjectParseError {
                    file: path.display().to_string(),
                    reason,
                },
                other => other,
            })
            .with_context(|| format!("Invalid YAML in project file: {}", path.display()))?;
        project.working_dir = Some(working_dir.to_path_buf());

        tracing::debug!(
            "Loaded project '{}' with {} services from {}",
            project.name,
            project.services.len(),
            path.display()
        );
        Ok(project)
    }

    /// Parse a project from YAML text.
    ///
    /// Service names are filled in from their keys; `fallback_name` is used
    /// (after sanitizing) when the document has no `name`.
    pub fn from_yaml_str(content: &str, fallback_name: &str) -> Result<Self, EcsgraphError> {
        let mut project: Project =
            serde_yaml::from_str(content).map_err(|e| EcsgraphError::ProjectParseError {
                file: "<input>".to_string(),
                reason: e.to_string(),
            })?;

        for (name, service) in &mut project.services {
            service.name.clone_from(name);
        }
        if project.name.is_empty() {
            project.name = sanitize_project_name(fallback_name);
        }
        Ok(project)
    }
}

/// Lower-case a directory name and drop characters not allowed in project names.
pub fn sanitize_project_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Find a project file in `dir` or any of its parents.
///
/// # Errors
///
/// Returns [`EcsgraphError::ProjectNotFound`] when the filesystem root is
/// reached without finding one of [`PROJECT_FILE_NAMES`].
pub fn find_project_file(dir: &Path) -> Result<PathBuf> {
    let mut current = dir.to_path_buf();
    loop {
        if let Some(found) =
            PROJECT_FILE_NAMES.iter().map(|name| current.join(name)).find(|path| path.is_file())
        {
            return Ok(found);
        }
        if !current.pop() {
            return Err(EcsgraphError::ProjectNotFound {
                path: dir.display().to_string(),
            }
            .into());
        }
    }
}

/// Use `explicit` when given, otherwise search from the current directory.
pub fn find_project_file_with_optional(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(EcsgraphError::ProjectNotFound {
            path: path.display().to_string(),
        }
        .into()),
        None => {
            let current = std::env::current_dir().context("Cannot determine current working directory")?;
            find_project_file(&current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::SecretSpec;

    const SHOP: &str = r#"
name: shop
services:
  web:
    image: nginx
    ports: ["8080:80"]
networks:
  back:
volumes:
  data:
    labels:
      tier: storage
secrets:
  db:
    file: db.txt
"#;

    #[test]
    fn test_from_yaml_fills_names() {
        let project = Project::from_yaml_str(SHOP, "ignored").unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.services["web"].name, "web");
        assert!(project.networks.contains_key("back"));
        assert_eq!(project.volumes["data"].labels["tier"], "storage");
        assert_eq!(project.secrets["db"], SecretSpec::file("db.txt"));
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let project = Project::from_yaml_str("services: {}", "My Shop!").unwrap();
        assert_eq!(project.name, "myshop");
    }

    #[test]
    fn test_parse_error() {
        let err = Project::from_yaml_str("services: [", "x").unwrap_err();
        assert!(matches!(err, EcsgraphError::ProjectParseError { .. }));
    }

    #[test]
    fn test_load_and_find() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("docker-compose.yml");
        std::fs::write(&path, SHOP).unwrap();

        let nested = temp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        assert_eq!(find_project_file(&nested).unwrap(), path);

        let project = Project::load(&path).unwrap();
        assert_eq!(project.working_dir.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = find_project_file_with_optional(Some(PathBuf::from("/nonexistent/compose.yaml")))
            .unwrap_err();
        assert!(err.downcast_ref::<EcsgraphError>().is_some());
    }
}
