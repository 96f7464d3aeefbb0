//! Rolling-update bounds.
//!
//! A rolling update replaces tasks while keeping the running count between
//! `min_percent` and `max_percent` of the desired count. Without any update
//! configuration the bounds are 100/200: nothing goes down before its
//! replacement is up, one extra task at a time.
//!
//! With `parallelism` set, the bounds are derived so that exactly that many
//! tasks are stopped (or started on top) at once:
//!
//! ```text
//! min = (replicas - parallelism) * 100 / replicas
//! max = (replicas + parallelism) * 100 / replicas
//! ```
//!
//! using truncating integer division. `min-percent` and `max-percent` in the
//! `update_config` extensions override either bound; when both are given they
//! are returned verbatim and parallelism is not looked at.

use crate::constants::{DEFAULT_MAX_PERCENT, DEFAULT_MIN_PERCENT};
use crate::core::EcsgraphError;
use crate::project::{Service, UpdateExtensions};

/// Deployment bounds of a service, in percent of its desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingUpdateLimits {
    /// Minimum healthy percent.
    pub min_percent: u32,
    /// Maximum percent.
    pub max_percent: u32,
}

impl Default for RollingUpdateLimits {
    fn default() -> Self {
        Self {
            min_percent: DEFAULT_MIN_PERCENT,
            max_percent: DEFAULT_MAX_PERCENT,
        }
    }
}

/// Resolve the rolling-update bounds of a service.
///
/// # Errors
///
/// - [`EcsgraphError::ConfigurationError`] when parallelism is set without
///   replicas, or replicas is lower than parallelism (or zero)
/// - [`EcsgraphError::ExtensionTypeError`] when an override is not an integer
pub fn resolve(service: &Service) -> Result<RollingUpdateLimits, EcsgraphError> {
    let Some(update) = service.deploy.as_ref().and_then(|deploy| deploy.update_config.as_ref())
    else {
        return Ok(RollingUpdateLimits::default());
    };

    let overrides = UpdateExtensions::decode(service)?;
    if let (Some(min_percent), Some(max_percent)) = (overrides.min_percent, overrides.max_percent) {
        return Ok(RollingUpdateLimits {
            min_percent,
            max_percent,
        });
    }

    let Some(parallelism) = update.parallelism else {
        return Ok(RollingUpdateLimits {
            min_percent: overrides.min_percent.unwrap_or(DEFAULT_MIN_PERCENT),
            max_percent: overrides.max_percent.unwrap_or(DEFAULT_MAX_PERCENT),
        });
    };

    let Some(replicas) = service.replicas() else {
        return Err(EcsgraphError::configuration(
            &service.name,
            "rolling update configuration requires deploy.replicas to be set",
        ));
    };
    if replicas == 0 || replicas < parallelism {
        return Err(EcsgraphError::configuration(
            &service.name,
            format!("replicas must be greater than parallelism (replicas: {replicas}, parallelism: {parallelism})"),
        ));
    }

    let (replicas, parallelism) = (u64::from(replicas), u64::from(parallelism));
    let derived_min = (replicas - parallelism) * 100 / replicas;
    let derived_max = (replicas + parallelism) * 100 / replicas;

    Ok(RollingUpdateLimits {
        min_percent: overrides.min_percent.unwrap_or(derived_min as u32),
        max_percent: overrides.max_percent.unwrap_or(derived_max as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::extensions::keys;
    use crate::project::{DeployConfig, UpdateConfig};
    use serde_json::json;

    fn service(replicas: Option<u32>, parallelism: Option<u32>, overrides: &[(&str, u32)]) -> Service {
        let mut update = UpdateConfig {
            parallelism,
            ..UpdateConfig::default()
        };
        for (key, value) in overrides {
            update.extensions.insert((*key).to_string(), json!(value));
        }
        Service::new("web", "nginx").with_deploy(DeployConfig {
            replicas,
            update_config: Some(update),
            resources: None,
        })
    }

    fn limits(min_percent: u32, max_percent: u32) -> RollingUpdateLimits {
        RollingUpdateLimits {
            min_percent,
            max_percent,
        }
    }

    #[test]
    fn test_defaults_without_update_config() {
        assert_eq!(resolve(&Service::new("web", "nginx")).unwrap(), limits(100, 200));
        let replicas_only = Service::new("web", "nginx").with_deploy(DeployConfig::replicas(3));
        assert_eq!(resolve(&replicas_only).unwrap(), limits(100, 200));
        assert_eq!(resolve(&service(Some(3), None, &[])).unwrap(), limits(100, 200));
    }

    #[test]
    fn test_derived_from_parallelism() {
        assert_eq!(resolve(&service(Some(4), Some(1), &[])).unwrap(), limits(75, 125));
        assert_eq!(resolve(&service(Some(2), Some(2), &[])).unwrap(), limits(0, 200));
        assert_eq!(resolve(&service(Some(3), Some(1), &[])).unwrap(), limits(66, 133));
    }

    #[test]
    fn test_replicas_lower_than_parallelism() {
        let err = resolve(&service(Some(1), Some(2), &[])).unwrap_err();
        assert!(matches!(err, EcsgraphError::ConfigurationError { .. }));
        assert!(err.to_string().contains("replicas must be greater than parallelism"));
    }

    #[test]
    fn test_parallelism_requires_replicas() {
        let err = resolve(&service(None, Some(1), &[])).unwrap_err();
        assert!(matches!(err, EcsgraphError::ConfigurationError { ref service, .. } if service == "web"));
    }

    #[test]
    fn test_zero_replicas_is_rejected() {
        assert!(resolve(&service(Some(0), Some(0), &[])).is_err());
    }

    #[test]
    fn test_explicit_overrides_win() {
        let both = service(Some(4), Some(1), &[(keys::MIN_PERCENT, 50), (keys::MAX_PERCENT, 150)]);
        assert_eq!(resolve(&both).unwrap(), limits(50, 150));

        // both overrides present: an invalid parallelism is never looked at
        let invalid = service(Some(1), Some(5), &[(keys::MIN_PERCENT, 50), (keys::MAX_PERCENT, 150)]);
        assert_eq!(resolve(&invalid).unwrap(), limits(50, 150));
    }

    #[test]
    fn test_single_override_combines_with_derived_bound() {
        let min_only = service(Some(4), Some(1), &[(keys::MIN_PERCENT, 50)]);
        assert_eq!(resolve(&min_only).unwrap(), limits(50, 125));

        let max_only = service(Some(4), None, &[(keys::MAX_PERCENT, 150)]);
        assert_eq!(resolve(&max_only).unwrap(), limits(100, 150));
    }
}
