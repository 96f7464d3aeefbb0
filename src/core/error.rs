//! Error handling for ecsgraph
//!
//! This module provides the error types and user-friendly error reporting for the
//! compiler. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers (and tests) can match on the failure mode
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Configuration**: [`EcsgraphError::ConfigurationError`] and
//!   [`EcsgraphError::ExtensionTypeError`] for malformed or contradictory deployment
//!   settings. Always fatal, raised before any resource is emitted for the service.
//! - **I/O**: [`EcsgraphError::SecretReadError`] when a file-backed secret cannot be
//!   read, [`EcsgraphError::IoError`] for everything else.
//! - **Provisioning**: [`EcsgraphError::ProvisioningError`] when the storage
//!   collaborator cannot find or create a filesystem.
//! - **Graph integrity**: [`EcsgraphError::DuplicateResource`],
//!   [`EcsgraphError::MissingDependency`] and [`EcsgraphError::CircularDependency`].
//! - **Input**: [`EcsgraphError::ProjectNotFound`], [`EcsgraphError::ProjectParseError`]
//!   and [`EcsgraphError::ProjectValidationError`].
//!
//! None of these are retried. A compilation either produces the complete graph or
//! fails with one of them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ecsgraph::core::{EcsgraphError, ErrorContext, user_friendly_error};
//!
//! let error = EcsgraphError::ConfigurationError {
//!     service: "web".to_string(),
//!     reason: "rolling update configuration requires deploy.replicas to be set".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for compiler operations
///
/// Each variant carries enough context (service, volume, resource name) to point
/// the user at the offending part of their project file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsgraphError {
    /// Malformed or contradictory deployment configuration for a service
    #[error("Invalid configuration for service '{service}': {reason}")]
    ConfigurationError {
        /// Service whose configuration is invalid
        service: String,
        /// Description of the problem
        reason: String,
    },

    /// A vendor extension value does not have the expected shape
    #[error("Extension '{key}' on {scope} must be {expected}")]
    ExtensionTypeError {
        /// Where the extension was declared (e.g. `service "web"`)
        scope: String,
        /// Extension key
        key: String,
        /// Human readable description of the expected type
        expected: String,
    },

    /// A file-backed secret could not be read
    #[error("Failed to read secret '{secret}'")]
    SecretReadError {
        /// Secret name in the project
        secret: String,
        /// Detailed message including the path and the underlying I/O error
        message: String,
    },

    /// The storage collaborator failed to find or create a filesystem
    #[error("Failed to provision filesystem for volume '{volume}': {reason}")]
    ProvisioningError {
        /// Volume name in the project
        volume: String,
        /// Reason reported by the collaborator
        reason: String,
    },

    /// Two builders tried to declare the same logical name
    #[error("Resource '{name}' is declared more than once")]
    DuplicateResource {
        /// Logical resource name
        name: String,
    },

    /// A dependency edge points at a resource that is not in the graph
    #[error("Resource '{resource}' depends on undeclared resource '{dependency}'")]
    MissingDependency {
        /// Resource carrying the dangling dependency
        resource: String,
        /// Name that is not a key in the graph
        dependency: String,
    },

    /// Dependency edges form a cycle
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Cycle rendered as `a → b → a`
        chain: String,
    },

    /// No project file was found
    #[error("No project file found in {path}")]
    ProjectNotFound {
        /// Directory or path that was searched
        path: String,
    },

    /// The project file could not be parsed
    #[error("Invalid project file syntax in {file}")]
    ProjectParseError {
        /// File path
        file: String,
        /// Parser message
        reason: String,
    },

    /// The project failed compatibility pre-validation
    #[error("Project validation failed:\n  - {}", .problems.join("\n  - "))]
    ProjectValidationError {
        /// Every problem found, in a stable order
        problems: Vec<String>,
    },

    /// Rendering a resource declaration into its property bag failed
    #[error("Failed to serialize resource '{name}': {reason}")]
    SerializationError {
        /// Logical resource name
        name: String,
        /// serde message
        reason: String,
    },

    /// Generic I/O failure outside of secret materialization
    #[error("I/O error: {0}")]
    IoError(String),

    /// Anything else
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl From<std::io::Error> for EcsgraphError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

impl EcsgraphError {
    /// Shorthand for [`EcsgraphError::ConfigurationError`].
    pub fn configuration(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

/// Error wrapper with user-facing suggestion and details
///
/// Created by [`user_friendly_error`] at the CLI boundary and printed with
/// [`ErrorContext::display`].
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: EcsgraphError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: EcsgraphError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`EcsgraphError`] anywhere in the `anyhow` chain, then
/// [`std::io::Error`], and falls back to a generic context that carries the full
/// cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(known) = error.chain().find_map(|cause| cause.downcast_ref::<EcsgraphError>()) {
        return create_error_context(known.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return ErrorContext::new(EcsgraphError::IoError(io_error.to_string()))
            .with_suggestion("Check that the file exists and is readable");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(EcsgraphError::Other {
        message,
    })
}

fn create_error_context(error: EcsgraphError) -> ErrorContext {
    match &error {
        EcsgraphError::ConfigurationError { reason, .. } => {
            let suggestion = if reason.contains("replicas") {
                "Set deploy.replicas to a value greater than or equal to deploy.update_config.parallelism"
            } else if reason.contains("autoscaling") {
                "Declare x-ecs.autoscaling with a positive 'max' and at most one of 'cpu' or 'memory'"
            } else {
                "Review the deploy section of the service in your project file"
            };
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("Deployment settings are checked before any resource is emitted")
        }
        EcsgraphError::ExtensionTypeError { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the value under the x-ecs block so it has the expected type"),
        EcsgraphError::SecretReadError { message, .. } => {
            let details = message.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check the 'file' path of the secret, or mark it 'external: true'")
        }
        EcsgraphError::ProvisioningError { .. } => ErrorContext::new(error)
            .with_suggestion(
                "Map the volume to an existing filesystem id in the [filesystems] table of the ecsgraph config",
            )
            .with_details("Volumes are backed by shared filesystems that must be resolved before compilation"),
        EcsgraphError::DuplicateResource { .. } => ErrorContext::new(error)
            .with_suggestion("Rename one of the services, networks or volumes so their names differ once punctuation is removed")
            .with_details("Logical names are derived by stripping every non-alphanumeric character"),
        EcsgraphError::ProjectNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run the command from the directory containing compose.yaml, or pass the file path explicitly"),
        EcsgraphError::ProjectParseError { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check the YAML syntax of the project file")
        }
        EcsgraphError::ProjectValidationError { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the listed problems; compilation does not start until the project validates"),
        _ => ErrorContext::new(error),
    }
}
