//! Core types shared by every part of ecsgraph
//!
//! ## `error` - Error Handling
//!
//! - [`EcsgraphError`] - Enumerated failure modes (configuration, I/O, provisioning,
//!   graph integrity, input)
//! - [`ErrorContext`] - User-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - Convert any `anyhow::Error` for CLI display
//!
//! ## `file_error` - File Operation Context
//!
//! - [`FileOperationError`] - I/O error annotated with path, operation and purpose
//! - [`FileResultExt`] - Attach that context to any `io::Result`
//!
//! # Error Flow
//!
//! Library code (builders, the compiler, the storage resolver) returns
//! `Result<T, EcsgraphError>` so callers can match on the variant. Application
//! code (the converter pipeline and the CLI) works in `anyhow::Result` and adds
//! `.context(...)`; at the very top `main` turns the error into an
//! [`ErrorContext`] and prints it.

pub mod error;
pub mod file_error;

pub use error::{EcsgraphError, ErrorContext, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileOps, FileResultExt};
