//! Integration test suite for ecsgraph
//!
//! End-to-end tests that load project files from disk, convert them and
//! inspect the rendered templates, plus tests of the `ecsgraph` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `convert` and `validate` commands, exit codes and output
//! - **end_to_end**: full conversions of the fixture projects
//! - **properties**: determinism and name uniqueness over generated projects

mod cli;
mod end_to_end;
mod properties;
