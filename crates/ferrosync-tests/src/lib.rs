//! ferrosync integration testing support
//!
//! This crate hosts end-to-end tests that drive the sync engine against the
//! in-memory and mounted backends, plus the fixtures they share.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Shared fixtures for integration tests
///
/// Local tree builders, server configurations and remote listings used
/// across the integration test files.
pub mod test_utils;
