//! Core type system and error handling for ferrosync
//!
//! This crate provides the foundational types shared by every ferrosync crate:
//!
//! - **Error handling**: one error enum with kinds and severity levels
//! - **Path guarding**: normalization of remote paths and rejection of `..`
//! - **Fingerprints**: MD5 content digests and their provenance
//! - **Configuration values**: retry policy and timeouts
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_types::{normalize_remote_path, RelativePath, Result};
//!
//! fn example() -> Result<String> {
//!     let root = normalize_remote_path("/data/images/")?;
//!     let file = RelativePath::new("b/c.txt")?;
//!     Ok(ferrosync_types::join_remote(&root, &file))
//! }
//!
//! assert_eq!(example().unwrap(), "/data/images/b/c.txt");
//! assert!(normalize_remote_path("/data/../etc").is_err());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod path;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{RetryPolicy, TimeoutConfig};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use path::{join_remote, normalize_remote_path, remote_parent, shell_quote, RelativePath};
pub use result::Result;
pub use types::{ContentDigest, Fingerprint, FingerprintSource};
