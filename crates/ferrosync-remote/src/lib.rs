//! Remote file access for ferrosync
//!
//! This crate wraps a remote-file-access backend in a [`RemoteSession`]:
//!
//! - **Bounded retry**: login attempts with a fixed delay and a typed error on
//!   exhaustion
//! - **Path guarding**: every path is normalized and `..` segments are refused
//!   before any backend call
//! - **Timeouts**: a connect timeout per attempt and an idle timeout per call
//! - **Backends**: in-memory, mounted directory, and SFTP (`ssh` feature)
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_config::SyncConfig;
//! use ferrosync_remote::{MemoryConnector, MemoryRemote, RemoteSession};
//!
//! # async fn example() -> ferrosync_types::Result<()> {
//! let remote = MemoryRemote::new().with_file("/srv/a.txt", "hi");
//! let config = SyncConfig::builder("10.0.0.1", "deploy")
//!     .password("secret")
//!     .build()?;
//!
//! let mut session = RemoteSession::connect(&MemoryConnector::new(remote), &config).await?;
//! assert!(session.is_file("/srv/a.txt").await?);
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod fs;
pub mod memory;
pub mod mounted;
pub mod session;
#[cfg(feature = "ssh")]
pub mod ssh;

pub use fs::{RemoteConnector, RemoteFs, RemoteMetadata};
pub use memory::{MemoryConnector, MemoryRemote};
pub use mounted::{MountedConnector, MountedRemote};
pub use session::RemoteSession;
#[cfg(feature = "ssh")]
pub use ssh::{SftpConnector, SftpRemote};
