//! One-way directory synchronization for ferrosync
//!
//! This crate mirrors a local directory onto a remote one:
//!
//! - **Local manifests**: every regular file fingerprinted with MD5
//! - **Remote manifests**: server-side `md5sum`, bounded download fallback,
//!   cycle-safe traversal
//! - **Diffing**: upload and delete sets computed as a pure function
//! - **Orchestration**: a state machine that records per-file failures and
//!   only aborts when the connection cannot be established
//! - **Events**: pluggable progress sinks
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_config::SyncConfig;
//! use ferrosync_remote::{MemoryConnector, MemoryRemote};
//! use ferrosync_sync::SyncOrchestrator;
//!
//! # async fn example() -> ferrosync_types::Result<()> {
//! let config = SyncConfig::builder("192.168.1.12", "syncuser")
//!     .password("secret")
//!     .build()?;
//! let remote = MemoryRemote::new();
//!
//! let mut orchestrator = SyncOrchestrator::new(MemoryConnector::new(remote), config);
//! let result = orchestrator.sync("./public", "/data/images", false).await?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod engine;
pub mod events;
pub mod manifest;
pub mod remote_manifest;

pub use diff::{ChangeType, DiffEngine, SyncPlan};
pub use engine::{SyncOrchestrator, SyncPhase, SyncRequest, SyncResult};
pub use events::{ChannelSink, EventLevel, EventSink, FnSink, NoopSink, SyncEvent};
pub use manifest::{LocalManifestBuilder, Manifest, ScanFailure, ScanOutcome};
pub use remote_manifest::RemoteManifestBuilder;
