//! Remote file access capability traits
//!
//! A [`RemoteFs`] is one authenticated connection to a server. Paths handed to
//! it are already normalized by the session; backends do not re-validate them.

use async_trait::async_trait;
use ferrosync_config::SyncConfig;
use ferrosync_types::Result;
use std::path::Path;

/// Metadata returned by [`RemoteFs::stat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Primitive operations over one authenticated remote connection
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Whether `path` is an existing directory
    async fn is_dir(&self, path: &str) -> Result<bool>;

    /// Whether `path` is an existing regular file
    async fn is_file(&self, path: &str) -> Result<bool>;

    /// Create a single directory; the parent must already exist
    async fn make_dir(&self, path: &str) -> Result<()>;

    /// Entry names of a directory, without `.` and `..`
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Metadata of `path`, `None` if it does not exist
    async fn stat(&self, path: &str) -> Result<Option<RemoteMetadata>>;

    /// Full content of a remote file
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Write the content of `local` to `remote`, returning the bytes written
    async fn write_file(&self, remote: &str, local: &Path) -> Result<u64>;

    /// Delete a remote file
    async fn delete(&self, path: &str) -> Result<()>;

    /// Run a shell command, `None` when the backend cannot execute commands
    async fn exec(&self, command: &str) -> Result<Option<String>>;

    /// Resolve links in `path`
    async fn canonicalize(&self, path: &str) -> Result<String> {
        Ok(path.to_string())
    }

    /// Close the connection
    async fn disconnect(&self) -> Result<()>;
}

/// Opens connections for a [`SyncConfig`]
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// One transport-open-plus-login attempt
    ///
    /// A rejected login is reported as [`ferrosync_types::Error::Authentication`].
    async fn connect(&self, config: &SyncConfig) -> Result<Box<dyn RemoteFs>>;
}
