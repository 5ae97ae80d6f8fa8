//! Remote backend over a locally mounted directory
//!
//! Useful for sshfs or NFS mounts, and for exercising the engine against a
//! real filesystem. Remote `/` maps to the mount root. Commands cannot be run,
//! so remote fingerprints always come from downloads.

use crate::fs::{RemoteConnector, RemoteFs, RemoteMetadata};
use async_trait::async_trait;
use ferrosync_config::{SyncConfig, Transport};
use ferrosync_types::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A local directory acting as the remote root
#[derive(Debug, Clone)]
pub struct MountedRemote {
    root: PathBuf,
}

impl MountedRemote {
    /// Use `root` as remote `/`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local location of a remote path
    fn local(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

#[async_trait]
impl RemoteFs for MountedRemote {
    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::metadata(self.local(path))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::metadata(self.local(path))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    async fn make_dir(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir(self.local(path)).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.local(path)).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("skipping non UTF-8 entry {:?} in {}", name, path),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &str) -> Result<Option<RemoteMetadata>> {
        match tokio::fs::metadata(self.local(path)).await {
            Ok(metadata) => Ok(Some(RemoteMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.local(path)).await?)
    }

    async fn write_file(&self, remote: &str, local: &Path) -> Result<u64> {
        Ok(tokio::fs::copy(local, self.local(remote)).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(self.local(path)).await?;
        Ok(())
    }

    async fn exec(&self, _command: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn canonicalize(&self, path: &str) -> Result<String> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let resolved = tokio::fs::canonicalize(self.local(path)).await?;

        match resolved.strip_prefix(&root) {
            Ok(relative) => {
                let segments = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>();
                Ok(format!("/{}", segments.join("/")))
            }
            // Links leaving the mount still need a stable identity.
            Err(_) => Ok(resolved.to_string_lossy().replace('\\', "/")),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Connector for [`Transport::Mounted`] configurations
#[derive(Debug, Clone, Copy, Default)]
pub struct MountedConnector;

#[async_trait]
impl RemoteConnector for MountedConnector {
    async fn connect(&self, config: &SyncConfig) -> Result<Box<dyn RemoteFs>> {
        let Transport::Mounted { root } = &config.transport else {
            return Err(Error::config(format!(
                "server {} is not configured with a mount root",
                config.host
            )));
        };

        if !tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(Error::network(format!(
                "mount root {} is not available",
                root.display()
            )));
        }

        Ok(Box::new(MountedRemote::new(root.clone())))
    }
}
