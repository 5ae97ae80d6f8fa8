//! Authenticated remote session with bounded retry
//!
//! [`RemoteSession::connect`] retries the login with a fixed delay as described
//! by the configured [`RetryPolicy`](ferrosync_types::RetryPolicy). Once
//! connected, every primitive normalizes its path first and is bounded by the
//! idle timeout.

use crate::fs::{RemoteConnector, RemoteFs, RemoteMetadata};
use ferrosync_config::SyncConfig;
use ferrosync_types::{
    normalize_remote_path, remote_parent, shell_quote, ContentDigest, Error, Result,
};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One authenticated connection, owned by a single sync pass
pub struct RemoteSession {
    fs: Box<dyn RemoteFs>,
    host: String,
    idle_timeout: Duration,
    failed_attempts: u32,
    connected: bool,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host)
            .field("failed_attempts", &self.failed_attempts)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl RemoteSession {
    /// Connect and log in, retrying as configured
    ///
    /// Makes at most `max_retries + 1` attempts. When all of them fail the
    /// result is [`Error::Connection`] carrying the retry count and the last
    /// cause.
    pub async fn connect<C>(connector: &C, config: &SyncConfig) -> Result<Self>
    where
        C: RemoteConnector + ?Sized,
    {
        let policy = config.retry;
        let total = policy.total_attempts();
        let mut attempt = 0;

        loop {
            match Self::attempt(connector, config).await {
                Ok(fs) => {
                    if attempt > 0 {
                        info!(
                            host = %config.host,
                            "reconnected after {} failed attempts", attempt
                        );
                    } else {
                        debug!(host = %config.host, user = %config.user, "connected");
                    }

                    return Ok(Self {
                        fs,
                        host: config.host.clone(),
                        idle_timeout: config.timeouts.idle_timeout,
                        failed_attempts: attempt,
                        connected: true,
                    });
                }
                Err(error) => {
                    warn!(
                        host = %config.host,
                        attempt = attempt + 1,
                        "connection attempt {}/{} failed: {}",
                        attempt + 1,
                        total,
                        error
                    );

                    if !error.should_retry() {
                        return Err(error);
                    }

                    match policy.delay_after(attempt) {
                        Some(delay) => {
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            return Err(Error::Connection {
                                retries: policy.max_retries,
                                cause: Box::new(error),
                            })
                        }
                    }
                }
            }
        }
    }

    async fn attempt<C>(connector: &C, config: &SyncConfig) -> Result<Box<dyn RemoteFs>>
    where
        C: RemoteConnector + ?Sized,
    {
        let limit = config.timeouts.connect_timeout;
        tokio::time::timeout(limit, connector.connect(config))
            .await
            .map_err(|_| Error::Timeout {
                seconds: limit.as_secs(),
            })?
    }

    /// Host this session is connected to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Failed attempts before the successful login
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Whether [`disconnect`](Self::disconnect) has not been called yet
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::remote(format!(
                "session to {} is disconnected",
                self.host
            )))
        }
    }

    fn guard(&self, path: &str) -> Result<String> {
        self.ensure_connected()?;
        normalize_remote_path(path)
    }

    async fn call<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.idle_timeout, operation)
            .await
            .map_err(|_| Error::Timeout {
                seconds: self.idle_timeout.as_secs(),
            })?
    }

    /// Whether `path` is a directory
    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        let path = self.guard(path)?;
        self.call(self.fs.is_dir(&path)).await
    }

    /// Whether `path` is a regular file
    pub async fn is_file(&self, path: &str) -> Result<bool> {
        let path = self.guard(path)?;
        self.call(self.fs.is_file(&path)).await
    }

    /// Entry names of a directory
    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let path = self.guard(path)?;
        self.call(self.fs.list_dir(&path)).await
    }

    /// Metadata of `path`
    pub async fn stat(&self, path: &str) -> Result<Option<RemoteMetadata>> {
        let path = self.guard(path)?;
        self.call(self.fs.stat(&path)).await
    }

    /// Full content of a remote file
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = self.guard(path)?;
        self.call(self.fs.read_file(&path)).await
    }

    /// Resolve links in `path`
    pub async fn canonicalize(&self, path: &str) -> Result<String> {
        let path = self.guard(path)?;
        let resolved = self.call(self.fs.canonicalize(&path)).await?;
        normalize_remote_path(&resolved)
    }

    /// Run a command on the server
    ///
    /// Callers must quote any path they embed with
    /// [`shell_quote`](ferrosync_types::shell_quote).
    pub async fn exec(&self, command: &str) -> Result<Option<String>> {
        self.ensure_connected()?;
        self.call(self.fs.exec(command)).await
    }

    /// Server-side MD5 of `path`
    ///
    /// `None` when the backend cannot run commands or the output does not
    /// start with a digest (no `md5sum`, unreadable file).
    pub async fn remote_md5(&self, path: &str) -> Result<Option<ContentDigest>> {
        let path = self.guard(path)?;
        let command = format!("md5sum {} 2>/dev/null", shell_quote(&path));
        let output = self.exec(&command).await?;
        Ok(output.as_deref().and_then(ContentDigest::parse_md5sum_output))
    }

    /// Create `dir` and any missing parents, one segment at a time
    ///
    /// Returns how many directories this session created. A directory that
    /// appears between the check and the create is accepted but not counted.
    pub async fn ensure_dir_all(&self, dir: &str) -> Result<usize> {
        let dir = self.guard(dir)?;
        if self.call(self.fs.is_dir(&dir)).await? {
            return Ok(0);
        }
        let mut created = 0;

        let mut current = if dir.starts_with('/') {
            "/".to_string()
        } else {
            String::new()
        };

        for segment in dir.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = match current.as_str() {
                "" => segment.to_string(),
                "/" => format!("/{}", segment),
                _ => format!("{}/{}", current, segment),
            };

            if self.call(self.fs.is_dir(&current)).await? {
                continue;
            }

            if let Err(error) = self.call(self.fs.make_dir(&current)).await {
                // Another client may have created it in the meantime.
                if !self.call(self.fs.is_dir(&current)).await.unwrap_or(false) {
                    return Err(Error::remote_directory(&current, error.to_string()));
                }
            } else {
                debug!(host = %self.host, path = %current, "created remote directory");
                created += 1;
            }
        }

        Ok(created)
    }

    /// Upload `local` to `remote`, creating the parent chain first
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<u64> {
        let remote = self.guard(remote)?;

        let is_file = tokio::fs::metadata(local)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(Error::FileNotFound {
                path: local.to_path_buf(),
            });
        }

        if let Some(parent) = remote_parent(&remote) {
            self.ensure_dir_all(parent).await?;
        }

        self.call(self.fs.write_file(&remote, local))
            .await
            .map_err(|error| match error {
                Error::Upload { .. } => error,
                other => Error::upload(&remote, other.to_string()),
            })
    }

    /// Delete a remote file
    pub async fn delete(&self, remote: &str) -> Result<()> {
        let remote = self.guard(remote)?;
        self.call(self.fs.delete(&remote))
            .await
            .map_err(|error| match error {
                Error::Delete { .. } => error,
                other => Error::delete(&remote, other.to_string()),
            })
    }

    /// Close the connection; later calls are no-ops
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        debug!(host = %self.host, "disconnecting");
        self.call(self.fs.disconnect()).await
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        if self.connected {
            warn!(host = %self.host, "remote session dropped without disconnect");
        }
    }
}
