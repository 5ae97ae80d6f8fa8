//! SFTP backend built on `ssh2`
//!
//! libssh2 is blocking, so every call runs on the blocking thread pool. One
//! lock serializes calls because an SFTP channel is not safe for concurrent
//! use.

use crate::fs::{RemoteConnector, RemoteFs, RemoteMetadata};
use async_trait::async_trait;
use ferrosync_config::{Credential, SyncConfig};
use ferrosync_types::{Error, Result};
use ssh2::{ErrorCode, Session, Sftp};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// libssh2's `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

fn remote_error(error: ssh2::Error) -> Error {
    Error::remote(error.to_string())
}

struct SftpInner {
    session: Session,
    sftp: Sftp,
}

impl SftpInner {
    fn open(config: &SyncConfig) -> Result<Self> {
        let address = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| Error::network(format!("cannot resolve {}: {}", config.address(), e)))?
            .next()
            .ok_or_else(|| Error::network(format!("no address for {}", config.address())))?;

        let tcp = TcpStream::connect_timeout(&address, config.timeouts.connect_timeout)
            .map_err(|e| Error::network(format!("connect to {} failed: {}", address, e)))?;

        let mut session = Session::new().map_err(remote_error)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(
            u32::try_from(config.timeouts.idle_timeout.as_millis()).unwrap_or(u32::MAX),
        );
        session
            .handshake()
            .map_err(|e| Error::network(format!("SSH handshake failed: {}", e)))?;

        let login = match &config.credential {
            Credential::Password(password) => session.userauth_password(&config.user, password),
            Credential::PrivateKey { key, passphrase } => {
                session.userauth_pubkey_memory(&config.user, None, key, passphrase.as_deref())
            }
        };
        login.map_err(|e| Error::authentication(e.to_string()))?;
        if !session.authenticated() {
            return Err(Error::authentication(format!(
                "login rejected for {}@{}",
                config.user, config.host
            )));
        }

        let sftp = session.sftp().map_err(remote_error)?;
        debug!(host = %config.host, method = config.credential.method(), "SFTP session opened");

        Ok(Self { session, sftp })
    }
}

/// SFTP connection
#[derive(Clone)]
pub struct SftpRemote {
    inner: Arc<Mutex<SftpInner>>,
}

impl SftpRemote {
    async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&SftpInner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            operation(&guard)
        })
        .await
        .map_err(|e| Error::other(format!("SFTP task failed: {}", e)))?
    }
}

#[async_trait]
impl RemoteFs for SftpRemote {
    async fn is_dir(&self, path: &str) -> Result<bool> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| Ok(inner.sftp.stat(&path).map(|s| s.is_dir()).unwrap_or(false)))
            .await
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| {
            Ok(inner.sftp.stat(&path).map(|s| s.is_file()).unwrap_or(false))
        })
        .await
    }

    async fn make_dir(&self, path: &str) -> Result<()> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| inner.sftp.mkdir(&path, 0o755).map_err(remote_error))
            .await
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| {
            let entries = inner.sftp.readdir(&path).map_err(remote_error)?;
            Ok(entries
                .into_iter()
                .filter_map(|(entry, _)| {
                    entry.file_name().and_then(|n| n.to_str()).map(str::to_string)
                })
                .filter(|name| name != "." && name != "..")
                .collect())
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<Option<RemoteMetadata>> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| match inner.sftp.stat(&path) {
            Ok(stat) => Ok(Some(RemoteMetadata {
                size: stat.size.unwrap_or(0),
                is_dir: stat.is_dir(),
            })),
            Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(None),
            Err(e) => Err(remote_error(e)),
        })
        .await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| {
            let mut file = inner.sftp.open(&path).map_err(remote_error)?;
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            Ok(content)
        })
        .await
    }

    async fn write_file(&self, remote: &str, local: &Path) -> Result<u64> {
        let remote = PathBuf::from(remote);
        let local = local.to_path_buf();
        self.blocking(move |inner| {
            let mut source = std::fs::File::open(&local)?;
            let mut target = inner.sftp.create(&remote).map_err(remote_error)?;
            Ok(io::copy(&mut source, &mut target)?)
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| inner.sftp.unlink(&path).map_err(remote_error))
            .await
    }

    async fn exec(&self, command: &str) -> Result<Option<String>> {
        let command = command.to_string();
        self.blocking(move |inner| {
            let mut channel = inner.session.channel_session().map_err(remote_error)?;
            channel.exec(&command).map_err(remote_error)?;
            let mut output = String::new();
            channel.read_to_string(&mut output)?;
            channel.wait_close().map_err(remote_error)?;
            Ok(Some(output))
        })
        .await
    }

    async fn canonicalize(&self, path: &str) -> Result<String> {
        let path = PathBuf::from(path);
        self.blocking(move |inner| {
            let resolved = inner.sftp.realpath(&path).map_err(remote_error)?;
            Ok(resolved.to_string_lossy().into_owned())
        })
        .await
    }

    async fn disconnect(&self) -> Result<()> {
        self.blocking(|inner| {
            inner
                .session
                .disconnect(None, "sync complete", None)
                .map_err(remote_error)
        })
        .await
    }
}

/// Connector opening real SFTP sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct SftpConnector;

#[async_trait]
impl RemoteConnector for SftpConnector {
    async fn connect(&self, config: &SyncConfig) -> Result<Box<dyn RemoteFs>> {
        let config = config.clone();
        let inner = tokio::task::spawn_blocking(move || SftpInner::open(&config))
            .await
            .map_err(|e| Error::other(format!("connect task failed: {}", e)))??;

        Ok(Box::new(SftpRemote {
            inner: Arc::new(Mutex::new(inner)),
        }))
    }
}
