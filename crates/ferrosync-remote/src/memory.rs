//! In-memory remote backend
//!
//! [`MemoryRemote`] keeps a whole remote tree behind a shared lock so that a
//! test can hand one clone to a [`MemoryConnector`] and inspect another after
//! the sync pass. Paths are keyed in their absolute form; relative paths are
//! resolved against `/`.

use crate::fs::{RemoteConnector, RemoteFs, RemoteMetadata};
use async_trait::async_trait;
use ferrosync_config::SyncConfig;
use ferrosync_types::{ContentDigest, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const MAX_LINK_HOPS: usize = 32;

#[derive(Debug)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    links: BTreeMap<String, String>,
    md5sum: bool,
    fail_upload: BTreeSet<String>,
    fail_delete: BTreeSet<String>,
    fail_mkdir: BTreeSet<String>,
    contended_mkdir: BTreeSet<String>,
    operations: Vec<String>,
}

impl Default for MemoryState {
    fn default() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            files: BTreeMap::new(),
            dirs,
            links: BTreeMap::new(),
            md5sum: true,
            fail_upload: BTreeSet::new(),
            fail_delete: BTreeSet::new(),
            fail_mkdir: BTreeSet::new(),
            contended_mkdir: BTreeSet::new(),
            operations: Vec::new(),
        }
    }
}

impl MemoryState {
    /// Follow directory links until the path no longer passes through one
    fn resolve(&self, path: &str) -> String {
        let mut current = absolute(path);
        for _ in 0..MAX_LINK_HOPS {
            let hop = self.links.iter().find_map(|(link, target)| {
                if current == *link {
                    Some(target.clone())
                } else {
                    current
                        .strip_prefix(link.as_str())
                        .and_then(|rest| rest.strip_prefix('/'))
                        .map(|rest| format!("{}/{}", target.trim_end_matches('/'), rest))
                }
            });
            match hop {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(&self.resolve(path))
    }

    fn add_dir_chain(&mut self, path: &str) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = format!("{}/{}", current, segment);
            self.dirs.insert(current.clone());
        }
    }

    fn record(&mut self, operation: String) {
        self.operations.push(operation);
    }
}

fn absolute(path: &str) -> String {
    match path {
        "" | "." => "/".to_string(),
        p if p.starts_with('/') => p.to_string(),
        p => format!("/{}", p),
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

/// Parse `md5sum '<path>' 2>/dev/null` as produced by the session
fn md5sum_target(command: &str) -> Option<String> {
    let quoted = command
        .strip_prefix("md5sum ")?
        .strip_suffix(" 2>/dev/null")?;
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("'\\''", "'"))
}

/// Shared in-memory remote tree
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    /// Create an empty remote containing only `/`
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a file, creating its parent directories
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.lock();
            let path = absolute(path);
            state.add_dir_chain(parent_of(&path));
            state.files.insert(path, content.into());
        }
        self
    }

    /// Add a directory and its parents
    pub fn with_dir(self, path: &str) -> Self {
        self.lock().add_dir_chain(&absolute(path));
        self
    }

    /// Add a directory entry at `link` that resolves to `target`
    pub fn with_dir_link(self, link: &str, target: &str) -> Self {
        {
            let mut state = self.lock();
            let link = absolute(link);
            state.add_dir_chain(parent_of(&link));
            state.links.insert(link, absolute(target));
        }
        self
    }

    /// Enable or disable the emulated `md5sum` command
    pub fn with_md5sum(self, enabled: bool) -> Self {
        self.lock().md5sum = enabled;
        self
    }

    /// Reject uploads to `path`
    pub fn fail_upload(self, path: &str) -> Self {
        self.lock().fail_upload.insert(absolute(path));
        self
    }

    /// Reject deletion of `path`
    pub fn fail_delete(self, path: &str) -> Self {
        self.lock().fail_delete.insert(absolute(path));
        self
    }

    /// Reject creation of directory `path`
    pub fn fail_mkdir(self, path: &str) -> Self {
        self.lock().fail_mkdir.insert(absolute(path));
        self
    }

    /// Make creation of directory `path` fail as if another client created it first
    pub fn contended_mkdir(self, path: &str) -> Self {
        self.lock().contended_mkdir.insert(absolute(path));
        self
    }

    /// Snapshot of every file and its content
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.lock().files.clone()
    }

    /// Content of one file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&absolute(path)).cloned()
    }

    /// Whether `path` is a directory
    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().is_dir(path)
    }

    /// Every primitive call in order, as `"<op> <path>"`
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }
}

#[async_trait]
impl RemoteFs for MemoryRemote {
    async fn is_dir(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.record(format!("is_dir {}", path));
        Ok(state.is_dir(path))
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.record(format!("is_file {}", path));
        let resolved = state.resolve(path);
        Ok(state.files.contains_key(&resolved))
    }

    async fn make_dir(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("mkdir {}", path));
        let resolved = state.resolve(path);

        if state.fail_mkdir.contains(&resolved) {
            return Err(Error::remote(format!("permission denied: {}", path)));
        }
        if state.contended_mkdir.remove(&resolved) {
            state.add_dir_chain(&resolved);
            return Err(Error::remote(format!("already exists: {}", path)));
        }
        if state.dirs.contains(&resolved) || state.files.contains_key(&resolved) {
            return Err(Error::remote(format!("already exists: {}", path)));
        }
        if !state.dirs.contains(parent_of(&resolved)) {
            return Err(Error::remote(format!("no such directory: {}", parent_of(path))));
        }

        state.dirs.insert(resolved);
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.record(format!("list {}", path));
        let resolved = state.resolve(path);

        if !state.dirs.contains(&resolved) {
            return Err(Error::remote(format!("no such directory: {}", path)));
        }

        let children = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .chain(state.links.keys())
            .filter(|entry| entry.as_str() != "/" && parent_of(entry) == resolved)
            .filter_map(|entry| entry.rsplit('/').next().map(str::to_string))
            .collect::<BTreeSet<_>>();

        Ok(children.into_iter().collect())
    }

    async fn stat(&self, path: &str) -> Result<Option<RemoteMetadata>> {
        let mut state = self.lock();
        state.record(format!("stat {}", path));
        let resolved = state.resolve(path);

        if let Some(content) = state.files.get(&resolved) {
            return Ok(Some(RemoteMetadata {
                size: content.len() as u64,
                is_dir: false,
            }));
        }
        Ok(state.dirs.contains(&resolved).then_some(RemoteMetadata {
            size: 0,
            is_dir: true,
        }))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.record(format!("read {}", path));
        let resolved = state.resolve(path);
        state
            .files
            .get(&resolved)
            .cloned()
            .ok_or_else(|| Error::remote(format!("no such file: {}", path)))
    }

    async fn write_file(&self, remote: &str, local: &Path) -> Result<u64> {
        let content = tokio::fs::read(local).await?;

        let mut state = self.lock();
        state.record(format!("write {}", remote));
        let resolved = state.resolve(remote);

        if state.fail_upload.contains(&resolved) {
            return Err(Error::upload(remote, "permission denied"));
        }
        if !state.dirs.contains(parent_of(&resolved)) {
            return Err(Error::remote(format!("no such directory: {}", parent_of(remote))));
        }

        let written = content.len() as u64;
        state.files.insert(resolved, content);
        Ok(written)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("delete {}", path));
        let resolved = state.resolve(path);

        if state.fail_delete.contains(&resolved) {
            return Err(Error::delete(path, "permission denied"));
        }
        state
            .files
            .remove(&resolved)
            .map(|_| ())
            .ok_or_else(|| Error::remote(format!("no such file: {}", path)))
    }

    async fn exec(&self, command: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.record(format!("exec {}", command));

        if !state.md5sum {
            // No md5sum on the server: stderr is discarded, stdout stays empty.
            return Ok(Some(String::new()));
        }

        let output = md5sum_target(command)
            .and_then(|target| {
                let resolved = state.resolve(&target);
                state.files.get(&resolved).map(|content| {
                    format!("{}  {}\n", ContentDigest::of_bytes(content), target)
                })
            })
            .unwrap_or_default();

        Ok(Some(output))
    }

    async fn canonicalize(&self, path: &str) -> Result<String> {
        Ok(self.lock().resolve(path))
    }

    async fn disconnect(&self) -> Result<()> {
        self.lock().record("disconnect".to_string());
        Ok(())
    }
}

/// Connector handing out clones of one [`MemoryRemote`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    remote: MemoryRemote,
    fail_first: u32,
    reject_login: bool,
    connect_delay: Option<Duration>,
    attempts: Arc<AtomicU32>,
}

impl MemoryConnector {
    /// Connector that always succeeds
    pub fn new(remote: MemoryRemote) -> Self {
        Self {
            remote,
            fail_first: 0,
            reject_login: false,
            connect_delay: None,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the first `count` attempts with a network error
    pub fn fail_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    /// Reject every login
    pub fn reject_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    /// Stall every attempt before answering
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The remote tree behind this connector
    pub fn remote(&self) -> &MemoryRemote {
        &self.remote
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, config: &SyncConfig) -> Result<Box<dyn RemoteFs>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_login {
            return Err(Error::authentication(format!(
                "login rejected for {}@{}",
                config.user, config.host
            )));
        }
        if attempt <= self.fail_first {
            return Err(Error::network(format!(
                "connection to {} refused",
                config.address()
            )));
        }

        Ok(Box::new(self.remote.clone()))
    }
}
