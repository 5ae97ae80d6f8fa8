//! Shared fixtures for ferrosync integration tests

use ferrosync_config::SyncConfig;
use ferrosync_remote::MemoryRemote;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Remote root used by most scenarios
pub const REMOTE_ROOT: &str = "/data/images";

/// Create a local tree from `(relative path, content)` pairs
pub fn create_local_tree(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_files(temp_dir.path(), files);
    temp_dir
}

/// Write `(relative path, content)` pairs below `base`, creating parents
pub fn write_files(base: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write test file");
    }
}

/// Password configuration for `host` with the given retry budget
///
/// The retry delay is one second, matching the default policy, so tests that
/// exercise it should pause tokio time.
pub fn server_config(host: &str, max_retries: u32) -> SyncConfig {
    SyncConfig::builder(host, "syncuser")
        .password("secret")
        .retries(max_retries, Duration::from_secs(1))
        .build()
        .expect("Failed to build server config")
}

/// Configuration for a server whose remote `/` is the directory `root`
pub fn mounted_config(host: &str, root: &Path) -> SyncConfig {
    SyncConfig::builder(host, "syncuser")
        .password("secret")
        .mounted(root)
        .build()
        .expect("Failed to build mounted config")
}

/// Remote pre-populated with `(absolute path, content)` pairs
pub fn remote_with(files: &[(&str, &str)]) -> MemoryRemote {
    files
        .iter()
        .fold(MemoryRemote::new(), |remote, (path, content)| {
            remote.with_file(path, content.as_bytes())
        })
}

/// Files below `root` on `remote`, relative to `root`, sorted
pub fn remote_listing(remote: &MemoryRemote, root: &str) -> Vec<String> {
    let prefix = format!("{}/", root.trim_end_matches('/'));
    remote
        .files()
        .keys()
        .filter_map(|path| path.strip_prefix(&prefix))
        .map(str::to_string)
        .collect()
}

/// Remote operations that change the tree
pub fn mutating_operations(remote: &MemoryRemote) -> Vec<String> {
    remote
        .operations()
        .into_iter()
        .filter(|op| {
            op.starts_with("write ") || op.starts_with("delete ") || op.starts_with("mkdir ")
        })
        .collect()
}
