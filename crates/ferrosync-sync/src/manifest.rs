//! Manifests and the local manifest builder

use ferrosync_types::{ContentDigest, Error, Fingerprint, RelativePath, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Relative path to fingerprint mapping for one side of a sync pass
///
/// Iteration is in lexicographic path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<RelativePath, Fingerprint>,
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, path: RelativePath, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(path, fingerprint)
    }

    /// Fingerprint recorded for `path`
    pub fn get(&self, path: &str) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    /// Whether `path` is present
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, &Fingerprint)> {
        self.entries.iter()
    }

    /// Paths in order
    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.entries.keys()
    }
}

impl FromIterator<(RelativePath, Fingerprint)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (RelativePath, Fingerprint)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = (&'a RelativePath, &'a Fingerprint);
    type IntoIter = std::collections::btree_map::Iter<'a, RelativePath, Fingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// An entry that could not be added to a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// Path relative to the scanned root when known, otherwise as found
    pub path: String,
    /// What went wrong
    pub message: String,
    /// Whether a whole directory could not be listed
    pub directory: bool,
}

impl ScanFailure {
    /// Create a failure for a single entry
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            directory: false,
        }
    }

    /// Create a failure for a directory whose contents are unknown
    ///
    /// An empty path stands for the scanned root.
    pub fn directory(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            directory: true,
            ..Self::new(path, message)
        }
    }

    /// Whether `path` may exist on this side without having been scanned
    pub fn covers(&self, path: &str) -> bool {
        if !self.directory {
            return self.path == path;
        }
        self.path.is_empty()
            || path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A manifest together with the entries that could not be scanned
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Entries that were fingerprinted
    pub manifest: Manifest,
    /// Entries that were skipped because of an error
    pub failures: Vec<ScanFailure>,
}

/// Walks a local directory and fingerprints every regular file
///
/// Symbolic links are skipped unless [`follow_symlinks`](Self::follow_symlinks)
/// is set, in which case walkdir's loop detection applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalManifestBuilder {
    follow_symlinks: bool,
}

impl LocalManifestBuilder {
    /// Create a builder that skips symbolic links
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Scan `root` on the blocking thread pool
    ///
    /// Fails only when `root` itself cannot be read; individual files that
    /// cannot be hashed are reported in [`ScanOutcome::failures`].
    pub async fn build(&self, root: &Path) -> Result<ScanOutcome> {
        let root = root.to_path_buf();
        let follow_symlinks = self.follow_symlinks;

        tokio::task::spawn_blocking(move || scan_local(&root, follow_symlinks))
            .await
            .map_err(|e| Error::other(format!("local scan task failed: {}", e)))?
    }
}

/// Check that `root` is an accessible directory
pub fn check_local_root(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound {
            path: root.to_path_buf(),
        },
        _ => Error::Io {
            message: format!("Failed to access local root '{}': {}", root.display(), e),
        },
    })?;

    if metadata.is_dir() {
        Ok(())
    } else {
        Err(Error::Io {
            message: format!("Local root '{}' is not a directory", root.display()),
        })
    }
}

fn scan_local(root: &Path, follow_symlinks: bool) -> Result<ScanOutcome> {
    check_local_root(root)?;

    let mut outcome = ScanOutcome::default();
    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(Error::Io {
                    message: format!("Failed to read local root '{}': {}", root.display(), error),
                });
            }
            Err(error) => {
                let failure = entry_failure(root, &error);
                warn!("Skipping unreadable entry {}: {}", failure.path, error);
                outcome.failures.push(failure);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!("Skipping symlink: {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let relative = match RelativePath::from_local(root, entry.path()) {
            Ok(relative) => relative,
            Err(error) => {
                outcome
                    .failures
                    .push(ScanFailure::new(display_relative(root, entry.path()), error.to_string()));
                continue;
            }
        };

        match hash_file(entry.path()) {
            Ok(digest) => {
                outcome.manifest.insert(relative, Fingerprint::Local(digest));
            }
            Err(error) => {
                warn!("Failed to hash {}: {}", entry.path().display(), error);
                outcome
                    .failures
                    .push(ScanFailure::new(relative.as_str(), error.to_string()));
            }
        }
    }

    info!(
        "Scanned {} files in '{}' ({} skipped)",
        outcome.manifest.len(),
        root.display(),
        outcome.failures.len()
    );
    Ok(outcome)
}

/// Classify a walk error; anything that is not known to be a file counts as a directory
fn entry_failure(root: &Path, error: &walkdir::Error) -> ScanFailure {
    let Some(path) = error.path() else {
        return ScanFailure::directory("", error.to_string());
    };
    let relative = display_relative(root, path);
    let is_file = error.loop_ancestor().is_none()
        && std::fs::symlink_metadata(path).is_ok_and(|m| !m.is_dir())
        && !std::fs::metadata(path).is_ok_and(|m| m.is_dir());

    if is_file {
        ScanFailure::new(relative, error.to_string())
    } else {
        ScanFailure::directory(relative, error.to_string())
    }
}

fn hash_file(path: &Path) -> io::Result<ContentDigest> {
    ContentDigest::from_reader(BufReader::new(File::open(path)?))
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map_or_else(|_| path.to_path_buf(), PathBuf::from)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "hi").unwrap();
        std::fs::create_dir_all(temp_dir.path().join("b/empty")).unwrap();
        std::fs::write(temp_dir.path().join("b/c.txt"), "yo").unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_build_local_manifest() {
        let temp_dir = fixture();

        let outcome = LocalManifestBuilder::new()
            .build(temp_dir.path())
            .await
            .unwrap();

        assert!(outcome.failures.is_empty());
        let paths: Vec<_> = outcome.manifest.paths().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b/c.txt"]);
        assert_eq!(
            outcome.manifest.get("b/c.txt").unwrap().to_string(),
            "6d0007e52f7afb7d5a0650b0ffb8a4d1"
        );
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = LocalManifestBuilder::new()
            .build(&temp_dir.path().join("missing"))
            .await;
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_file_root_fails() {
        let temp_dir = fixture();
        let result = LocalManifestBuilder::new()
            .build(&temp_dir.path().join("a.txt"))
            .await;
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_skipped_by_default() {
        let temp_dir = fixture();
        std::os::unix::fs::symlink(
            temp_dir.path().join("a.txt"),
            temp_dir.path().join("link.txt"),
        )
        .unwrap();

        let skipped = LocalManifestBuilder::new()
            .build(temp_dir.path())
            .await
            .unwrap();
        assert!(!skipped.manifest.contains("link.txt"));

        let followed = LocalManifestBuilder::new()
            .follow_symlinks(true)
            .build(temp_dir.path())
            .await
            .unwrap();
        assert_eq!(
            followed.manifest.get("link.txt"),
            followed.manifest.get("a.txt")
        );
    }

    #[test]
    fn test_scan_failure_display() {
        let failure = ScanFailure::new("b/c.txt", "permission denied");
        assert_eq!(failure.to_string(), "b/c.txt: permission denied");
        assert!(!failure.directory);
    }

    #[rstest]
    #[case("b/c.txt", true)]
    #[case("b/c.txt.bak", false)]
    #[case("b", false)]
    fn test_file_failure_covers_only_itself(#[case] path: &str, #[case] covered: bool) {
        assert_eq!(ScanFailure::new("b/c.txt", "denied").covers(path), covered);
    }

    #[rstest]
    #[case("sub", true)]
    #[case("sub/keep.txt", true)]
    #[case("sub/deep/keep.txt", true)]
    #[case("subway.txt", false)]
    #[case("a.txt", false)]
    fn test_directory_failure_covers_its_subtree(#[case] path: &str, #[case] covered: bool) {
        assert_eq!(ScanFailure::directory("sub", "denied").covers(path), covered);
    }

    #[test]
    fn test_root_failure_covers_everything() {
        let failure = ScanFailure::directory("", "walk failed");
        assert!(failure.covers("a.txt"));
        assert!(failure.covers("b/c.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unlistable_directory_is_reported_as_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = fixture();
        let locked = temp_dir.path().join("b");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let listable = std::fs::read_dir(&locked).is_ok();

        let outcome = LocalManifestBuilder::new()
            .build(temp_dir.path())
            .await
            .unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            assert!(outcome.failures.is_empty());
        } else {
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(outcome.failures[0].path, "b");
            assert!(outcome.failures[0].directory);
        }
    }
}
