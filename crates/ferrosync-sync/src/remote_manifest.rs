//! Remote manifest builder
//!
//! The remote tree is walked depth-first with an explicit stack. Each stack
//! entry carries the canonical paths of its ancestors, so a link pointing back
//! up the tree is reported as a cycle while a link to a sibling subtree is
//! listed under both names.

use crate::manifest::{ScanFailure, ScanOutcome};
use ferrosync_config::DEFAULT_DOWNLOAD_THRESHOLD;
use ferrosync_remote::RemoteSession;
use ferrosync_types::{
    join_remote, normalize_remote_path, ContentDigest, Fingerprint, RelativePath, Result,
};
use tracing::{debug, info, warn};

/// A directory waiting to be listed
struct PendingDir {
    path: String,
    prefix: Option<RelativePath>,
    /// Canonical paths from the root down to the parent
    ancestors: Vec<String>,
}

/// Lists and fingerprints a remote directory tree
#[derive(Debug, Clone, Copy)]
pub struct RemoteManifestBuilder {
    download_threshold: u64,
}

impl Default for RemoteManifestBuilder {
    fn default() -> Self {
        Self {
            download_threshold: DEFAULT_DOWNLOAD_THRESHOLD,
        }
    }
}

impl RemoteManifestBuilder {
    /// Create a builder with the default 10 MiB download threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest file downloaded when the server cannot hash it
    pub fn download_threshold(mut self, bytes: u64) -> Self {
        self.download_threshold = bytes;
        self
    }

    /// Scan `remote_root`
    ///
    /// A missing root yields an empty manifest. Only a root that fails path
    /// guarding is an error; every other problem is reported in
    /// [`ScanOutcome::failures`].
    pub async fn build(&self, session: &RemoteSession, remote_root: &str) -> Result<ScanOutcome> {
        let root = normalize_remote_path(remote_root)?;
        let mut outcome = ScanOutcome::default();

        match session.is_dir(&root).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %root, "remote root does not exist yet");
                return Ok(outcome);
            }
            Err(error) => {
                outcome.failures.push(ScanFailure::new(&root, error.to_string()));
                return Ok(outcome);
            }
        }

        let mut pending = vec![PendingDir {
            path: root.clone(),
            prefix: None,
            ancestors: Vec::new(),
        }];

        while let Some(PendingDir {
            path: dir,
            prefix,
            mut ancestors,
        }) = pending.pop()
        {
            let label = prefix
                .as_ref()
                .map_or_else(|| root.clone(), |p| p.to_string());

            let identity = session
                .canonicalize(&dir)
                .await
                .unwrap_or_else(|_| dir.clone());
            if ancestors.contains(&identity) {
                warn!(path = %dir, "skipping link back to ancestor {}", identity);
                outcome.failures.push(ScanFailure::new(
                    label,
                    format!("directory cycle, links back to {}", identity),
                ));
                continue;
            }
            ancestors.push(identity);

            let mut names = match session.list_dir(&dir).await {
                Ok(names) => names,
                Err(error) => {
                    warn!(path = %dir, "failed to list remote directory: {}", error);
                    outcome.failures.push(ScanFailure::new(label, error.to_string()));
                    continue;
                }
            };
            names.sort();

            let mut subdirs = Vec::new();
            for name in names {
                if name == "." || name == ".." {
                    continue;
                }

                let candidate = match &prefix {
                    Some(prefix) => format!("{}/{}", prefix, name),
                    None => name,
                };
                let relative = match RelativePath::new(&candidate) {
                    Ok(relative) if relative.as_str() == candidate => relative,
                    Ok(_) => {
                        warn!(path = %candidate, "remote name has no local equivalent");
                        outcome.failures.push(ScanFailure::new(
                            candidate,
                            "name contains a path separator",
                        ));
                        continue;
                    }
                    Err(error) => {
                        outcome.failures.push(ScanFailure::new(candidate, error.to_string()));
                        continue;
                    }
                };
                let path = join_remote(&root, &relative);

                match session.is_dir(&path).await {
                    Ok(true) => subdirs.push(PendingDir {
                        path,
                        prefix: Some(relative),
                        ancestors: ancestors.clone(),
                    }),
                    Ok(false) => match session.is_file(&path).await {
                        Ok(true) => {
                            let fingerprint = self.fingerprint(session, &path).await;
                            outcome.manifest.insert(relative, fingerprint);
                        }
                        Ok(false) => debug!(path = %path, "skipping special remote entry"),
                        Err(error) => outcome
                            .failures
                            .push(ScanFailure::new(relative.as_str(), error.to_string())),
                    },
                    Err(error) => outcome
                        .failures
                        .push(ScanFailure::new(relative.as_str(), error.to_string())),
                }
            }

            // Reversed so the stack pops siblings in lexicographic order.
            pending.extend(subdirs.into_iter().rev());
        }

        info!(
            "Listed {} remote files under '{}' ({} skipped)",
            outcome.manifest.len(),
            root,
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Server-side digest, else a bounded download, else unknown
    async fn fingerprint(&self, session: &RemoteSession, path: &str) -> Fingerprint {
        match session.remote_md5(path).await {
            Ok(Some(digest)) => return Fingerprint::HashedRemote(digest),
            Ok(None) => {}
            Err(error) => debug!(path = %path, "remote hash failed: {}", error),
        }

        let size = match session.stat(path).await {
            Ok(Some(metadata)) => metadata.size,
            Ok(None) => return Fingerprint::Unknown,
            Err(error) => {
                debug!(path = %path, "stat failed: {}", error);
                return Fingerprint::Unknown;
            }
        };

        if size > self.download_threshold {
            debug!(path = %path, size, "too large to download for hashing");
            return Fingerprint::Unknown;
        }

        match session.read_file(path).await {
            Ok(content) => Fingerprint::Downloaded(ContentDigest::of_bytes(&content)),
            Err(error) => {
                debug!(path = %path, "download for hashing failed: {}", error);
                Fingerprint::Unknown
            }
        }
    }
}
