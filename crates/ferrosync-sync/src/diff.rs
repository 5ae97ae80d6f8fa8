//! Manifest comparison

use crate::manifest::Manifest;
use ferrosync_types::RelativePath;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a path is uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// Missing on the remote side
    Added,
    /// Present with a different digest
    Modified,
    /// Present but the remote digest could not be determined
    Unverified,
}

/// Paths to upload and delete, in lexicographic order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Local paths whose remote copy is missing or differs
    pub uploads: Vec<RelativePath>,
    /// Remote paths absent locally; empty unless deletion is enabled
    pub deletes: Vec<RelativePath>,
}

impl SyncPlan {
    /// Whether nothing needs to be done
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletes.is_empty()
    }
}

/// Computes a [`SyncPlan`] from two manifests
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    delete_extra: bool,
}

impl DiffEngine {
    /// Create a diff engine; `delete_extra` enables the delete set
    pub fn new(delete_extra: bool) -> Self {
        Self { delete_extra }
    }

    /// Classify one local path against the remote manifest
    pub fn classify(&self, path: &str, local: &Manifest, remote: &Manifest) -> Option<ChangeType> {
        let local = local.get(path)?;
        match remote.get(path) {
            None => Some(ChangeType::Added),
            Some(remote) if remote.digest().is_none() => Some(ChangeType::Unverified),
            Some(remote) if !local.matches(remote) => Some(ChangeType::Modified),
            Some(_) => None,
        }
    }

    /// Compare manifests
    pub fn diff(&self, local: &Manifest, remote: &Manifest) -> SyncPlan {
        let uploads: Vec<_> = local
            .paths()
            .filter(|path| self.classify(path.as_str(), local, remote).is_some())
            .cloned()
            .collect();

        let deletes = if self.delete_extra {
            remote
                .paths()
                .filter(|path| !local.contains(path.as_str()))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            "Diff: {} local, {} remote, {} to upload, {} to delete",
            local.len(),
            remote.len(),
            uploads.len(),
            deletes.len()
        );

        SyncPlan { uploads, deletes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosync_types::{ContentDigest, Fingerprint};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn path(text: &str) -> RelativePath {
        RelativePath::new(text).unwrap()
    }

    fn local(entries: &[(&str, &str)]) -> Manifest {
        entries
            .iter()
            .map(|(p, c)| (path(p), Fingerprint::Local(ContentDigest::of_bytes(c.as_bytes()))))
            .collect()
    }

    fn remote(entries: &[(&str, Option<&str>)]) -> Manifest {
        entries
            .iter()
            .map(|(p, c)| {
                let fingerprint = c.map_or(Fingerprint::Unknown, |c| {
                    Fingerprint::HashedRemote(ContentDigest::of_bytes(c.as_bytes()))
                });
                (path(p), fingerprint)
            })
            .collect()
    }

    #[test]
    fn test_diff_uploads_missing_changed_and_unknown() {
        let local = local(&[("a.txt", "hi"), ("b/c.txt", "yo"), ("d.txt", "x"), ("e.txt", "e")]);
        let remote = remote(&[("a.txt", Some("hi")), ("b/c.txt", Some("old")), ("e.txt", None)]);
        let engine = DiffEngine::new(false);

        let plan = engine.diff(&local, &remote);

        assert_eq!(plan.uploads, vec![path("b/c.txt"), path("d.txt"), path("e.txt")]);
        assert!(plan.deletes.is_empty());
        assert_eq!(engine.classify("a.txt", &local, &remote), None);
        assert_eq!(engine.classify("b/c.txt", &local, &remote), Some(ChangeType::Modified));
        assert_eq!(engine.classify("d.txt", &local, &remote), Some(ChangeType::Added));
        assert_eq!(engine.classify("e.txt", &local, &remote), Some(ChangeType::Unverified));
    }

    #[test]
    fn test_delete_set_only_when_enabled() {
        let local = local(&[("a.txt", "hi")]);
        let remote = remote(&[("a.txt", Some("hi")), ("stale.txt", Some("x"))]);

        assert!(DiffEngine::new(false).diff(&local, &remote).is_empty());

        let plan = DiffEngine::new(true).diff(&local, &remote);
        assert!(plan.uploads.is_empty());
        assert_eq!(plan.deletes, vec![path("stale.txt")]);
    }

    #[test]
    fn test_degenerate_manifests() {
        let local = local(&[("a.txt", "hi"), ("b/c.txt", "yo")]);

        let plan = DiffEngine::new(true).diff(&local, &Manifest::new());
        assert_eq!(plan.uploads.len(), 2);

        let mirrored: Manifest = local
            .iter()
            .map(|(p, f)| (p.clone(), Fingerprint::Downloaded(*f.digest().unwrap())))
            .collect();
        assert!(DiffEngine::new(true).diff(&local, &mirrored).is_empty());
    }

    fn manifest_strategy() -> impl Strategy<Value = BTreeMap<String, Option<u8>>> {
        prop::collection::btree_map(
            "[a-c]{1,2}(/[a-c]{1,2})?",
            prop::option::weighted(0.8, 0_u8..4),
            0..12,
        )
    }

    proptest! {
        #[test]
        fn test_plan_matches_set_definition(
            local_entries in manifest_strategy(),
            remote_entries in manifest_strategy(),
            delete in any::<bool>(),
        ) {
            let local: Manifest = local_entries
                .iter()
                .map(|(p, c)| (path(p), Fingerprint::Local(ContentDigest::of_bytes(&[c.unwrap_or(0)]))))
                .collect();
            let remote: Manifest = remote_entries
                .iter()
                .map(|(p, c)| {
                    let fingerprint = c.map_or(Fingerprint::Unknown, |c| {
                        Fingerprint::HashedRemote(ContentDigest::of_bytes(&[c]))
                    });
                    (path(p), fingerprint)
                })
                .collect();

            let plan = DiffEngine::new(delete).diff(&local, &remote);

            let expected_uploads: Vec<_> = local
                .iter()
                .filter(|(p, f)| remote.get(p.as_str()).map_or(true, |r| !f.matches(r)))
                .map(|(p, _)| p.clone())
                .collect();
            prop_assert_eq!(&plan.uploads, &expected_uploads);

            let expected_deletes: Vec<_> = if delete {
                remote.paths().filter(|p| !local.contains(p.as_str())).cloned().collect()
            } else {
                Vec::new()
            };
            prop_assert_eq!(&plan.deletes, &expected_deletes);

            // Every planned path is on exactly one side of the diff.
            for p in &plan.deletes {
                prop_assert!(!plan.uploads.contains(p));
            }
        }
    }
}
