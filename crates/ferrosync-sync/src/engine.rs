//! Sync orchestration

use crate::diff::DiffEngine;
use crate::events::{EventLevel, EventSink, NoopSink, SyncEvent};
use crate::manifest::{check_local_root, LocalManifestBuilder, Manifest, ScanFailure, ScanOutcome};
use crate::remote_manifest::RemoteManifestBuilder;
use chrono::{DateTime, Utc};
use ferrosync_config::SyncConfig;
use ferrosync_remote::{RemoteConnector, RemoteSession};
use ferrosync_types::{join_remote, normalize_remote_path, RelativePath, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Phases of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Not started
    Idle,
    /// Validating roots and logging in
    Connecting,
    /// Building the local and remote manifests
    BuildingManifests,
    /// Computing the plan
    Diffing,
    /// Uploading changed files
    Uploading,
    /// Deleting extra remote files
    Deleting,
    /// Closing the session
    Disconnecting,
    /// Finished with a result
    Done,
    /// Aborted before a session existed
    Failed,
}

impl SyncPhase {
    /// Whether the pass may move from `self` to `next`
    pub fn can_transition_to(self, next: Self) -> bool {
        use SyncPhase::{
            BuildingManifests, Connecting, Deleting, Diffing, Disconnecting, Done, Failed, Idle,
            Uploading,
        };

        matches!(
            (self, next),
            (Idle | Done | Failed, Connecting)
                | (Connecting, BuildingManifests | Failed)
                | (BuildingManifests, Diffing)
                | (Diffing, Uploading)
                | (Uploading, Deleting | Disconnecting)
                | (Deleting, Disconnecting)
                | (Disconnecting, Done)
        )
    }

    /// Whether the pass has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One sync pass: a local tree mirrored to a remote directory
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Local root
    pub local: PathBuf,
    /// Remote root
    pub remote: String,
    /// Delete remote files missing locally
    pub enable_delete: bool,
    /// Request ID for tracking
    pub request_id: uuid::Uuid,
}

impl SyncRequest {
    /// Create a request with deletion disabled
    pub fn new(local: impl AsRef<Path>, remote: impl Into<String>) -> Self {
        Self {
            local: local.as_ref().to_path_buf(),
            remote: remote.into(),
            enable_delete: false,
            request_id: uuid::Uuid::new_v4(),
        }
    }

    /// Enable or disable deletion of extra remote files
    pub fn with_delete(mut self, enable: bool) -> Self {
        self.enable_delete = enable;
        self
    }
}

/// Outcome of a sync pass that got past the connection step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Request ID
    pub request_id: uuid::Uuid,
    /// Server host
    pub host: String,
    /// Files uploaded
    pub uploaded: u64,
    /// Files deleted
    pub deleted: u64,
    /// Bytes uploaded
    pub bytes_uploaded: u64,
    /// Per-item failures, in the order they happened
    pub errors: Vec<String>,
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// Wall time of the pass
    pub duration: Duration,
}

impl SyncResult {
    fn new(request_id: uuid::Uuid, host: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            host: host.to_string(),
            uploaded: 0,
            deleted: 0,
            bytes_uploaded: 0,
            errors: Vec::new(),
            started_at,
            duration: Duration::default(),
        }
    }

    /// Whether no item failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "uploaded={}, deleted={}, errors={}",
            self.uploaded,
            self.deleted,
            self.errors.len()
        )
    }
}

/// Drives one server through connect, scan, diff, upload, delete, disconnect
///
/// Only a connection failure (or an invalid root) aborts a pass; every
/// per-file failure is recorded in [`SyncResult::errors`].
pub struct SyncOrchestrator<C> {
    connector: C,
    config: SyncConfig,
    sink: Arc<dyn EventSink>,
    phase: SyncPhase,
}

impl<C: RemoteConnector> SyncOrchestrator<C> {
    /// Create an orchestrator for one server
    pub fn new(connector: C, config: SyncConfig) -> Self {
        Self {
            connector,
            config,
            sink: Arc::new(NoopSink),
            phase: SyncPhase::Idle,
        }
    }

    /// Report progress events to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Server configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Mirror `local` onto `remote`
    pub async fn sync(
        &mut self,
        local: impl AsRef<Path>,
        remote: &str,
        enable_delete: bool,
    ) -> Result<SyncResult> {
        self.sync_to(SyncRequest::new(local, remote).with_delete(enable_delete))
            .await
    }

    /// Run a full pass for `request`
    pub async fn sync_to(&mut self, request: SyncRequest) -> Result<SyncResult> {
        let started = Instant::now();
        let started_at = Utc::now();
        info!(
            request_id = %request.request_id,
            host = %self.config.host,
            "Starting sync from '{}' to '{}'",
            request.local.display(),
            request.remote
        );

        self.transition(SyncPhase::Connecting);
        let (remote_root, mut session) = match self.open(&request).await {
            Ok(opened) => opened,
            Err(error) => {
                self.transition(SyncPhase::Failed);
                error!(host = %self.config.host, "Sync aborted: {}", error);
                self.emit(EventLevel::Error, format!("sync aborted: {}", error));
                return Err(error);
            }
        };

        let mut result = SyncResult::new(request.request_id, &self.config.host, started_at);
        if session.failed_attempts() > 0 {
            self.emit(
                EventLevel::Info,
                format!(
                    "reconnected after {} failed attempts",
                    session.failed_attempts()
                ),
            );
        }

        self.transition(SyncPhase::BuildingManifests);
        let local = self.scan_local(&request.local, &mut result).await;
        let remote = self.scan_remote(&session, &remote_root, &mut result).await;

        self.transition(SyncPhase::Diffing);
        let mut plan = DiffEngine::new(request.enable_delete).diff(&local.manifest, &remote);
        let withheld = local.retain_safe_deletes(&mut plan.deletes);
        if withheld > 0 {
            warn!("Local scan incomplete, skipping {} deletions", withheld);
        }
        info!(
            "Planned {} uploads and {} deletions",
            plan.uploads.len(),
            plan.deletes.len()
        );

        self.transition(SyncPhase::Uploading);
        for path in &plan.uploads {
            let source = path.to_local_path(&request.local);
            let target = join_remote(&remote_root, path);

            match session.upload(&source, &target).await {
                Ok(bytes) => {
                    result.uploaded += 1;
                    result.bytes_uploaded += bytes;
                    debug!(path = %path, bytes, "uploaded");
                    self.emit(EventLevel::Info, format!("upload: {}", path));
                }
                Err(error) => {
                    self.record(&mut result, format!("upload failed ({}): {}", path, error));
                }
            }
        }

        if request.enable_delete {
            self.transition(SyncPhase::Deleting);
            for path in &plan.deletes {
                let target = join_remote(&remote_root, path);

                match session.delete(&target).await {
                    Ok(()) => {
                        result.deleted += 1;
                        self.emit(EventLevel::Info, format!("delete: {}", path));
                    }
                    Err(error) => {
                        self.record(&mut result, format!("delete failed ({}): {}", path, error));
                    }
                }
            }
        }

        self.transition(SyncPhase::Disconnecting);
        if let Err(error) = session.disconnect().await {
            self.record(&mut result, format!("disconnect failed: {}", error));
        }

        self.transition(SyncPhase::Done);
        result.duration = started.elapsed();
        info!(
            request_id = %request.request_id,
            host = %self.config.host,
            "Sync finished in {:?}: {}",
            result.duration,
            result.summary()
        );
        self.emit(
            EventLevel::Info,
            format!(
                "sync complete: uploaded={}, deleted={}",
                result.uploaded, result.deleted
            ),
        );

        Ok(result)
    }

    /// Validate both roots, then connect
    async fn open(&self, request: &SyncRequest) -> Result<(String, RemoteSession)> {
        let remote_root = normalize_remote_path(&request.remote)?;
        check_local_root(&request.local)?;

        let session = RemoteSession::connect(&self.connector, &self.config).await?;
        Ok((remote_root, session))
    }

    async fn scan_local(&self, root: &Path, result: &mut SyncResult) -> LocalScan {
        let builder = LocalManifestBuilder::new().follow_symlinks(self.config.follow_symlinks);

        match builder.build(root).await {
            Ok(outcome) => {
                for failure in &outcome.failures {
                    self.record(result, format!("local scan failed ({})", failure));
                }
                LocalScan::from(outcome)
            }
            Err(error) => {
                self.record(result, format!("local scan failed: {}", error));
                LocalScan::from(ScanOutcome {
                    manifest: Manifest::new(),
                    failures: vec![ScanFailure::directory("", error.to_string())],
                })
            }
        }
    }

    async fn scan_remote(
        &self,
        session: &RemoteSession,
        root: &str,
        result: &mut SyncResult,
    ) -> Manifest {
        let builder =
            RemoteManifestBuilder::new().download_threshold(self.config.download_threshold);

        match builder.build(session, root).await {
            Ok(ScanOutcome { manifest, failures }) => {
                for failure in failures {
                    self.record(result, format!("remote scan failed ({})", failure));
                }
                manifest
            }
            Err(error) => {
                self.record(result, format!("remote scan failed: {}", error));
                Manifest::new()
            }
        }
    }

    fn transition(&mut self, next: SyncPhase) {
        if !self.phase.can_transition_to(next) {
            warn!("Unexpected sync phase change {:?} -> {:?}", self.phase, next);
        }
        debug!("Sync phase changed to: {:?}", next);
        self.phase = next;
    }

    fn record(&self, result: &mut SyncResult, message: String) {
        warn!(host = %self.config.host, "{}", message);
        self.sink.emit(&SyncEvent::new(EventLevel::Error, message.as_str()));
        result.errors.push(message);
    }

    fn emit(&self, level: EventLevel, message: String) {
        if level == EventLevel::Info {
            info!(host = %self.config.host, "{}", message);
        }
        self.sink.emit(&SyncEvent::new(level, message));
    }
}

/// Local manifest plus what is needed to keep deletions safe
struct LocalScan {
    manifest: Manifest,
    failures: Vec<ScanFailure>,
}

impl LocalScan {
    /// Drop deletions of paths the local scan could not see, returning how many were dropped
    fn retain_safe_deletes(&self, deletes: &mut Vec<RelativePath>) -> usize {
        let before = deletes.len();
        deletes.retain(|path| !self.failures.iter().any(|f| f.covers(path.as_str())));
        before - deletes.len()
    }
}

impl From<ScanOutcome> for LocalScan {
    fn from(outcome: ScanOutcome) -> Self {
        Self {
            manifest: outcome.manifest,
            failures: outcome.failures,
        }
    }
}

impl<C> std::fmt::Debug for SyncOrchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("host", &self.config.host)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelSink;
    use ferrosync_remote::{MemoryConnector, MemoryRemote};
    use ferrosync_types::Error;
    use rstest::rstest;
    use tempfile::TempDir;

    fn config() -> SyncConfig {
        SyncConfig::builder("10.0.0.1", "syncuser")
            .password("secret")
            .retries(3, Duration::from_secs(1))
            .build()
            .unwrap()
    }

    fn local_tree(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp_dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        temp_dir
    }

    #[rstest]
    #[case(SyncPhase::Idle, SyncPhase::Connecting, true)]
    #[case(SyncPhase::Connecting, SyncPhase::Failed, true)]
    #[case(SyncPhase::Uploading, SyncPhase::Disconnecting, true)]
    #[case(SyncPhase::Uploading, SyncPhase::Failed, false)]
    #[case(SyncPhase::Diffing, SyncPhase::Deleting, false)]
    #[case(SyncPhase::Done, SyncPhase::Uploading, false)]
    fn test_phase_transitions(#[case] from: SyncPhase, #[case] to: SyncPhase, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[tokio::test]
    async fn test_sync_emits_events_in_order() {
        let local = local_tree(&[("a.txt", "hi"), ("b/c.txt", "yo")]);
        let remote = MemoryRemote::new().with_file("/srv/stale.txt", "x");
        let (sink, mut events) = ChannelSink::new();

        let mut orchestrator = SyncOrchestrator::new(MemoryConnector::new(remote.clone()), config())
            .with_event_sink(Arc::new(sink));
        let result = orchestrator.sync(local.path(), "/srv", true).await.unwrap();

        assert_eq!(orchestrator.phase(), SyncPhase::Done);
        assert_eq!((result.uploaded, result.deleted), (2, 1));
        assert_eq!(result.bytes_uploaded, 4);
        assert!(result.is_clean());
        assert_eq!(result.summary(), "uploaded=2, deleted=1, errors=0");

        drop(orchestrator);
        let mut messages = Vec::new();
        while let Some(event) = events.recv().await {
            messages.push(event.to_string());
        }
        assert_eq!(
            messages,
            vec![
                "[INFO] upload: a.txt",
                "[INFO] upload: b/c.txt",
                "[INFO] delete: stale.txt",
                "[INFO] sync complete: uploaded=2, deleted=1",
            ]
        );
    }

    #[tokio::test]
    async fn test_per_item_failures_are_recorded() {
        let local = local_tree(&[("a.txt", "hi"), ("b.txt", "yo")]);
        let remote = MemoryRemote::new()
            .with_file("/srv/keep.txt", "x")
            .fail_upload("/srv/a.txt")
            .fail_delete("/srv/keep.txt");

        let mut orchestrator = SyncOrchestrator::new(MemoryConnector::new(remote.clone()), config());
        let result = orchestrator.sync(local.path(), "/srv", true).await.unwrap();

        assert_eq!(result.uploaded, 1);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("upload failed (a.txt)"));
        assert!(result.errors[1].starts_with("delete failed (keep.txt)"));
        assert_eq!(remote.file("/srv/b.txt").unwrap(), b"yo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_aborts() {
        let local = local_tree(&[("a.txt", "hi")]);
        let connector = MemoryConnector::new(MemoryRemote::new()).reject_login();
        let (sink, mut events) = ChannelSink::new();

        let mut orchestrator =
            SyncOrchestrator::new(connector.clone(), config()).with_event_sink(Arc::new(sink));
        let error = orchestrator.sync(local.path(), "/srv", false).await.unwrap_err();

        assert!(matches!(error, Error::Connection { retries: 3, .. }));
        assert_eq!(connector.attempts(), 4);
        assert_eq!(orchestrator.phase(), SyncPhase::Failed);
        let event = events.recv().await.unwrap();
        assert_eq!(event.level, EventLevel::Error);
    }

    #[tokio::test]
    async fn test_reconnect_is_reported() {
        let local = local_tree(&[("a.txt", "hi")]);
        let connector = MemoryConnector::new(MemoryRemote::new()).fail_first(1);
        let (sink, mut events) = ChannelSink::new();

        let mut orchestrator = SyncOrchestrator::new(
            connector,
            SyncConfig::builder("10.0.0.1", "syncuser")
                .password("secret")
                .retries(1, Duration::ZERO)
                .build()
                .unwrap(),
        )
        .with_event_sink(Arc::new(sink));
        orchestrator.sync(local.path(), "/srv", false).await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.message, "reconnected after 1 failed attempts");
    }

    #[rstest]
    #[case("/srv/../etc")]
    #[case("..")]
    #[tokio::test]
    async fn test_invalid_remote_root_is_fatal(#[case] root: &str) {
        let local = local_tree(&[("a.txt", "hi")]);
        let connector = MemoryConnector::new(MemoryRemote::new());

        let mut orchestrator = SyncOrchestrator::new(connector.clone(), config());
        let error = orchestrator.sync(local.path(), root, false).await.unwrap_err();

        assert!(matches!(error, Error::PathSecurity { .. }));
        assert_eq!(connector.attempts(), 0);
        assert!(connector.remote().operations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_local_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let connector = MemoryConnector::new(MemoryRemote::new());

        let mut orchestrator = SyncOrchestrator::new(connector.clone(), config());
        let error = orchestrator
            .sync(temp_dir.path().join("missing"), "/srv", true)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::FileNotFound { .. }));
        assert_eq!(connector.attempts(), 0);
    }

    fn planned_deletes(paths: &[&str]) -> Vec<RelativePath> {
        paths.iter().map(|p| RelativePath::new(p).unwrap()).collect()
    }

    fn scan_with(failures: Vec<ScanFailure>) -> LocalScan {
        LocalScan::from(ScanOutcome {
            manifest: Manifest::new(),
            failures,
        })
    }

    #[test]
    fn test_unreadable_file_keeps_its_remote_copy() {
        let scan = scan_with(vec![ScanFailure::new("secret.txt", "permission denied")]);
        let mut deletes = planned_deletes(&["secret.txt", "stale.txt"]);

        assert_eq!(scan.retain_safe_deletes(&mut deletes), 1);
        assert_eq!(deletes, planned_deletes(&["stale.txt"]));
    }

    #[test]
    fn test_unreadable_directory_keeps_its_remote_subtree() {
        let scan = scan_with(vec![ScanFailure::directory("sub", "permission denied")]);
        let mut deletes = planned_deletes(&["stale.txt", "sub/keep.txt", "sub/deep/x.txt", "subway.txt"]);

        assert_eq!(scan.retain_safe_deletes(&mut deletes), 2);
        assert_eq!(deletes, planned_deletes(&["stale.txt", "subway.txt"]));
    }

    #[test]
    fn test_failed_local_scan_keeps_every_remote_file() {
        let scan = scan_with(vec![ScanFailure::directory("", "walk failed")]);
        let mut deletes = planned_deletes(&["a.txt", "b/c.txt"]);

        assert_eq!(scan.retain_safe_deletes(&mut deletes), 2);
        assert!(deletes.is_empty());
    }

    #[test]
    fn test_clean_scan_keeps_every_deletion() {
        let scan = scan_with(Vec::new());
        let mut deletes = planned_deletes(&["a.txt"]);

        assert_eq!(scan.retain_safe_deletes(&mut deletes), 0);
        assert_eq!(deletes.len(), 1);
    }
}
