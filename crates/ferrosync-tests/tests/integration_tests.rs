//! Integration tests for ferrosync
//!
//! These tests drive complete sync passes through the public API of the
//! sync engine, against the in-memory and mounted backends.

use std::fs;
use std::sync::Arc;

use ferrosync_remote::{MemoryConnector, MemoryRemote, MountedConnector};
use ferrosync_sync::{ChannelSink, EventLevel, SyncEvent, SyncOrchestrator, SyncPhase};
use ferrosync_tests::test_utils::{
    create_local_tree, mounted_config, mutating_operations, remote_listing, remote_with,
    server_config, write_files, REMOTE_ROOT,
};
use ferrosync_types::Error;
use proptest::prelude::*;
use rstest::rstest;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn drain(events: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn test_initial_sync_uploads_whole_tree() {
    let local = create_local_tree(&[("a.txt", "hi"), ("b/c.txt", "yo")]);
    let remote = MemoryRemote::new();
    let (sink, mut events) = ChannelSink::new();

    let mut orchestrator =
        SyncOrchestrator::new(MemoryConnector::new(remote.clone()), server_config("web1", 3))
            .with_event_sink(Arc::new(sink));
    let result = orchestrator
        .sync(local.path(), REMOTE_ROOT, false)
        .await
        .unwrap();

    assert_eq!(result.uploaded, 2);
    assert_eq!(result.deleted, 0);
    assert_eq!(result.bytes_uploaded, 4);
    assert!(result.is_clean());
    assert_eq!(orchestrator.phase(), SyncPhase::Done);
    assert_eq!(remote_listing(&remote, REMOTE_ROOT), vec!["a.txt", "b/c.txt"]);
    assert_eq!(remote.file("/data/images/b/c.txt").unwrap(), b"yo");

    let messages: Vec<String> = drain(&mut events)
        .into_iter()
        .filter(|event| event.level == EventLevel::Info)
        .map(|event| event.message)
        .collect();
    assert_eq!(
        messages,
        vec![
            "upload: a.txt",
            "upload: b/c.txt",
            "sync complete: uploaded=2, deleted=0",
        ]
    );
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let local = create_local_tree(&[("a.txt", "hi"), ("b/c.txt", "yo")]);
    let remote = MemoryRemote::new();
    let connector = MemoryConnector::new(remote.clone());

    let mut orchestrator = SyncOrchestrator::new(connector, server_config("web1", 3));
    orchestrator
        .sync(local.path(), REMOTE_ROOT, true)
        .await
        .unwrap();
    let writes_after_first = mutating_operations(&remote).len();

    let second = orchestrator
        .sync(local.path(), REMOTE_ROOT, true)
        .await
        .unwrap();

    assert_eq!(second.uploaded, 0);
    assert_eq!(second.deleted, 0);
    assert!(second.is_clean());
    assert_eq!(mutating_operations(&remote).len(), writes_after_first);
}

#[rstest]
#[case(true, 1, vec!["a.txt"])]
#[case(false, 0, vec!["a.txt", "stale.txt"])]
#[tokio::test]
async fn test_remote_extras_follow_delete_flag(
    #[case] enable_delete: bool,
    #[case] expected_deleted: u64,
    #[case] expected_listing: Vec<&str>,
) {
    let local = create_local_tree(&[("a.txt", "hi")]);
    let remote = remote_with(&[
        ("/data/images/a.txt", "hi"),
        ("/data/images/stale.txt", "old"),
    ]);

    let mut orchestrator =
        SyncOrchestrator::new(MemoryConnector::new(remote.clone()), server_config("web1", 3));
    let result = orchestrator
        .sync(local.path(), REMOTE_ROOT, enable_delete)
        .await
        .unwrap();

    assert_eq!(result.uploaded, 0);
    assert_eq!(result.deleted, expected_deleted);
    assert_eq!(remote_listing(&remote, REMOTE_ROOT), expected_listing);
}

#[rstest]
#[case::server_hash(true)]
#[case::downloaded(false)]
#[tokio::test]
async fn test_changed_file_is_uploaded(#[case] md5sum: bool) {
    let local = create_local_tree(&[("a.txt", "new"), ("same.txt", "same")]);
    let remote = remote_with(&[
        ("/data/images/a.txt", "old"),
        ("/data/images/same.txt", "same"),
    ])
    .with_md5sum(md5sum);

    let mut orchestrator =
        SyncOrchestrator::new(MemoryConnector::new(remote.clone()), server_config("web1", 3));
    let result = orchestrator
        .sync(local.path(), REMOTE_ROOT, false)
        .await
        .unwrap();

    assert_eq!(result.uploaded, 1);
    assert_eq!(remote.file("/data/images/a.txt").unwrap(), b"new");
    assert!(!remote
        .operations()
        .contains(&"write /data/images/same.txt".to_string()));
}

#[tokio::test]
async fn test_item_failures_do_not_stop_the_pass() {
    let local = create_local_tree(&[("a.txt", "hi"), ("b.txt", "yo")]);
    let remote = remote_with(&[("/data/images/gone.txt", "x")])
        .fail_upload("/data/images/a.txt")
        .fail_delete("/data/images/gone.txt");
    let (sink, mut events) = ChannelSink::new();

    let mut orchestrator =
        SyncOrchestrator::new(MemoryConnector::new(remote.clone()), server_config("web1", 3))
            .with_event_sink(Arc::new(sink));
    let result = orchestrator
        .sync(local.path(), REMOTE_ROOT, true)
        .await
        .unwrap();

    assert_eq!(result.uploaded, 1);
    assert_eq!(result.deleted, 0);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(orchestrator.phase(), SyncPhase::Done);
    assert_eq!(remote.file("/data/images/b.txt").unwrap(), b"yo");

    let errors: Vec<String> = drain(&mut events)
        .into_iter()
        .filter(|event| event.level == EventLevel::Error)
        .map(|event| event.message)
        .collect();
    assert!(errors[0].starts_with("upload failed (a.txt)"));
    assert!(errors[1].starts_with("delete failed (gone.txt)"));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_server_aborts_after_retries() {
    let local = create_local_tree(&[("a.txt", "hi")]);
    let connector = MemoryConnector::new(MemoryRemote::new()).reject_login();

    let mut orchestrator = SyncOrchestrator::new(connector.clone(), server_config("web1", 3));
    let error = orchestrator
        .sync(local.path(), REMOTE_ROOT, true)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Connection { retries: 3, .. }));
    assert_eq!(connector.attempts(), 4);
    assert_eq!(orchestrator.phase(), SyncPhase::Failed);
    assert!(connector.remote().operations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flaky_server_reports_reconnect() {
    let local = create_local_tree(&[("a.txt", "hi")]);
    let remote = MemoryRemote::new();
    let connector = MemoryConnector::new(remote.clone()).fail_first(2);
    let (sink, mut events) = ChannelSink::new();

    let mut orchestrator = SyncOrchestrator::new(connector.clone(), server_config("web1", 3))
        .with_event_sink(Arc::new(sink));
    let result = orchestrator
        .sync(local.path(), REMOTE_ROOT, false)
        .await
        .unwrap();

    assert_eq!(connector.attempts(), 3);
    assert_eq!(result.uploaded, 1);
    let first = drain(&mut events).remove(0);
    assert_eq!(first.message, "reconnected after 2 failed attempts");
}

#[rstest]
#[case("/data/../etc")]
#[case("../outside")]
#[tokio::test]
async fn test_traversal_in_remote_root_is_rejected(#[case] root: &str) {
    let local = create_local_tree(&[("a.txt", "hi")]);
    let connector = MemoryConnector::new(MemoryRemote::new());

    let mut orchestrator = SyncOrchestrator::new(connector.clone(), server_config("web1", 3));
    let error = orchestrator.sync(local.path(), root, false).await.unwrap_err();

    assert!(matches!(error, Error::PathSecurity { .. }));
    assert!(connector.remote().files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_servers_are_synced_independently() {
    let local = create_local_tree(&[("a.txt", "hi")]);
    let down = MemoryConnector::new(MemoryRemote::new()).reject_login();
    let up = MemoryRemote::new();

    let mut first = SyncOrchestrator::new(down, server_config("web1", 1));
    assert!(first.sync(local.path(), REMOTE_ROOT, false).await.is_err());

    let mut second = SyncOrchestrator::new(MemoryConnector::new(up.clone()), server_config("web2", 1));
    let result = second
        .sync(local.path(), REMOTE_ROOT, false)
        .await
        .unwrap();

    assert_eq!(result.host, "web2");
    assert_eq!(result.uploaded, 1);
    assert_eq!(remote_listing(&up, REMOTE_ROOT), vec!["a.txt"]);
}

#[tokio::test]
async fn test_mounted_backend_mirrors_tree() {
    let local = create_local_tree(&[("a.txt", "hi"), ("b/c.txt", "yo")]);
    let mount = TempDir::new().unwrap();
    write_files(mount.path(), &[("site/stale.txt", "old"), ("site/a.txt", "hi")]);

    let mut orchestrator =
        SyncOrchestrator::new(MountedConnector, mounted_config("nas", mount.path()));
    let result = orchestrator.sync(local.path(), "/site", true).await.unwrap();

    assert_eq!(result.uploaded, 1);
    assert_eq!(result.deleted, 1);
    assert!(result.is_clean());
    assert_eq!(
        fs::read_to_string(mount.path().join("site/b/c.txt")).unwrap(),
        "yo"
    );
    assert!(!mount.path().join("site/stale.txt").exists());

    let again = orchestrator.sync(local.path(), "/site", true).await.unwrap();
    assert_eq!((again.uploaded, again.deleted), (0, 0));
}

/// Directory segments never end in `.txt`, so a file never shadows a directory
fn file_name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.txt"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_sync_makes_remote_match_local(
        local_files in prop::collection::btree_map(file_name(), "[a-z]{0,8}", 0..6),
        remote_files in prop::collection::btree_map(file_name(), "[a-z]{0,8}", 0..6),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let pairs: Vec<(&str, &str)> = local_files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
            .collect();
        let local = create_local_tree(&pairs);

        let remote = remote_files.iter().fold(MemoryRemote::new(), |remote, (path, content)| {
            remote.with_file(&format!("{}/{}", REMOTE_ROOT, path), content.as_bytes())
        });

        let mut orchestrator =
            SyncOrchestrator::new(MemoryConnector::new(remote.clone()), server_config("web1", 0));
        let result = runtime
            .block_on(orchestrator.sync(local.path(), REMOTE_ROOT, true))
            .unwrap();

        prop_assert!(result.is_clean());
        let expected: Vec<String> = local_files.keys().cloned().collect();
        prop_assert_eq!(remote_listing(&remote, REMOTE_ROOT), expected);
        for (path, content) in &local_files {
            let stored = remote.file(&format!("{}/{}", REMOTE_ROOT, path)).unwrap();
            prop_assert_eq!(stored, content.as_bytes().to_vec());
        }
    }
}
