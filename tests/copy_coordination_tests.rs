//! Integration tests for the blob copy coordination flow
//!
//! Drives the resolver, initiator, poller, aborter and local orchestrator
//! against a scripted in-memory channel.

mod common;

use blobcopy::channel::{CopySource, StorageChannel};
use blobcopy::copy::models::CopyStatus;
use blobcopy::copy::{
    BlobIdentityResolver, CopyAborter, CopyInitiator, CopyStatusPoller, LocalCopyOrchestrator,
};
use blobcopy::error::BlobCopyError;
use blobcopy::utils::interactive::StaticConfirmation;
use blobcopy::utils::progress::NullProgress;
use common::{FakeBlob, FakeChannel, FakeCopy};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const ACCOUNT: &str = "acct";

fn channel_with_source_blob() -> Arc<FakeChannel> {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.add_blob(
        "src",
        "a.txt",
        FakeBlob {
            total_bytes: 1000,
            copy: None,
        },
    );
    channel
}

fn source_url(container: &str, blob: &str) -> String {
    format!("https://{ACCOUNT}.blob.core.windows.net/{container}/{blob}")
}

async fn resolve_source(channel: &Arc<FakeChannel>) -> CopySource {
    let resolver = BlobIdentityResolver::new(channel.clone() as Arc<dyn StorageChannel>);
    resolver
        .resolve_source_blob("src", "a.txt")
        .await
        .expect("source blob resolves")
}

#[tokio::test]
async fn test_resume_monitoring_does_not_restart_copy() {
    let channel = channel_with_source_blob();
    channel.add_blob(
        "dst",
        "a.txt",
        FakeBlob {
            total_bytes: 1000,
            copy: Some(FakeCopy::pending("copy-7", &source_url("src", "a.txt"))),
        },
    );

    let source = resolve_source(&channel).await;
    let confirm = StaticConfirmation::new(true);
    let initiator = CopyInitiator::new(channel.clone() as Arc<dyn StorageChannel>, &confirm);

    let handle = initiator
        .start(&source, "dst", None, false)
        .await
        .unwrap()
        .expect("resume returns the destination handle");

    assert_eq!(handle.copy_id(), Some("copy-7"));
    assert_eq!(channel.start_copy_calls(), 0);
}

#[tokio::test]
async fn test_conflicting_pending_copy_fails_without_remote_calls() {
    let channel = channel_with_source_blob();
    channel.add_blob(
        "dst",
        "a.txt",
        FakeBlob {
            total_bytes: 1000,
            copy: Some(FakeCopy::pending(
                "copy-9",
                &source_url("other", "b.txt"),
            )),
        },
    );

    let source = resolve_source(&channel).await;
    let confirm = StaticConfirmation::new(true);
    let initiator = CopyInitiator::new(channel.clone() as Arc<dyn StorageChannel>, &confirm);

    let err = initiator
        .start(&source, "dst", None, false)
        .await
        .unwrap_err();

    match err {
        BlobCopyError::CopyConflict { copy_id, .. } => assert_eq!(copy_id, "copy-9"),
        other => panic!("expected CopyConflict, got {other}"),
    }
    assert_eq!(channel.start_copy_calls(), 0);
    assert_eq!(channel.abort_calls(), 0);
}

#[tokio::test]
async fn test_declined_overwrite_is_not_an_error() {
    let channel = channel_with_source_blob();
    channel.add_blob(
        "dst",
        "a.txt",
        FakeBlob {
            total_bytes: 1000,
            copy: None,
        },
    );

    let source = resolve_source(&channel).await;
    let confirm = StaticConfirmation::new(false);
    let initiator = CopyInitiator::new(channel.clone() as Arc<dyn StorageChannel>, &confirm);

    let outcome = initiator.start(&source, "dst", None, false).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(channel.start_copy_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_polling_slots_resolve_all_jobs() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    let blobs: Vec<String> = (0..10).map(|i| format!("blob-{i}.bin")).collect();
    for name in &blobs {
        channel.add_blob(
            "dst",
            name,
            FakeBlob {
                total_bytes: 100,
                copy: Some(
                    FakeCopy::pending("copy-x", &source_url("src", name))
                        .with_script(&[CopyStatus::Pending, CopyStatus::Success]),
                ),
            },
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut poller = CopyStatusPoller::new(
        channel.clone() as Arc<dyn StorageChannel>,
        4,
        Duration::from_secs(1),
        stop,
    );

    for name in &blobs {
        let result = poller.check_one("dst", name, true).await.unwrap();
        assert!(result.is_none(), "pending copies join the watch ring");
    }
    assert_eq!(poller.queued(), 10);

    let mut progress = NullProgress;
    let resolved = poller.wait_for_completion(&mut progress).await.unwrap();

    assert_eq!(resolved.len(), 10);
    assert_eq!(poller.summary().finished, 10);
    assert_eq!(poller.summary().failed, 0);
    assert_eq!(poller.queued(), 0);

    // The first ten fetches come from check_one; the sweeps after that
    // process at most four jobs each, in ring order.
    let log = channel.fetch_log();
    assert_eq!(log.len(), 20);
    let sweep1: Vec<_> = log[10..14].to_vec();
    let expected: Vec<String> = blobs[..4].iter().map(|b| format!("dst/{b}")).collect();
    assert_eq!(sweep1, expected);
    let sweep3: Vec<_> = log[18..].to_vec();
    assert_eq!(sweep3.len(), 2);
}

#[tokio::test]
async fn test_abort_is_idempotent_under_conflict() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.add_blob(
        "dst",
        "a.txt",
        FakeBlob {
            total_bytes: 1000,
            copy: Some(FakeCopy::pending("copy-3", &source_url("src", "a.txt"))),
        },
    );

    let confirm = StaticConfirmation::new(true);
    let aborter = CopyAborter::new(channel.clone() as Arc<dyn StorageChannel>, &confirm);

    let first = aborter.stop("dst", "a.txt", None, true).await.unwrap();
    assert_eq!(first.as_deref(), Some("copy-3"));

    // The second abort races a copy that is already aborted; the 409 the
    // service answers with is not an error.
    let second = aborter.stop("dst", "a.txt", None, true).await.unwrap();
    assert_eq!(second.as_deref(), Some("copy-3"));

    assert_eq!(channel.abort_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_quit_halts_polling_mid_sweep() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    for name in ["b0.bin", "b1.bin", "b2.bin"] {
        channel.add_blob(
            "dst",
            name,
            FakeBlob {
                total_bytes: 100,
                copy: Some(FakeCopy::pending("copy-x", &source_url("src", name))),
            },
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    // Three fetches happen during check_one; the signal fires after the
    // second job of the first sweep.
    channel.set_stop_after_fetches(5, stop.clone());

    let mut poller = CopyStatusPoller::new(
        channel.clone() as Arc<dyn StorageChannel>,
        4,
        Duration::from_secs(1),
        stop,
    );

    for name in ["b0.bin", "b1.bin", "b2.bin"] {
        poller.check_one("dst", name, true).await.unwrap();
    }

    let mut progress = NullProgress;
    let resolved = poller.wait_for_completion(&mut progress).await.unwrap();

    assert!(resolved.is_empty());
    assert_eq!(poller.queued(), 3, "pending jobs stay unresolved");
    assert_eq!(channel.fetch_count("dst", "b0.bin"), 2);
    assert_eq!(channel.fetch_count("dst", "b1.bin"), 2);
    // The job past the signal point is never polled again.
    assert_eq!(channel.fetch_count("dst", "b2.bin"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_copy_with_default_destination_name() {
    let channel = channel_with_source_blob();
    assert!(!channel.has_container("dst"));
    channel.set_new_copy_script(&[
        CopyStatus::Pending,
        CopyStatus::Pending,
        CopyStatus::Pending,
        CopyStatus::Success,
    ]);

    let source = resolve_source(&channel).await;
    let confirm = StaticConfirmation::new(true);
    let initiator = CopyInitiator::new(channel.clone() as Arc<dyn StorageChannel>, &confirm);

    // Destination blob name omitted: the source blob's own name is used
    // and the missing container is created.
    let handle = initiator
        .start(&source, "dst", None, false)
        .await
        .unwrap()
        .expect("copy starts");

    assert!(channel.has_container("dst"));
    assert_eq!(handle.name, "a.txt");
    assert_eq!(channel.start_copy_calls(), 1);
    let state = handle.copy_state.as_ref().expect("copy state visible");
    assert_eq!(state.status, CopyStatus::Pending);

    let stop = Arc::new(AtomicBool::new(false));
    let mut poller = CopyStatusPoller::new(
        channel.clone() as Arc<dyn StorageChannel>,
        4,
        Duration::from_secs(1),
        stop,
    );

    let queued = poller.check_one("dst", "a.txt", true).await.unwrap();
    assert!(queued.is_none());

    let mut progress = NullProgress;
    let resolved = poller.wait_for_completion(&mut progress).await.unwrap();

    assert_eq!(resolved.len(), 1);
    let state = resolved[0].copy_state.as_ref().unwrap();
    assert_eq!(state.status, CopyStatus::Success);
    assert_eq!(state.bytes_copied, state.total_bytes);
    assert_eq!(poller.summary().finished, 1);
    assert_eq!(channel.start_copy_calls(), 1, "no second start-copy issued");
}

#[tokio::test]
async fn test_uri_host_mismatch_falls_back_to_opaque_source() {
    let channel = channel_with_source_blob();
    let resolver = BlobIdentityResolver::new(channel.clone() as Arc<dyn StorageChannel>);

    let foreign = Url::parse("https://elsewhere.blob.core.windows.net/pub/data.bin").unwrap();
    let source = resolver.resolve_source_by_uri(&foreign).await.unwrap();
    assert!(matches!(source, CopySource::Uri(_)));

    // A URI on the context's own endpoint resolves to a direct reference.
    let own = Url::parse(&source_url("src", "a.txt")).unwrap();
    let source = resolver.resolve_source_by_uri(&own).await.unwrap();
    match source {
        CopySource::Blob { handle, .. } => {
            assert_eq!(handle.container, "src");
            assert_eq!(handle.name, "a.txt");
        }
        other => panic!("expected a resolved blob source, got {other:?}"),
    }

    // Host comparison is case-insensitive against the context endpoint.
    let mixed_case = Arc::new(FakeChannel::new("AcCt"));
    mixed_case.add_blob(
        "src",
        "a.txt",
        FakeBlob {
            total_bytes: 10,
            copy: None,
        },
    );
    let resolver = BlobIdentityResolver::new(mixed_case.clone() as Arc<dyn StorageChannel>);
    let uri = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
    let source = resolver.resolve_source_by_uri(&uri).await.unwrap();
    assert!(matches!(source, CopySource::Blob { .. }));
}

#[tokio::test]
async fn test_validation_happens_before_any_remote_call() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    let stop = Arc::new(AtomicBool::new(false));
    let mut poller = CopyStatusPoller::new(
        channel.clone() as Arc<dyn StorageChannel>,
        4,
        Duration::from_secs(1),
        stop,
    );

    let err = poller.check_one("NO", "a.txt", false).await.unwrap_err();
    assert!(matches!(err, BlobCopyError::InvalidName { .. }));
    assert!(channel.fetch_log().is_empty());

    let err = poller.check_one("dst", "bad/", false).await.unwrap_err();
    assert!(matches!(err, BlobCopyError::InvalidName { .. }));
    assert!(channel.fetch_log().is_empty());
}

#[tokio::test]
async fn test_missing_source_blob_is_not_found() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.add_container("src");
    let resolver = BlobIdentityResolver::new(channel.clone() as Arc<dyn StorageChannel>);

    let err = resolver
        .resolve_source_blob("src", "missing.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCopyError::BlobNotFound { .. }));

    let err = resolver
        .resolve_source_container("absent")
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCopyError::ContainerNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_local_copy_success_with_name_from_uri() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.set_new_copy_script(&[
        CopyStatus::Pending,
        CopyStatus::Pending,
        CopyStatus::Success,
    ]);

    let confirm = StaticConfirmation::new(true);
    let stop = Arc::new(AtomicBool::new(false));
    let orchestrator = LocalCopyOrchestrator::new(
        channel.clone() as Arc<dyn StorageChannel>,
        &confirm,
        Duration::from_secs(1),
        stop,
    );

    let source = CopySource::Uri(Url::parse("https://example.com/pub/data.bin").unwrap());
    let mut progress = NullProgress;
    let handle = orchestrator
        .run(&source, "backup", None, false, &mut progress)
        .await
        .unwrap()
        .expect("copy completes");

    assert!(channel.has_container("backup"));
    assert_eq!(handle.name, "data.bin");
    let state = handle.copy_state.as_ref().unwrap();
    assert_eq!(state.status, CopyStatus::Success);
    assert_eq!(state.bytes_copied, state.total_bytes);
}

#[tokio::test(start_paused = true)]
async fn test_local_copy_failure_raises_explicit_error() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.set_new_copy_script(&[CopyStatus::Pending, CopyStatus::Failed]);

    let confirm = StaticConfirmation::new(true);
    let stop = Arc::new(AtomicBool::new(false));
    let orchestrator = LocalCopyOrchestrator::new(
        channel.clone() as Arc<dyn StorageChannel>,
        &confirm,
        Duration::from_secs(1),
        stop,
    );

    let source = CopySource::Uri(Url::parse("https://example.com/pub/data.bin").unwrap());
    let mut progress = NullProgress;
    let err = orchestrator
        .run(&source, "backup", None, false, &mut progress)
        .await
        .unwrap_err();

    match err {
        BlobCopyError::CopyFailed {
            blob, description, ..
        } => {
            assert_eq!(blob, "data.bin");
            assert!(description.contains("simulated copy failure"));
        }
        other => panic!("expected CopyFailed, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_local_copy_resumes_existing_pending_copy() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));
    channel.add_blob(
        "backup",
        "data.bin",
        FakeBlob {
            total_bytes: 1024,
            copy: Some(
                FakeCopy::pending("copy-11", "https://example.com/pub/data.bin")
                    .with_script(&[CopyStatus::Success]),
            ),
        },
    );

    let confirm = StaticConfirmation::new(true);
    let stop = Arc::new(AtomicBool::new(false));
    let orchestrator = LocalCopyOrchestrator::new(
        channel.clone() as Arc<dyn StorageChannel>,
        &confirm,
        Duration::from_secs(1),
        stop,
    );

    let source = CopySource::Uri(Url::parse("https://example.com/pub/data.bin").unwrap());
    let mut progress = NullProgress;
    let handle = orchestrator
        .run(&source, "backup", None, false, &mut progress)
        .await
        .unwrap()
        .expect("resumed copy completes");

    assert_eq!(channel.start_copy_calls(), 0);
    assert_eq!(handle.copy_id(), Some("copy-11"));
}

#[tokio::test(start_paused = true)]
async fn test_local_copy_cancellation_cleans_up_partial_blob() {
    let channel = Arc::new(FakeChannel::new(ACCOUNT));

    let confirm = StaticConfirmation::new(true);
    let stop = Arc::new(AtomicBool::new(true));
    let orchestrator = LocalCopyOrchestrator::new(
        channel.clone() as Arc<dyn StorageChannel>,
        &confirm,
        Duration::from_secs(1),
        stop,
    );

    let source = CopySource::Uri(Url::parse("https://example.com/pub/data.bin").unwrap());
    let mut progress = NullProgress;
    let outcome = orchestrator
        .run(&source, "backup", None, false, &mut progress)
        .await
        .unwrap();

    assert!(outcome.is_none(), "cancelled copy yields no handle");
    assert_eq!(channel.start_copy_calls(), 1);
    assert_eq!(channel.abort_calls(), 1);
    assert!(
        !channel.has_blob("backup", "data.bin"),
        "partial destination blob is deleted"
    );
}
