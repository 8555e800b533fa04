//! End-to-end scenarios, including the filesystem store and pattern parser.

mod common;

use std::sync::Arc;

use common::*;
use docintake::{
    load_config, ByteSource, FailureKind, FileCandidate, FileMeta, FilesystemBlobStore,
    IntakeError, IntakePipeline, RejectReason, TaskState, ValidationError,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_academic_transcript_scenario() {
    let harness = TestHarness::new(vec![academic_policy()]);

    let id = harness.admit("academic", candidate("transcript.pdf", 2 * MB));
    assert_eq!(
        harness.pipeline.snapshot(&id).unwrap().state,
        TaskState::Uploading
    );

    let terminal = harness.wait_terminal(&id).await;
    assert_eq!(terminal.state, TaskState::Verified);

    let task = harness.pipeline.snapshot(&id).unwrap();
    assert_eq!(task.confidence_score, Some(85));
    assert_eq!(task.parsed_data, Some(sample_data()));
    assert!(task.completed_at.is_some());

    let outcomes = harness
        .pipeline
        .submit("academic", vec![candidate("transcript-scan.pdf", 12 * MB)])
        .unwrap();
    assert!(matches!(
        outcomes[0],
        Err(RejectReason::Validation(ValidationError::ExceedsMaxSize { .. }))
    ));

    let usage = harness.pipeline.quota_usage("academic").unwrap();
    assert_eq!((usage.held, usage.max_tasks), (1, 5));
}

#[tokio::test]
async fn test_filesystem_pipeline_from_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let blob_root = temp_dir.path().join("blobs");
    let config = load_config(write_pattern_config(temp_dir.path(), &blob_root)).unwrap();
    let pipeline = IntakePipeline::from_config(&config).unwrap();

    let source = temp_dir.path().join("transcript.txt");
    std::fs::write(
        &source,
        "University of Nowhere\nStudent: Ada Lovelace\nGPA: 3.95\n",
    )
    .unwrap();

    let outcomes = pipeline
        .submit("academic", vec![FileCandidate::from_path(&source).unwrap()])
        .unwrap();
    let id = outcomes.into_iter().next().unwrap().unwrap();

    let terminal = tokio::time::timeout(SETTLE, pipeline.subscribe(&id).unwrap().wait_terminal())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(terminal.state, TaskState::Verified);
    assert_eq!(terminal.confidence_score, Some(100));

    let task = pipeline.snapshot(&id).unwrap();
    let data = task.parsed_data.unwrap();
    assert_eq!(data["student"], "Ada Lovelace");
    assert_eq!(data["gpa"], "3.95");

    let store = FilesystemBlobStore::new(&blob_root);
    let stored = store.read(task.blob_ref.as_ref().unwrap()).await.unwrap();
    assert_eq!(stored, std::fs::read(&source).unwrap());
}

#[tokio::test]
async fn test_filesystem_pipeline_rejects_incomplete_cv() {
    let temp_dir = TempDir::new().unwrap();
    let blob_root = temp_dir.path().join("blobs");
    let config = load_config(write_pattern_config(temp_dir.path(), &blob_root)).unwrap();
    let pipeline = Arc::new(IntakePipeline::from_config(&config).unwrap());

    // Two of three fields: 67 against a threshold of 90.
    let cv = FileCandidate::from_bytes(
        "cv.txt",
        b"Name: Grace Hopper\nContact: grace@navy.example.org\n".to_vec(),
    );
    let id = pipeline
        .submit("career", vec![cv])
        .unwrap()
        .remove(0)
        .unwrap();

    let terminal = tokio::time::timeout(SETTLE, pipeline.subscribe(&id).unwrap().wait_terminal())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(terminal.state, TaskState::Rejected);
    assert_eq!(terminal.failure_kind, Some(FailureKind::LowConfidence));
    assert_eq!(terminal.confidence_score, Some(67));
    assert!(terminal.error_reason.unwrap().contains("67 < 90"));
}

#[tokio::test]
async fn test_content_beyond_declared_size_is_transport_failure() {
    let temp_dir = TempDir::new().unwrap();
    let blob_root = temp_dir.path().join("blobs");
    let config = load_config(write_pattern_config(temp_dir.path(), &blob_root)).unwrap();
    let pipeline = IntakePipeline::from_config(&config).unwrap();

    // Declared as one byte against a 1 MiB limit, but carries 12 MiB.
    let oversized = FileCandidate::new(
        FileMeta::new("cv.txt", 1),
        ByteSource::from_bytes(vec![b'x'; 12 * MB as usize]),
    );
    let id = pipeline
        .submit("career", vec![oversized])
        .unwrap()
        .remove(0)
        .unwrap();

    let terminal = tokio::time::timeout(SETTLE, pipeline.subscribe(&id).unwrap().wait_terminal())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(terminal.state, TaskState::Rejected);
    assert_eq!(terminal.failure_kind, Some(FailureKind::Transport));
    assert!(terminal
        .error_reason
        .unwrap()
        .contains("more bytes than declared"));
    assert!(pipeline.snapshot(&id).unwrap().blob_ref.is_none());
}

#[tokio::test]
async fn test_from_config_requires_blob_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut config =
        load_config(write_pattern_config(temp_dir.path(), &temp_dir.path().join("b"))).unwrap();
    config.blob_store = None;

    assert!(matches!(
        IntakePipeline::from_config(&config),
        Err(IntakeError::Config(_))
    ));
}

#[test]
fn test_pipeline_needs_a_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let config =
        load_config(write_pattern_config(temp_dir.path(), &temp_dir.path().join("b"))).unwrap();

    assert!(matches!(
        IntakePipeline::from_config(&config),
        Err(IntakeError::NoRuntime)
    ));
}

#[tokio::test]
async fn test_global_subscribers_see_every_task() {
    let harness = TestHarness::new(vec![academic_policy()]);
    let mut all = harness.pipeline.subscribe_all();

    let first = harness.admit("academic", candidate("a.pdf", MB));
    let second = harness.admit("academic", candidate("b.pdf", MB));
    harness.wait_terminal(&first).await;
    harness.wait_terminal(&second).await;

    let mut verified = Vec::new();
    while let Ok(event) = all.try_recv() {
        if event.state == TaskState::Verified {
            verified.push(event.task_id);
        }
    }
    verified.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let mut expected = vec![first, second];
    expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(verified, expected);
}

#[tokio::test]
async fn test_list_is_newest_first_and_filterable() {
    let harness = TestHarness::new(vec![
        academic_policy(),
        PolicyBuilder::new("financial").build(),
    ]);
    let older = harness.admit("academic", candidate("a.pdf", MB));
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = harness.admit("academic", candidate("b.pdf", MB));
    harness.admit("financial", candidate("c.pdf", MB));

    let academic = harness.pipeline.list(Some("academic"));
    assert_eq!(academic.len(), 2);
    assert_eq!(academic[0].id, newer);
    assert_eq!(academic[1].id, older);
    assert_eq!(harness.pipeline.list(None).len(), 3);
}
