//! Exercises `StateTracker` against `StdFilesApi` so the marker file names
//! actually landing on disk match what C git expects in a real `.git` dir.

use std::path::Path;
use std::sync::Arc;

use git_hash::{HashAlgorithm, ObjectId};
use git_state::{StateTracker, TransformationKind};
use git_utils::StdFilesApi;

fn oid(byte: u8) -> ObjectId {
    ObjectId::from_bytes(&[byte; 20], HashAlgorithm::Sha1).unwrap()
}

#[test]
fn rebase_markers_land_at_expected_paths() {
    let dir = tempfile::tempdir().unwrap();
    let files: Arc<dyn git_utils::FilesApi> = Arc::new(StdFilesApi::new(dir.path()));
    let tracker = StateTracker::new(files);

    let original_head = oid(1);
    let replaying = oid(2);
    tracker
        .begin(TransformationKind::Rebase, original_head, &[replaying], None)
        .unwrap();

    assert!(dir.path().join("REBASE_HEAD").is_file());
    assert!(dir.path().join("ORIG_HEAD").is_file());
    assert!(dir.path().join("sequencer").join("head").is_file());

    let rebase_head = std::fs::read_to_string(dir.path().join("REBASE_HEAD")).unwrap();
    assert_eq!(rebase_head.trim(), replaying.to_hex());

    tracker.complete(TransformationKind::Rebase).unwrap();
    assert!(!dir.path().join("REBASE_HEAD").exists());
    assert!(!dir.path().join("sequencer").exists());
    // ORIG_HEAD is the undo safety net; it survives a successful completion.
    assert!(dir.path().join("ORIG_HEAD").is_file());
}

#[test]
fn merge_abort_leaves_caller_to_restore_head() {
    let dir = tempfile::tempdir().unwrap();
    let files: Arc<dyn git_utils::FilesApi> = Arc::new(StdFilesApi::new(dir.path()));
    let tracker = StateTracker::new(files);

    tracker
        .begin(TransformationKind::Merge, oid(1), &[oid(2)], Some("Merge branch 'x'\n"))
        .unwrap();
    assert!(dir.path().join("MERGE_MODE").is_file());
    assert!(dir.path().join(Path::new("MERGE_MSG")).is_file());

    tracker.abort(TransformationKind::Merge).unwrap();

    assert!(!dir.path().join("MERGE_HEAD").exists());
    assert!(!dir.path().join("MERGE_MSG").exists());
    assert!(!dir.path().join("MERGE_MODE").exists());
    assert!(tracker.get_state().unwrap().is_none());
}
