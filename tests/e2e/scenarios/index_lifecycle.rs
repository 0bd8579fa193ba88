use crate::harness::TestWorkspace;
use gitstore_core::{ErrorKind, StoreError, META_FILE, STORE_FILE};
use std::fs;
use std::sync::Arc;

#[test]
fn test_sibling_indices_and_clear() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = ws.open().unwrap();

    // Can create indices
    let a = repo.get_index("a").unwrap();
    assert!(ws.index_dir("a").join(META_FILE).is_file());
    assert!(ws.index_dir("a").join(STORE_FILE).is_file());

    let b = repo.get_index("b").unwrap();
    assert!(ws.index_dir("b").is_dir());
    b.index_document("b1", "untouched sibling").unwrap();

    // Can get an existing index
    let again = repo.get_index("a").unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(ws.entry_count(&ws.index_dir("a")).unwrap(), 2);

    // Can delete an index
    repo.clear_index("a").unwrap();
    assert!(!ws.index_dir("a").exists());
    assert!(ws.index_dir("b").join(STORE_FILE).is_file());
    assert_eq!(b.doc_count().unwrap(), 1);

    repo.close().unwrap();
}

#[test]
fn test_clear_makes_prior_content_unreachable() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = ws.open().unwrap();

    repo.get_index("a")
        .unwrap()
        .index_document("d1", "secret content")
        .unwrap();
    repo.clear_index("a").unwrap();

    let fresh = repo.get_index("a").unwrap();
    assert_eq!(fresh.doc_count().unwrap(), 0);
    assert!(repo.search("a", "secret").unwrap().is_empty());
    repo.close().unwrap();
}

#[test]
fn test_clear_never_created_leaves_no_trace() {
    let ws = TestWorkspace::bare().unwrap();
    let repo = ws.open().unwrap();

    repo.clear_index("never-created").unwrap();
    assert!(!ws.index_dir("never-created").exists());
    assert!(!ws.git_dir().join(gitstore_core::DEFAULT_NAMESPACE).exists());
    repo.close().unwrap();
}

#[test]
fn test_index_survives_process_restart() {
    let ws = TestWorkspace::bare().unwrap();
    {
        let repo = ws.open().unwrap();
        let (_, written) = repo
            .rebuild_index(
                "bugs",
                [
                    ("b1", "Crash on empty config"),
                    ("b2", "Slow startup with many refs"),
                ],
            )
            .unwrap();
        assert_eq!(written, 2);
        repo.close().unwrap();
    }

    let repo = ws.open_at("refs").unwrap();
    assert_eq!(repo.list_indices().unwrap(), vec!["bugs"]);
    let hits = repo.search("bugs", "startup").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "b2");
    repo.close().unwrap();
}

#[test]
fn test_corrupt_index_reports_and_recovers() {
    let ws = TestWorkspace::worktree().unwrap();
    {
        let repo = ws.open().unwrap();
        repo.get_index("a").unwrap();
        repo.close().unwrap();
    }
    fs::remove_file(ws.index_dir("a").join(META_FILE)).unwrap();

    let repo = ws.open().unwrap();
    let err = repo.get_index("a").unwrap_err();
    assert!(matches!(err, StoreError::IndexOpen { ref name, .. } if name == "a"));
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert!(err.recovery_suggestion().is_some());

    repo.clear_index("a").unwrap();
    assert_eq!(repo.get_index("a").unwrap().doc_count().unwrap(), 0);
    repo.close().unwrap();
}

#[test]
fn test_stale_object_after_clear_is_closed() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = ws.open().unwrap();

    let stale = repo.get_index("a").unwrap();
    repo.clear_index("a").unwrap();
    assert!(matches!(
        stale.index_document("d1", "text"),
        Err(StoreError::IndexClosed { .. })
    ));
    repo.close().unwrap();
}

#[test]
fn test_local_storage_beside_indices() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = ws.open().unwrap();

    let storage = repo.local_storage().unwrap();
    storage.write("excerpts/b1.json", br#"{"title":"crash"}"#).unwrap();
    repo.get_index("a").unwrap();

    assert_eq!(
        storage.list("").unwrap(),
        vec!["excerpts".to_string(), "indexes".to_string()]
    );
    repo.close().unwrap();
    assert!(matches!(
        repo.local_storage(),
        Err(StoreError::UseAfterClose)
    ));
}
