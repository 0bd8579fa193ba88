use crate::harness::TestWorkspace;
use gitstore_core::{ErrorKind, StoreError};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_get_index_shares_one_object() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = Arc::new(ws.open().unwrap());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                repo.get_index("shared").unwrap()
            })
        })
        .collect();

    let indices: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for index in &indices[1..] {
        assert!(Arc::ptr_eq(&indices[0], index));
    }
    repo.close().unwrap();
}

#[test]
fn test_concurrent_writers_on_one_index() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = Arc::new(ws.open().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                let index = repo.get_index("bugs").unwrap();
                for i in 0..5 {
                    index
                        .index_document(&format!("t{}-{}", t, i), "concurrent write")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(repo.get_index("bugs").unwrap().doc_count().unwrap(), 20);
    repo.close().unwrap();
}

#[test]
fn test_get_and_clear_interleave_safely() {
    let ws = TestWorkspace::worktree().unwrap();
    let repo = Arc::new(ws.open().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for _ in 0..10 {
                    if t % 2 == 0 {
                        repo.get_index("churn").unwrap();
                    } else {
                        repo.clear_index("churn").unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Whatever the interleaving, the final state is consistent.
    let index = repo.get_index("churn").unwrap();
    assert_eq!(index.doc_count().unwrap(), 0);
    repo.close().unwrap();
}

#[test]
fn test_second_handle_sees_busy_index() {
    let ws = TestWorkspace::worktree().unwrap();
    let first = ws.open().unwrap();
    let second = ws.open().unwrap();

    first
        .get_index("x")
        .unwrap()
        .index_document("d1", "held by the first handle")
        .unwrap();

    let err = second.get_index("x").unwrap_err();
    assert!(matches!(err, StoreError::IndexBusy { .. }));
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert!(!err.recovery_suggestion().unwrap().contains("clear"));

    first.close().unwrap();
    assert_eq!(second.search("x", "handle").unwrap().len(), 1);
    second.close().unwrap();
}
