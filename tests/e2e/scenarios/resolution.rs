use crate::harness::TestWorkspace;
use gitstore_core::{resolve, ErrorKind, Layout, Repository, StoreError};

#[test]
fn test_worktree_paths_resolve_identically() {
    let ws = TestWorkspace::worktree().unwrap();
    ws.write_file("src/main.rs", b"fn main() {}").unwrap();
    let expected = ws.canonical_git_dir().unwrap();

    for rel in [
        "",
        "src",
        "src/main.rs",
        ".git",
        ".git/objects",
        ".git/objects/de",
        ".git/refs/heads",
        ".git/hooks",
    ] {
        let start = ws.root().join(rel);
        let resolved = resolve(&start).unwrap();
        assert_eq!(resolved.git_dir, expected, "start: {}", start.display());
        assert!(matches!(resolved.layout, Layout::WorkTree { .. }));
    }
}

#[test]
fn test_bare_paths_resolve_to_bare_dir() {
    let ws = TestWorkspace::bare().unwrap();
    let expected = ws.canonical_git_dir().unwrap();

    for rel in ["", "objects", "objects/de", "refs/heads"] {
        let resolved = resolve(ws.root().join(rel)).unwrap();
        assert_eq!(resolved.git_dir, expected);
        assert_eq!(resolved.layout, Layout::Bare);
    }
}

#[test]
fn test_filesystem_root_is_not_a_repo() {
    let err = Repository::open("/").err().unwrap();
    assert!(matches!(err, StoreError::PathNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_parent_of_repo_is_not_a_repo() {
    for ws in [TestWorkspace::worktree().unwrap(), TestWorkspace::bare().unwrap()] {
        let err = Repository::open(ws.parent()).err().unwrap();
        assert!(matches!(err, StoreError::PathNotFound { .. }));
    }
}

#[test]
fn test_open_from_objects_matches_open_from_root() {
    let ws = TestWorkspace::worktree().unwrap();

    let from_objects = ws.open_at(".git/objects/de").unwrap();
    let from_root = ws.open().unwrap();

    assert_eq!(from_objects.root().unwrap(), from_root.root().unwrap());
    assert_eq!(from_objects.git_dir().unwrap(), from_root.git_dir().unwrap());
    assert_eq!(
        from_root.git_dir().unwrap(),
        ws.canonical_git_dir().unwrap()
    );

    from_objects.close().unwrap();
    from_root.close().unwrap();
}

#[test]
fn test_bare_root_is_git_dir() {
    let ws = TestWorkspace::bare().unwrap();
    let repo = ws.open_at("objects").unwrap();
    assert_eq!(repo.root().unwrap(), repo.git_dir().unwrap());
    assert_eq!(repo.layout().unwrap(), &Layout::Bare);
    repo.close().unwrap();
}

#[test]
fn test_empty_dot_git_is_not_opened() {
    let tmp = tempfile::TempDir::new().unwrap();
    let plain = tmp.path().join("plain");
    std::fs::create_dir_all(plain.join(".git")).unwrap();

    let err = Repository::open(&plain).err().unwrap();
    assert!(matches!(err, StoreError::PathNotFound { .. }));
    assert_eq!(std::fs::read_dir(plain.join(".git")).unwrap().count(), 0);
}
