use dedupe::dedupe::{DedupeConfig, Deduplicator, SymlinkPolicy};
use dedupe::scanner::FileIdentity;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    File::create(path)
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
}

fn policy(symlink: SymlinkPolicy) -> DedupeConfig {
    DedupeConfig {
        symlink,
        recurse: true,
        ..Default::default()
    }
}

#[test]
#[cfg(unix)]
fn test_never_policy_hard_links() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");

    let summary = Deduplicator::new(policy(SymlinkPolicy::Never))
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.hard_linked, 1);
    assert_eq!(summary.sym_linked, 0);
    assert!(fs::symlink_metadata(dir.path().join("b.txt"))
        .unwrap()
        .is_file());
}

#[test]
#[cfg(unix)]
fn test_fallback_policy_hard_links_on_same_device() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");

    let summary = Deduplicator::new(policy(SymlinkPolicy::Fallback))
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.hard_linked, 1);
    assert_eq!(summary.cross_device_skips, 0);
    let a = FileIdentity::query(&dir.path().join("a.txt")).unwrap();
    let b = FileIdentity::query(&dir.path().join("b.txt")).unwrap();
    assert!(a.same_file(&b));
}

#[test]
#[cfg(unix)]
fn test_always_policy_creates_relative_symlinks() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::create_dir(dir.path().join("b")).unwrap();
    write(&dir.path().join("a").join("file.txt"), "hello");
    write(&dir.path().join("b").join("file.txt"), "hello");

    let summary = Deduplicator::new(policy(SymlinkPolicy::Always))
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.sym_linked, 1);
    assert_eq!(summary.hard_linked, 0);
    let link = dir.path().join("b").join("file.txt");
    assert_eq!(fs::read_link(&link).unwrap(), Path::new("../a/file.txt"));
    assert_eq!(fs::read_to_string(&link).unwrap(), "hello");
}

#[test]
#[cfg(unix)]
fn test_symlinked_tree_is_idempotent() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");

    let first = Deduplicator::new(policy(SymlinkPolicy::Always))
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(first.sym_linked, 1);

    // Symlinks are not regular files, so the second run sees one file.
    let second = Deduplicator::new(policy(SymlinkPolicy::Always))
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(second.files_scanned, 1);
    assert_eq!(second.pairs_found, 0);
}

#[test]
fn test_policy_names() {
    assert_eq!(SymlinkPolicy::Never.to_string(), "never");
    assert_eq!(SymlinkPolicy::Fallback.to_string(), "fallback");
    assert_eq!(SymlinkPolicy::Always.to_string(), "always");
}
