use dedupe::dedupe::{DedupeConfig, Deduplicator};
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

fn same_inode(a: &Path, b: &Path) -> bool {
    FileIdentity::query(a)
        .unwrap()
        .same_file(&FileIdentity::query(b).unwrap())
}

fn config(min_size: u64) -> DedupeConfig {
    DedupeConfig {
        min_size,
        ..Default::default()
    }
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 0);
    assert_eq!(summary.pairs_found, 0);
    assert!(!summary.has_failures());
}

#[test]
#[cfg(unix)]
fn test_hello_world_scenario() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    let c = dir.path().join("c.txt");
    write(&a, "hello");
    write(&b, "hello");
    write(&c, "world!");
    let c_before = FileIdentity::query(&c).unwrap();

    let summary = Deduplicator::new(config(0))
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 3);
    assert_eq!(summary.pairs_found, 1);
    assert_eq!(summary.hard_linked, 1);
    assert_eq!(summary.bytes_reclaimed, 5);
    assert!(same_inode(&a, &b));
    assert_eq!(FileIdentity::query(&c).unwrap(), c_before);
    assert_eq!(fs::read_to_string(&b).unwrap(), "hello");
}

#[test]
fn test_hello_world_scenario_below_min_size() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");
    write(&dir.path().join("c.txt"), "world!");

    let summary = Deduplicator::new(config(10))
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.pairs_found, 0);
    assert_eq!(summary.below_min_size, 3);
    assert_eq!(summary.files_hashed, 0);
}

#[test]
fn test_same_size_different_content_is_untouched() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write(&a, "hello");
    write(&b, "jello");

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.pairs_found, 0);
    assert_eq!(summary.files_hashed, 2);
    assert_eq!(fs::read_to_string(&a).unwrap(), "hello");
    assert_eq!(fs::read_to_string(&b).unwrap(), "jello");
}

#[test]
fn test_unique_sizes_are_never_hashed() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("one.txt"), "1");
    write(&dir.path().join("two.txt"), "22");
    write(&dir.path().join("three.txt"), "333");

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 3);
    assert_eq!(summary.files_hashed, 0);
}

#[test]
fn test_empty_files_skipped_by_default() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "");
    write(&dir.path().join("b.txt"), "");

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.pairs_found, 0);
    assert_eq!(summary.below_min_size, 2);

    let summary = Deduplicator::new(config(0))
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.pairs_found, 1);
}

#[test]
#[cfg(unix)]
fn test_first_observed_is_kept() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    let c = dir.path().join("c.txt");
    for path in [&a, &b, &c] {
        write(path, "same content");
    }
    let a_before = FileIdentity::query(&a).unwrap();

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.pairs_found, 2);
    assert_eq!(FileIdentity::query(&a).unwrap().key, a_before.key);
    assert!(same_inode(&a, &b));
    assert!(same_inode(&a, &c));
}

#[test]
#[cfg(unix)]
fn test_flat_walk_ignores_subdirectories() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let top = dir.path().join("a.txt");
    let nested = dir.path().join("sub").join("b.txt");
    write(&top, "hello");
    write(&nested, "hello");

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.files_scanned, 1);
    assert!(!same_inode(&top, &nested));

    let recursive = DedupeConfig {
        recurse: true,
        ..Default::default()
    };
    let summary = Deduplicator::new(recursive)
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.pairs_found, 1);
    assert!(same_inode(&top, &nested));
}

#[test]
#[cfg(unix)]
fn test_multiple_roots_in_order() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let keep = second.path().join("z.txt");
    let replace = first.path().join("a.txt");
    write(&keep, "shared content");
    write(&replace, "shared content");
    let keep_before = FileIdentity::query(&keep).unwrap();

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[second.path().to_path_buf(), first.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.pairs_found, 1);
    assert_eq!(FileIdentity::query(&keep).unwrap().key, keep_before.key);
    assert!(same_inode(&keep, &replace));
}

#[test]
fn test_exclude_patterns() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.bak"), "hello");

    let config = DedupeConfig {
        exclude: vec!["*.bak".to_string()],
        ..Default::default()
    };
    let summary = Deduplicator::new(config)
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 1);
    assert_eq!(summary.pairs_found, 0);
}

#[test]
#[cfg(unix)]
fn test_second_run_is_idempotent() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");
    write(&dir.path().join("nested").join("c.txt"), "hello");
    write(&dir.path().join("d.txt"), "other content");

    let config = DedupeConfig {
        recurse: true,
        ..Default::default()
    };
    let first = Deduplicator::new(config.clone())
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(first.pairs_found, 2);

    let second = Deduplicator::new(config)
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(second.pairs_found, 0);
    assert_eq!(second.same_inode, 2);
    assert_eq!(second.files_hashed, 0);
}

#[test]
#[cfg(unix)]
fn test_preexisting_hardlink_is_not_paired() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("a.txt");
    write(&original, "hello");
    fs::hard_link(&original, dir.path().join("b.txt")).unwrap();

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.pairs_found, 0);
    assert_eq!(summary.same_inode, 1);
    assert_eq!(summary.files_hashed, 0);
}

#[test]
#[cfg(unix)]
fn test_lookalike_temp_name_is_deduplicated() {
    let dir = tempdir().unwrap();
    let lookalike = dir.path().join(format!(".{}.dedupe-tmp", "0".repeat(64)));
    let copy = dir.path().join("copy.txt");
    write(&lookalike, "user data");
    write(&copy, "user data");

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.pairs_found, 1);
    assert!(same_inode(&lookalike, &copy));
}
