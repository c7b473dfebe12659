use dedupe::actions::link::{replace_with_link, temp_link_path, LinkError, LinkMode};
use dedupe::dedupe::{DedupeConfig, Deduplicator};
use dedupe::scanner::{FileIdentity, Hasher};
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

#[test]
#[cfg(unix)]
fn test_orphaned_temp_link_keeps_duplicate() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write(&a, "hello");
    write(&b, "hello");

    // Simulate a run killed between link creation and rename.
    let digest = Hasher::default().digest(&a).unwrap();
    let orphan = temp_link_path(&b, &digest);
    fs::hard_link(&a, &orphan).unwrap();

    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    // The orphan is not scanned, and it blocks the new temp link.
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.pairs_found, 1);
    assert_eq!(summary.link_failures, 1);
    assert!(summary.has_failures());
    assert_eq!(fs::read_to_string(&b).unwrap(), "hello");
    assert!(!FileIdentity::query(&a)
        .unwrap()
        .same_file(&FileIdentity::query(&b).unwrap()));

    // Once the orphan is removed, the next run finishes the job.
    fs::remove_file(&orphan).unwrap();
    let summary = Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.hard_linked, 1);
    assert!(!summary.has_failures());
}

#[test]
#[cfg(unix)]
fn test_hard_link_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), "hello");
    write(&dir.path().join("b.txt"), "hello");

    Deduplicator::new(DedupeConfig::default())
        .run(&[dir.path().to_path_buf()])
        .unwrap();

    let mut names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[test]
#[cfg(unix)]
fn test_symlink_target_is_relative() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a_keep")).unwrap();
    fs::create_dir_all(dir.path().join("b_copies").join("deep")).unwrap();
    let original = dir.path().join("a_keep").join("data.bin");
    let duplicate = dir.path().join("b_copies").join("deep").join("data.bin");
    write(&original, "payload");
    write(&duplicate, "payload");

    let digest = Hasher::default().digest(&original).unwrap();
    replace_with_link(&original, &duplicate, &digest, LinkMode::SymLink).unwrap();

    assert_eq!(
        fs::read_link(&duplicate).unwrap(),
        Path::new("../../a_keep/data.bin")
    );

    // The tree stays valid when moved as a unit.
    let moved = tempdir().unwrap();
    let new_root = moved.path().join("tree");
    fs::rename(dir.path(), &new_root).unwrap();
    assert_eq!(
        fs::read_to_string(new_root.join("b_copies").join("deep").join("data.bin")).unwrap(),
        "payload"
    );
}

#[test]
#[cfg(unix)]
fn test_symlink_with_relative_input_paths() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("x")).unwrap();
    fs::create_dir(dir.path().join("y")).unwrap();
    let original = dir.path().join("x").join("..").join("x").join("f.txt");
    let duplicate = dir.path().join("y").join("f.txt");
    write(&original, "payload");
    write(&duplicate, "payload");

    let digest = Hasher::default().digest(&original).unwrap();
    replace_with_link(&original, &duplicate, &digest, LinkMode::SymLink).unwrap();

    assert_eq!(fs::read_link(&duplicate).unwrap(), Path::new("../x/f.txt"));
}

#[test]
fn test_link_error_reports_paths() {
    let dir = tempdir().unwrap();
    let duplicate = dir.path().join("b.txt");
    write(&duplicate, "hello");
    let digest = Hasher::default().digest(&duplicate).unwrap();

    let err = replace_with_link(
        &dir.path().join("missing.txt"),
        &duplicate,
        &digest,
        LinkMode::HardLink,
    )
    .unwrap_err();

    let LinkError::CreateFailed { original, temp, .. } = &err else {
        panic!("expected CreateFailed, got {err:?}");
    };
    assert_eq!(original, &dir.path().join("missing.txt"));
    assert_eq!(temp, &temp_link_path(&duplicate, &digest));
    assert!(err.to_string().contains("missing.txt"));
    assert!(!temp.exists());
}

#[test]
#[cfg(unix)]
fn test_changed_duplicate_is_skipped() {
    use dedupe::duplicates::{DuplicateIndex, IndexConfig, Observation};

    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write(&a, "hello");
    write(&b, "hello");

    let mut index = DuplicateIndex::new(Hasher::default(), IndexConfig::default());
    index.observe(FileIdentity::query(&a).unwrap()).unwrap();
    let Observation::Duplicate(pair) = index.observe(FileIdentity::query(&b).unwrap()).unwrap()
    else {
        panic!("expected a duplicate pair");
    };

    // b is rewritten between scan and link.
    write(&b, "hello, world");

    assert!(matches!(
        dedupe::actions::verify_unchanged(&pair.duplicate),
        Err(LinkError::Changed(_))
    ));
    assert!(dedupe::actions::verify_unchanged(&pair.original).is_ok());
}
