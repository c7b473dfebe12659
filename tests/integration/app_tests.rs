use clap::Parser;
use dedupe::cli::Cli;
use dedupe::config::{ConfigError, ENV_PREFIX};
use dedupe::dedupe::{DedupeConfig, DedupeError, Deduplicator};
use dedupe::error::ExitCode;
use dedupe::scanner::FileIdentity;
use figment::Jail;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    File::create(path)
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
}

/// Path, size and inode of every entry under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, (u64, u64)> {
    let mut entries = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let metadata = fs::symlink_metadata(&path).unwrap();
            if metadata.is_dir() {
                stack.push(path.clone());
            }
            let inode = FileIdentity::from_metadata(path.clone(), &metadata)
                .map_or(0, |identity| identity.inode());
            entries.insert(path, (metadata.len(), inode));
        }
    }
    entries
}

fn populate(root: &Path) {
    fs::create_dir(root.join("nested")).unwrap();
    write(&root.join("a.txt"), "alpha content");
    write(&root.join("b.txt"), "alpha content");
    write(&root.join("c.txt"), "gamma content");
    write(&root.join("nested").join("d.txt"), "alpha content");
    write(&root.join("nested").join("e.txt"), "gamma content");
    write(&root.join("nested").join("f.txt"), "unique");
}

/// Run the app with `config` as its configuration file and no `DEDUPE_*`
/// variables, holding the jail lock so config tests cannot interleave.
fn run_with_config(config: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut result = None;
    Jail::expect_with(|jail| {
        let stale: Vec<_> = std::env::vars_os()
            .filter(|(key, _)| key.to_string_lossy().starts_with(ENV_PREFIX))
            .map(|(key, _)| key)
            .collect();
        for key in stale {
            std::env::remove_var(key);
        }
        jail.create_file("config.toml", config)?;
        let config_path = jail.directory().join("config.toml");

        let mut argv = vec![
            "dedupe",
            "--quiet",
            "--config",
            config_path.to_str().unwrap(),
        ];
        argv.extend_from_slice(args);
        result = Some(dedupe::run_app(Cli::try_parse_from(argv).unwrap()));
        Ok(())
    });
    result.unwrap()
}

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    run_with_config("", args)
}

#[test]
fn test_no_directories_is_usage_error() {
    let cli = Cli::try_parse_from(["dedupe"]).unwrap();
    assert_eq!(dedupe::run_app(cli).unwrap(), ExitCode::Usage);
}

#[test]
fn test_missing_directory_is_usage_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");

    let err = run(&[missing.to_str().unwrap()]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DedupeError>(),
        Some(DedupeError::RootNotFound { .. })
    ));
}

#[test]
fn test_invalid_config_stops_before_scanning() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let before = snapshot(dir.path());

    let err = run_with_config(
        "min_size = 1048576\nsymlink = \"alway\"\n",
        &["-r", dir.path().to_str().unwrap()],
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Invalid(_))
    ));
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let cli = Cli::try_parse_from([
        "dedupe",
        "--quiet",
        "--config",
        missing.to_str().unwrap(),
        dir.path().to_str().unwrap(),
    ])
    .unwrap();

    let err = dedupe::run_app(cli).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotFound(_))
    ));
}

#[test]
#[cfg(unix)]
fn test_config_file_settings_apply() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let code =
        run_with_config("min_size = 1048576\n", &["-r", dir.path().to_str().unwrap()]).unwrap();

    assert_eq!(code, ExitCode::Success);
    let a = FileIdentity::query(&dir.path().join("a.txt")).unwrap();
    let b = FileIdentity::query(&dir.path().join("b.txt")).unwrap();
    assert!(!a.same_file(&b));
}

#[test]
#[cfg(unix)]
fn test_run_app_links_duplicates() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let code = run(&["-r", dir.path().to_str().unwrap()]).unwrap();

    assert_eq!(code, ExitCode::Success);
    let a = FileIdentity::query(&dir.path().join("a.txt")).unwrap();
    let d = FileIdentity::query(&dir.path().join("nested").join("d.txt")).unwrap();
    assert!(a.same_file(&d));
}

#[test]
#[cfg(unix)]
fn test_dry_run_parity() {
    let dry = tempdir().unwrap();
    let real = tempdir().unwrap();
    populate(dry.path());
    populate(real.path());
    let before = snapshot(dry.path());

    let config = DedupeConfig {
        recurse: true,
        ..Default::default()
    };
    let dry_summary = Deduplicator::new(DedupeConfig {
        dry_run: true,
        ..config.clone()
    })
    .run(&[dry.path().to_path_buf()])
    .unwrap();
    let real_summary = Deduplicator::new(config)
        .run(&[real.path().to_path_buf()])
        .unwrap();

    assert_eq!(snapshot(dry.path()), before);
    assert_eq!(dry_summary.pairs_found, 3);
    assert_eq!(dry_summary.pairs_found, real_summary.pairs_found);
    assert_eq!(dry_summary.hard_linked, real_summary.hard_linked);
    assert_eq!(dry_summary.bytes_reclaimed, real_summary.bytes_reclaimed);
    assert!(dry_summary.dry_run);
    assert!(!real_summary.dry_run);
}

#[test]
#[cfg(unix)]
fn test_link_failure_gives_partial_exit_code() {
    use dedupe::actions::temp_link_path;
    use dedupe::scanner::Hasher;

    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write(&a, "hello");
    write(&b, "hello");
    let digest = Hasher::default().digest(&a).unwrap();
    write(&temp_link_path(&b, &digest), "hello");

    let code = run(&[dir.path().to_str().unwrap()]).unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
    assert_eq!(fs::read_to_string(&b).unwrap(), "hello");
}
