//! Building from disk, the database cache and the swappable handle.

mod common;

use std::fs;
use std::path::Path;

use phpantom_stubs::config::CONFIG_FILE_NAME;
use phpantom_stubs::database::cache;
use phpantom_stubs::{
    CallSite, DiagnosticKind, Error, PhpVersion, ResolverConfig, ResolverHandle, StubBundle,
    StubResolver,
};

fn write_stubs(root: &Path) {
    let stubs = root.join("stubs");
    fs::create_dir_all(stubs.join("standard")).unwrap();
    fs::write(
        stubs.join("standard/strings.php"),
        "<?php\n/** @return non-empty-string */\nfunction str_repeat_ish(string $s, int $n) {}\n",
    )
    .unwrap();
    fs::write(
        stubs.join("Core.php"),
        "<?php\ninterface Countable { public function count(): int; }\n",
    )
    .unwrap();
    fs::write(stubs.join("README.md"), "not a stub").unwrap();
}

#[test]
fn discovered_config_builds_the_bundle_from_disk() {
    let root = tempfile::tempdir().unwrap();
    let cache_dir = root.path().join("cache");
    write_stubs(root.path());
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        format!(
            "[bundle]\nname = \"core\"\nversion = \"2024.3\"\nphp_version = \"8.2\"\n\n[cache]\ndir = '{}'\n",
            cache_dir.display()
        ),
    )
    .unwrap();

    let config = ResolverConfig::discover(root.path()).unwrap();
    assert_eq!(config.bundle.name, "core");
    assert_eq!(config.bundle.php_version, PhpVersion::new(8, 2));

    let resolver = StubResolver::build(&config, root.path()).unwrap();
    let db = resolver.database();
    assert_eq!(db.bundle().name, "core");
    assert!(db.lookup_class("Countable").is_some());
    assert_eq!(
        resolver
            .resolve_call("str_repeat_ish", &CallSite::new())
            .unwrap()
            .to_string(),
        "non-empty-string"
    );

    // Files are joined in sorted path order.
    let files: Vec<&str> = db
        .functions()
        .iter()
        .map(|s| s.location.file.as_str())
        .collect();
    assert_eq!(files, ["stubs/standard/strings.php"]);

    assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 1);
}

#[test]
fn missing_stub_directory_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let config = ResolverConfig::discover(root.path()).unwrap();
    assert_eq!(config, ResolverConfig::default());
    let err = StubResolver::build(&config, root.path()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
}

#[test]
fn a_file_that_is_not_utf8_degrades_alone() {
    let root = tempfile::tempdir().unwrap();
    let stubs = root.path().join("stubs");
    fs::create_dir_all(&stubs).unwrap();
    fs::write(stubs.join("a.php"), "<?php\nfunction from_a(): int {}\n").unwrap();
    fs::write(stubs.join("b.php"), b"<?php\n/** caf\xFF */\nfunction from_b(): string {}\n").unwrap();

    let resolver = StubResolver::build(&common::uncached_config(), root.path()).unwrap();
    assert!(resolver.lookup_symbol("from_a").is_some());
    assert!(resolver.lookup_symbol("from_b").is_some());
    let errors: Vec<_> = resolver
        .diagnostics()
        .of_kind(DiagnosticKind::ParseError)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file.as_deref(), Some("stubs/b.php"));
}

#[test]
fn invalid_config_names_the_file() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[resolver]\nredeclaration = \"first-wins\"\n").unwrap();
    let err = ResolverConfig::load(&path).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains(CONFIG_FILE_NAME), "{err}");
}

#[test]
fn rebuilding_an_unchanged_bundle_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ResolverConfig::default();
    config.cache.dir = Some(dir.path().to_path_buf());
    let bundle = common::bundle(&[(
        "a.php",
        "<?php\n/** @template T */\nclass Box { /** @return T */ public function get() {} }\n",
    )]);

    let cold = StubResolver::from_bundle(&bundle, &config);
    let warm = StubResolver::from_bundle(&bundle, &config);
    let uncached = StubResolver::from_bundle(&bundle, &common::uncached_config());
    let bytes = cache::to_bytes(cold.database()).unwrap();
    assert_eq!(bytes, cache::to_bytes(warm.database()).unwrap());
    assert_eq!(bytes, cache::to_bytes(uncached.database()).unwrap());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    // A changed file is a different entry.
    let changed = bundle.with_source("b.php", "<?php\nfunction extra() {}\n");
    StubResolver::from_bundle(&changed, &config);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn corrupt_cache_entries_are_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ResolverConfig::default();
    config.cache.dir = Some(dir.path().to_path_buf());
    let bundle = common::bundle(&[("a.php", "<?php\nfunction f(): int {}\n")]);

    let first = StubResolver::from_bundle(&bundle, &config);
    let entry = cache::entry_path(dir.path(), &first.database().bundle().content_hash);
    fs::write(&entry, b"{\"truncated\":").unwrap();

    let rebuilt = StubResolver::from_bundle(&bundle, &config);
    assert!(rebuilt.lookup_symbol("f").is_some());
    assert!(cache::load(dir.path(), &first.database().bundle().content_hash)
        .unwrap()
        .is_some());
}

#[test]
fn handle_swaps_without_disturbing_snapshots() {
    let config = common::uncached_config();
    let v1 = StubBundle::new("core", "1", PhpVersion::default())
        .with_source("a.php", "<?php\n/** @return int */\nfunction version_ish() {}\n");
    let v2 = StubBundle::new("core", "2", PhpVersion::default())
        .with_source("a.php", "<?php\n/** @return string */\nfunction version_ish() {}\n");

    let handle = ResolverHandle::new(&StubResolver::from_bundle(&v1, &config));
    let old = handle.snapshot();
    let previous = handle.reload(&v2, &config);
    assert_eq!(previous.bundle().version, "1");

    let site = CallSite::new();
    assert_eq!(old.resolve_call("version_ish", &site).unwrap().to_string(), "int");
    let new = handle.snapshot();
    assert_eq!(new.resolve_call("version_ish", &site).unwrap().to_string(), "string");

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            std::thread::spawn(move || {
                handle
                    .snapshot()
                    .resolve_call("version_ish", &CallSite::new())
                    .map(|t| t.to_string())
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap().unwrap(), "string");
    }
}
