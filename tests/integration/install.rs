//! Tests for `splitpack install`

use super::common::{resource_package, Split, TestEnv};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_install_downloaded_package() {
    let env = TestEnv::new();
    let bytes = resource_package("feature");
    env.write_manifest(&[Split::new("feature", "1", &bytes).yaml()]);
    env.download("feature", "1", &bytes);

    env.run("install", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ feature 1"));

    assert!(env.is_installed("feature", "1"));
}

#[test]
fn test_reinstall_is_noop() {
    let env = TestEnv::new();
    let bytes = resource_package("feature");
    env.write_manifest(&[Split::new("feature", "1", &bytes).yaml()]);
    env.download("feature", "1", &bytes);

    env.run("install", &[]).assert().success();
    env.run("install", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("already installed"));
}

#[test]
fn test_corrupted_package_fails() {
    let env = TestEnv::new();
    let bytes = resource_package("feature");
    env.write_manifest(&[Split::new("feature", "1", &bytes).yaml()]);
    env.download("feature", "1", &resource_package("tampered"));

    env.run("install", &[])
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗ feature 1"))
        .stderr(predicate::str::contains("1 of 1 package(s) failed to install"));

    assert!(!env.is_installed("feature", "1"));
    assert!(!env.version_dir("feature", "1").exists());
}

#[test]
fn test_one_failure_does_not_stop_others() {
    let env = TestEnv::new();
    let good = resource_package("good");
    let missing = resource_package("missing");
    env.write_manifest(&[
        Split::new("missing", "1", &missing).yaml(),
        Split::new("good", "1", &good).yaml(),
    ]);
    env.download("good", "1", &good);

    env.run("install", &[])
        .assert()
        .failure()
        .stdout(predicate::str::contains("✓ good 1"))
        .stdout(predicate::str::contains("✗ missing 1"));

    assert!(env.is_installed("good", "1"));
}

#[test]
fn test_built_in_package_restored_from_bundle() {
    let env = TestEnv::new();
    let bytes = resource_package("builtin");
    let mut split = Split::new("builtin", "1", &bytes);
    split.built_in = true;
    env.write_manifest(&[split.yaml()]);
    env.bundle_package("builtin", &bytes);

    env.run("install", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored from bundle"));

    assert!(env.is_installed("builtin", "1"));
    let restored = env.version_dir("builtin", "1").join("builtin-master.pkg");
    assert_eq!(fs::read(restored).unwrap(), bytes);
}

#[test]
fn test_install_selected_names_only() {
    let env = TestEnv::new();
    let a = resource_package("a");
    let b = resource_package("b");
    env.write_manifest(&[Split::new("a", "1", &a).yaml(), Split::new("b", "1", &b).yaml()]);
    env.download("a", "1", &a);

    env.run("install", &["a"]).assert().success();
    assert!(env.is_installed("a", "1"));
    assert!(!env.is_installed("b", "1"));
}

#[test]
fn test_install_unknown_name() {
    let env = TestEnv::new();
    let a = resource_package("a");
    env.write_manifest(&[Split::new("a", "1", &a).yaml()]);

    env.run("install", &["ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not declared"));
}

#[test]
fn test_install_missing_manifest() {
    let env = TestEnv::new();
    env.run("install", &[])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read manifest"));
}
