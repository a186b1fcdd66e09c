//! Tests for `splitpack uninstall`, `sweep`, `status` and `clean`

use super::common::{resource_package, Split, TestEnv};
use predicates::prelude::*;
use std::fs;

fn install_version(env: &TestEnv, version: &str) {
    let bytes = resource_package(&format!("feature-{}", version));
    env.write_manifest(&[Split::new("feature", version, &bytes).yaml()]);
    env.download("feature", version, &bytes);
    env.run("install", &[]).assert().success();
    std::thread::sleep(std::time::Duration::from_millis(20));
}

#[test]
fn test_uninstall_forgets_package() {
    let env = TestEnv::new();
    install_version(&env, "1");

    env.run("uninstall", &["feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Uninstalled feature"));

    assert!(!env.is_installed("feature", "1"));
    assert!(env.version_dir("feature", "1").exists());
    env.run("status", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("incomplete"));
}

#[test]
fn test_deferred_uninstall_applies_on_next_install() {
    let env = TestEnv::new();
    install_version(&env, "1");

    env.run("uninstall", &["feature", "--deferred"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled 1 package(s)"));
    assert!(env.is_installed("feature", "1"));

    env.run("install", &["feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninstalled feature (scheduled)"));
    // the scheduled uninstall runs first, then the package is installed again
    assert!(env.is_installed("feature", "1"));
}

#[test]
fn test_uninstall_rejects_bad_name() {
    let env = TestEnv::new();
    install_version(&env, "1");

    env.run("uninstall", &["../escape"]).assert().failure();
}

#[test]
fn test_upgrades_keep_current_and_one_prior() {
    let env = TestEnv::new();
    for version in ["1", "2", "3", "4"] {
        install_version(&env, version);
    }

    assert!(!env.version_dir("feature", "1").exists());
    assert!(!env.version_dir("feature", "2").exists());
    assert!(env.is_installed("feature", "3"));
    assert!(env.is_installed("feature", "4"));
}

#[test]
fn test_sweep_command() {
    let env = TestEnv::new();
    install_version(&env, "1");
    install_version(&env, "2");

    env.run("sweep", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to remove."));
}

#[test]
fn test_status_lists_packages() {
    let env = TestEnv::new();
    let a = resource_package("a");
    let b = resource_package("b");
    env.write_manifest(&[Split::new("a", "1", &a).yaml(), Split::new("b", "1", &b).yaml()]);
    env.download("a", "1", &a);
    env.run("install", &["a"]).assert().success();

    env.run("status", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed"))
        .stdout(predicate::str::contains("absent"))
        .stdout(predicate::str::contains("Archs:     arm64"));
}

#[test]
fn test_clean_removes_other_store_roots() {
    let env = TestEnv::new();
    install_version(&env, "1");
    let stale = env.app_dir().join("previous-config").join("feature").join("1");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("feature-master.pkg"), b"old").unwrap();
    let other_app = env.store_base.join("com.other.app").join("demo").join("feature").join("1");
    fs::create_dir_all(&other_app).unwrap();
    fs::write(other_app.join("feature-master.pkg"), b"theirs").unwrap();

    env.run("clean", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 stale store root(s)"));

    assert!(!env.app_dir().join("previous-config").exists());
    assert!(other_app.join("feature-master.pkg").exists());
    assert!(env.is_installed("feature", "1"));
}
