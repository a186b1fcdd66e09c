//! Tests for `splitpack hash`

use super::common::{blake3_of, TestEnv};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_hash_uses_configured_algorithm() {
    let env = TestEnv::new();
    let file = env.temp.path().join("feature-master.pkg");
    fs::write(&file, b"package bytes").unwrap();

    env.splitpack()
        .arg("hash")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(blake3_of(b"package bytes")))
        .stdout(predicate::str::contains("  13  "));
}

#[test]
fn test_hash_with_sha256() {
    let env = TestEnv::new();
    let file = env.temp.path().join("feature-master.pkg");
    fs::write(&file, b"package bytes").unwrap();

    env.splitpack()
        .args(["hash", "--algorithm", "sha256"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sha256:"));
}

#[test]
fn test_hash_unknown_algorithm() {
    let env = TestEnv::new();
    let file = env.temp.path().join("f.pkg");
    fs::write(&file, b"x").unwrap();

    env.splitpack()
        .args(["hash", "--algorithm", "md5"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown checksum algorithm"));
}

#[test]
fn test_hash_missing_file() {
    let env = TestEnv::new();
    env.splitpack()
        .arg("hash")
        .arg(env.temp.path().join("absent.pkg"))
        .assert()
        .failure();
}
