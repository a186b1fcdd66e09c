//! Tests for `splitpack plan`

use super::common::{resource_package, Split, TestEnv};
use predicates::prelude::*;

fn planned_names(env: &TestEnv, args: &[&str]) -> Vec<String> {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = env.run("plan", &full).output().unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_dependency_installed_later() {
    let env = TestEnv::new();
    let assets = resource_package("feature-a-assets");
    let feature = resource_package("feature-a");
    let mut feature_split = Split::new("feature-a", "2", &feature);
    feature_split.dependencies = &["feature-a-assets"];
    env.write_manifest(&[
        feature_split.yaml(),
        Split::new("feature-a-assets", "1", &assets).yaml(),
    ]);

    env.download("feature-a", "2", &feature);
    env.run("install", &["feature-a"]).assert().success();

    assert!(planned_names(&env, &[]).is_empty());
    env.run("plan", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "feature-a: dependency 'feature-a-assets' is not installed",
        ));

    env.download("feature-a-assets", "1", &assets);
    env.run("install", &["feature-a-assets"]).assert().success();

    assert_eq!(planned_names(&env, &[]), vec!["feature-a-assets", "feature-a"]);
}

#[test]
fn test_process_affinity() {
    let env = TestEnv::new();
    let worker = resource_package("worker-feature");
    let mut split = Split::new("worker-feature", "1", &worker);
    split.processes = &[":worker"];
    env.write_manifest(&[split.yaml()]);
    env.download("worker-feature", "1", &worker);
    env.run("install", &[]).assert().success();

    assert!(planned_names(&env, &[]).is_empty());
    assert_eq!(
        planned_names(&env, &["--process", ":worker"]),
        vec!["worker-feature"]
    );
}

#[test]
fn test_already_loaded_packages_are_skipped() {
    let env = TestEnv::new();
    let base = resource_package("base");
    let feature = resource_package("feature");
    let mut feature_split = Split::new("feature", "1", &feature);
    feature_split.dependencies = &["base"];
    env.write_manifest(&[Split::new("base", "1", &base).yaml(), feature_split.yaml()]);
    env.download("base", "1", &base);
    env.download("feature", "1", &feature);
    env.run("install", &[]).assert().success();

    assert_eq!(planned_names(&env, &["--loaded", "base"]), vec!["feature"]);
}

#[test]
fn test_plan_text_output() {
    let env = TestEnv::new();
    let bytes = resource_package("feature");
    env.write_manifest(&[Split::new("feature", "1", &bytes).yaml()]);
    env.download("feature", "1", &bytes);
    env.run("install", &[]).assert().success();

    env.run("plan", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains("Activation plan for com.example.app"))
        .stdout(predicate::str::contains("1. feature 1"));
}
