mod common;

use common::{PACKAGE_JSON, PACKAGE_LOCK_JSON, create_package, read_json, run_manipulator};
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn test_scope_rewrites_package_and_lock() {
    let temp = create_package();

    run_manipulator(temp.path(), &["packageScope=jboss"], &[]).success();

    let package = read_json(&temp.path().join("package.json"));
    assert_eq!(package["name"], "@jboss/manipulator");
    assert_eq!(package["version"], "1.0.0");

    let lock = read_json(&temp.path().join("package-lock.json"));
    assert_eq!(lock["name"], "@jboss/manipulator");
    assert_eq!(lock["packages"][""]["name"], "@jboss/manipulator");
}

#[test]
fn test_formatting_and_key_order_preserved() {
    let temp = create_package();

    run_manipulator(temp.path(), &["versionOverride=2.0.0"], &[]).success();

    let written = fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert_eq!(written, PACKAGE_JSON.replace("\"1.0.0\"", "\"2.0.0\""));
    let lock = fs::read_to_string(temp.path().join("package-lock.json")).unwrap();
    assert_eq!(lock, PACKAGE_LOCK_JSON.replace("\"1.0.0\"", "\"2.0.0\""));
}

#[test]
fn test_override_wins_over_strategy() {
    let temp = create_package();

    run_manipulator(
        temp.path(),
        &[
            "versionOverride=3.1.4",
            "versionSuffixOverride=foo",
            "versioningStrategy=SEMVER",
            "versionIncrementalSuffix=redhat",
        ],
        &[],
    )
    .success();

    assert_eq!(read_json(&temp.path().join("package.json"))["version"], "3.1.4");
}

#[test]
fn test_suffix_override() {
    let temp = create_package();

    run_manipulator(temp.path(), &["versionSuffixOverride=redhat-00001"], &[]).success();

    assert_eq!(
        read_json(&temp.path().join("package.json"))["version"],
        "1.0.0-redhat-00001"
    );
}

#[test]
fn test_hyphened_without_lookup() {
    let temp = create_package();

    run_manipulator(
        temp.path(),
        &[
            "versioningStrategy=HYPHENED",
            "versionIncrementalSuffix=redhat",
            "versionIncrementalSuffixPadding=5",
        ],
        &[],
    )
    .success();

    assert_eq!(
        read_json(&temp.path().join("package.json"))["version"],
        "1.0.0-redhat-00001"
    );
}

#[test]
fn test_semver_without_lookup() {
    let temp = create_package();

    run_manipulator(
        temp.path(),
        &["versioningStrategy=SEMVER", "versionIncrementalSuffix=redhat"],
        &[],
    )
    .success();

    assert_eq!(
        read_json(&temp.path().join("package.json"))["version"],
        "1.0.0-redhat.1"
    );
}

#[test]
fn test_dependency_overrides() {
    let temp = create_package();
    let result = temp.path().join("result.json");

    run_manipulator(
        temp.path(),
        &[
            "dependencyOverride.lodash=4.17.21",
            "dependencyOverride.react=18.0.0",
            "devDependencyOverride.jest=29.0.0",
        ],
        &["--result", result.to_str().unwrap()],
    )
    .success();

    let package = read_json(&temp.path().join("package.json"));
    assert_eq!(package["dependencies"]["lodash"], "4.17.21");
    assert_eq!(package["dependencies"]["left-pad"], "1.3.0");
    assert!(package["dependencies"].get("react").is_none());
    assert_eq!(package["devDependencies"]["jest"], "29.0.0");

    assert_eq!(
        read_json(&result),
        serde_json::json!({
            "name": "manipulator",
            "version": "1.0.0",
            "dependenciesMap": { "lodash": "4.17.21" },
            "devDependenciesMap": { "jest": "29.0.0" }
        })
    );
}

#[test]
fn test_absent_dependency_override_changes_nothing() {
    let temp = create_package();

    run_manipulator(temp.path(), &["dependencyOverride.react=18.0.0"], &[])
        .success()
        .stderr(predicate::str::contains("No changes."));

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
}

#[test]
fn test_dry_run_writes_no_manifest() {
    let temp = create_package();
    let result = temp.path().join("result.json");

    run_manipulator(
        temp.path(),
        &["packageScope=jboss", "versionOverride=2.0.0"],
        &["--dry-run", "--result", result.to_str().unwrap()],
    )
    .success()
    .stdout(predicate::str::contains("DRY RUN"));

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("package-lock.json")).unwrap(),
        PACKAGE_LOCK_JSON
    );
    let summary = read_json(&result);
    assert_eq!(summary["name"], "@jboss/manipulator");
    assert_eq!(summary["version"], "2.0.0");
}

#[test]
fn test_disable_switch_still_writes_result() {
    let temp = create_package();
    let result = temp.path().join("result.json");

    run_manipulator(
        temp.path(),
        &["packageScope=jboss", "manipulation.disable"],
        &["-r", result.to_str().unwrap()],
    )
    .success();

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
    let summary = read_json(&result);
    assert_eq!(summary["name"], "manipulator");
    assert_eq!(summary["version"], "1.0.0");
}

#[test]
fn test_lock_file_as_file_argument() {
    let temp = create_package();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("npm-manipulator");
    cmd.arg("-f")
        .arg(temp.path().join("package-lock.json"))
        .arg("-DversionOverride=5.0.0")
        .assert()
        .success();

    assert_eq!(read_json(&temp.path().join("package.json"))["version"], "5.0.0");
    assert_eq!(read_json(&temp.path().join("package-lock.json"))["version"], "5.0.0");
}
