mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{PACKAGE_JSON, create_package, read_json, run_manipulator};
use predicates::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

/// Answers a single HTTP request with `status` and `body`, returning the
/// raw request once served.
fn lookup_service(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&request).to_string()
    });
    (url, handle)
}

#[test]
fn test_missing_path_exits_with_manipulation_code() {
    let temp = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("npm-manipulator");
    cmd.arg("--file")
        .arg(temp.path().join("nope"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("cannot be found"));
}

#[test]
fn test_unknown_project_type_is_usage_error() {
    let temp = create_package();
    run_manipulator(temp.path(), &[], &["--type", "maven"]).code(2);
}

#[test]
fn test_malformed_manifest_exits_with_manipulation_code() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("package.json"), "{ not json").unwrap();

    run_manipulator(temp.path(), &["versionOverride=1.0.0"], &[])
        .code(10)
        .stderr(predicate::str::contains("package.json"));
}

#[test]
fn test_unknown_strategy_degrades() {
    let temp = create_package();

    run_manipulator(
        temp.path(),
        &["versioningStrategy=CALVER", "versionIncrementalSuffix=redhat"],
        &[],
    )
    .success()
    .stderr(predicate::str::contains("Unknown versioning strategy"));

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
}

#[test]
fn test_lookup_versions_feed_generation() {
    let temp = create_package();
    let (url, server) = lookup_service(
        "200 OK",
        r#"[{"name": "manipulator", "version": "1.0.0", "availableVersions": ["1.0.0-redhat-00001", "1.0.0-redhat-00007"]}]"#,
    );

    let rest_url = format!("restURL={}", url);
    run_manipulator(
        temp.path(),
        &[
            rest_url.as_str(),
            "restMode=SERVICE",
            "versioningStrategy=HYPHENED",
            "versionIncrementalSuffix=redhat",
            "versionIncrementalSuffixPadding=5",
        ],
        &["--log-context", "build-42"],
    )
    .success()
    .stderr(predicate::str::contains("[build-42]"));

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /v-1/reports/lookup/npm"));
    assert!(request.to_ascii_lowercase().contains("log-context: build-42"));
    assert!(request.contains(r#"{"name":"manipulator","version":"1.0.0"}"#));

    assert_eq!(
        read_json(&temp.path().join("package.json"))["version"],
        "1.0.0-redhat-00008"
    );
}

#[test]
fn test_lookup_failure_aborts_before_commit() {
    let temp = create_package();
    let (url, server) = lookup_service("503 Service Unavailable", "<html><body>down</body></html>");

    let rest_url = format!("restURL={}", url);
    run_manipulator(
        temp.path(),
        &[
            rest_url.as_str(),
            "repositoryGroup=npm-all",
            "packageScope=jboss",
            "versioningStrategy=SEMVER",
        ],
        &[],
    )
    .code(10)
    .stderr(predicate::str::contains("503").and(predicate::str::contains("down")));
    server.join().unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
}

#[test]
fn test_log_file() {
    let temp = create_package();
    let log = temp.path().join("run.log");

    run_manipulator(
        temp.path(),
        &["versionOverride=2.0.0"],
        &["--debug", "--log", log.to_str().unwrap()],
    )
    .success();

    // Inside a container the log file is skipped on purpose.
    if log.exists() {
        let content = fs::read_to_string(&log).unwrap();
        assert!(content.contains("Updating package version: 1.0.0 -> 2.0.0"));
    }
}

#[cfg(unix)]
#[test]
fn test_failing_pre_script_aborts() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_package();
    let script = temp.path().join("pre.sh");
    fs::write(&script, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let pre_script = format!("preScript={}", script.display());
    run_manipulator(
        temp.path(),
        &[pre_script.as_str(), "versionOverride=2.0.0"],
        &[],
    )
    .code(10)
    .stderr(predicate::str::contains("Script failed"));

    assert_eq!(
        fs::read_to_string(temp.path().join("package.json")).unwrap(),
        PACKAGE_JSON
    );
}

#[cfg(unix)]
#[test]
fn test_pre_script_edits_are_manipulated() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_package();
    let script = temp.path().join("bump.sh");
    fs::write(
        &script,
        "#!/bin/sh\nsed 's/\"version\": \"1.0.0\"/\"version\": \"5.0.0\"/' package.json > bumped\nmv bumped package.json\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let pre_script = format!("preScript={}", script.display());
    run_manipulator(
        temp.path(),
        &[pre_script.as_str(), "versionSuffixOverride=x"],
        &[],
    )
    .success();

    assert_eq!(
        read_json(&temp.path().join("package.json"))["version"],
        "5.0.0-x"
    );
}
