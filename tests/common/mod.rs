//! Shared helpers for the npm-manipulator integration tests.
//!
//! Each test builds a throwaway npm package in a temporary directory and
//! drives the binary against it.

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[allow(unused)]
pub const PACKAGE_JSON: &str = r#"{
  "name": "manipulator",
  "version": "1.0.0",
  "description": "test package",
  "dependencies": {
    "lodash": "4.17.20",
    "left-pad": "1.3.0"
  },
  "devDependencies": {
    "jest": "28.1.0"
  }
}
"#;

#[allow(unused)]
pub const PACKAGE_LOCK_JSON: &str = r#"{
  "name": "manipulator",
  "version": "1.0.0",
  "lockfileVersion": 3,
  "requires": true,
  "packages": {
    "": {
      "name": "manipulator",
      "version": "1.0.0"
    }
  }
}
"#;

/// Package directory with `package.json` and `package-lock.json`.
#[allow(unused)]
pub fn create_package() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("package.json"), PACKAGE_JSON).unwrap();
    fs::write(temp.path().join("package-lock.json"), PACKAGE_LOCK_JSON).unwrap();
    temp
}

#[allow(unused)]
pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Runs the binary on `dir` with the given properties and extra arguments.
#[allow(unused)]
pub fn run_manipulator(dir: &Path, props: &[&str], extra_args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("npm-manipulator");
    cmd.arg("--file").arg(dir);
    for prop in props {
        cmd.arg(format!("-D{}", prop));
    }
    cmd.args(extra_args).env_remove("RUST_LOG").current_dir(dir);

    cmd.assert()
}
