//! Pre- and post-manipulation scripts.
//!
//! `preScript` and `postScript` hold comma-separated script locations. Local
//! paths and `file:` URLs are executed in place; `http(s)` URLs are
//! downloaded to a temporary executable first. Scripts run without arguments
//! in the project directory.

use crate::config::{POST_SCRIPT, PRE_SCRIPT, UserProps};
use crate::error::{ManipulationError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempPath};

/// A script ready to execute.
enum Script {
    Local(PathBuf),
    /// Deleted when dropped.
    Downloaded(TempPath),
}

impl Script {
    fn path(&self) -> &Path {
        match self {
            Script::Local(path) => path,
            Script::Downloaded(path) => path,
        }
    }
}

fn resolve(location: &str) -> Result<Script> {
    if let Some(path) = location.strip_prefix("file://") {
        return Ok(Script::Local(PathBuf::from(path)));
    }
    if let Some(path) = location.strip_prefix("file:") {
        return Ok(Script::Local(PathBuf::from(path)));
    }
    if location.starts_with("http://") || location.starts_with("https://") {
        return download(location).map(Script::Downloaded);
    }
    Ok(Script::Local(PathBuf::from(location)))
}

fn download(url: &str) -> Result<TempPath> {
    log::debug!("Downloading script {}", url);
    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(ManipulationError::Script(format!(
            "downloading {} failed with status {}",
            url,
            response.status()
        )));
    }
    let content = response.bytes()?;

    let mut file = NamedTempFile::new()?;
    file.write_all(&content)?;
    file.flush()?;
    make_executable(file.path())?;
    Ok(file.into_temp_path())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn execute(script: &Script, dir: &Path) -> Result<()> {
    let path = script.path();
    log::info!("Executing script {}", path.display());

    let output = Command::new(path)
        .current_dir(dir)
        .output()
        .map_err(|e| ManipulationError::Script(format!("failed to execute {}: {}", path.display(), e)))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        log::info!("{}", line);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        log::error!("{}", line);
    }

    if !output.status.success() {
        return Err(ManipulationError::Script(format!(
            "{} exited with code {}",
            path.display(),
            output.status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

/// Runs every script listed under `key`, stopping at the first failure.
pub fn run_scripts(props: &UserProps, key: &str, dir: &Path) -> Result<()> {
    let Some(locations) = props.get_set(key) else {
        return Ok(());
    };
    for location in locations.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        let script = resolve(location)?;
        execute(&script, dir)?;
    }
    Ok(())
}

pub fn run_pre_scripts(props: &UserProps, dir: &Path) -> Result<()> {
    run_scripts(props, PRE_SCRIPT, dir)
}

pub fn run_post_scripts(props: &UserProps, dir: &Path) -> Result<()> {
    run_scripts(props, POST_SCRIPT, dir)
}
