//! Per-run state: configuration, projects, shared state and result summary.
//!
//! A [`Session`] is created once per invocation. It instantiates every known
//! manipulator, keeps the ones that activate, and owns everything the
//! manipulators read and write while the run is in progress.

use crate::config::UserProps;
use crate::error::Result;
use crate::manipulator::{self, Manipulator};
use crate::project::{NpmPackage, Project};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Published versions per package name, as reported by the lookup service.
pub type AvailableVersions = BTreeMap<String, BTreeSet<String>>;

/// Values produced by one manipulator and consumed by another within a run.
///
/// Producer-before-consumer ordering is guaranteed by the manager's
/// dependency resolution, not by this store.
#[derive(Debug, Default, Clone)]
pub struct SharedState {
    /// Written by the version lookup collector; `None` when it did not run.
    pub available_versions: Option<AvailableVersions>,
}

impl SharedState {
    /// Known versions for `name`, empty when nothing was collected.
    pub fn versions_of(&self, name: &str) -> BTreeSet<String> {
        self.available_versions
            .as_ref()
            .and_then(|all| all.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Unions `versions` into the entry for `name`.
    pub fn add_versions<I>(&mut self, name: &str, versions: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.available_versions
            .get_or_insert_with(AvailableVersions::new)
            .entry(name.to_string())
            .or_default()
            .extend(versions);
    }
}

/// Summary of the applied values, written at the end of the run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManipulationResult {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies_map: BTreeMap<String, String>,
    pub dev_dependencies_map: BTreeMap<String, String>,
}

/// Mutable view handed to a manipulator while it runs.
pub struct Workspace<'a> {
    pub projects: &'a mut [Project],
    pub state: &'a mut SharedState,
    pub result: &'a mut ManipulationResult,
}

/// Run-scoped owner of configuration, projects and results.
pub struct Session {
    props: UserProps,
    target: PathBuf,
    result_file: Option<PathBuf>,
    projects: Vec<Project>,
    state: SharedState,
    result: ManipulationResult,
}

impl Session {
    /// Creates a session for the package at `path`, loading its manifests.
    pub fn new(path: &Path, result_file: Option<PathBuf>, props: UserProps) -> Result<Self> {
        let package = NpmPackage::locate(path)?;
        let mut session = Self::with_projects(vec![package.into()], props);
        session.result_file = result_file;
        Ok(session)
    }

    /// Creates a session over already loaded projects.
    ///
    /// The result summary starts from the first project's name and version.
    pub fn with_projects(projects: Vec<Project>, props: UserProps) -> Self {
        let mut result = ManipulationResult::default();
        if let Some(Project::Npm(pkg)) = projects.first() {
            result.name = pkg.name().ok().map(str::to_string);
            result.version = pkg.version().ok().map(str::to_string);
        }

        let target = projects
            .first()
            .map(|p| match p {
                Project::Npm(pkg) => pkg.dir().to_path_buf(),
            })
            .unwrap_or_default();

        Self {
            props,
            target,
            result_file: None,
            projects,
            state: SharedState::default(),
            result,
        }
    }

    pub fn props(&self) -> &UserProps {
        &self.props
    }

    /// Directory of the first project.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SharedState {
        &mut self.state
    }

    pub fn result(&self) -> &ManipulationResult {
        &self.result
    }

    /// Instantiates every known manipulator and keeps the ones that activate.
    pub fn active_manipulators(&self) -> Result<Vec<Box<dyn Manipulator>>> {
        let mut active = Vec::new();
        for mut candidate in manipulator::all() {
            if candidate.activate(self)? {
                log::debug!("Manipulator '{}' is active", candidate.kind());
                active.push(candidate);
            } else {
                log::trace!("Manipulator '{}' is inactive", candidate.kind());
            }
        }
        Ok(active)
    }

    /// Splits the session into the view manipulators work on.
    pub fn workspace(&mut self) -> Workspace<'_> {
        Workspace {
            projects: &mut self.projects,
            state: &mut self.state,
            result: &mut self.result,
        }
    }

    /// Writes the result summary, when a result file was requested.
    ///
    /// Failures are logged, never fatal.
    pub fn write_result(&self) {
        let Some(path) = &self.result_file else {
            return;
        };
        let written = serde_json::to_string_pretty(&self.result)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(path, json + "\n").map_err(anyhow::Error::from));
        match written {
            Ok(()) => log::debug!("Result written to {}", path.display()),
            Err(e) => log::error!("Error when writing result file {}: {}", path.display(), e),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_result_file(&mut self, path: PathBuf) {
        self.result_file = Some(path);
    }
}
