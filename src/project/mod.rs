//! Manifest units under manipulation.
//!
//! A run works on a list of [`Project`]s. Manipulators mutate the in-memory
//! model only; nothing reaches the disk until [`Project::commit`] stages the
//! serialized documents into the run's [`Transaction`].

pub mod npm;

use crate::error::{ManipulationError, Result};
use crate::fs::Transaction;

pub use npm::NpmPackage;

/// Position of a project in the session's project list.
///
/// Used as the identity of a project when collecting changed sets.
pub type ProjectId = usize;

/// Closed set of supported project kinds.
#[derive(Debug, Clone)]
pub enum Project {
    Npm(NpmPackage),
}

impl Project {
    /// Short name of the project kind, for log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Project::Npm(_) => "npm",
        }
    }

    /// Human-readable location of the project.
    pub fn describe(&self) -> String {
        match self {
            Project::Npm(pkg) => pkg.package_file().display().to_string(),
        }
    }

    /// Stages the project's documents for writing.
    pub fn commit(&self, txn: &mut Transaction) -> Result<()> {
        match self {
            Project::Npm(pkg) => pkg.commit(txn),
        }
    }

    /// Borrows the npm package, or fails naming the manipulator that needed it.
    pub fn as_npm_mut(&mut self, manipulator: &str) -> Result<&mut NpmPackage> {
        match self {
            Project::Npm(pkg) => Ok(pkg),
            #[allow(unreachable_patterns)]
            other => Err(ManipulationError::UnsupportedProject {
                project: other.kind().to_string(),
                manipulator: manipulator.to_string(),
            }),
        }
    }

    pub fn as_npm(&self, manipulator: &str) -> Result<&NpmPackage> {
        match self {
            Project::Npm(pkg) => Ok(pkg),
            #[allow(unreachable_patterns)]
            other => Err(ManipulationError::UnsupportedProject {
                project: other.kind().to_string(),
                manipulator: manipulator.to_string(),
            }),
        }
    }
}

impl From<NpmPackage> for Project {
    fn from(pkg: NpmPackage) -> Self {
        Project::Npm(pkg)
    }
}
