//! Pluggable manifest transforms.
//!
//! Every manipulator decides at activation time whether it runs, declares the
//! kinds it must run after, and reports which projects it actually changed.

pub mod dependency;
pub mod lookup;
pub mod scope;
pub mod version;

use crate::error::Result;
use crate::project::ProjectId;
use crate::session::{Session, Workspace};
use std::collections::BTreeSet;
use std::fmt;

pub use dependency::DependencyVersionManipulator;
pub use lookup::VersionLookupCollector;
pub use scope::ScopeManipulator;
pub use version::PackageVersionManipulator;

/// Tag identifying a manipulator variant, used for dependency declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManipulatorKind {
    Scope,
    DependencyVersion,
    PackageVersion,
    VersionLookup,
}

impl fmt::Display for ManipulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManipulatorKind::Scope => "ScopeManipulator",
            ManipulatorKind::DependencyVersion => "DependencyVersionManipulator",
            ManipulatorKind::PackageVersion => "PackageVersionManipulator",
            ManipulatorKind::VersionLookup => "VersionLookupCollector",
        };
        f.write_str(name)
    }
}

pub trait Manipulator {
    fn kind(&self) -> ManipulatorKind;

    /// Name used in log and error messages.
    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Reads configuration and reports whether this manipulator should run.
    ///
    /// Must not touch any project.
    fn activate(&mut self, session: &Session) -> Result<bool>;

    /// Applies the transform and returns the projects whose values changed.
    fn apply(&mut self, ws: &mut Workspace<'_>) -> Result<BTreeSet<ProjectId>>;

    /// Kinds that must run before this one when they are active.
    fn dependencies(&self) -> BTreeSet<ManipulatorKind> {
        BTreeSet::new()
    }
}

/// Fresh instances of every known manipulator, in registration order.
pub fn all() -> Vec<Box<dyn Manipulator>> {
    vec![
        Box::new(ScopeManipulator::default()),
        Box::new(DependencyVersionManipulator::default()),
        Box::new(PackageVersionManipulator::default()),
        Box::new(VersionLookupCollector::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let kinds: Vec<_> = all().iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ManipulatorKind::Scope,
                ManipulatorKind::DependencyVersion,
                ManipulatorKind::PackageVersion,
                ManipulatorKind::VersionLookup,
            ]
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ManipulatorKind::VersionLookup.to_string(), "VersionLookupCollector");
        assert_eq!(ManipulatorKind::Scope.to_string(), "ScopeManipulator");
    }
}
