//! Overrides pinned versions of existing dependencies.

use super::{Manipulator, ManipulatorKind};
use crate::config::{DEPENDENCY_OVERRIDE_PREFIX, DEV_DEPENDENCY_OVERRIDE_PREFIX, UserProps};
use crate::error::Result;
use crate::project::{NpmPackage, ProjectId};
use crate::session::{Session, Workspace};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct DependencyVersionManipulator {
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
}

fn overrides(props: &UserProps, prefix: &str) -> BTreeMap<String, String> {
    props
        .with_prefix(prefix)
        .map(|(name, version)| (name.to_string(), version.to_string()))
        .collect()
}

impl DependencyVersionManipulator {
    /// Rewrites the entries of one section, returning whether anything changed.
    ///
    /// A failing entry is logged and skipped.
    fn override_section(
        pkg: &mut NpmPackage,
        overrides: &BTreeMap<String, String>,
        dev: bool,
        applied: &mut BTreeMap<String, String>,
    ) -> bool {
        let current = if dev {
            pkg.dev_dependencies()
        } else {
            pkg.dependencies()
        };

        let mut changed = false;
        for (name, version) in overrides {
            let Some(pinned) = current.get(name) else {
                log::debug!("Dependency {} is not present, ignoring override", name);
                continue;
            };
            if pinned == version {
                continue;
            }
            match pkg.set_dependency_version(name, version, dev) {
                Ok(()) => {
                    log::info!("Updating dependency {} from {} to {}", name, pinned, version);
                    applied.insert(name.clone(), version.clone());
                    changed = true;
                }
                Err(e) => log::error!("Unable to override dependency {}: {}", name, e),
            }
        }
        changed
    }
}

impl Manipulator for DependencyVersionManipulator {
    fn kind(&self) -> ManipulatorKind {
        ManipulatorKind::DependencyVersion
    }

    fn activate(&mut self, session: &Session) -> Result<bool> {
        self.dependencies = overrides(session.props(), DEPENDENCY_OVERRIDE_PREFIX);
        self.dev_dependencies = overrides(session.props(), DEV_DEPENDENCY_OVERRIDE_PREFIX);
        Ok(!self.dependencies.is_empty() || !self.dev_dependencies.is_empty())
    }

    fn apply(&mut self, ws: &mut Workspace<'_>) -> Result<BTreeSet<ProjectId>> {
        let name = self.name();
        let mut changed = BTreeSet::new();

        for (id, project) in ws.projects.iter_mut().enumerate() {
            let pkg = project.as_npm_mut(&name)?;
            let deps = Self::override_section(
                pkg,
                &self.dependencies,
                false,
                &mut ws.result.dependencies_map,
            );
            let dev = Self::override_section(
                pkg,
                &self.dev_dependencies,
                true,
                &mut ws.result.dev_dependencies_map,
            );
            if deps || dev {
                changed.insert(id);
            }
        }
        Ok(changed)
    }
}
