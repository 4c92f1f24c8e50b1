//! Rewrites the package name into a configured scope.

use super::{Manipulator, ManipulatorKind};
use crate::config::PACKAGE_SCOPE;
use crate::error::Result;
use crate::project::ProjectId;
use crate::session::{Session, Workspace};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct ScopeManipulator {
    scope: Option<String>,
}

impl ScopeManipulator {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }
}

/// Moves `name` into `scope`, replacing any existing scope.
///
/// `scope` may be given with or without the leading `@` and trailing `/`.
pub fn apply_scope(scope: &str, name: &str) -> String {
    let bare = match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((_, bare)) => bare,
        None => name,
    };

    let mut scoped = String::with_capacity(scope.len() + bare.len() + 2);
    if !scope.starts_with('@') {
        scoped.push('@');
    }
    scoped.push_str(scope);
    if !scope.ends_with('/') {
        scoped.push('/');
    }
    scoped.push_str(bare);
    scoped
}

impl Manipulator for ScopeManipulator {
    fn kind(&self) -> ManipulatorKind {
        ManipulatorKind::Scope
    }

    fn activate(&mut self, session: &Session) -> Result<bool> {
        self.scope = session.props().get_set(PACKAGE_SCOPE).map(str::to_string);
        Ok(self.scope.is_some())
    }

    fn apply(&mut self, ws: &mut Workspace<'_>) -> Result<BTreeSet<ProjectId>> {
        let mut changed = BTreeSet::new();
        let Some(scope) = self.scope.as_deref() else {
            return Ok(changed);
        };
        let name = self.name();

        for (id, project) in ws.projects.iter_mut().enumerate() {
            let pkg = project.as_npm_mut(&name)?;
            let current = pkg.name()?.to_string();
            let scoped = apply_scope(scope, &current);
            if scoped != current {
                log::info!("Changing package name from {} to {}", current, scoped);
                pkg.set_name(&scoped)?;
                ws.result.name = Some(scoped);
                changed.insert(id);
            }
        }
        Ok(changed)
    }
}
