//! Runs the active manipulators and commits what they changed.
//!
//! Manipulators are ordered by their declared dependencies (Kahn's
//! algorithm over manipulator kinds, ties broken by registration order).
//! All of them run against the in-memory projects first; only then are the
//! changed projects staged into a single [`Transaction`] and written. A
//! failure at any point before the commit leaves every file untouched.

use crate::config::MANIPULATION_DISABLE;
use crate::error::{ManipulationError, Result};
use crate::fs::Transaction;
use crate::manipulator::Manipulator;
use crate::project::ProjectId;
use crate::session::Session;
use std::collections::BTreeSet;

pub struct ManipulationManager {
    manipulators: Vec<Box<dyn Manipulator>>,
    dry_run: bool,
}

/// Orders manipulators so that each runs after every active manipulator of a
/// kind it depends on.
///
/// Returns indices into `manipulators`. Dependencies on kinds that are not
/// active are ignored. A manipulator depending on its own kind is a cycle.
pub fn resolve_order(manipulators: &[Box<dyn Manipulator>]) -> Result<Vec<usize>> {
    let count = manipulators.len();
    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (i, manipulator) in manipulators.iter().enumerate() {
        for kind in manipulator.dependencies() {
            for (j, producer) in manipulators.iter().enumerate() {
                if producer.kind() == kind {
                    dependents[j].push(i);
                    in_degree[i] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < count {
        let pending = (0..count)
            .filter(|i| !order.contains(i))
            .map(|i| manipulators[i].name())
            .collect();
        return Err(ManipulationError::DependencyCycle(pending));
    }
    Ok(order)
}

impl ManipulationManager {
    /// Takes the manipulators that activated for `session`.
    pub fn init(session: &Session, dry_run: bool) -> Result<Self> {
        Ok(Self::with_manipulators(session.active_manipulators()?, dry_run))
    }

    pub fn with_manipulators(manipulators: Vec<Box<dyn Manipulator>>, dry_run: bool) -> Self {
        Self {
            manipulators,
            dry_run,
        }
    }

    pub fn manipulators(&self) -> &[Box<dyn Manipulator>] {
        &self.manipulators
    }

    /// Applies all manipulators, commits the changed projects and writes the
    /// result summary.
    ///
    /// When the disable switch is set nothing is applied but the summary is
    /// still written. On error nothing has been written.
    pub fn run(&mut self, session: &mut Session) -> Result<()> {
        if session.props().is_enabled(MANIPULATION_DISABLE) {
            log::info!("Manipulation disabled by '{}'", MANIPULATION_DISABLE);
        } else {
            let changed = self.apply_manipulations(session)?;
            self.commit(session, &changed)?;
        }
        session.write_result();
        Ok(())
    }

    fn apply_manipulations(&mut self, session: &mut Session) -> Result<BTreeSet<ProjectId>> {
        let order = resolve_order(&self.manipulators)?;
        let mut changed = BTreeSet::new();

        let mut workspace = session.workspace();
        for i in order {
            let manipulator = &mut self.manipulators[i];
            log::debug!("Applying {}", manipulator.name());
            let touched = manipulator.apply(&mut workspace)?;
            log::debug!("{} changed {} project(s)", manipulator.name(), touched.len());
            changed.extend(touched);
        }

        if changed.is_empty() {
            log::info!("No changes.");
        }
        Ok(changed)
    }

    fn commit(&self, session: &Session, changed: &BTreeSet<ProjectId>) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }

        let mut txn = Transaction::new(self.dry_run);
        for &id in changed {
            if let Some(project) = session.projects().get(id) {
                log::debug!("Staging {}", project.describe());
                project.commit(&mut txn)?;
            }
        }

        for line in txn.preview() {
            log::debug!("{}", line);
        }
        txn.commit()?;
        txn.print_summary(session.target());
        Ok(())
    }
}
