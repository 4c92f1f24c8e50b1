//! Collects published versions of the packages under manipulation.
//!
//! This manipulator never changes a project. It fills
//! [`SharedState::available_versions`](crate::session::SharedState) for the
//! version manipulator to read.

use super::{Manipulator, ManipulatorKind};
use crate::config::{REPOSITORY_GROUP, REST_MODE, VERSION_OVERRIDE, VERSION_SUFFIX_OVERRIDE};
use crate::error::Result;
use crate::lookup::{LookupSettings, PackageRef, RestLookupClient, VersionLookup};
use crate::project::ProjectId;
use crate::session::{Session, Workspace};
use std::collections::BTreeSet;

#[derive(Default)]
pub struct VersionLookupCollector {
    client: Option<Box<dyn VersionLookup>>,
}

impl VersionLookupCollector {
    /// Uses `client` instead of building an HTTP client at activation.
    pub fn with_client(client: Box<dyn VersionLookup>) -> Self {
        Self {
            client: Some(client),
        }
    }
}

impl Manipulator for VersionLookupCollector {
    fn kind(&self) -> ManipulatorKind {
        ManipulatorKind::VersionLookup
    }

    fn activate(&mut self, session: &Session) -> Result<bool> {
        let props = session.props();
        if props.is_set(VERSION_OVERRIDE) || props.is_set(VERSION_SUFFIX_OVERRIDE) {
            return Ok(false);
        }
        if !props.is_set(REST_MODE) && !props.is_set(REPOSITORY_GROUP) {
            return Ok(false);
        }
        let Some(settings) = LookupSettings::from_props(props) else {
            return Ok(false);
        };

        if self.client.is_none() {
            let client = RestLookupClient::new(settings)?;
            log::debug!("Version lookup endpoint: {}", client.endpoint());
            self.client = Some(Box::new(client));
        }
        Ok(true)
    }

    fn apply(&mut self, ws: &mut Workspace<'_>) -> Result<BTreeSet<ProjectId>> {
        let Some(client) = self.client.as_ref() else {
            return Ok(BTreeSet::new());
        };

        let name = self.name();
        let mut refs = Vec::with_capacity(ws.projects.len());
        for project in ws.projects.iter() {
            let pkg = project.as_npm(&name)?;
            refs.push(PackageRef::new(pkg.name()?, pkg.version()?));
        }
        log::debug!("Looking up available versions for {:?}", refs);

        let mut found = client.lookup(&refs)?;
        for package in &refs {
            if let Some(versions) = found.remove(package) {
                ws.state.add_versions(&package.name, versions);
            }
        }
        ws.state.available_versions.get_or_insert_with(Default::default);
        log::debug!("Available versions: {:?}", ws.state.available_versions);

        Ok(BTreeSet::new())
    }
}
