use crate::cli::{Cli, ProjectType};
use crate::config::UserProps;
use crate::error::Result;
use crate::hooks;
use crate::logging::{self, LogOptions};
use crate::manager::ManipulationManager;
use crate::project::NpmPackage;
use crate::session::Session;

pub fn execute(cli: Cli) -> Result<()> {
    logging::init(&LogOptions {
        debug: cli.debug,
        trace: cli.trace,
        file: cli.log_file.clone(),
        context: cli.log_context.clone(),
    })?;
    log::debug!("npm-manipulator {}", crate::VERSION);

    match cli.project_type {
        ProjectType::Npm => log::debug!("Manipulating npm project at {}", cli.file.display()),
    }

    let props = UserProps::from_definitions(&cli.define);
    log::debug!("{} configuration properties", props.len());

    // Manifests are read after the pre-scripts, which may edit or create them.
    let dir = NpmPackage::project_dir(&cli.file)?;
    hooks::run_pre_scripts(&props, &dir)?;

    let mut session = Session::new(&cli.file, cli.result.clone(), props)?;

    let mut manager = ManipulationManager::init(&session, cli.dry_run)?;
    log::info!(
        "Active manipulators: [{}]",
        manager
            .manipulators()
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    manager.run(&mut session)?;

    hooks::run_post_scripts(session.props(), &dir)?;
    Ok(())
}
