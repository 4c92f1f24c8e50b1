use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "npm-manipulator",
    version,
    about = "Rewrite npm package manifests before a build"
)]
pub struct Cli {
    /// Package directory, package.json or lock file to manipulate
    #[arg(short = 'f', long = "file", default_value = ".")]
    pub file: PathBuf,

    /// Write a JSON summary of the applied values to this file
    #[arg(short = 'r', long = "result")]
    pub result: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Enable trace logging
    #[arg(short = 'c', long)]
    pub trace: bool,

    /// Write log records to this file instead of stderr
    #[arg(long = "log")]
    pub log_file: Option<PathBuf>,

    /// Identifier prefixed to log records and sent to the lookup service
    #[arg(long)]
    pub log_context: Option<String>,

    /// Compute all changes but write no manifest
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Project type
    #[arg(short = 't', long = "type", value_enum, ignore_case = true, default_value_t = ProjectType::Npm)]
    pub project_type: ProjectType,

    /// Configuration property, as key=value (repeatable)
    #[arg(short = 'D', value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub define: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectType {
    Npm,
}
