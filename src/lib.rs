#![doc = include_str!("../README.md")]

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod hooks;
pub mod logging;
pub mod lookup;
pub mod manager;
pub mod manipulator;
pub mod project;
pub mod session;

pub use error::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    command::manipulate::execute(cli)
}
