//! Binary entry point for `npm-manipulator`.

use std::process;

fn main() {
    if let Err(e) = npm_manipulator::run() {
        log::debug!("{:?}", e);
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}
