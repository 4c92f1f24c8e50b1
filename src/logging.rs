//! Logger initialisation.
//!
//! Records go to stderr, or to a file given with `--log`. An optional log
//! context identifier prefixes every record and is forwarded to the version
//! lookup service.

use crate::error::Result;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONTEXT: OnceLock<String> = OnceLock::new();

/// Logging options taken from the command line.
#[derive(Debug, Default, Clone)]
pub struct LogOptions {
    pub debug: bool,
    pub trace: bool,
    pub file: Option<PathBuf>,
    pub context: Option<String>,
}

impl LogOptions {
    fn level(&self) -> Option<LevelFilter> {
        if self.trace {
            Some(LevelFilter::Trace)
        } else if self.debug {
            Some(LevelFilter::Debug)
        } else {
            None
        }
    }
}

/// Log context identifier for this process, if one was given.
pub fn context() -> Option<&'static str> {
    CONTEXT.get().map(String::as_str)
}

fn cgroup_mentions_container(cgroup: &str) -> bool {
    cgroup.contains("docker") || cgroup.contains("kubepods")
}

/// Whether the process appears to run inside a container.
pub fn in_container() -> bool {
    if std::env::var_os("container").is_some() {
        return true;
    }
    fs::read_to_string(Path::new("/proc/1/cgroup"))
        .map(|cgroup| cgroup_mentions_container(&cgroup))
        .unwrap_or(false)
}

/// Installs the global logger. Safe to call once per process.
pub fn init(options: &LogOptions) -> Result<()> {
    if let Some(context) = options.context.as_ref().filter(|c| !c.is_empty()) {
        let _ = CONTEXT.set(context.clone());
    }

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = options.level() {
        builder.filter_level(level);
    }

    builder.format(|buf, record| {
        let level = buf.default_level_style(record.level());
        match context() {
            Some(context) => writeln!(
                buf,
                "[{}] {level}{:<5}{level:#} {}",
                context,
                record.level(),
                record.args()
            ),
            None => writeln!(buf, "{level}{:<5}{level:#} {}", record.level(), record.args()),
        }
    });

    let mut skipped_file = None;
    if let Some(path) = &options.file {
        if in_container() {
            skipped_file = Some(path);
        } else {
            let file = File::create(path)?;
            builder.target(Target::Pipe(Box::new(file)));
        }
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
    if let Some(path) = skipped_file {
        log::warn!(
            "Running in a container, not writing log file {}",
            path.display()
        );
    }
    Ok(())
}
