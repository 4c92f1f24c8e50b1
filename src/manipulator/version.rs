//! Package version generation.
//!
//! The new version is chosen by the first configured rule:
//!
//! 1. `versionOverride`: used verbatim.
//! 2. `versionSuffixOverride`: appended to the current version after `-`.
//! 3. `versioningStrategy`: computed from the current version (or
//!    `versionBaseOverride`) and the versions already published, as collected
//!    by the [`VersionLookupCollector`](super::VersionLookupCollector).
//!
//! | Strategy   | Input       | Published                     | Result              |
//! |------------|-------------|-------------------------------|---------------------|
//! | `HYPHENED` | `1.0.0`     | `1.0.0-redhat-00002`          | `1.0.0-redhat-00003` |
//! | `SEMVER`   | `1.2.0-rc1` | `1.2.4`, `1.2.5-redhat.1`     | `1.2.5-redhat.2`    |

use super::{Manipulator, ManipulatorKind};
use crate::config::{
    REST_URL, VERSION_BASE_OVERRIDE, VERSION_INCREMENTAL_SUFFIX,
    VERSION_INCREMENTAL_SUFFIX_PADDING, VERSION_OVERRIDE, VERSION_SUFFIX_OVERRIDE,
    VERSIONING_STRATEGY,
};
use crate::error::{ManipulationError, Result};
use crate::project::ProjectId;
use crate::session::{Session, Workspace};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const HYPHENED_SEPARATOR: char = '-';
const SEMVER_PRERELEASE_SEPARATOR: char = '-';
const SEMVER_BUILDNUM_SEPARATOR: char = '.';

const SEMVER_FINAL_PATTERN: &str = r"^(\d+)\.(\d+)\.(\d+)$";
const SEMVER_PRERELEASE_PATTERN: &str = r"^(\d+)\.(\d+)\.(\d+)(?:-([\w-]+)(?:\.([\w-]+))*)?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningStrategy {
    /// `<version>-<suffix>-<zero padded number>`
    Hyphened,
    /// `<major>.<minor>.<next patch>[-<suffix>.<number>]`
    Semver,
    /// Version or suffix is supplied by the caller; nothing is computed.
    Override,
}

impl FromStr for VersioningStrategy {
    type Err = ManipulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HYPHENED" => Ok(Self::Hyphened),
            "SEMVER" => Ok(Self::Semver),
            "OVERRIDE" => Ok(Self::Override),
            _ => Err(ManipulationError::Config(format!(
                "unknown versioning strategy '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for VersioningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hyphened => "HYPHENED",
            Self::Semver => "SEMVER",
            Self::Override => "OVERRIDE",
        };
        f.write_str(name)
    }
}

/// Highest `N` among versions of the form `<prefix><digits>`, 0 when none.
fn highest_incremental_num<'a, I>(prefix: &str, available: I) -> u64
where
    I: IntoIterator<Item = &'a String>,
{
    available
        .into_iter()
        .filter_map(|version| version.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|rest| rest.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// `current + 1`, or an error naming `version` when the counter is exhausted.
fn next_number(version: &str, current: u64) -> Result<u64> {
    current
        .checked_add(1)
        .ok_or_else(|| ManipulationError::InvalidVersion {
            version: version.to_string(),
            reason: format!("no number follows published {}", current),
        })
}

/// Generates `<bare>-<suffix>-<N+1>`, zero padded to `padding` digits.
///
/// An existing `-<suffix>-<digits>` at the end of `version` is dropped first,
/// so the number is always recomputed from `available`.
pub fn hyphened_version(
    version: &str,
    suffix: &str,
    padding: usize,
    available: &BTreeSet<String>,
) -> Result<String> {
    let existing = Regex::new(&format!(
        "{}{}{}\\d+$",
        HYPHENED_SEPARATOR,
        regex::escape(suffix),
        HYPHENED_SEPARATOR
    ))?;
    let bare = match existing.find(version) {
        Some(m) if m.start() > 0 => &version[..m.start()],
        _ => version,
    };

    let prefix = format!("{bare}{HYPHENED_SEPARATOR}{suffix}{HYPHENED_SEPARATOR}");
    let next = next_number(version, highest_incremental_num(&prefix, available))?;
    Ok(format!("{prefix}{next:0>padding$}"))
}

/// Generates `<major>.<minor>.<next patch>`, followed by `-<suffix>.<N+1>`
/// when a suffix is given.
///
/// The next patch is one above the highest published final release with the
/// same major and minor, or 0 when there is none.
pub fn semver_version(
    version: &str,
    suffix: Option<&str>,
    available: &BTreeSet<String>,
) -> Result<String> {
    let prerelease = Regex::new(SEMVER_PRERELEASE_PATTERN)?;
    let caps = prerelease
        .captures(version)
        .ok_or_else(|| ManipulationError::InvalidVersion {
            version: version.to_string(),
            reason: "expected <major>.<minor>.<patch>[-<prerelease>]".to_string(),
        })?;
    let (major, minor) = (&caps[1], &caps[2]);

    let final_release = Regex::new(SEMVER_FINAL_PATTERN)?;
    let highest_patch = available
        .iter()
        .filter_map(|v| final_release.captures(v))
        .filter(|c| &c[1] == major && &c[2] == minor)
        .filter_map(|c| c[3].parse::<u64>().ok())
        .max();
    let patch = match highest_patch {
        Some(patch) => next_number(version, patch)?,
        None => 0,
    };

    let release = format!("{}.{}.{}", major, minor, patch);
    let Some(suffix) = suffix else {
        return Ok(release);
    };

    let prefix = format!("{release}{SEMVER_PRERELEASE_SEPARATOR}{suffix}{SEMVER_BUILDNUM_SEPARATOR}");
    let next = next_number(version, highest_incremental_num(&prefix, available))?;
    Ok(format!("{prefix}{next}"))
}

#[derive(Debug, Default)]
pub struct PackageVersionManipulator {
    version_override: Option<String>,
    suffix_override: Option<String>,
    base_override: Option<String>,
    strategy: Option<VersioningStrategy>,
    suffix: Option<String>,
    padding: usize,
    lookup_configured: bool,
}

impl PackageVersionManipulator {
    /// Computes the version for a package currently at `version`.
    ///
    /// Returns `None` when no rule produces a version.
    pub fn new_version(&self, version: &str, available: &BTreeSet<String>) -> Result<Option<String>> {
        if let Some(version_override) = &self.version_override {
            return Ok(Some(version_override.clone()));
        }
        if let Some(suffix) = &self.suffix_override {
            return Ok(Some(format!("{version}{HYPHENED_SEPARATOR}{suffix}")));
        }

        let base = self.base_override.as_deref().unwrap_or(version);
        match (self.strategy, self.suffix.as_deref()) {
            (Some(VersioningStrategy::Hyphened), Some(suffix)) => {
                hyphened_version(base, suffix, self.padding.max(1), available).map(Some)
            }
            (Some(VersioningStrategy::Hyphened), None) => {
                log::warn!(
                    "{} strategy requires {}. Skipping version manipulation.",
                    VersioningStrategy::Hyphened,
                    VERSION_INCREMENTAL_SUFFIX
                );
                Ok(None)
            }
            (Some(VersioningStrategy::Semver), suffix) => {
                semver_version(base, suffix, available).map(Some)
            }
            _ => {
                log::warn!(
                    "No version strategy defined and no override provided. Skipping version manipulation."
                );
                Ok(None)
            }
        }
    }
}

impl Manipulator for PackageVersionManipulator {
    fn kind(&self) -> ManipulatorKind {
        ManipulatorKind::PackageVersion
    }

    fn activate(&mut self, session: &Session) -> Result<bool> {
        let props = session.props();
        let owned = |key: &str| props.get_set(key).map(str::to_string);

        self.version_override = owned(VERSION_OVERRIDE);
        self.suffix_override = owned(VERSION_SUFFIX_OVERRIDE);
        self.base_override = owned(VERSION_BASE_OVERRIDE);
        self.suffix = owned(VERSION_INCREMENTAL_SUFFIX);
        self.padding = props.parse_or(VERSION_INCREMENTAL_SUFFIX_PADDING, 1usize);
        self.lookup_configured = props.is_set(REST_URL);
        self.strategy = match props.get_set(VERSIONING_STRATEGY) {
            None => None,
            Some(raw) => match raw.parse() {
                Ok(strategy) => Some(strategy),
                Err(e) => {
                    log::error!(
                        "Unknown versioning strategy: '{}'. Only version override will be applied.",
                        raw
                    );
                    log::debug!("Error was: {}", e);
                    None
                }
            },
        };

        let computed = match self.strategy {
            Some(VersioningStrategy::Semver) => true,
            Some(VersioningStrategy::Hyphened) => self.suffix.is_some(),
            _ => false,
        };
        Ok(self.version_override.is_some()
            || self.suffix_override.is_some()
            || self.base_override.is_some()
            || computed)
    }

    fn apply(&mut self, ws: &mut Workspace<'_>) -> Result<BTreeSet<ProjectId>> {
        let name = self.name();
        let mut changed = BTreeSet::new();

        for (id, project) in ws.projects.iter_mut().enumerate() {
            let pkg = project.as_npm_mut(&name)?;
            let current = pkg.version()?.to_string();
            let available = ws.state.versions_of(pkg.name()?);

            let Some(new_version) = self.new_version(&current, &available)? else {
                continue;
            };
            if new_version != current {
                log::info!("Updating package version: {} -> {}", current, new_version);
                pkg.set_version(&new_version)?;
                ws.result.version = Some(new_version);
                changed.insert(id);
            }
        }
        Ok(changed)
    }

    fn dependencies(&self) -> BTreeSet<ManipulatorKind> {
        let mut deps = BTreeSet::new();
        if self.version_override.is_none() && self.suffix_override.is_none() && self.lookup_configured {
            deps.insert(ManipulatorKind::VersionLookup);
        }
        deps
    }
}
