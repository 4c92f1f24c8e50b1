//! npm package manifests (`package.json` plus an optional lock manifest).
//!
//! Both documents are parsed once when the package is loaded and serialized
//! once at commit time. Key order, indentation and a trailing newline of the
//! original files are preserved.

use crate::error::{ManipulationError, Result};
use crate::fs::Transaction;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PACKAGE_FILE: &str = "package.json";
pub const SHRINKWRAP_FILE: &str = "npm-shrinkwrap.json";
pub const PACKAGE_LOCK_FILE: &str = "package-lock.json";

const DEPENDENCIES: &str = "dependencies";
const DEV_DEPENDENCIES: &str = "devDependencies";

/// A parsed JSON document together with the formatting it was read with.
#[derive(Debug, Clone)]
struct Document {
    path: PathBuf,
    value: Value,
    indent: String,
    trailing_newline: bool,
}

impl Document {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ManipulationError::Structure {
            path: path.to_path_buf(),
            reason: format!("cannot be read: {}", e),
        })?;
        let value = serde_json::from_str(&content).map_err(|e| ManipulationError::Structure {
            path: path.to_path_buf(),
            reason: format!("is not valid JSON: {}", e),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            value,
            indent: detect_indent(&content),
            trailing_newline: content.ends_with('\n'),
        })
    }

    fn object_mut(&mut self) -> Result<&mut Map<String, Value>> {
        let path = &self.path;
        self.value
            .as_object_mut()
            .ok_or_else(|| ManipulationError::Structure {
                path: path.clone(),
                reason: "does not seem to have correct structure".to_string(),
            })
    }

    fn string_field(&self, field: &str) -> Result<&str> {
        self.value
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ManipulationError::Structure {
                path: self.path.clone(),
                reason: format!("does not contain field '{}'", field),
            })
    }

    fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.value.serialize(&mut ser)?;
        let mut out = String::from_utf8(buf).map_err(anyhow::Error::from)?;
        if self.trailing_newline {
            out.push('\n');
        }
        Ok(out)
    }
}

/// Leading whitespace of the first indented line, two spaces if none.
fn detect_indent(content: &str) -> String {
    content
        .lines()
        .skip(1)
        .find_map(|line| {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            (!indent.is_empty() && indent.len() < line.len()).then_some(indent)
        })
        .unwrap_or_else(|| "  ".to_string())
}

/// An npm package under manipulation.
#[derive(Debug, Clone)]
pub struct NpmPackage {
    package: Document,
    lock: Option<Document>,
}

impl NpmPackage {
    /// Resolves the manifest files for `path` and loads them.
    ///
    /// `path` may be a package directory, a `package.json`, or a lock
    /// manifest. In a directory, `npm-shrinkwrap.json` takes precedence over
    /// `package-lock.json`.
    pub fn locate(path: &Path) -> Result<Self> {
        let dir = Self::project_dir(path)?;
        let mut lock_file = path
            .is_file()
            .then(|| path.file_name().and_then(|n| n.to_str()))
            .flatten()
            .filter(|name| matches!(*name, SHRINKWRAP_FILE | PACKAGE_LOCK_FILE))
            .map(|_| path.to_path_buf());

        let package_file = dir.join(PACKAGE_FILE);
        if lock_file.is_none() {
            lock_file = [SHRINKWRAP_FILE, PACKAGE_LOCK_FILE]
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file());
        }

        log::debug!(
            "Package manifest: {}, lock manifest: {}",
            package_file.display(),
            lock_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        Self::load(&package_file, lock_file.as_deref())
    }

    /// Directory of the package at `path`, without reading any manifest.
    ///
    /// `path` is a package directory or a file inside one.
    pub fn project_dir(path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            return Err(ManipulationError::MissingPath(path.to_path_buf()));
        }
        if !path.is_file() {
            return Ok(path.to_path_buf());
        }
        Ok(path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Loads a package from explicit manifest paths.
    pub fn load(package_file: &Path, lock_file: Option<&Path>) -> Result<Self> {
        if !package_file.is_file() {
            return Err(ManipulationError::Structure {
                path: package_file.to_path_buf(),
                reason: "package file does not exist".to_string(),
            });
        }
        let package = Document::read(package_file)?;
        let lock = lock_file.map(Document::read).transpose()?;
        Ok(Self { package, lock })
    }

    /// Builds a package from an in-memory document, without a lock manifest.
    pub fn from_value(package_file: impl Into<PathBuf>, value: Value) -> Self {
        Self {
            package: Document {
                path: package_file.into(),
                value,
                indent: "  ".to_string(),
                trailing_newline: true,
            },
            lock: None,
        }
    }

    pub fn package_file(&self) -> &Path {
        &self.package.path
    }

    pub fn lock_file(&self) -> Option<&Path> {
        self.lock.as_ref().map(|doc| doc.path.as_path())
    }

    /// Directory containing the package manifest.
    pub fn dir(&self) -> &Path {
        self.package
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    pub fn name(&self) -> Result<&str> {
        self.package.string_field("name")
    }

    pub fn version(&self) -> Result<&str> {
        self.package.string_field("version")
    }

    pub fn dependencies(&self) -> BTreeMap<String, String> {
        self.dependency_map(DEPENDENCIES)
    }

    pub fn dev_dependencies(&self) -> BTreeMap<String, String> {
        self.dependency_map(DEV_DEPENDENCIES)
    }

    fn dependency_map(&self, section: &str) -> BTreeMap<String, String> {
        self.package
            .value
            .get(section)
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, v)| v.as_str().map(|v| (name.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Updates the name in the package manifest and the lock manifest.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.set_identity_field("name", name)
    }

    /// Updates the version in the package manifest and the lock manifest.
    pub fn set_version(&mut self, version: &str) -> Result<()> {
        self.set_identity_field("version", version)
    }

    fn set_identity_field(&mut self, field: &str, value: &str) -> Result<()> {
        self.package
            .object_mut()?
            .insert(field.to_string(), Value::from(value));

        if let Some(lock) = self.lock.as_mut() {
            let root = lock.object_mut()?;
            root.insert(field.to_string(), Value::from(value));

            // lockfileVersion >= 2 repeats the root package under packages[""]
            if let Some(entry) = root
                .get_mut("packages")
                .and_then(|p| p.get_mut(""))
                .and_then(Value::as_object_mut)
            {
                entry.insert(field.to_string(), Value::from(value));
            }
        }
        Ok(())
    }

    /// Rewrites the version range of an existing (dev) dependency.
    pub fn set_dependency_version(&mut self, dependency: &str, version: &str, dev: bool) -> Result<()> {
        let section = if dev { DEV_DEPENDENCIES } else { DEPENDENCIES };
        let path = self.package.path.clone();
        let entry = self
            .package
            .object_mut()?
            .get_mut(section)
            .and_then(Value::as_object_mut)
            .and_then(|deps| deps.get_mut(dependency))
            .ok_or_else(|| ManipulationError::Structure {
                path,
                reason: format!("'{}' has no entry '{}'", section, dependency),
            })?;
        *entry = Value::from(version);
        Ok(())
    }

    /// Stages the serialized documents into `txn`.
    pub fn commit(&self, txn: &mut Transaction) -> Result<()> {
        txn.update_file(self.package.path.clone(), self.package.render()?)?;
        if let Some(lock) = &self.lock {
            txn.update_file(lock.path.clone(), lock.render()?)?;
        }
        Ok(())
    }
}
