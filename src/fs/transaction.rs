//! All-or-nothing manifest writes with rollback support.
//!
//! Manipulators only touch in-memory documents. Once every manipulator has
//! run, the changed manifests are staged here and written as a unit.
//!
//! ## Execution Guarantees
//!
//! - **Atomicity**: All writes succeed, or the ones already done are restored;
//!   each file is replaced through a temporary sibling, never truncated in place
//! - **Validation**: Pre-flight checks before any file is touched
//! - **Idempotency**: Files with unchanged content are skipped
//!
//! ## Phases
//!
//! 1. **Build**: Stage writes via `update_file()`
//! 2. **Validate**: Check paths still exist, are writable, not staged twice
//! 3. **Execute**: Replace files in staging order
//! 4. **Rollback** (on failure): Restore replaced files in LIFO order
//!
//! ## Example
//!
//! ```no_run
//! # use npm_manipulator::fs::Transaction;
//! # use std::path::PathBuf;
//! # fn example() -> npm_manipulator::error::Result<()> {
//! let mut txn = Transaction::new(false);
//!
//! txn.update_file(PathBuf::from("package.json"), "{\"name\": \"new\"}\n".into())?;
//! txn.update_file(PathBuf::from("package-lock.json"), "{\"name\": \"new\"}\n".into())?;
//!
//! txn.commit()?; // Writes both or neither
//! # Ok(())
//! # }
//! ```

use crate::error::{ManipulationError, Result};

use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A staged file write.
///
/// Stores original content for rollback.
#[derive(Debug, Clone)]
struct Operation {
    path: PathBuf,
    original: String,
    new: String,
}

/// Replaces `path` with `content` by renaming a filled sibling temp file over
/// it. The file keeps its permissions.
fn replace_file(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    /// Staging operations.
    Building,
    /// All operations succeeded.
    Committed,
    /// Validation or a write failed; nothing is left half-written.
    Failed,
}

/// Transaction coordinating the manifest writes of one run.
///
/// Must be explicitly committed. If dropped without committing, logs a warning
/// but doesn't roll back (since nothing was written).
///
/// ## Dry-Run Mode
///
/// When `dry_run = true`, operations are staged and reported but never written.
#[must_use = "Transaction must be committed"]
pub struct Transaction {
    operations: Vec<Operation>,
    dry_run: bool,
    state: TransactionState,
    executed_indices: Vec<usize>,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(dry_run: bool) -> Self {
        Self {
            operations: Vec::new(),
            dry_run,
            state: TransactionState::Building,
            executed_indices: Vec::new(),
        }
    }

    /// Stages a file update.
    ///
    /// Reads current content and compares to `new_content`. If identical,
    /// skips (idempotent). Otherwise stages for commit.
    pub fn update_file(&mut self, path: PathBuf, new_content: String) -> Result<()> {
        if self.state != TransactionState::Building {
            return Err(ManipulationError::Other(anyhow::anyhow!(
                "Cannot modify transaction after commit"
            )));
        }

        log::debug!("Staging update for: {}", path.display());

        let original = fs::read_to_string(&path).map_err(|e| {
            log::error!("Failed to read {}: {}", path.display(), e);
            ManipulationError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;

        if original == new_content {
            log::debug!("Content unchanged, skipping: {}", path.display());
            return Ok(());
        }

        if self.dry_run {
            log::info!("Would update: {}", path.display());
        }

        self.operations.push(Operation {
            path,
            original,
            new: new_content,
        });

        Ok(())
    }

    /// Validates all staged operations.
    ///
    /// Checks:
    /// - No duplicate file operations
    /// - Files still exist
    /// - Files are writable
    fn validate(&self) -> Result<()> {
        let mut file_paths = HashSet::new();

        for op in &self.operations {
            if !file_paths.insert(op.path.clone()) {
                return Err(ManipulationError::Other(anyhow::anyhow!(
                    "Duplicate file operation: {}",
                    op.path.display()
                )));
            }

            if !op.path.exists() {
                return Err(ManipulationError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File no longer exists: {}", op.path.display()),
                )));
            }

            if let Ok(metadata) = fs::metadata(&op.path) {
                if metadata.permissions().readonly() {
                    return Err(ManipulationError::Io(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("File is read-only: {}", op.path.display()),
                    )));
                }
            }
        }

        Ok(())
    }

    /// Commits all staged operations atomically.
    ///
    /// Validates first. If a write fails midway, files already written are
    /// restored before the error is returned.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Building {
            return Err(ManipulationError::Other(anyhow::anyhow!(
                "Transaction already committed"
            )));
        }

        if self.dry_run {
            self.state = TransactionState::Committed;
            return Ok(());
        }

        if let Err(e) = self.validate() {
            self.state = TransactionState::Failed;
            return Err(e);
        }

        for idx in 0..self.operations.len() {
            let op = &self.operations[idx];
            if let Err(e) = replace_file(&op.path, &op.new) {
                let err = ManipulationError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write {}: {}", op.path.display(), e),
                ));
                log::error!("{}; restoring {} written file(s)", err, self.executed_indices.len());
                let restored = self.rollback_partial();
                self.state = TransactionState::Failed;
                restored?;
                return Err(err);
            }
            self.executed_indices.push(idx);
            log::debug!("Updated: {}", op.path.display());
        }

        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Restores executed operations only.
    fn rollback_partial(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        for &idx in self.executed_indices.iter().rev() {
            if let Some(op) = self.operations.get(idx) {
                if let Err(e) = replace_file(&op.path, &op.original) {
                    errors.push(format!("Failed to restore {}: {}", op.path.display(), e));
                }
            }
        }
        self.executed_indices.clear();

        if errors.is_empty() {
            log::info!("Rollback completed");
            Ok(())
        } else {
            Err(ManipulationError::RollbackFailed(errors.join("; ")))
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.operations.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns human-readable preview of operations.
    pub fn preview(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| format!("Update: {}", op.path.display()))
            .collect()
    }

    /// Prints categorized summary to stdout.
    ///
    /// Groups primary manifests (`package.json`) and lock manifests.
    /// Paths are relative to `root` with forward slashes.
    pub fn print_summary(&self, root: &Path) {
        if self.operations.is_empty() {
            println!("\n{}", "No changes needed".yellow());
            return;
        }

        let display_path = |path: &Path| -> String {
            let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
            relative.to_string_lossy().replace('\\', "/")
        };

        let mut manifests = Vec::new();
        let mut lock_files = Vec::new();

        for op in &self.operations {
            let is_manifest = op
                .path
                .file_name()
                .map(|n| n == "package.json")
                .unwrap_or(false);
            if is_manifest {
                manifests.push(display_path(&op.path));
            } else {
                lock_files.push(display_path(&op.path));
            }
        }

        manifests.sort();
        lock_files.sort();

        if self.dry_run {
            println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        } else {
            println!("\n{}", "Changes applied:".green().bold());
        }

        for (title, paths) in [("Package manifest", &manifests), ("Lock manifest", &lock_files)] {
            if paths.is_empty() {
                continue;
            }
            println!("\n{} {}", "📦".bold(), title);
            for path in paths {
                if self.dry_run {
                    println!("   • {}", path.dimmed());
                } else {
                    println!("   {} {}", "✓".green(), path.dimmed());
                }
            }
        }

        println!();
        let num_ops = self.operations.len();
        if self.dry_run {
            println!(
                "{} {} will be modified. Run without {} to apply.",
                num_ops.to_string().cyan().bold(),
                if num_ops > 1 { "files" } else { "file" },
                "--dry-run".cyan()
            );
        } else {
            println!("{} Successfully wrote {} file(s)", "✓".green().bold(), num_ops);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Building && !self.operations.is_empty() && !self.dry_run
        {
            log::warn!("Transaction dropped without commit");
        }
    }
}
