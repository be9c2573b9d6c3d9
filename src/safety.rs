//! Workspace confinement for [`FsStore`](crate::FsStore).
//!
//! A guarded store resolves every document key through a [`WorkspaceGuard`]
//! on read and again just before write. Keys that canonicalize outside the
//! workspace, or into a directory patches must never touch, are refused.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories inside a workspace that patches must never write into.
const FORBIDDEN_DIRS: &[&str] = &[".git", "node_modules"];

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("document key escapes the workspace: {} (workspace: {})", path.display(), workspace.display())]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("document key is inside {}: {}", forbidden.display(), path.display())]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("cannot resolve document key: {0}")]
    Canonicalize(#[from] io::Error),
}

/// The directory a guarded store may read from and write to.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    /// Canonical forms of `FORBIDDEN_DIRS` that exist under `root`
    forbidden: Vec<PathBuf>,
}

impl WorkspaceGuard {
    /// Guard the workspace at `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        let forbidden = FORBIDDEN_DIRS
            .iter()
            .filter_map(|dir| root.join(dir).canonicalize().ok())
            .collect();

        Ok(Self { root, forbidden })
    }

    /// Resolve a document key to the canonical file it names.
    ///
    /// Relative keys are taken from the workspace root. Symlinks and `..`
    /// are followed before the confinement check, so neither can be used to
    /// reach a file outside the workspace.
    pub fn validate_path(&self, key: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let key = key.as_ref();
        if key.is_absolute() {
            self.confine(key)
        } else {
            self.confine(&self.root.join(key))
        }
    }

    /// Check an already resolved path again right before the store writes
    /// to it; the file may have been swapped for a symlink in between.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        self.confine(path)
    }

    fn confine(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = path.canonicalize()?;

        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical,
                workspace: self.root.clone(),
            });
        }

        if let Some(forbidden) = self.forbidden.iter().find(|dir| canonical.starts_with(dir)) {
            return Err(SafetyError::ForbiddenPath {
                forbidden: forbidden.clone(),
                path: canonical,
            });
        }

        Ok(canonical)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }
}
