//! Plan applicator - runs every patch of a plan file against a document store
//!
//! Each patch is an independent read/transform/write. This is also where
//! core failures are turned into policy: a missing start anchor next to an
//! already-present payload means the patch was applied before.

use crate::config::schema::{Metadata, PatchConfig, PatchDefinition, ValidationIssue};
use crate::document::Document;
use crate::error::PatchError;
use crate::store::{DocumentStore, OverlayStore};
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[must_use = "PatchResult should be checked for applied/already-applied"]
pub enum PatchResult {
    /// Document changed and was written back
    Applied { file: PathBuf },
    /// Nothing to do; the document already carries the payload
    AlreadyApplied { file: PathBuf },
}

impl PatchResult {
    pub fn file(&self) -> &Path {
        match self {
            PatchResult::Applied { file } | PatchResult::AlreadyApplied { file } => file,
        }
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file } => write!(f, "Applied patch to {}", file.display()),
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
        }
    }
}

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// The patch definition does not compile into a plan
    Invalid { issue: ValidationIssue },
    /// Locating, verifying, substituting or storing failed
    Patch { file: PathBuf, source: PatchError },
}

impl ApplicationError {
    pub fn patch_error(&self) -> Option<&PatchError> {
        match self {
            ApplicationError::Patch { source, .. } => Some(source),
            ApplicationError::Invalid { .. } => None,
        }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Invalid { issue } => write!(f, "{issue}"),
            ApplicationError::Patch { file, source } => {
                write!(f, "{} in {}", source, file.display())
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Patch { source, .. } => Some(source),
            ApplicationError::Invalid { .. } => None,
        }
    }
}

/// Where a patch's `file` lives.
///
/// Relative paths resolve against `workspace_root` for workspace-relative
/// plans and against the current directory otherwise. Absolute paths are
/// used as given.
pub fn resolve_file(meta: &Metadata, workspace_root: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    if meta.workspace_relative {
        workspace_root.join(path)
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    }
}

/// Apply every patch in `config`, in file order.
///
/// Returns one `(patch_id, result)` per patch. A failing patch does not stop
/// the ones after it; whether it should is the caller's call.
pub fn apply_plan(
    config: &PatchConfig,
    workspace_root: &Path,
    store: &mut dyn DocumentStore,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    config
        .patches
        .iter()
        .map(|patch| {
            let file = resolve_file(&config.meta, workspace_root, &patch.file);
            (patch.id.clone(), apply_patch(patch, &file, store))
        })
        .collect()
}

/// Evaluate `config` without touching `store`.
///
/// Result semantics mirror [`apply_plan`]: `Applied` means "would apply".
/// Later patches see the simulated output of earlier ones.
pub fn check_plan(
    config: &PatchConfig,
    workspace_root: &Path,
    store: &dyn DocumentStore,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    let mut overlay = OverlayStore::new(store);
    apply_plan(config, workspace_root, &mut overlay)
}

fn apply_patch(
    patch: &PatchDefinition,
    file: &Path,
    store: &mut dyn DocumentStore,
) -> Result<PatchResult, ApplicationError> {
    let plan = patch
        .to_plan()
        .map_err(|issue| ApplicationError::Invalid { issue })?;

    let wrap = |source: PatchError| ApplicationError::Patch {
        file: file.to_path_buf(),
        source,
    };

    let original = store.read(file).map_err(|e| wrap(e.into()))?;

    match plan.apply(&original) {
        Ok(patched) if patched == original => {
            debug!(patch = %patch.id, file = %file.display(), "region already holds payload");
            Ok(PatchResult::AlreadyApplied {
                file: file.to_path_buf(),
            })
        }
        Ok(patched) => {
            store.write(file, &patched).map_err(|e| wrap(e.into()))?;
            info!(patch = %patch.id, file = %file.display(), "applied");
            Ok(PatchResult::Applied {
                file: file.to_path_buf(),
            })
        }
        Err(e) if e.is_missing_start() && payload_present(&original, plan.payload_text()) => {
            debug!(
                patch = %patch.id,
                file = %file.display(),
                "start anchor gone and payload present"
            );
            Ok(PatchResult::AlreadyApplied {
                file: file.to_path_buf(),
            })
        }
        Err(e) => {
            warn!(patch = %patch.id, file = %file.display(), error = %e, "patch failed");
            Err(wrap(e))
        }
    }
}

fn payload_present(document: &Document, payload: &str) -> bool {
    !payload.trim().is_empty() && document.as_str().contains(payload)
}
