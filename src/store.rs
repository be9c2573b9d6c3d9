//! Document stores: where documents are read from and written back to.
//!
//! The substitution core never touches storage. Callers hold the
//! read/transform/write sequence and only write after a successful outcome.

use crate::document::Document;
use crate::error::PatchError;
use crate::plan::ReplacementPlan;
use crate::safety::{SafetyError, WorkspaceGuard};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {}", key.display())]
    NotFound { key: PathBuf },

    #[error("I/O error on {}: {source}", key.display())]
    Io {
        key: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("document is not valid UTF-8: {}", key.display())]
    NotUtf8 { key: PathBuf },

    #[error(transparent)]
    Safety(SafetyError),
}

impl StoreError {
    fn from_io(key: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                key: key.to_path_buf(),
            }
        } else {
            StoreError::Io {
                key: key.to_path_buf(),
                source,
            }
        }
    }

    fn from_safety(key: &Path, error: SafetyError) -> Self {
        match error {
            SafetyError::Canonicalize(source) => StoreError::from_io(key, source),
            other => StoreError::Safety(other),
        }
    }
}

/// Read-whole / write-whole access to documents by key.
pub trait DocumentStore {
    fn read(&self, key: &Path) -> Result<Document, StoreError>;

    fn write(&mut self, key: &Path, document: &Document) -> Result<(), StoreError>;
}

/// Filesystem-backed store with optional workspace confinement.
#[derive(Debug, Clone, Default)]
pub struct FsStore {
    guard: Option<WorkspaceGuard>,
}

impl FsStore {
    /// A store that accepts any path.
    pub fn new() -> Self {
        Self { guard: None }
    }

    /// A store that refuses paths outside `guard`'s workspace.
    pub fn guarded(guard: WorkspaceGuard) -> Self {
        Self { guard: Some(guard) }
    }

    fn resolve(&self, key: &Path) -> Result<PathBuf, StoreError> {
        match &self.guard {
            Some(guard) => guard
                .validate_path(key)
                .map_err(|e| StoreError::from_safety(key, e)),
            None => Ok(key.to_path_buf()),
        }
    }
}

impl DocumentStore for FsStore {
    fn read(&self, key: &Path) -> Result<Document, StoreError> {
        let path = self.resolve(key)?;
        let bytes = fs::read(&path).map_err(|e| StoreError::from_io(key, e))?;
        let text = String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8 {
            key: key.to_path_buf(),
        })?;
        debug!(path = %path.display(), bytes = text.len(), "read document");
        Ok(Document::from(text))
    }

    fn write(&mut self, key: &Path, document: &Document) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        // Close the window between validation and write.
        let path = match &self.guard {
            Some(guard) => guard
                .revalidate(&path)
                .map_err(|e| StoreError::from_safety(key, e))?,
            None => path,
        };

        atomic_write(&path, document.as_str().as_bytes())
            .map_err(|e| StoreError::from_io(key, e))?;

        // Bump mtime so watchers and incremental builds notice the change
        filetime::set_file_mtime(&path, filetime::FileTime::now())
            .map_err(|e| StoreError::from_io(key, e))?;

        debug!(path = %path.display(), bytes = document.len(), "wrote document");
        Ok(())
    }
}

/// In-memory store keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: HashMap<PathBuf, Document>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<PathBuf>, document: impl Into<Document>) {
        self.documents.insert(key.into(), document.into());
    }

    pub fn get(&self, key: &Path) -> Option<&Document> {
        self.documents.get(key)
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, key: &Path) -> Result<Document, StoreError> {
        self.documents
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_path_buf(),
            })
    }

    fn write(&mut self, key: &Path, document: &Document) -> Result<(), StoreError> {
        self.documents.insert(key.to_path_buf(), document.clone());
        self.writes += 1;
        Ok(())
    }
}

/// Reads through to a backing store; writes stay in memory.
///
/// Used for dry runs and status checks so that a sequence of patches sees
/// its own earlier results without the workspace ever being modified.
pub struct OverlayStore<'a> {
    base: &'a dyn DocumentStore,
    pending: MemoryStore,
}

impl<'a> OverlayStore<'a> {
    pub fn new(base: &'a dyn DocumentStore) -> Self {
        Self {
            base,
            pending: MemoryStore::new(),
        }
    }

    /// Documents that would have been written, by key.
    pub fn pending(&self, key: &Path) -> Option<&Document> {
        self.pending.get(key)
    }
}

impl DocumentStore for OverlayStore<'_> {
    fn read(&self, key: &Path) -> Result<Document, StoreError> {
        match self.pending.get(key) {
            Some(document) => Ok(document.clone()),
            None => self.base.read(key),
        }
    }

    fn write(&mut self, key: &Path, document: &Document) -> Result<(), StoreError> {
        self.pending.write(key, document)
    }
}

/// Read `key`, apply `plan`, and write the result back.
///
/// Nothing is written when the plan fails or leaves the document unchanged.
/// Returns whether a write happened.
pub fn patch_document(
    store: &mut dyn DocumentStore,
    key: &Path,
    plan: &ReplacementPlan,
) -> Result<bool, PatchError> {
    let original = store.read(key)?;
    let patched = plan.apply(&original)?;

    if patched == original {
        return Ok(false);
    }

    store.write(key, &patched)?;
    Ok(true)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the target is left as it was.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
