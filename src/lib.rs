//! Anchor Patch: anchor-based text block substitution
//!
//! Replaces the region of a document bounded by two anchors (literal text or
//! regular expressions) with a new block, and fails loudly when the anchors
//! cannot be located unambiguously.
//!
//! # Architecture
//!
//! A linear pipeline over an in-memory [`Document`]:
//!
//! 1. [`locate`] resolves anchors into a [`Region`].
//! 2. [`verify`] rejects degenerate regions, ambiguous start anchors (strict
//!    mode) and drifted region content.
//! 3. [`Edit`] assembles `prefix + payload + suffix` into a new document.
//!
//! Reading and writing documents is the job of a [`DocumentStore`]; the core
//! never performs I/O. Plan files ([`config`]) describe patches as data.
//!
//! # Example
//!
//! ```
//! use anchor_patch::{Anchor, Document, ReplacementPlan};
//!
//! let doc = Document::from("A\nSTART\nold\nEND\nB");
//! let plan = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"))
//!     .payload("START\nnew\n")
//!     .strict(true);
//!
//! let patched = plan.apply(&doc).unwrap();
//! assert_eq!(patched.as_str(), "A\nSTART\nnew\nEND\nB");
//! ```

pub mod anchor;
pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod locate;
pub mod logging;
pub mod plan;
pub mod safety;
pub mod store;
pub mod verify;

// Re-exports
pub use anchor::{Anchor, AnchorSide, MatchPolicy};
pub use config::{
    apply_plan, check_plan, load_from_path, load_from_str, ApplicationError, ConfigError,
    PatchConfig, PatchResult,
};
pub use document::{Document, Region};
pub use edit::Edit;
pub use error::PatchError;
pub use locate::{EndBoundary, Resolution};
pub use plan::{apply, ReplacementPlan, Target};
pub use safety::{SafetyError, WorkspaceGuard};
pub use store::{patch_document, DocumentStore, FsStore, MemoryStore, OverlayStore, StoreError};
pub use verify::{RegionCheck, Verifier};
