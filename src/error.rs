use crate::anchor::AnchorSide;
use crate::store::StoreError;
use thiserror::Error;

/// Why a replacement could not be applied.
///
/// The core only classifies. Whether a failure aborts a batch or is read as
/// "already applied" is decided by the caller.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("{which} anchor not found")]
    AnchorNotFound { which: AnchorSide },

    #[error("degenerate region [{start}, {end}): end anchor does not follow start anchor")]
    DegenerateRegion { start: usize, end: usize },

    #[error("{which} anchor is ambiguous ({count} candidates, expected 1)")]
    AmbiguousAnchor { which: AnchorSide, count: usize },

    #[error("region [{start}, {end}) does not match the expected text (expected {expected}, found {found:?})")]
    RegionMismatch {
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid region [{start}, {end}) in document of length {len}")]
    InvalidRegion { start: usize, end: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PatchError {
    /// True for the "start anchor is gone" failure that re-running a plan on
    /// its own output produces.
    pub fn is_missing_start(&self) -> bool {
        matches!(
            self,
            PatchError::AnchorNotFound {
                which: AnchorSide::Start
            }
        )
    }
}
