//! Region resolution: turn anchors into byte offsets within a document.
//!
//! The locator is a pure scan. It never decides whether a match is
//! trustworthy; that is the verifier's job.

use crate::anchor::{Anchor, AnchorSide};
use crate::document::{Document, Region};
use crate::error::PatchError;
use std::ops::Range;
use tracing::debug;

/// Whether the end anchor's own text belongs to the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndBoundary {
    /// The region stops where the end anchor begins; the anchor survives in
    /// the suffix.
    #[default]
    Exclusive,
    /// The region runs through the end of the end anchor's match.
    Inclusive,
}

/// A resolved region plus the start anchor match it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub region: Region,
    /// Byte range of the start anchor match (the whole match for span
    /// targets).
    pub start_match: Range<usize>,
}

/// Resolve a start/end anchor pair.
///
/// The start anchor is the first occurrence in the document and is part of
/// the region. The end anchor is the first occurrence at or after the
/// offset where the start anchor was found, so the two may overlap.
pub fn locate_between(
    document: &Document,
    start: &Anchor,
    end: &Anchor,
    boundary: EndBoundary,
) -> Result<Resolution, PatchError> {
    let text = document.as_str();

    let start_match = start
        .find_at(text, 0)
        .ok_or(PatchError::AnchorNotFound {
            which: AnchorSide::Start,
        })?;

    let end_match = end
        .find_at(text, start_match.start)
        .ok_or(PatchError::AnchorNotFound {
            which: AnchorSide::End,
        })?;

    let region_end = match boundary {
        EndBoundary::Exclusive => end_match.start,
        EndBoundary::Inclusive => end_match.end,
    };

    let region = Region::new(start_match.start, region_end);
    debug!(
        start_anchor = %start,
        end_anchor = %end,
        %region,
        "resolved anchor pair"
    );

    Ok(Resolution {
        region,
        start_match,
    })
}

/// Resolve a single anchor whose first match is the whole region.
pub fn locate_span(document: &Document, anchor: &Anchor) -> Result<Resolution, PatchError> {
    let found = anchor
        .find_at(document.as_str(), 0)
        .ok_or(PatchError::AnchorNotFound {
            which: AnchorSide::Start,
        })?;

    let region = Region::new(found.start, found.end);
    debug!(anchor = %anchor, %region, "resolved span");

    Ok(Resolution {
        region,
        start_match: found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from("A\nSTART\nold\nEND\nB")
    }

    #[test]
    fn test_exclusive_end_keeps_anchor_out_of_region() {
        let res = locate_between(
            &doc(),
            &Anchor::literal("START"),
            &Anchor::literal("END"),
            EndBoundary::Exclusive,
        )
        .unwrap();
        assert_eq!(res.region, Region::new(2, 12));
        assert_eq!(res.start_match, 2..7);
    }

    #[test]
    fn test_inclusive_end_consumes_anchor() {
        let res = locate_between(
            &doc(),
            &Anchor::literal("START"),
            &Anchor::literal("END"),
            EndBoundary::Inclusive,
        )
        .unwrap();
        assert_eq!(res.region, Region::new(2, 15));
    }

    #[test]
    fn test_end_anchor_before_start_is_ignored() {
        let doc = Document::from("END\nSTART\nbody\nEND\n");
        let res = locate_between(
            &doc,
            &Anchor::literal("START"),
            &Anchor::literal("END"),
            EndBoundary::Exclusive,
        )
        .unwrap();
        assert_eq!(res.region, Region::new(4, 15));
    }

    #[test]
    fn test_first_end_after_start_wins() {
        let doc = Document::from("START a END b END");
        let res = locate_between(
            &doc,
            &Anchor::literal("START"),
            &Anchor::literal("END"),
            EndBoundary::Exclusive,
        )
        .unwrap();
        assert_eq!(res.region, Region::new(0, 8));
    }

    #[test]
    fn test_end_search_starts_at_start_anchor() {
        // The end anchor is a prefix of the start anchor, so it is found at
        // the same offset and yields an empty region.
        let doc = Document::from("x function populate() {} function persist()");
        let res = locate_between(
            &doc,
            &Anchor::literal("function populate"),
            &Anchor::literal("function"),
            EndBoundary::Exclusive,
        )
        .unwrap();
        assert_eq!(res.region, Region::new(2, 2));
    }

    #[test]
    fn test_missing_start() {
        let err = locate_between(
            &doc(),
            &Anchor::literal("BEGIN"),
            &Anchor::literal("END"),
            EndBoundary::Exclusive,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PatchError::AnchorNotFound {
                which: AnchorSide::Start
            }
        ));
    }

    #[test]
    fn test_missing_end() {
        let err = locate_between(
            &doc(),
            &Anchor::literal("START"),
            &Anchor::literal("FINISH"),
            EndBoundary::Exclusive,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PatchError::AnchorNotFound {
                which: AnchorSide::End
            }
        ));
    }

    #[test]
    fn test_pattern_anchors() {
        let doc = Document::from("const a = 1;\n  const hudSummary = 'x';\n\n  return (\n");
        let res = locate_between(
            &doc,
            &Anchor::pattern(r"\s+const hudSummary").unwrap(),
            &Anchor::pattern(r"return \(").unwrap(),
            EndBoundary::Exclusive,
        )
        .unwrap();
        assert_eq!(doc.slice(res.region), Some("\n  const hudSummary = 'x';\n\n  "));
    }

    #[test]
    fn test_span_lazy_pattern() {
        let doc = Document::from(
            "function renderExportHistory() {\n  old();\n}\n\nfunction formatTimestamp() {}\n",
        );
        let anchor =
            Anchor::pattern(r"function renderExportHistory\(\)[\s\S]*?\n\nfunction formatTimestamp")
                .unwrap();
        let res = locate_span(&doc, &anchor).unwrap();
        assert_eq!(res.region.start(), 0);
        assert_eq!(
            doc.slice(res.region),
            Some("function renderExportHistory() {\n  old();\n}\n\nfunction formatTimestamp")
        );
    }

    #[test]
    fn test_span_not_found() {
        let err = locate_span(&doc(), &Anchor::literal("nope")).unwrap_err();
        assert!(err.is_missing_start());
    }
}
