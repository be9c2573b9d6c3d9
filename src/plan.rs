//! Replacement plans: anchors plus payload, applied as one pure function.

use crate::anchor::Anchor;
use crate::document::Document;
use crate::edit::Edit;
use crate::error::PatchError;
use crate::locate::{locate_between, locate_span, EndBoundary, Resolution};
use crate::verify::{RegionCheck, Verifier};

/// How the region to replace is found.
#[derive(Debug, Clone)]
pub enum Target {
    /// From the start anchor up to (or through) the end anchor.
    Between {
        start: Anchor,
        end: Anchor,
        boundary: EndBoundary,
    },
    /// The anchor's whole match is the region.
    Span(Anchor),
}

impl Target {
    /// The anchor whose uniqueness strict mode enforces.
    pub fn start_anchor(&self) -> &Anchor {
        match self {
            Target::Between { start, .. } => start,
            Target::Span(anchor) => anchor,
        }
    }
}

/// Anchors, payload and checks for one substitution.
///
/// A plan holds no document: it is resolved against whichever document it is
/// applied to, and the same plan applied to the same document always yields
/// the same outcome.
#[derive(Debug, Clone)]
#[must_use = "a ReplacementPlan does nothing until apply() is called"]
pub struct ReplacementPlan {
    target: Target,
    payload: String,
    strict: bool,
    expect: Option<RegionCheck>,
}

impl ReplacementPlan {
    /// Replace from `start` up to (not including) `end`.
    pub fn between(start: Anchor, end: Anchor) -> Self {
        Self::new(Target::Between {
            start,
            end,
            boundary: EndBoundary::Exclusive,
        })
    }

    /// Replace the whole match of `anchor`.
    pub fn span(anchor: Anchor) -> Self {
        Self::new(Target::Span(anchor))
    }

    pub fn new(target: Target) -> Self {
        Self {
            target,
            payload: String::new(),
            strict: false,
            expect: None,
        }
    }

    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Require the start anchor to occur exactly once in the document.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the end boundary. Has no effect on span targets.
    pub fn end_boundary(mut self, boundary: EndBoundary) -> Self {
        if let Target::Between { boundary: b, .. } = &mut self.target {
            *b = boundary;
        }
        self
    }

    /// Require the region to match `check` before it is replaced.
    pub fn expect(mut self, check: RegionCheck) -> Self {
        self.expect = Some(check);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn payload_text(&self) -> &str {
        &self.payload
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolve and verify the region without substituting.
    pub fn locate(&self, document: &Document) -> Result<Resolution, PatchError> {
        let resolution = match &self.target {
            Target::Between {
                start,
                end,
                boundary,
            } => locate_between(document, start, end, *boundary)?,
            Target::Span(anchor) => locate_span(document, anchor)?,
        };

        Verifier::new(self.target.start_anchor(), self.strict)
            .with_expectation(self.expect.as_ref())
            .check(document, &resolution)?;

        Ok(resolution)
    }

    /// The edit this plan would perform on `document`.
    pub fn edit_for(&self, document: &Document) -> Result<Edit, PatchError> {
        let resolution = self.locate(document)?;
        Ok(Edit::new(resolution.region, self.payload.clone()))
    }

    /// Locate, verify and substitute. `document` is only borrowed, so it is
    /// still the caller's, unchanged, on every failure path.
    pub fn apply(&self, document: &Document) -> Result<Document, PatchError> {
        self.edit_for(document)?.apply_to(document)
    }
}

/// Replace the region between `start_anchor` and `end_anchor` with `payload`.
///
/// The start anchor's text is part of the region; the end anchor's is not.
/// With `strict` set, a second occurrence of the start anchor anywhere in the
/// document is an [`PatchError::AmbiguousAnchor`] failure.
///
/// ```
/// use anchor_patch::{apply, Anchor, Document};
///
/// let doc = Document::from("A\nSTART\nold\nEND\nB");
/// let out = apply(
///     &doc,
///     &Anchor::literal("START"),
///     &Anchor::literal("END"),
///     "START\nnew\n",
///     false,
/// )
/// .unwrap();
/// assert_eq!(out.as_str(), "A\nSTART\nnew\nEND\nB");
/// ```
pub fn apply(
    document: &Document,
    start_anchor: &Anchor,
    end_anchor: &Anchor,
    payload: &str,
    strict: bool,
) -> Result<Document, PatchError> {
    let resolution = locate_between(document, start_anchor, end_anchor, EndBoundary::Exclusive)?;
    Verifier::new(start_anchor, strict).check(document, &resolution)?;
    Edit::new(resolution.region, payload).apply_to(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorSide, MatchPolicy};

    #[test]
    fn test_scenario_exclusive() {
        let doc = Document::from("A\nSTART\nold\nEND\nB");
        let out = apply(
            &doc,
            &Anchor::literal("START"),
            &Anchor::literal("END"),
            "STARTnewEND",
            false,
        )
        .unwrap();
        assert_eq!(out.as_str(), "A\nSTARTnewENDEND\nB");
    }

    #[test]
    fn test_scenario_inclusive() {
        let doc = Document::from("A\nSTART\nold\nEND\nB");
        let plan = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"))
            .end_boundary(EndBoundary::Inclusive)
            .payload("STARTnewEND");
        assert_eq!(plan.apply(&doc).unwrap().as_str(), "A\nSTARTnewEND\nB");
    }

    #[test]
    fn test_rerun_reports_missing_start() {
        let doc = Document::from("x\nfunction populateLanguageOptions() {\n  old();\n}\n\nfunction persistRegionAndLanguage() {}\n");
        let plan = ReplacementPlan::between(
            Anchor::literal("function populateLanguageOptions() {"),
            Anchor::literal("function persistRegionAndLanguage()"),
        )
        .payload("function populateLanguageOptions(select) {\n  fresh();\n}\n\n");

        let once = plan.apply(&doc).unwrap();
        let err = plan.apply(&once).unwrap_err();
        assert!(err.is_missing_start());
    }

    #[test]
    fn test_rerun_with_anchor_in_payload_is_stable() {
        let doc = Document::from("head\nSTART\nold\nEND\ntail");
        let plan = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"))
            .payload("START\nnew\n");
        let once = plan.apply(&doc).unwrap();
        let twice = plan.apply(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ambiguous_strict_vs_lenient() {
        let doc = Document::from("START one END\nSTART two END\n");
        let lenient = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"))
            .payload("X ");
        assert_eq!(
            lenient.apply(&doc).unwrap().as_str(),
            "X END\nSTART two END\n"
        );

        let err = lenient.clone().strict(true).apply(&doc).unwrap_err();
        assert!(matches!(
            err,
            PatchError::AmbiguousAnchor {
                which: AnchorSide::Start,
                count: 2
            }
        ));
    }

    #[test]
    fn test_degenerate_when_end_precedes_content() {
        let doc = Document::from("STARTEND");
        let err = apply(
            &doc,
            &Anchor::literal("START"),
            &Anchor::literal("START"),
            "x",
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::DegenerateRegion { start: 0, end: 0 }));
    }

    #[test]
    fn test_span_plan_reinserts_closing_text() {
        let doc = Document::from(
            "function renderExportHistory() {\n  old();\n}\n\nfunction formatTimestamp() {}\n",
        );
        let plan = ReplacementPlan::span(
            Anchor::pattern_with(
                r"function renderExportHistory\(\)[\s\S]*?\n\nfunction formatTimestamp",
                MatchPolicy::Only,
            )
            .unwrap(),
        )
        .payload("function renderExportHistory() {\n  fresh();\n}\n\nfunction formatTimestamp");
        let out = plan.apply(&doc).unwrap();
        assert_eq!(
            out.as_str(),
            "function renderExportHistory() {\n  fresh();\n}\n\nfunction formatTimestamp() {}\n"
        );
    }

    #[test]
    fn test_empty_span_match_is_degenerate() {
        let doc = Document::from("abc");
        let plan = ReplacementPlan::span(Anchor::pattern("x*").unwrap()).payload("y");
        assert!(matches!(
            plan.apply(&doc).unwrap_err(),
            PatchError::DegenerateRegion { .. }
        ));
    }

    #[test]
    fn test_expectation_guards_drift() {
        let doc = Document::from("START drifted END");
        let plan = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"))
            .payload("START new ")
            .expect(RegionCheck::ExactMatch("START old ".to_string()));
        assert!(matches!(
            plan.apply(&doc).unwrap_err(),
            PatchError::RegionMismatch { .. }
        ));
    }

    #[test]
    fn test_locate_returns_region_without_substituting() {
        let doc = Document::from("A\nSTART\nold\nEND\nB");
        let plan = ReplacementPlan::between(Anchor::literal("START"), Anchor::literal("END"));
        let res = plan.locate(&doc).unwrap();
        assert_eq!(res.region.range(), 2..12);
    }
}
