//! Pre-substitution checks that keep a drifted document from being patched in
//! the wrong place.

use crate::anchor::{Anchor, AnchorSide, MatchPolicy};
use crate::document::Document;
use crate::error::PatchError;
use crate::locate::Resolution;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Expected content of the region before it is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionCheck {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper to carry for large regions)
    Hash(u64),
}

impl RegionCheck {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            RegionCheck::ExactMatch(expected) => text == expected,
            RegionCheck::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create a check from text, using a hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            RegionCheck::Hash(xxh3_64(text.as_bytes()))
        } else {
            RegionCheck::ExactMatch(text.to_string())
        }
    }

    /// Parse a hex hash literal such as `0x1f2e3d4c5b6a7988`.
    pub fn parse_hash(literal: &str) -> Option<Self> {
        let digits = literal.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        u64::from_str_radix(digits, 16).ok().map(RegionCheck::Hash)
    }

    pub fn hash(&self) -> u64 {
        match self {
            RegionCheck::Hash(h) => *h,
            RegionCheck::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }

    fn describe(&self) -> String {
        match self {
            RegionCheck::ExactMatch(text) => format!("{text:?}"),
            RegionCheck::Hash(h) => format!("xxh3 {h:#018x}"),
        }
    }
}

/// Guards a resolved region before substitution.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    start: &'a Anchor,
    strict: bool,
    expect: Option<&'a RegionCheck>,
}

impl<'a> Verifier<'a> {
    pub fn new(start: &'a Anchor, strict: bool) -> Self {
        Self {
            start,
            strict,
            expect: None,
        }
    }

    pub fn with_expectation(mut self, expect: Option<&'a RegionCheck>) -> Self {
        self.expect = expect;
        self
    }

    /// Run every check in order: non-degenerate region, unique start anchor
    /// (strict mode or `Only` policy), then the expected region content.
    pub fn check(&self, document: &Document, resolution: &Resolution) -> Result<(), PatchError> {
        let region = resolution.region;

        if region.start() >= region.end() {
            return Err(PatchError::DegenerateRegion {
                start: region.start(),
                end: region.end(),
            });
        }

        let require_unique = self.strict || self.start.policy() == MatchPolicy::Only;
        if require_unique
            && self
                .start
                .has_second_match(document.as_str(), &resolution.start_match)
        {
            let count = self.start.count(document.as_str());
            debug!(anchor = %self.start, count, "start anchor is not unique");
            return Err(PatchError::AmbiguousAnchor {
                which: AnchorSide::Start,
                count,
            });
        }

        if let Some(expect) = self.expect {
            // Region offsets come from matches on this document, so the slice
            // is always in bounds and on char boundaries.
            let found = document.slice(region).unwrap_or_default();
            if !expect.matches(found) {
                return Err(PatchError::RegionMismatch {
                    start: region.start(),
                    end: region.end(),
                    expected: expect.describe(),
                    found: found.to_string(),
                });
            }
        }

        Ok(())
    }
}
