use std::fmt;
use std::ops::Range;

/// Immutable snapshot of a text document.
///
/// A `Document` is never edited in place: every substitution produces a new
/// one. Where the text came from (a path, a store key) is the caller's
/// business, not the document's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Document {
    text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text covered by `region`.
    ///
    /// Regions handed out by the locator always lie on char boundaries of the
    /// document they were resolved against, so this never splits a code point
    /// for them. Returns `None` for a region that does not fit this document.
    pub fn slice(&self, region: Region) -> Option<&str> {
        self.text.get(region.range())
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl AsRef<str> for Document {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Half-open byte range `[start, end)` within one specific document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    start: usize,
    end: usize,
}

impl Region {
    /// Build a region from raw offsets.
    ///
    /// `start > end` is representable on purpose: the verifier is the one that
    /// reports a degenerate region, with both offsets in the error.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes covered; zero for empty or inverted regions.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
