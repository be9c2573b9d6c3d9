use crate::document::{Document, Region};
use crate::error::PatchError;

/// The substitution primitive: replace one region of a document.
///
/// Every plan, whatever its anchors, compiles down to a single `Edit`.
/// Intelligence lives in region acquisition, not in application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply_to() is called"]
pub struct Edit {
    /// Region to replace, relative to the document the edit is applied to
    pub region: Region,
    /// Text that takes the region's place
    pub new_text: String,
}

impl Edit {
    pub fn new(region: Region, new_text: impl Into<String>) -> Self {
        Self {
            region,
            new_text: new_text.into(),
        }
    }

    /// Build `prefix + new_text + suffix` as a fresh document.
    ///
    /// Everything outside the region is copied byte for byte; `document`
    /// itself is left untouched.
    pub fn apply_to(&self, document: &Document) -> Result<Document, PatchError> {
        let text = document.as_str();
        let (start, end) = (self.region.start(), self.region.end());

        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            return Err(PatchError::InvalidRegion {
                start,
                end,
                len: text.len(),
            });
        }

        let mut new_text = String::with_capacity(text.len() - (end - start) + self.new_text.len());
        new_text.push_str(&text[..start]);
        new_text.push_str(&self.new_text);
        new_text.push_str(&text[end..]);

        Ok(Document::from(new_text))
    }

    /// Whether applying this edit would leave `document` unchanged.
    pub fn is_noop_for(&self, document: &Document) -> bool {
        document.slice(self.region) == Some(self.new_text.as_str())
    }
}
