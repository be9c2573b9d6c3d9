//! Anchors: the text or patterns that mark where a region begins and ends.
//!
//! An anchor never owns offsets. It is resolved against a specific
//! [`Document`](crate::Document) each time it is used.

use regex::Regex;
use std::fmt;
use std::ops::Range;

/// Which side of the region an anchor bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorSide {
    Start,
    End,
}

impl fmt::Display for AnchorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorSide::Start => f.write_str("start"),
            AnchorSide::End => f.write_str("end"),
        }
    }
}

/// Selection policy for pattern anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// The first match wins.
    #[default]
    First,
    /// Exactly one match must exist; a second one is an ambiguity error
    /// whether or not the plan runs in strict mode.
    Only,
}

/// A boundary marker located by exact text or by regular expression.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// Text found verbatim.
    Literal(String),
    /// Regular expression with a selection policy.
    Pattern { regex: Regex, policy: MatchPolicy },
}

impl Anchor {
    pub fn literal(text: impl Into<String>) -> Self {
        Anchor::Literal(text.into())
    }

    /// Compile a pattern anchor using the `First` policy.
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Self::pattern_with(source, MatchPolicy::First)
    }

    pub fn pattern_with(source: &str, policy: MatchPolicy) -> Result<Self, regex::Error> {
        Ok(Anchor::Pattern {
            regex: Regex::new(source)?,
            policy,
        })
    }

    pub fn policy(&self) -> MatchPolicy {
        match self {
            Anchor::Literal(_) => MatchPolicy::First,
            Anchor::Pattern { policy, .. } => *policy,
        }
    }

    /// Byte range of the first match starting at or after `from`.
    ///
    /// `from` must sit on a char boundary of `haystack`; offsets produced by
    /// earlier matches always do.
    pub fn find_at(&self, haystack: &str, from: usize) -> Option<Range<usize>> {
        if from > haystack.len() {
            return None;
        }
        match self {
            Anchor::Literal(text) => haystack
                .get(from..)?
                .find(text.as_str())
                .map(|offset| from + offset..from + offset + text.len()),
            Anchor::Pattern { regex, .. } => regex.find_at(haystack, from).map(|m| m.range()),
        }
    }

    /// Whether some other candidate exists besides the match at `first`.
    ///
    /// Literal candidates may overlap the first one (`"aa"` occurs twice in
    /// `"aaa"`); pattern candidates follow the regex engine's non-overlapping
    /// iteration.
    pub fn has_second_match(&self, haystack: &str, first: &Range<usize>) -> bool {
        match self {
            Anchor::Literal(_) => {
                let next = next_char_boundary(haystack, first.start);
                self.find_at(haystack, next).is_some()
            }
            Anchor::Pattern { regex, .. } => regex.find_iter(haystack).nth(1).is_some(),
        }
    }

    /// Number of candidate locations in `haystack`, counted the same way as
    /// [`has_second_match`](Self::has_second_match).
    pub fn count(&self, haystack: &str) -> usize {
        match self {
            Anchor::Literal(_) => {
                let mut count = 0;
                let mut from = 0;
                while let Some(found) = self.find_at(haystack, from) {
                    count += 1;
                    if found.start >= haystack.len() {
                        break;
                    }
                    from = next_char_boundary(haystack, found.start);
                }
                count
            }
            Anchor::Pattern { regex, .. } => regex.find_iter(haystack).count(),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Literal(text) => write!(f, "{text:?}"),
            Anchor::Pattern { regex, policy } => match policy {
                MatchPolicy::First => write!(f, "/{}/", regex.as_str()),
                MatchPolicy::Only => write!(f, "/{}/ (only)", regex.as_str()),
            },
        }
    }
}

fn next_char_boundary(text: &str, offset: usize) -> usize {
    text[offset..]
        .chars()
        .next()
        .map_or(offset + 1, |c| offset + c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_find_at() {
        let anchor = Anchor::literal("END");
        let text = "END start END";
        assert_eq!(anchor.find_at(text, 0), Some(0..3));
        assert_eq!(anchor.find_at(text, 1), Some(10..13));
        assert_eq!(anchor.find_at(text, 11), None);
        assert_eq!(anchor.find_at(text, 100), None);
    }

    #[test]
    fn test_pattern_find_at() {
        let anchor = Anchor::pattern(r"function \w+\(\)").unwrap();
        let text = "x\nfunction render() {}\nfunction other() {}";
        assert_eq!(anchor.find_at(text, 0), Some(2..19));
        let second = anchor.find_at(text, 3).unwrap();
        assert_eq!(&text[second], "function other()");
    }

    #[test]
    fn test_overlapping_literal_count() {
        let anchor = Anchor::literal("aa");
        assert_eq!(anchor.count("aaa"), 2);
        assert!(anchor.has_second_match("aaa", &(0..2)));
        assert!(!anchor.has_second_match("aab", &(0..2)));
    }

    #[test]
    fn test_literal_count_multibyte() {
        let anchor = Anchor::literal("é");
        assert_eq!(anchor.count("é-é-é"), 3);
    }

    #[test]
    fn test_pattern_count() {
        let anchor = Anchor::pattern(r"\bfn\b").unwrap();
        assert_eq!(anchor.count("fn a() {}\nfn b() {}\n"), 2);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Anchor::pattern("(unclosed").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Anchor::literal("START").to_string(), "\"START\"");
        let only = Anchor::pattern_with("a+", MatchPolicy::Only).unwrap();
        assert_eq!(only.to_string(), "/a+/ (only)");
    }
}
