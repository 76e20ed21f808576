//! Document types for the normalization stage.
//!
//! A [`Document`] is the raw Markdown submitted by a caller. It is consumed by
//! [`normalize()`](crate::normalize), which produces a [`NormalizedText`]: the
//! plain text handed to the rule engine plus the segment table that maps every
//! plain-text byte back to the source.
//!
//! ```rust
//! use normalize::{normalize, Document, NormalizeConfig};
//!
//! let doc = Document::new("Some *emphasis* here.", "en");
//! let plain = normalize(&doc, &NormalizeConfig::default()).unwrap();
//!
//! assert_eq!(plain.as_str(), "Some emphasis here.");
//! let span = plain.map_span(5, 8);
//! assert_eq!(&doc.text()[span.range()], "emphasis");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MalformedInput;
use crate::hash::Fingerprint;
use crate::mapping::{Segment, SourceSpan};

/// Raw Markdown text tagged with its language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    text: String,
    language: String,
}

impl Document {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Plain text extracted from a [`Document`] together with its position map.
///
/// # Invariant
///
/// `segments` are sorted by `plain_start`, do not overlap, and together cover
/// `0..text.len()` without gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub(crate) text: String,
    pub(crate) language: String,
    pub(crate) version: u32,
    pub(crate) segments: Vec<Segment>,
    pub(crate) diagnostics: Vec<MalformedInput>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Normalization version that produced this text.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Structural problems that were recovered from while normalizing.
    pub fn diagnostics(&self) -> &[MalformedInput] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Fingerprint of this text, scoped by an arbitrary caller digest.
    pub fn fingerprint(&self, scope: &[u8]) -> Fingerprint {
        Fingerprint::compute(self.version, &self.language, &self.text, scope)
    }

    /// Translate a plain-text byte span into a source byte span.
    ///
    /// Uses a binary search over the segment table. Offsets inside replaced
    /// segments (entities, escapes, separators) widen to the whole source
    /// range of that segment.
    pub fn map_span(&self, plain_start: usize, plain_len: usize) -> SourceSpan {
        let start = self.map_start(plain_start);
        if plain_len == 0 {
            return SourceSpan { start, length: 0 };
        }
        let end = self.map_end(plain_start.saturating_add(plain_len));
        SourceSpan {
            start,
            length: end.saturating_sub(start),
        }
    }

    fn map_start(&self, plain: usize) -> usize {
        let idx = self.segments.partition_point(|seg| seg.plain_end() <= plain);
        match self.segments.get(idx) {
            Some(seg) if seg.is_verbatim() => {
                seg.source_start + plain.saturating_sub(seg.plain_start)
            }
            Some(seg) => seg.source_start,
            None => self.segments.last().map_or(0, Segment::source_end),
        }
    }

    fn map_end(&self, plain_end: usize) -> usize {
        let idx = self
            .segments
            .partition_point(|seg| seg.plain_end() < plain_end);
        match self.segments.get(idx) {
            Some(seg) if seg.is_verbatim() => {
                seg.source_start + plain_end.saturating_sub(seg.plain_start)
            }
            Some(seg) => seg.source_end(),
            None => self.segments.last().map_or(0, Segment::source_end),
        }
    }
}

/// Accepts `alpha{2,8}(-alnum{1,8})*`, e.g. `en`, `en-US`, `de-CH-1996`.
pub(crate) fn is_valid_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let Some(primary) = parts.next() else {
        return false;
    };
    if !(2..=8).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    parts.all(|sub| (1..=8).contains(&sub.len()) && sub.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tags() {
        assert!(is_valid_language_tag("en"));
        assert!(is_valid_language_tag("en-US"));
        assert!(is_valid_language_tag("de-CH-1996"));
        assert!(!is_valid_language_tag(""));
        assert!(!is_valid_language_tag("e"));
        assert!(!is_valid_language_tag("en_US"));
        assert!(!is_valid_language_tag("en-"));
        assert!(!is_valid_language_tag("english language"));
    }
}
