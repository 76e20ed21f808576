use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a segment's plain bytes relate to its source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Plain bytes are a byte-for-byte copy of the source range.
    Verbatim,
    /// Plain bytes stand in for the source range (entity, escape, separator).
    Replaced,
}

/// One entry of the plain-text to source-text position map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub plain_start: usize,
    pub plain_len: usize,
    pub source_start: usize,
    pub source_len: usize,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn plain_end(&self) -> usize {
        self.plain_start + self.plain_len
    }

    pub fn source_end(&self) -> usize {
        self.source_start + self.source_len
    }

    pub fn is_verbatim(&self) -> bool {
        self.kind == SegmentKind::Verbatim
    }
}

/// A byte span in the original Markdown source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub length: usize,
}

impl SourceSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.length
    }
}

/// Resolves source byte offsets to 1-based line and column numbers.
///
/// Columns count characters, not bytes, so a finding after a multi-byte
/// character still reports the column a reader would count.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = Vec::with_capacity(source.len() / 32 + 1);
        line_starts.push(0);
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    /// Returns `(line, column)`, both 1-based. Offsets past the end clamp to
    /// the end of the source.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.source[line_start..offset].chars().count() + 1;
        (line, column)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_basic() {
        let index = LineIndex::new("# Hello\n\nThiss is a test.");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(2), (1, 3));
        assert_eq!(index.line_col(9), (3, 1));
        assert_eq!(index.line_col(15), (3, 7));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn line_col_counts_chars() {
        let index = LineIndex::new("caf\u{e9} bar");
        // "é" is two bytes; "bar" starts at byte 6 but column 6.
        assert_eq!(index.line_col(6), (1, 6));
    }

    #[test]
    fn line_col_clamps_and_snaps() {
        let src = "a\u{e9}";
        let index = LineIndex::new(src);
        assert_eq!(index.line_col(100), (1, 3));
        // Offset 2 is inside the two-byte "é"; snaps back to its start.
        assert_eq!(index.line_col(2), (1, 2));
    }

    #[test]
    fn segment_ends() {
        let seg = Segment {
            plain_start: 3,
            plain_len: 2,
            source_start: 10,
            source_len: 5,
            kind: SegmentKind::Replaced,
        };
        assert_eq!(seg.plain_end(), 5);
        assert_eq!(seg.source_end(), 15);
        assert!(!seg.is_verbatim());
    }
}
