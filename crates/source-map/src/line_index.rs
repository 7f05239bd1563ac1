//! Line index for offset ↔ line/column conversion.

use crate::ByteOffset;
use text_size::TextSize;

/// A line and column position (0-indexed, column in bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineCol {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed byte offset within the line.
    pub col: u32,
}

impl LineCol {
    /// Creates a new line/column position.
    #[inline]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// An index of line start offsets, for O(log n) offset ↔ line/column
/// conversion when rendering diagnostic positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<ByteOffset>,
}

impl LineIndex {
    /// Builds a line index from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        line_starts.extend(
            text.match_indices('\n')
                .map(|(offset, _)| TextSize::from(offset as u32 + 1)),
        );
        Self { line_starts }
    }

    /// Returns the number of lines in the source.
    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a byte offset to a line/column position.
    pub fn line_col(&self, offset: ByteOffset) -> LineCol {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        LineCol {
            line: line as u32,
            col: u32::from(offset) - u32::from(self.line_starts[line]),
        }
    }

    /// Converts a line/column position back to a byte offset.
    ///
    /// Returns `None` if the line is out of bounds.
    pub fn offset(&self, line_col: LineCol) -> Option<ByteOffset> {
        let start = self.line_starts.get(line_col.line as usize)?;
        Some(*start + TextSize::from(line_col.col))
    }

    /// Returns the byte offset where a line starts.
    pub fn line_start(&self, line: u32) -> Option<ByteOffset> {
        self.line_starts.get(line as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let index = LineIndex::new("hello world");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line_col(TextSize::from(5)), LineCol::new(0, 5));
    }

    #[test]
    fn test_multiple_lines() {
        let index = LineIndex::new("hello\nworld\nfoo");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(6)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(10)), LineCol::new(1, 4));
        assert_eq!(index.line_col(TextSize::from(12)), LineCol::new(2, 0));
    }

    #[test]
    fn test_offset_roundtrip() {
        let text = "hello\nworld\nfoo";
        let index = LineIndex::new(text);
        for offset in 0..text.len() {
            let offset = TextSize::from(offset as u32);
            let back = index.offset(index.line_col(offset)).unwrap();
            assert_eq!(offset, back);
        }
    }
}
