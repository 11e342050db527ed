//! Line/column tracking for source text, grounded on the teacher crate's
//! `Position`/`Code` (`obtain_position` via a binary search over cached
//! line-break offsets) — reused both for diagnosing grammar-file errors and,
//! via `pegc_runtime`, for the character-stream tokenizer's own positions.

use std::fmt::{Display, Formatter};
use std::cell::OnceCell;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source held as UTF-8 bytes, plus a lazily-computed index of line-break
/// offsets used to translate a byte pointer into a [`Position`].
pub struct Source<'c> {
    pub value: &'c str,
    line_breaks: OnceCell<Vec<usize>>,
}

impl<'c> From<&'c str> for Source<'c> {
    fn from(value: &'c str) -> Self {
        Source::new(value)
    }
}

impl<'c> Source<'c> {
    pub fn new(value: &'c str) -> Self {
        Self {
            value,
            line_breaks: OnceCell::new(),
        }
    }

    fn line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.value
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
                .collect()
        })
    }

    /// The line/column of a byte offset into `self.value`. Columns are
    /// 1-based and count bytes since the previous line break, matching the
    /// teacher's `Code::obtain_position`.
    pub fn position_at(&self, offset: usize) -> Position {
        let breaks = self.line_breaks();
        let line_index = match breaks.binary_search(&offset) {
            Ok(i) | Err(i) => i,
        };
        if line_index == 0 {
            Position::new(1, offset + 1)
        } else {
            let line_start = breaks[line_index - 1] + 1;
            Position::new(line_index + 1, offset - line_start + 1)
        }
    }

    /// The full text of the line containing `offset`, used to build
    /// `(message, filename, line, column, line-text)` syntax errors (spec
    /// §4.6 "Error reporting").
    pub fn line_text_at(&self, offset: usize) -> &'c str {
        let breaks = self.line_breaks();
        let line_index = match breaks.binary_search(&offset) {
            Ok(i) | Err(i) => i,
        };
        let start = if line_index == 0 {
            0
        } else {
            breaks[line_index - 1] + 1
        };
        let end = breaks
            .get(line_index)
            .copied()
            .unwrap_or(self.value.len());
        &self.value[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_is_one_indexed() {
        let src = Source::new("abc\ndef");
        assert_eq!(src.position_at(0), Position::new(1, 1));
        assert_eq!(src.position_at(2), Position::new(1, 3));
    }

    #[test]
    fn position_after_newline_resets_column() {
        let src = Source::new("abc\ndef");
        assert_eq!(src.position_at(4), Position::new(2, 1));
        assert_eq!(src.position_at(6), Position::new(2, 3));
    }

    #[test]
    fn line_text_extracts_containing_line() {
        let src = Source::new("first\nsecond\nthird");
        assert_eq!(src.line_text_at(8), "second");
        assert_eq!(src.line_text_at(0), "first");
    }
}
