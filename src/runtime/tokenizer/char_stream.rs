//! Character-stream Tokenizer variant (spec §4.1): marks are
//! `(line, column, offset)` triples and every `char` of the input is a
//! potential terminal, with no structural filtering or collapsing.
//!
//! Grounded on the teacher's `Code`/`Position` (`obtain_position`'s
//! line-break binary search, `\n`/`\r\n` handling) generalized from
//! byte-indexed UTF-8 scanning to `char`-indexed scanning so `Mark::column`
//! always counts characters, not bytes.

use std::cell::RefCell;

use crate::runtime::cache::Cursor;
use crate::runtime::mark::CharMark;
use crate::runtime::Failure;

/// One position in the input plus the character found there (or `None` at
/// end of input, where `peek`/`getnext` keep returning it forever rather
/// than panicking, matching pegen's own end-of-file behavior).
pub struct CharStreamTokenizer {
    chars: Vec<char>,
    /// Byte offset of each character in `chars`, same length plus one
    /// trailing entry for end-of-input, so `byte_offset` is a plain index.
    byte_offsets: Vec<usize>,
    index: usize,
    lines: Vec<usize>,
    farthest: CharMark,
}

impl CharStreamTokenizer {
    pub fn new(source: &str) -> Self {
        let mut chars = Vec::new();
        let mut byte_offsets = Vec::new();
        for (offset, c) in source.char_indices() {
            byte_offsets.push(offset);
            chars.push(c);
        }
        byte_offsets.push(source.len());

        let mut lines = vec![0usize];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                lines.push(i + 1);
            }
        }

        Self { chars, byte_offsets, index: 0, lines, farthest: CharMark::default() }
    }

    fn mark_at(&self, index: usize) -> CharMark {
        let line_idx = match self.lines.binary_search(&index) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.lines[line_idx];
        CharMark::new(line_idx + 1, index - line_start + 1, self.byte_offsets[index])
    }
}

impl Cursor for CharStreamTokenizer {
    type Mark = CharMark;
    type Tok = Option<char>;

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn getnext(&mut self) -> Option<char> {
        let c = self.peek();
        if self.index < self.chars.len() {
            self.index += 1;
        }
        let mark = self.mark_at(self.index);
        if mark > self.farthest {
            self.farthest = mark;
        }
        c
    }

    fn mark(&self) -> CharMark {
        self.mark_at(self.index)
    }

    fn reset(&mut self, mark: CharMark) {
        self.index = match self.byte_offsets.binary_search(&mark.offset) {
            Ok(i) => i,
            Err(i) => i,
        };
    }

    fn diagnose(&self) -> CharMark {
        self.farthest
    }

    fn get_last_non_whitespace_token(&self) -> Option<Option<char>> {
        self.chars[..self.index].iter().rev().find(|c| !c.is_whitespace()).map(|c| Some(*c))
    }

    fn byte_offset(&self, mark: CharMark) -> usize {
        mark.offset
    }
}

/// `StringLeaf(s)` in character-stream mode: matches the literal prefix
/// of the remaining input (spec §4.6 "Terminal probes").
pub fn expect_literal(cursor: &RefCell<CharStreamTokenizer>, literal: &str) -> Result<String, Failure> {
    let mark = cursor.borrow().mark();
    for expected in literal.chars() {
        let got = cursor.borrow_mut().getnext();
        if got != Some(expected) {
            cursor.borrow_mut().reset(mark);
            return Err(Failure { at: cursor.borrow().byte_offset(mark) });
        }
    }
    Ok(literal.to_string())
}

/// `$` / `NameLeaf("ENDMARKER")` in character-stream mode: end of input.
pub fn expect_end_of_input(cursor: &RefCell<CharStreamTokenizer>) -> Result<(), Failure> {
    let mark = cursor.borrow().mark();
    if cursor.borrow().peek().is_none() {
        Ok(())
    } else {
        Err(Failure { at: cursor.borrow().byte_offset(mark) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_and_column_across_newline() {
        let mut t = CharStreamTokenizer::new("ab\ncd");
        t.getnext();
        t.getnext();
        let before_newline = t.mark();
        assert_eq!((before_newline.line, before_newline.column), (1, 3));
        t.getnext();
        let after_newline = t.mark();
        assert_eq!((after_newline.line, after_newline.column), (2, 1));
    }

    #[test]
    fn reset_restores_exact_position() {
        let mut t = CharStreamTokenizer::new("hello");
        t.getnext();
        t.getnext();
        let mark = t.mark();
        t.getnext();
        t.getnext();
        t.reset(mark);
        assert_eq!(t.peek(), Some('l'));
    }

    #[test]
    fn farthest_mark_only_advances() {
        let mut t = CharStreamTokenizer::new("abc");
        t.getnext();
        t.getnext();
        let far = t.diagnose();
        t.reset(CharMark::default());
        t.getnext();
        assert_eq!(t.diagnose(), far, "diagnose must not regress after a reset");
    }

    #[test]
    fn peek_past_end_of_input_is_none() {
        let mut t = CharStreamTokenizer::new("x");
        t.getnext();
        assert_eq!(t.peek(), None);
        assert_eq!(t.getnext(), None);
    }

    #[test]
    fn expect_literal_matches_and_restores_on_mismatch() {
        let cursor = RefCell::new(CharStreamTokenizer::new("ab"));
        assert!(expect_literal(&cursor, "ax").is_err());
        assert_eq!(cursor.borrow().mark().offset, 0, "failed match must not advance");
        assert!(expect_literal(&cursor, "ab").is_ok());
        assert!(expect_end_of_input(&cursor).is_ok());
    }
}
