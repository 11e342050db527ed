//! Token-stream Tokenizer variant (spec §4.1): a lazy lexical analysis pass
//! over the whole input, buffered into an ordered sequence, with comments,
//! continuation newlines, and pure-whitespace error tokens filtered out and
//! consecutive newlines collapsed to one.
//!
//! Grounded on the teacher's `Tokenizer`/`ILexeme` (lazy, regex-driven
//! lexeme set) for the overall buffering design, and on pegen's
//! `stde.pegen.tokenizer` for the indentation-stack bookkeeping this variant
//! needs that the teacher's own tokenizer (which targets non-whitespace-
//! sensitive grammars) does not.

use std::cell::RefCell;

use super::{Token, TokenKind};
use crate::runtime::cache::Cursor;
use crate::runtime::mark::TokenMark;
use crate::runtime::Failure;

/// A lazily-tokenized, filtered view over source text, matching Python's
/// own tokenize module closely enough to serve NAME/NUMBER/STRING/NEWLINE/
/// INDENT/DEDENT/ENDMARKER/OP-shaped grammars.
pub struct TokenStreamTokenizer {
    tokens: Vec<Token>,
    pos: usize,
    farthest: usize,
}

impl TokenStreamTokenizer {
    pub fn new(source: &str) -> Self {
        let tokens = lex(source);
        Self { tokens, pos: 0, farthest: 0 }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl Cursor for TokenStreamTokenizer {
    type Mark = TokenMark;
    type Tok = Token;

    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)].clone()
    }

    fn getnext(&mut self) -> Token {
        let tok = self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        if self.pos > self.farthest {
            self.farthest = self.pos;
        }
        tok
    }

    fn mark(&self) -> TokenMark {
        TokenMark(self.pos)
    }

    fn reset(&mut self, mark: TokenMark) {
        self.pos = mark.0;
    }

    fn diagnose(&self) -> TokenMark {
        TokenMark(self.farthest)
    }

    fn get_last_non_whitespace_token(&self) -> Option<Token> {
        self.tokens[..self.pos.min(self.tokens.len())]
            .iter()
            .rev()
            .find(|t| !t.is_whitespace_or_comment())
            .cloned()
    }

    fn byte_offset(&self, mark: TokenMark) -> usize {
        self.tokens
            .get(mark.0)
            .map(|t| t.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.end).unwrap_or(0))
    }
}

/// Terminal probes the CodeEmitter calls directly for `NameLeaf`/
/// `StringLeaf` items in token-stream mode (spec §4.6 "Terminal probes").
pub fn expect_kind(cursor: &RefCell<TokenStreamTokenizer>, kind: TokenKind) -> Result<Token, Failure> {
    let mark = cursor.borrow().mark();
    let tok = cursor.borrow().peek();
    if tok.kind == kind {
        cursor.borrow_mut().getnext();
        Ok(tok)
    } else {
        Err(Failure { at: cursor.borrow().byte_offset(mark) })
    }
}

/// `NAME`, with the keyword exclusion spec §4.6 "Keyword classification"
/// requires: a token whose spelling is in `KEYWORDS` is not a `NAME`.
pub fn expect_name(cursor: &RefCell<TokenStreamTokenizer>, keywords: &[&str]) -> Result<Token, Failure> {
    let mark = cursor.borrow().mark();
    let tok = cursor.borrow().peek();
    if tok.kind == TokenKind::Name && !keywords.contains(&tok.text.as_str()) {
        cursor.borrow_mut().getnext();
        Ok(tok)
    } else {
        Err(Failure { at: cursor.borrow().byte_offset(mark) })
    }
}

/// `StringLeaf(s)`: a token whose spelling equals `s`, or, if `s` (quotes
/// stripped) names a token class and the next token has that class, the
/// token itself regardless of spelling.
pub fn expect_string(cursor: &RefCell<TokenStreamTokenizer>, literal: &str) -> Result<Token, Failure> {
    let mark = cursor.borrow().mark();
    let tok = cursor.borrow().peek();
    if tok.text == literal {
        cursor.borrow_mut().getnext();
        return Ok(tok);
    }
    let inner = literal.trim_matches(|c| c == '"' || c == '\'');
    if let Some(kind) = TokenKind::from_name(inner) {
        if tok.kind == kind {
            cursor.borrow_mut().getnext();
            return Ok(tok);
        }
    }
    Err(Failure { at: cursor.borrow().byte_offset(mark) })
}

pub fn expect_endmarker(cursor: &RefCell<TokenStreamTokenizer>) -> Result<Token, Failure> {
    expect_kind(cursor, TokenKind::Endmarker)
}

const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "!=", ">=", "<=", "==", "->", ":=", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "**", "//", "<<", ">>", "&&", "||", "+", "-", "*", "/", "%", "&", "|",
    "^", "~", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@", "!", "?",
];

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}
fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Hand-written lexer producing the raw (unfiltered) token sequence; `lex`
/// below applies the comment/whitespace-error filtering and newline
/// collapsing spec §4.1 requires before returning to the caller.
fn lex(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut i = 0usize;
    let mut raw: Vec<Token> = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut at_line_start = true;
    let mut paren_depth: i32 = 0;

    while i < bytes.len() {
        if at_line_start && paren_depth == 0 {
            let line_start = i;
            let mut col = 0usize;
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                col += 1;
                i += 1;
            }
            // Blank line or comment-only line: no INDENT/DEDENT, consume to EOL.
            if i >= bytes.len() || bytes[i] == b'\n' || bytes[i] == b'#' {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                if i < bytes.len() {
                    i += 1;
                }
                continue;
            }
            let current = *indents.last().unwrap();
            if col > current {
                indents.push(col);
                raw.push(Token { kind: TokenKind::Indent, text: String::new(), start: line_start, end: i });
            } else {
                while *indents.last().unwrap() > col {
                    indents.pop();
                    raw.push(Token { kind: TokenKind::Dedent, text: String::new(), start: i, end: i });
                }
            }
            at_line_start = false;
        }

        if i >= bytes.len() {
            break;
        }
        let c = bytes[i] as char;

        if c == '\n' {
            if paren_depth == 0 {
                raw.push(Token { kind: TokenKind::Newline, text: "\n".into(), start: i, end: i + 1 });
                at_line_start = true;
            }
            i += 1;
            continue;
        }
        if c == ' ' || c == '\t' || c == '\r' {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if c == '\\' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
            i += 2;
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i] as char) {
                i += 1;
            }
            let text = source[start..i].to_string();
            let kind = match text.as_str() {
                "async" => TokenKind::Async,
                "await" => TokenKind::Await,
                _ => TokenKind::Name,
            };
            raw.push(Token { kind, text, start, end: i });
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'.' {
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mark = i;
                i += 1;
                if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                        i += 1;
                    }
                } else {
                    i = mark;
                }
            }
            raw.push(Token { kind: TokenKind::Number, text: source[start..i].to_string(), start, end: i });
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = bytes[i];
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            if i < bytes.len() {
                i += 1;
            }
            raw.push(Token { kind: TokenKind::String, text: source[start..i].to_string(), start, end: i });
            continue;
        }
        if c == '(' || c == '[' || c == '{' {
            paren_depth += 1;
        }
        if c == ')' || c == ']' || c == '}' {
            paren_depth -= 1;
        }
        let rest = &source[i..];
        if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(*op)) {
            raw.push(Token { kind: TokenKind::Op, text: (*op).to_string(), start: i, end: i + op.len() });
            i += op.len();
            continue;
        }
        // Unknown byte: treat as a single-character OP to stay total.
        raw.push(Token { kind: TokenKind::Op, text: c.to_string(), start: i, end: i + c.len_utf8() });
        i += c.len_utf8();
    }

    while indents.len() > 1 {
        indents.pop();
        raw.push(Token { kind: TokenKind::Dedent, text: String::new(), start: i, end: i });
    }
    raw.push(Token { kind: TokenKind::Endmarker, text: String::new(), start: i, end: i });

    filter(raw)
}

/// Drops comment/continuation artifacts (already excluded by `lex` above)
/// and collapses runs of consecutive NEWLINE tokens into one, per spec
/// §4.1.
fn filter(raw: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(raw.len());
    for tok in raw {
        if tok.kind == TokenKind::Newline {
            if let Some(last) = out.last() {
                if last.kind == TokenKind::Newline {
                    continue;
                }
            }
        }
        out.push(tok);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_consecutive_newlines() {
        let t = TokenStreamTokenizer::new("1\n\n\n2");
        let kinds: Vec<_> = t.tokens().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Number, TokenKind::Newline, TokenKind::Number, TokenKind::Endmarker]
        );
    }

    #[test]
    fn mark_reset_is_reversible() {
        let mut t = TokenStreamTokenizer::new("a + b");
        let m = t.mark();
        t.getnext();
        t.getnext();
        t.reset(m);
        assert_eq!(t.peek().kind, TokenKind::Name);
    }

    #[test]
    fn expect_name_rejects_keywords() {
        let cursor = RefCell::new(TokenStreamTokenizer::new("if"));
        assert!(expect_name(&cursor, &["if"]).is_err());
        assert!(expect_name(&cursor, &["else"]).is_ok());
    }

    #[test]
    fn expect_string_matches_operator_text() {
        let cursor = RefCell::new(TokenStreamTokenizer::new("+ x"));
        assert!(expect_string(&cursor, "+").is_ok());
        assert!(expect_kind(&cursor, TokenKind::Name).is_ok());
        assert!(expect_endmarker(&cursor).is_ok());
    }

    #[test]
    fn tokenizes_a_plus_b_newline() {
        let t = TokenStreamTokenizer::new("1 + 2\n");
        let texts: Vec<_> = t.tokens().iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, vec!["1", "+", "2", "\n", ""]);
    }
}
