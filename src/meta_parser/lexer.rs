//! Hand-written lexer for the meta-syntax (spec §4.3), grounded on the
//! teacher's `lexeme::Pattern`/`Punctuations` (regex-driven token patterns
//! tried in a fixed order, first match wins) with one addition pegen's own
//! grammar lexer needs and the teacher's doesn't: balanced-brace scanning
//! for `{ action }` text, copied verbatim rather than tokenized.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GrammarParseError;
use crate::position::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTokenKind {
    Name,
    String,
    Action,
    At,
    Colon,
    Bar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Equals,
    AmpAmp,
    Amp,
    Bang,
    Question,
    Star,
    Plus,
    Dot,
    Tilde,
    Dollar,
    KwExtern,
    Eof,
}

#[derive(Debug, Clone)]
pub struct MetaToken {
    pub kind: MetaTokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap());
static STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"(?:[^"\\\n]|\\.)*"|^'(?:[^'\\\n]|\\.)*'"#).unwrap());

/// Scans the whole grammar source into a flat token list up front; the
/// `MetaGrammarParser` never needs to look back at the source itself.
pub fn lex(source: &Source<'_>) -> Result<Vec<MetaToken>, GrammarParseError> {
    let text = source.value;
    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut tokens = Vec::new();

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        let rest = &text[i..];

        if c == '{' {
            let (action, end) = scan_action(text, i)?;
            tokens.push(MetaToken { kind: MetaTokenKind::Action, text: action, start: i, end });
            i = end;
            continue;
        }
        if let Some(m) = STRING_RE.find(rest) {
            tokens.push(MetaToken {
                kind: MetaTokenKind::String,
                text: m.as_str().to_string(),
                start: i,
                end: i + m.end(),
            });
            i += m.end();
            continue;
        }
        if let Some(m) = NAME_RE.find(rest) {
            let word = m.as_str().to_string();
            let kind = if word == "extern" { MetaTokenKind::KwExtern } else { MetaTokenKind::Name };
            tokens.push(MetaToken { kind, text: word, start: i, end: i + m.end() });
            i += m.end();
            continue;
        }
        if rest.starts_with("&&") {
            tokens.push(op(MetaTokenKind::AmpAmp, "&&", i));
            i += 2;
            continue;
        }
        let single = match c {
            '@' => Some(MetaTokenKind::At),
            ':' => Some(MetaTokenKind::Colon),
            '|' => Some(MetaTokenKind::Bar),
            '(' => Some(MetaTokenKind::LParen),
            ')' => Some(MetaTokenKind::RParen),
            '[' => Some(MetaTokenKind::LBracket),
            ']' => Some(MetaTokenKind::RBracket),
            '=' => Some(MetaTokenKind::Equals),
            '&' => Some(MetaTokenKind::Amp),
            '!' => Some(MetaTokenKind::Bang),
            '?' => Some(MetaTokenKind::Question),
            '*' => Some(MetaTokenKind::Star),
            '+' => Some(MetaTokenKind::Plus),
            '.' => Some(MetaTokenKind::Dot),
            '~' => Some(MetaTokenKind::Tilde),
            '$' => Some(MetaTokenKind::Dollar),
            _ => None,
        };
        match single {
            Some(kind) => {
                tokens.push(op(kind, &c.to_string(), i));
                i += c.len_utf8();
            }
            None => {
                return Err(GrammarParseError {
                    file: None,
                    position: source.position_at(i),
                    message: format!("unexpected character {c:?} in grammar source"),
                });
            }
        }
    }

    tokens.push(MetaToken { kind: MetaTokenKind::Eof, text: String::new(), start: i, end: i });
    Ok(tokens)
}

fn op(kind: MetaTokenKind, text: &str, start: usize) -> MetaToken {
    MetaToken { kind, text: text.to_string(), start, end: start + text.len() }
}

/// Scans a `{ ... }` action verbatim, tracking brace depth and skipping
/// over string/char literals and comments so braces inside them don't
/// confuse the count — the same manual counter pegen's own
/// `Parser.parse_action`/bracket-matching logic uses for target-language
/// action text it cannot otherwise tokenize.
fn scan_action(text: &str, open: usize) -> Result<(String, usize), GrammarParseError> {
    let bytes = text.as_bytes();
    let mut i = open + 1;
    let mut depth = 1usize;
    let content_start = i;

    while i < bytes.len() && depth > 0 {
        match bytes[i] as char {
            '{' => {
                depth += 1;
                i += 1;
            }
            '}' => {
                depth -= 1;
                i += 1;
            }
            '"' | '\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    if depth != 0 {
        return Err(GrammarParseError {
            file: None,
            position: crate::position::Position::default(),
            message: "unterminated action: missing closing '}'".to_string(),
        });
    }

    let content = text[content_start..i - 1].to_string();
    Ok((content, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<MetaTokenKind> {
        let source = Source::new(src);
        lex(&source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_a_simple_rule() {
        use MetaTokenKind::*;
        assert_eq!(kinds("expr: NAME '+' NAME"), vec![Name, Colon, Name, String, Name, Eof]);
    }

    #[test]
    fn action_braces_are_captured_verbatim() {
        let source = Source::new("r: a { Foo { bar } }");
        let tokens = lex(&source).unwrap();
        let action = tokens.iter().find(|t| t.kind == MetaTokenKind::Action).unwrap();
        assert_eq!(action.text.trim(), "Foo { bar }");
    }

    #[test]
    fn recognizes_extern_keyword() {
        assert_eq!(kinds("extern FOO"), vec![MetaTokenKind::KwExtern, MetaTokenKind::Name, MetaTokenKind::Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        use MetaTokenKind::*;
        assert_eq!(kinds("a: b # a comment\n"), vec![Name, Colon, Name, Eof]);
    }
}
