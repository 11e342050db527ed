//! The two Tokenizer variants from spec §4.1. Both implement
//! [`crate::runtime::cache::Cursor`] so the packrat/left-recursion helpers in
//! [`crate::runtime::cache`] work identically over either one.

pub mod char_stream;
pub mod token_stream;

pub use char_stream::CharStreamTokenizer;
pub use token_stream::TokenStreamTokenizer;

/// Well-known terminal classes a `NameLeaf` may resolve to besides a
/// declared rule or extern (spec §4.4 "Name validation").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Newline,
    Indent,
    Dedent,
    Endmarker,
    Op,
    TypeComment,
    FStringStart,
    FStringMiddle,
    FStringEnd,
    SoftKeyword,
    Async,
    Await,
}

impl TokenKind {
    pub const ALL: &'static [TokenKind] = &[
        TokenKind::Name,
        TokenKind::Number,
        TokenKind::String,
        TokenKind::Newline,
        TokenKind::Indent,
        TokenKind::Dedent,
        TokenKind::Endmarker,
        TokenKind::Op,
        TokenKind::TypeComment,
        TokenKind::FStringStart,
        TokenKind::FStringMiddle,
        TokenKind::FStringEnd,
        TokenKind::SoftKeyword,
        TokenKind::Async,
        TokenKind::Await,
    ];

    pub fn from_name(name: &str) -> Option<TokenKind> {
        Some(match name {
            "NAME" => TokenKind::Name,
            "NUMBER" => TokenKind::Number,
            "STRING" => TokenKind::String,
            "NEWLINE" => TokenKind::Newline,
            "INDENT" => TokenKind::Indent,
            "DEDENT" => TokenKind::Dedent,
            "ENDMARKER" => TokenKind::Endmarker,
            "OP" => TokenKind::Op,
            "TYPE_COMMENT" => TokenKind::TypeComment,
            "FSTRING_START" => TokenKind::FStringStart,
            "FSTRING_MIDDLE" => TokenKind::FStringMiddle,
            "FSTRING_END" => TokenKind::FStringEnd,
            "SOFT_KEYWORD" => TokenKind::SoftKeyword,
            "ASYNC" => TokenKind::Async,
            "AWAIT" => TokenKind::Await,
            _ => return None,
        })
    }
}

/// One lexical token: its class, text span, and the literal text (owned,
/// since the emitted parser's actions may want to inspect it after the
/// tokenizer has moved on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_whitespace_or_comment(&self) -> bool {
        false
    }
}
