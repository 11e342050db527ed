//! The bootstrap parser for the meta-syntax (spec §4.3): hand-written,
//! not self-hosted, grounded directly on pegen's own hand-written
//! `GrammarParser`/`parser.py` (pegen bootstraps its grammar format with a
//! hand-written parser before ever generating one from a `.gram` file, and
//! this crate does the same).

mod lexer;
mod parser;

pub use lexer::{lex, MetaToken, MetaTokenKind};
pub use parser::MetaGrammarParser;
