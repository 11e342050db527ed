//! Support library shipped alongside every emitted parser (spec §2, "runtime
//! support library shipped with emitted parsers").
//!
//! Grounded on the teacher crate's split of the packrat machinery
//! (`Cache`, `SuccessData`, `ASTNode`) away from the productions that drive
//! it (`IProduction`): here, the emitted rule methods are the productions,
//! and everything in this module is the machinery they call into, so the
//! generated code for each rule stays a couple of lines.

pub mod ast;
pub mod cache;
pub mod mark;
pub mod tokenizer;

pub use ast::{AstNode, Lex};
pub use cache::Cache;
pub use mark::{CharMark, TokenMark};

use std::fmt::{self, Display, Formatter};

/// The distinguished `FAILURE` sentinel from spec §4.6. Propagated by `?`
/// through rule bodies; never itself carries a parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Farthest position reached while trying (and failing) this rule, used
    /// to build the eventual [`crate::error::ParseFailure`].
    pub at: usize,
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "no match at byte {}", self.at)
    }
}
impl std::error::Error for Failure {}

/// Wraps a rule's matched payload, distinguishing an actual value from the
/// `NO_MATCH` sentinel an [`Opt`](crate::grammar::Item::Opt) item produces
/// when its body did not match. `NO_MATCH` is a legitimate value carried
/// through the tree (spec §4.6), so it is a variant of the success type, not
/// folded into `Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched<T> {
    Value(T),
    NoMatch,
}

impl<T> Matched<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Matched::Value(v) => Some(v),
            Matched::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Matched::Value(_))
    }
}

/// The return type of every emitted rule method (spec §4.6 "Return
/// protocol"): `Ok` carries the matched value, `Err(Failure)` is the
/// propagated `FAILURE`.
pub type RuleResult<T> = Result<T, Failure>;
