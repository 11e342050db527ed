//! Error taxonomy for the generator pipeline (spec §7).
//!
//! Mirrors the teacher crate's split of `ImplementationError` / `ProductionError`
//! / `ParseError` into separate, narrowly-scoped types rather than one grab-bag
//! enum: pipeline errors (raised once, to the caller of `Driver`) have a
//! different audience and lifetime than the emitted parser's internal
//! `FAILURE` signal, which is never supposed to escape a successful parse.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use crate::position::Position;

/// Raised when the meta-syntax itself cannot be parsed.
#[derive(Debug, Clone)]
pub struct GrammarParseError {
    pub file: Option<PathBuf>,
    pub position: Position,
    pub message: String,
}

impl Display for GrammarParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.position, self.message),
            None => write!(f, "{}: {}", self.position, self.message),
        }
    }
}
impl std::error::Error for GrammarParseError {}

/// Raised by the Analyzer: unknown name, duplicate name, reserved-prefix
/// violation, collapsed-alternative shadowing, missing `start`/`trailer`,
/// no leader in a left-recursive SCC.
#[derive(Debug, Clone)]
pub enum ValidationError {
    UnknownName { rule: String, name: String },
    DuplicateName(String),
    ReservedPrefix(String),
    ShadowedAlternative { rule: String, earlier: String, later: String },
    NoStartOrTrailer,
    NoLeaderCandidate { scc: Vec<String> },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownName { rule, name } => {
                write!(f, "rule '{rule}' references undeclared name '{name}'")
            }
            ValidationError::DuplicateName(name) => write!(f, "duplicate name '{name}'"),
            ValidationError::ReservedPrefix(name) => {
                write!(f, "'{name}' uses the reserved '_' prefix")
            }
            ValidationError::ShadowedAlternative { rule, earlier, later } => write!(
                f,
                "in rule '{rule}', alternative '{later}' is unreachable: it is shadowed by the earlier alternative '{earlier}'"
            ),
            ValidationError::NoStartOrTrailer => {
                write!(f, "grammar has neither a 'start' rule nor a @trailer meta")
            }
            ValidationError::NoLeaderCandidate { scc } => write!(
                f,
                "left-recursive SCC {{{}}} has no leadership candidate",
                scc.join(", ")
            ),
        }
    }
}
impl std::error::Error for ValidationError {}

/// An internal invariant violated during code emission. Should never occur on
/// validated input; if it does, it is reported as a bug in the generator.
#[derive(Debug, Clone)]
pub struct EmissionError {
    pub message: String,
}
impl Display for EmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "internal error during code emission: {}", self.message)
    }
}
impl std::error::Error for EmissionError {}

/// The emitted parser's top-level failure, surfaced from the tokenizer's
/// farthest observed position. `Forced` items raise a sub-kind of this
/// carrying their expectation string instead of letting the caller construct
/// the message from a plain [`Failure`](crate::runtime::Failure).
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub pointer: usize,
    pub position: Position,
    pub message: String,
    pub expected: Option<String>,
}

impl Display for ParseFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.expected {
            Some(what) => write!(f, "SyntaxError at {}: expected {what}", self.position),
            None => write!(f, "SyntaxError at {}: {}", self.position, self.message),
        }
    }
}
impl std::error::Error for ParseFailure {}

/// Top-level error type returned by [`crate::driver::Driver`] operations.
#[derive(Debug)]
pub enum GenError {
    Parse(GrammarParseError),
    Validation(ValidationError),
    Emission(EmissionError),
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Display for GenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GenError::Parse(e) => Display::fmt(e, f),
            GenError::Validation(e) => Display::fmt(e, f),
            GenError::Emission(e) => Display::fmt(e, f),
            GenError::Io(e) => Display::fmt(e, f),
            GenError::Fmt(e) => Display::fmt(e, f),
        }
    }
}
impl std::error::Error for GenError {}

impl From<GrammarParseError> for GenError {
    fn from(e: GrammarParseError) -> Self {
        GenError::Parse(e)
    }
}
impl From<ValidationError> for GenError {
    fn from(e: ValidationError) -> Self {
        GenError::Validation(e)
    }
}
impl From<EmissionError> for GenError {
    fn from(e: EmissionError) -> Self {
        GenError::Emission(e)
    }
}
impl From<std::io::Error> for GenError {
    fn from(e: std::io::Error) -> Self {
        GenError::Io(e)
    }
}
impl From<fmt::Error> for GenError {
    fn from(e: fmt::Error) -> Self {
        GenError::Fmt(e)
    }
}
