//! Debug/trace logging for both the generator and the emitted parsers,
//! grounded on the teacher crate's `util::Log<T>` verbosity ladder. This is
//! the ambient logging facade for the whole workspace: no external logging
//! crate is introduced because the teacher already solves this the way
//! spec §4.6 assumes ("a verbosity level, a debug indent level").

use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Result(T),
    Verbose(T),
}

impl<T> Log<T> {
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }

    pub fn at_least(&self, floor: Log<()>) -> bool {
        self.order() >= floor.order()
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{s}")
            }
        }
    }
}

/// A small indent-tracking tracer used by the emitted parser's `in
/// recursive rule` logging path (spec §4.6, and pegen's `logger`/`memoize`
/// decorators, which print `fill = "  " * self._level` around each call).
pub struct Tracer {
    verbosity: Log<()>,
    level: std::cell::Cell<usize>,
}

impl Tracer {
    pub fn new(verbosity: Log<()>) -> Self {
        Self {
            verbosity,
            level: std::cell::Cell::new(0),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity.at_least(Log::Verbose(()))
    }

    pub fn enter(&self, rule: &str, peek: &str) {
        if self.is_verbose() {
            let indent = "  ".repeat(self.level.get());
            eprintln!("{indent}{rule}() ... (looking at {peek})");
            self.level.set(self.level.get() + 1);
        }
    }

    pub fn exit(&self, rule: &str, outcome: &str) {
        if self.is_verbose() {
            let level = self.level.get().saturating_sub(1);
            self.level.set(level);
            let indent = "  ".repeat(level);
            eprintln!("{indent}... {rule}() -> {outcome}");
        }
    }
}
