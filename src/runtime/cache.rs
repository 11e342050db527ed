//! The packrat cache and the two call-protocols built on top of it: plain
//! memoization (spec §4.6 "Memoization") and the left-recursion seed-and-grow
//! loop (spec §4.6 "Left-recursion seed-and-grow").
//!
//! Grounded on the teacher's `Cache` (`max_parsed_point` tracking for error
//! reporting) and on pegen's `memoize`/`memoize_left_rec` decorators
//! (`stde.pegen`/`pegen.parser_v2`), which this module's two free functions
//! play the same role as.
//!
//! Unlike pegen's single `dict` keyed by `(mark, method_name, args)`, each
//! generated rule method here owns its own `Cache<Mark, T>` field typed to
//! that rule's own return type — there are no rule arguments in this
//! grammar (spec §1 scopes those out), so the `argument_tuple` component of
//! pegen's key is always `()` and has been erased from the type entirely.
//!
//! Cache and cursor are both taken behind a `RefCell`, not `&mut`: a rule
//! method's body routinely calls sibling rule methods, each of which needs
//! to reach its own `Cache` field on the same parser struct. Threading
//! `&mut` through that call graph would mean the whole parser is
//! exclusively borrowed for the duration of every nested call, which rules
//! out the self-recursion left-recursive rules require by construction.
//! `RefCell` moves that exclusivity check to runtime, scoped to the single
//! field or cursor access in flight at any moment, the same trade the
//! teacher's own `Rc<RefCell<_>>`-flavored production graph makes for
//! `Rc<dyn IProduction>` nodes that similarly call back into each other.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use super::Failure;
use crate::log::Tracer;

/// Minimal cursor contract shared by both tokenizer variants (spec §4.1):
/// `peek`/`getnext`/`mark`/`reset`/`diagnose`. `byte_offset` additionally
/// maps a `Mark` back to a byte position for error construction, something
/// pegen gets for free from Python ints but which our two different `Mark`
/// representations need spelled out.
pub trait Cursor {
    type Mark: Copy + Eq + Hash + Ord;
    type Tok: Clone;

    fn peek(&self) -> Self::Tok;
    fn getnext(&mut self) -> Self::Tok;
    fn mark(&self) -> Self::Mark;
    fn reset(&mut self, mark: Self::Mark);
    fn diagnose(&self) -> Self::Mark;
    fn get_last_non_whitespace_token(&self) -> Option<Self::Tok>;
    fn byte_offset(&self, mark: Self::Mark) -> usize;
}

/// Per-rule packrat cache: `(Mark) -> (result, end mark)`. The argument
/// tuple from spec's `(mark, rule_name, argument_tuple)` key is implicit —
/// `rule_name` is which `Cache` field the generated method owns, and
/// `argument_tuple` is always `()`.
pub struct Cache<M, T> {
    table: HashMap<M, (Result<T, Failure>, M)>,
    max_parsed_point: usize,
}

impl<M: Eq + Hash + Copy, T: Clone> Default for Cache<M, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Eq + Hash + Copy, T: Clone> Cache<M, T> {
    pub fn new() -> Self {
        Self { table: HashMap::new(), max_parsed_point: 0 }
    }

    pub fn max_parsed_point(&self) -> usize {
        self.max_parsed_point
    }

    fn note_point(&mut self, point: usize) {
        if point > self.max_parsed_point {
            self.max_parsed_point = point;
        }
    }

    fn get(&self, mark: &M) -> Option<&(Result<T, Failure>, M)> {
        self.table.get(mark)
    }

    fn insert(&mut self, mark: M, result: Result<T, Failure>, end: M, end_offset: usize) {
        self.note_point(end_offset);
        self.table.insert(mark, (result, end));
    }
}

/// Ordinary memoizing call protocol (spec §4.6 "Memoization"). `body` must
/// leave the cursor at the end of the consumed input on success, and is
/// expected to reset it itself on failure (every emitted alternative does
/// this already per spec's "Alternatives and cut"); this function resets to
/// the start mark as a backstop so a failing rule never leaves the cursor
/// advanced, satisfying invariant 3 in spec §8.
pub fn memoize<C, T>(
    cache: &RefCell<Cache<C::Mark, T>>,
    cursor: &RefCell<C>,
    tracer: &Tracer,
    rule_name: &'static str,
    body: impl FnOnce(&RefCell<C>) -> Result<T, Failure>,
) -> Result<T, Failure>
where
    C: Cursor,
    T: Clone,
{
    let mark = cursor.borrow().mark();
    if let Some((result, end)) = cache.borrow().get(&mark) {
        let result = result.clone();
        let end = *end;
        cursor.borrow_mut().reset(end);
        return result;
    }

    tracer.enter(rule_name, "...");
    let result = body(cursor);
    let end = if result.is_ok() { cursor.borrow().mark() } else { mark };
    if result.is_err() {
        cursor.borrow_mut().reset(mark);
    }
    tracer.exit(rule_name, if result.is_ok() { "match" } else { "fail" });

    let end_offset = cursor.borrow().byte_offset(end);
    cache.borrow_mut().insert(mark, result.clone(), end, end_offset);
    result
}

/// Left-recursion seed-and-grow call protocol (spec §4.6). Only the leader
/// of a left-recursive SCC uses this; every other rule (including
/// non-leader members of the same SCC) uses [`memoize`], whose first
/// reentrant call at the seeded mark reads back whatever this loop has
/// grown so far, which is exactly what breaks the recursion.
pub fn recurse<C, T>(
    cache: &RefCell<Cache<C::Mark, T>>,
    cursor: &RefCell<C>,
    in_recursive_rule: &std::cell::Cell<u32>,
    tracer: &Tracer,
    rule_name: &'static str,
    body: impl Fn(&RefCell<C>) -> Result<T, Failure>,
) -> Result<T, Failure>
where
    C: Cursor,
    T: Clone,
{
    let mark = cursor.borrow().mark();
    if let Some((result, end)) = cache.borrow().get(&mark) {
        let result = result.clone();
        let end = *end;
        cursor.borrow_mut().reset(end);
        return result;
    }

    // Seed with a failure so the first reentrant call breaks the cycle.
    let seed_at = cursor.borrow().byte_offset(mark);
    cache.borrow_mut().insert(mark, Err(Failure { at: seed_at }), mark, seed_at);

    let mut last_result: Result<T, Failure> = Err(Failure { at: seed_at });
    let mut last_end = mark;

    in_recursive_rule.set(in_recursive_rule.get() + 1);
    loop {
        cursor.borrow_mut().reset(mark);
        let result = body(cursor);
        let end = cursor.borrow().mark();
        match &result {
            Err(_) => break,
            Ok(_) if end <= last_end => break,
            Ok(_) => {
                let end_offset = cursor.borrow().byte_offset(end);
                cache.borrow_mut().insert(mark, result.clone(), end, end_offset);
                last_result = result;
                last_end = end;
            }
        }
    }
    in_recursive_rule.set(in_recursive_rule.get() - 1);

    cursor.borrow_mut().reset(last_end);
    let last_offset = cursor.borrow().byte_offset(last_end);
    cache.borrow_mut().insert(mark, last_result.clone(), last_end, last_offset);
    tracer.exit(rule_name, if last_result.is_ok() { "grown" } else { "fail" });
    last_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// A toy cursor over `usize` positions, just advancing by one per call,
    /// used to exercise the cache protocols without a real tokenizer.
    struct Counter {
        pos: usize,
    }
    impl Cursor for Counter {
        type Mark = usize;
        type Tok = ();
        fn peek(&self) {}
        fn getnext(&mut self) {
            self.pos += 1;
        }
        fn mark(&self) -> usize {
            self.pos
        }
        fn reset(&mut self, mark: usize) {
            self.pos = mark;
        }
        fn diagnose(&self) -> usize {
            self.pos
        }
        fn get_last_non_whitespace_token(&self) -> Option<()> {
            None
        }
        fn byte_offset(&self, mark: usize) -> usize {
            mark
        }
    }

    #[test]
    fn memoize_is_transparent_across_repeated_calls() {
        let tracer = Tracer::new(crate::log::Log::None);
        let cache: RefCell<Cache<usize, u32>> = RefCell::new(Cache::new());
        let cursor = RefCell::new(Counter { pos: 0 });
        let calls = Cell::new(0);
        let body = |c: &RefCell<Counter>| -> Result<u32, Failure> {
            calls.set(calls.get() + 1);
            c.borrow_mut().getnext();
            Ok(7)
        };
        let first = memoize(&cache, &cursor, &tracer, "r", body);
        cursor.borrow_mut().reset(0);
        let second = memoize(&cache, &cursor, &tracer, "r", body);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1, "second call must be served from cache");
    }

    #[test]
    fn failed_memoized_rule_does_not_advance_cursor() {
        let tracer = Tracer::new(crate::log::Log::None);
        let cache: RefCell<Cache<usize, u32>> = RefCell::new(Cache::new());
        let cursor = RefCell::new(Counter { pos: 3 });
        let result = memoize(&cache, &cursor, &tracer, "r", |c| {
            c.borrow_mut().getnext();
            Err(Failure { at: c.borrow().mark() })
        });
        assert!(result.is_err());
        assert_eq!(cursor.borrow().mark(), 3);
    }

    #[test]
    fn seed_and_grow_terminates_and_picks_last_growth() {
        let tracer = Tracer::new(crate::log::Log::None);
        let cache: RefCell<Cache<usize, u32>> = RefCell::new(Cache::new());
        let cursor = RefCell::new(Counter { pos: 0 });
        let depth = Cell::new(0u32);
        // Grows the end mark by one each iteration for three iterations,
        // then fails to advance further, mimicking `expr '+' term`.
        let iteration = Cell::new(0u32);
        let result = recurse(&cache, &cursor, &depth, &tracer, "expr", |c| {
            let i = iteration.get() + 1;
            iteration.set(i);
            if i > 3 {
                return Err(Failure { at: c.borrow().mark() });
            }
            c.borrow_mut().reset(i as usize);
            Ok(i)
        });
        assert_eq!(result, Ok(3));
        assert_eq!(cursor.borrow().mark(), 3);
        assert_eq!(depth.get(), 0, "recursion depth counter must be restored");
    }
}
