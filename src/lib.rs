//! `pegc` is a PEG grammar compiler: it parses a small grammar DSL,
//! analyses it (nullability, left-recursion, keyword classification), and
//! emits a standalone recursive-descent packrat parser as Rust source.
//!
//! # Overview
//!
//! A grammar file declares rules made of sequences, prioritized
//! alternatives, repetition, grouping, optional items, syntactic
//! predicates, and an explicit cut operator, in the tradition of pegen
//! (CPython's own PEG grammar compiler). [`meta_parser`] reads that file
//! into a [`grammar::Grammar`]; [`analyzer`] validates it and determines
//! which rules are left-recursive; [`desugar`] rewrites repetition and
//! grouping into ordinary auxiliary rules; [`codegen`] walks the result and
//! writes a parser module that depends only on the small [`runtime`]
//! support library also shipped in this crate.
//!
//! # Example
//!
//! ```
//! use pegc::driver::{Driver, GrammarSource, CodeSink};
//! use pegc::codegen::EmitOptions;
//!
//! let driver = Driver::new(EmitOptions::default());
//! let grammar = driver
//!     .load_grammar(GrammarSource::Text("start: a=NUMBER '+' b=NUMBER NEWLINE $\n"))
//!     .unwrap();
//! let code = driver.generate_code(grammar, CodeSink::ReturnString).unwrap();
//! ```
//!
//! # License
//! Provided under the MIT license.

pub mod analyzer;
pub mod codegen;
pub mod desugar;
pub mod driver;
pub mod error;
pub mod grammar;
pub mod log;
pub mod meta_parser;
pub mod position;
pub mod runtime;
