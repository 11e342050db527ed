//! Top-level pipeline orchestration (spec §4.7): `load_grammar` →
//! `generate_code` → (optionally) `generate_parser`.
//!
//! Grounded on the teacher's `DefaultParser`/`LexerlessParser` constructors,
//! which take either a path or raw source text and run the same
//! build/validate sequence either way; generalized here to the generator's
//! own parse/analyze/desugar/emit sequence.

use std::fmt::Write as _;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::analyzer;
use crate::codegen::{CodeEmitter, EmitOptions};
use crate::desugar::Desugarer;
use crate::error::{EmissionError, GenError, GrammarParseError};
use crate::grammar::Grammar;
use crate::meta_parser::MetaGrammarParser;
use crate::position::Source;

/// Where the grammar source comes from, matching the teacher's
/// `impl From<&[u8]>`/`impl From<&str>` overloads for `Code` — here an
/// explicit enum instead, since loading from a path can additionally fail
/// with an I/O error before the text even exists.
pub enum GrammarSource<'a> {
    Path(PathBuf),
    Text(&'a str),
}

impl<'a> From<&'a str> for GrammarSource<'a> {
    fn from(value: &'a str) -> Self {
        GrammarSource::Text(value)
    }
}

impl<'a> From<PathBuf> for GrammarSource<'a> {
    fn from(value: PathBuf) -> Self {
        GrammarSource::Path(value)
    }
}

/// Where emitted code should land: an owned `String`, or written straight
/// through to any `io::Write`, mirroring the teacher's `build_grammar`
/// (`Result<String, fmt::Error>`) alongside its buffered-writer emission
/// path for larger outputs.
pub enum CodeSink<'w> {
    ReturnString,
    Writer(&'w mut dyn IoWrite),
}

pub enum CodeOutput {
    Text(String),
    Written,
}

pub struct Driver {
    pub options: EmitOptions,
}

impl Driver {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    /// Reads and parses a grammar from a path or inline text, without
    /// running the Analyzer yet (spec §4.7 "load_grammar").
    pub fn load_grammar(&self, source: GrammarSource<'_>) -> Result<Grammar, GenError> {
        let (owned, path): (String, Option<PathBuf>) = match source {
            GrammarSource::Path(path) => (std::fs::read_to_string(&path)?, Some(path)),
            GrammarSource::Text(text) => (text.to_string(), None),
        };
        let src = Source::new(&owned);
        let parser = MetaGrammarParser::new(&src).map_err(|e| with_file(e, &path))?;
        let grammar = parser.parse().map_err(|e| with_file(e, &path))?;
        Ok(grammar)
    }

    /// Runs the Analyzer and Desugarer over a loaded grammar, then emits
    /// Rust source for the resulting parser (spec §4.7 "generate_code").
    pub fn generate_code(&self, grammar: Grammar, sink: CodeSink<'_>) -> Result<CodeOutput, GenError> {
        analyzer::analyze(&grammar)?;
        let desugared = Desugarer::new().run(grammar);
        let emitter = CodeEmitter::new(&desugared, self.options_for_emit());
        let code = emitter.emit()?;
        match sink {
            CodeSink::ReturnString => Ok(CodeOutput::Text(code)),
            CodeSink::Writer(w) => {
                w.write_all(code.as_bytes())?;
                Ok(CodeOutput::Written)
            }
        }
    }

    fn options_for_emit(&self) -> EmitOptions {
        EmitOptions { mode: self.options.mode, skip_actions: self.options.skip_actions, emit_ffi: self.options.emit_ffi }
    }

    /// Generates a parser, compiles it as a `cdylib` with `rustc`, and loads
    /// it with `libloading` (spec §4.7 "generate_parser", expanded in
    /// SPEC_FULL.md §4.6). Requires `emit_ffi: true` in `self.options` so the
    /// compiled module exports the `extern "C"` shim `ParserFactory` expects.
    pub fn generate_parser(&self, grammar: Grammar, workdir: &Path) -> Result<ParserFactory, GenError> {
        if !self.options.emit_ffi {
            return Err(GenError::Emission(EmissionError {
                message: "generate_parser requires EmitOptions::emit_ffi to be set".to_string(),
            }));
        }
        let class = grammar.metas().get("class").and_then(|v| v.clone()).unwrap_or_else(|| "GeneratedParser".to_string());
        std::fs::create_dir_all(workdir)?;
        let src_path = workdir.join(format!("{class}.rs"));
        let dylib_path = workdir.join(libloading_name(&class));

        let mut code = String::new();
        self.generate_code_into(grammar, &mut code)?;
        std::fs::write(&src_path, code)?;

        let status = Command::new("rustc")
            .arg("--crate-type=cdylib")
            .arg("--edition=2021")
            .arg("-L")
            .arg(workdir)
            .arg("--extern")
            .arg(format!("pegc={}", pegc_rlib_hint()))
            .arg("-o")
            .arg(&dylib_path)
            .arg(&src_path)
            .status()?;
        if !status.success() {
            return Err(GenError::Emission(EmissionError {
                message: format!("rustc failed to compile generated parser '{class}' (exit status {status})"),
            }));
        }

        ParserFactory::load(dylib_path, class)
    }

    fn generate_code_into(&self, grammar: Grammar, out: &mut String) -> Result<(), GenError> {
        analyzer::analyze(&grammar)?;
        let desugared = Desugarer::new().run(grammar);
        let emitter = CodeEmitter::new(&desugared, self.options_for_emit());
        write!(out, "{}", emitter.emit()?).map_err(GenError::from)
    }
}

fn with_file(mut e: GrammarParseError, path: &Option<PathBuf>) -> GenError {
    e.file = path.clone();
    GenError::Parse(e)
}

#[cfg(target_os = "macos")]
fn libloading_name(class: &str) -> String {
    format!("lib{class}.dylib")
}
#[cfg(target_os = "windows")]
fn libloading_name(class: &str) -> String {
    format!("{class}.dll")
}
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn libloading_name(class: &str) -> String {
    format!("lib{class}.so")
}

/// Where to find the already-built `pegc` rlib so the freshly-compiled
/// `cdylib` can resolve `extern crate pegc` for the runtime support types.
/// Set by the `pegc` binary to its own `target/<profile>/deps` directory;
/// library consumers of [`Driver`] are expected to provide the same path
/// their own build produced.
fn pegc_rlib_hint() -> String {
    std::env::var("PEGC_RLIB_PATH").unwrap_or_else(|_| "target/debug/deps/libpegc.rlib".to_string())
}

/// A loaded, dynamically-compiled parser (spec §4.6's `extern "C"` shim,
/// wrapped safely). Grounded on `fire833-lang-explorer`'s `libloading`
/// usage: resolve the two symbols once at load time, keep the `Library`
/// alive for as long as any resolved symbol might be called.
pub struct ParserFactory {
    _lib: libloading::Library,
    class: String,
    parse_fn: unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8,
    free_fn: unsafe extern "C" fn(*mut u8, usize),
}

impl ParserFactory {
    fn load(dylib_path: PathBuf, class: String) -> Result<Self, GenError> {
        unsafe {
            let lib = libloading::Library::new(&dylib_path).map_err(|e| {
                GenError::Emission(EmissionError { message: format!("failed to load compiled parser '{dylib_path:?}': {e}") })
            })?;
            let parse_symbol = format!("{class}_parse_ffi\0");
            let free_symbol = format!("{class}_free\0");
            let parse_fn = *lib
                .get::<unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8>(parse_symbol.as_bytes())
                .map_err(|e| GenError::Emission(EmissionError { message: format!("missing '{class}_parse_ffi' export: {e}") }))?;
            let free_fn = *lib
                .get::<unsafe extern "C" fn(*mut u8, usize)>(free_symbol.as_bytes())
                .map_err(|e| GenError::Emission(EmissionError { message: format!("missing '{class}_free' export: {e}") }))?;
            Ok(Self { _lib: lib, class, parse_fn, free_fn })
        }
    }

    /// Runs the dynamically-loaded parser over `input`, returning the
    /// deserialized JSON envelope `{"ok": bool, "tree"|"error": ...}`.
    pub fn parse(&self, input: &str) -> Result<serde_json::Value, GenError> {
        let mut out_len: usize = 0;
        let ptr = unsafe { (self.parse_fn)(input.as_ptr(), input.len(), &mut out_len as *mut usize) };
        if ptr.is_null() {
            return Err(GenError::Emission(EmissionError {
                message: format!("'{}_parse_ffi' returned a null buffer", self.class),
            }));
        }
        let bytes = unsafe { std::slice::from_raw_parts(ptr, out_len) }.to_vec();
        unsafe { (self.free_fn)(ptr, out_len) };
        serde_json::from_slice(&bytes)
            .map_err(|e| GenError::Emission(EmissionError { message: format!("malformed JSON from compiled parser: {e}") }))
    }
}

/// Runs `load_grammar` + [`analyzer::analyze`] only, for the CLI's `check`
/// subcommand (SPEC_FULL.md §6) — no desugaring or emission.
pub fn check_grammar(source: GrammarSource<'_>) -> Result<(), GenError> {
    let driver = Driver::new(EmitOptions::default());
    let grammar = driver.load_grammar(source)?;
    analyzer::analyze(&grammar)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_grammar_from_text_parses_without_touching_the_filesystem() {
        let driver = Driver::new(EmitOptions::default());
        let grammar = driver.load_grammar(GrammarSource::Text("start: NUMBER NEWLINE $\n")).expect("parses");
        assert!(grammar.rule("start").is_some());
    }

    #[test]
    fn generate_code_returns_string_when_asked() {
        let driver = Driver::new(EmitOptions::default());
        let grammar = driver.load_grammar(GrammarSource::Text("start: NUMBER NEWLINE $\n")).expect("parses");
        let output = driver.generate_code(grammar, CodeSink::ReturnString).expect("emits");
        match output {
            CodeOutput::Text(code) => assert!(code.contains("pub struct GeneratedParser")),
            CodeOutput::Written => panic!("expected a returned string"),
        }
    }

    #[test]
    fn check_grammar_rejects_an_unknown_name() {
        let result = check_grammar(GrammarSource::Text("start: undeclared_thing NEWLINE $\n"));
        assert!(result.is_err());
    }

    #[test]
    fn generate_parser_without_emit_ffi_is_rejected_up_front() {
        let driver = Driver::new(EmitOptions::default());
        let grammar = driver.load_grammar(GrammarSource::Text("start: NUMBER NEWLINE $\n")).expect("parses");
        let result = driver.generate_parser(grammar, Path::new("/tmp/pegc-driver-test"));
        assert!(result.is_err());
    }
}
