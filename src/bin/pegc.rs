//! Command-line front-end for the generator (SPEC_FULL.md §6), built with
//! `clap`'s derive API the same way the pack's other parser-generator CLI,
//! `radlr-cli`, is built.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use pegc::codegen::{EmitOptions, Mode};
use pegc::driver::{check_grammar, CodeSink, Driver, GrammarSource};
use pegc::log::Log;

#[derive(Parser)]
#[command(name = "pegc", about = "Parses a PEG grammar and emits a recursive-descent packrat parser.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Emit a Rust parser module for a grammar file.
    Generate {
        grammar: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
        #[arg(long)]
        skip_actions: bool,
        #[arg(long, conflicts_with = "char_mode")]
        token_mode: bool,
        #[arg(long)]
        char_mode: bool,
    },
    /// Load and analyze a grammar without emitting anything.
    Check {
        grammar: PathBuf,
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },
}

fn verbosity_for(count: u8) -> Log<()> {
    match count {
        0 => Log::None,
        1 => Log::Default(()),
        2 => Log::Success(()),
        3 => Log::Result(()),
        _ => Log::Verbose(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate { grammar, output, verbose, skip_actions, token_mode, char_mode } => {
            let _ = verbosity_for(verbose);
            let mode = if char_mode && !token_mode { Mode::CharStream } else { Mode::TokenStream };
            let options = EmitOptions { mode, skip_actions, emit_ffi: false };
            let driver = Driver::new(options);
            match driver.load_grammar(GrammarSource::Path(grammar)) {
                Ok(g) => match std::fs::File::create(&output) {
                    Ok(mut file) => match driver.generate_code(g, CodeSink::Writer(&mut file)) {
                        Ok(_) => ExitCode::SUCCESS,
                        Err(e) => {
                            eprintln!("pegc: {e}");
                            ExitCode::from(1)
                        }
                    },
                    Err(e) => {
                        eprintln!("pegc: could not write '{}': {e}", output.display());
                        ExitCode::from(2)
                    }
                },
                Err(e) => {
                    eprintln!("pegc: {e}");
                    ExitCode::from(1)
                }
            }
        }
        Command::Check { grammar, verbose } => {
            let _ = verbosity_for(verbose);
            match check_grammar(GrammarSource::Path(grammar)) {
                Ok(()) => {
                    println!("grammar is valid");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("pegc: {e}");
                    ExitCode::from(1)
                }
            }
        }
    }
}
