//! Grammargen CLI - evolve grammar matchers from a corpus and score them.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Grammargen - evolve byte-oriented grammars with genetic programming
#[derive(Parser, Debug)]
#[command(name = "grammargen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log per-generation statistics (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evolve a population of grammars against a corpus
    Evolve(cli::evolve::EvolveArgs),

    /// Score the best grammar of a checkpoint against a corpus
    Score {
        /// Checkpoint file written by `evolve --output`
        #[arg(required = true)]
        checkpoint: std::path::PathBuf,

        /// Corpus file, one example per line
        #[arg(required = true)]
        corpus: std::path::PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Commands::Evolve(evolve) => cli::evolve::execute(&evolve),
        Commands::Score {
            checkpoint,
            corpus,
            format,
        } => cli::score::execute(&checkpoint, &corpus, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
