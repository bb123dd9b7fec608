//! Command-line front end for minirag.
//!
//! ```bash
//! # Index a document (replaces any previous index)
//! minirag ingest report.pdf
//!
//! # Ask about it
//! minirag ask "What is discussed?"
//!
//! # Index and ask in one go, saving the answer
//! minirag ask "Summarise the findings" --file report.docx --output answer.txt
//! ```

pub mod backend;
pub mod cli;
pub mod commands;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use cli::{Cli, Command, SAMPLE_QUESTION};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so answers on stdout stay clean. `RUST_LOG` overrides
/// the level chosen by `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_filter =
        if verbose { "minirag=debug,minirag_cli=debug" } else { "minirag=info,minirag_cli=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let pipeline = backend::build_pipeline(&cli.options)?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Command::Ingest { file } => commands::ingest(&pipeline, &file, &mut stdout).await,
        Command::Ask { question, answer } => {
            commands::ask(&pipeline, &question, &answer, &mut stdout).await.map(drop)
        }
        Command::Sample { answer } => {
            commands::ask(&pipeline, SAMPLE_QUESTION, &answer, &mut stdout).await.map(drop)
        }
    }
}
