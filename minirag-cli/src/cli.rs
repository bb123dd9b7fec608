//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use minirag::ollama::DEFAULT_OLLAMA_URL;
use minirag::openai::OPENAI_BASE_URL;

/// Question asked by `minirag sample`.
pub const SAMPLE_QUESTION: &str = "Give me the correct coded classification for the following \
     diagnosis: Recurrent depressive disorder, currently in remission";

/// Ask questions about a single document using retrieval-augmented generation.
#[derive(Parser, Debug)]
#[command(name = "minirag", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// TOML file with pipeline settings (chunk sizes, top_k, index_dir, ...)
    #[arg(long, global = true, env = "MINIRAG_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the index is persisted to (overrides the config file)
    #[arg(long, global = true, env = "MINIRAG_INDEX_DIR", value_name = "DIR")]
    pub index_dir: Option<PathBuf>,

    /// Number of chunks retrieved per question (overrides the config file)
    #[arg(long, global = true, value_name = "K")]
    pub top_k: Option<usize>,

    /// Embedding backend
    #[arg(long, global = true, env = "MINIRAG_EMBEDDER", default_value = "ollama")]
    pub embedder: EmbedderKind,

    /// Embedding model name (backend default when omitted)
    #[arg(long, global = true, env = "MINIRAG_EMBEDDING_MODEL", value_name = "MODEL")]
    pub embedding_model: Option<String>,

    /// Vector size of the embedding model (or of the hashing embedder)
    #[arg(long, global = true, env = "MINIRAG_EMBEDDING_DIMENSIONS", value_name = "N")]
    pub embedding_dimensions: Option<usize>,

    /// Text-generation backend
    #[arg(long, global = true, env = "MINIRAG_GENERATOR", default_value = "ollama")]
    pub generator: GeneratorKind,

    /// Generation model name (backend default when omitted)
    #[arg(long, global = true, env = "MINIRAG_GENERATION_MODEL", value_name = "MODEL")]
    pub generation_model: Option<String>,

    /// Ollama server address
    #[arg(long, global = true, env = "MINIRAG_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL)]
    pub openai_url: String,

    /// API key for the OpenAI-compatible API
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Embedding backends selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature-hashing embedder (lexical matching only)
    Hashing,
    /// Ollama `/api/embed`
    Ollama,
    /// OpenAI-compatible `/embeddings`
    Openai,
}

/// Generation backends selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GeneratorKind {
    /// Ollama `/api/generate`
    Ollama,
    /// OpenAI-compatible `/completions`
    Openai,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a PDF, DOCX, or text file, replacing any previous index
    Ingest {
        /// Document to index
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Answer a question from the indexed document
    Ask {
        /// The question
        #[arg(value_name = "QUESTION")]
        question: String,
        #[command(flatten)]
        answer: AnswerArgs,
    },
    /// Ask the built-in sample question
    Sample {
        #[command(flatten)]
        answer: AnswerArgs,
    },
}

/// Options for commands that produce an answer.
#[derive(Args, Debug, Clone, Default)]
pub struct AnswerArgs {
    /// Index this document before answering
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Also write the answer to this file
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the retrieved chunks after the answer
    #[arg(long)]
    pub show_sources: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_global_options_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "minirag",
            "ask",
            "What is discussed?",
            "--file",
            "report.pdf",
            "--embedder",
            "hashing",
            "--top-k",
            "5",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.options.embedder, EmbedderKind::Hashing);
        assert_eq!(cli.options.top_k, Some(5));
        assert!(cli.options.verbose);
        match cli.command {
            Command::Ask { question, answer } => {
                assert_eq!(question, "What is discussed?");
                assert_eq!(answer.file, Some(PathBuf::from("report.pdf")));
                assert!(answer.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sample_accepts_an_output_path() {
        let cli = Cli::try_parse_from(["minirag", "sample", "-o", "answer.txt"]).unwrap();
        match cli.command {
            Command::Sample { answer } => {
                assert_eq!(answer.output, Some(PathBuf::from("answer.txt")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ingest_requires_a_file() {
        assert!(Cli::try_parse_from(["minirag", "ingest"]).is_err());
        assert!(Cli::try_parse_from(["minirag", "ingest", "--embedder", "bert", "a.txt"]).is_err());
    }
}
