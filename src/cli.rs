use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "docvec",
    version,
    about = "Semantic retrieval over a directory of text documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the index from the corpus directory and save it
    Ingest(IngestArgs),
    /// Answer a single query against the saved index
    Query(QueryArgs),
    /// Answer the built-in demo queries and save them to results.json
    Demo(DemoArgs),
    /// Answer queries interactively
    Repl(ReplArgs),
    /// Build or load the index, run the demo, then start the interactive loop
    Run(RunArgs),
    /// Show the data directory and index statistics
    Status(StatusArgs),
    /// Inspect or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Directory holding the documents
    #[arg(long)]
    pub corpus_dir: Option<PathBuf>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Number of chunks sent to the model per call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// File name pattern, e.g. "*.txt" or "*.{md,txt}"
    #[arg(long)]
    pub pattern: Option<String>,

    /// Drop whitespace-only chunks instead of failing
    #[arg(long)]
    pub skip_empty: bool,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The query text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,

    /// Print compact single-line JSON
    #[arg(long)]
    pub json: bool,

    /// Print each retrieved chunk with its distance instead
    #[arg(long)]
    pub chunks: bool,
}

// -- Demo --

#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Number of chunks to retrieve per query
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,

    /// Where to write the results (defaults to results.json in the data dir)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

// -- Repl --

#[derive(Debug, Parser)]
pub struct ReplArgs {
    /// Number of chunks to retrieve per query
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,
}

// -- Run --

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Directory holding the documents, used when no index exists yet
    #[arg(long)]
    pub corpus_dir: Option<PathBuf>,

    /// Number of chunks to retrieve per query
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show every setting with its effective value
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a setting in config.redb
    Set {
        /// Setting name (model_name, corpus_dir, chunk_size, batch_size,
        /// top_k, pattern, empty_chunks)
        key: String,
        /// New value
        value: String,
    },
    /// Remove a stored setting (revert to default)
    Clear {
        /// Setting name
        key: String,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docvec",
            &mut std::io::stdout(),
        );
    }
}
