//! # debator CLI
//!
//! ## Usage
//!
//! ```bash
//! debator --config ./config/debator.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `debator ingest` | Chunk and embed the configured paper into the index |
//! | `debator debate "<topic>"` | Run the debate and write the markdown transcript |
//! | `debator search "<query>"` | Print the context retrieval returns for a query |
//! | `debator completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest the paper from [paper].path
//! debator ingest --config ./config/debator.toml
//!
//! # Debate without live streaming, also saving JSON
//! debator debate "Explain cell growth" --no-stream --json debate.json
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use debator::config;
use debator::debate_cmd::{self, DebateOptions};
use debator::ingest::{self, DEFAULT_BATCH_SIZE};
use debator::logging;
use debator::progress::ProgressMode;
use debator::search;

/// debator: retrieval-grounded explainer/reviewer debates about a paper.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Every section of the file is optional.
#[derive(Parser)]
#[command(
    name = "debator",
    about = "debator: retrieval-grounded explainer/reviewer debates about a scientific paper",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/debator.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the paper into the similarity index.
    ///
    /// Resets the `debate` collection, chunks the paper from `[paper].path`,
    /// embeds the chunks, and stores them under `[retrieval].persist_directory`.
    Ingest {
        /// Chunks per upsert batch.
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Run the debate on a topic.
    ///
    /// Writes the markdown transcript to `[output].path` (or `--output`).
    Debate {
        /// Opening topic handed to the explainer.
        topic: String,

        /// Wait for each complete reply instead of streaming it to stdout.
        #[arg(long)]
        no_stream: bool,

        /// Also write the transcript as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Override the markdown output path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the context retrieved for a query.
    Search {
        /// Query text.
        query: String,

        /// Number of chunks (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "debator",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            batch_size,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, batch_size, mode).await?;
        }
        Commands::Debate {
            topic,
            no_stream,
            json,
            output,
        } => {
            let opts = DebateOptions {
                stream: !no_stream,
                output,
                json,
            };
            debate_cmd::run_debate(&cfg, &topic, opts).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
