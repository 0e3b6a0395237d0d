//! `debator debate`: run the explainer/reviewer debate and save the transcript.

use anyhow::{Context, Result};
use debator_core::context::ContextAssembler;
use debator_core::debate::{DebateLoop, Delivery, NoopObserver, TurnObserver};
use debator_core::generation::GenerationBackend;
use debator_core::index::SimilarityIndex;
use debator_core::models::ConversationTurn;
use debator_core::participant::Participant;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::ollama::OllamaBackend;
use crate::sqlite_index::SqliteIndex;

/// Command-line overrides for a debate run.
#[derive(Debug, Clone, Default)]
pub struct DebateOptions {
    pub stream: bool,
    pub output: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Backends for the explainer and reviewer. Both roles share one instance
/// when they use the same model.
pub fn build_backends(
    cfg: &Config,
) -> Result<(Arc<dyn GenerationBackend>, Arc<dyn GenerationBackend>)> {
    let window = cfg.history_window();
    let explainer: Arc<dyn GenerationBackend> = Arc::new(OllamaBackend::new(
        cfg.explainer_model(),
        &cfg.generation,
        window,
    )?);

    if cfg.explainer_model() == cfg.reviewer_model() {
        return Ok((Arc::clone(&explainer), explainer));
    }

    let reviewer: Arc<dyn GenerationBackend> = Arc::new(OllamaBackend::new(
        cfg.reviewer_model(),
        &cfg.generation,
        window,
    )?);
    Ok((explainer, reviewer))
}

/// Prints each turn to stdout as it is generated.
struct StdoutObserver;

impl TurnObserver for StdoutObserver {
    fn turn_started(&mut self, _turn: usize, speaker: &str) {
        println!("\n## {}", speaker);
    }

    fn fragment(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn turn_finished(&mut self, turn: &ConversationTurn) {
        if turn.citations.is_empty() {
            println!();
        } else {
            println!("\n_Sources_: {}", turn.citations.join(" "));
        }
    }
}

/// Open the index used for retrieval, or `None` when no embedder can be
/// built. Either failure leaves retrieval empty instead of aborting the command.
pub(crate) async fn open_retrieval(cfg: &Config) -> Option<SqliteIndex> {
    match create_embedder(&cfg.embedding) {
        Ok(embedder) => Some(SqliteIndex::open_or_detach(&cfg.index_path(), embedder).await),
        Err(e) => {
            tracing::warn!(
                error = %format!("{:#}", e),
                "embedder unavailable; continuing without retrieval"
            );
            None
        }
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output: {}", path.display()))
}

pub async fn run_debate(cfg: &Config, topic: &str, opts: DebateOptions) -> Result<()> {
    let (explainer_backend, reviewer_backend) = build_backends(cfg)?;
    let index = open_retrieval(cfg).await;
    let assembler = ContextAssembler::new(
        index.as_ref().map(|i| i as &dyn SimilarityIndex),
        cfg.retrieval.top_k,
    );

    let delivery = if opts.stream {
        Delivery::Streaming
    } else {
        Delivery::Complete
    };
    let debate = DebateLoop::new(
        Participant::explainer(explainer_backend),
        Participant::reviewer(reviewer_backend),
        cfg.rounds,
        assembler,
    )
    .with_delivery(delivery);

    let transcript = if opts.stream {
        debate.run_observed(topic, &mut StdoutObserver).await?
    } else {
        debate.run_observed(topic, &mut NoopObserver).await?
    };

    let output = opts.output.unwrap_or_else(|| cfg.output.path.clone());
    write_output(&output, &transcript.to_markdown())?;

    if let Some(json_path) = &opts.json {
        write_output(json_path, &transcript.to_json()?)?;
    }

    println!("\nDebate complete. Output written to {}", output.display());
    Ok(())
}
