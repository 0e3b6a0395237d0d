//! `debator search`: print the context a debate turn would receive.

use anyhow::Result;
use debator_core::context::ContextAssembler;
use debator_core::index::SimilarityIndex;

use crate::config::Config;
use crate::debate_cmd::open_retrieval;

pub async fn run_search(cfg: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let index = open_retrieval(cfg).await;
    let top_k = k.unwrap_or(cfg.retrieval.top_k).max(1);

    let assembler = ContextAssembler::new(
        index.as_ref().map(|i| i as &dyn SimilarityIndex),
        top_k,
    );
    let context = assembler.assemble(query).await;

    if context.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    println!("{}", context.text);
    println!();
    println!("Sources: {}", context.citations.join(" "));
    Ok(())
}
