//! # debator
//!
//! Retrieval-grounded debates about a scientific paper.
//!
//! An explainer and a reviewer take turns discussing a topic. Before every
//! turn, the previous reply is used to retrieve the most relevant chunks of
//! the paper; those chunks are handed to the speaking model as context and
//! their page markers are recorded as the turn's citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │  Paper   │──▶│  Chunk   │──▶│ SQLite index│
//! │ PDF/text │   │ + embed  │   │  (vectors)  │
//! └──────────┘   └──────────┘   └──────┬──────┘
//!                                      │ top-k per turn
//!                                      ▼
//!                ┌──────────┐   ┌─────────────┐   ┌────────────┐
//!   topic ──────▶│  Debate  │──▶│ Explainer / │──▶│ Transcript │
//!                │   loop   │◀──│  Reviewer   │   │  (md/json) │
//!                └──────────┘   └─────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! debator ingest                         # chunk + embed the paper
//! debator search "cell growth"           # inspect retrieved context
//! debator debate "Explain cell growth"   # run the debate
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | SQLite connection |
//! | [`sqlite_index`] | Persistent similarity index |
//! | [`embedding`] | Embedding providers |
//! | [`ollama`] | Ollama generation backend |
//! | [`source`] | Paper page extraction |
//! | [`ingest`] | `debator ingest` |
//! | [`search`] | `debator search` |
//! | [`debate_cmd`] | `debator debate` |
//! | [`progress`] | Ingestion progress reporting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! Chunking, context assembly, participants, and the debate loop live in
//! the `debator-core` crate.

pub mod config;
pub mod db;
pub mod debate_cmd;
pub mod embedding;
pub mod ingest;
pub mod logging;
pub mod ollama;
pub mod progress;
pub mod search;
pub mod source;
pub mod sqlite_index;
