//! # debator core
//!
//! I/O-free logic for debator: data models, page-aware chunking, the
//! similarity index abstraction, citation-annotated context assembly, the
//! generation backend abstraction with its history window, debate
//! participants, and the round-based debate loop.
//!
//! This crate has no tokio, sqlx, HTTP, or filesystem dependencies. Concrete
//! backends (SQLite index, Ollama generation, embedding providers) live in
//! the `debator` application crate.
//!
//! ## Data flow
//!
//! ```text
//! pages ──▶ chunk ──▶ SimilarityIndex            (ingestion)
//!
//! topic ──▶ DebateLoop ──▶ ContextAssembler ──▶ SimilarityIndex
//!               │
//!               ▼
//!          Participant ──▶ GenerationBackend ──▶ Transcript
//! ```

pub mod chunk;
pub mod context;
pub mod debate;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod models;
pub mod participant;
pub mod transcript;
