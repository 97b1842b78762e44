//! ragtrace - traced retrieval for retrieval-augmented generation
//!
//! Turns a question into ranked knowledge-base passages and a timed,
//! step-by-step trace of how they were obtained.
//!
//! # Architecture
//!
//! - **Embedding**: remote embeddings with per-attempt timeout and linear backoff
//! - **Store**: similarity search against MongoDB Atlas or Qdrant
//! - **Pipeline**: fail-soft orchestration recording a [`rag::TracePayload`]
//! - **Context**: numbered context block for prompt injection

pub mod errors;
pub use errors::{ErrorKind, RagError, Result};

pub mod config;
pub use config::RagConfig;

pub mod rag;
pub use rag::{RetrievalResult, RetrievedChunk, Retriever};

pub mod render;
pub mod cli;
