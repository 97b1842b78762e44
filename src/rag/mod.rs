// Retrieval pipeline: embed the query, search the document store, and
// record every stage in a trace the caller can inspect.
//
// Components:
// - Embedding Client: remote embeddings with bounded retry
// - Vector Store: similarity search against an external document store
// - Context Formatter: numbered context block for prompt injection
// - Trace Recorder: timestamped stage outcomes
// - Pipeline: fail-soft orchestration of the above

use serde::{Deserialize, Serialize};

pub mod context;
pub mod deadline;
pub mod embedding;
pub mod pipeline;
pub mod retry;
pub mod store;
pub mod trace;

// Re-export key types
pub use context::{format_context, CONTEXT_PREAMBLE};
pub use deadline::{build_context, record_context, retrieve_with_deadline, TracedContext};
pub use embedding::{Embedder, EmbeddingClient};
pub use pipeline::{candidate_pool, search_rag, search_rag_with_trace, Retriever};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use store::{VectorSearchRequest, VectorStore};
pub use trace::{ChunkPreview, TracePayload, TraceRecorder, TraceStep};

/// Fixed-length embedding; the length is a deployment contract with the index
pub type EmbeddingVector = Vec<f32>;

/// How the embedding model should treat the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Query,
    Document,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Query => "query",
            InputType::Document => "document",
        }
    }
}

/// One text passage returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    /// Similarity, higher is closer; absent if the store omits it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Chunks plus the trace explaining how they were obtained
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
    pub trace: TracePayload,
}
