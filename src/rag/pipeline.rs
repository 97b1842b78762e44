// End-to-end retrieval: query -> config check -> embed -> vector search.
//
// Every stage outcome is appended to the trace. No error crosses the public
// boundary; a failed stage ends the run with an empty chunk list.
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::{RagConfig, StoreConfig, ENV_CONNECTION_STRING};
use crate::errors::Result;
use crate::rag::embedding::{Embedder, EmbeddingClient};
use crate::rag::store::{store_for, VectorSearchRequest, VectorStore};
use crate::rag::trace::{TraceRecorder, TraceStep};
use crate::rag::{InputType, RetrievalResult, RetrievedChunk};

/// Over-fetch multiplier applied to `top_k`
const CANDIDATE_MULTIPLIER: usize = 20;

/// Smallest candidate pool handed to the store
const MIN_CANDIDATES: usize = 100;

/// Candidate pool examined by the store before it ranks `top_k` results
pub fn candidate_pool(top_k: usize) -> usize {
    (top_k * CANDIDATE_MULTIPLIER).max(MIN_CANDIDATES)
}

/// Retrieval orchestrator
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: StoreConfig,
}

impl Retriever {
    /// Assemble from explicit parts
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, settings: StoreConfig) -> Self {
        Self {
            embedder,
            store,
            settings,
        }
    }

    /// Build the HTTP embedder and configured store backend
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder = EmbeddingClient::new(config.embedding.clone())?;
        Ok(Self::new(
            Arc::new(embedder),
            store_for(&config.store),
            config.store.clone(),
        ))
    }

    /// Chunks only; never fails
    pub async fn search_rag(&self, query: &str) -> Vec<RetrievedChunk> {
        self.search_rag_with_trace(query).await.chunks
    }

    /// Chunks plus the step-by-step trace; never fails
    pub async fn search_rag_with_trace(&self, query: &str) -> RetrievalResult {
        let recorder = TraceRecorder::new();
        let chunks = self.retrieve_into(query, &recorder).await;
        RetrievalResult {
            chunks,
            trace: recorder.snapshot(),
        }
    }

    /// Run the pipeline, appending steps to a caller-owned recorder.
    ///
    /// `elapsedMs` on every step is measured from the recorder's creation.
    pub async fn retrieve_into(&self, query: &str, recorder: &TraceRecorder) -> Vec<RetrievedChunk> {
        recorder.record(TraceStep::Query {
            query: query.to_string(),
            elapsed_ms: Some(0),
        });

        let Some(connection_string) = self.settings.connection_string() else {
            let message = format!("{} is not set", ENV_CONNECTION_STRING);
            warn!("{}", message);
            recorder.record(TraceStep::Config {
                message,
                elapsed_ms: Some(recorder.elapsed_ms()),
            });
            return Vec::new();
        };

        // Step 1: embed the query
        let embed_start = Instant::now();
        let query_vector = match self.embedder.embed(query, InputType::Query).await {
            Ok(vector) => {
                recorder.record(TraceStep::Embedding {
                    dimensions: vector.len(),
                    elapsed_ms: Some(recorder.elapsed_ms()),
                    duration_ms: Some(embed_start.elapsed().as_millis() as u64),
                });
                vector
            }
            Err(err) => {
                warn!(error = %err, "query embedding failed");
                recorder.record(TraceStep::EmbedError {
                    message: err.to_string(),
                    elapsed_ms: Some(recorder.elapsed_ms()),
                });
                return Vec::new();
            }
        };

        // Step 2: similarity search, recorded before the call is issued
        let limit = self.settings.top_k;
        let request = VectorSearchRequest {
            query_vector,
            num_candidates: candidate_pool(limit),
            limit,
        };
        recorder.record(TraceStep::VectorSearch {
            num_candidates: request.num_candidates,
            limit,
            elapsed_ms: Some(recorder.elapsed_ms()),
        });

        let search_start = Instant::now();
        match self.store.search(connection_string, &request).await {
            Ok(chunks) => {
                let duration_ms = search_start.elapsed().as_millis() as u64;
                debug!(count = chunks.len(), duration_ms, "chunks retrieved");
                recorder.record(TraceStep::chunks(&chunks, recorder.elapsed_ms(), duration_ms));
                chunks
            }
            Err(err) => {
                warn!(error = %err, "vector search failed");
                recorder.record(TraceStep::VectorSearchError {
                    message: err.to_string(),
                    elapsed_ms: Some(recorder.elapsed_ms()),
                });
                Vec::new()
            }
        }
    }
}

/// Fail-soft search using configuration from the file and environment
pub async fn search_rag(query: &str) -> Vec<RetrievedChunk> {
    search_rag_with_trace(query).await.chunks
}

/// Traced search using configuration from the file and environment.
///
/// A configuration that cannot be loaded is reported as a `config` step.
pub async fn search_rag_with_trace(query: &str) -> RetrievalResult {
    search_with_config(query, RagConfig::load()).await
}

/// Traced search from an already attempted config load
async fn search_with_config(query: &str, config: Result<RagConfig>) -> RetrievalResult {
    let retriever = config.and_then(|config| Retriever::from_config(&config));

    match retriever {
        Ok(retriever) => retriever.search_rag_with_trace(query).await,
        Err(err) => {
            let recorder = TraceRecorder::new();
            recorder.record(TraceStep::Query {
                query: query.to_string(),
                elapsed_ms: Some(0),
            });
            recorder.record(TraceStep::Config {
                message: err.to_string(),
                elapsed_ms: Some(recorder.elapsed_ms()),
            });
            RetrievalResult {
                chunks: Vec::new(),
                trace: recorder.snapshot(),
            }
        }
    }
}
