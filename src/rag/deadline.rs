// Outer deadline around a whole retrieval, plus the `context` step.
//
// The retriever and this wrapper share one recorder, so when the deadline
// fires the steps recorded so far survive and the diagnosis can name the
// stage that stalled.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::config::{ENV_API_KEY, ENV_CONNECTION_STRING};
use crate::rag::context::{context_snippet, format_context};
use crate::rag::pipeline::Retriever;
use crate::rag::trace::{TracePayload, TraceRecorder, TraceStep};
use crate::rag::{RetrievalResult, RetrievedChunk};

/// Chunks, their formatted context, and the full trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracedContext {
    pub chunks: Vec<RetrievedChunk>,
    pub context: String,
    pub trace: TracePayload,
}

/// Run a traced retrieval under an overall deadline.
///
/// On expiry the partial trace is kept, followed by `timeout` and
/// `timeout_diagnosis` steps, and the chunk list is empty.
pub async fn retrieve_with_deadline(
    retriever: &Retriever,
    query: &str,
    deadline: Duration,
) -> RetrievalResult {
    let recorder = TraceRecorder::new();
    let chunks = run_with_deadline(retriever, query, deadline, &recorder).await;
    RetrievalResult {
        chunks,
        trace: recorder.snapshot(),
    }
}

/// Retrieve under a deadline, format the context, and record a `context` step
pub async fn build_context(
    retriever: &Retriever,
    query: &str,
    deadline: Duration,
    snippet_chars: usize,
) -> TracedContext {
    let recorder = TraceRecorder::new();
    let chunks = run_with_deadline(retriever, query, deadline, &recorder).await;
    let context = format_context(&chunks);
    if !context.is_empty() {
        record_context(&recorder, &context, snippet_chars);
    }
    TracedContext {
        chunks,
        context,
        trace: recorder.snapshot(),
    }
}

/// Append a `context` step describing the text sent to the model
pub fn record_context(recorder: &TraceRecorder, formatted: &str, snippet_chars: usize) {
    recorder.record(TraceStep::Context {
        formatted_length: formatted.chars().count(),
        snippet: context_snippet(formatted, snippet_chars),
        elapsed_ms: Some(recorder.elapsed_ms()),
    });
}

async fn run_with_deadline(
    retriever: &Retriever,
    query: &str,
    deadline: Duration,
    recorder: &TraceRecorder,
) -> Vec<RetrievedChunk> {
    match tokio::time::timeout(deadline, retriever.retrieve_into(query, recorder)).await {
        Ok(chunks) => chunks,
        Err(_) => {
            let deadline_ms = deadline.as_millis() as u64;
            let last_kind = recorder.last_kind();
            warn!(deadline_ms, last_step = ?last_kind, "retrieval deadline exceeded");
            recorder.record(TraceStep::Timeout {
                message: format!("Retrieval timed out after {}ms", deadline_ms),
            });
            recorder.record(TraceStep::TimeoutDiagnosis {
                message: diagnose(last_kind),
                elapsed_ms: Some(recorder.elapsed_ms()),
            });
            Vec::new()
        }
    }
}

/// Explain a timeout from the last step recorded before it
fn diagnose(last_kind: Option<&str>) -> String {
    match last_kind {
        Some("query") => format!(
            "Stalled while embedding the query; check {} and network access to the embeddings endpoint",
            ENV_API_KEY
        ),
        Some("embedding") | Some("vector_search") => format!(
            "Stalled in vector search; check that {} is reachable and the vector index is ready",
            ENV_CONNECTION_STRING
        ),
        Some(kind) => format!("Stalled after the {} step", kind),
        None => "Stalled before retrieval started".to_string(),
    }
}
