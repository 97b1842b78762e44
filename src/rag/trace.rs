//! Step-by-step execution trace for one retrieval call.
//!
//! The wire format is JSON with a `step` discriminator, snake_case tags and
//! camelCase fields. Unknown tags deserialize to [`TraceStep::Unknown`] so a
//! consumer built against this version keeps working when new steps appear.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::rag::RetrievedChunk;

/// Characters of chunk text kept in a trace preview
pub const PREVIEW_LEN: usize = 120;

/// Appended to a preview that was cut short
pub const ELLIPSIS: char = '…';

/// Preview of one retrieved chunk; never the full text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPreview {
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ChunkPreview {
    pub fn from_chunk(chunk: &RetrievedChunk) -> Self {
        Self {
            preview: preview_text(&chunk.text),
            score: chunk.score,
        }
    }
}

/// One recorded pipeline stage outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TraceStep {
    Query {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Config {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Embedding {
        dimensions: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    EmbedError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    VectorSearch {
        num_candidates: usize,
        limit: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Chunks {
        count: usize,
        chunks: Vec<ChunkPreview>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    VectorSearchError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Context {
        formatted_length: usize,
        snippet: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Timeout {
        message: String,
    },
    TimeoutDiagnosis {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    /// A step kind this build does not know about.
    ///
    /// The incoming tag and fields are dropped on parse, so this serializes
    /// back as `{"step":"unknown"}`. A forwarded trace does not round-trip.
    #[serde(other)]
    Unknown,
}

impl TraceStep {
    /// Build a `chunks` step; `count` always matches the preview list
    pub fn chunks(chunks: &[RetrievedChunk], elapsed_ms: u64, duration_ms: u64) -> Self {
        TraceStep::Chunks {
            count: chunks.len(),
            chunks: chunks.iter().map(ChunkPreview::from_chunk).collect(),
            elapsed_ms: Some(elapsed_ms),
            duration_ms: Some(duration_ms),
        }
    }

    /// Wire tag of this step
    pub fn kind(&self) -> &'static str {
        match self {
            TraceStep::Query { .. } => "query",
            TraceStep::Config { .. } => "config",
            TraceStep::Embedding { .. } => "embedding",
            TraceStep::EmbedError { .. } => "embed_error",
            TraceStep::VectorSearch { .. } => "vector_search",
            TraceStep::Chunks { .. } => "chunks",
            TraceStep::VectorSearchError { .. } => "vector_search_error",
            TraceStep::Context { .. } => "context",
            TraceStep::Timeout { .. } => "timeout",
            TraceStep::TimeoutDiagnosis { .. } => "timeout_diagnosis",
            TraceStep::Unknown => "unknown",
        }
    }

    /// Human label for display
    pub fn label(&self) -> &'static str {
        match self {
            TraceStep::Query { .. } => "1. Query",
            TraceStep::Config { .. } => "Config",
            TraceStep::Embedding { .. } => "2. Embedding",
            TraceStep::EmbedError { .. } => "Embedding error",
            TraceStep::VectorSearch { .. } => "3. Vector search",
            TraceStep::Chunks { .. } => "4. Retrieved chunks",
            TraceStep::VectorSearchError { .. } => "Vector search error",
            TraceStep::Context { .. } => "5. Context for model",
            TraceStep::Timeout { .. } => "Timeout",
            TraceStep::TimeoutDiagnosis { .. } => "Timeout during embedding?",
            TraceStep::Unknown => "Step",
        }
    }

    /// Elapsed and duration badges, if recorded
    pub fn timing(&self) -> StepTiming {
        match *self {
            TraceStep::Embedding { elapsed_ms, duration_ms, .. }
            | TraceStep::Chunks { elapsed_ms, duration_ms, .. } => StepTiming { elapsed_ms, duration_ms },
            TraceStep::Query { elapsed_ms, .. }
            | TraceStep::Config { elapsed_ms, .. }
            | TraceStep::EmbedError { elapsed_ms, .. }
            | TraceStep::VectorSearch { elapsed_ms, .. }
            | TraceStep::VectorSearchError { elapsed_ms, .. }
            | TraceStep::Context { elapsed_ms, .. }
            | TraceStep::TimeoutDiagnosis { elapsed_ms, .. } => StepTiming {
                elapsed_ms,
                duration_ms: None,
            },
            TraceStep::Timeout { .. } | TraceStep::Unknown => StepTiming::default(),
        }
    }

    /// Whether this step records a stage failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TraceStep::Config { .. }
                | TraceStep::EmbedError { .. }
                | TraceStep::VectorSearchError { .. }
                | TraceStep::Timeout { .. }
        )
    }
}

/// Optional timing attached to a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTiming {
    pub elapsed_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

/// Ordered steps of one retrieval call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracePayload {
    pub steps: Vec<TraceStep>,
}

impl TracePayload {
    /// Wire tags in order of occurrence
    pub fn kinds(&self) -> Vec<&'static str> {
        self.steps.iter().map(TraceStep::kind).collect()
    }

    pub fn last(&self) -> Option<&TraceStep> {
        self.steps.last()
    }
}

/// Append-only recorder shared between a retrieval and its outer caller.
///
/// Clones share the same step list and start instant, so a caller that
/// abandons a retrieval on timeout still sees every step recorded so far.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    steps: Arc<Mutex<Vec<TraceStep>>>,
    start_time: Instant,
}

impl TraceRecorder {
    /// Start the clock for a new retrieval
    pub fn new() -> Self {
        Self {
            steps: Arc::new(Mutex::new(Vec::new())),
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since this recorder was created
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Append a step
    pub fn record(&self, step: TraceStep) {
        self.lock().push(step);
    }

    /// Wire tag of the most recent step
    pub fn last_kind(&self) -> Option<&'static str> {
        self.lock().last().map(TraceStep::kind)
    }

    /// Copy of the steps recorded so far
    pub fn snapshot(&self) -> TracePayload {
        TracePayload {
            steps: self.lock().clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceStep>> {
        // A panic while pushing cannot leave the Vec half-written
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Trimmed text cut to [`PREVIEW_LEN`] characters, ellipsis-appended if cut
pub fn preview_text(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(PREVIEW_LEN).collect();
    if chars.next().is_some() {
        let mut preview = head;
        preview.push(ELLIPSIS);
        preview
    } else {
        head
    }
}
