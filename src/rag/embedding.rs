//! Remote embedding client
//!
//! Posts `{input, model, input_type}` to an embeddings endpoint with a bearer
//! token and reads `data[0].embedding` from the reply. Each attempt has its own
//! deadline; failed attempts are retried under a [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{EmbeddingConfig, ENV_API_KEY};
use crate::errors::{RagError, Result};
use crate::rag::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::rag::{EmbeddingVector, InputType};

/// Diagnostic attached to an attempt that hit its deadline
const TIMEOUT_HINT: &str =
    "check VOYAGE_API_KEY, network connectivity to the embeddings endpoint, and region";

/// Anything that can turn text into an embedding
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, input_type: InputType) -> Result<EmbeddingVector>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
    input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

/// HTTP embedding client with per-attempt timeout and linear backoff
pub struct EmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl EmbeddingClient {
    /// Create a client from configuration
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        let policy = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
        );
        let attempt_timeout = config.timeout();

        Ok(Self {
            client,
            config,
            policy,
            attempt_timeout,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Override the per-attempt deadline
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// One network attempt bounded by the attempt deadline
    async fn attempt(&self, text: &str, input_type: InputType, api_key: &str) -> Result<EmbeddingVector> {
        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.config.model,
                input_type,
            });

        let send = async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            parse_embedding_response(status, &body)
        };

        match tokio::time::timeout(self.attempt_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                duration_ms: self.attempt_timeout.as_millis() as u64,
                hint: TIMEOUT_HINT.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str, input_type: InputType) -> Result<EmbeddingVector> {
        // Configuration error; retrying cannot help
        let api_key = self.config.api_key().ok_or_else(|| RagError::MissingCredential {
            var: ENV_API_KEY.to_string(),
        })?;

        let start = Instant::now();
        let vector = self
            .policy
            .run(self.sleeper.as_ref(), |attempt| {
                debug!(attempt, model = %self.config.model, input_type = input_type.as_str(), "requesting embedding");
                self.attempt(text, input_type, api_key)
            })
            .await?;

        debug!(
            dimensions = vector.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "embedding received"
        );
        Ok(vector)
    }
}

/// Interpret an embeddings reply.
///
/// Non-2xx replies use `detail` from the body when it parses, else the
/// status reason. A 2xx reply must carry `data[0].embedding`.
pub(crate) fn parse_embedding_response(status: StatusCode, body: &str) -> Result<EmbeddingVector> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
        return Err(RagError::EmbeddingApi {
            status: status.as_u16(),
            detail,
        });
    }

    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        RagError::MalformedResponse(format!("Embeddings response could not be parsed: {}", e))
    })?;

    parsed
        .data
        .into_iter()
        .next()
        .and_then(|d| d.embedding)
        .ok_or_else(|| RagError::MalformedResponse("Embeddings API returned no embedding".to_string()))
}
