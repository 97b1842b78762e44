// Qdrant backend: the candidate pool maps to the HNSW `ef` search parameter
use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, SearchParamsBuilder, SearchPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::Result;
use crate::rag::store::{VectorSearchRequest, VectorStore};
use crate::rag::RetrievedChunk;

/// Similarity search against a Qdrant collection
pub struct QdrantVectorStore {
    settings: StoreConfig,
}

impl QdrantVectorStore {
    pub fn new(settings: StoreConfig) -> Self {
        Self { settings }
    }

    fn search_points(&self, request: &VectorSearchRequest) -> SearchPointsBuilder {
        let mut builder = SearchPointsBuilder::new(
            self.settings.collection.clone(),
            request.query_vector.clone(),
            request.limit as u64,
        )
        .with_payload(true)
        .params(SearchParamsBuilder::default().hnsw_ef(request.num_candidates as u64));

        // An empty name targets the collection's default vector
        if !self.settings.vector_field.is_empty() {
            builder = builder.vector_name(self.settings.vector_field.clone());
        }
        builder
    }

    /// Map a point payload; missing or non-string text becomes an empty string
    pub fn chunk_from_payload(&self, payload: &HashMap<String, QdrantValue>, score: f32) -> RetrievedChunk {
        let text = payload
            .get(&self.settings.text_field)
            .and_then(qdrant_value_to_string)
            .unwrap_or_default();
        RetrievedChunk {
            text,
            score: Some(score as f64),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn search(
        &self,
        connection_string: &str,
        request: &VectorSearchRequest,
    ) -> Result<Vec<RetrievedChunk>> {
        // Dropped at the end of this call on every path
        let client = Qdrant::from_url(connection_string).build()?;
        debug!(
            collection = %self.settings.collection,
            hnsw_ef = request.num_candidates,
            limit = request.limit,
            "running qdrant search"
        );

        let response = client.search_points(self.search_points(request)).await?;

        Ok(response
            .result
            .iter()
            .map(|point| self.chunk_from_payload(&point.payload, point.score))
            .collect())
    }
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    })
}
