//! Vector search executor
//!
//! A [`VectorStore`] runs one similarity search per call against an external
//! document store. Connections are opened inside `search` and released before
//! it returns, on success and on error alike.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::Result;
use crate::rag::RetrievedChunk;

pub mod mongo;
pub mod qdrant;

pub use mongo::AtlasVectorStore;
pub use qdrant::QdrantVectorStore;

/// One similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    pub query_vector: Vec<f32>,
    /// Candidate pool the store examines before ranking
    pub num_candidates: usize,
    /// Results returned
    pub limit: usize,
}

/// External store supporting approximate nearest-neighbour search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Run a search; a document without text yields an empty-text chunk
    async fn search(
        &self,
        connection_string: &str,
        request: &VectorSearchRequest,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Build the store selected by configuration
pub fn store_for(settings: &StoreConfig) -> Arc<dyn VectorStore> {
    match settings.backend {
        StoreBackend::Mongodb => Arc::new(AtlasVectorStore::new(settings.clone())),
        StoreBackend::Qdrant => Arc::new(QdrantVectorStore::new(settings.clone())),
    }
}
