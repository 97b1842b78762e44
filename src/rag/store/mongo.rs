// MongoDB Atlas `$vectorSearch` backend
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::Result;
use crate::rag::store::{VectorSearchRequest, VectorStore};
use crate::rag::RetrievedChunk;

/// Projected field carrying the similarity score
const SCORE_FIELD: &str = "score";

/// Database the driver uses when the URI names none
const FALLBACK_DATABASE: &str = "test";

/// Aggregation-pipeline vector search against an Atlas collection
pub struct AtlasVectorStore {
    settings: StoreConfig,
}

impl AtlasVectorStore {
    pub fn new(settings: StoreConfig) -> Self {
        Self { settings }
    }

    /// `$vectorSearch` followed by a projection of text and score
    pub fn build_pipeline(&self, request: &VectorSearchRequest) -> Vec<Document> {
        let query_vector: Vec<f64> = request.query_vector.iter().map(|v| *v as f64).collect();

        let mut projection = Document::new();
        projection.insert(self.settings.text_field.clone(), 1);
        projection.insert(SCORE_FIELD, doc! { "$meta": "vectorSearchScore" });

        vec![
            doc! {
                "$vectorSearch": {
                    "index": self.settings.index_name.as_str(),
                    "path": self.settings.vector_field.as_str(),
                    "queryVector": query_vector,
                    "numCandidates": request.num_candidates as i64,
                    "limit": request.limit as i64,
                }
            },
            doc! { "$project": projection },
        ]
    }

    /// Map a projected document; missing text becomes an empty string
    pub fn chunk_from_document(&self, document: &Document) -> RetrievedChunk {
        let text = document
            .get_str(&self.settings.text_field)
            .unwrap_or_default()
            .to_string();
        let score = document.get(SCORE_FIELD).and_then(Bson::as_f64);
        RetrievedChunk { text, score }
    }

    fn database(&self, client: &Client) -> Database {
        match &self.settings.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(FALLBACK_DATABASE)),
        }
    }

    async fn run(&self, client: &Client, request: &VectorSearchRequest) -> Result<Vec<RetrievedChunk>> {
        let collection = self
            .database(client)
            .collection::<Document>(&self.settings.collection);

        let cursor = collection.aggregate(self.build_pipeline(request), None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        Ok(documents.iter().map(|d| self.chunk_from_document(d)).collect())
    }
}

#[async_trait]
impl VectorStore for AtlasVectorStore {
    async fn search(
        &self,
        connection_string: &str,
        request: &VectorSearchRequest,
    ) -> Result<Vec<RetrievedChunk>> {
        let client = Client::with_uri_str(connection_string).await?;
        debug!(
            collection = %self.settings.collection,
            index = %self.settings.index_name,
            num_candidates = request.num_candidates,
            limit = request.limit,
            "running $vectorSearch"
        );

        let result = self.run(&client, request).await;
        client.shutdown().await;
        result
    }
}
