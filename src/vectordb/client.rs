use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use tracing::debug;

use super::WriteConsistency;
use super::error::VectorDbError;
use super::index::VectorIndex;
use super::model::{IndexedChunk, PAYLOAD_SCOPE, Scope, SearchHit};

#[derive(Clone)]
/// Qdrant-backed chunk index. Chunk metadata lives in the point payload.
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
    collection: String,
}

impl QdrantIndex {
    /// Creates a client for `url` operating on `collection`.
    pub fn new(url: &str, collection: &str, timeout: Duration) -> Result<Self, VectorDbError> {
        let client = Qdrant::from_url(url).timeout(timeout).build().map_err(|e| {
            VectorDbError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
        })
    }

    /// Returns the underlying Qdrant client.
    pub fn client(&self) -> &Qdrant {
        &self.client
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Performs a basic health check request.
    pub async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Creates the collection (cosine distance, keyword index on the scope field) if
    /// it does not exist yet.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorDbError> {
        let name = &self.collection;
        let exists = self.client.collection_exists(name).await.map_err(|e| {
            VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;

        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine))
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                PAYLOAD_SCOPE,
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(collection = %name, vector_size, "Created chunk collection");
        Ok(())
    }

    /// Writes loader output. Re-upserting a chunk under the same scope replaces it.
    pub async fn upsert_chunks(
        &self,
        chunks: Vec<IndexedChunk>,
        consistency: WriteConsistency,
    ) -> Result<(), VectorDbError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|c| PointStruct::new(c.point_id(), c.vector.clone(), c.payload()))
            .collect();

        self.client
            .upsert_points(
                UpsertPointsBuilder::new(&self.collection, points).wait(consistency.into()),
            )
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Deletes chunks of `scope` by chunk id.
    pub async fn delete_chunks(
        &self,
        scope: &Scope,
        chunk_ids: &[&str],
    ) -> Result<(), VectorDbError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let points_selector = PointsIdsList {
            ids: chunk_ids
                .iter()
                .map(|id| crate::hashing::point_id(scope.as_str(), id).into())
                .collect(),
        };

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(points_selector)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorDbError::DeleteFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Searches the collection, restricted to `scope`.
    pub async fn search(
        &self,
        query: Vec<f32>,
        limit: u64,
        scope: &Scope,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        let filter = Filter::must([Condition::matches(
            PAYLOAD_SCOPE,
            scope.as_str().to_string(),
        )]);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query, limit)
                    .filter(filter)
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(SearchHit::from_scored_point)
            .collect())
    }
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn knn_search(
        &self,
        query: &[f32],
        k: u64,
        scope: &Scope,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        self.search(query.to_vec(), k, scope).await
    }

    async fn is_ready(&self) -> bool {
        self.health_check().await.is_ok()
    }
}
