use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::qdrant::{
    value::Kind, CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::qdrant_config::create_qdrant_client;
use crate::document::Chunk;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// A stored chunk together with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), VectorDBError>;

    /// Top `k` chunks by cosine similarity, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorDBError>;

    async fn len(&self) -> Result<usize, VectorDBError>;
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Flat index: every query is scored against every stored vector.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (na * nb)
}

fn check_counts(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), VectorDBError> {
    if chunks.len() != embeddings.len() {
        return Err(VectorDBError::Operation(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), VectorDBError> {
        check_counts(&chunks, &embeddings)?;

        let mut entries = self.entries.write();
        let expected = entries.first().map(|e| e.vector.len());
        for (chunk, vector) in chunks.into_iter().zip(embeddings) {
            let expected = expected.unwrap_or(vector.len());
            if vector.len() != expected {
                return Err(VectorDBError::Dimension {
                    expected,
                    actual: vector.len(),
                });
            }
            let norm = norm(&vector);
            entries.push(Entry { chunk, vector, norm });
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorDBError> {
        let entries = self.entries.read();
        if let Some(first) = entries.first() {
            if first.vector.len() != query.len() {
                return Err(VectorDBError::Dimension {
                    expected: first.vector.len(),
                    actual: query.len(),
                });
            }
        }

        let query_norm = norm(query);
        let mut scored: Vec<ScoredChunk> = entries
            .iter()
            .map(|entry| {
                let score = if entry.norm == 0.0 || query_norm == 0.0 {
                    0.0
                } else {
                    let dot: f32 = entry.vector.iter().zip(query).map(|(x, y)| x * y).sum();
                    dot / (entry.norm * query_norm)
                };
                ScoredChunk {
                    chunk: entry.chunk.clone(),
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize, VectorDBError> {
        Ok(self.entries.read().len())
    }
}

/// Chunks stored in a Qdrant collection; payload carries text, page and index.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
    collection: String,
}

impl QdrantStore {
    pub async fn connect(url: &str, collection: &str) -> Result<Self, VectorDBError> {
        let client = create_qdrant_client(url).await?;
        Ok(Self {
            client: Arc::new(client),
            collection: collection.to_string(),
        })
    }

    async fn ensure_collection(&self, vector_size: usize) -> Result<(), VectorDBError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        if exists {
            debug!("Collection {} already exists, skipping creation", self.collection);
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        info!("Created Qdrant collection {}", self.collection);
        Ok(())
    }
}

/// Same chunk, same id: re-indexing a corpus overwrites its points instead
/// of adding copies.
fn point_id(chunk: &Chunk) -> Uuid {
    let key = format!("{}:{}:{}", chunk.page, chunk.index, chunk.text);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::DoubleValue(d) => Some(*d as i64),
        _ => None,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), VectorDBError> {
        check_counts(&chunks, &embeddings)?;
        let Some(first) = embeddings.first() else {
            return Ok(());
        };
        self.ensure_collection(first.len()).await?;

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(embeddings) {
            let payload: Payload = json!({
                "text": chunk.text,
                "page": chunk.page,
                "chunk": chunk.index,
            })
            .try_into()
            .map_err(|e: qdrant_client::QdrantError| VectorDBError::Operation(e.to_string()))?;
            points.push(PointStruct::new(point_id(&chunk).to_string(), vector, payload));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorDBError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let text = payload_str(&point.payload, "text")?;
                Some(ScoredChunk {
                    chunk: Chunk {
                        text,
                        page: payload_int(&point.payload, "page").unwrap_or(0) as usize,
                        index: payload_int(&point.payload, "chunk").unwrap_or(0) as usize,
                    },
                    score: point.score,
                })
            })
            .collect();
        Ok(results)
    }

    async fn len(&self) -> Result<usize, VectorDBError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
