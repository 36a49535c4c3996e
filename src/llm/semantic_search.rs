use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::database::vector_db::{ScoredChunk, VectorStore};
use crate::document::Chunk;
use crate::llm::embeddings::EmbeddingGenerator;

/// Embeds chunks into a vector store and answers nearest-neighbour queries.
pub struct SemanticSearch {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingGenerator,
}

impl SemanticSearch {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: EmbeddingGenerator) -> Self {
        Self { store, embeddings }
    }

    pub async fn index(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embeddings
            .embed_documents(&texts)
            .await
            .context("Failed to embed corpus chunks")?;

        let count = chunks.len();
        self.store
            .add(chunks, vectors)
            .await
            .context("Failed to store corpus chunks")?;
        info!("Indexed {} chunks", count);
        Ok(count)
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let embedding = self
            .embeddings
            .embed_query(query)
            .await
            .context("Failed to embed query")?;
        Ok(self.store.search(&embedding, k).await?)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.len().await?)
    }
}
