use anyhow::{anyhow, Result};
use futures::future::try_join_all;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use crate::providers::traits::CompletionProvider;

const DEFAULT_BATCH_SIZE: usize = 64;
const QUERY_CACHE_SIZE: usize = 256;

/// Wraps a provider's embedding endpoint with batching for documents and
/// an LRU cache for repeated queries.
pub struct EmbeddingGenerator {
    provider: Arc<dyn CompletionProvider>,
    batch_size: usize,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::with_batch_size(provider, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(provider: Arc<dyn CompletionProvider>, batch_size: usize) -> Self {
        let capacity = NonZeroUsize::new(QUERY_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            batch_size: batch_size.max(1),
            query_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Batches are sent concurrently; output order follows `texts`.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let requests = texts.chunks(self.batch_size).enumerate().map(|(i, batch)| async move {
            debug!("Embedding batch {} ({} texts)", i + 1, batch.len());
            let vectors = self.provider.generate_embeddings(batch).await?;
            if vectors.len() != batch.len() {
                return Err(anyhow!(
                    "Provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                ));
            }
            Ok(vectors)
        });

        let batches = try_join_all(requests).await?;
        Ok(batches.into_iter().flatten().collect())
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let cached = self.query_cache.lock().get(query).cloned();
        if let Some(embedding) = cached {
            return Ok(embedding);
        }

        let embedding = self.provider.generate_embedding(query).await?;
        self.query_cache
            .lock()
            .put(query.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::Completion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<Completion> {
            Err(anyhow!("not used"))
        }

        async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        async fn get_model_info(&self) -> Result<String> {
            Ok("counting".into())
        }
    }

    #[tokio::test]
    async fn documents_are_embedded_in_batches() {
        let provider = Arc::new(CountingProvider::default());
        let generator = EmbeddingGenerator::with_batch_size(provider.clone(), 2);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let vectors = generator.embed_documents(&texts).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[4][0], 5.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn repeated_queries_hit_the_cache() {
        let provider = Arc::new(CountingProvider::default());
        let generator = EmbeddingGenerator::new(provider.clone());

        let first = generator.embed_query("logic gates").await.unwrap();
        let second = generator.embed_query("logic gates").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        generator.embed_query("flip flops").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
