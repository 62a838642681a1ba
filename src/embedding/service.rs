//! EmbeddingService — orchestrates the cache-then-provider embedding
//! algorithm. Grounded step-by-step on `generar_embeddings` in
//! `original_source`'s `nodes.py`.

use super::cache::{text_hash, EmbeddingCache, EmbeddingCacheError};
use super::provider::{EmbeddingProvider, EmbeddingProviderError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingServiceError {
    #[error("embedding cache error: {0}")]
    Cache(#[from] EmbeddingCacheError),
    #[error("embedding provider error: {0}")]
    Provider(#[from] EmbeddingProviderError),
}

/// Text → fixed-dim vector, consulting a persistent content-addressed cache
/// before calling the external embedding provider.
pub struct EmbeddingService {
    cache: Arc<EmbeddingCache>,
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    batch_size: usize,
}

impl EmbeddingService {
    pub fn new(
        cache: Arc<EmbeddingCache>,
        provider: Arc<dyn EmbeddingProvider>,
        model: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            cache,
            provider,
            model: model.into(),
            batch_size,
        }
    }

    /// Embed an ordered sequence of texts, preserving index alignment.
    ///
    /// Any entry that is empty after trimming is classified invalid and
    /// replaced with a single-space placeholder before hashing,
    /// caching, or being sent to the provider — the same substitution
    /// `generar_embeddings` performs internally for every call. Callers are
    /// free to pre-filter invalid entries out of their own lists (e.g. to
    /// preserve an `original_index` for a different purpose downstream), but
    /// `embed()` itself must never error or misalign on an invalid entry.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let processed: Vec<String> = texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    " ".to_string()
                } else {
                    t.clone()
                }
            })
            .collect();

        let hashes: Vec<String> = processed.iter().map(|t| text_hash(t)).collect();

        let cached = self.cache.get_many(&hashes, &self.model)?;
        info!(
            cache_hits = cached.len(),
            total = texts.len(),
            model = %self.model,
            "embedding cache lookup"
        );

        let mut misses_texts = Vec::new();
        let mut misses_indices = Vec::new();
        for (idx, hash) in hashes.iter().enumerate() {
            if !cached.contains_key(hash) {
                misses_texts.push(processed[idx].clone());
                misses_indices.push(idx);
            }
        }

        let mut new_vectors: HashMap<usize, Vec<f32>> = HashMap::new();
        if !misses_texts.is_empty() {
            info!(misses = misses_texts.len(), "generating new embeddings");
            let mut to_insert = Vec::with_capacity(misses_texts.len());

            for (batch_texts, batch_indices) in misses_texts
                .chunks(self.batch_size)
                .zip(misses_indices.chunks(self.batch_size))
            {
                let vectors = self
                    .provider
                    .embed_batch(batch_texts, &self.model)
                    .await?;
                if vectors.len() != batch_texts.len() {
                    return Err(EmbeddingServiceError::Provider(
                        EmbeddingProviderError::BatchSizeMismatch(vectors.len(), batch_texts.len()),
                    ));
                }
                for (idx, (text, vector)) in batch_indices.iter().zip(
                    batch_texts.iter().zip(vectors.into_iter()),
                ) {
                    to_insert.push((text_hash(text), self.model.clone(), vector.clone()));
                    new_vectors.insert(*idx, vector);
                }
            }

            let created_at = chrono::Utc::now().to_rfc3339();
            self.cache.bulk_insert_ignore(&to_insert, &created_at)?;
            info!(inserted = to_insert.len(), "persisted new embeddings to cache");
        }

        let mut out = Vec::with_capacity(texts.len());
        for (idx, hash) in hashes.iter().enumerate() {
            if let Some(vector) = cached.get(hash) {
                out.push(vector.clone());
            } else {
                out.push(
                    new_vectors
                        .remove(&idx)
                        .expect("every miss index was populated by the provider loop above"),
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::MockEmbeddingProvider;

    fn make_service(provider: MockEmbeddingProvider) -> EmbeddingService {
        EmbeddingService::new(
            Arc::new(EmbeddingCache::open_in_memory().unwrap()),
            Arc::new(provider),
            "text-embedding-3-small",
            100,
        )
    }

    #[tokio::test]
    async fn embeds_and_caches_new_texts() {
        let mut vectors = HashMap::new();
        vectors.insert("hola".to_string(), vec![1.0, 0.0]);
        vectors.insert("mundo".to_string(), vec![0.0, 1.0]);
        let provider = MockEmbeddingProvider::new(vectors);
        let service = make_service(provider);

        let result = service
            .embed(&["hola".to_string(), "mundo".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn second_call_hits_cache_and_skips_provider() {
        let mut vectors = HashMap::new();
        vectors.insert("hola".to_string(), vec![1.0, 0.0]);
        let provider = MockEmbeddingProvider::new(vectors);
        let cache = Arc::new(EmbeddingCache::open_in_memory().unwrap());
        let provider_arc = Arc::new(provider);
        let service = EmbeddingService::new(
            cache,
            provider_arc.clone(),
            "text-embedding-3-small",
            100,
        );

        service.embed(&["hola".to_string()]).await.unwrap();
        assert_eq!(provider_arc.call_count(), 1);

        service.embed(&["hola".to_string()]).await.unwrap();
        assert_eq!(provider_arc.call_count(), 1, "second call must be a pure cache hit");
    }

    #[tokio::test]
    async fn empty_input_produces_empty_output_without_provider_call() {
        let provider = MockEmbeddingProvider::new(HashMap::new());
        let provider_arc = Arc::new(provider);
        let service = EmbeddingService::new(
            Arc::new(EmbeddingCache::open_in_memory().unwrap()),
            provider_arc.clone(),
            "text-embedding-3-small",
            100,
        );

        let result = service.embed(&[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(provider_arc.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_entries_are_placeholder_substituted_and_stay_aligned() {
        // "" and "  " are invalid (empty after trim); embed() must classify
        // and substitute them itself, not rely on the caller to pre-filter.
        let mut vectors = HashMap::new();
        vectors.insert(" ".to_string(), vec![0.0, 0.0]);
        vectors.insert("hola".to_string(), vec![1.0, 0.0]);
        let provider = MockEmbeddingProvider::new(vectors);
        let provider_arc = Arc::new(provider);
        let service = EmbeddingService::new(
            Arc::new(EmbeddingCache::open_in_memory().unwrap()),
            provider_arc.clone(),
            "text-embedding-3-small",
            100,
        );

        let result = service
            .embed(&["".to_string(), "hola".to_string(), "  ".to_string()])
            .await
            .unwrap();

        assert_eq!(
            result,
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]],
            "invalid entries at positions 0 and 2 must get the placeholder vector, aligned with their original index"
        );
    }

    #[tokio::test]
    async fn repeated_invalid_entries_share_one_cache_entry() {
        let mut vectors = HashMap::new();
        vectors.insert(" ".to_string(), vec![0.0, 0.0]);
        let provider = MockEmbeddingProvider::new(vectors);
        let provider_arc = Arc::new(provider);
        let service = EmbeddingService::new(
            Arc::new(EmbeddingCache::open_in_memory().unwrap()),
            provider_arc.clone(),
            "text-embedding-3-small",
            100,
        );

        // Three distinct invalid spellings ("", " ", "   ") all hash to the
        // same placeholder and should collapse into a single provider call.
        let result = service
            .embed(&["".to_string(), " ".to_string(), "   ".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(provider_arc.call_count(), 1);
    }

    #[tokio::test]
    async fn batches_misses_by_configured_batch_size() {
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), vec![1.0]);
        vectors.insert("b".to_string(), vec![2.0]);
        vectors.insert("c".to_string(), vec![3.0]);
        let provider = MockEmbeddingProvider::new(vectors);
        let provider_arc = Arc::new(provider);
        let service = EmbeddingService::new(
            Arc::new(EmbeddingCache::open_in_memory().unwrap()),
            provider_arc.clone(),
            "text-embedding-3-small",
            2,
        );

        let result = service
            .embed(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(provider_arc.call_count(), 2, "3 misses at batch size 2 -> 2 calls");
    }
}
