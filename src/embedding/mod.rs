//! Text → vector embedding with a persistent content-addressed cache.

pub mod cache;
pub mod provider;
pub mod service;

pub use cache::{text_hash, EmbeddingCache, EmbeddingCacheError};
pub use provider::{EmbeddingProvider, EmbeddingProviderError, MockEmbeddingProvider, OpenAiEmbeddingProvider};
pub use service::{EmbeddingService, EmbeddingServiceError};
