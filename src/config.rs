//! Pipeline tunables.
//!
//! Built via `Default` plus `with_*` builders, the idiom used throughout the
//! collaborators this crate is built on (`AnalysisOrchestrator::with_llm_concurrency`,
//! `ExtractionCoordinator::with_analysis_concurrency`). Overridable from the CLI
//! via clap flags and from `OPENAI_API_KEY` in the environment.

/// Minimum cosine similarity for a (page, article) pair to become a candidate.
pub const SIMILARITY_THRESHOLD: f32 = 0.325;

/// Historical cap on articles considered per page. Never enforced by
/// `SimilarityMatcher` — see DESIGN.md for why it is kept but unused.
pub const MAX_ARTICLES_PER_PAGE: usize = 10;

/// Embedding model name. A cache entry's `model_name` must match this to be
/// eligible for reuse.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding vector dimension for [`EMBEDDING_MODEL`].
pub const EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum cosine similarity for a candidate pair.
    pub similarity_threshold: f32,
    /// Batch size for embedding provider calls.
    pub embedding_batch_size: usize,
    /// In-flight request cap for the extraction fan-out.
    pub extraction_concurrency: usize,
    /// In-flight request cap for the consolidation fan-out.
    pub consolidation_concurrency: usize,
    /// Embedding model name sent to the provider and recorded in the cache.
    pub embedding_model: String,
    /// Path to the persistent embedding cache's SQLite database.
    pub embedding_cache_path: String,
    /// Whether the in-process LLM response cache is consulted and populated.
    pub use_llm_cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: SIMILARITY_THRESHOLD,
            embedding_batch_size: 100,
            extraction_concurrency: 128,
            consolidation_concurrency: 32,
            embedding_model: EMBEDDING_MODEL.to_string(),
            embedding_cache_path: "embedding_cache.sqlite".to_string(),
            use_llm_cache: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_embedding_batch_size(mut self, size: usize) -> Self {
        self.embedding_batch_size = size;
        self
    }

    pub fn with_extraction_concurrency(mut self, limit: usize) -> Self {
        self.extraction_concurrency = limit;
        self
    }

    pub fn with_consolidation_concurrency(mut self, limit: usize) -> Self {
        self.consolidation_concurrency = limit;
        self
    }

    pub fn with_embedding_cache_path(mut self, path: impl Into<String>) -> Self {
        self.embedding_cache_path = path.into();
        self
    }

    pub fn with_llm_cache(mut self, enabled: bool) -> Self {
        self.use_llm_cache = enabled;
        self
    }
}
