//! lexconflict: detects semantic conflicts between a corporate document and
//! a set of legislative bills, and synthesizes a per-bill legal-impact report.
//!
//! Pipeline: embed document pages and bill articles, narrow to candidate
//! (page, article) pairs by cosine similarity, extract a structured impact
//! per candidate via an LLM, aggregate per bill, and consolidate each bill's
//! impacts into a single Markdown report.

pub mod cancel;
pub mod config;
pub mod driver;
pub mod embedding;
pub mod impact;
pub mod llm;
pub mod model;
pub mod prompts;
pub mod similarity;
pub mod store;

pub use cancel::CancellationToken;
pub use config::PipelineConfig;
pub use driver::{PipelineDriver, PipelineError};
pub use embedding::{
    EmbeddingCache, EmbeddingCacheError, EmbeddingProvider, EmbeddingProviderError,
    EmbeddingService, EmbeddingServiceError, OpenAiEmbeddingProvider,
};
pub use impact::{BillImpactGroup, ImpactAggregator, ImpactConsolidator, ImpactExtractor};
pub use llm::{LlmMap, LlmMapError, LlmProvider, LlmProviderError, OpenAiLlmProvider};
pub use model::{
    Article, ArticleImpact, ArticleRef, Bill, BillImpact, CandidatePair, DocumentPage, RawImpact,
};
pub use similarity::{cosine_similarity, SimilarityMatcher};
pub use store::{BillStore, JsonFileBillStore, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
