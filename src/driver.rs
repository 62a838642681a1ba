//! PipelineDriver — orchestrates the full nine-step pipeline.
//!
//! Grounded on `process_document` in `original_source`'s `nodes.py`, which
//! chains the same stages this driver calls in turn.

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::embedding::{EmbeddingService, EmbeddingServiceError};
use crate::impact::{ImpactAggregator, ImpactConsolidator, ImpactExtractor};
use crate::llm::{LlmMap, LlmMapError};
use crate::model::{ArticleRef, BillImpact, DocumentPage};
use crate::similarity::SimilarityMatcher;
use crate::store::{BillStore, StoreError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("bill store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingServiceError),
    #[error("llm mapping error: {0}")]
    Llm(#[from] LlmMapError),
}

/// Wires every stage's collaborator together and runs them in sequence.
///
/// Invalid pages (empty after trim) are filtered out before embedding.
/// Articles are embedded unfiltered — `EmbeddingService::embed` substitutes
/// its own placeholder for any invalid `semantic_description` — and only
/// filtered to the valid subset afterward, just ahead of the similarity
/// matcher. Original indices are preserved on `DocumentPage`/`ArticleRef`
/// regardless, so downstream `CandidatePair`s still carry the correct
/// `page_index`.
pub struct PipelineDriver {
    bill_store: Arc<dyn BillStore>,
    embedding_service: Arc<EmbeddingService>,
    llm_map: Arc<LlmMap>,
    config: PipelineConfig,
}

impl PipelineDriver {
    pub fn new(
        bill_store: Arc<dyn BillStore>,
        embedding_service: Arc<EmbeddingService>,
        llm_map: Arc<LlmMap>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            bill_store,
            embedding_service,
            llm_map,
            config,
        }
    }

    pub async fn run(
        &self,
        pages: &[DocumentPage],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<BillImpact>, PipelineError> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        // Pages are pre-filtered to valid ones before embedding:
        // `DocumentPage::index` preserves the original page number regardless.
        let valid_pages: Vec<DocumentPage> = pages.iter().filter(|p| p.is_valid()).cloned().collect();
        if valid_pages.is_empty() {
            return Ok(Vec::new());
        }

        let bills = self.bill_store.list_bills().await?;

        // The full article list, including any with an empty (invalid)
        // `semantic_description`, is sent through `embed()` unfiltered —
        // `EmbeddingService::embed` itself substitutes the invalid-entry
        // placeholder. Articles are only filtered to the valid subset
        // afterward, just ahead of the similarity matcher, so an invalid
        // article's placeholder embedding can never produce a CandidatePair.
        let article_refs: Vec<ArticleRef> = bills
            .into_iter()
            .flat_map(|bill| {
                bill.articles.into_iter().map(move |article| ArticleRef {
                    bill_id: bill.id.clone(),
                    bill_title: bill.title.clone(),
                    article,
                })
            })
            .collect();
        if article_refs.is_empty() {
            return Ok(Vec::new());
        }

        let page_texts: Vec<String> = valid_pages.iter().map(|p| p.text.clone()).collect();
        let article_texts: Vec<String> = article_refs
            .iter()
            .map(|a| a.article.semantic_description.clone())
            .collect();

        let page_embeddings = self.embedding_service.embed(&page_texts).await?;
        let article_embeddings = self.embedding_service.embed(&article_texts).await?;

        let (valid_articles, valid_article_embeddings): (Vec<ArticleRef>, Vec<Vec<f32>>) =
            article_refs
                .into_iter()
                .zip(article_embeddings.into_iter())
                .filter(|(a, _)| !a.article.semantic_description.trim().is_empty())
                .unzip();
        if valid_articles.is_empty() {
            return Ok(Vec::new());
        }

        let matcher = SimilarityMatcher::new(self.config.similarity_threshold);
        let pairs = matcher.find_candidates(
            &valid_pages,
            &page_embeddings,
            &valid_articles,
            &valid_article_embeddings,
        );
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let extractor = ImpactExtractor::new(self.config.extraction_concurrency, self.config.use_llm_cache);
        let extracted = extractor.extract(&self.llm_map, &pairs, cancel).await?;
        if extracted.is_empty() {
            return Ok(Vec::new());
        }

        let groups = ImpactAggregator::aggregate(extracted);

        let consolidator = ImpactConsolidator::new(self.config.consolidation_concurrency, self.config.use_llm_cache);
        let impacts = consolidator.consolidate(&self.llm_map, groups, cancel).await?;

        Ok(impacts)
    }
}
