//! ImpactExtractor — applies LlmMap over CandidatePairs with the extraction
//! prompt, dropping zero-relevance results.
//!
//! Grounded on `calcular_impacto_conflictos` in `original_source`'s `nodes.py`.

use crate::cancel::CancellationToken;
use crate::llm::{LlmMap, LlmMapError};
use crate::model::{ArticleImpact, CandidatePair, RawImpact};
use crate::prompts::EXTRACTION_PROMPT;
use tracing::info;

/// Fan-out over candidate pairs, extracting a structured impact for each and
/// discarding the pairs the model judged unrelated (`relevance == 0`).
pub struct ImpactExtractor {
    concurrency: usize,
    use_cache: bool,
}

impl ImpactExtractor {
    pub fn new(concurrency: usize, use_cache: bool) -> Self {
        Self {
            concurrency,
            use_cache,
        }
    }

    /// Returns each surviving pair alongside its extracted impact — the bill
    /// association lives on `CandidatePair`, which `ImpactAggregator` needs
    /// to group by `bill_id` (`ArticleImpact` itself carries no bill fields).
    pub async fn extract(
        &self,
        llm_map: &LlmMap,
        pairs: &[CandidatePair],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<(CandidatePair, ArticleImpact)>, LlmMapError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = pairs.iter().map(|p| p.to_extraction_input()).collect();

        let raw_impacts: Vec<RawImpact> = llm_map
            .map_structured(&inputs, EXTRACTION_PROMPT, self.concurrency, self.use_cache, cancel)
            .await?;

        let mut discarded = 0usize;
        let impacts: Vec<(CandidatePair, ArticleImpact)> = pairs
            .iter()
            .cloned()
            .zip(raw_impacts.into_iter())
            .filter_map(|(pair, raw)| {
                if raw.relevance == 0 {
                    discarded += 1;
                    return None;
                }
                let impact = ArticleImpact {
                    article_number: pair.article_number,
                    internal_excerpt: raw.internal_excerpt,
                    article_excerpt: raw.article_excerpt,
                    relevance: raw.relevance,
                    impact_description: raw.impact_description,
                };
                Some((pair, impact))
            })
            .collect();

        info!(
            extracted = impacts.len(),
            discarded,
            "impact extraction complete"
        );

        Ok(impacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn pair(bill_id: &str, article_number: i64, page_index: usize) -> CandidatePair {
        CandidatePair {
            bill_id: bill_id.to_string(),
            bill_title: format!("Bill {bill_id}"),
            article_number,
            page_index,
            similarity: 0.5,
            page_text: "empresa procesa datos personales".to_string(),
            article_text: "tratamiento de datos personales".to_string(),
        }
    }

    fn llm_map_with(response_json: &str, input: &str) -> LlmMap {
        let mut responses = HashMap::new();
        let rendered = EXTRACTION_PROMPT.replace("{item}", input);
        responses.insert(rendered, response_json.to_string());
        LlmMap::new(Arc::new(MockLlmProvider::new(responses)))
    }

    #[tokio::test]
    async fn zero_relevance_is_discarded() {
        let p = pair("b1", 1, 2);
        let input = p.to_extraction_input();
        let map = llm_map_with(
            r#"{"extracto_interno":"x","extracto_articulo":"y","nivel_relevancia":0,"descripcion_impacto":"sin relacion"}"#,
            &input,
        );
        let extractor = ImpactExtractor::new(128, true);

        let impacts = extractor.extract(&map, &[p], None).await.unwrap();
        assert!(impacts.is_empty());
    }

    #[tokio::test]
    async fn positive_relevance_is_kept_with_article_number_attached() {
        let p = pair("b1", 7, 2);
        let input = p.to_extraction_input();
        let map = llm_map_with(
            r#"{"extracto_interno":"x","extracto_articulo":"y","nivel_relevancia":80,"descripcion_impacto":"impacto critico"}"#,
            &input,
        );
        let extractor = ImpactExtractor::new(128, true);

        let impacts = extractor.extract(&map, &[p], None).await.unwrap();
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].0.bill_id, "b1");
        assert_eq!(impacts[0].1.article_number, 7);
        assert_eq!(impacts[0].1.relevance, 80);
        assert_eq!(impacts[0].1.impact_description, "impacto critico");
    }

    #[tokio::test]
    async fn empty_pairs_produce_empty_impacts() {
        let map = LlmMap::new(Arc::new(MockLlmProvider::new(HashMap::new())));
        let extractor = ImpactExtractor::new(128, true);
        let impacts = extractor.extract(&map, &[], None).await.unwrap();
        assert!(impacts.is_empty());
    }
}
