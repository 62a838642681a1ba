//! ImpactConsolidator — synthesizes each bill's bucketed impact descriptions
//! into a single Markdown report.
//!
//! Grounded on `consolidar_impacto` in `original_source`'s `nodes.py`: the
//! single-description shortcut, the empty-bucket shortcut, and the two
//! consolidation prompts all mirror that function's branching.

use crate::cancel::CancellationToken;
use crate::impact::aggregator::BillImpactGroup;
use crate::llm::{LlmMap, LlmMapError};
use crate::model::BillImpact;
use crate::prompts::{
    CONSOLIDATION_HIGH_RELEVANCE_PROMPT, CONSOLIDATION_HIGH_RELEVANCE_SYSTEM_PROMPT,
    CONSOLIDATION_LOW_RELEVANCE_PROMPT, CONSOLIDATION_LOW_RELEVANCE_SYSTEM_PROMPT,
};

pub struct ImpactConsolidator {
    concurrency: usize,
    use_cache: bool,
}

/// Join numbered descriptions as `## Impacto N\n{description}`, blank-line separated.
fn format_descriptions(descriptions: &[String]) -> String {
    descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("## Impacto {}\n{}", i + 1, d))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl ImpactConsolidator {
    pub fn new(concurrency: usize, use_cache: bool) -> Self {
        Self {
            concurrency,
            use_cache,
        }
    }

    pub async fn consolidate(
        &self,
        llm_map: &LlmMap,
        groups: Vec<BillImpactGroup>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<BillImpact>, LlmMapError> {
        // consolidated[i] holds the final description for groups[i], filled
        // immediately for the shortcut cases and left None for the cases
        // dispatched to the LLM below.
        let mut consolidated: Vec<Option<String>> = vec![None; groups.len()];
        let mut high_indices = Vec::new();
        let mut high_inputs = Vec::new();
        let mut low_indices = Vec::new();
        let mut low_inputs = Vec::new();

        for (i, group) in groups.iter().enumerate() {
            let descriptions = if group.use_high_relevance_prompt() {
                &group.high_relevance_descriptions
            } else {
                &group.low_relevance_descriptions
            };

            match descriptions.len() {
                0 => consolidated[i] = Some(String::new()),
                1 => consolidated[i] = Some(descriptions[0].clone()),
                _ => {
                    let input = format_descriptions(descriptions);
                    if group.use_high_relevance_prompt() {
                        high_indices.push(i);
                        high_inputs.push(input);
                    } else {
                        low_indices.push(i);
                        low_inputs.push(input);
                    }
                }
            }
        }

        if !high_inputs.is_empty() {
            let results = llm_map
                .map_text(
                    &high_inputs,
                    CONSOLIDATION_HIGH_RELEVANCE_PROMPT,
                    Some(CONSOLIDATION_HIGH_RELEVANCE_SYSTEM_PROMPT),
                    self.concurrency,
                    self.use_cache,
                    cancel,
                )
                .await?;
            for (idx, result) in high_indices.into_iter().zip(results.into_iter()) {
                consolidated[idx] = Some(result);
            }
        }

        if !low_inputs.is_empty() {
            let results = llm_map
                .map_text(
                    &low_inputs,
                    CONSOLIDATION_LOW_RELEVANCE_PROMPT,
                    Some(CONSOLIDATION_LOW_RELEVANCE_SYSTEM_PROMPT),
                    self.concurrency,
                    self.use_cache,
                    cancel,
                )
                .await?;
            for (idx, result) in low_indices.into_iter().zip(results.into_iter()) {
                consolidated[idx] = Some(result);
            }
        }

        Ok(groups
            .into_iter()
            .zip(consolidated.into_iter())
            .map(|(group, description)| BillImpact {
                bill_id: group.bill_id,
                bill_title: group.bill_title,
                impacts: group.impacts,
                max_relevance: group.max_relevance,
                consolidated_description: description.expect("every slot filled above"),
            })
            .collect())
    }
}
