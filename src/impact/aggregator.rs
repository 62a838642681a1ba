//! ImpactAggregator — groups surviving impacts by bill, computes per-bill
//! max relevance, and partitions descriptions into high/low relevance
//! buckets for consolidation.
//!
//! Grounded on the `proyectos_impacto` grouping loop in `original_source`'s
//! `process_document`.

use crate::model::{ArticleImpact, CandidatePair};
use std::collections::HashMap;

/// A bill's surviving impacts plus the bucketing ImpactConsolidator needs.
pub struct BillImpactGroup {
    pub bill_id: String,
    pub bill_title: String,
    pub impacts: Vec<ArticleImpact>,
    pub max_relevance: i64,
    /// Descriptions with `relevance > 50`.
    pub high_relevance_descriptions: Vec<String>,
    /// Descriptions with `relevance <= 50`.
    pub low_relevance_descriptions: Vec<String>,
}

impl BillImpactGroup {
    /// True iff this bill's consolidation must use the high-relevance prompt.
    pub fn use_high_relevance_prompt(&self) -> bool {
        !self.high_relevance_descriptions.is_empty()
    }
}

pub struct ImpactAggregator;

impl ImpactAggregator {
    /// Groups `(CandidatePair, ArticleImpact)` pairs by `bill_id`, preserving
    /// first-seen bill title and first-seen bill order.
    pub fn aggregate(impacts: Vec<(CandidatePair, ArticleImpact)>) -> Vec<BillImpactGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut by_bill: HashMap<String, (String, Vec<ArticleImpact>)> = HashMap::new();

        for (pair, impact) in impacts {
            by_bill
                .entry(pair.bill_id.clone())
                .or_insert_with(|| {
                    order.push(pair.bill_id.clone());
                    (pair.bill_title.clone(), Vec::new())
                })
                .1
                .push(impact);
        }

        order
            .into_iter()
            .map(|bill_id| {
                let (bill_title, impacts) = by_bill.remove(&bill_id).expect("present by construction");

                let mut max_relevance = 0;
                let mut high = Vec::new();
                let mut low = Vec::new();
                for impact in &impacts {
                    if impact.relevance > max_relevance {
                        max_relevance = impact.relevance;
                    }
                    if impact.relevance > 50 {
                        high.push(impact.impact_description.clone());
                    } else {
                        low.push(impact.impact_description.clone());
                    }
                }

                BillImpactGroup {
                    bill_id,
                    bill_title,
                    impacts,
                    max_relevance,
                    high_relevance_descriptions: high,
                    low_relevance_descriptions: low,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_and_impact(bill_id: &str, article_number: i64, relevance: i64, description: &str) -> (CandidatePair, ArticleImpact) {
        let pair = CandidatePair {
            bill_id: bill_id.to_string(),
            bill_title: format!("Bill {bill_id}"),
            article_number,
            page_index: 0,
            similarity: 0.5,
            page_text: "p".to_string(),
            article_text: "a".to_string(),
        };
        let impact = ArticleImpact {
            article_number,
            internal_excerpt: "x".to_string(),
            article_excerpt: "y".to_string(),
            relevance,
            impact_description: description.to_string(),
        };
        (pair, impact)
    }

    #[test]
    fn groups_by_bill_id_preserving_first_seen_order() {
        let impacts = vec![
            pair_and_impact("b2", 1, 60, "d1"),
            pair_and_impact("b1", 1, 60, "d2"),
            pair_and_impact("b2", 2, 30, "d3"),
        ];
        let groups = ImpactAggregator::aggregate(impacts);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bill_id, "b2");
        assert_eq!(groups[0].impacts.len(), 2);
        assert_eq!(groups[1].bill_id, "b1");
    }

    #[test]
    fn max_relevance_is_correct_per_bill() {
        let impacts = vec![
            pair_and_impact("b1", 1, 30, "d1"),
            pair_and_impact("b1", 2, 80, "d2"),
            pair_and_impact("b1", 3, 55, "d3"),
        ];
        let groups = ImpactAggregator::aggregate(impacts);
        assert_eq!(groups[0].max_relevance, 80);
    }

    #[test]
    fn partitions_by_relevance_threshold_of_50() {
        let impacts = vec![
            pair_and_impact("b1", 1, 50, "low"),
            pair_and_impact("b1", 2, 51, "high"),
        ];
        let groups = ImpactAggregator::aggregate(impacts);
        assert_eq!(groups[0].low_relevance_descriptions, vec!["low"]);
        assert_eq!(groups[0].high_relevance_descriptions, vec!["high"]);
        assert!(groups[0].use_high_relevance_prompt());
    }

    #[test]
    fn all_low_relevance_does_not_use_high_prompt() {
        let impacts = vec![
            pair_and_impact("b1", 1, 30, "d1"),
            pair_and_impact("b1", 2, 40, "d2"),
        ];
        let groups = ImpactAggregator::aggregate(impacts);
        assert!(!groups[0].use_high_relevance_prompt());
        assert_eq!(groups[0].max_relevance, 40);
    }

    #[test]
    fn empty_input_produces_no_groups() {
        let groups = ImpactAggregator::aggregate(vec![]);
        assert!(groups.is_empty());
    }
}
