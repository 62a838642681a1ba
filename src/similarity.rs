//! SimilarityMatcher — filters the page×article space by cosine similarity.
//!
//! Grounded on `adapter/embedding.rs`'s `cosine_similarity` (same zero-norm
//! guard) and on `detectar_conflictos` in `original_source`'s `nodes.py`
//! (double loop, per-page descending sort, original-index preservation).

use crate::model::{ArticleRef, CandidatePair, DocumentPage};

/// Cosine similarity between two vectors. Returns `0.0` if either norm is
/// zero rather than propagating `NaN` — zero-norm pairs are silently skipped
/// by the caller, never emitted.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Narrows the page×article space to candidate conflicts via embedding
/// cosine similarity.
pub struct SimilarityMatcher {
    threshold: f32,
}

impl SimilarityMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Produce every `CandidatePair` with `cosine(page_embedding, article_embedding) >= threshold`.
    ///
    /// `pages` and `page_embeddings` are index-aligned (already filtered to
    /// valid pages by the caller, original `DocumentPage::index` preserved).
    /// `articles` and `article_embeddings` are similarly index-aligned.
    ///
    /// Within a page, candidates are sorted by similarity descending before
    /// being appended, so overall output order is: outer loop over pages by
    /// index, inner loop by similarity descending.
    pub fn find_candidates(
        &self,
        pages: &[DocumentPage],
        page_embeddings: &[Vec<f32>],
        articles: &[ArticleRef],
        article_embeddings: &[Vec<f32>],
    ) -> Vec<CandidatePair> {
        let mut all = Vec::new();

        for (page, page_vec) in pages.iter().zip(page_embeddings.iter()) {
            let mut per_page = Vec::new();

            for (article_ref, article_vec) in articles.iter().zip(article_embeddings.iter()) {
                let similarity = cosine_similarity(page_vec, article_vec);
                if similarity == 0.0 {
                    // Either a genuine zero similarity or a zero-norm guard fired;
                    // both are below any positive threshold, so skip uniformly.
                    continue;
                }
                if similarity >= self.threshold {
                    per_page.push(CandidatePair {
                        bill_id: article_ref.bill_id.clone(),
                        bill_title: article_ref.bill_title.clone(),
                        article_number: article_ref.article.number,
                        page_index: page.index,
                        similarity,
                        page_text: page.text.clone(),
                        article_text: article_ref.article.text.clone(),
                    });
                }
            }

            per_page.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            all.extend(per_page);
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Article;

    fn article_ref(bill_id: &str, number: i64, text: &str) -> ArticleRef {
        ArticleRef {
            bill_id: bill_id.to_string(),
            bill_title: format!("Bill {bill_id}"),
            article: Article {
                number,
                kind: "articulo".to_string(),
                text: text.to_string(),
                semantic_description: text.to_string(),
            },
        }
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_norm_does_not_panic_or_nan() {
        let a = vec![1.0, 0.0];
        let zero = vec![0.0, 0.0];
        let sim = cosine_similarity(&a, &zero);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
    }

    #[test]
    fn only_pairs_above_threshold_are_emitted() {
        let matcher = SimilarityMatcher::new(0.325);
        let pages = vec![DocumentPage {
            index: 2,
            text: "empresa procesa datos personales".to_string(),
        }];
        let page_embeddings = vec![vec![1.0, 0.0]];
        let articles = vec![
            article_ref("b1", 1, "tratamiento de datos"),
            article_ref("b1", 2, "impuestos municipales"),
        ];
        let article_embeddings = vec![vec![0.9, 0.1], vec![0.0, 1.0]];

        let candidates =
            matcher.find_candidates(&pages, &page_embeddings, &articles, &article_embeddings);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].article_number, 1);
        assert_eq!(candidates[0].page_index, 2);
        assert!(candidates[0].similarity >= 0.325);
    }

    #[test]
    fn page_index_is_preserved_not_renumbered() {
        let matcher = SimilarityMatcher::new(0.0);
        // Pages 0 and 1 were filtered out upstream as invalid; only page 2 remains,
        // but it keeps its original index.
        let pages = vec![DocumentPage {
            index: 2,
            text: "contenido".to_string(),
        }];
        let page_embeddings = vec![vec![1.0, 0.0]];
        let articles = vec![article_ref("b1", 1, "contenido relacionado")];
        let article_embeddings = vec![vec![1.0, 0.0]];

        let candidates =
            matcher.find_candidates(&pages, &page_embeddings, &articles, &article_embeddings);

        assert_eq!(candidates[0].page_index, 2);
    }

    #[test]
    fn candidates_within_a_page_sorted_by_similarity_descending() {
        let matcher = SimilarityMatcher::new(0.0);
        let pages = vec![DocumentPage {
            index: 0,
            text: "p".to_string(),
        }];
        let page_embeddings = vec![vec![1.0, 0.0]];
        let articles = vec![
            article_ref("b1", 1, "low"),
            article_ref("b1", 2, "high"),
        ];
        // article 1 has lower similarity than article 2
        let article_embeddings = vec![vec![0.1, 0.99], vec![0.99, 0.1]];

        let candidates =
            matcher.find_candidates(&pages, &page_embeddings, &articles, &article_embeddings);

        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].similarity >= candidates[1].similarity);
        assert_eq!(candidates[0].article_number, 2);
    }

    #[test]
    fn empty_inputs_produce_no_candidates() {
        let matcher = SimilarityMatcher::new(0.325);
        let candidates = matcher.find_candidates(&[], &[], &[], &[]);
        assert!(candidates.is_empty());
    }
}
