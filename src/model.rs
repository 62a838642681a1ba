//! Domain types shared across every pipeline stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single numbered provision of a [`Bill`].
///
/// Immutable once loaded. `semantic_description` is the embedding target;
/// `text` is the verbatim legal passage surfaced to the LLM during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub number: i64,
    pub kind: String,
    pub text: String,
    pub semantic_description: String,
}

/// A legislative bill under consideration, with its ordered articles.
///
/// Immutable for the duration of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub title: String,
    /// Originating chamber (`camara_origen` in the source corpus).
    #[serde(default)]
    pub originating_chamber: String,
    /// Bill type (`tipo_proyecto`).
    #[serde(default)]
    pub bill_type: String,
    /// Legislative stage, an integer progression (`etapa`).
    #[serde(default)]
    pub stage: i64,
    /// Current urgency label (`urgencia_actual`).
    #[serde(default)]
    pub current_urgency: String,
    /// ISO-8601 date string (`fecha`).
    #[serde(default)]
    pub date: String,
    pub articles: Vec<Article>,
}

/// A page of the corporate document, indexed by its original (0-based) page number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub index: usize,
    pub text: String,
}

impl DocumentPage {
    /// A page is valid iff it is non-empty after trimming.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// An [`Article`] with a back-reference to the bill it belongs to, produced
/// by flattening every bill's article list ahead of similarity matching.
#[derive(Debug, Clone)]
pub struct ArticleRef {
    pub bill_id: String,
    pub bill_title: String,
    pub article: Article,
}

/// A (page, article) pair whose embeddings passed the similarity threshold.
///
/// `page_index` is always the page's *original* index, never a post-filter
/// position. Within a page, candidates are sorted by `similarity` descending.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub bill_id: String,
    pub bill_title: String,
    pub article_number: i64,
    pub page_index: usize,
    pub similarity: f32,
    pub page_text: String,
    pub article_text: String,
}

impl CandidatePair {
    /// Render the pair into the textual input handed to the extraction prompt.
    pub fn to_extraction_input(&self) -> String {
        format!(
            "## Documento Interno de la Empresa:\n\n{}\n\nArtículo de ley:\n\n{}",
            self.page_text, self.article_text
        )
    }
}

/// The structured shape the LLM must return for a single extraction call.
///
/// `relevance == 0` means "no justifiable relation" and is the dismiss
/// signal — discarded before aggregation.
///
/// Field names are renamed to the Spanish names the extraction prompt
/// instructs the model to emit (`nivel_relevancia`/`extracto_interno`/
/// `extracto_articulo`/`descripcion_impacto`); `schemars` derives the
/// structured-output schema from these renamed names, so the schema the
/// provider enforces agrees with the prompt body.
///
/// `deny_unknown_fields` makes `schemars` emit `additionalProperties: false`
/// on the generated schema, which `complete_structured`'s `strict: true`
/// mode requires.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawImpact {
    #[serde(rename = "extracto_interno")]
    pub internal_excerpt: String,
    #[serde(rename = "extracto_articulo")]
    pub article_excerpt: String,
    /// Relevance in `[0, 100]`, schema-validated by the caller after parsing.
    #[serde(rename = "nivel_relevancia")]
    pub relevance: i64,
    #[serde(rename = "descripcion_impacto")]
    pub impact_description: String,
}

/// A [`RawImpact`] paired with the article number it was extracted against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleImpact {
    pub article_number: i64,
    pub internal_excerpt: String,
    pub article_excerpt: String,
    pub relevance: i64,
    pub impact_description: String,
}

/// Per-bill synthesis of all its surviving [`ArticleImpact`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillImpact {
    pub bill_id: String,
    pub bill_title: String,
    pub impacts: Vec<ArticleImpact>,
    pub max_relevance: i64,
    pub consolidated_description: String,
}
