//! LlmMap — bounded-concurrency fan-out to an LLM with an in-process response
//! cache and optional structured-output parsing.
//!
//! Grounded step-by-step on `_get_cache_key`/`_llm_map`/`llm_map`/`clear_llm_cache`
//! in `original_source`'s `llm_map.py`, and on `analysis/orchestrator.rs`'s
//! `llm_semaphore` concurrency shape (generalized from sequential-with-permit
//! to concurrent-with-permit, since the orchestrator's own loop awaits each
//! analyzer in turn while this stage must genuinely overlap requests).

use crate::cancel::CancellationToken;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::provider::{LlmProvider, LlmProviderError};

#[derive(Debug, thiserror::Error)]
pub enum LlmMapError {
    #[error("LLM provider error: {0}")]
    Provider(#[from] LlmProviderError),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("LLM map task panicked: {0}")]
    TaskPanicked(String),
}

/// 16-char hex prefix of SHA-256(content).
fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Bounded-concurrency fan-out mapper over an `LlmProvider`, with an
/// in-process `(template_digest, input_digest) -> raw result` cache that
/// survives for the process lifetime.
pub struct LlmMap {
    provider: Arc<dyn LlmProvider>,
    cache: DashMap<(String, String), String>,
}

impl LlmMap {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
        }
    }

    /// Clear the in-process response cache, returning the number of entries removed.
    pub fn clear_cache(&self) -> usize {
        let count = self.cache.len();
        self.cache.clear();
        count
    }

    /// Render `template`'s single `{item}` placeholder with `input`. The
    /// system message (if any) carries no `{item}` placeholder of its own —
    /// it is sent verbatim alongside the rendered user prompt.
    fn render(template: &str, input: &str) -> String {
        template.replace("{item}", input)
    }

    /// Apply `template` over `inputs`, returning the first choice's raw text
    /// per input, in original order. `None` cancellation token means the
    /// fan-out cannot be interrupted early.
    ///
    /// `system`, when present, is sent as a leading system-role message on
    /// every call and is folded into the cache-key digest alongside
    /// `template` — two templates that share `{item}` wording but differ in
    /// system persona (e.g. the two consolidation prompts) must never
    /// collide in the response cache.
    pub async fn map_text(
        &self,
        inputs: &[String],
        template: &str,
        system: Option<&str>,
        concurrency: usize,
        use_cache: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<String>, LlmMapError> {
        self.map_with(
            inputs,
            template,
            system,
            concurrency,
            use_cache,
            cancel,
            move |provider, system, prompt| {
                let provider = provider.clone();
                let system = system.map(|s| s.to_string());
                let prompt = prompt.to_string();
                Box::pin(async move { provider.complete_text(system.as_deref(), &prompt).await })
            },
        )
        .await
    }

    /// Apply `template` over `inputs` using the provider's structured-output
    /// mode, parsing each result into `T`.
    pub async fn map_structured<T>(
        &self,
        inputs: &[String],
        template: &str,
        concurrency: usize,
        use_cache: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<T>, LlmMapError>
    where
        T: DeserializeOwned + JsonSchema + Send + 'static,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .expect("schemars schema always serializes");
        let raw = self
            .map_with(
                inputs,
                template,
                None,
                concurrency,
                use_cache,
                cancel,
                move |provider, _system, prompt| {
                    let provider = provider.clone();
                    let prompt = prompt.to_string();
                    let schema = schema.clone();
                    Box::pin(async move { provider.complete_structured(&prompt, schema).await })
                },
            )
            .await?;

        raw.into_iter()
            .map(|text| {
                serde_json::from_str(&text)
                    .map_err(|e| LlmMapError::Provider(LlmProviderError::Parse(e.to_string())))
            })
            .collect()
    }

    /// Run a sequence of text-mode templates, each stage's output coerced to
    /// string and fed as the next stage's input. Exposed as a distinct entry
    /// point rather than an overload of `map_text`.
    pub async fn map_pipeline(
        &self,
        inputs: &[String],
        templates: &[&str],
        concurrency: usize,
        use_cache: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<String>, LlmMapError> {
        let mut current = inputs.to_vec();
        for template in templates {
            current = self
                .map_text(&current, template, None, concurrency, use_cache, cancel)
                .await?;
        }
        Ok(current)
    }

    /// Shared fan-out core: cache lookup, bounded concurrent dispatch via a
    /// semaphore-guarded `JoinSet`, cache population, order-preserving merge.
    async fn map_with<F>(
        &self,
        inputs: &[String],
        template: &str,
        system: Option<&str>,
        concurrency: usize,
        use_cache: bool,
        cancel: Option<&CancellationToken>,
        dispatch: F,
    ) -> Result<Vec<String>, LlmMapError>
    where
        F: Fn(
                &Arc<dyn LlmProvider>,
                Option<&str>,
                &str,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<String, LlmProviderError>> + Send>,
            > + Send
            + Sync
            + 'static,
    {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        // System message folded into the digest, so a template paired with a
        // different system persona never hits another persona's cache entry.
        let template_digest = match system {
            Some(system) => digest(&format!("{system}\u{0}{template}")),
            None => digest(template),
        };
        let mut results: Vec<Option<String>> = vec![None; inputs.len()];
        let mut uncached_indices = Vec::new();

        let mut cache_hits = 0usize;
        for (idx, input) in inputs.iter().enumerate() {
            let key = (template_digest.clone(), digest(input));
            if use_cache {
                if let Some(cached) = self.cache.get(&key) {
                    results[idx] = Some(cached.clone());
                    cache_hits += 1;
                    continue;
                }
            }
            uncached_indices.push(idx);
        }
        tracing::info!(
            cache_hits,
            cache_misses = uncached_indices.len(),
            "llm map cache lookup"
        );

        if !uncached_indices.is_empty() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(LlmMapError::Cancelled);
                }
            }

            let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
            let dispatch = Arc::new(dispatch);
            let mut set: JoinSet<(usize, Result<String, LlmProviderError>)> = JoinSet::new();

            for idx in &uncached_indices {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        break;
                    }
                }
                let permit_holder = semaphore.clone();
                let provider = self.provider.clone();
                let dispatch = dispatch.clone();
                let prompt = Self::render(template, &inputs[*idx]);
                let system = system.map(|s| s.to_string());
                let idx = *idx;
                let cancel = cancel.cloned();

                set.spawn(async move {
                    let _permit = permit_holder.acquire_owned().await.expect("semaphore not closed");
                    if let Some(token) = &cancel {
                        if token.is_cancelled() {
                            return (idx, Err(LlmProviderError::Request("cancelled".to_string())));
                        }
                    }
                    let result = dispatch(&provider, system.as_deref(), &prompt).await;
                    (idx, result)
                });
            }

            while let Some(joined) = set.join_next().await {
                let (idx, result) =
                    joined.map_err(|e| LlmMapError::TaskPanicked(e.to_string()))?;
                let text = result?;
                if use_cache {
                    let key = (template_digest.clone(), digest(&inputs[idx]));
                    self.cache.insert(key, text.clone());
                }
                results[idx] = Some(text);
            }

            if let Some(token) = cancel {
                if token.is_cancelled() && results.iter().any(Option::is_none) {
                    return Err(LlmMapError::Cancelled);
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|r| r.expect("every index filled by cache hit or dispatch"))
            .collect())
    }
}
