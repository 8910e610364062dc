//! `pantry embed`: precompute the recipe embedding cache.
//!
//! Serving with the embedding strategy computes recipe vectors on the first
//! query. Running this ahead of time moves that cost out of the request path
//! and leaves `<stem>_embeddings.json` next to the corpus.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::embedding::{self, cache, EmbeddingProvider};
use crate::matching::EmbeddingScorer;

/// What `embed_corpus` did.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedSummary {
    pub recipes: usize,
    /// The existing cache already matched; nothing was computed.
    pub reused: bool,
}

pub async fn run_embed(config: &Config, force: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let corpus = RecipeCorpus::load(&config.corpus.path)?;
    let cache_path = cache::cache_path(&config.corpus.path);
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);

    let summary = embed_corpus(
        &corpus,
        provider.clone(),
        &cache_path,
        config.embedding.batch_size,
        force,
    )
    .await?;

    println!("embed");
    println!("  recipes: {}", summary.recipes);
    println!("  model: {} ({} dims)", provider.model_name(), provider.dims());
    println!(
        "  cache: {}{}",
        cache_path.display(),
        if summary.reused { " (up to date)" } else { "" }
    );
    Ok(())
}

/// Fill the cache at `cache_path` with vectors for every recipe.
///
/// Fails if the cache cannot be written.
pub async fn embed_corpus(
    corpus: &RecipeCorpus,
    provider: Arc<dyn EmbeddingProvider>,
    cache_path: &Path,
    batch_size: usize,
    force: bool,
) -> Result<EmbedSummary> {
    let model = provider.model_name().to_string();
    let key = cache::CacheKey {
        model: &model,
        dims: provider.dims(),
        fingerprint: corpus.fingerprint(),
        count: corpus.len(),
    };

    if force {
        if cache_path.exists() {
            std::fs::remove_file(cache_path).with_context(|| {
                format!("Failed to remove embedding cache: {}", cache_path.display())
            })?;
            tracing::info!(path = %cache_path.display(), "removed existing embedding cache");
        }
    } else {
        match cache::load(cache_path, &key) {
            Ok(Some(vectors)) => {
                return Ok(EmbedSummary {
                    recipes: vectors.len(),
                    reused: true,
                })
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("replacing unreadable embedding cache: {:#}", e),
        }
    }

    let vectors = EmbeddingScorer::new(provider)
        .with_batch_size(batch_size)
        .recipe_vectors(corpus)
        .await?;
    cache::store(cache_path, &key, &vectors)?;

    Ok(EmbedSummary {
        recipes: vectors.len(),
        reused: false,
    })
}
