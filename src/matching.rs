//! Matching engine: scores every recipe against a query and ranks them.
//!
//! Scoring is delegated to a [`Scorer`], so callers of
//! [`MatchingEngine::rank`] never need to know which strategy is active.
//!
//! # Strategies
//!
//! | Strategy | Scorer | Needs a model |
//! |----------|--------|---------------|
//! | `lexical` | [`LexicalScorer`] | no |
//! | `embedding` | [`EmbeddingScorer`] | yes |
//! | `auto` | embedding if a provider is configured, else lexical | if embedding |
//!
//! # Ranking
//!
//! 1. Score every recipe (`[0, 1]`).
//! 2. Drop scores strictly below `min_score`.
//! 3. Sort by score (desc), then recipe id (asc).
//! 4. Truncate to `top_k`.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::embedding::{self, cache, EmbeddingProvider};
use crate::error::RecommendError;
use crate::models::{Query, Recipe, ScoredRecipe};

/// A scoring backend.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Strategy label (`"lexical"`, `"embedding"`).
    fn name(&self) -> &str;

    /// One score in `[0, 1]` per corpus recipe, in corpus order.
    async fn score(&self, query: &Query, corpus: &RecipeCorpus) -> Result<Vec<f64>>;
}

/// Ranks the shared corpus with a pluggable scorer.
#[derive(Clone)]
pub struct MatchingEngine {
    corpus: Arc<RecipeCorpus>,
    scorer: Arc<dyn Scorer>,
}

impl MatchingEngine {
    pub fn new(corpus: Arc<RecipeCorpus>, scorer: Arc<dyn Scorer>) -> Self {
        Self { corpus, scorer }
    }

    pub fn corpus(&self) -> &Arc<RecipeCorpus> {
        &self.corpus
    }

    pub fn strategy(&self) -> &str {
        self.scorer.name()
    }

    pub async fn rank(
        &self,
        query: &Query,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredRecipe>, RecommendError> {
        if top_k == 0 {
            return Err(RecommendError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&min_score) {
            return Err(RecommendError::InvalidArgument(format!(
                "min_score must be between 0 and 1, got {}",
                min_score
            )));
        }

        let scores = self
            .scorer
            .score(query, &self.corpus)
            .await
            .map_err(|e| {
                RecommendError::Transient(format!("{} scoring failed: {:#}", self.strategy(), e))
            })?;

        if scores.len() != self.corpus.len() {
            return Err(RecommendError::Transient(format!(
                "{} scorer returned {} scores for {} recipes",
                self.strategy(),
                scores.len(),
                self.corpus.len()
            )));
        }

        let mut ranked: Vec<ScoredRecipe> = self
            .corpus
            .recipes()
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score >= min_score)
            .map(|(recipe, score)| ScoredRecipe {
                recipe: recipe.clone(),
                match_score: score,
                ingredient_match_percentage: ingredient_coverage(query, recipe),
            })
            .collect();

        // Sort: score desc, id asc (deterministic)
        ranked.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.recipe.id.cmp(&b.recipe.id))
        });
        ranked.truncate(top_k);

        tracing::debug!(
            strategy = self.strategy(),
            query = %query.text(),
            results = ranked.len(),
            "ranked recipes"
        );
        Ok(ranked)
    }
}

// ============ Lexical strategy ============

/// Keyword-overlap scoring; needs no model.
pub struct LexicalScorer;

#[async_trait]
impl Scorer for LexicalScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &Query, corpus: &RecipeCorpus) -> Result<Vec<f64>> {
        Ok(corpus
            .recipes()
            .iter()
            .map(|r| lexical_score(query, r))
            .collect())
    }
}

/// Keyword-overlap score for one recipe, in `[0, 1]`.
///
/// Each recipe ingredient contributes 1.0 if some query ingredient equals it
/// or is a substring of it (either direction), otherwise 0.5 for a partial
/// word match. The sum is divided by `sqrt(n)` and by 2, then capped at 1.
/// Dividing by `sqrt(n)` favours recipes with fewer ingredients for the same
/// number of hits.
pub fn lexical_score(query: &Query, recipe: &Recipe) -> f64 {
    let n = recipe.ingredients.len();
    if n == 0 {
        return 0.0;
    }

    let mut weight = 0.0;
    for ingredient in &recipe.ingredients {
        let ingredient = ingredient.trim().to_lowercase();
        if query.iter().any(|q| contains_either(&ingredient, q)) {
            weight += 1.0;
        } else if query.iter().any(|q| partial_word_match(&ingredient, q)) {
            weight += 0.5;
        }
    }

    (weight / (n as f64).sqrt() / 2.0).min(1.0)
}

/// Percentage of the recipe's ingredients matched by the query, rounded to
/// two decimals.
pub fn ingredient_coverage(query: &Query, recipe: &Recipe) -> f64 {
    let n = recipe.ingredients.len();
    if n == 0 {
        return 0.0;
    }

    let covered = recipe
        .ingredients
        .iter()
        .filter(|ingredient| {
            let ingredient = ingredient.trim().to_lowercase();
            query
                .iter()
                .any(|q| contains_either(&ingredient, q) || partial_word_match(&ingredient, q))
        })
        .count();

    let pct = covered as f64 / n as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Equality or substring containment in either direction.
fn contains_either(a: &str, b: &str) -> bool {
    a == b || a.contains(b) || b.contains(a)
}

/// Some word longer than 3 chars in `a` contains, or is contained in, some
/// word longer than 3 chars in `b`.
fn partial_word_match(a: &str, b: &str) -> bool {
    fn long_words(s: &str) -> Vec<&str> {
        s.split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .collect()
    }
    let words_b = long_words(b);
    long_words(a)
        .iter()
        .any(|wa| words_b.iter().any(|wb| wa.contains(wb) || wb.contains(wa)))
}

// ============ Embedding strategy ============

/// Cosine similarity between the query embedding and each recipe's
/// ingredient-text embedding, clipped to `[0, 1]`.
///
/// Recipe vectors are computed once per scorer (optionally read from the
/// on-disk cache) and reused for every query.
pub struct EmbeddingScorer {
    provider: Arc<dyn EmbeddingProvider>,
    cache_path: Option<PathBuf>,
    batch_size: usize,
    recipe_vectors: OnceCell<Arc<Vec<Vec<f32>>>>,
}

impl EmbeddingScorer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache_path: None,
            batch_size: 32,
            recipe_vectors: OnceCell::new(),
        }
    }

    /// Read and write recipe vectors at `path`.
    pub fn with_cache(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    /// Texts per provider call when computing recipe vectors.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Vectors of any other length would score every recipe 0.
    fn check_dims(&self, v: &[f32]) -> Result<()> {
        let expected = self.provider.dims();
        if v.len() != expected {
            anyhow::bail!(
                "embedding model {} returned {}-dimensional vectors, expected {}",
                self.provider.model_name(),
                v.len(),
                expected
            );
        }
        Ok(())
    }

    /// Recipe vectors, computing them on first use.
    pub async fn recipe_vectors(&self, corpus: &RecipeCorpus) -> Result<Arc<Vec<Vec<f32>>>> {
        let vectors = self
            .recipe_vectors
            .get_or_try_init(|| async { self.compute_recipe_vectors(corpus).await.map(Arc::new) })
            .await?;
        Ok(vectors.clone())
    }

    async fn compute_recipe_vectors(&self, corpus: &RecipeCorpus) -> Result<Vec<Vec<f32>>> {
        let key = cache::CacheKey {
            model: self.provider.model_name(),
            dims: self.provider.dims(),
            fingerprint: corpus.fingerprint(),
            count: corpus.len(),
        };

        if let Some(path) = &self.cache_path {
            match cache::load(path, &key) {
                Ok(Some(vectors)) => {
                    tracing::info!(path = %path.display(), "loaded cached recipe embeddings");
                    return Ok(vectors);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("ignoring unreadable embedding cache: {:#}", e),
            }
        }

        tracing::info!(
            recipes = corpus.len(),
            model = self.provider.model_name(),
            "computing recipe embeddings"
        );
        let texts: Vec<String> = corpus.recipes().iter().map(Recipe::ingredient_text).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.provider.embed(batch).await?);
        }
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "embedding provider returned {} vectors for {} recipes",
                vectors.len(),
                texts.len()
            );
        }
        for v in &vectors {
            self.check_dims(v)?;
        }

        if let Some(path) = &self.cache_path {
            if let Err(e) = cache::store(path, &key, &vectors) {
                tracing::warn!("failed to save embedding cache: {:#}", e);
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Scorer for EmbeddingScorer {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(&self, query: &Query, corpus: &RecipeCorpus) -> Result<Vec<f64>> {
        let recipe_vectors = self.recipe_vectors(corpus).await?;
        let query_vec = embedding::embed_query(self.provider.as_ref(), &query.text()).await?;
        self.check_dims(&query_vec)?;

        Ok(recipe_vectors
            .iter()
            .map(|v| (embedding::cosine_similarity(&query_vec, v) as f64).clamp(0.0, 1.0))
            .collect())
    }
}

/// Build the scorer selected by `[matching].strategy`.
pub fn create_scorer(config: &Config, corpus: &RecipeCorpus) -> Result<Arc<dyn Scorer>> {
    let use_embeddings = match config.matching.strategy.as_str() {
        "lexical" => false,
        "embedding" => true,
        "auto" => config.embedding.is_enabled(),
        other => anyhow::bail!("Unknown matching strategy: {}", other),
    };

    if !use_embeddings {
        return Ok(Arc::new(LexicalScorer));
    }

    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let mut scorer = EmbeddingScorer::new(provider).with_batch_size(config.embedding.batch_size);
    if config.corpus.embedding_cache {
        if let Some(path) = corpus.path() {
            scorer = scorer.with_cache(cache::cache_path(path));
        }
    }
    Ok(Arc::new(scorer))
}
