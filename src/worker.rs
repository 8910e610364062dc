//! Matching worker: the far side of [`CommandBackend`](crate::backend::CommandBackend).
//!
//! `pantry worker` reads one request object from stdin, ranks it once with
//! the in-process backend and prints the response object on stdout. Retries
//! belong to the parent, so the worker makes exactly one attempt.
//!
//! ```text
//! stdin:  {"ingredients": ["rice", "egg"], "top_k": 3, "min_score": 0.0}
//! stdout: {"success": true, "count": 3, "recommendations": [...], "query": [...]}
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::config::{BackendConfig, Config};
use crate::corpus::RecipeCorpus;
use crate::error::FailureKind;
use crate::models::RecommendationResult;
use crate::service::{RecommendRequest, RecommendationService};

/// Serve one request from stdin. Returns whether it succeeded.
pub async fn run_worker(config: &Config) -> Result<bool> {
    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .context("Failed to read worker request from stdin")?;

    let result = handle_request(config, &input).await;
    println!("{}", serde_json::to_string(&result)?);
    Ok(result.success)
}

/// Decode, rank and shape a single worker request.
pub async fn handle_request(config: &Config, input: &[u8]) -> RecommendationResult {
    let request: RecommendRequest = match serde_json::from_slice(input) {
        Ok(r) => r,
        Err(e) => {
            return RecommendationResult::failure(
                FailureKind::InvalidArgument,
                format!("Invalid JSON request: {}", e),
                Vec::new(),
            )
        }
    };

    let service = match worker_service(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("worker failed to start: {:#}", e);
            return RecommendationResult::failure(
                FailureKind::Fatal,
                format!("internal error: {:#}", e),
                Vec::new(),
            );
        }
    };
    service.recommend(request).await
}

fn worker_service(config: &Config) -> Result<RecommendationService> {
    let corpus = Arc::new(RecipeCorpus::load(&config.corpus.path)?);

    let mut local = config.clone();
    local.backend = BackendConfig::default();
    local.retry.max_retries = 0;
    RecommendationService::from_config(&local, corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let path = tmp.path().join("recipes.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Fried Rice", "ingredients": ["rice", "egg", "soy sauce"]},
                {"id": 2, "name": "Pancakes", "ingredients": ["flour", "milk", "egg"]}]"#,
        )
        .unwrap();
        let mut config = Config::minimal(path);
        config.matching.strategy = "lexical".to_string();
        config
    }

    #[tokio::test]
    async fn test_handle_request_ranks() {
        let tmp = TempDir::new().unwrap();
        let result = handle_request(
            &config(&tmp),
            br#"{"ingredients": ["Rice", "soy sauce"], "top_k": 1}"#,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.count, 1);
        assert_eq!(result.recommendations[0].recipe.name, "Fried Rice");
        assert_eq!(result.query, vec!["rice", "soy sauce"]);
    }

    #[tokio::test]
    async fn test_handle_request_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let result = handle_request(&config(&tmp), b"not json").await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid JSON request"));
    }

    #[tokio::test]
    async fn test_handle_request_missing_corpus_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(&tmp);
        config.corpus.path = tmp.path().join("missing.json");
        let result = handle_request(&config, br#"{"ingredients": ["rice"]}"#).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Fatal));
        assert!(result.error.unwrap().contains("Recipe file not found"));
    }
}
