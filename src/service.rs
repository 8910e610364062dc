//! Recommendation service: request validation, normalization, retried
//! execution and response shaping.
//!
//! [`RecommendationService::recommend`] never returns an error. Every
//! outcome, including bad input and exhausted retries, becomes a
//! [`RecommendationResult`] with `success = false` and a message.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{create_backend, MatchBackend, MatchRequest};
use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::error::RecommendError;
use crate::matching::{create_scorer, MatchingEngine};
use crate::models::{Query, RecommendationResult};
use crate::retry::RetryPolicy;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 100;
pub const DEFAULT_MIN_SCORE: f64 = 0.0;

/// Upper bound on a health probe. The probe is never retried.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Incoming request, as loosely typed as it arrives over the wire.
///
/// Fields stay `serde_json::Value` so a wrong shape (a number where a list
/// belongs, a string `top_k`) is reported as a validation failure rather
/// than a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<Value>,
}

impl RecommendRequest {
    pub fn new<I, S>(ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Value> = ingredients
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        Self {
            ingredients: Some(Value::Array(items)),
            top_k: None,
            min_score: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(Value::from(top_k));
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        // `Value::from` maps NaN and infinities to null, which reads as "default".
        let value = serde_json::Number::from_f64(min_score)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(min_score.to_string()));
        self.min_score = Some(value);
        self
    }

    /// The ingredients as given, for echoing back on failures.
    fn raw_query(&self) -> Vec<String> {
        match &self.ingredients {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Check every field in order and build the normalized request.
    /// The first violation wins.
    pub fn validate(&self) -> Result<MatchRequest, RecommendError> {
        let items = match &self.ingredients {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) | None | Some(Value::Null) => {
                return Err(invalid("Please provide at least one ingredient"))
            }
            Some(_) => {
                return Err(invalid(
                    "Please provide at least one ingredient (ingredients must be a list)",
                ))
            }
        };

        let mut names = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) if !s.trim().is_empty() => names.push(s),
                _ => {
                    return Err(invalid(format!(
                        "ingredient at position {} must be a non-empty string",
                        idx
                    )))
                }
            }
        }

        let top_k = match &self.top_k {
            None | Some(Value::Null) => DEFAULT_TOP_K,
            Some(v) => match v.as_u64() {
                Some(n) if (1..=MAX_TOP_K as u64).contains(&n) => n as usize,
                _ => {
                    return Err(invalid(format!(
                        "invalid top_k: expected an integer between 1 and {}, got {}",
                        MAX_TOP_K, v
                    )))
                }
            },
        };

        let min_score = match &self.min_score {
            None | Some(Value::Null) => DEFAULT_MIN_SCORE,
            Some(v) => match v.as_f64() {
                Some(x) if (0.0..=1.0).contains(&x) => x,
                _ => {
                    return Err(invalid(format!(
                        "invalid min_score: expected a number between 0 and 1, got {}",
                        v
                    )))
                }
            },
        };

        let query = Query::normalize(names)
            .ok_or_else(|| invalid("Please provide at least one ingredient"))?;

        Ok(MatchRequest {
            query,
            top_k,
            min_score,
        })
    }
}

fn invalid(msg: impl Into<String>) -> RecommendError {
    RecommendError::InvalidArgument(msg.into())
}

/// Validates requests and runs them against a backend under a retry policy.
#[derive(Clone)]
pub struct RecommendationService {
    backend: Arc<dyn MatchBackend>,
    policy: RetryPolicy,
}

impl RecommendationService {
    pub fn new(backend: Arc<dyn MatchBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Wire up scorer, engine, backend and retry policy from configuration.
    pub fn from_config(config: &Config, corpus: Arc<RecipeCorpus>) -> Result<Self> {
        let scorer = create_scorer(config, &corpus)?;
        let engine = MatchingEngine::new(corpus, scorer);
        tracing::info!(
            strategy = engine.strategy(),
            backend = %config.backend.kind,
            "recommendation service ready"
        );
        let backend = create_backend(&config.backend, engine)?;
        Ok(Self::new(backend, RetryPolicy::from_config(&config.retry)))
    }

    pub async fn recommend(&self, request: RecommendRequest) -> RecommendationResult {
        self.recommend_with(request, &self.policy).await
    }

    async fn recommend_with(
        &self,
        request: RecommendRequest,
        policy: &RetryPolicy,
    ) -> RecommendationResult {
        let match_request = match request.validate() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "rejected recommendation request");
                return RecommendationResult::failure(e.kind(), e.to_string(), request.raw_query());
            }
        };
        let query = match_request.query.to_vec();

        let backend = &self.backend;
        let req = &match_request;
        let outcome = policy
            .run(move |attempt| async move {
                tracing::debug!(attempt, backend = backend.name(), "matching attempt");
                backend.attempt(req).await
            })
            .await;

        match outcome {
            Ok(recommendations) => RecommendationResult::success(recommendations, query),
            Err(e) => {
                match &e {
                    RecommendError::Fatal(_) => {
                        tracing::error!(error = %e, "recommendation failed")
                    }
                    _ => tracing::warn!(error = %e, "recommendation failed"),
                }
                RecommendationResult::failure(e.kind(), e.to_string(), query)
            }
        }
    }

    /// Run a trivial query to check the backend answers.
    ///
    /// A single attempt bounded by [`HEALTH_TIMEOUT`], so a hung backend
    /// reports unhealthy instead of holding the caller through every retry.
    pub async fn health(&self) -> Result<()> {
        let policy = RetryPolicy {
            max_retries: 0,
            attempt_timeout: self.policy.attempt_timeout.min(HEALTH_TIMEOUT),
            ..self.policy.clone()
        };
        let result = self
            .recommend_with(RecommendRequest::new(["salt"]).top_k(1), &policy)
            .await;
        if result.success {
            Ok(())
        } else {
            anyhow::bail!(result
                .error
                .unwrap_or_else(|| "health check failed".to_string()))
        }
    }
}
