//! Where a matching attempt actually runs.
//!
//! The service only sees [`MatchBackend::attempt`]; whether that ranks the
//! corpus on a local task or hands the request to a child process is a
//! configuration choice (`[backend].kind`).
//!
//! Both backends tie the attempt's lifetime to the returned future: dropping
//! it (for example when the retry policy's timeout fires) aborts the spawned
//! task or kills the worker process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::config::BackendConfig;
use crate::error::RecommendError;
use crate::matching::MatchingEngine;
use crate::models::{Query, RecommendationResult, ScoredRecipe};

/// A validated, normalized matching request.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub query: Query,
    pub top_k: usize,
    pub min_score: f64,
}

/// Wire form sent to a worker process on stdin.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub ingredients: Vec<String>,
    pub top_k: usize,
    pub min_score: f64,
}

impl From<&MatchRequest> for WorkerRequest {
    fn from(req: &MatchRequest) -> Self {
        Self {
            ingredients: req.query.to_vec(),
            top_k: req.top_k,
            min_score: req.min_score,
        }
    }
}

#[async_trait]
pub trait MatchBackend: Send + Sync {
    fn name(&self) -> &str;

    /// One matching attempt. Failures are classified so the retry policy
    /// can tell what is worth retrying.
    async fn attempt(&self, request: &MatchRequest) -> Result<Vec<ScoredRecipe>, RecommendError>;
}

// ============ In-process ============

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Ranks on a spawned tokio task inside this process.
pub struct InProcessBackend {
    engine: MatchingEngine,
}

impl InProcessBackend {
    pub fn new(engine: MatchingEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MatchBackend for InProcessBackend {
    fn name(&self) -> &str {
        "in_process"
    }

    async fn attempt(&self, request: &MatchRequest) -> Result<Vec<ScoredRecipe>, RecommendError> {
        let engine = self.engine.clone();
        let request = request.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            engine
                .rank(&request.query, request.top_k, request.min_score)
                .await
        }));

        match (&mut task.0).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(RecommendError::Fatal(
                "matching task panicked".to_string(),
            )),
            Err(e) => Err(RecommendError::Transient(format!(
                "matching task cancelled: {}",
                e
            ))),
        }
    }
}

// ============ Worker process ============

/// Runs each attempt in a fresh worker process speaking JSON over stdio.
///
/// The worker receives a [`WorkerRequest`] on stdin and must print a
/// response object (`success`, `recommendations`, `error`, ...) on stdout.
/// `pantry worker` implements that protocol.
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn describe(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl MatchBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn attempt(&self, request: &MatchRequest) -> Result<Vec<ScoredRecipe>, RecommendError> {
        let payload = serde_json::to_vec(&WorkerRequest::from(request))
            .map_err(|e| RecommendError::Fatal(format!("failed to encode worker request: {}", e)))?;

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RecommendError::Transient(format!(
                    "failed to start worker {}: {}",
                    self.describe(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A worker that exits without reading is reported by its status below.
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "worker closed stdin early");
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            RecommendError::Transient(format!("worker {} failed: {}", self.describe(), e))
        })?;

        let parsed = serde_json::from_slice::<RecommendationResult>(&output.stdout);

        if !output.status.success() {
            let reason = match &parsed {
                Ok(result) => result.error.clone(),
                Err(_) => None,
            }
            .unwrap_or_else(|| {
                let stderr = String::from_utf8_lossy(&output.stderr);
                last_line(&stderr).to_string()
            });
            return Err(RecommendError::Transient(format!(
                "worker exited with {}: {}",
                output.status, reason
            )));
        }

        let result = parsed.map_err(|e| {
            RecommendError::Transient(format!("malformed worker output: {}", e))
        })?;
        if !result.success {
            return Err(RecommendError::Transient(
                result
                    .error
                    .unwrap_or_else(|| "worker reported failure".to_string()),
            ));
        }
        Ok(result.recommendations)
    }
}

fn last_line(s: &str) -> &str {
    s.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
}

/// Build the backend selected by `[backend].kind`.
pub fn create_backend(
    config: &BackendConfig,
    engine: MatchingEngine,
) -> anyhow::Result<Arc<dyn MatchBackend>> {
    match config.kind.as_str() {
        "in_process" => Ok(Arc::new(InProcessBackend::new(engine))),
        "command" => {
            let program = config
                .program
                .clone()
                .ok_or_else(|| anyhow::anyhow!("backend.program is required for kind = \"command\""))?;
            Ok(Arc::new(CommandBackend::new(program, config.args.clone())))
        }
        other => anyhow::bail!("Unknown backend kind: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::RecipeCorpus;
    use crate::matching::{LexicalScorer, Scorer};
    use crate::models::{Difficulty, Recipe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn recipe(id: u64, ingredients: &[&str]) -> Recipe {
        Recipe {
            id,
            name: format!("Recipe {}", id),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            cooking_time: 15,
            difficulty: Difficulty::Easy,
            cuisine: "American".to_string(),
            directions: None,
            source: None,
        }
    }

    fn corpus() -> Arc<RecipeCorpus> {
        Arc::new(
            RecipeCorpus::from_recipes(vec![
                recipe(1, &["flour", "sugar"]),
                recipe(2, &["chicken", "rice"]),
            ])
            .unwrap(),
        )
    }

    fn request(items: &[&str]) -> MatchRequest {
        MatchRequest {
            query: Query::normalize(items.iter().copied()).unwrap(),
            top_k: 5,
            min_score: 0.0,
        }
    }

    #[tokio::test]
    async fn test_in_process_ranks() {
        let engine = MatchingEngine::new(corpus(), Arc::new(LexicalScorer));
        let backend = InProcessBackend::new(engine);
        let out = backend.attempt(&request(&["chicken"])).await.unwrap();
        assert_eq!(out[0].recipe.id, 2);
    }

    struct PanickingScorer;

    #[async_trait]
    impl Scorer for PanickingScorer {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn score(&self, _: &Query, _: &RecipeCorpus) -> anyhow::Result<Vec<f64>> {
            panic!("scorer exploded");
        }
    }

    #[tokio::test]
    async fn test_in_process_panic_is_fatal() {
        let engine = MatchingEngine::new(corpus(), Arc::new(PanickingScorer));
        let err = InProcessBackend::new(engine)
            .attempt(&request(&["rice"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendError::Fatal(_)));
    }

    /// Blocks until cancelled; records that its future was dropped.
    struct HangingScorer(Arc<AtomicBool>);

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Scorer for HangingScorer {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn score(&self, _: &Query, _: &RecipeCorpus) -> anyhow::Result<Vec<f64>> {
            let _guard = SetOnDrop(self.0.clone());
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_dropping_attempt_aborts_task() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let engine = MatchingEngine::new(corpus(), Arc::new(HangingScorer(cancelled.clone())));
        let backend = InProcessBackend::new(engine);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), backend.attempt(&request(&["rice"])))
                .await;
        assert!(timed_out.is_err());

        // Abort is processed on the task's next poll.
        for _ in 0..100 {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_command_missing_program_is_transient() {
        let backend = CommandBackend::new("/nonexistent/pantry-worker", vec![]);
        let err = backend.attempt(&request(&["rice"])).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("failed to start worker"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_nonzero_exit_is_transient() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".to_string(), "echo 'model crashed' >&2; exit 3".to_string()],
        );
        let err = backend.attempt(&request(&["rice"])).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("model crashed"), "{}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_parses_worker_response() {
        let response = r#"{"success":true,"count":1,"recommendations":[{"id":7,"name":"Fried Rice","ingredients":["rice"],"description":"","cookingTime":15,"difficulty":"easy","cuisine":"Asian","match_score":0.5,"ingredient_match_percentage":100.0}],"query":["rice"]}"#;
        let script = format!("cat > /dev/null; echo '{}'", response);
        let backend = CommandBackend::new("sh", vec!["-c".to_string(), script]);

        let out = backend.attempt(&request(&["rice"])).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipe.id, 7);
        assert_eq!(out[0].recipe.cooking_time, 15);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_garbage_output_is_transient() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo not-json".to_string()],
        );
        let err = backend.attempt(&request(&["rice"])).await.unwrap_err();
        assert!(err.to_string().contains("malformed worker output"));
    }

    #[test]
    fn test_worker_request_wire_shape() {
        let json = serde_json::to_value(WorkerRequest::from(&request(&["Rice", "egg"]))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ingredients": ["egg", "rice"], "top_k": 5, "min_score": 0.0})
        );
    }

    #[test]
    fn test_create_backend_requires_program() {
        let engine = MatchingEngine::new(corpus(), Arc::new(LexicalScorer));
        let config = BackendConfig {
            kind: "command".to_string(),
            program: None,
            args: vec![],
        };
        assert!(create_backend(&config, engine).is_err());
    }
}
