//! HTTP API tests against a real listener.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pantry::backend::{InProcessBackend, MatchBackend, MatchRequest};
use pantry::corpus::RecipeCorpus;
use pantry::error::RecommendError;
use pantry::matching::{LexicalScorer, MatchingEngine};
use pantry::models::{Difficulty, Recipe, ScoredRecipe};
use pantry::retry::RetryPolicy;
use pantry::server::{router, AppState};
use pantry::service::RecommendationService;

fn recipe(id: u64, name: &str, ingredients: &[&str]) -> Recipe {
    Recipe {
        id,
        name: name.to_string(),
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        description: format!("{} for tests", name),
        cooking_time: 30,
        difficulty: Difficulty::Medium,
        cuisine: "American".to_string(),
        directions: Some(vec!["Cook.".to_string()]),
        source: None,
    }
}

fn corpus() -> Arc<RecipeCorpus> {
    Arc::new(
        RecipeCorpus::from_recipes(vec![
            recipe(1, "Cookies", &["flour", "sugar", "butter"]),
            recipe(2, "Chicken Rice", &["chicken breast", "soy sauce", "rice", "ginger"]),
            recipe(3, "Salted Rice", &["rice", "salt"]),
        ])
        .unwrap(),
    )
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        multiplier: 2,
        attempt_timeout: Duration::from_secs(10),
    }
}

/// Serve `backend` on an ephemeral port; returns the base URL.
async fn spawn_server(backend: Arc<dyn MatchBackend>) -> String {
    let service = RecommendationService::new(backend, fast_policy());
    let app = router(AppState::new(service, corpus()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_lexical_server() -> String {
    let engine = MatchingEngine::new(corpus(), Arc::new(LexicalScorer));
    spawn_server(Arc::new(InProcessBackend::new(engine))).await
}

/// Always fails transiently.
struct BrokenBackend {
    calls: AtomicU32,
}

#[async_trait]
impl MatchBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    async fn attempt(&self, _: &MatchRequest) -> Result<Vec<ScoredRecipe>, RecommendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RecommendError::Transient("model process crashed".to_string()))
    }
}

#[tokio::test]
async fn test_recommend_success() {
    let base = spawn_lexical_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/recommend", base))
        .json(&serde_json::json!({
            "ingredients": ["Chicken", "rice", "soy sauce"],
            "top_k": 2
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["query"], serde_json::json!(["chicken", "rice", "soy sauce"]));

    let first = &body["recommendations"][0];
    assert_eq!(first["id"], 2);
    assert_eq!(first["name"], "Chicken Rice");
    assert_eq!(first["match_score"], 0.75);
    assert_eq!(first["ingredient_match_percentage"], 75.0);
    assert_eq!(first["cookingTime"], 30);
    assert_eq!(first["difficulty"], "medium");
    assert_eq!(first["directions"], serde_json::json!(["Cook."]));
    assert!(first.get("source").is_none());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_recommend_validation_failure_is_400() {
    let base = spawn_lexical_server().await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({"ingredients": []}),
        serde_json::json!({"top_k": 3}),
        serde_json::json!({"ingredients": ["rice"], "top_k": 0}),
        serde_json::json!(["rice"]),
    ] {
        let resp = client
            .post(format!("{}/api/recommend", base))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{}", body);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["count"], 0);
        assert!(json["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_recommend_non_json_body_is_400() {
    let base = spawn_lexical_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/recommend", base))
        .header("Content-Type", "application/json")
        .body("ingredients=rice")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_recommend_empty_result_message() {
    let base = spawn_lexical_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/recommend", base))
        .json(&serde_json::json!({"ingredients": ["saffron"], "min_score": 0.1}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 0);
    assert_eq!(
        json["message"],
        "No matching recipes found. Try different ingredients."
    );
}

#[tokio::test]
async fn test_recommend_backend_failure_is_500() {
    let backend = Arc::new(BrokenBackend {
        calls: AtomicU32::new(0),
    });
    let base = spawn_server(backend.clone()).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/recommend", base))
        .json(&serde_json::json!({"ingredients": ["rice"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("3 attempts"), "{}", error);
    assert!(error.contains("model process crashed"), "{}", error);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_health() {
    let base = spawn_lexical_server().await;
    let resp = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["recipes"], 3);
}

#[tokio::test]
async fn test_health_unavailable() {
    let base = spawn_server(Arc::new(BrokenBackend {
        calls: AtomicU32::new(0),
    }))
    .await;
    let resp = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "unavailable");
    assert!(json["error"].as_str().unwrap().contains("attempts"));
}

#[tokio::test]
async fn test_get_recipe() {
    let base = spawn_lexical_server().await;

    let resp = reqwest::get(format!("{}/api/recipes/3", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["name"], "Salted Rice");

    let resp = reqwest::get(format!("{}/api/recipes/99", base)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], "not_found");

    let resp = reqwest::get(format!("{}/api/recipes/abc", base)).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let base = spawn_lexical_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/api/health", base))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
