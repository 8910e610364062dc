//! HTTP boundary for the recommendation service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/recommend` | Rank recipes for a list of ingredients |
//! | `GET`  | `/api/health` | Runs a trivial query through the backend |
//! | `GET`  | `/api/recipes/{id}` | Fetch one recipe from the corpus |
//!
//! # Status codes
//!
//! `/api/recommend` always answers with the recommendation response object.
//! The status reflects the outcome: `200` on success (including an empty
//! result), `400` for validation failures, `500` when matching failed.
//! A body that is not JSON at all never reaches the service and gets the
//! generic error object:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "request body is not valid JSON: ..." } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can be served from a different origin.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::error::FailureKind;
use crate::models::{Recipe, RecommendationResult};
use crate::service::{RecommendRequest, RecommendationService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    service: RecommendationService,
    corpus: Arc<RecipeCorpus>,
}

impl AppState {
    pub fn new(service: RecommendationService, corpus: Arc<RecipeCorpus>) -> Self {
        Self { service, corpus }
    }
}

/// Load the corpus, wire the service, and serve until interrupted.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let corpus = Arc::new(RecipeCorpus::load(&config.corpus.path)?);
    let service = RecommendationService::from_config(config, corpus.clone())?;
    let app = router(AppState::new(service, corpus));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

/// Routes with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/recommend", post(handle_recommend))
        .route("/api/health", get(handle_health))
        .route("/api/recipes/{id}", get(handle_get_recipe))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn status_for(result: &RecommendationResult) -> StatusCode {
    match result.failure {
        None => StatusCode::OK,
        Some(FailureKind::InvalidArgument) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Transient) | Some(FailureKind::Fatal) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============ POST /api/recommend ============

async fn handle_recommend(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RecommendationResult>), AppError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("request body is not valid JSON: {}", e)))?;

    // Valid JSON of the wrong shape is still a request; let validation
    // describe what is wrong with it.
    let request = match value {
        serde_json::Value::Object(_) => {
            serde_json::from_value::<RecommendRequest>(value).unwrap_or_default()
        }
        _ => RecommendRequest::default(),
    };

    let result = state.service.recommend(request).await;
    Ok((status_for(&result), Json(result)))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    recipes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label, error) = match state.service.health().await {
        Ok(()) => (StatusCode::OK, "ok", None),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", Some(e.to_string())),
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            recipes: state.corpus.len(),
            error,
        }),
    )
}

// ============ GET /api/recipes/{id} ============

async fn handle_get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, AppError> {
    let id: u64 = id
        .parse()
        .map_err(|_| bad_request(format!("invalid recipe id: {}", id)))?;
    state
        .corpus
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(format!("no recipe with id {}", id)))
}
