mod config;
mod metrics;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use debate::{DebateController, DebateResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::metrics::{Metrics, MetricsSnapshot};

struct AppState {
    controller: Arc<DebateController>,
    metrics: Arc<Metrics>,
    sessions: Arc<Semaphore>,
    provider: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    provider: String,
}

#[derive(Deserialize)]
struct DebateRequest {
    question: String,
    image_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let controller = debate::build_controller(&config.app)?;

    let state = Arc::new(AppState {
        controller: Arc::new(controller),
        metrics: Metrics::new(),
        sessions: Arc::new(Semaphore::new(config.app.concurrency.max_concurrent_sessions.max(1))),
        provider: config.app.llm.provider.to_string(),
    });

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/debate", post(run_debate))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provider: state.provider.clone(),
    })
}

async fn run_debate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DebateRequest>,
) -> Result<Json<DebateResult>, StatusCode> {
    if req.question.trim().is_empty() {
        state.metrics.record_rejected();
        return Err(StatusCode::BAD_REQUEST);
    }

    let image = PathBuf::from(&req.image_path);
    if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
        state.metrics.record_rejected();
        return Err(StatusCode::NOT_FOUND);
    }

    let _permit = state
        .sessions
        .acquire()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let result = state.controller.run_debate(&req.question, &image).await;
    state.metrics.record_session(&result);

    Ok(Json(result))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use consensus::{ConsensusEvaluator, KnowledgeGraph, QualityScorer, RetryPolicy};
    use debate::{AgentRole, CandidateSelector, SurgicalAgent};
    use extract::{AnswerExtractor, CompletionService};
    use std::path::Path;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedAgent(AgentRole, &'static str);

    #[async_trait]
    impl SurgicalAgent for FixedAgent {
        fn role(&self) -> AgentRole {
            self.0
        }

        async fn answer(&self, _question: &str, _image: &Path) -> anyhow::Result<String> {
            Ok(self.1.to_string())
        }
    }

    /// Extraction and rating replies for a scissors/cutting frame.
    struct FixedText;

    #[async_trait]
    impl CompletionService for FixedText {
        async fn complete(&self, prompt: &str, _image: Option<&Path>) -> anyhow::Result<String> {
            let reply = if prompt.contains("final instrument prediction") {
                "Monopolar Curved Scissors"
            } else if prompt.contains("final action prediction") {
                "Cutting"
            } else {
                "4"
            };
            Ok(reply.to_string())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn test_router() -> (Router, Arc<AppState>) {
        let text: Arc<dyn CompletionService> = Arc::new(FixedText);
        let scorer = QualityScorer::new(text.clone(), RetryPolicy::new(1, Duration::ZERO));
        let controller = DebateController::new(
            Arc::new(FixedAgent(AgentRole::InstrumentIdentification, "The answer is: Option (B)")),
            Arc::new(FixedAgent(AgentRole::ActionRecognition, "The answer is: Option (E)")),
            AnswerExtractor::new(text.clone()),
            ConsensusEvaluator::new(KnowledgeGraph::surgical(), scorer),
            CandidateSelector::new(text),
        );

        let state = Arc::new(AppState {
            controller: Arc::new(controller),
            metrics: Metrics::new(),
            sessions: Arc::new(Semaphore::new(2)),
            provider: "stub".to_string(),
        });
        (router(state.clone()), state)
    }

    fn debate_request(question: &str, image_path: &str) -> Request<Body> {
        Request::post("/debate")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"question": question, "image_path": image_path}).to_string(),
            ))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_router();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "stub");
    }

    #[tokio::test]
    async fn test_debate_returns_result() {
        let (app, state) = test_router();
        let image = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");

        let response = app
            .oneshot(debate_request("What is the most likely ongoing action? (a) ...", image))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metrics"]["kg_consistency"], true);
        assert_eq!(body["metrics"]["coherence"], 4);
        assert_eq!(body["trace"]["outcome"], "accepted_initial");
        assert_eq!(state.metrics.snapshot().accepted_initial, 1);
    }

    #[tokio::test]
    async fn test_debate_rejects_empty_question() {
        let (app, state) = test_router();
        let response = app.oneshot(debate_request("   ", "frame.jpg")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.metrics.snapshot().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_debate_missing_image() {
        let (app, _) = test_router();
        let response = app
            .oneshot(debate_request("Which action?", "/nonexistent/frame.jpg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
