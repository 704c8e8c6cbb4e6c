pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::evaluation::handlers as evaluation;
use crate::orchestrator::handlers as orchestrator;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Recommendations
        .route(
            "/api/v1/recommendations",
            post(orchestrator::handle_recommend),
        )
        .route("/api/v1/policies", get(orchestrator::handle_get_policies))
        // Evaluation
        .route(
            "/api/v1/evaluation/ablation",
            post(evaluation::handle_ablation),
        )
        .route(
            "/api/v1/evaluation/retrieval",
            post(evaluation::handle_retrieval_eval),
        )
        .route(
            "/api/v1/evaluation/significance",
            post(evaluation::handle_significance),
        )
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::contacts::ContactChain;
    use crate::evaluation::judge::RubricJudge;
    use crate::orchestrator::{Orchestrator, OrchestratorConfig};
    use crate::retrieval::Retriever;
    use crate::test_support::*;

    fn app() -> Router {
        let retriever: Arc<dyn Retriever> = Arc::new(StaticRetriever::new(vec![sample_chunk("t1", 0.9)]));
        let orchestrator = Orchestrator::new(
            trained_policies(),
            Arc::new(ScriptedGenerator::new()),
            Some(retriever),
            ContactChain::default(),
            OrchestratorConfig {
                rng_seed: Some(5),
                ..Default::default()
            },
        );
        build_router(AppState {
            config: test_config(),
            orchestrator: Arc::new(orchestrator),
            judge: Arc::new(RubricJudge),
        })
    }

    async fn send(method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "postapply-api");
        assert_eq!(body["policies_frozen"], true);
    }

    #[tokio::test]
    async fn test_recommendation_round_trip() {
        let (status, body) = send(
            "POST",
            "/api/v1/recommendations",
            Some(json!({
                "intent": "timing",
                "company_type": "startup",
                "days_since_application": 4,
                "has_connection": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rec = &body["recommendation"];
        assert_eq!(rec["intent"], "timing");
        assert_eq!(rec["degraded"], false);
        assert_eq!(rec["citations"][0]["index"], 1);
        assert!(body["text"].as_str().unwrap().starts_with("Wait "));
    }

    #[tokio::test]
    async fn test_invalid_query_is_400_with_error_body() {
        let (status, body) = send(
            "POST",
            "/api/v1/recommendations",
            Some(json!({
                "intent": "salary",
                "company_type": "startup",
                "days_since_application": 4
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("full-strategy"));
    }

    #[tokio::test]
    async fn test_policy_snapshot_covers_every_state() {
        let (status, body) = send("GET", "/api/v1/policies", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["frozen"], true);
        assert_eq!(body["greedy_timing"].as_array().unwrap().len(), 24);
        assert_eq!(body["tables"]["timing"].as_array().unwrap().len(), 24);
        assert_eq!(body["policy_path"], "policies.json");
    }

    #[tokio::test]
    async fn test_significance_endpoint() {
        let (status, body) = send(
            "POST",
            "/api/v1/evaluation/significance",
            Some(json!({
                "baseline": {"successes": 160, "trials": 500},
                "treatment": {"successes": 193, "trials": 500}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["z"].as_f64().unwrap() - 2.1836).abs() < 1e-3);
        assert_eq!(body["significant"], true);

        let (status, body) = send(
            "POST",
            "/api/v1/evaluation/significance",
            Some(json!({
                "baseline": {"successes": 10, "trials": 0},
                "treatment": {"successes": 1, "trials": 2}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_ablation_endpoint_defaults_to_all_variants() {
        let (status, body) = send("POST", "/api/v1/evaluation/ablation", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["judge"], "rubric");
        assert_eq!(body["baseline"], "rl_only");
        assert_eq!(body["summaries"].as_array().unwrap().len(), 4);
        assert_eq!(body["runs"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_retrieval_evaluation_endpoint() {
        let (status, body) = send("POST", "/api/v1/evaluation/retrieval", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_k"], 3);
        assert_eq!(body["queries"].as_array().unwrap().len(), 15);
        assert_eq!(body["queries"][0]["retrieved_categories"], json!(["timing"]));
        assert_eq!(body["queries"][0]["recall"], 1.0);

        let (status, body) = send(
            "POST",
            "/api/v1/evaluation/retrieval",
            Some(json!({
                "queries": [{"query": "When?", "expected_categories": ["timing"], "difficulty": "easy"}],
                "top_k": 0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, body) = send("GET", "/api/v1/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
