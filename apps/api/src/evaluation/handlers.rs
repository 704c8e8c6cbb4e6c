//! Axum route handlers for the Evaluation API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::evaluation::ablation::{AblationReport, AblationScenario, AblationVariant, EvaluationHarness};
use crate::evaluation::retrieval_eval::{evaluate_retrieval, LabelledQuery, RetrievalReport};
use crate::evaluation::significance::{two_proportion_z_test, ProportionSample, SignificanceResult};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AblationRequest {
    #[serde(default)]
    pub variants: Vec<AblationVariant>,
    #[serde(default)]
    pub scenarios: Vec<AblationScenario>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrievalEvalRequest {
    #[serde(default)]
    pub queries: Vec<LabelledQuery>,
    /// Defaults to the orchestrator's top_k.
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SignificanceRequest {
    pub baseline: ProportionSample,
    pub treatment: ProportionSample,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluation/ablation
///
/// Runs the scenarios (built-in set when omitted) under each variant
/// (all four when omitted) and returns per-variant means and deltas.
pub async fn handle_ablation(
    State(state): State<AppState>,
    Json(request): Json<AblationRequest>,
) -> Result<Json<AblationReport>, AppError> {
    let harness = EvaluationHarness::new(state.orchestrator.clone(), state.judge.clone());
    let report = harness
        .run_ablation(&request.variants, &request.scenarios)
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/evaluation/retrieval
///
/// Scores the configured retriever on labelled queries (built-in set when
/// omitted) and returns mean precision, recall and F1.
pub async fn handle_retrieval_eval(
    State(state): State<AppState>,
    Json(request): Json<RetrievalEvalRequest>,
) -> Result<Json<RetrievalReport>, AppError> {
    let retriever = state.orchestrator.retriever().ok_or_else(|| {
        AppError::Validation(
            "retrieval is not configured (set OPENAI_API_KEY and KNOWLEDGE_INDEX_PATH)".to_string(),
        )
    })?;
    let top_k = request.top_k.unwrap_or_else(|| state.orchestrator.top_k());
    let report = evaluate_retrieval(retriever, &request.queries, top_k).await?;
    Ok(Json(report))
}

/// POST /api/v1/evaluation/significance
pub async fn handle_significance(
    Json(request): Json<SignificanceRequest>,
) -> Result<Json<SignificanceResult>, AppError> {
    Ok(Json(two_proportion_z_test(request.baseline, request.treatment)?))
}
