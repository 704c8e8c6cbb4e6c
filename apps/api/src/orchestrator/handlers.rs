//! Axum route handlers for recommendations and the loaded policies.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::orchestrator::models::{FollowUpQuery, Recommendation};
use crate::policy::store::PolicyFile;
use crate::policy::types::{StyleArm, StyleContext, TimingState};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendation: Recommendation,
    /// Plain-text rendering of the recommendation.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct GreedyTiming {
    pub state: String,
    pub wait_days: u32,
    pub q_value: f64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct BestStyle {
    pub context: String,
    pub style: StyleArm,
    pub posterior_mean: f64,
    /// Outcomes recorded for this arm in this context.
    pub observations: u64,
}

#[derive(Debug, Serialize)]
pub struct PolicySnapshot {
    /// Where the tables are persisted.
    pub policy_path: String,
    pub frozen: bool,
    pub greedy_timing: Vec<GreedyTiming>,
    pub best_style: Vec<BestStyle>,
    pub tables: PolicyFile,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/recommendations
///
/// Validation failures are 400s. Retrieval or generation trouble never
/// fails the request; it shows up in `notices` and `degraded`.
pub async fn handle_recommend(
    State(state): State<AppState>,
    Json(query): Json<FollowUpQuery>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let recommendation = state.orchestrator.handle_query(query).await?;
    let text = recommendation.render();
    Ok(Json(RecommendationResponse { recommendation, text }))
}

/// GET /api/v1/policies
pub async fn handle_get_policies(State(state): State<AppState>) -> Json<PolicySnapshot> {
    let policies = state.orchestrator.policies();

    let greedy_timing = TimingState::all()
        .map(|s| {
            let action = policies.timing.greedy_action(s);
            GreedyTiming {
                state: s.to_string(),
                wait_days: action.days(),
                q_value: policies.timing.q_value(s, action),
                confidence: policies.timing.confidence(s),
            }
        })
        .collect();

    let best_style = StyleContext::all()
        .map(|c| {
            let arm = policies.style.best_mean_arm(c);
            let posterior = policies.style.posterior(c, arm);
            BestStyle {
                context: c.to_string(),
                style: arm,
                posterior_mean: posterior.posterior_mean(),
                observations: posterior.observations(),
            }
        })
        .collect();

    Json(PolicySnapshot {
        policy_path: state.config.policy_path.display().to_string(),
        frozen: policies.is_frozen(),
        greedy_timing,
        best_style,
        tables: PolicyFile::from_policies(policies),
    })
}
