use std::sync::Arc;

use crate::config::Config;
use crate::evaluation::judge::QualityJudge;
use crate::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Owns the frozen policy tables and the retrieval/generation collaborators.
    pub orchestrator: Arc<Orchestrator>,
    /// Pluggable quality judge for ablation runs. Default: RubricJudge. Swap via ENABLE_LLM_JUDGE.
    pub judge: Arc<dyn QualityJudge>,
}
