//! Evaluation: measures what each pipeline stage contributes.
//!
//! `ablation` re-runs the orchestrator with stages switched off and scores
//! the output with a `QualityJudge`; `retrieval_eval` checks which guidance
//! categories the retriever brings back for labelled questions;
//! `significance` compares two response rates with a two-proportion Z-test.
//! Nothing here writes back to the policies.

pub mod ablation;
pub mod handlers;
pub mod judge;
pub mod retrieval_eval;
pub mod significance;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("judge failed: {0}")]
    Judge(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),
}
