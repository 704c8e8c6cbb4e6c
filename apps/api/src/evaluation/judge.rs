//! Quality judges: pluggable scorers for a finished recommendation.
//!
//! Default: `RubricJudge` (deterministic checklist, no network).
//! Optional: `LlmJudge` (asks the generation service for a 1–10 grade),
//! enabled with `ENABLE_LLM_JUDGE`.
//!
//! `AppState` holds an `Arc<dyn QualityJudge>`, chosen at startup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::evaluation::EvaluationError;
use crate::llm_client::Generator;
use crate::orchestrator::models::{Intent, Recommendation};

/// Replace: {situation}, {answer}
const JUDGE_TEMPLATE: &str = r#"You are grading advice given to a job seeker about following up on an application.

SITUATION:
{situation}

ANSWER:
"""
{answer}
"""

Score the answer from 1 to 10 for how specific and actionable it is for this situation.
Respond with the number only."#;

const JUDGE_TEMPERATURE: f32 = 0.0;
const JUDGE_MAX_TOKENS: u32 = 8;

#[async_trait]
pub trait QualityJudge: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quality in [0, 1]. `situation` is a one-line description of the query.
    async fn score(&self, situation: &str, recommendation: &Recommendation) -> Result<f64, EvaluationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// RubricJudge
// ────────────────────────────────────────────────────────────────────────────

/// Fraction of applicable checklist items the recommendation satisfies.
pub struct RubricJudge;

impl RubricJudge {
    fn checklist(rec: &Recommendation) -> Vec<(&'static str, bool)> {
        let narrative = rec.narrative.as_str();
        let mut items = vec![
            ("has_narrative", !narrative.is_empty()),
            ("cites_sources", !rec.citations.is_empty()),
            (
                "narrative_uses_citations",
                rec.citations
                    .iter()
                    .any(|c| narrative.contains(&format!("[{}]", c.index))),
            ),
            (
                "names_a_day",
                narrative.contains("day") && narrative.chars().any(|c| c.is_ascii_digit()),
            ),
            (
                "fully_generated",
                !rec.degraded && (!rec.sections.is_empty() || rec.message_review.is_some()),
            ),
        ];
        match rec.intent {
            Intent::MessageReview => items.push(("reviews_draft", rec.message_review.is_some())),
            Intent::FullStrategy => items.push(("names_contacts", !rec.contacts.is_empty())),
            _ => {}
        }
        items
    }
}

#[async_trait]
impl QualityJudge for RubricJudge {
    fn name(&self) -> &'static str {
        "rubric"
    }

    async fn score(&self, _situation: &str, recommendation: &Recommendation) -> Result<f64, EvaluationError> {
        let items = Self::checklist(recommendation);
        let passed = items.iter().filter(|(_, ok)| *ok).count();
        debug!(
            "Rubric: {}/{} ({})",
            passed,
            items.len(),
            items
                .iter()
                .filter(|(_, ok)| !*ok)
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(passed as f64 / items.len() as f64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmJudge
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmJudge {
    generator: Arc<dyn Generator>,
}

impl LlmJudge {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl QualityJudge for LlmJudge {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn score(&self, situation: &str, recommendation: &Recommendation) -> Result<f64, EvaluationError> {
        let prompt = JUDGE_TEMPLATE
            .replace("{situation}", situation)
            .replace("{answer}", &recommendation.render());
        let reply = self
            .generator
            .generate(&prompt, JUDGE_TEMPERATURE, JUDGE_MAX_TOKENS)
            .await
            .map_err(|e| EvaluationError::Judge(e.to_string()))?;
        let grade = parse_grade(&reply)?;
        Ok(f64::from(grade) / 10.0)
    }
}

/// First integer in the reply, which must lie in 1..=10.
fn parse_grade(reply: &str) -> Result<u8, EvaluationError> {
    let digits: String = reply
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u8>() {
        Ok(grade @ 1..=10) => Ok(grade),
        _ => Err(EvaluationError::Judge(format!(
            "expected a grade from 1 to 10, got '{}'",
            reply.trim()
        ))),
    }
}
