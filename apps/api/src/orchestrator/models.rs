//! Request and response types for the recommendation pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contacts::Contact;
use crate::errors::AppError;
use crate::llm_client::GenerationError;
use crate::orchestrator::outcome::Notice;
use crate::policy::types::{
    CompanyCulture, CompanyType, ContactTitle, StyleArm, StyleContext, TimingState,
};

// ────────────────────────────────────────────────────────────────────────────
// Intent
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Timing,
    MessageReview,
    FullStrategy,
    KnowledgeQa,
    ExplainConfidence,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Self::Timing,
        Self::MessageReview,
        Self::FullStrategy,
        Self::KnowledgeQa,
        Self::ExplainConfidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timing => "timing",
            Self::MessageReview => "message-review",
            Self::FullStrategy => "full-strategy",
            Self::KnowledgeQa => "knowledge-qa",
            Self::ExplainConfidence => "explain-confidence",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .ok_or_else(|| {
                let supported: Vec<&str> = Self::ALL.iter().map(|i| i.as_str()).collect();
                format!("unknown intent '{s}' (supported: {})", supported.join(", "))
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Query
// ────────────────────────────────────────────────────────────────────────────

/// Raw query as submitted. Enum-valued fields arrive as strings so a bad
/// value produces a validation error naming the accepted words.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowUpQuery {
    pub intent: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub company_type: String,
    #[serde(default)]
    pub position: Option<String>,
    pub days_since_application: i64,
    #[serde(default)]
    pub has_connection: bool,
    #[serde(default)]
    pub connection_name: Option<String>,
    #[serde(default)]
    pub contact_title: Option<String>,
    #[serde(default)]
    pub company_culture: Option<String>,
    #[serde(default)]
    pub draft_message: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

/// A query whose facts have been checked and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    pub intent: Intent,
    pub company_name: Option<String>,
    pub company_type: CompanyType,
    pub position: Option<String>,
    pub days_since_application: u32,
    pub has_connection: bool,
    pub connection_name: Option<String>,
    pub contact_title: ContactTitle,
    pub culture: CompanyCulture,
    pub draft_message: Option<String>,
    pub question: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl FollowUpQuery {
    pub fn validate(self) -> Result<ValidatedQuery, AppError> {
        let intent: Intent = self.intent.parse().map_err(AppError::Validation)?;
        let company_type: CompanyType = self.company_type.parse().map_err(AppError::Validation)?;
        let days_since_application = u32::try_from(self.days_since_application).map_err(|_| {
            AppError::Validation(format!(
                "days_since_application must be a non-negative integer, got {}",
                self.days_since_application
            ))
        })?;
        let contact_title = match self.contact_title.as_deref() {
            Some(t) => t.parse().map_err(AppError::Validation)?,
            None => ContactTitle::Recruiter,
        };
        let culture = match self.company_culture.as_deref() {
            Some(c) => c.parse().map_err(AppError::Validation)?,
            None => CompanyCulture::Mixed,
        };

        let draft_message = non_blank(self.draft_message);
        let question = non_blank(self.question);
        match intent {
            Intent::MessageReview if draft_message.is_none() => {
                return Err(AppError::Validation(
                    "draft_message is required for the message-review intent".to_string(),
                ))
            }
            Intent::KnowledgeQa if question.is_none() => {
                return Err(AppError::Validation(
                    "question is required for the knowledge-qa intent".to_string(),
                ))
            }
            _ => {}
        }

        Ok(ValidatedQuery {
            intent,
            company_name: non_blank(self.company_name),
            company_type,
            position: non_blank(self.position),
            days_since_application,
            has_connection: self.has_connection,
            connection_name: non_blank(self.connection_name),
            contact_title,
            culture,
            draft_message,
            question,
        })
    }
}

impl ValidatedQuery {
    pub fn timing_state(&self) -> TimingState {
        TimingState::new(self.days_since_application, self.company_type, self.has_connection)
    }

    pub fn style_context(&self) -> StyleContext {
        StyleContext {
            contact_title: self.contact_title,
            culture: self.culture,
            has_connection: self.has_connection,
        }
    }

    /// "Acme (startup)" or "a startup company".
    pub fn company_label(&self) -> String {
        match &self.company_name {
            Some(name) => format!("{name} ({})", self.company_type.as_str()),
            None => format!("a {} company", self.company_type.as_str()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recommendation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TimingDecision {
    pub wait_days: u32,
    pub state: String,
    pub q_value: f64,
    /// Q-value margin of the chosen wait over the runner-up, in [0, 1].
    pub confidence: f64,
    pub should_act_now: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleDecision {
    pub style: StyleArm,
    pub context: String,
    /// Posterior mean response rate of the chosen style.
    pub confidence: f64,
    pub alpha: u64,
    pub beta: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// 1-based number used by the narrative's inline references.
    pub index: usize,
    pub source: String,
    pub category: String,
    pub score: f64,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeSection {
    pub chain: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReview {
    /// 1–10 rating of the submitted draft.
    pub score: u8,
    pub feedback: Vec<String>,
    pub improved_message: String,
}

impl MessageReview {
    /// Rejects a review whose score falls outside 1..=10.
    pub fn checked(self) -> Result<Self, GenerationError> {
        if (1..=10).contains(&self.score) {
            Ok(self)
        } else {
            Err(GenerationError::Malformed(format!(
                "review score {} is outside 1-10",
                self.score
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
    pub timing: TimingDecision,
    pub style: StyleDecision,
    pub citations: Vec<Citation>,
    pub sections: Vec<NarrativeSection>,
    pub narrative: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_review: Option<MessageReview>,
    pub contacts: Vec<Contact>,
    pub notices: Vec<Notice>,
    pub degraded: bool,
}

impl Recommendation {
    /// User-facing text: the policy decision, then sources, then narrative.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Wait {} days before following up{}.\n",
            self.timing.wait_days,
            if self.timing.should_act_now {
                " (you can follow up now)"
            } else {
                ""
            }
        ));
        out.push_str(&format!(
            "Timing confidence: {:.0}% (Q = {:.2}).\n",
            self.timing.confidence * 100.0,
            self.timing.q_value
        ));
        out.push_str(&format!(
            "Message style: {} (expected response rate {:.0}%).\n",
            self.style.style.as_str(),
            self.style.confidence * 100.0
        ));

        if !self.contacts.is_empty() {
            out.push_str("\nPeople to contact:\n");
            for c in &self.contacts {
                out.push_str(&format!("- {} ({})\n", c.name, c.role));
            }
        }

        if !self.citations.is_empty() {
            out.push_str("\nSources:\n");
            for c in &self.citations {
                out.push_str(&format!(
                    "[{}] {} (similarity {:.2}): {}\n",
                    c.index, c.source, c.score, c.excerpt
                ));
            }
        }

        if !self.narrative.is_empty() {
            out.push('\n');
            out.push_str(&self.narrative);
            out.push('\n');
        }

        if let Some(review) = &self.message_review {
            out.push_str(&format!("\nDraft score: {}/10\n", review.score));
            for f in &review.feedback {
                out.push_str(&format!("- {f}\n"));
            }
            out.push_str("\nSuggested message:\n");
            out.push_str(&review.improved_message);
            out.push('\n');
        }

        if self.degraded {
            out.push_str("\nSome guidance could not be generated right now; the timing and style above still apply.\n");
        }
        out
    }
}
