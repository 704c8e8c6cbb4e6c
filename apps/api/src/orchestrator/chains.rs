//! Synthesis chains and the intent → chain dispatch table.
//!
//! Each chain declares what it retrieves, how it samples, and how it builds
//! its prompt. A chain whose retrieval produced nothing usable is given
//! `excerpts: None` and switches to its generic-context variant.

use crate::contacts::Contact;
use crate::llm_client::prompts::{
    GENERIC_CONTEXT_INSTRUCTION, GROUNDING_INSTRUCTION, JSON_ONLY_INSTRUCTION,
};
use crate::orchestrator::models::{Intent, StyleDecision, TimingDecision, ValidatedQuery};
use crate::orchestrator::prompts::*;
use crate::retrieval::RetrievedChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainFocus {
    Timing,
    Style,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    TimingAdvisor,
    MessageCoach,
    StrategySynthesizer,
    CareerQa,
    ConfidenceExplainer(ExplainFocus),
}

impl Chain {
    /// The closed dispatch table. Adding an intent forces a match arm here.
    pub fn for_intent(intent: Intent) -> &'static [Chain] {
        match intent {
            Intent::Timing => &[
                Chain::TimingAdvisor,
                Chain::ConfidenceExplainer(ExplainFocus::Timing),
            ],
            Intent::MessageReview => &[
                Chain::MessageCoach,
                Chain::ConfidenceExplainer(ExplainFocus::Style),
            ],
            Intent::FullStrategy => &[Chain::StrategySynthesizer],
            Intent::KnowledgeQa => &[Chain::CareerQa],
            Intent::ExplainConfidence => &[Chain::ConfidenceExplainer(ExplainFocus::Both)],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TimingAdvisor => "timing_advisor",
            Self::MessageCoach => "message_coach",
            Self::StrategySynthesizer => "strategy_synthesizer",
            Self::CareerQa => "career_qa",
            Self::ConfidenceExplainer(_) => "confidence_explainer",
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            Self::TimingAdvisor | Self::StrategySynthesizer => 0.7,
            Self::MessageCoach => 0.5,
            Self::CareerQa => 0.3,
            Self::ConfidenceExplainer(_) => 0.4,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            Self::TimingAdvisor => 600,
            Self::MessageCoach => 900,
            Self::StrategySynthesizer => 1200,
            Self::CareerQa => 700,
            Self::ConfidenceExplainer(ExplainFocus::Both) => 600,
            Self::ConfidenceExplainer(_) => 300,
        }
    }

    /// Knowledge-base queries this chain wants answered. Empty for chains that
    /// work from the policy decision alone.
    pub fn retrieval_queries(&self, query: &ValidatedQuery, style: &StyleDecision) -> Vec<String> {
        let company_type = query.company_type.as_str();
        match self {
            Self::TimingAdvisor => vec![format!(
                "When should I follow up with a {company_type} company {}?",
                if query.has_connection {
                    "where I have a connection"
                } else {
                    "as a cold applicant"
                }
            )],
            Self::MessageCoach => vec![format!(
                "What makes a good {} follow-up email for a {company_type} company? How should I structure it?",
                style.style.as_str().replace('_', " ")
            )],
            Self::StrategySynthesizer => vec![
                format!("Follow-up timing best practices for {company_type} companies"),
                format!(
                    "How to write a {} follow-up message to a {} at a {} company",
                    style.style.as_str().replace('_', " "),
                    query.contact_title.as_str(),
                    query.culture.as_str()
                ),
                format!(
                    "How to research {} before following up on an application",
                    query.company_name.as_deref().unwrap_or("the company")
                ),
            ],
            Self::CareerQa => query.question.iter().cloned().collect(),
            Self::ConfidenceExplainer(_) => Vec::new(),
        }
    }

    pub fn build_prompt(&self, input: &PromptInput<'_>) -> String {
        let context = context_block(input.excerpts);
        match self {
            Self::TimingAdvisor => TIMING_ADVISOR_TEMPLATE
                .replace("{situation}", &situation(input.query))
                .replace("{decision}", &decision(input.timing, input.style))
                .replace("{context}", &context),
            Self::MessageCoach => MESSAGE_COACH_TEMPLATE
                .replace("{situation}", &situation(input.query))
                .replace("{decision}", &decision(input.timing, input.style))
                .replace("{draft}", input.query.draft_message.as_deref().unwrap_or_default())
                .replace("{context}", &context)
                .replace("{json_only}", JSON_ONLY_INSTRUCTION),
            Self::StrategySynthesizer => STRATEGY_TEMPLATE
                .replace("{situation}", &situation(input.query))
                .replace("{decision}", &decision(input.timing, input.style))
                .replace("{contacts}", &contacts_block(input.contacts))
                .replace("{context}", &context),
            Self::CareerQa => CAREER_QA_TEMPLATE
                .replace("{question}", input.query.question.as_deref().unwrap_or_default())
                .replace("{context}", &context),
            Self::ConfidenceExplainer(focus) => {
                let timing = explain_timing(input);
                let style = explain_style(input);
                match focus {
                    ExplainFocus::Timing => timing,
                    ExplainFocus::Style => style,
                    ExplainFocus::Both => format!(
                        "{timing}\n\n---\n\n{style}\n\nWrite one short paragraph for timing, then one for style."
                    ),
                }
            }
        }
    }
}

/// Everything a chain may draw on when building its prompt.
pub struct PromptInput<'a> {
    pub query: &'a ValidatedQuery,
    pub timing: &'a TimingDecision,
    pub style: &'a StyleDecision,
    /// Numbered excerpts, or `None` for the generic-context variant.
    pub excerpts: Option<&'a [Excerpt]>,
    pub contacts: &'a [Contact],
}

/// A retrieved chunk carrying its request-wide citation number.
#[derive(Debug, Clone)]
pub struct Excerpt {
    pub index: usize,
    pub chunk: RetrievedChunk,
}

fn percent(value: f64) -> String {
    format!("{:.0}", value * 100.0)
}

fn situation(query: &ValidatedQuery) -> String {
    let connection = match (&query.connection_name, query.has_connection) {
        (Some(name), _) => format!("referred by {name}"),
        (None, true) => "has a mutual connection".to_string(),
        (None, false) => "none (cold application)".to_string(),
    };
    SITUATION_TEMPLATE
        .replace("{company}", &query.company_label())
        .replace("{position}", query.position.as_deref().unwrap_or("not specified"))
        .replace("{days}", &query.days_since_application.to_string())
        .replace("{connection}", &connection)
        .replace("{contact}", query.contact_title.as_str())
        .replace("{culture}", query.culture.as_str())
}

fn decision(timing: &TimingDecision, style: &StyleDecision) -> String {
    DECISION_TEMPLATE
        .replace("{wait_days}", &timing.wait_days.to_string())
        .replace(
            "{act_now}",
            if timing.should_act_now {
                "the wait is already over"
            } else {
                "still waiting"
            },
        )
        .replace("{timing_confidence}", &percent(timing.confidence))
        .replace("{q_value}", &format!("{:.2}", timing.q_value))
        .replace("{style}", style.style.as_str())
        .replace("{style_confidence}", &percent(style.confidence))
}

fn context_block(excerpts: Option<&[Excerpt]>) -> String {
    match excerpts {
        Some(excerpts) if !excerpts.is_empty() => {
            let mut block = String::from("GUIDANCE EXCERPTS:\n");
            for e in excerpts {
                block.push_str(&format!("[{}] ({})\n{}\n\n", e.index, e.chunk.source, e.chunk.text));
            }
            block.push_str(GROUNDING_INSTRUCTION);
            block
        }
        _ => GENERIC_CONTEXT_INSTRUCTION.to_string(),
    }
}

fn contacts_block(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "KNOWN CONTACTS: none found; suggest how to identify the right person.".to_string();
    }
    let mut block = String::from("KNOWN CONTACTS:\n");
    for c in contacts {
        block.push_str(&format!("- {} ({})\n", c.name, c.role));
    }
    block
}

fn explain_timing(input: &PromptInput<'_>) -> String {
    EXPLAIN_TIMING_TEMPLATE
        .replace("{wait_days}", &input.timing.wait_days.to_string())
        .replace("{timing_confidence}", &percent(input.timing.confidence))
        .replace("{q_value}", &format!("{:.2}", input.timing.q_value))
        .replace("{company_type}", input.query.company_type.as_str())
}

fn explain_style(input: &PromptInput<'_>) -> String {
    EXPLAIN_STYLE_TEMPLATE
        .replace("{style}", input.style.style.as_str())
        .replace("{style_confidence}", &percent(input.style.confidence))
        .replace(
            "{observations}",
            &(input.style.alpha + input.style.beta - 2).to_string(),
        )
        .replace("{company_type}", input.query.company_type.as_str())
        .replace("{culture}", input.query.culture.as_str())
}
