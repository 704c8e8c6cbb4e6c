//! Orchestrator: turns one follow-up query into one recommendation.
//!
//! Stages, in order:
//!   1. validate the query and derive the timing state / style context
//!   2. ask both frozen policies for a decision
//!   3. route the intent to its chains
//!   4. retrieve guidance per chain (falling back to generic prompts) and,
//!      for full strategies, discover contacts
//!   5. run each chain through the generator with retry + backoff
//!   6. assemble the recommendation
//!
//! Only stage 1 can fail the request. Every later failure is recorded as a
//! notice and the policy decision is always returned.

pub mod chains;
pub mod handlers;
pub mod models;
pub mod outcome;
pub mod prompts;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contacts::{Contact, ContactChain};
use crate::errors::AppError;
use crate::llm_client::{parse_json, Generator};
use crate::orchestrator::chains::{Chain, Excerpt, PromptInput};
use crate::orchestrator::models::{
    Citation, FollowUpQuery, Intent, MessageReview, NarrativeSection, Recommendation,
    StyleDecision, TimingDecision, ValidatedQuery,
};
use crate::orchestrator::outcome::{Notice, NoticeKind, StageOutcome};
use crate::orchestrator::retry::{with_retry, RetryPolicy};
use crate::policy::PolicySet;
use crate::retrieval::{RetrievalError, RetrievedChunk, Retriever};

const EXCERPT_CHARS: usize = 160;

/// Which optional stages run. The policy decision always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageToggles {
    /// Stage 4: knowledge retrieval and contact discovery.
    pub retrieval: bool,
    /// Stage 5: generation chains.
    pub synthesis: bool,
}

impl StageToggles {
    pub const FULL: Self = Self {
        retrieval: true,
        synthesis: true,
    };
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub top_k: usize,
    /// Chunks scoring below this are treated as misses.
    pub min_similarity: f64,
    pub retrieval_timeout: Duration,
    pub retry: RetryPolicy,
    /// Fixes every request's Thompson draws when set.
    pub rng_seed: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.3,
            retrieval_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            rng_seed: None,
        }
    }
}

pub struct Orchestrator {
    policies: Arc<PolicySet>,
    generator: Arc<dyn Generator>,
    retriever: Option<Arc<dyn Retriever>>,
    contacts: ContactChain,
    config: OrchestratorConfig,
}

/// Stage 4 result: citations for the whole request plus each chain's excerpts.
#[derive(Default)]
struct RetrievedContext {
    citations: Vec<Citation>,
    per_chain: HashMap<&'static str, Vec<Excerpt>>,
}

impl RetrievedContext {
    fn excerpts_for(&self, chain: Chain) -> Option<&[Excerpt]> {
        self.per_chain
            .get(chain.name())
            .filter(|e| !e.is_empty())
            .map(Vec::as_slice)
    }
}

impl Orchestrator {
    /// Takes ownership of the tables and freezes them; they are never
    /// mutated again for the lifetime of the orchestrator.
    pub fn new(
        mut policies: PolicySet,
        generator: Arc<dyn Generator>,
        retriever: Option<Arc<dyn Retriever>>,
        contacts: ContactChain,
        config: OrchestratorConfig,
    ) -> Self {
        policies.freeze();
        Self {
            policies: Arc::new(policies),
            generator,
            retriever,
            contacts,
            config,
        }
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn retriever(&self) -> Option<&dyn Retriever> {
        self.retriever.as_deref()
    }

    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    pub async fn handle_query(&self, query: FollowUpQuery) -> Result<Recommendation, AppError> {
        self.handle_query_with(query, StageToggles::FULL).await
    }

    pub async fn handle_query_with(
        &self,
        query: FollowUpQuery,
        toggles: StageToggles,
    ) -> Result<Recommendation, AppError> {
        // Stage 1
        let query = query.validate()?;
        info!("Handling {} query for {}", query.intent, query.company_label());

        // Stage 2
        let mut rng = self.request_rng();
        let (timing, style) = self.decide(&query, &mut rng);
        debug!(
            "Policy decision: wait {} days, style {}",
            timing.wait_days,
            style.style.as_str()
        );

        // Stage 3
        let chains = Chain::for_intent(query.intent);
        let mut notices = Vec::new();

        // Stage 4
        let (retrieved, contacts) = if toggles.retrieval {
            let retrieved = self.retrieve(chains, &query, &style, &mut notices).await;
            let contacts = if query.intent == Intent::FullStrategy {
                self.discover_contacts(&query, &mut notices).await
            } else {
                Vec::new()
            };
            (retrieved, contacts)
        } else {
            (RetrievedContext::default(), Vec::new())
        };

        // Stage 5
        let mut sections = Vec::new();
        let mut message_review = None;
        if toggles.synthesis {
            for &chain in chains {
                let prompt = chain.build_prompt(&PromptInput {
                    query: &query,
                    timing: &timing,
                    style: &style,
                    excerpts: retrieved.excerpts_for(chain),
                    contacts: &contacts,
                });
                let Some(text) = self.synthesize(chain, prompt).await.record(&mut notices) else {
                    continue;
                };
                if chain == Chain::MessageCoach {
                    match parse_json::<MessageReview>(&text).and_then(MessageReview::checked) {
                        Ok(review) => message_review = Some(review),
                        Err(e) => {
                            warn!("Message coach returned unusable output: {}", e);
                            notices.push(Notice::new(
                                NoticeKind::GenerationFatal,
                                Some(chain.name()),
                                e.to_string(),
                            ));
                        }
                    }
                } else {
                    sections.push(NarrativeSection {
                        chain: chain.name().to_string(),
                        text: text.trim().to_string(),
                    });
                }
            }
        }

        // Stage 6
        let degraded = notices.iter().any(|n| n.kind.drops_narrative());
        if degraded {
            warn!(
                "Returning degraded {} recommendation ({} notices)",
                query.intent,
                notices.len()
            );
        }
        let narrative = sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Recommendation {
            id: Uuid::new_v4(),
            intent: query.intent,
            created_at: Utc::now(),
            timing,
            style,
            citations: retrieved.citations,
            sections,
            narrative,
            message_review,
            contacts,
            notices,
            degraded,
        })
    }

    fn request_rng(&self) -> ChaCha8Rng {
        match self.config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn decide(&self, query: &ValidatedQuery, rng: &mut ChaCha8Rng) -> (TimingDecision, StyleDecision) {
        let state = query.timing_state();
        let action = self.policies.timing.select_action(state, rng);
        let wait_days = action.days();
        let timing = TimingDecision {
            wait_days,
            state: state.to_string(),
            q_value: self.policies.timing.q_value(state, action),
            confidence: self.policies.timing.confidence(state),
            should_act_now: query.days_since_application >= wait_days,
        };

        let context = query.style_context();
        let arm = self.policies.style.select_arm(context, rng);
        let posterior = self.policies.style.posterior(context, arm);
        let style = StyleDecision {
            style: arm,
            context: context.to_string(),
            confidence: posterior.posterior_mean(),
            alpha: posterior.alpha,
            beta: posterior.beta,
        };
        (timing, style)
    }

    async fn retrieve(
        &self,
        chains: &[Chain],
        query: &ValidatedQuery,
        style: &StyleDecision,
        notices: &mut Vec<Notice>,
    ) -> RetrievedContext {
        let mut context = RetrievedContext::default();
        let mut citation_by_chunk: HashMap<String, usize> = HashMap::new();

        for &chain in chains {
            let queries = chain.retrieval_queries(query, style);
            if queries.is_empty() {
                continue;
            }
            let Some(retriever) = &self.retriever else {
                notices.push(Notice::new(
                    NoticeKind::RetrievalUnavailable,
                    Some(chain.name()),
                    "no knowledge index configured; using generic guidance",
                ));
                continue;
            };

            let mut excerpts = Vec::new();
            for q in &queries {
                let Some(chunks) = self
                    .retrieve_one(retriever.as_ref(), chain, q)
                    .await
                    .record(notices)
                else {
                    continue;
                };
                for chunk in chunks {
                    let index = *citation_by_chunk.entry(chunk.id.clone()).or_insert_with(|| {
                        context.citations.push(citation(context.citations.len() + 1, &chunk));
                        context.citations.len()
                    });
                    if !excerpts.iter().any(|e: &Excerpt| e.index == index) {
                        excerpts.push(Excerpt { index, chunk });
                    }
                }
            }
            if excerpts.is_empty() {
                debug!("{} falls back to generic guidance", chain.name());
            }
            context.per_chain.insert(chain.name(), excerpts);
        }
        context
    }

    async fn retrieve_one(
        &self,
        retriever: &dyn Retriever,
        chain: Chain,
        query: &str,
    ) -> StageOutcome<Vec<RetrievedChunk>> {
        let result = tokio::time::timeout(
            self.config.retrieval_timeout,
            retriever.retrieve(query, self.config.top_k),
        )
        .await
        .unwrap_or(Err(RetrievalError::Timeout));

        let chunks = match result {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Retrieval for {} failed: {}", chain.name(), e);
                return StageOutcome::Degraded(Notice::new(
                    NoticeKind::RetrievalFailed,
                    Some(chain.name()),
                    e.to_string(),
                ));
            }
        };
        if chunks.is_empty() {
            return StageOutcome::Degraded(Notice::new(
                NoticeKind::RetrievalEmpty,
                Some(chain.name()),
                format!("no guidance found for '{query}'"),
            ));
        }

        let best = chunks.iter().map(|c| c.score).fold(0.0, f64::max);
        let usable: Vec<RetrievedChunk> = chunks
            .into_iter()
            .filter(|c| c.score >= self.config.min_similarity)
            .collect();
        if usable.is_empty() {
            return StageOutcome::Degraded(Notice::new(
                NoticeKind::RetrievalLowSimilarity,
                Some(chain.name()),
                format!(
                    "best similarity {:.2} is below {:.2} for '{query}'",
                    best, self.config.min_similarity
                ),
            ));
        }
        StageOutcome::Complete(usable)
    }

    async fn discover_contacts(&self, query: &ValidatedQuery, notices: &mut Vec<Notice>) -> Vec<Contact> {
        let Some(company) = &query.company_name else {
            return Vec::new();
        };
        let contacts = self.contacts.find_contacts(company).await;
        if contacts.is_empty() {
            notices.push(Notice::new(
                NoticeKind::ContactsNotFound,
                None,
                format!("no contacts found at {company}"),
            ));
        }
        contacts
    }

    async fn synthesize(&self, chain: Chain, prompt: String) -> StageOutcome<String> {
        let generator: &dyn Generator = self.generator.as_ref();
        let prompt: &str = &prompt;
        let (temperature, max_tokens) = (chain.temperature(), chain.max_tokens());
        let label = format!("{} generation", chain.name());

        match with_retry(&self.config.retry, &label, move || {
            generator.generate(prompt, temperature, max_tokens)
        })
        .await
        {
            Ok(text) => StageOutcome::Complete(text),
            Err(failure) if failure.exhausted() => StageOutcome::Degraded(Notice::new(
                NoticeKind::GenerationExhausted,
                Some(chain.name()),
                format!("{} (after {} attempts)", failure.error, failure.attempts),
            )),
            Err(failure) => StageOutcome::Degraded(Notice::new(
                NoticeKind::GenerationFatal,
                Some(chain.name()),
                failure.error.to_string(),
            )),
        }
    }
}

fn citation(index: usize, chunk: &RetrievedChunk) -> Citation {
    let mut excerpt: String = chunk.text.chars().take(EXCERPT_CHARS).collect();
    if chunk.text.chars().count() > EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    Citation {
        index,
        source: chunk.source.clone(),
        category: chunk.category.clone(),
        score: chunk.score,
        excerpt,
    }
}
