//! In-process fakes for the collaborator traits, shared by unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::contacts::{Contact, ContactError, ContactProvider};
use crate::evaluation::judge::QualityJudge;
use crate::evaluation::EvaluationError;
use crate::llm_client::{GenerationError, Generator};
use crate::orchestrator::models::{FollowUpQuery, Recommendation};
use crate::policy::timing::QLearningParams;
use crate::policy::PolicySet;
use crate::retrieval::{RetrievalError, RetrievedChunk, Retriever};
use crate::simulation::priors::ResponsePriors;
use crate::simulation::{SimulationConfig, SimulationEnvironment};

pub const SAMPLE_NARRATIVE: &str = "Send a short, specific follow-up on day 5. Mention the role, \
    one concrete reason you are a fit, and ask whether the timeline has changed [1].";

pub const SAMPLE_REVIEW_JSON: &str = r#"{
  "score": 6,
  "feedback": ["Name the role you applied for", "Close with a specific question"],
  "improved_message": "Hi Dana, I applied for the Backend Engineer role last week and wanted to check whether the team has a timeline for next steps."
}"#;

/// Defaults as documented for each environment variable, with a dummy key.
pub fn test_config() -> Config {
    Config {
        port: 8080,
        rust_log: "info".to_string(),
        anthropic_api_key: "test-key".to_string(),
        openai_api_key: None,
        knowledge_index_path: None,
        contacts_path: None,
        policy_path: PathBuf::from("policies.json"),
        feedback_path: None,
        training_episodes: 5_000,
        training_seed: 42,
        policy_rng_seed: None,
        generation_max_attempts: 3,
        generation_backoff_ms: 1_000,
        generation_timeout_secs: 60,
        retrieval_timeout_secs: 15,
        retrieval_min_similarity: 0.3,
        enable_llm_judge: false,
    }
}

/// Small deterministic training run, not yet frozen.
pub fn trained_policies() -> PolicySet {
    let mut policies = PolicySet::new(QLearningParams::default());
    SimulationEnvironment::new(ResponsePriors::default(), SimulationConfig::default(), 42)
        .run_training_loop(&mut policies, 2_000)
        .expect("training on fresh tables cannot fail");
    policies
}

pub fn timing_query() -> FollowUpQuery {
    FollowUpQuery {
        intent: "timing".to_string(),
        company_type: "startup".to_string(),
        days_since_application: 4,
        position: Some("Backend Engineer".to_string()),
        ..Default::default()
    }
}

pub fn sample_chunk(id: &str, score: f64) -> RetrievedChunk {
    RetrievedChunk {
        id: id.to_string(),
        source: "timing_guidelines.txt".to_string(),
        category: "timing".to_string(),
        text: format!("Guidance {id}: startups usually reply within a week; a polite nudge after five business days is normal."),
        score,
    }
}

pub fn sample_contact(name: &str, relevance: f64) -> Contact {
    Contact {
        name: name.to_string(),
        role: "Technical Recruiter".to_string(),
        relevance,
        source: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generators
// ────────────────────────────────────────────────────────────────────────────

/// Answers every prompt and records it. Prompts asking for a message review
/// get the sample review JSON unless a fixed reply was configured.
pub struct ScriptedGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _temperature: f32, _max_tokens: u32) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        if prompt.contains("\"improved_message\"") {
            Ok(SAMPLE_REVIEW_JSON.to_string())
        } else if prompt.contains("Score the answer") {
            Ok("8".to_string())
        } else {
            Ok(SAMPLE_NARRATIVE.to_string())
        }
    }
}

pub struct FailingGenerator {
    error: fn() -> GenerationError,
    calls: AtomicU32,
}

impl FailingGenerator {
    pub fn new(error: fn() -> GenerationError) -> Self {
        Self {
            error,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32, _max_tokens: u32) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Retrievers
// ────────────────────────────────────────────────────────────────────────────

pub struct StaticRetriever {
    chunks: Vec<RetrievedChunk>,
}

impl StaticRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        Err(RetrievalError::Api {
            status: 503,
            message: "embedding service unavailable".to_string(),
        })
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowRetriever(pub Duration);

#[async_trait]
impl Retriever for SlowRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Contact providers
// ────────────────────────────────────────────────────────────────────────────

pub struct StaticContacts {
    name: String,
    contacts: Vec<Contact>,
}

impl StaticContacts {
    pub fn new(name: &str, contacts: Vec<Contact>) -> Self {
        Self {
            name: name.to_string(),
            contacts,
        }
    }
}

#[async_trait]
impl ContactProvider for StaticContacts {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_contacts(&self, _company: &str) -> Result<Vec<Contact>, ContactError> {
        Ok(self.contacts.clone())
    }
}

pub struct FailingContacts;

#[async_trait]
impl ContactProvider for FailingContacts {
    fn name(&self) -> &str {
        "failing"
    }

    async fn find_contacts(&self, _company: &str) -> Result<Vec<Contact>, ContactError> {
        Err(ContactError::Unavailable("connection refused".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Judges
// ────────────────────────────────────────────────────────────────────────────

pub struct FailingJudge;

#[async_trait]
impl QualityJudge for FailingJudge {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn score(&self, _situation: &str, _recommendation: &Recommendation) -> Result<f64, EvaluationError> {
        Err(EvaluationError::Judge("grader offline".to_string()))
    }
}
