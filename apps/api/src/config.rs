use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::orchestrator::retry::RetryPolicy;
use crate::orchestrator::OrchestratorConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or a value is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub anthropic_api_key: String,
    /// Enables embedding-backed retrieval together with `knowledge_index_path`.
    pub openai_api_key: Option<String>,
    pub knowledge_index_path: Option<PathBuf>,
    pub contacts_path: Option<PathBuf>,
    pub policy_path: PathBuf,
    /// JSONL of real follow-up outcomes replayed after simulated training.
    pub feedback_path: Option<PathBuf>,
    pub training_episodes: usize,
    pub training_seed: u64,
    pub policy_rng_seed: Option<u64>,
    pub generation_max_attempts: u32,
    pub generation_backoff_ms: u64,
    pub generation_timeout_secs: u64,
    pub retrieval_timeout_secs: u64,
    pub retrieval_min_similarity: f64,
    pub enable_llm_judge: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: optional_env("OPENAI_API_KEY"),
            knowledge_index_path: optional_env("KNOWLEDGE_INDEX_PATH").map(PathBuf::from),
            contacts_path: optional_env("CONTACTS_PATH").map(PathBuf::from),
            policy_path: optional_env("POLICY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("policies.json")),
            feedback_path: optional_env("FEEDBACK_PATH").map(PathBuf::from),
            training_episodes: parse_env("TRAINING_EPISODES", 5_000)?,
            training_seed: parse_env("TRAINING_SEED", 42)?,
            policy_rng_seed: optional_env("POLICY_RNG_SEED")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("POLICY_RNG_SEED must be an unsigned integer")?,
            generation_max_attempts: parse_env("GENERATION_MAX_ATTEMPTS", 3)?,
            generation_backoff_ms: parse_env("GENERATION_BACKOFF_MS", 1_000)?,
            generation_timeout_secs: parse_env("GENERATION_TIMEOUT_SECS", 60)?,
            retrieval_timeout_secs: parse_env("RETRIEVAL_TIMEOUT_SECS", 15)?,
            retrieval_min_similarity: parse_env("RETRIEVAL_MIN_SIMILARITY", 0.3)?,
            enable_llm_judge: parse_env("ENABLE_LLM_JUDGE", false)?,
        })
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            min_similarity: self.retrieval_min_similarity,
            retrieval_timeout: Duration::from_secs(self.retrieval_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.generation_max_attempts,
                base_backoff: Duration::from_millis(self.generation_backoff_ms),
                attempt_timeout: Duration::from_secs(self.generation_timeout_secs),
            },
            rng_seed: self.policy_rng_seed,
            ..Default::default()
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
