mod config;
mod contacts;
mod errors;
mod evaluation;
mod llm_client;
mod orchestrator;
mod policy;
mod retrieval;
mod routes;
mod simulation;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::contacts::{ContactChain, ContactProvider, DirectoryProvider};
use crate::evaluation::judge::{LlmJudge, QualityJudge, RubricJudge};
use crate::llm_client::{Generator, LlmClient};
use crate::orchestrator::Orchestrator;
use crate::policy::timing::QLearningParams;
use crate::policy::{store, PolicySet};
use crate::retrieval::{KnowledgeRetriever, OpenAiEmbedder, Retriever, VectorIndex};
use crate::routes::build_router;
use crate::simulation::priors::ResponsePriors;
use crate::simulation::{feedback, SimulationConfig, SimulationEnvironment};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PostApply API v{}", env!("CARGO_PKG_VERSION"));

    // Policy tables: load the persisted ones or train from scratch
    let policies = load_or_train_policies(&config)?;

    // Initialize LLM client
    let llm: Arc<dyn Generator> = Arc::new(LlmClient::new(
        config.anthropic_api_key.clone(),
        Duration::from_secs(config.generation_timeout_secs),
    ));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let retriever = build_retriever(&config)?;
    let contacts = build_contacts(&config)?;

    // Initialize quality judge (RubricJudge by default; swap via ENABLE_LLM_JUDGE)
    let judge: Arc<dyn QualityJudge> = if config.enable_llm_judge {
        Arc::new(LlmJudge::new(llm.clone()))
    } else {
        Arc::new(RubricJudge)
    };
    info!("Quality judge: {}", judge.name());

    let orchestrator = Orchestrator::new(policies, llm, retriever, contacts, config.orchestrator());

    // Build app state
    let state = AppState {
        config: config.clone(),
        orchestrator: Arc::new(orchestrator),
        judge,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads `POLICY_PATH` if it exists. Otherwise trains in simulation, replays
/// recorded outcomes and persists the result. Freezing happens when the
/// orchestrator takes ownership.
fn load_or_train_policies(config: &Config) -> Result<PolicySet> {
    if config.policy_path.exists() {
        let policies = store::load(&config.policy_path)
            .with_context(|| format!("Failed to load policies from {}", config.policy_path.display()))?;
        info!("Loaded policy tables from {}", config.policy_path.display());
        return Ok(policies);
    }

    info!(
        "No policy tables at {}; training for {} episodes (seed {})",
        config.policy_path.display(),
        config.training_episodes,
        config.training_seed
    );
    let mut policies = PolicySet::new(QLearningParams::default());
    let mut env = SimulationEnvironment::new(
        ResponsePriors::default(),
        SimulationConfig::default(),
        config.training_seed,
    );
    let report = env
        .run_training_loop(&mut policies, config.training_episodes)
        .context("Simulated training failed")?;
    match report.converged_at {
        Some(episode) => info!("Timing policy converged at episode {episode}"),
        None => warn!(
            "Timing policy did not converge (final window entropy {:.3})",
            report.final_window_entropy
        ),
    }

    if let Some(path) = &config.feedback_path {
        feedback::replay_file(&mut policies, path)
            .with_context(|| format!("Failed to replay feedback from {}", path.display()))?;
    }

    store::save(&policies, &config.policy_path)
        .with_context(|| format!("Failed to save policies to {}", config.policy_path.display()))?;
    info!("Saved policy tables to {}", config.policy_path.display());
    Ok(policies)
}

fn build_retriever(config: &Config) -> Result<Option<Arc<dyn Retriever>>> {
    let (Some(key), Some(path)) = (&config.openai_api_key, &config.knowledge_index_path) else {
        warn!("Retrieval disabled (set OPENAI_API_KEY and KNOWLEDGE_INDEX_PATH to enable)");
        return Ok(None);
    };
    let index = VectorIndex::load(path)
        .with_context(|| format!("Failed to load knowledge index from {}", path.display()))?;
    info!("Knowledge index loaded: {} chunks", index.len());
    let embedder = Arc::new(OpenAiEmbedder::new(
        key.clone(),
        Duration::from_secs(config.retrieval_timeout_secs),
    ));
    Ok(Some(Arc::new(KnowledgeRetriever::new(embedder, index))))
}

fn build_contacts(config: &Config) -> Result<ContactChain> {
    let mut providers: Vec<Arc<dyn ContactProvider>> = Vec::new();
    if let Some(path) = &config.contacts_path {
        let directory = DirectoryProvider::load(path)
            .with_context(|| format!("Failed to load contact directory from {}", path.display()))?;
        providers.push(Arc::new(directory));
    }
    let chain = ContactChain::new(providers);
    if chain.is_empty() {
        info!("No contact providers configured");
    }
    Ok(chain)
}
