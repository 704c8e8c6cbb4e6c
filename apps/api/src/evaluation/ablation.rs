//! Ablation harness.
//!
//! Each variant keeps the policy decision and switches the optional stages
//! on or off:
//! - rl_only:      policy decision only
//! - rl_retrieval: + knowledge retrieval (citations, contacts)
//! - rl_synthesis: + generation chains, with generic prompts
//! - full:         every stage
//!
//! Every scenario is run under every requested variant; the report gives
//! per-variant means and their change relative to the baseline variant.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::evaluation::judge::QualityJudge;
use crate::evaluation::EvaluationError;
use crate::orchestrator::models::FollowUpQuery;
use crate::orchestrator::{Orchestrator, StageToggles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AblationVariant {
    RlOnly,
    RlRetrieval,
    RlSynthesis,
    Full,
}

impl AblationVariant {
    pub const ALL: [AblationVariant; 4] = [
        Self::RlOnly,
        Self::RlRetrieval,
        Self::RlSynthesis,
        Self::Full,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RlOnly => "rl_only",
            Self::RlRetrieval => "rl_retrieval",
            Self::RlSynthesis => "rl_synthesis",
            Self::Full => "full",
        }
    }

    pub fn toggles(&self) -> StageToggles {
        match self {
            Self::RlOnly => StageToggles {
                retrieval: false,
                synthesis: false,
            },
            Self::RlRetrieval => StageToggles {
                retrieval: true,
                synthesis: false,
            },
            Self::RlSynthesis => StageToggles {
                retrieval: false,
                synthesis: true,
            },
            Self::Full => StageToggles::FULL,
        }
    }

    pub fn components(&self) -> Vec<&'static str> {
        let toggles = self.toggles();
        let mut components = vec!["policy"];
        if toggles.retrieval {
            components.push("retrieval");
        }
        if toggles.synthesis {
            components.push("synthesis");
        }
        components
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AblationScenario {
    pub name: String,
    pub query: FollowUpQuery,
}

impl AblationScenario {
    fn situation(&self) -> String {
        format!(
            "{} company, applied {} days ago, {}",
            self.query.company_type,
            self.query.days_since_application,
            if self.query.has_connection {
                "has an internal connection"
            } else {
                "no connection"
            }
        )
    }
}

/// Startup with and without a connection, and a cold enterprise application.
pub fn default_scenarios() -> Vec<AblationScenario> {
    [
        ("startup_with_connection", "startup", true),
        ("startup_cold", "startup", false),
        ("enterprise_cold", "enterprise", false),
    ]
    .into_iter()
    .map(|(name, company_type, has_connection)| AblationScenario {
        name: name.to_string(),
        query: FollowUpQuery {
            intent: "timing".to_string(),
            company_type: company_type.to_string(),
            position: Some("Software Engineer".to_string()),
            days_since_application: 4,
            has_connection,
            ..Default::default()
        },
    })
    .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRun {
    pub scenario: String,
    pub variant: AblationVariant,
    /// Characters in the rendered recommendation.
    pub length: usize,
    pub quality: f64,
    pub latency_ms: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantSummary {
    pub variant: AblationVariant,
    pub components: Vec<&'static str>,
    pub mean_length: f64,
    pub mean_quality: f64,
    pub mean_latency_ms: f64,
    pub degraded_runs: usize,
    /// Relative change against the baseline variant; 0 for the baseline itself
    /// and whenever the baseline mean is 0.
    pub length_delta: f64,
    pub quality_delta: f64,
    /// Quality difference from the baseline in score points. Stays
    /// meaningful when the baseline never generated anything and scored 0.
    pub quality_gain: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AblationReport {
    pub judge: &'static str,
    pub baseline: AblationVariant,
    pub runs: Vec<ScenarioRun>,
    pub summaries: Vec<VariantSummary>,
}

pub struct EvaluationHarness {
    orchestrator: Arc<Orchestrator>,
    judge: Arc<dyn QualityJudge>,
}

impl EvaluationHarness {
    pub fn new(orchestrator: Arc<Orchestrator>, judge: Arc<dyn QualityJudge>) -> Self {
        Self { orchestrator, judge }
    }

    /// Runs every scenario under every variant. Empty inputs mean all
    /// variants / the default scenarios. The baseline is the first variant
    /// in `AblationVariant::ALL` order that was requested.
    pub async fn run_ablation(
        &self,
        variants: &[AblationVariant],
        scenarios: &[AblationScenario],
    ) -> Result<AblationReport, EvaluationError> {
        let variants: BTreeSet<AblationVariant> = if variants.is_empty() {
            AblationVariant::ALL.into_iter().collect()
        } else {
            variants.iter().copied().collect()
        };
        let defaults;
        let scenarios = if scenarios.is_empty() {
            defaults = default_scenarios();
            &defaults[..]
        } else {
            scenarios
        };

        info!(
            "Running ablation: {} variants x {} scenarios, judge {}",
            variants.len(),
            scenarios.len(),
            self.judge.name()
        );

        let mut runs = Vec::with_capacity(variants.len() * scenarios.len());
        for scenario in scenarios {
            let situation = scenario.situation();
            for &variant in &variants {
                let started = Instant::now();
                let recommendation = self
                    .orchestrator
                    .handle_query_with(scenario.query.clone(), variant.toggles())
                    .await
                    .map_err(|e| {
                        EvaluationError::InvalidSample(format!("scenario '{}': {}", scenario.name, e))
                    })?;
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let quality = self.judge.score(&situation, &recommendation).await?;
                runs.push(ScenarioRun {
                    scenario: scenario.name.clone(),
                    variant,
                    length: recommendation.render().chars().count(),
                    quality,
                    latency_ms,
                    degraded: recommendation.degraded,
                });
            }
        }

        let mut summaries: Vec<VariantSummary> = variants.iter().map(|&v| summarize(v, &runs)).collect();
        let baseline = summaries[0].clone();
        for s in &mut summaries {
            s.length_delta = relative(s.mean_length, baseline.mean_length);
            s.quality_delta = relative(s.mean_quality, baseline.mean_quality);
            s.quality_gain = s.mean_quality - baseline.mean_quality;
        }
        for s in &summaries {
            info!(
                "{:<13} length {:>7.1} ({:+.0}%), quality {:.2} ({:+.2}), {:.1}ms",
                s.variant.as_str(),
                s.mean_length,
                s.length_delta * 100.0,
                s.mean_quality,
                s.quality_gain,
                s.mean_latency_ms
            );
        }

        Ok(AblationReport {
            judge: self.judge.name(),
            baseline: baseline.variant,
            runs,
            summaries,
        })
    }
}

fn summarize(variant: AblationVariant, runs: &[ScenarioRun]) -> VariantSummary {
    let mine: Vec<&ScenarioRun> = runs.iter().filter(|r| r.variant == variant).collect();
    let n = mine.len().max(1) as f64;
    VariantSummary {
        variant,
        components: variant.components(),
        mean_length: mine.iter().map(|r| r.length as f64).sum::<f64>() / n,
        mean_quality: mine.iter().map(|r| r.quality).sum::<f64>() / n,
        mean_latency_ms: mine.iter().map(|r| r.latency_ms).sum::<f64>() / n,
        degraded_runs: mine.iter().filter(|r| r.degraded).count(),
        length_delta: 0.0,
        quality_delta: 0.0,
        quality_gain: 0.0,
    }
}

fn relative(value: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        (value - baseline) / baseline
    } else {
        0.0
    }
}
