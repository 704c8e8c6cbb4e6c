//! Offline training: synthetic application episodes and the sequential
//! training loop that feeds them to both policies.
//!
//! The loop always runs the configured number of episodes. Convergence (the
//! windowed entropy of selected wait-durations dropping under a threshold) is
//! only reported.

pub mod feedback;
pub mod priors;

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::policy::types::{
    CompanyCulture, CompanyType, ContactTitle, StyleContext, TimingAction, TimingState,
};
use crate::policy::{Episode, Outcome, PolicyError, PolicySet};
use crate::simulation::priors::ResponsePriors;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Episodes in the sliding window used for convergence reporting.
    pub window: usize,
    /// Entropy (nats) under which the selected-action distribution counts as settled.
    pub entropy_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            window: 200,
            entropy_threshold: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: usize,
    pub mean_reward: f64,
    pub response_rate: f64,
    pub interview_rate: f64,
    /// Mean reward over the final window.
    pub final_window_reward: f64,
    /// Entropy (nats) of the selected-action histogram over the final window.
    pub final_window_entropy: f64,
    /// First episode at which the windowed entropy fell under the threshold.
    pub converged_at: Option<usize>,
}

/// A sampled applicant situation before any policy has acted on it.
#[derive(Debug, Clone, Copy)]
struct Situation {
    days_since_application: u32,
    state: TimingState,
    context: StyleContext,
}

pub struct SimulationEnvironment {
    priors: ResponsePriors,
    config: SimulationConfig,
    rng: ChaCha8Rng,
}

impl SimulationEnvironment {
    pub fn new(priors: ResponsePriors, config: SimulationConfig, seed: u64) -> Self {
        Self {
            priors,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn sample_situation(&mut self, priors: &ResponsePriors) -> Situation {
        let company = CompanyType::ALL[self.rng.gen_range(0..CompanyType::ALL.len())];
        let has_connection = self.rng.gen::<f64>() < priors.connection_rate;
        let days_since_application = self.rng.gen_range(0..=14);

        let (casual, formal) = priors.culture_thresholds(company);
        let roll = self.rng.gen::<f64>();
        let culture = if roll < casual {
            CompanyCulture::Casual
        } else if roll < formal {
            CompanyCulture::Formal
        } else {
            CompanyCulture::Mixed
        };
        let contact_title = ContactTitle::ALL[self.rng.gen_range(0..ContactTitle::ALL.len())];

        Situation {
            days_since_application,
            state: TimingState::new(days_since_application, company, has_connection),
            context: StyleContext {
                contact_title,
                culture,
                has_connection,
            },
        }
    }

    /// Synthesises one application, lets both policies act on it (with
    /// exploration when they are in training mode) and samples the outcome
    /// from `priors`.
    pub fn generate_episode(&mut self, priors: &ResponsePriors, policies: &PolicySet) -> Episode {
        let situation = self.sample_situation(priors);
        let action = policies.timing.select_action(situation.state, &mut self.rng);
        let arm = policies.style.select_arm(situation.context, &mut self.rng);

        let p_response = priors.response_probability(situation.state, situation.context, action, arm);
        let responded = self.rng.gen::<f64>() < p_response;
        let interviewed =
            responded && self.rng.gen::<f64>() < priors.interview_probability(situation.state.company);

        Episode {
            state: situation.state,
            context: situation.context,
            action,
            arm,
            next_state: situation
                .state
                .advanced_by(situation.days_since_application, action),
            outcome: Outcome {
                responded,
                interviewed,
                days_waited: action.days(),
            },
        }
    }

    /// Generates and learns from `num_episodes` episodes, strictly in sequence.
    pub fn run_training_loop(
        &mut self,
        policies: &mut PolicySet,
        num_episodes: usize,
    ) -> Result<TrainingReport, PolicyError> {
        let priors = self.priors.clone();
        let window = self.config.window.max(1);
        let mut recent_actions: VecDeque<TimingAction> = VecDeque::with_capacity(window);
        let mut recent_rewards: VecDeque<f64> = VecDeque::with_capacity(window);

        let mut total_reward = 0.0;
        let mut responses = 0usize;
        let mut interviews = 0usize;
        let mut converged_at = None;

        for i in 0..num_episodes {
            let episode = self.generate_episode(&priors, policies);
            let step = policies.learn(episode)?;

            total_reward += step.reward;
            responses += usize::from(episode.outcome.responded);
            interviews += usize::from(episode.outcome.interviewed);

            if recent_actions.len() == window {
                recent_actions.pop_front();
                recent_rewards.pop_front();
            }
            recent_actions.push_back(episode.action);
            recent_rewards.push_back(step.reward);

            if converged_at.is_none()
                && recent_actions.len() == window
                && action_entropy(&recent_actions) < self.config.entropy_threshold
            {
                converged_at = Some(i + 1);
                debug!("Selected-action entropy settled at episode {}", i + 1);
            }
        }

        let n = num_episodes.max(1) as f64;
        let report = TrainingReport {
            episodes: num_episodes,
            mean_reward: total_reward / n,
            response_rate: responses as f64 / n,
            interview_rate: interviews as f64 / n,
            final_window_reward: if recent_rewards.is_empty() {
                0.0
            } else {
                recent_rewards.iter().sum::<f64>() / recent_rewards.len() as f64
            },
            final_window_entropy: action_entropy(&recent_actions),
            converged_at,
        };

        info!(
            "Training finished: {} episodes, mean reward {:.2}, response rate {:.1}%, window entropy {:.3}",
            report.episodes,
            report.mean_reward,
            report.response_rate * 100.0,
            report.final_window_entropy
        );
        Ok(report)
    }
}

/// Shannon entropy (nats) of the empirical action distribution.
pub fn action_entropy<'a>(actions: impl IntoIterator<Item = &'a TimingAction>) -> f64 {
    let mut counts = [0usize; TimingAction::COUNT];
    let mut total = 0usize;
    for a in actions {
        counts[a.index()] += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}
