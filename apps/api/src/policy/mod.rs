// Adaptive decision layer: the timing Q-table and the style bandit.
// Both are owned here, trained sequentially, then frozen and shared read-only
// with the orchestrator. Nothing in this module performs I/O except `store`.

pub mod sampling;
pub mod store;
pub mod style;
pub mod timing;
pub mod types;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::style::StylePolicy;
use crate::policy::timing::{QLearningParams, TimingPolicy};
use crate::policy::types::{StyleArm, StyleContext, TimingAction, TimingState};

/// Training mutates, frozen only reads. The two phases never overlap for
/// one table; a frozen table rejects every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Training,
    Frozen,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{0} policy is frozen; updates are only accepted during training")]
    Frozen(&'static str),

    #[error("unknown table key: {0}")]
    UnknownKey(String),

    #[error("invalid policy parameters: {0}")]
    InvalidParams(String),

    #[error("policy file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Observed result of one follow-up decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub responded: bool,
    pub interviewed: bool,
    pub days_waited: u32,
}

impl Outcome {
    /// r = 20·[responded] + 50·[interviewed] − 2·days_waited
    pub fn reward(&self) -> f64 {
        let mut r = -2.0 * self.days_waited as f64;
        if self.responded {
            r += 20.0;
        }
        if self.interviewed {
            r += 50.0;
        }
        r
    }
}

/// One application instance, simulated or real. Consumed by a single
/// `PolicySet::learn` call and then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub state: TimingState,
    pub context: StyleContext,
    pub action: TimingAction,
    pub arm: StyleArm,
    pub next_state: TimingState,
    pub outcome: Outcome,
}

/// Summary of what a single `learn` call did to the tables.
#[derive(Debug, Clone, Copy)]
pub struct LearnStep {
    pub reward: f64,
    pub q_after: f64,
}

/// The pair of learned tables handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub timing: TimingPolicy,
    pub style: StylePolicy,
}

impl PolicySet {
    pub fn new(params: QLearningParams) -> Self {
        Self {
            timing: TimingPolicy::new(params),
            style: StylePolicy::new(),
        }
    }

    /// Feeds one episode to both tables. The reward is shaped here, the
    /// tables only consume it.
    pub fn learn(&mut self, episode: Episode) -> Result<LearnStep, PolicyError> {
        let reward = episode.outcome.reward();
        let q_after = self
            .timing
            .update(episode.state, episode.action, reward, episode.next_state)?;
        self.style
            .update(episode.context, episode.arm, episode.outcome.responded)?;
        Ok(LearnStep { reward, q_after })
    }

    pub fn freeze(&mut self) {
        self.timing.freeze();
        self.style.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.timing.mode() == PolicyMode::Frozen && self.style.mode() == PolicyMode::Frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::{CompanyCulture, CompanyType, ContactTitle};

    fn episode(responded: bool, interviewed: bool) -> Episode {
        let state = TimingState::new(1, CompanyType::Startup, true);
        Episode {
            state,
            context: StyleContext {
                contact_title: ContactTitle::Recruiter,
                culture: CompanyCulture::Casual,
                has_connection: true,
            },
            action: TimingAction::Wait3,
            arm: StyleArm::ConnectionFocused,
            next_state: state.advanced_by(1, TimingAction::Wait3),
            outcome: Outcome {
                responded,
                interviewed,
                days_waited: 3,
            },
        }
    }

    #[test]
    fn test_reward_shaping() {
        let o = Outcome {
            responded: true,
            interviewed: true,
            days_waited: 5,
        };
        assert_eq!(o.reward(), 60.0);
        let o = Outcome {
            responded: false,
            interviewed: false,
            days_waited: 14,
        };
        assert_eq!(o.reward(), -28.0);
    }

    #[test]
    fn test_learn_updates_both_tables() {
        let mut set = PolicySet::new(QLearningParams::default());
        let ep = episode(true, false);
        let step = set.learn(ep).unwrap();
        assert_eq!(step.reward, 14.0);
        assert!((step.q_after - 1.4).abs() < 1e-12);
        assert_eq!(set.style.posterior(ep.context, ep.arm).alpha, 2);
    }

    #[test]
    fn test_frozen_set_refuses_to_learn() {
        let mut set = PolicySet::new(QLearningParams::default());
        set.freeze();
        assert!(set.is_frozen());
        assert!(matches!(set.learn(episode(true, true)), Err(PolicyError::Frozen(_))));
    }
}
