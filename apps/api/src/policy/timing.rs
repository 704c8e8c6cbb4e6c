//! Timing policy: tabular Q-learning over (state, wait-duration).
//!
//! Update rule: Q(s,a) ← Q(s,a) + α · [r + γ · max_a' Q(s',a') − Q(s,a)].
//! Reward shaping lives with the caller; this table only consumes rewards.
//!
//! Action selection is ε-greedy with a single code path: a frozen policy
//! simply runs with ε = 0, which makes inference deterministic for a given
//! table.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::policy::types::{TimingAction, TimingState};
use crate::policy::{PolicyError, PolicyMode};

/// Hyperparameters for the tabular learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QLearningParams {
    pub learning_rate: f64,
    pub discount: f64,
    /// Exploration rate used while the policy is in training mode.
    pub epsilon: f64,
}

impl Default for QLearningParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount: 0.9,
            epsilon: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimingPolicy {
    /// Row-major: `q[state.index() * 6 + action.index()]`.
    q: Vec<f64>,
    params: QLearningParams,
    mode: PolicyMode,
}

impl TimingPolicy {
    pub fn new(params: QLearningParams) -> Self {
        Self {
            q: vec![0.0; TimingState::COUNT * TimingAction::COUNT],
            params,
            mode: PolicyMode::Training,
        }
    }

    /// Rebuilds a policy from persisted rows. Loaded tables are always frozen.
    pub(crate) fn from_table(q: Vec<f64>, params: QLearningParams) -> Result<Self, PolicyError> {
        if q.len() != TimingState::COUNT * TimingAction::COUNT {
            return Err(PolicyError::InvalidParams(format!(
                "timing table has {} cells, expected {}",
                q.len(),
                TimingState::COUNT * TimingAction::COUNT
            )));
        }
        if let Some(bad) = q.iter().find(|v| !v.is_finite()) {
            return Err(PolicyError::InvalidParams(format!(
                "timing table contains non-finite value {bad}"
            )));
        }
        Ok(Self {
            q,
            params,
            mode: PolicyMode::Frozen,
        })
    }

    pub fn params(&self) -> QLearningParams {
        self.params
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn freeze(&mut self) {
        self.mode = PolicyMode::Frozen;
    }

    fn effective_epsilon(&self) -> f64 {
        match self.mode {
            PolicyMode::Training => self.params.epsilon,
            PolicyMode::Frozen => 0.0,
        }
    }

    pub fn q_value(&self, state: TimingState, action: TimingAction) -> f64 {
        self.q[state.index() * TimingAction::COUNT + action.index()]
    }

    pub fn q_values(&self, state: TimingState) -> &[f64] {
        let start = state.index() * TimingAction::COUNT;
        &self.q[start..start + TimingAction::COUNT]
    }

    /// Arg-max over actions. Ties resolve to the shortest wait because actions
    /// are scanned shortest first and only a strictly larger value replaces
    /// the incumbent.
    pub fn greedy_action(&self, state: TimingState) -> TimingAction {
        let values = self.q_values(state);
        let mut best = 0;
        for (i, &v) in values.iter().enumerate().skip(1) {
            if v > values[best] {
                best = i;
            }
        }
        TimingAction::from_index(best)
    }

    /// ε-greedy selection. With a frozen table ε is zero and the draw never
    /// falls under it, so the result equals `greedy_action`.
    pub fn select_action<R: Rng + ?Sized>(&self, state: TimingState, rng: &mut R) -> TimingAction {
        if rng.gen::<f64>() < self.effective_epsilon() {
            TimingAction::from_index(rng.gen_range(0..TimingAction::COUNT))
        } else {
            self.greedy_action(state)
        }
    }

    /// Applies one temporal-difference step and returns the new Q(s, a).
    pub fn update(
        &mut self,
        state: TimingState,
        action: TimingAction,
        reward: f64,
        next_state: TimingState,
    ) -> Result<f64, PolicyError> {
        if self.mode == PolicyMode::Frozen {
            return Err(PolicyError::Frozen("timing"));
        }

        let next_max = self
            .q_values(next_state)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let idx = state.index() * TimingAction::COUNT + action.index();
        let current = self.q[idx];
        let td_target = reward + self.params.discount * next_max;
        self.q[idx] = current + self.params.learning_rate * (td_target - current);
        Ok(self.q[idx])
    }

    /// Margin of the greedy action over the runner-up, scaled by the state's
    /// value range. 0.0 when every action has the same estimate.
    pub fn confidence(&self, state: TimingState) -> f64 {
        let values = self.q_values(state);
        let best_action = self.greedy_action(state).index();
        let best = values[best_action];
        let runner_up = values
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best_action)
            .map(|(_, &v)| v)
            .fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        let range = best - min;
        if range <= f64::EPSILON {
            return 0.0;
        }
        ((best - runner_up) / range).clamp(0.0, 1.0)
    }

    pub(crate) fn table(&self) -> &[f64] {
        &self.q
    }
}
