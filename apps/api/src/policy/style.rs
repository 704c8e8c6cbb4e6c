//! Style policy: per-context Thompson Sampling over message styles.
//!
//! Each (context, arm) pair keeps only two counters; Beta–Bernoulli conjugacy
//! makes them a sufficient statistic, so no episode history is retained.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::policy::sampling;
use crate::policy::types::{StyleArm, StyleContext};
use crate::policy::{PolicyError, PolicyMode};

/// Beta posterior counters: (successes + 1, failures + 1). Both stay ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaParams {
    pub alpha: u64,
    pub beta: u64,
}

impl Default for BetaParams {
    fn default() -> Self {
        Self { alpha: 1, beta: 1 }
    }
}

impl BetaParams {
    pub fn posterior_mean(&self) -> f64 {
        self.alpha as f64 / (self.alpha + self.beta) as f64
    }

    pub fn observations(&self) -> u64 {
        self.alpha + self.beta - 2
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sampling::beta(self.alpha as f64, self.beta as f64, rng)
    }
}

#[derive(Debug, Clone)]
pub struct StylePolicy {
    /// Row-major: `params[context.index() * 3 + arm.index()]`.
    params: Vec<BetaParams>,
    mode: PolicyMode,
}

impl Default for StylePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl StylePolicy {
    pub fn new() -> Self {
        Self {
            params: vec![BetaParams::default(); StyleContext::COUNT * StyleArm::COUNT],
            mode: PolicyMode::Training,
        }
    }

    /// Rebuilds a policy from persisted rows. Loaded tables are always frozen.
    pub(crate) fn from_table(params: Vec<BetaParams>) -> Result<Self, PolicyError> {
        if params.len() != StyleContext::COUNT * StyleArm::COUNT {
            return Err(PolicyError::InvalidParams(format!(
                "style table has {} cells, expected {}",
                params.len(),
                StyleContext::COUNT * StyleArm::COUNT
            )));
        }
        if params.iter().any(|p| p.alpha < 1 || p.beta < 1) {
            return Err(PolicyError::InvalidParams(
                "style table contains a Beta counter below 1".to_string(),
            ));
        }
        Ok(Self {
            params,
            mode: PolicyMode::Frozen,
        })
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn freeze(&mut self) {
        self.mode = PolicyMode::Frozen;
    }

    pub fn posterior(&self, context: StyleContext, arm: StyleArm) -> BetaParams {
        self.params[context.index() * StyleArm::COUNT + arm.index()]
    }

    /// Draws once from every arm's posterior and returns the arm with the
    /// largest draw. Two calls with identical inputs may disagree.
    pub fn select_arm<R: Rng + ?Sized>(&self, context: StyleContext, rng: &mut R) -> StyleArm {
        let mut best = StyleArm::Formal;
        let mut best_draw = f64::NEG_INFINITY;
        for arm in StyleArm::ALL {
            let draw = self.posterior(context, arm).sample(rng);
            if draw > best_draw {
                best = arm;
                best_draw = draw;
            }
        }
        best
    }

    /// Arm with the highest posterior mean; used for reporting, not selection.
    pub fn best_mean_arm(&self, context: StyleContext) -> StyleArm {
        let mut best = StyleArm::Formal;
        for arm in StyleArm::ALL.into_iter().skip(1) {
            if self.posterior(context, arm).posterior_mean()
                > self.posterior(context, best).posterior_mean()
            {
                best = arm;
            }
        }
        best
    }

    pub fn update(
        &mut self,
        context: StyleContext,
        arm: StyleArm,
        success: bool,
    ) -> Result<(), PolicyError> {
        if self.mode == PolicyMode::Frozen {
            return Err(PolicyError::Frozen("style"));
        }
        let cell = &mut self.params[context.index() * StyleArm::COUNT + arm.index()];
        if success {
            cell.alpha += 1;
        } else {
            cell.beta += 1;
        }
        Ok(())
    }

    /// Returns every counter to the uniform prior. The only path that lowers a counter.
    pub fn reset(&mut self) -> Result<(), PolicyError> {
        if self.mode == PolicyMode::Frozen {
            return Err(PolicyError::Frozen("style"));
        }
        self.params.fill(BetaParams::default());
        Ok(())
    }

    pub(crate) fn table(&self) -> &[BetaParams] {
        &self.params
    }
}
