//! Background response model for synthetic applications.
//!
//! Calibrated to the usual industry baselines: startups answer faster and more
//! often than enterprises, a warm connection lifts the response rate, the
//! "right" wait grows with company size, and message style matters more when it
//! matches the company's culture.

use serde::{Deserialize, Serialize};

use crate::policy::types::{
    CompanyCulture, CompanyType, StyleArm, StyleContext, TimingAction, TimingState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePriors {
    /// Base response probability indexed by company type.
    pub base_response: [f64; 3],
    pub connection_boost: f64,
    /// Wait (days) that maximises the response rate, by company type.
    pub ideal_wait_days: [f64; 3],
    /// Fractional response loss per day away from the ideal wait.
    pub timing_penalty_per_day: f64,
    /// Multiplier by days-since-application bucket.
    pub staleness: [f64; 4],
    /// Multiplier by contact title.
    pub title_factor: [f64; 4],
    /// P(interview | response) by company type.
    pub interview_given_response: [f64; 3],
    /// Probability that a sampled applicant has a connection.
    pub connection_rate: f64,
}

impl Default for ResponsePriors {
    fn default() -> Self {
        Self {
            base_response: [0.40, 0.30, 0.22],
            connection_boost: 0.15,
            ideal_wait_days: [3.0, 5.0, 7.0],
            timing_penalty_per_day: 0.05,
            staleness: [1.0, 0.95, 0.85, 0.7],
            title_factor: [1.1, 1.0, 0.9, 0.75],
            interview_given_response: [0.35, 0.30, 0.25],
            connection_rate: 0.3,
        }
    }
}

impl ResponsePriors {
    fn timing_fit(&self, company: CompanyType, action: TimingAction) -> f64 {
        let distance = (action.days() as f64 - self.ideal_wait_days[company as usize]).abs();
        (1.0 - self.timing_penalty_per_day * distance).max(0.4)
    }

    fn style_fit(&self, context: StyleContext, arm: StyleArm) -> f64 {
        match (arm, context.culture) {
            (StyleArm::ConnectionFocused, _) if context.has_connection => 1.3,
            (StyleArm::ConnectionFocused, _) => 0.7,
            (StyleArm::Casual, CompanyCulture::Casual) => 1.2,
            (StyleArm::Casual, CompanyCulture::Formal) => 0.75,
            (StyleArm::Casual, CompanyCulture::Mixed) => 1.0,
            (StyleArm::Formal, CompanyCulture::Formal) => 1.2,
            (StyleArm::Formal, CompanyCulture::Casual) => 0.8,
            (StyleArm::Formal, CompanyCulture::Mixed) => 1.05,
        }
    }

    /// Probability that the follow-up gets any response.
    pub fn response_probability(
        &self,
        state: TimingState,
        context: StyleContext,
        action: TimingAction,
        arm: StyleArm,
    ) -> f64 {
        let mut base = self.base_response[state.company as usize];
        if state.has_connection {
            base += self.connection_boost;
        }
        let staleness = self.staleness[state.days as usize];
        let title = self.title_factor[context.contact_title as usize];
        (base
            * self.timing_fit(state.company, action)
            * self.style_fit(context, arm)
            * staleness
            * title)
            .clamp(0.02, 0.95)
    }

    pub fn interview_probability(&self, company: CompanyType) -> f64 {
        self.interview_given_response[company as usize]
    }

    /// Culture distribution conditioned on company type: startups skew casual,
    /// enterprises skew formal. Returns cumulative thresholds for casual, formal.
    pub fn culture_thresholds(&self, company: CompanyType) -> (f64, f64) {
        match company {
            CompanyType::Startup => (0.6, 0.75),
            CompanyType::Midsize => (0.3, 0.6),
            CompanyType::Enterprise => (0.1, 0.7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::ContactTitle;

    fn ctx(culture: CompanyCulture, has_connection: bool) -> StyleContext {
        StyleContext {
            contact_title: ContactTitle::Manager,
            culture,
            has_connection,
        }
    }

    #[test]
    fn test_startups_respond_more_than_enterprises() {
        let priors = ResponsePriors::default();
        let c = ctx(CompanyCulture::Mixed, false);
        let startup = priors.response_probability(
            TimingState::new(1, CompanyType::Startup, false),
            c,
            TimingAction::Wait3,
            StyleArm::Formal,
        );
        let enterprise = priors.response_probability(
            TimingState::new(1, CompanyType::Enterprise, false),
            c,
            TimingAction::Wait3,
            StyleArm::Formal,
        );
        assert!(startup > enterprise);
    }

    #[test]
    fn test_connection_boosts_response() {
        let priors = ResponsePriors::default();
        let cold = priors.response_probability(
            TimingState::new(1, CompanyType::Midsize, false),
            ctx(CompanyCulture::Mixed, false),
            TimingAction::Wait5,
            StyleArm::Formal,
        );
        let warm = priors.response_probability(
            TimingState::new(1, CompanyType::Midsize, true),
            ctx(CompanyCulture::Mixed, true),
            TimingAction::Wait5,
            StyleArm::Formal,
        );
        assert!(warm > cold);
    }

    #[test]
    fn test_ideal_wait_grows_with_company_size() {
        let priors = ResponsePriors::default();
        let c = ctx(CompanyCulture::Formal, false);
        let best_wait = |company: CompanyType| {
            TimingAction::ALL
                .into_iter()
                .max_by(|a, b| {
                    let pa = priors.response_probability(TimingState::new(0, company, false), c, *a, StyleArm::Formal);
                    let pb = priors.response_probability(TimingState::new(0, company, false), c, *b, StyleArm::Formal);
                    pa.total_cmp(&pb)
                })
                .map(|a| a.days())
                .unwrap_or_default()
        };
        assert!(best_wait(CompanyType::Startup) < best_wait(CompanyType::Enterprise));
    }

    #[test]
    fn test_probabilities_are_clamped() {
        let priors = ResponsePriors::default();
        for s in TimingState::all() {
            for c in StyleContext::all() {
                for a in TimingAction::ALL {
                    for arm in StyleArm::ALL {
                        let p = priors.response_probability(s, c, a, arm);
                        assert!((0.02..=0.95).contains(&p));
                    }
                }
            }
        }
    }
}
