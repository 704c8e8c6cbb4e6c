//! Two-proportion Z-test for comparing response rates between a baseline
//! and a treatment group.
//!
//! Pure arithmetic on the counts: the same inputs give the same bits.

use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationError;

const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionSample {
    pub successes: u64,
    pub trials: u64,
}

impl ProportionSample {
    pub fn new(successes: u64, trials: u64) -> Self {
        Self { successes, trials }
    }

    pub fn rate(&self) -> f64 {
        self.successes as f64 / self.trials as f64
    }

    fn check(&self, label: &str) -> Result<(), EvaluationError> {
        if self.trials == 0 {
            return Err(EvaluationError::InvalidSample(format!("{label} has no trials")));
        }
        if self.successes > self.trials {
            return Err(EvaluationError::InvalidSample(format!(
                "{label} has {} successes out of {} trials",
                self.successes, self.trials
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignificanceResult {
    pub baseline_rate: f64,
    pub treatment_rate: f64,
    /// Treatment minus baseline, in rate points.
    pub lift: f64,
    /// Lift relative to the baseline rate; 0 when the baseline is 0.
    pub relative_lift: f64,
    pub pooled_rate: f64,
    pub standard_error: f64,
    pub z: f64,
    /// Two-sided.
    pub p_value: f64,
    pub significant: bool,
}

/// Pooled two-proportion Z-test. A positive `z` means the treatment rate is higher.
pub fn two_proportion_z_test(
    baseline: ProportionSample,
    treatment: ProportionSample,
) -> Result<SignificanceResult, EvaluationError> {
    baseline.check("baseline")?;
    treatment.check("treatment")?;

    let (p1, p2) = (baseline.rate(), treatment.rate());
    let (n1, n2) = (baseline.trials as f64, treatment.trials as f64);
    let pooled = (baseline.successes + treatment.successes) as f64 / (n1 + n2);
    let standard_error = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();

    // All successes or all failures in both groups: nothing to distinguish.
    let (z, p_value) = if standard_error > 0.0 {
        let z = (p2 - p1) / standard_error;
        (z, two_sided_p(z))
    } else {
        (0.0, 1.0)
    };

    Ok(SignificanceResult {
        baseline_rate: p1,
        treatment_rate: p2,
        lift: p2 - p1,
        relative_lift: if p1 > 0.0 { (p2 - p1) / p1 } else { 0.0 },
        pooled_rate: pooled,
        standard_error,
        z,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
    })
}

fn two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2).clamp(0.0, 1.0)
}

/// Complementary error function, Chebyshev fit with fractional error below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}
