//! Posterior draws on top of an injected `Rng`.
//!
//! Beta(α, β) is sampled as X / (X + Y) with X ~ Gamma(α, 1), Y ~ Gamma(β, 1).
//! Gamma uses Marsaglia–Tsang; the normal deviate comes from Box–Muller so the
//! whole chain is reproducible from the caller's seed.

use rand::Rng;

/// Standard normal deviate (Box–Muller, one branch).
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); shift away from zero for the log.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Gamma(shape, 1) deviate.
pub fn gamma<R: Rng + ?Sized>(shape: f64, rng: &mut R) -> f64 {
    debug_assert!(shape > 0.0, "gamma shape must be positive");

    if shape < 1.0 {
        // Boost: Gamma(a) = Gamma(a + 1) · U^(1/a)
        let u: f64 = 1.0 - rng.gen::<f64>();
        return gamma(shape + 1.0, rng) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u: f64 = 1.0 - rng.gen::<f64>();
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Beta(alpha, beta) deviate in (0, 1).
pub fn beta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    let x = gamma(alpha, rng);
    let y = gamma(beta, rng);
    x / (x + y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_beta_draws_stay_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..2_000 {
            let x = beta(1.0, 1.0, &mut rng);
            assert!(x > 0.0 && x < 1.0);
        }
    }

    #[test]
    fn test_beta_sample_mean_matches_posterior_mean() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| beta(9.0, 3.0, &mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 0.75).abs() < 0.01, "mean was {mean}");
    }

    #[test]
    fn test_gamma_sample_mean_matches_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| gamma(4.0, &mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 4.0).abs() < 0.1, "mean was {mean}");
    }

    #[test]
    fn test_same_seed_gives_same_draws() {
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..50 {
            assert_eq!(beta(2.0, 5.0, &mut a).to_bits(), beta(2.0, 5.0, &mut b).to_bits());
        }
    }
}
