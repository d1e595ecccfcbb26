//! Death sampling strategies.
//!
//! Small buckets are sampled exactly, one Bernoulli draw per person; large
//! buckets use a Poisson draw with the same expected value.

use rand::{Rng, RngCore};

/// Population at or above which [`ThresholdSampler`] switches to Poisson.
pub const POISSON_THRESHOLD: u32 = 100;

pub trait DeathSampler: Send + Sync {
    /// Number of deaths among `population` people each dying with
    /// `probability`. Never exceeds `population`.
    fn sample(&self, population: u32, probability: f64, rng: &mut dyn RngCore) -> u32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BernoulliSampler;

impl DeathSampler for BernoulliSampler {
    fn sample(&self, population: u32, probability: f64, rng: &mut dyn RngCore) -> u32 {
        let p = probability.clamp(0.0, 1.0);
        if p == 0.0 {
            return 0;
        }
        (0..population).filter(|_| rng.gen::<f64>() < p).count() as u32
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonSampler;

impl PoissonSampler {
    /// Knuth's multiplication method. Large lambdas are split into chunks so
    /// `e^-lambda` never underflows.
    fn draw(lambda: f64, rng: &mut dyn RngCore) -> u64 {
        const CHUNK: f64 = 500.0;
        let mut remaining = lambda;
        let mut total = 0u64;
        while remaining > 0.0 {
            let step = remaining.min(CHUNK);
            remaining -= step;
            let limit = (-step).exp();
            let mut k = 0u64;
            let mut p = 1.0;
            loop {
                k += 1;
                p *= rng.gen::<f64>();
                if p <= limit {
                    break;
                }
            }
            total += k - 1;
        }
        total
    }
}

impl DeathSampler for PoissonSampler {
    fn sample(&self, population: u32, probability: f64, rng: &mut dyn RngCore) -> u32 {
        let lambda = f64::from(population) * probability.clamp(0.0, 1.0);
        if lambda <= 0.0 {
            return 0;
        }
        Self::draw(lambda, rng).min(u64::from(population)) as u32
    }
}

/// Bernoulli below `threshold`, Poisson at or above it.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSampler {
    pub threshold: u32,
}

impl Default for ThresholdSampler {
    fn default() -> Self {
        Self {
            threshold: POISSON_THRESHOLD,
        }
    }
}

impl DeathSampler for ThresholdSampler {
    fn sample(&self, population: u32, probability: f64, rng: &mut dyn RngCore) -> u32 {
        if population < self.threshold {
            BernoulliSampler.sample(population, probability, rng)
        } else {
            PoissonSampler.sample(population, probability, rng)
        }
    }
}

/// Deterministic sampler: rounds the expected value. Handy for tests and for
/// reproducing a run without stochastic noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedValueSampler;

impl DeathSampler for ExpectedValueSampler {
    fn sample(&self, population: u32, probability: f64, _rng: &mut dyn RngCore) -> u32 {
        let expected = f64::from(population) * probability.clamp(0.0, 1.0);
        (expected.round() as u32).min(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn certain_and_impossible_deaths() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(BernoulliSampler.sample(40, 1.0, &mut rng), 40);
        assert_eq!(BernoulliSampler.sample(40, 0.0, &mut rng), 0);
        assert_eq!(PoissonSampler.sample(1_000, 0.0, &mut rng), 0);
        assert_eq!(PoissonSampler.sample(0, 0.5, &mut rng), 0);
    }

    #[test]
    fn poisson_never_exceeds_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            assert!(PoissonSampler.sample(120, 1.0, &mut rng) <= 120);
        }
    }

    #[test]
    fn poisson_mean_tracks_lambda() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let draws = 2_000;
        let total: u64 = (0..draws)
            .map(|_| u64::from(PoissonSampler.sample(10_000, 0.001, &mut rng)))
            .sum();
        let mean = total as f64 / draws as f64;
        assert!((mean - 10.0).abs() < 0.5, "mean {mean}");
    }

    #[test]
    fn poisson_handles_large_lambda() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let deaths = PoissonSampler.sample(100_000, 0.02, &mut rng);
        assert!((1_700..2_300).contains(&deaths), "deaths {deaths}");
    }

    #[test]
    fn threshold_picks_strategy_by_population() {
        let sampler = ThresholdSampler { threshold: 100 };
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(
            sampler.sample(99, 0.3, &mut a),
            BernoulliSampler.sample(99, 0.3, &mut b)
        );
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(
            sampler.sample(100, 0.3, &mut a),
            PoissonSampler.sample(100, 0.3, &mut b)
        );
    }

    #[test]
    fn expected_value_sampler_rounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(ExpectedValueSampler.sample(10, 0.26, &mut rng), 3);
        assert_eq!(ExpectedValueSampler.sample(10, 2.0, &mut rng), 10);
    }
}
