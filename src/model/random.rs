//! Seeded random service.
//!
//! Every stochastic choice in the simulation flows through one `Random`
//! instance so a fixed seed reproduces a run exactly. Sub-systems must not
//! seed their own generators.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, Gamma, Normal, Poisson};
use statrs::distribution::ContinuousCDF;
use uuid::Uuid;

pub struct Random {
    seed: u64,
    rng: ChaCha8Rng,
    standard_normal: statrs::distribution::Normal,
}

impl Random {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            standard_normal: statrs::distribution::Normal::new(0.0, 1.0)
                .expect("unit normal is always valid"),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw in [from, to).
    pub fn random_flat(&mut self, from: f64, to: f64) -> f64 {
        if from == to {
            return from;
        }
        self.rng.gen_range(from..to)
    }

    /// Uniform index in [0, n).
    pub fn random_uniform(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    pub fn random_bool(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.rng.gen_bool(p)
    }

    pub fn random_normal(&mut self, mean: f64, sd: f64) -> f64 {
        if sd <= 0.0 {
            return mean;
        }
        let dist = Normal::new(mean, sd).expect("sd checked positive");
        dist.sample(&mut self.rng)
    }

    /// Normal draw resampled until it falls within three standard deviations.
    pub fn random_normal_truncated(&mut self, mean: f64, sd: f64) -> f64 {
        if sd <= 0.0 {
            return mean;
        }
        let dist = Normal::new(mean, sd).expect("sd checked positive");
        loop {
            let value = dist.sample(&mut self.rng);
            if (value - mean).abs() <= 3.0 * sd {
                return value;
            }
        }
    }

    pub fn random_gamma(&mut self, shape: f64, scale: f64) -> f64 {
        let dist = Gamma::new(shape, scale).expect("gamma parameters must be positive");
        dist.sample(&mut self.rng)
    }

    pub fn random_beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let dist = Beta::new(alpha, beta).expect("beta parameters must be positive");
        dist.sample(&mut self.rng)
    }

    pub fn random_poisson(&mut self, lambda: f64) -> u64 {
        if lambda <= 0.0 {
            return 0;
        }
        let dist = Poisson::new(lambda).expect("lambda checked positive");
        dist.sample(&mut self.rng) as u64
    }

    /// Multinomial draw: distributes `trials` over `weights.len()` bins via
    /// sequential conditional binomials.
    pub fn random_multinomial(&mut self, trials: u64, weights: &[f64]) -> Vec<u64> {
        let mut counts = vec![0u64; weights.len()];
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || weights.is_empty() {
            return counts;
        }
        let mut remaining_trials = trials;
        let mut remaining_weight = total;
        for (i, &w) in weights.iter().enumerate() {
            if remaining_trials == 0 {
                break;
            }
            if i == weights.len() - 1 {
                counts[i] = remaining_trials;
                break;
            }
            let p = (w / remaining_weight).clamp(0.0, 1.0);
            let dist = rand_distr::Binomial::new(remaining_trials, p)
                .expect("probability clamped to [0, 1]");
            let n = dist.sample(&mut self.rng);
            counts[i] = n;
            remaining_trials -= n;
            remaining_weight -= w;
        }
        counts
    }

    pub fn shuffle<T>(&mut self, values: &mut [T]) {
        values.shuffle(&mut self.rng);
    }

    /// Categorical draw proportional to `weights`. Returns `None` when all
    /// weights are zero or the slice is empty.
    pub fn sample_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut target = self.random_flat(0.0, total);
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            if target < w {
                return Some(i);
            }
            target -= w;
        }
        // Floating point slack lands on the last positive weight.
        weights.iter().rposition(|w| *w > 0.0)
    }

    #[must_use]
    pub fn cdf_standard_normal(&self, x: f64) -> f64 {
        self.standard_normal.cdf(x)
    }

    pub fn uuid(&mut self) -> Uuid {
        let bytes: [u8; 16] = self.rng.gen();
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Random::new(42);
        let mut b = Random::new(42);
        for _ in 0..100 {
            assert_eq!(a.random_flat(0.0, 1.0), b.random_flat(0.0, 1.0));
        }
        assert_eq!(a.uuid(), b.uuid());
    }

    #[test]
    fn test_multinomial_conserves_trials() {
        let mut random = Random::new(7);
        let counts = random.random_multinomial(1000, &[0.2, 0.3, 0.5]);
        assert_eq!(counts.iter().sum::<u64>(), 1000);
    }

    #[test]
    fn test_sample_weighted_skips_zero_weights() {
        let mut random = Random::new(11);
        for _ in 0..200 {
            let picked = random.sample_weighted(&[0.0, 1.0, 0.0]).unwrap();
            assert_eq!(picked, 1);
        }
        assert!(random.sample_weighted(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_truncated_normal_within_three_sd() {
        let mut random = Random::new(3);
        for _ in 0..500 {
            let v = random.random_normal_truncated(10.0, 2.0);
            assert!((v - 10.0).abs() <= 6.0);
        }
    }

    #[test]
    fn test_cdf_standard_normal_midpoint() {
        let random = Random::new(0);
        assert!((random.cdf_standard_normal(0.0) - 0.5).abs() < 1e-9);
    }
}
