//! Per-host immune state.
//!
//! Immunity is a level in [0, 1] that acquires while parasites are present
//! and decays otherwise. Infants carry maternal immunity with a stronger
//! decay and no acquisition; the component switches to the non-infant variant
//! at the first birthday.

use serde::{Deserialize, Serialize};

use crate::model::random::Random;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmuneSystemParameters {
    /// Parasite multiplication term for a naive host (per day, as a factor).
    pub c_max: f64,
    /// Parasite multiplication term for a fully immune host.
    pub c_min: f64,
    /// Acquisition rate by integer age, capped at 80.
    pub acquire_rate_by_age: Vec<f64>,
    /// Constant decay rate for non-infants.
    pub decay_rate: f64,
    /// Maternal immunity decay rate (age < 1 year).
    pub infant_decay_rate: f64,
    pub max_clinical_probability: f64,
    /// Exponent shaping how immunity suppresses clinical progression.
    pub immune_effect_on_progression_to_clinical: f64,
}

impl Default for ImmuneSystemParameters {
    fn default() -> Self {
        Self {
            c_max: 2.5119,
            c_min: 0.0316,
            acquire_rate_by_age: vec![0.00125; 81],
            decay_rate: 0.0025,
            infant_decay_rate: 0.0315,
            max_clinical_probability: 0.99,
            immune_effect_on_progression_to_clinical: 4.0,
        }
    }
}

const CLINICAL_MIDPOINT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmuneComponent {
    Infant,
    NonInfant,
}

impl ImmuneComponent {
    #[must_use]
    pub fn acquire_rate(&self, params: &ImmuneSystemParameters, age: i32) -> f64 {
        match self {
            // Maternal immunity only decays.
            ImmuneComponent::Infant => 0.0,
            ImmuneComponent::NonInfant => {
                let idx = (age.max(0) as usize).min(80);
                let table = &params.acquire_rate_by_age;
                table[idx.min(table.len().saturating_sub(1))]
            }
        }
    }

    #[must_use]
    pub fn decay_rate(&self, params: &ImmuneSystemParameters, _age: i32) -> f64 {
        match self {
            ImmuneComponent::Infant => params.infant_decay_rate,
            ImmuneComponent::NonInfant => params.decay_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmuneSystem {
    latest_value: f64,
    pub increase: bool,
    pub component: ImmuneComponent,
}

impl ImmuneSystem {
    #[must_use]
    pub fn new(component: ImmuneComponent) -> Self {
        Self {
            latest_value: 0.0,
            increase: false,
            component,
        }
    }

    #[must_use]
    pub fn latest_value(&self) -> f64 {
        self.latest_value
    }

    pub fn set_latest_value(&mut self, value: f64) {
        self.latest_value = value.clamp(0.0, 1.0);
    }

    pub fn draw_random_immune(&mut self, random: &mut Random) {
        self.latest_value = random.random_flat(0.0, 0.1);
    }

    pub fn switch_to_non_infant(&mut self) {
        self.component = ImmuneComponent::NonInfant;
    }

    /// Advance the immune level by `days` daily updates.
    pub fn update(&mut self, days: i32, age: i32, params: &ImmuneSystemParameters) {
        if days <= 0 {
            return;
        }
        let mut value = self.latest_value;
        if self.increase {
            let acquire = self.component.acquire_rate(params, age);
            for _ in 0..days {
                value += acquire * (1.0 - value);
            }
        } else {
            let decay = self.component.decay_rate(params, age);
            value *= (1.0 - decay).powi(days);
        }
        self.latest_value = value.clamp(0.0, 1.0);
    }

    /// Probability that a new blood-stage infection progresses to clinical
    /// disease: p_max / (1 + (v / 0.25)^k).
    #[must_use]
    pub fn clinical_progression_probability(&self, params: &ImmuneSystemParameters) -> f64 {
        params.max_clinical_probability
            / (1.0
                + (self.latest_value / CLINICAL_MIDPOINT)
                    .powf(params.immune_effect_on_progression_to_clinical))
    }

    /// Log10 parasite density after `duration` days under the current immune
    /// level and the genotype's daily fitness.
    #[must_use]
    pub fn parasite_size_after_days(
        &self,
        duration: i32,
        original_log10_density: f64,
        daily_fitness: f64,
        params: &ImmuneSystemParameters,
    ) -> f64 {
        let v = self.latest_value;
        let temp = params.c_max * (1.0 - v) + params.c_min * v;
        original_log10_density + f64::from(duration) * (temp.log10() + daily_fitness.log10())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_stays_in_unit_interval() {
        let params = ImmuneSystemParameters::default();
        let mut immune = ImmuneSystem::new(ImmuneComponent::NonInfant);
        immune.set_latest_value(0.99);
        immune.increase = true;
        immune.update(10_000, 30, &params);
        assert!(immune.latest_value() <= 1.0);

        immune.increase = false;
        immune.update(10_000, 30, &params);
        assert!(immune.latest_value() >= 0.0);
    }

    #[test]
    fn test_acquisition_monotone() {
        let params = ImmuneSystemParameters::default();
        let mut immune = ImmuneSystem::new(ImmuneComponent::NonInfant);
        immune.increase = true;
        let before = immune.latest_value();
        immune.update(30, 20, &params);
        assert!(immune.latest_value() > before);
    }

    #[test]
    fn test_infant_decays_faster() {
        let params = ImmuneSystemParameters::default();
        let mut infant = ImmuneSystem::new(ImmuneComponent::Infant);
        let mut adult = ImmuneSystem::new(ImmuneComponent::NonInfant);
        infant.set_latest_value(0.8);
        adult.set_latest_value(0.8);
        infant.update(30, 0, &params);
        adult.update(30, 30, &params);
        assert!(infant.latest_value() < adult.latest_value());
    }

    #[test]
    fn test_clinical_probability_decreases_with_immunity() {
        let params = ImmuneSystemParameters::default();
        let mut naive = ImmuneSystem::new(ImmuneComponent::NonInfant);
        naive.set_latest_value(0.0);
        let mut immune = ImmuneSystem::new(ImmuneComponent::NonInfant);
        immune.set_latest_value(0.9);
        assert_relative_eq!(
            naive.clinical_progression_probability(&params),
            params.max_clinical_probability
        );
        assert!(
            immune.clinical_progression_probability(&params)
                < naive.clinical_progression_probability(&params) / 10.0
        );
    }

    #[test]
    fn test_parasite_growth_direction_depends_on_immunity() {
        let params = ImmuneSystemParameters::default();
        let mut naive = ImmuneSystem::new(ImmuneComponent::NonInfant);
        naive.set_latest_value(0.0);
        // Naive host: density grows.
        assert!(naive.parasite_size_after_days(5, 0.0, 1.0, &params) > 0.0);

        let mut immune = ImmuneSystem::new(ImmuneComponent::NonInfant);
        immune.set_latest_value(1.0);
        // Fully immune host: density falls.
        assert!(immune.parasite_size_after_days(5, 0.0, 1.0, &params) < 0.0);
    }
}
