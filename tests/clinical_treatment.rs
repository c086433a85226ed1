//! Clinical progression, treatment outcomes and resistance-driven failure.

mod common;

use common::{prevalence, run_days, SimulationBuilder};

#[test]
fn test_sensitive_infections_are_cured_by_treatment() {
    let mut sim = SimulationBuilder::new()
        .with_seed(51)
        .with_population(300)
        .with_beta(0.0)
        .with_treatment_probability(1.0)
        .with_initial_prevalence("KN", 0.3)
        .build();

    let initial = prevalence(&mut sim);
    run_days(&mut sim, 90);
    let after = prevalence(&mut sim);

    assert!(after < initial / 2.0, "prevalence {initial} -> {after}");
    let clinical: u64 = sim
        .mdc
        .cumulative_clinical_episodes_by_location
        .iter()
        .sum();
    let treatments: u64 = sim.mdc.cumulative_treatments_by_location.iter().sum();
    assert!(clinical > 0);
    assert!(treatments > 0);
    // Fully sensitive parasites under an efficacious drug: failures are the
    // rare deaths-despite-treatment, not parasitological failures.
    let failures: u64 = sim
        .mdc
        .cumulative_treatment_failures_by_location
        .iter()
        .sum();
    assert!(
        failures * 10 <= treatments,
        "{failures} failures out of {treatments} treatments for a sensitive genotype"
    );
}

#[test]
fn test_resistant_infections_fail_treatment() {
    // 'T' at locus 0 multiplies the EC50 eightfold; the drug cannot clear it.
    let mut sim = SimulationBuilder::new()
        .with_seed(52)
        .with_population(300)
        .with_beta(0.0)
        .with_treatment_probability(1.0)
        .with_initial_prevalence("TN", 0.3)
        .build();

    run_days(&mut sim, 90);

    let treatments: u64 = sim.mdc.cumulative_treatments_by_location.iter().sum();
    let failures: u64 = sim
        .mdc
        .cumulative_treatment_failures_by_location
        .iter()
        .sum();
    assert!(treatments > 0);
    assert!(
        failures * 2 >= treatments,
        "only {failures} failures out of {treatments} treatments for a resistant genotype"
    );
    // The 60-day window ratio reflects the failures as well.
    assert!(sim.mdc.current_tf_by_therapy(0) > 0.4);
}

#[test]
fn test_clinical_episodes_raise_immunity() {
    let mut sim = SimulationBuilder::new()
        .with_seed(53)
        .with_population(200)
        .with_beta(0.0)
        .with_treatment_probability(0.0)
        .with_initial_prevalence("KN", 0.5)
        .build();

    run_days(&mut sim, 365);

    let infected_immunity: Vec<f64> = sim
        .population
        .persons
        .iter()
        .filter(|p| !p.parasites.is_empty())
        .map(|p| p.immune_system.latest_value())
        .collect();
    // A year of carrying parasites acquires immunity.
    assert!(!infected_immunity.is_empty());
    let mean: f64 = infected_immunity.iter().sum::<f64>() / infected_immunity.len() as f64;
    assert!(mean > 0.1, "mean immunity of carriers was {mean}");
}
