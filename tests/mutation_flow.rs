//! Mosquito-side mutation and recombination feed the genotype database.

mod common;

use common::{run_days, SimulationBuilder};

#[test]
fn test_certain_single_locus_mutation_reaches_a_host() {
    // Only locus 0 may mutate, and it always does.
    let mut sim = SimulationBuilder::new()
        .with_seed(31)
        .with_population(300)
        .with_beta(1.0)
        .with_treatment_probability(0.0)
        .with_mutation_mask("10")
        .with_mutation_probability(1.0)
        .with_initial_prevalence("KN", 0.3)
        .build();

    assert_eq!(sim.genotype_db.len(), 1);

    // One mosquito cycle: bite, mutate in the mosquito, infect, liver stage,
    // blood stage.
    run_days(&mut sim, 30);

    let sequences: Vec<String> = sim
        .genotype_db
        .iter()
        .map(|g| g.aa_sequence.clone())
        .collect();
    assert!(
        sequences.iter().any(|s| s == "TN"),
        "mutant TN not interned: {sequences:?}"
    );
    assert!(sim.mdc.cumulative_mutation_events > 0);

    let mutant_id = sim
        .genotype_db
        .iter()
        .find(|g| g.aa_sequence == "TN")
        .map(|g| g.id)
        .unwrap();
    let carriers = sim
        .population
        .persons
        .iter()
        .filter(|p| p.parasites.iter().any(|c| c.genotype_id == mutant_id))
        .count();
    assert!(carriers >= 1, "no host carries the mutant genotype");

    // The masked locus never mutated.
    assert!(sequences.iter().all(|s| !s.ends_with('Y')));
}

#[test]
fn test_mutation_disabled_keeps_database_fixed() {
    let mut sim = SimulationBuilder::new()
        .with_seed(32)
        .with_population(200)
        .with_beta(1.0)
        .with_treatment_probability(0.0)
        .with_mutation_probability(1.0)
        .with_config(|config| {
            config.genotype_parameters.mutation_enabled = false;
        })
        .with_initial_prevalence("KN", 0.3)
        .build();

    run_days(&mut sim, 30);
    assert_eq!(sim.genotype_db.len(), 1);
    assert_eq!(sim.mdc.cumulative_mutation_events, 0);
}
