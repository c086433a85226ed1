mod common;

use common::{run_days, SimulationBuilder};

fn build(seed: u64) -> malsim_lib::Simulation {
    SimulationBuilder::new()
        .with_seed(seed)
        .with_population(300)
        .with_beta(0.3)
        .with_initial_prevalence("KN", 0.1)
        .build()
}

#[test]
fn test_same_seed_reproduces_run() {
    let mut sim1 = build(12345);
    let mut sim2 = build(12345);

    run_days(&mut sim1, 90);
    run_days(&mut sim2, 90);

    assert_eq!(sim1.population.len(), sim2.population.len());
    for (a, b) in sim1
        .population
        .persons
        .iter()
        .zip(sim2.population.persons.iter())
    {
        assert_eq!(a.id, b.id);
        assert_eq!(a.age, b.age);
        assert_eq!(a.host_state, b.host_state);
        assert_eq!(a.location, b.location);
        assert_eq!(a.parasites.len(), b.parasites.len());
    }
    assert_eq!(sim1.genotype_db.len(), sim2.genotype_db.len());
    assert_eq!(
        sim1.mdc.cumulative_treatments_by_location,
        sim2.mdc.cumulative_treatments_by_location
    );
    assert_eq!(
        sim1.mdc.cumulative_clinical_episodes_by_location,
        sim2.mdc.cumulative_clinical_episodes_by_location
    );
}

#[test]
fn test_different_seeds_diverge() {
    let mut sim1 = build(1);
    let mut sim2 = build(2);

    run_days(&mut sim1, 30);
    run_days(&mut sim2, 30);

    let ids_differ = sim1
        .population
        .persons
        .iter()
        .zip(sim2.population.persons.iter())
        .any(|(a, b)| a.id != b.id);
    assert!(ids_differ);
}
