//! With no transmission and no importation an epidemic can only fade out.

mod common;

use common::{prevalence, run_days, SimulationBuilder};

#[test]
fn test_zero_beta_prevalence_declines_to_zero() {
    let mut sim = SimulationBuilder::new()
        .with_seed(42)
        .with_population(400)
        .with_beta(0.0)
        .with_initial_prevalence("KN", 0.1)
        .build();

    let mut last = prevalence(&mut sim);
    assert!(last > 0.05, "initial prevalence was {last}");

    // Five years, checked monthly: never increasing.
    for _ in 0..60 {
        run_days(&mut sim, 30);
        let current = prevalence(&mut sim);
        assert!(
            current <= last + 1e-9,
            "prevalence rose from {last} to {current} with zero beta"
        );
        last = current;
    }
    assert_eq!(last, 0.0, "prevalence not eliminated after five years");
}

#[test]
fn test_host_state_invariants_hold_after_run() {
    let mut sim = SimulationBuilder::new()
        .with_seed(7)
        .with_population(300)
        .with_beta(0.2)
        .with_initial_prevalence("KN", 0.2)
        .build();
    run_days(&mut sim, 180);

    let current_time = sim.scheduler.current_time();
    let config = &sim.config;
    let genotype_db = &sim.genotype_db;
    for person in &mut sim.population.persons {
        // The end-of-day sweep replaces the dead with newborns.
        assert!(person.is_alive());
        person.update(current_time, config, genotype_db);
        let immune = person.immune_system.latest_value();
        assert!((0.0..=1.0).contains(&immune));
        if person.parasites.is_empty() {
            let expected = if person.liver_parasite_genotype.is_none() {
                malsim_lib::model::person::HostState::Susceptible
            } else {
                malsim_lib::model::person::HostState::Exposed
            };
            assert_eq!(person.host_state, expected);
        }
    }
}
