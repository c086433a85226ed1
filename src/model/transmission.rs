//! The daily between-host transmission driver.
//!
//! Movement runs first, then the biting pass couples hosts and mosquitoes:
//! gametocytaemic hosts infect feeding mosquitoes, mosquito-side genotypes
//! recombine and mutate, and infectious genotypes challenge weighted-drawn
//! hosts whose pending infections resolve at the end of the day.

use chrono::NaiveDate;

use crate::model::collector::ModelDataCollector;
use crate::model::config::Config;
use crate::model::genotype::GenotypeDb;
use crate::model::population::Population;
use crate::model::random::Random;
use crate::model::seasonality::Seasonality;
use crate::model::spatial::{Location, MovementModel};
use crate::model::events::PersonEventKind;

/// Mosquito-side state: the mutation and recombination knobs that population
/// events toggle at runtime.
#[derive(Debug, Clone)]
pub struct Mosquito {
    pub mutation_enabled: bool,
    pub mutation_probability_per_locus: f64,
    pub mutation_mask: String,
    pub within_host_induced_free_recombination: bool,
}

impl Mosquito {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let genotype = &config.genotype_parameters;
        Self {
            mutation_enabled: genotype.mutation_enabled,
            mutation_probability_per_locus: genotype.mutation_probability_per_locus,
            mutation_mask: genotype.mutation_mask.clone(),
            within_host_induced_free_recombination: genotype.within_host_induced_free_recombination,
        }
    }
}

/// Daily circulation: each living person may start a trip; the destination is
/// a categorical draw over the movement kernel row and departure happens on
/// the next day.
pub fn perform_circulation(
    population: &mut Population,
    movement_model: &MovementModel,
    config: &Config,
    random: &mut Random,
    current_time: i32,
    end_time: i32,
) {
    let settings = &config.movement_settings;
    if settings.circulation_percent <= 0.0 {
        return;
    }
    let residents = population.residents_by_location();
    let level_weights = &settings.moving_level_distribution;
    let mean_weight: f64 =
        level_weights.iter().sum::<f64>() / level_weights.len().max(1) as f64;

    for person in &mut population.persons {
        if !person.is_alive() {
            continue;
        }
        let level_factor = if mean_weight > 0.0 {
            level_weights.get(person.moving_level).copied().unwrap_or(1.0) / mean_weight
        } else {
            1.0
        };
        let p_move = (settings.circulation_percent * level_factor).clamp(0.0, 1.0);
        if !random.random_bool(p_move) {
            continue;
        }
        let attraction = movement_model.relative_out_movement(person.location, &residents);
        if let Some(destination) = random.sample_weighted(&attraction) {
            person.today_target_locations.push(destination);
        }
        // Resolve today's candidate destinations into one departure.
        if !person.today_target_locations.is_empty() {
            let pick = if person.today_target_locations.len() == 1 {
                person.today_target_locations[0]
            } else {
                person.today_target_locations
                    [random.random_uniform(person.today_target_locations.len())]
            };
            person.today_target_locations.clear();
            person.number_of_trips_taken += 1;
            person.schedule_event(
                current_time + 1,
                PersonEventKind::CirculateToTargetLocation {
                    target_location: pick,
                },
                current_time,
                end_time,
            );
        }
    }
}

/// One day of biting, infection and mosquito-side genetics for every
/// location.
#[allow(clippy::too_many_arguments)]
pub fn perform_daily_transmission(
    population: &mut Population,
    locations: &[Location],
    seasonality: &Seasonality,
    mosquito: &Mosquito,
    genotype_db: &mut GenotypeDb,
    mdc: &mut ModelDataCollector,
    config: &Config,
    random: &mut Random,
    current_time: i32,
    calendar_date: NaiveDate,
) {
    population.rebuild_presence_index();

    for location in locations {
        let seasonal = seasonality.seasonal_factor(calendar_date, location.id);
        let present: Vec<usize> = population.present_at(location.id).to_vec();
        if present.is_empty() {
            continue;
        }
        let bites = (location.beta * present.len() as f64 * seasonal).round() as usize;
        if bites == 0 {
            continue;
        }

        let weights: Vec<f64> = present
            .iter()
            .map(|&idx| population.persons[idx].current_relative_biting_rate)
            .collect();

        // Host to mosquito: feeding events pick up gametocytes. The local
        // mosquito population bounds how many infectious mosquitoes one day
        // can produce.
        let mut infectious_pool: Vec<usize> = Vec::new();
        for _ in 0..bites {
            if infectious_pool.len() >= location.mosquito_size {
                break;
            }
            let Some(pick) = random.sample_weighted(&weights) else {
                break;
            };
            let host_idx = present[pick];
            {
                let person = &mut population.persons[host_idx];
                person.update(current_time, config, genotype_db);
                if mdc.is_collecting(current_time) {
                    person.number_of_times_bitten += 1;
                }
            }
            let person = &population.persons[host_idx];
            if !person.is_gametocytaemic() {
                continue;
            }
            let infectivity = person.relative_infectivity(config, random).min(1.0);
            if !random.random_bool(infectivity) {
                continue;
            }

            let mut sampled = if mosquito.within_host_induced_free_recombination {
                person.parasites.sample_gametocyte_pair(random)
            } else {
                person
                    .parasites
                    .sample_gametocyte_genotype(random)
                    .map(|g| vec![g])
                    .unwrap_or_default()
            };

            // Interrupted feeding: the mosquito finishes its meal on a second
            // host and may pick up another genotype there.
            if random.random_bool(location.mosquito_interrupted_feeding_rate) {
                if let Some(second_pick) = random.sample_weighted(&weights) {
                    let second_idx = present[second_pick];
                    if second_idx != host_idx {
                        let second = &population.persons[second_idx];
                        if second.is_gametocytaemic() {
                            let p = second.relative_infectivity(config, random).min(1.0);
                            if random.random_bool(p) {
                                if let Some(g) =
                                    second.parasites.sample_gametocyte_genotype(random)
                                {
                                    sampled.push(g);
                                }
                            }
                        }
                    }
                }
            }

            sampled.dedup();
            let offspring = match sampled.len() {
                0 => continue,
                1 => sampled[0],
                _ => match genotype_db.recombine(sampled[0], sampled[1], random) {
                    Ok(child) => child,
                    Err(e) => {
                        tracing::error!(error = %e, "recombination failed, keeping parent");
                        sampled[0]
                    }
                },
            };

            let final_genotype = if mosquito.mutation_enabled {
                match genotype_db.mutate_by_mask(
                    offspring,
                    &mosquito.mutation_mask,
                    mosquito.mutation_probability_per_locus,
                    random,
                ) {
                    Ok((mutant, mutations)) => {
                        mdc.record_mutation_events(current_time, u64::from(mutations));
                        mutant
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "mutation failed, keeping offspring");
                        offspring
                    }
                }
            } else {
                offspring
            };
            infectious_pool.push(final_genotype);
        }

        // Mosquito to host: each infectious genotype challenges one host.
        for genotype_id in infectious_pool {
            let Some(pick) = random.sample_weighted(&weights) else {
                break;
            };
            let host_idx = present[pick];
            let person = &mut population.persons[host_idx];
            let p = person.p_infection_from_an_infectious_bite().clamp(0.0, 1.0);
            if random.random_bool(p) {
                mdc.record_1_infectious_bite(current_time, location.id);
                person.push_today_infection(genotype_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::SpatialSettings;
    use crate::model::population::{create_person, infect_with_genotype};
    use crate::model::spatial::{DistanceMatrix, MovementKernel};

    fn setup(beta: f64) -> (Config, Vec<Location>, GenotypeDb, Mosquito) {
        let mut config = Config::default();
        if let SpatialSettings::LocationBased(s) = &mut config.spatial_settings {
            s.beta_by_location = vec![beta];
        }
        config.genotype_parameters.pf_genotype_info =
            crate::model::genotype::PfGenotypeInfo {
                loci: vec![crate::model::genotype::LocusInfo {
                    alleles: vec![
                        crate::model::genotype::AlleleInfo {
                            value: 'K',
                            daily_fitness_multiplier: 1.0,
                            ec50_multipliers: Default::default(),
                        },
                        crate::model::genotype::AlleleInfo {
                            value: 'T',
                            daily_fitness_multiplier: 0.9,
                            ec50_multipliers: Default::default(),
                        },
                    ],
                }],
            };
        config.genotype_parameters.mutation_mask = "1".to_string();
        let genotype_db = GenotypeDb::new(
            config.genotype_parameters.pf_genotype_info.clone(),
            Vec::new(),
            Vec::new(),
        );
        let mut location = Location::new(0, 10.0, 105.0, 50);
        location.beta = beta;
        let mosquito = Mosquito::from_config(&config);
        (config, vec![location], genotype_db, mosquito)
    }

    #[test]
    fn test_zero_beta_produces_no_bites() {
        let (config, locations, mut genotype_db, mosquito) = setup(0.0);
        let mut random = Random::new(5);
        let calendar = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut persons = Vec::new();
        for _ in 0..20 {
            persons.push(create_person(0, 25, 0, calendar, 1000, &config, &mut random));
        }
        let mut population = Population::new(persons, 1);
        let mut mdc = ModelDataCollector::new(1, 8, 1, 0);
        mdc.begin_time_step();
        perform_daily_transmission(
            &mut population,
            &locations,
            &Seasonality::Disabled,
            &mosquito,
            &mut genotype_db,
            &mut mdc,
            &config,
            &mut random,
            0,
            calendar,
        );
        assert_eq!(mdc.today_infectious_bites_by_location[0], 0);
        assert!(population.persons.iter().all(|p| p.today_infections.is_empty()));
    }

    #[test]
    fn test_transmission_reaches_susceptible_hosts() {
        let (config, mut locations, mut genotype_db, mosquito) = setup(1.0);
        locations[0].beta = 1.0;
        let sensitive = genotype_db.get("K").unwrap();
        let mut random = Random::new(11);
        let calendar = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut persons = Vec::new();
        for _ in 0..50 {
            persons.push(create_person(0, 25, 0, calendar, 1000, &config, &mut random));
        }
        // Half the hosts carry mature gametocytes at high density.
        for person in persons.iter_mut().take(25) {
            infect_with_genotype(person, sensitive, 4.0, 0, 1000, &config, &mut random);
            for parasite in person.parasites.iter_mut() {
                parasite.gametocyte_level = 1.0;
            }
        }
        let mut population = Population::new(persons, 1);
        let mut mdc = ModelDataCollector::new(1, 8, 1, 0);
        let mut any_pending = false;
        for day in 0..30 {
            mdc.begin_time_step();
            perform_daily_transmission(
                &mut population,
                &locations,
                &Seasonality::Disabled,
                &mosquito,
                &mut genotype_db,
                &mut mdc,
                &config,
                &mut random,
                day,
                calendar,
            );
            any_pending |= population
                .persons
                .iter()
                .any(|p| !p.today_infections.is_empty());
            population.resolve_today_infections(day, 1000, &mut random);
        }
        assert!(any_pending, "no infectious bites landed in 30 days");
    }

    #[test]
    fn test_certain_mutation_creates_mutant_genotype() {
        let (mut config, mut locations, mut genotype_db, mut mosquito) = setup(1.0);
        config.genotype_parameters.mutation_probability_per_locus = 1.0;
        mosquito.mutation_probability_per_locus = 1.0;
        locations[0].mosquito_interrupted_feeding_rate = 0.0;
        let sensitive = genotype_db.get("K").unwrap();
        let mut random = Random::new(13);
        let calendar = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut persons = Vec::new();
        for _ in 0..40 {
            persons.push(create_person(0, 25, 0, calendar, 1000, &config, &mut random));
        }
        for person in persons.iter_mut() {
            infect_with_genotype(person, sensitive, 4.5, 0, 1000, &config, &mut random);
            for parasite in person.parasites.iter_mut() {
                parasite.gametocyte_level = 1.0;
            }
        }
        let mut population = Population::new(persons, 1);
        let mut mdc = ModelDataCollector::new(1, 8, 1, 0);
        for day in 0..10 {
            mdc.begin_time_step();
            perform_daily_transmission(
                &mut population,
                &locations,
                &Seasonality::Disabled,
                &mosquito,
                &mut genotype_db,
                &mut mdc,
                &config,
                &mut random,
                day,
                calendar,
            );
        }
        // The mutant allele 'T' is now interned and mutation events counted.
        assert_eq!(genotype_db.len(), 2);
        assert!(mdc.cumulative_mutation_events > 0);
    }

    #[test]
    fn test_circulation_schedules_departures() {
        let mut config = Config::default();
        config.movement_settings.circulation_percent = 1.0;
        let mut random = Random::new(7);
        let calendar = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut persons = Vec::new();
        for location in 0..2 {
            for _ in 0..10 {
                persons.push(create_person(location, 25, 0, calendar, 1000, &config, &mut random));
            }
        }
        let mut population = Population::new(persons, 2);
        let locations = vec![Location::new(0, 10.0, 105.0, 10), {
            let mut l = Location::new(1, 10.0, 106.0, 10);
            l.row = 0;
            l.col = 10;
            l
        }];
        let model = MovementModel::new(
            MovementKernel::Marshall {
                tau: 1.0,
                alpha: 1.2,
                rho: 10.0,
            },
            DistanceMatrix::from_grid(&locations, 5.0),
        );
        perform_circulation(&mut population, &model, &config, &mut random, 0, 1000);
        let travellers = population
            .persons
            .iter()
            .filter(|p| {
                p.events
                    .has_where(|k| matches!(k, PersonEventKind::CirculateToTargetLocation { .. }))
            })
            .count();
        assert_eq!(travellers, 20);
        assert!(population.persons.iter().all(|p| p.number_of_trips_taken == 1));
    }
}
