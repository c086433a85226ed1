//! World events: population-level interventions queued on the scheduler.
//!
//! Each event owns its payload and executes against the whole model; periodic
//! events reschedule themselves.

use crate::model::config::AlleleSwitch;
use crate::model::coverage::TreatmentCoverageModel;
use crate::model::error::{Result, SimError};
use crate::model::events::PersonEventKind;
use crate::model::population::infect_with_genotype;
use crate::model::simulation::Simulation;

#[derive(Debug, Clone)]
pub enum WorldEvent {
    IntroduceParasites {
        location: usize,
        genotype_id: usize,
        number_of_cases: usize,
    },
    IntroduceParasitesPeriodically {
        location: usize,
        genotype_id: usize,
        number_of_cases: usize,
        period_days: i32,
    },
    ChangeTreatmentCoverage {
        coverage: TreatmentCoverageModel,
    },
    ChangeTreatmentStrategy {
        strategy_id: usize,
    },
    SingleRoundMda {
        fraction_population_targeted: Vec<f64>,
        days_to_complete_all_treatments: i32,
    },
    ModifyNestedMft {
        strategy_id: usize,
    },
    IntroduceMutant {
        admin_level: String,
        unit_id: i32,
        fraction: f64,
        alleles: Vec<AlleleSwitch>,
    },
    IntroduceMutantRaster {
        locations: Vec<usize>,
        fraction: f64,
        alleles: Vec<AlleleSwitch>,
    },
    TurnOnMutation,
    TurnOffMutation,
    ChangeMutationProbabilityPerLocus {
        probability: f64,
    },
    ChangeMutationMask {
        mask: String,
    },
    ChangeWithinHostInducedFreeRecombination {
        value: bool,
    },
    ChangeInterruptedFeedingRate {
        location: usize,
        rate: f64,
    },
    AnnualBetaUpdate {
        rate: f64,
    },
    AnnualCoverageUpdate {
        rate: f64,
    },
    ChangeCirculationPercent {
        percent: f64,
    },
    ImportationPeriodicallyRandom {
        genotype_id: usize,
        count: usize,
        log_parasite_density: f64,
    },
    UpdateBetaRaster {
        beta_by_location: Vec<f64>,
    },
    RotateStrategy {
        years: i32,
        new_strategy_id: usize,
        next_strategy_id: usize,
    },
    DistrictImportationDaily {
        district: i32,
        daily_rate: f64,
        genotype_id: usize,
    },
    UpdateEcozone {
        from: usize,
        to: usize,
    },
}

impl WorldEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            WorldEvent::IntroduceParasites { .. } => "introduce_parasites",
            WorldEvent::IntroduceParasitesPeriodically { .. } => "introduce_parasites_periodically",
            WorldEvent::ChangeTreatmentCoverage { .. } => "change_treatment_coverage",
            WorldEvent::ChangeTreatmentStrategy { .. } => "change_treatment_strategy",
            WorldEvent::SingleRoundMda { .. } => "single_round_mda",
            WorldEvent::ModifyNestedMft { .. } => "modify_nested_mft_strategy",
            WorldEvent::IntroduceMutant { .. } => "introduce_mutant_event",
            WorldEvent::IntroduceMutantRaster { .. } => "introduce_mutant_raster_event",
            WorldEvent::TurnOnMutation => "turn_on_mutation",
            WorldEvent::TurnOffMutation => "turn_off_mutation",
            WorldEvent::ChangeMutationProbabilityPerLocus { .. } => {
                "change_mutation_probability_per_locus"
            }
            WorldEvent::ChangeMutationMask { .. } => "change_mutation_mask",
            WorldEvent::ChangeWithinHostInducedFreeRecombination { .. } => {
                "change_within_host_induced_free_recombination"
            }
            WorldEvent::ChangeInterruptedFeedingRate { .. } => "change_interrupted_feeding_rate",
            WorldEvent::AnnualBetaUpdate { .. } => "annual_beta_update_event",
            WorldEvent::AnnualCoverageUpdate { .. } => "annual_coverage_update_event",
            WorldEvent::ChangeCirculationPercent { .. } => "change_circulation_percent_event",
            WorldEvent::ImportationPeriodicallyRandom { .. } => {
                "importation_periodically_random_event"
            }
            WorldEvent::UpdateBetaRaster { .. } => "update_beta_raster_event",
            WorldEvent::RotateStrategy { .. } => "rotate_treatment_strategy_event",
            WorldEvent::DistrictImportationDaily { .. } => "district_importation_daily_event",
            WorldEvent::UpdateEcozone { .. } => "update_ecozone_event",
        }
    }

    pub fn execute(self, sim: &mut Simulation) -> Result<()> {
        let now = sim.scheduler.current_time();
        match self {
            WorldEvent::IntroduceParasites {
                location,
                genotype_id,
                number_of_cases,
            } => introduce_parasites(sim, location, genotype_id, number_of_cases, None),
            WorldEvent::IntroduceParasitesPeriodically {
                location,
                genotype_id,
                number_of_cases,
                period_days,
            } => {
                introduce_parasites(sim, location, genotype_id, number_of_cases, None)?;
                sim.scheduler.schedule_world_event(
                    now + period_days,
                    WorldEvent::IntroduceParasitesPeriodically {
                        location,
                        genotype_id,
                        number_of_cases,
                        period_days,
                    },
                );
                Ok(())
            }
            WorldEvent::ChangeTreatmentCoverage { coverage } => {
                sim.coverage = coverage;
                tracing::info!(day = now, "installed new treatment coverage model");
                Ok(())
            }
            WorldEvent::ChangeTreatmentStrategy { strategy_id } => {
                sim.strategies.set_active(strategy_id, now)
            }
            WorldEvent::SingleRoundMda {
                fraction_population_targeted,
                days_to_complete_all_treatments,
            } => execute_single_round_mda(
                sim,
                &fraction_population_targeted,
                days_to_complete_all_treatments,
            ),
            WorldEvent::ModifyNestedMft { strategy_id } => {
                sim.strategies.modify_nested_slot(strategy_id, now)
            }
            WorldEvent::IntroduceMutant {
                admin_level,
                unit_id,
                fraction,
                alleles,
            } => {
                let locations = sim
                    .admin
                    .require(&admin_level)?
                    .locations_in(unit_id)
                    .to_vec();
                introduce_mutants(sim, &locations, fraction, &alleles)
            }
            WorldEvent::IntroduceMutantRaster {
                locations,
                fraction,
                alleles,
            } => introduce_mutants(sim, &locations, fraction, &alleles),
            WorldEvent::TurnOnMutation => {
                sim.mosquito.mutation_enabled = true;
                tracing::info!(day = now, "mutation turned on");
                Ok(())
            }
            WorldEvent::TurnOffMutation => {
                sim.mosquito.mutation_enabled = false;
                tracing::info!(day = now, "mutation turned off");
                Ok(())
            }
            WorldEvent::ChangeMutationProbabilityPerLocus { probability } => {
                if !(0.0..=1.0).contains(&probability) {
                    return Err(SimError::domain(format!(
                        "mutation probability {probability} outside [0, 1]"
                    )));
                }
                sim.mosquito.mutation_probability_per_locus = probability;
                Ok(())
            }
            WorldEvent::ChangeMutationMask { mask } => {
                let expected = sim.genotype_db.schema().sequence_length();
                if mask.len() != expected {
                    return Err(SimError::config(format!(
                        "mutation mask length {} does not match the {expected} loci",
                        mask.len()
                    )));
                }
                sim.mosquito.mutation_mask = mask;
                Ok(())
            }
            WorldEvent::ChangeWithinHostInducedFreeRecombination { value } => {
                sim.mosquito.within_host_induced_free_recombination = value;
                Ok(())
            }
            WorldEvent::ChangeInterruptedFeedingRate { location, rate } => {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(SimError::domain(format!(
                        "interrupted feeding rate {rate} outside [0, 1]"
                    )));
                }
                sim.locations[location].mosquito_interrupted_feeding_rate = rate;
                Ok(())
            }
            WorldEvent::AnnualBetaUpdate { rate } => {
                for location in &mut sim.locations {
                    location.beta = adjust_beta(location.beta, rate);
                }
                let next = now + sim.scheduler.days_to_next_year();
                sim.scheduler
                    .schedule_world_event(next, WorldEvent::AnnualBetaUpdate { rate });
                tracing::debug!(day = now, rate, beta = sim.locations[0].beta, "annual beta update");
                Ok(())
            }
            WorldEvent::AnnualCoverageUpdate { rate } => {
                sim.coverage.annual_adjust(rate);
                let next = now + sim.scheduler.days_to_next_year();
                sim.scheduler
                    .schedule_world_event(next, WorldEvent::AnnualCoverageUpdate { rate });
                Ok(())
            }
            WorldEvent::ChangeCirculationPercent { percent } => {
                if !(0.0..=1.0).contains(&percent) {
                    return Err(SimError::domain(format!(
                        "circulation percent {percent} outside [0, 1]"
                    )));
                }
                sim.config.movement_settings.circulation_percent = percent;
                Ok(())
            }
            WorldEvent::ImportationPeriodicallyRandom {
                genotype_id,
                count,
                log_parasite_density,
            } => {
                execute_random_importation(sim, genotype_id, count, log_parasite_density)?;
                // Monthly cadence.
                sim.scheduler.schedule_world_event(
                    now + 30,
                    WorldEvent::ImportationPeriodicallyRandom {
                        genotype_id,
                        count,
                        log_parasite_density,
                    },
                );
                Ok(())
            }
            WorldEvent::UpdateBetaRaster { beta_by_location } => {
                if beta_by_location.len() != sim.locations.len() {
                    return Err(SimError::raster(format!(
                        "beta raster has {} cells for {} locations",
                        beta_by_location.len(),
                        sim.locations.len()
                    )));
                }
                for (location, beta) in sim.locations.iter_mut().zip(beta_by_location) {
                    location.beta = beta;
                }
                Ok(())
            }
            WorldEvent::RotateStrategy {
                years,
                new_strategy_id,
                next_strategy_id,
            } => {
                sim.strategies.set_active(new_strategy_id, now)?;
                sim.scheduler.schedule_world_event(
                    now + years * 365,
                    WorldEvent::RotateStrategy {
                        years,
                        new_strategy_id: next_strategy_id,
                        next_strategy_id: new_strategy_id,
                    },
                );
                Ok(())
            }
            WorldEvent::DistrictImportationDaily {
                district,
                daily_rate,
                genotype_id,
            } => {
                let locations = sim
                    .admin
                    .require("district")?
                    .locations_in(district)
                    .to_vec();
                let cases = sim.random.random_poisson(daily_rate) as usize;
                if cases > 0 {
                    for location in pick_locations(sim, &locations, cases) {
                        import_case(sim, location, genotype_id, None)?;
                    }
                }
                sim.scheduler.schedule_world_event(
                    now + 1,
                    WorldEvent::DistrictImportationDaily {
                        district,
                        daily_rate,
                        genotype_id,
                    },
                );
                Ok(())
            }
            WorldEvent::UpdateEcozone { from, to } => sim.seasonality.update_seasonality(from, to),
        }
    }
}

/// Beta adjustment: multiplicative, truncated at the fifth decimal, floored
/// at zero.
#[must_use]
pub fn adjust_beta(beta: f64, rate: f64) -> f64 {
    let mut adjusted = beta + beta * rate;
    adjusted = (adjusted * 1e5).trunc() / 1e5;
    adjusted.max(0.0)
}

fn introduce_parasites(
    sim: &mut Simulation,
    location: usize,
    genotype_id: usize,
    number_of_cases: usize,
    log10_density: Option<f64>,
) -> Result<()> {
    for _ in 0..number_of_cases {
        import_case(sim, location, genotype_id, log10_density)?;
    }
    tracing::info!(
        day = sim.scheduler.current_time(),
        location,
        genotype_id,
        number_of_cases,
        "introduced parasites"
    );
    Ok(())
}

/// Infect one random living person at `location` with the genotype.
fn import_case(
    sim: &mut Simulation,
    location: usize,
    genotype_id: usize,
    log10_density: Option<f64>,
) -> Result<()> {
    sim.population.rebuild_presence_index();
    let candidates: Vec<usize> = sim.population.present_at(location).to_vec();
    if candidates.is_empty() {
        return Ok(());
    }
    let idx = candidates[sim.random.random_uniform(candidates.len())];
    let density = log10_density.unwrap_or(
        sim.config
            .parasite_parameters
            .parasite_density_levels
            .log_parasite_density_asymptomatic,
    );
    let end_time = sim.scheduler.total_time();
    let now = sim.scheduler.current_time();
    infect_with_genotype(
        &mut sim.population.persons[idx],
        genotype_id,
        density,
        now,
        end_time,
        &sim.config,
        &mut sim.random,
    );
    Ok(())
}

fn pick_locations(sim: &mut Simulation, locations: &[usize], count: usize) -> Vec<usize> {
    let residents = sim.population.residents_by_location();
    let weights: Vec<f64> = locations.iter().map(|&l| residents[l] as f64).collect();
    (0..count)
        .filter_map(|_| sim.random.sample_weighted(&weights))
        .map(|i| locations[i])
        .collect()
}

fn execute_random_importation(
    sim: &mut Simulation,
    genotype_id: usize,
    count: usize,
    log_parasite_density: f64,
) -> Result<()> {
    let residents = sim.population.residents_by_location();
    let weights: Vec<f64> = residents.iter().map(|&n| n as f64).collect();
    for _ in 0..count {
        let Some(location) = sim.random.sample_weighted(&weights) else {
            break;
        };
        import_case(sim, location, genotype_id, Some(log_parasite_density))?;
    }
    Ok(())
}

fn execute_single_round_mda(
    sim: &mut Simulation,
    fraction_population_targeted: &[f64],
    days_to_complete_all_treatments: i32,
) -> Result<()> {
    let now = sim.scheduler.current_time();
    let end_time = sim.scheduler.total_time();
    let therapy_id = sim.config.strategy_parameters.mda.mda_therapy_id;
    tracing::info!(day = now, "executing single round MDA");
    sim.population.rebuild_presence_index();

    for location in 0..sim.population.number_of_locations() {
        let fraction = fraction_population_targeted
            .get(location)
            .copied()
            .unwrap_or(0.0);
        if fraction <= 0.0 {
            continue;
        }
        let mut candidates: Vec<usize> = sim.population.present_at(location).to_vec();
        let target = sim
            .random
            .random_poisson(fraction * candidates.len() as f64)
            .min(candidates.len() as u64) as usize;
        sim.random.shuffle(&mut candidates);
        for &idx in candidates.iter().take(target) {
            let prob = sim.random.random_flat(0.0, 1.0);
            let present =
                sim.population.persons[idx].prob_present_at_mda(&sim.config, &mut sim.random);
            if prob < present {
                let delay = sim
                    .random
                    .random_uniform(days_to_complete_all_treatments.max(1) as usize)
                    as i32
                    + 1;
                sim.population.persons[idx].schedule_event(
                    now + delay,
                    PersonEventKind::ReceiveMdaTherapy { therapy_id },
                    now,
                    end_time,
                );
            }
        }
    }
    Ok(())
}

/// Switch the configured alleles in a fraction of detectable infections
/// within the given locations.
fn introduce_mutants(
    sim: &mut Simulation,
    locations: &[usize],
    fraction: f64,
    alleles: &[AlleleSwitch],
) -> Result<()> {
    let levels = sim
        .config
        .parasite_parameters
        .parasite_density_levels
        .clone();
    sim.population.rebuild_presence_index();

    // Collect every detectable clone in scope.
    let mut targets: Vec<(usize, u32)> = Vec::new();
    for &location in locations {
        for &idx in sim.population.present_at(location) {
            for parasite in sim.population.persons[idx].parasites.iter() {
                if parasite.is_detectable(&levels) {
                    targets.push((idx, parasite.id));
                }
            }
        }
    }
    if targets.is_empty() {
        return Ok(());
    }

    let count = ((targets.len() as f64) * fraction).round() as usize;
    sim.random.shuffle(&mut targets);
    let mut mutated = 0usize;
    for &(person_idx, parasite_id) in targets.iter().take(count) {
        let Some(current) = sim.population.persons[person_idx]
            .parasites
            .get(parasite_id)
            .map(|p| p.genotype_id)
        else {
            continue;
        };
        let mut genotype_id = current;
        for switch in alleles {
            genotype_id = sim
                .genotype_db
                .switch_allele(genotype_id, switch.locus, switch.value)?;
        }
        if genotype_id != current {
            if let Some(parasite) = sim.population.persons[person_idx]
                .parasites
                .get_mut(parasite_id)
            {
                parasite.genotype_id = genotype_id;
            }
            mutated += 1;
        }
    }
    let now = sim.scheduler.current_time();
    sim.mdc.record_mutation_events(now, mutated as u64);
    tracing::info!(day = now, fraction, mutated, "introduce mutant event");
    Ok(())
}
