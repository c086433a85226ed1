//! Simulation construction: spatial layer, databases, population seeding and
//! scheduled population events. Every failure here is fatal and happens
//! before the first day step.

use crate::model::collector::ModelDataCollector;
use crate::model::config::{
    Config, CoverageConfig, PopulationEventDef, SpatialModelConfig, SpatialSettings,
};
use crate::model::coverage::TreatmentCoverageModel;
use crate::model::error::{Result, SimError};
use crate::model::events::WorldEvent;
use crate::model::genotype::GenotypeDb;
use crate::model::population::{self, Population};
use crate::model::random::Random;
use crate::model::raster::AscGrid;
use crate::model::scheduler::Scheduler;
use crate::model::seasonality::Seasonality;
use crate::model::simulation::Simulation;
use crate::model::spatial::{
    normalise_travel_surface, AdminBoundary, AdminLevels, DistanceMatrix, Location,
    MovementKernel, MovementModel,
};
use crate::model::strategy::StrategyDb;
use crate::model::transmission::Mosquito;

/// Spatial layer assembled from either mode.
struct SpatialLayer {
    locations: Vec<Location>,
    distances: DistanceMatrix,
    admin: AdminLevels,
    ecozone_by_location: Option<Vec<usize>>,
    travel_surface: Option<Vec<f64>>,
}

impl Simulation {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let mut random = Random::new(config.seed);
        let mut scheduler = Scheduler::new(
            config.simulation_timeframe.starting_date,
            config.simulation_timeframe.total_time(),
        );

        let spatial = build_spatial_layer(&config)?;
        let SpatialLayer {
            locations,
            distances,
            admin,
            ecozone_by_location,
            travel_surface,
        } = spatial;

        let mut genotype_db = GenotypeDb::new(
            config.genotype_parameters.pf_genotype_info.clone(),
            config.genotype_parameters.override_ec50_patterns.clone(),
            config.drug_parameters.drug_db.clone(),
        );

        let movement_model = build_movement_model(
            &config.movement_settings.spatial_model,
            distances,
            &admin,
            travel_surface,
        )?;

        let seasonality = Seasonality::from_config(
            &config.seasonality_settings,
            locations.len(),
            ecozone_by_location.as_deref(),
            &admin,
        )?;

        let strategies = StrategyDb::from_config(&config.strategy_parameters, 0)?;
        let coverage = TreatmentCoverageModel::steady(
            locations.iter().map(|l| l.p_treatment_under_5).collect(),
            locations.iter().map(|l| l.p_treatment_over_5).collect(),
        );
        let mosquito = Mosquito::from_config(&config);

        let mdc = ModelDataCollector::new(
            locations.len(),
            config.population_demographic.number_of_age_classes(),
            config.therapy_parameters.therapy_db.len(),
            config.simulation_timeframe.start_collect_data_day,
        );

        let mut population = seed_population(&config, &locations, &mut random, &scheduler);
        seed_initial_infections(
            &config,
            &mut population,
            &mut genotype_db,
            &mut random,
            &scheduler,
        )?;

        schedule_population_events(&config, &mut scheduler, &mut genotype_db, &locations)?;

        tracing::info!(
            locations = locations.len(),
            population = population.len(),
            genotypes = genotype_db.len(),
            total_days = scheduler.total_time(),
            "simulation initialised"
        );

        Ok(Self {
            config,
            random,
            scheduler,
            genotype_db,
            locations,
            admin,
            seasonality,
            movement_model,
            strategies,
            coverage,
            mosquito,
            population,
            mdc,
            reporters: Vec::new(),
        })
    }
}

fn build_spatial_layer(config: &Config) -> Result<SpatialLayer> {
    match &config.spatial_settings {
        SpatialSettings::LocationBased(settings) => {
            let mut locations = Vec::with_capacity(settings.locations.len());
            for (idx, entry) in settings.locations.iter().enumerate() {
                let mut location = Location::new(
                    idx,
                    entry.latitude,
                    entry.longitude,
                    settings.population_size_by_location[idx],
                );
                location.beta = settings.beta_by_location[idx];
                location.p_treatment_under_5 = settings.p_treatment_under_5_by_location[idx];
                location.p_treatment_over_5 = settings.p_treatment_over_5_by_location[idx];
                if let Some(sizes) = &settings.mosquito_size_by_location {
                    location.mosquito_size = sizes[idx];
                }
                if let Some(rates) = &settings.mosquito_ifr_by_location {
                    location.mosquito_interrupted_feeding_rate = rates[idx];
                }
                location.age_distribution = age_distribution_for(settings, idx);
                locations.push(location);
            }
            let distances = DistanceMatrix::from_coordinates(&locations);
            let mut admin = AdminLevels::default();
            if let Some(districts) = &settings.district_by_location {
                admin.register(AdminBoundary::new("district", districts.clone())?)?;
            }
            Ok(SpatialLayer {
                locations,
                distances,
                admin,
                ecozone_by_location: settings.ecozone_by_location.clone(),
                travel_surface: None,
            })
        }
        SpatialSettings::GridBased(settings) => build_grid_layer(settings),
    }
}

fn age_distribution_for(
    settings: &crate::model::config::LocationBasedSettings,
    idx: usize,
) -> Vec<f64> {
    match settings.age_distribution_by_location.len() {
        0 => Vec::new(),
        1 => settings.age_distribution_by_location[0].clone(),
        _ => settings.age_distribution_by_location[idx].clone(),
    }
}

fn build_grid_layer(settings: &crate::model::config::GridBasedSettings) -> Result<SpatialLayer> {
    let population_raster = AscGrid::read(&settings.population_raster)?;
    let beta_raster = AscGrid::read(&settings.beta_raster)?;
    let under_5_raster = AscGrid::read(&settings.p_treatment_under_5_raster)?;
    let over_5_raster = AscGrid::read(&settings.p_treatment_over_5_raster)?;
    population_raster.check_same_shape(&beta_raster)?;
    population_raster.check_same_shape(&under_5_raster)?;
    population_raster.check_same_shape(&over_5_raster)?;

    let mut locations = Vec::new();
    for (row, col, population) in population_raster.data_cells() {
        let id = locations.len();
        let latitude = population_raster.yll
            + (population_raster.nrows - row - 1) as f64 * population_raster.cellsize;
        let longitude = population_raster.xll + col as f64 * population_raster.cellsize;
        let mut location = Location::new(id, latitude, longitude, population.max(0.0) as usize);
        location.row = row;
        location.col = col;
        location.beta = beta_raster.value(row, col);
        location.p_treatment_under_5 = under_5_raster.value(row, col);
        location.p_treatment_over_5 = over_5_raster.value(row, col);
        locations.push(location);
    }
    if locations.is_empty() {
        return Err(SimError::raster(
            "population raster holds no data cells".to_string(),
        ));
    }
    let distances = DistanceMatrix::from_grid(&locations, settings.cell_size_km);

    let mut admin = AdminLevels::default();
    if let Some(path) = &settings.district_raster {
        let district_raster = AscGrid::read(path)?;
        population_raster.check_same_shape(&district_raster)?;
        let units: Vec<i32> = locations
            .iter()
            .map(|l| district_raster.value(l.row, l.col) as i32)
            .collect();
        admin.register(AdminBoundary::new("district", units)?)?;
    }

    let ecozone_by_location = match &settings.ecoclimatic_raster {
        Some(path) => {
            let ecozone_raster = AscGrid::read(path)?;
            population_raster.check_same_shape(&ecozone_raster)?;
            Some(
                locations
                    .iter()
                    .map(|l| ecozone_raster.value(l.row, l.col) as usize)
                    .collect(),
            )
        }
        None => None,
    };

    let travel_surface = match &settings.travel_raster {
        Some(path) => {
            let travel_raster = AscGrid::read(path)?;
            population_raster.check_same_shape(&travel_raster)?;
            let raw: Vec<f64> = locations
                .iter()
                .map(|l| travel_raster.value(l.row, l.col))
                .collect();
            Some(normalise_travel_surface(raw))
        }
        None => None,
    };

    Ok(SpatialLayer {
        locations,
        distances,
        admin,
        ecozone_by_location,
        travel_surface,
    })
}

fn build_movement_model(
    model: &SpatialModelConfig,
    distances: DistanceMatrix,
    admin: &AdminLevels,
    travel_surface: Option<Vec<f64>>,
) -> Result<MovementModel> {
    let kernel = match model {
        SpatialModelConfig::Wesolowski {
            kappa,
            alpha,
            beta,
            gamma,
        } => MovementKernel::Wesolowski {
            kappa: *kappa,
            alpha: *alpha,
            beta: *beta,
            gamma: *gamma,
        },
        SpatialModelConfig::WesolowskiSurface {
            kappa,
            alpha,
            beta,
            gamma,
        } => MovementKernel::WesolowskiSurface {
            kappa: *kappa,
            alpha: *alpha,
            beta: *beta,
            gamma: *gamma,
            travel: travel_surface.ok_or_else(|| {
                SimError::config(
                    "wesolowski_surface movement requires a travel raster".to_string(),
                )
            })?,
        },
        SpatialModelConfig::Marshall { tau, alpha, rho } => MovementKernel::Marshall {
            tau: *tau,
            alpha: *alpha,
            rho: *rho,
        },
        SpatialModelConfig::BurkinaFaso {
            tau,
            alpha,
            rho,
            capital_district,
            penalty,
        } => {
            let boundary = admin.require("district")?;
            let n = distances.values.len();
            let in_capital: Vec<bool> = (0..n)
                .map(|loc| boundary.unit_of(loc) == *capital_district)
                .collect();
            MovementKernel::BurkinaFaso {
                tau: *tau,
                alpha: *alpha,
                rho: *rho,
                penalty: *penalty,
                travel: travel_surface.unwrap_or_else(|| vec![0.0; n]),
                in_capital,
            }
        }
        SpatialModelConfig::Barabasi { r_g0, beta_r, kappa } => MovementKernel::Barabasi {
            r_g0: *r_g0,
            beta_r: *beta_r,
            kappa: *kappa,
        },
    };
    Ok(MovementModel::new(kernel, distances))
}

/// Seed each location to its target size, drawing ages from the initial age
/// structure weighted by the location's age distribution.
fn seed_population(
    config: &Config,
    locations: &[Location],
    random: &mut Random,
    scheduler: &Scheduler,
) -> Population {
    let buckets = &config.population_demographic.initial_age_structure;
    let calendar = scheduler.calendar_date();
    let end_time = scheduler.total_time();
    let mut persons = Vec::new();
    for location in locations {
        let weights: Vec<f64> = if location.age_distribution.len() == buckets.len() {
            location.age_distribution.clone()
        } else {
            vec![1.0; buckets.len()]
        };
        for _ in 0..location.population_size {
            let bucket = random.sample_weighted(&weights).unwrap_or(0);
            let lower = if bucket == 0 { 0 } else { buckets[bucket - 1] };
            let upper = buckets[bucket].max(lower + 1);
            let age = lower + random.random_uniform((upper - lower) as usize) as i32;
            persons.push(population::create_person(
                location.id,
                age,
                0,
                calendar,
                end_time,
                config,
                random,
            ));
        }
    }
    Population::new(persons, locations.len())
}

fn seed_initial_infections(
    config: &Config,
    population: &mut Population,
    genotype_db: &mut GenotypeDb,
    random: &mut Random,
    scheduler: &Scheduler,
) -> Result<()> {
    let end_time = scheduler.total_time();
    let levels = &config.parasite_parameters.parasite_density_levels;
    for info in &config.genotype_parameters.initial_parasite_info {
        let genotype_id = genotype_db.get(&info.aa_sequence)?;
        let targets: Vec<usize> = match info.location {
            Some(loc) => vec![loc],
            None => (0..population.number_of_locations()).collect(),
        };
        for location in targets {
            let mut candidates: Vec<usize> = population.present_at(location).to_vec();
            let cases = (candidates.len() as f64 * info.prevalence).round() as usize;
            random.shuffle(&mut candidates);
            for &idx in candidates.iter().take(cases) {
                population::infect_with_genotype(
                    &mut population.persons[idx],
                    genotype_id,
                    levels.log_parasite_density_asymptomatic,
                    0,
                    end_time,
                    config,
                    random,
                );
            }
        }
    }
    Ok(())
}

/// Convert configured population events into scheduled world events.
fn schedule_population_events(
    config: &Config,
    scheduler: &mut Scheduler,
    genotype_db: &mut GenotypeDb,
    locations: &[Location],
) -> Result<()> {
    for def in &config.population_events {
        let run_at = scheduler.day_of(def.date());
        let event = build_world_event(def, config, scheduler, genotype_db, locations)?;
        scheduler.schedule_world_event(run_at, event);
    }
    Ok(())
}

fn build_world_event(
    def: &PopulationEventDef,
    config: &Config,
    scheduler: &Scheduler,
    genotype_db: &mut GenotypeDb,
    locations: &[Location],
) -> Result<WorldEvent> {
    Ok(match def {
        PopulationEventDef::IntroduceParasites {
            location,
            aa_sequence,
            number_of_cases,
            ..
        } => WorldEvent::IntroduceParasites {
            location: *location,
            genotype_id: genotype_db.get(aa_sequence)?,
            number_of_cases: *number_of_cases,
        },
        PopulationEventDef::IntroduceParasitesPeriodically {
            location,
            aa_sequence,
            number_of_cases,
            period_days,
            ..
        } => WorldEvent::IntroduceParasitesPeriodically {
            location: *location,
            genotype_id: genotype_db.get(aa_sequence)?,
            number_of_cases: *number_of_cases,
            period_days: *period_days,
        },
        PopulationEventDef::ChangeTreatmentCoverage { coverage, .. } => {
            validate_coverage_lengths(coverage, locations.len())?;
            WorldEvent::ChangeTreatmentCoverage {
                coverage: TreatmentCoverageModel::from_config(coverage, |d| scheduler.day_of(d))?,
            }
        }
        PopulationEventDef::ChangeTreatmentStrategy { strategy_id, .. } => {
            WorldEvent::ChangeTreatmentStrategy {
                strategy_id: *strategy_id,
            }
        }
        PopulationEventDef::SingleRoundMda {
            fraction_population_targeted,
            days_to_complete_all_treatments,
            ..
        } => {
            let mda = &config.strategy_parameters.mda;
            if mda.mda_therapy_id >= config.therapy_parameters.therapy_db.len() {
                return Err(SimError::config(format!(
                    "MDA therapy id {} not in therapy_db",
                    mda.mda_therapy_id
                )));
            }
            WorldEvent::SingleRoundMda {
                fraction_population_targeted: fraction_population_targeted.clone(),
                days_to_complete_all_treatments: *days_to_complete_all_treatments,
            }
        }
        PopulationEventDef::ModifyNestedMftStrategy { strategy_id, .. } => {
            WorldEvent::ModifyNestedMft {
                strategy_id: *strategy_id,
            }
        }
        PopulationEventDef::IntroduceMutant {
            admin_level,
            unit_id,
            fraction,
            alleles,
            ..
        } => WorldEvent::IntroduceMutant {
            admin_level: admin_level.clone(),
            unit_id: *unit_id,
            fraction: *fraction,
            alleles: alleles.clone(),
        },
        PopulationEventDef::IntroduceMutantRaster {
            mask_by_location,
            fraction,
            alleles,
            ..
        } => {
            if mask_by_location.len() != locations.len() {
                return Err(SimError::raster(format!(
                    "mutant mask has {} cells for {} locations",
                    mask_by_location.len(),
                    locations.len()
                )));
            }
            let mut selected = Vec::new();
            for (loc, value) in mask_by_location.iter().enumerate() {
                // The mask is strictly 0/1.
                if *value == 1.0 {
                    selected.push(loc);
                } else if *value != 0.0 {
                    return Err(SimError::raster(format!(
                        "mutant mask cell {loc} holds {value}, expected 0 or 1"
                    )));
                }
            }
            WorldEvent::IntroduceMutantRaster {
                locations: selected,
                fraction: *fraction,
                alleles: alleles.clone(),
            }
        }
        PopulationEventDef::TurnOnMutation { .. } => WorldEvent::TurnOnMutation,
        PopulationEventDef::TurnOffMutation { .. } => WorldEvent::TurnOffMutation,
        PopulationEventDef::ChangeMutationProbabilityPerLocus { probability, .. } => {
            WorldEvent::ChangeMutationProbabilityPerLocus {
                probability: *probability,
            }
        }
        PopulationEventDef::ChangeMutationMask { mask, .. } => WorldEvent::ChangeMutationMask {
            mask: mask.clone(),
        },
        PopulationEventDef::ChangeWithinHostInducedFreeRecombination { value, .. } => {
            WorldEvent::ChangeWithinHostInducedFreeRecombination { value: *value }
        }
        PopulationEventDef::ChangeInterruptedFeedingRate { location, rate, .. } => {
            WorldEvent::ChangeInterruptedFeedingRate {
                location: *location,
                rate: *rate,
            }
        }
        PopulationEventDef::AnnualBetaUpdate { rate, .. } => {
            WorldEvent::AnnualBetaUpdate { rate: *rate }
        }
        PopulationEventDef::AnnualCoverageUpdate { rate, .. } => {
            WorldEvent::AnnualCoverageUpdate { rate: *rate }
        }
        PopulationEventDef::ChangeCirculationPercent { percent, .. } => {
            WorldEvent::ChangeCirculationPercent { percent: *percent }
        }
        PopulationEventDef::ImportationPeriodicallyRandom {
            aa_sequence,
            count_per_month,
            log_parasite_density,
            ..
        } => WorldEvent::ImportationPeriodicallyRandom {
            genotype_id: genotype_db.get(aa_sequence)?,
            count: *count_per_month,
            log_parasite_density: *log_parasite_density,
        },
        PopulationEventDef::UpdateBetaRaster {
            beta_by_location, ..
        } => WorldEvent::UpdateBetaRaster {
            beta_by_location: beta_by_location.clone(),
        },
        PopulationEventDef::RotateTreatmentStrategy {
            years,
            first_strategy_id,
            second_strategy_id,
            ..
        } => WorldEvent::RotateStrategy {
            years: *years,
            new_strategy_id: *first_strategy_id,
            next_strategy_id: *second_strategy_id,
        },
        PopulationEventDef::DistrictImportationDaily {
            district,
            daily_rate,
            aa_sequence,
            ..
        } => WorldEvent::DistrictImportationDaily {
            district: *district,
            daily_rate: *daily_rate,
            genotype_id: genotype_db.get(aa_sequence)?,
        },
        PopulationEventDef::UpdateEcozone { from, to, .. } => WorldEvent::UpdateEcozone {
            from: *from,
            to: *to,
        },
    })
}

fn validate_coverage_lengths(coverage: &CoverageConfig, location_count: usize) -> Result<()> {
    let lengths: Vec<usize> = match coverage {
        CoverageConfig::Steady {
            p_treatment_under_5,
            p_treatment_over_5,
        } => vec![p_treatment_under_5.len(), p_treatment_over_5.len()],
        CoverageConfig::Linear {
            from_under_5,
            from_over_5,
            to_under_5,
            to_over_5,
            ..
        } => vec![
            from_under_5.len(),
            from_over_5.len(),
            to_under_5.len(),
            to_over_5.len(),
        ],
    };
    for len in lengths {
        if len != location_count {
            return Err(SimError::config(format!(
                "coverage vectors have {len} entries for {location_count} locations"
            )));
        }
    }
    Ok(())
}
