use std::collections::HashMap;

use malsim_lib::model::config::{
    LocationEntry, PopulationEventDef, SpatialModelConfig, SpatialSettings, StrategyDef,
};
use malsim_lib::model::drug::DrugType;
use malsim_lib::model::genotype::{AlleleInfo, LocusInfo, PfGenotypeInfo};
use malsim_lib::model::therapy::Therapy;
use malsim_lib::{Config, Simulation};

/// Two-locus schema used across the tests: locus 0 carries the resistance
/// allele 'T' (8x EC50 against drug 0), locus 1 a fitness-costly 'Y'.
#[allow(dead_code)]
pub fn two_locus_schema() -> PfGenotypeInfo {
    PfGenotypeInfo {
        loci: vec![
            LocusInfo {
                alleles: vec![
                    AlleleInfo {
                        value: 'K',
                        daily_fitness_multiplier: 1.0,
                        ec50_multipliers: HashMap::new(),
                    },
                    AlleleInfo {
                        value: 'T',
                        daily_fitness_multiplier: 0.95,
                        ec50_multipliers: HashMap::from([(0, 8.0)]),
                    },
                ],
            },
            LocusInfo {
                alleles: vec![
                    AlleleInfo {
                        value: 'N',
                        daily_fitness_multiplier: 1.0,
                        ec50_multipliers: HashMap::new(),
                    },
                    AlleleInfo {
                        value: 'Y',
                        daily_fitness_multiplier: 0.9,
                        ec50_multipliers: HashMap::new(),
                    },
                ],
            },
        ],
    }
}

#[allow(dead_code)]
pub fn standard_drug() -> DrugType {
    DrugType {
        name: "artemisinin".to_string(),
        half_life: 10.0,
        maximum_parasite_killing_rate: 0.999,
        n: 25.0,
        base_ec50: 0.75,
        age_specific_drug_absorption: vec![1.0; 8],
        age_specific_drug_concentration_sd: vec![0.1; 8],
        cut_off_value: 0.1,
    }
}

#[allow(dead_code)]
pub struct SimulationBuilder {
    config: Config,
}

#[allow(dead_code)]
impl SimulationBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.simulation_timeframe.ending_date =
            chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        config.genotype_parameters.pf_genotype_info = two_locus_schema();
        config.genotype_parameters.mutation_mask = "11".to_string();
        config.drug_parameters.drug_db = vec![standard_drug()];
        config.therapy_parameters.therapy_db = vec![Therapy::SingleCourse {
            drug_ids: vec![0],
            dosing_days: 3,
            pr_completed_days: None,
        }];
        config.strategy_parameters.strategy_db = vec![StrategyDef::Sft {
            name: "baseline".to_string(),
            therapy_id: 0,
        }];
        if let SpatialSettings::LocationBased(s) = &mut config.spatial_settings {
            s.population_size_by_location = vec![500];
            s.beta_by_location = vec![0.0];
        }
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Equal-sized locations at the given coordinates.
    pub fn with_locations(mut self, coords: &[(f64, f64)], population: usize, beta: f64) -> Self {
        let n = coords.len();
        if let SpatialSettings::LocationBased(s) = &mut self.config.spatial_settings {
            s.locations = coords
                .iter()
                .enumerate()
                .map(|(id, (latitude, longitude))| LocationEntry {
                    id,
                    latitude: *latitude,
                    longitude: *longitude,
                })
                .collect();
            s.population_size_by_location = vec![population; n];
            s.beta_by_location = vec![beta; n];
            s.p_treatment_under_5_by_location = vec![0.6; n];
            s.p_treatment_over_5_by_location = vec![0.5; n];
        }
        self
    }

    pub fn with_population(mut self, population: usize) -> Self {
        if let SpatialSettings::LocationBased(s) = &mut self.config.spatial_settings {
            for entry in &mut s.population_size_by_location {
                *entry = population;
            }
        }
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        if let SpatialSettings::LocationBased(s) = &mut self.config.spatial_settings {
            for entry in &mut s.beta_by_location {
                *entry = beta;
            }
        }
        self
    }

    pub fn with_treatment_probability(mut self, p: f64) -> Self {
        if let SpatialSettings::LocationBased(s) = &mut self.config.spatial_settings {
            for entry in &mut s.p_treatment_under_5_by_location {
                *entry = p;
            }
            for entry in &mut s.p_treatment_over_5_by_location {
                *entry = p;
            }
        }
        self
    }

    pub fn with_districts(mut self, districts: Vec<i32>) -> Self {
        if let SpatialSettings::LocationBased(s) = &mut self.config.spatial_settings {
            s.district_by_location = Some(districts);
        }
        self
    }

    pub fn with_initial_prevalence(mut self, aa_sequence: &str, prevalence: f64) -> Self {
        self.config.genotype_parameters.initial_parasite_info.push(
            malsim_lib::model::config::InitialParasiteInfo {
                location: None,
                aa_sequence: aa_sequence.to_string(),
                prevalence,
            },
        );
        self
    }

    pub fn with_initial_prevalence_at(
        mut self,
        location: usize,
        aa_sequence: &str,
        prevalence: f64,
    ) -> Self {
        self.config.genotype_parameters.initial_parasite_info.push(
            malsim_lib::model::config::InitialParasiteInfo {
                location: Some(location),
                aa_sequence: aa_sequence.to_string(),
                prevalence,
            },
        );
        self
    }

    pub fn with_circulation(mut self, percent: f64) -> Self {
        self.config.movement_settings.circulation_percent = percent;
        self
    }

    pub fn with_movement(mut self, model: SpatialModelConfig) -> Self {
        self.config.movement_settings.spatial_model = model;
        self
    }

    pub fn with_mutation_probability(mut self, probability: f64) -> Self {
        self.config.genotype_parameters.mutation_probability_per_locus = probability;
        self
    }

    pub fn with_mutation_mask(mut self, mask: &str) -> Self {
        self.config.genotype_parameters.mutation_mask = mask.to_string();
        self
    }

    pub fn with_event(mut self, event: PopulationEventDef) -> Self {
        self.config.population_events.push(event);
        self
    }

    pub fn with_config<F: FnOnce(&mut Config)>(mut self, modifier: F) -> Self {
        modifier(&mut self.config);
        self
    }

    pub fn build(self) -> Simulation {
        Simulation::new(self.config).expect("failed to build simulation in test builder")
    }

    pub fn try_build(self) -> malsim_lib::Result<Simulation> {
        Simulation::new(self.config)
    }
}

/// Step the simulation forward by whole days.
#[allow(dead_code)]
pub fn run_days(sim: &mut Simulation, days: i32) {
    for _ in 0..days {
        if sim.scheduler.is_done() {
            break;
        }
        sim.perform_daily_update();
        sim.scheduler.advance();
    }
}

/// Blood-slide prevalence over the whole population, forcing a within-host
/// update so densities are current.
#[allow(dead_code)]
pub fn prevalence(sim: &mut Simulation) -> f64 {
    let counts = detectable_by_residence(sim);
    let infected: usize = counts.iter().sum();
    infected as f64 / sim.population.len() as f64
}

/// Count of residents with detectable parasites per residence location.
#[allow(dead_code)]
pub fn detectable_by_residence(sim: &mut Simulation) -> Vec<usize> {
    let current_time = sim.scheduler.current_time();
    let mut counts = vec![0usize; sim.locations.len()];
    let config = &sim.config;
    let genotype_db = &sim.genotype_db;
    for person in &mut sim.population.persons {
        if !person.is_alive() {
            continue;
        }
        person.update(current_time, config, genotype_db);
        if person.has_detectable_parasite(config) {
            counts[person.residence_location] += 1;
        }
    }
    counts
}
