//! Simulation configuration.
//!
//! All values are read once at startup; there is no hot reload. `validate`
//! runs before the model is built and every failure it reports is fatal.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::drug::DrugType;
use crate::model::error::{Result, SimError};
use crate::model::genotype::{Ec50Override, PfGenotypeInfo};
use crate::model::immunity::ImmuneSystemParameters;
use crate::model::parasite::ParasiteDensityLevels;
use crate::model::therapy::{validate_therapy_db, Therapy};

fn default_seed() -> u64 {
    0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationTimeframe {
    pub starting_date: NaiveDate,
    pub ending_date: NaiveDate,
    /// Day index from which data collection counters accumulate.
    pub start_collect_data_day: i32,
}

impl SimulationTimeframe {
    #[must_use]
    pub fn total_time(&self) -> i32 {
        (self.ending_date - self.starting_date).num_days() as i32
    }
}

impl Default for SimulationTimeframe {
    fn default() -> Self {
        Self {
            starting_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
            ending_date: NaiveDate::from_ymd_opt(2021, 1, 1).expect("valid date"),
            start_collect_data_day: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationDemographic {
    /// Upper age bound of each age class; non-decreasing.
    pub age_structure: Vec<i32>,
    /// Upper age bound of each initial-age bucket used when seeding.
    pub initial_age_structure: Vec<i32>,
    pub mortality_when_treatment_fail_by_age_class: Vec<f64>,
}

impl PopulationDemographic {
    #[must_use]
    pub fn number_of_age_classes(&self) -> usize {
        self.age_structure.len()
    }

    /// Age class for an integer age, walking the ladder from the bottom.
    #[must_use]
    pub fn age_class_of(&self, age: i32) -> usize {
        let mut ac = 0;
        while ac < self.age_structure.len() - 1 && age >= self.age_structure[ac] {
            ac += 1;
        }
        ac
    }
}

impl Default for PopulationDemographic {
    fn default() -> Self {
        Self {
            age_structure: vec![1, 5, 10, 15, 20, 40, 60, 100],
            initial_age_structure: vec![1, 5, 10, 15, 20, 30, 40, 50, 60, 70, 100],
            mortality_when_treatment_fail_by_age_class: vec![
                0.040, 0.020, 0.020, 0.020, 0.020, 0.004, 0.004, 0.004,
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub id: usize,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridBasedSettings {
    pub cell_size_km: f64,
    pub population_raster: String,
    pub beta_raster: String,
    pub p_treatment_under_5_raster: String,
    pub p_treatment_over_5_raster: String,
    #[serde(default)]
    pub district_raster: Option<String>,
    #[serde(default)]
    pub travel_raster: Option<String>,
    #[serde(default)]
    pub ecoclimatic_raster: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationBasedSettings {
    pub locations: Vec<LocationEntry>,
    pub population_size_by_location: Vec<usize>,
    pub beta_by_location: Vec<f64>,
    pub p_treatment_under_5_by_location: Vec<f64>,
    pub p_treatment_over_5_by_location: Vec<f64>,
    #[serde(default)]
    pub district_by_location: Option<Vec<i32>>,
    #[serde(default)]
    pub ecozone_by_location: Option<Vec<usize>>,
    /// Daily cap on infectious mosquitoes per location; 100 when absent.
    #[serde(default)]
    pub mosquito_size_by_location: Option<Vec<usize>>,
    /// Interrupted feeding rate per location; 0.19 when absent.
    #[serde(default)]
    pub mosquito_ifr_by_location: Option<Vec<f64>>,
    /// One row per location, or a single row broadcast to all.
    #[serde(default)]
    pub age_distribution_by_location: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpatialSettings {
    GridBased(GridBasedSettings),
    LocationBased(LocationBasedSettings),
}

impl Default for SpatialSettings {
    fn default() -> Self {
        SpatialSettings::LocationBased(LocationBasedSettings {
            locations: vec![LocationEntry {
                id: 0,
                latitude: 10.0,
                longitude: 105.0,
            }],
            population_size_by_location: vec![1000],
            beta_by_location: vec![0.05],
            p_treatment_under_5_by_location: vec![0.6],
            p_treatment_over_5_by_location: vec![0.5],
            district_by_location: None,
            ecozone_by_location: None,
            mosquito_size_by_location: None,
            mosquito_ifr_by_location: None,
            age_distribution_by_location: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeasonalityMode {
    Disabled,
    Equation {
        /// Per-ecozone coefficients.
        base: Vec<f64>,
        a: Vec<f64>,
        b: Vec<f64>,
        phi: Vec<f64>,
    },
    Rainfall {
        /// 365 daily factors in [0, 1], shared across locations.
        adjustments: Vec<f64>,
    },
    Pattern {
        /// One row of 12 monthly or 365 daily values per admin unit.
        admin_level: String,
        adjustments_by_unit: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalitySettings {
    pub enable: bool,
    pub mode: SeasonalityMode,
}

impl Default for SeasonalitySettings {
    fn default() -> Self {
        Self {
            enable: false,
            mode: SeasonalityMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SpatialModelConfig {
    Wesolowski {
        kappa: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    },
    WesolowskiSurface {
        kappa: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    },
    Marshall {
        tau: f64,
        alpha: f64,
        rho: f64,
    },
    BurkinaFaso {
        tau: f64,
        alpha: f64,
        rho: f64,
        capital_district: i32,
        penalty: f64,
    },
    Barabasi {
        r_g0: f64,
        beta_r: f64,
        kappa: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementSettings {
    pub spatial_model: SpatialModelConfig,
    /// Daily probability that a resident starts a trip.
    pub circulation_percent: f64,
    /// Relative circulation weight per moving level; persons draw a level at
    /// birth via a multinomial over these weights.
    pub moving_level_distribution: Vec<f64>,
    /// Gamma parameters of the trip duration in days.
    pub length_of_stay_shape: f64,
    pub length_of_stay_scale: f64,
    pub max_length_of_stay: i32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            spatial_model: SpatialModelConfig::Marshall {
                tau: 1.342,
                alpha: 1.27,
                rho: 0.54,
            },
            circulation_percent: 0.00336,
            moving_level_distribution: vec![1.0],
            length_of_stay_shape: 2.0,
            length_of_stay_scale: 2.5,
            max_length_of_stay: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialParasiteInfo {
    /// Target location, or every location when absent.
    #[serde(default)]
    pub location: Option<usize>,
    pub aa_sequence: String,
    /// Fraction of residents seeded with this genotype.
    pub prevalence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenotypeParameters {
    pub pf_genotype_info: PfGenotypeInfo,
    /// '1' allows mutation at that locus; must match the sequence length.
    pub mutation_mask: String,
    pub mutation_probability_per_locus: f64,
    #[serde(default)]
    pub override_ec50_patterns: Vec<Ec50Override>,
    #[serde(default)]
    pub initial_parasite_info: Vec<InitialParasiteInfo>,
    #[serde(default = "default_true")]
    pub mutation_enabled: bool,
    #[serde(default = "default_true")]
    pub within_host_induced_free_recombination: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GenotypeParameters {
    fn default() -> Self {
        Self {
            pf_genotype_info: PfGenotypeInfo::default(),
            mutation_mask: String::new(),
            mutation_probability_per_locus: 0.001,
            override_ec50_patterns: Vec::new(),
            initial_parasite_info: Vec::new(),
            mutation_enabled: true,
            within_host_induced_free_recombination: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrugParameters {
    pub drug_db: Vec<DrugType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TherapyParameters {
    pub therapy_db: Vec<Therapy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaDistributionParams {
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdaConfig {
    pub mda_therapy_id: usize,
    /// Upper age bound of each MDA presence bracket.
    pub age_bracket_prob_individual_present_at_mda: Vec<i32>,
    pub mean_prob_individual_present_at_mda: Vec<f64>,
    pub prob_individual_present_at_mda_distribution: Vec<BetaDistributionParams>,
}

impl Default for MdaConfig {
    fn default() -> Self {
        Self {
            mda_therapy_id: 0,
            age_bracket_prob_individual_present_at_mda: vec![10, 40, 100],
            mean_prob_individual_present_at_mda: vec![0.85, 0.75, 0.85],
            prob_individual_present_at_mda_distribution: vec![
                BetaDistributionParams {
                    alpha: 25.0,
                    beta: 4.4,
                },
                BetaDistributionParams {
                    alpha: 13.8,
                    beta: 4.6,
                },
                BetaDistributionParams {
                    alpha: 25.0,
                    beta: 4.4,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictMftEntryConfig {
    pub district: i32,
    pub therapy_ids: Vec<usize>,
    pub distribution: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDef {
    Sft {
        name: String,
        therapy_id: usize,
    },
    Mft {
        name: String,
        therapy_ids: Vec<usize>,
        distribution: Vec<f64>,
    },
    Cycling {
        name: String,
        therapy_ids: Vec<usize>,
        cycling_time: i32,
    },
    AdaptiveCycling {
        name: String,
        therapy_ids: Vec<usize>,
        trigger_value: f64,
        delay_until_actual_trigger: i32,
        turn_off_days: i32,
    },
    NestedMft {
        name: String,
        strategy_ids: Vec<usize>,
        distribution: Vec<f64>,
    },
    NestedMftMultiLocation {
        name: String,
        strategy_ids: Vec<usize>,
        distribution_by_location: Vec<Vec<f64>>,
    },
    DistrictMft {
        name: String,
        district_strategies: Vec<DistrictMftEntryConfig>,
    },
}

impl StrategyDef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            StrategyDef::Sft { name, .. }
            | StrategyDef::Mft { name, .. }
            | StrategyDef::Cycling { name, .. }
            | StrategyDef::AdaptiveCycling { name, .. }
            | StrategyDef::NestedMft { name, .. }
            | StrategyDef::NestedMftMultiLocation { name, .. }
            | StrategyDef::DistrictMft { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub strategy_db: Vec<StrategyDef>,
    pub initial_strategy_id: usize,
    #[serde(default)]
    pub mda: MdaConfig,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            strategy_db: vec![StrategyDef::Sft {
                name: "baseline".to_string(),
                therapy_id: 0,
            }],
            initial_strategy_id: 0,
            mda: MdaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParasiteParameters {
    pub parasite_density_levels: ParasiteDensityLevels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeInfectivity {
    pub sigma: f64,
    pub ro_star: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeBitingInfo {
    pub min_relative_biting_value: f64,
    pub max_relative_biting_value: f64,
    pub gamma_a: f64,
    pub gamma_b: f64,
    pub using_age_dependent_biting_level: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpidemiologicalParameters {
    pub days_to_clinical_under_five: i32,
    pub days_to_clinical_over_five: i32,
    pub days_mature_gametocyte_under_five: i32,
    pub days_mature_gametocyte_over_five: i32,
    pub p_compliance: f64,
    pub min_dosing_days: i32,
    pub relative_infectivity: RelativeInfectivity,
    pub relative_biting_info: RelativeBitingInfo,
    pub p_relapse: f64,
    pub relapse_duration: i32,
    /// Forced within-host update cadence in days.
    pub update_frequency: i32,
    /// Day after treatment on which failure is tested.
    pub tf_testing_day: i32,
}

impl Default for EpidemiologicalParameters {
    fn default() -> Self {
        Self {
            days_to_clinical_under_five: 4,
            days_to_clinical_over_five: 6,
            days_mature_gametocyte_under_five: 4,
            days_mature_gametocyte_over_five: 6,
            p_compliance: 1.0,
            min_dosing_days: 2,
            relative_infectivity: RelativeInfectivity {
                sigma: 1.0,
                ro_star: -4.0,
            },
            relative_biting_info: RelativeBitingInfo {
                min_relative_biting_value: 1.0,
                max_relative_biting_value: 35.0,
                gamma_a: 6.5,
                gamma_b: 1.0,
                using_age_dependent_biting_level: false,
            },
            p_relapse: 0.01,
            relapse_duration: 30,
            update_frequency: 7,
            tf_testing_day: 28,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlleleSwitch {
    pub locus: usize,
    pub value: char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageConfig {
    Steady {
        p_treatment_under_5: Vec<f64>,
        p_treatment_over_5: Vec<f64>,
    },
    Linear {
        starting_date: NaiveDate,
        end_date: NaiveDate,
        from_under_5: Vec<f64>,
        from_over_5: Vec<f64>,
        to_under_5: Vec<f64>,
        to_over_5: Vec<f64>,
    },
}

/// Scheduled population events, executed on the world queue at their dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum PopulationEventDef {
    IntroduceParasites {
        date: NaiveDate,
        location: usize,
        aa_sequence: String,
        number_of_cases: usize,
    },
    IntroduceParasitesPeriodically {
        date: NaiveDate,
        location: usize,
        aa_sequence: String,
        number_of_cases: usize,
        period_days: i32,
    },
    ChangeTreatmentCoverage {
        date: NaiveDate,
        coverage: CoverageConfig,
    },
    ChangeTreatmentStrategy {
        date: NaiveDate,
        strategy_id: usize,
    },
    SingleRoundMda {
        date: NaiveDate,
        fraction_population_targeted: Vec<f64>,
        days_to_complete_all_treatments: i32,
    },
    ModifyNestedMftStrategy {
        date: NaiveDate,
        strategy_id: usize,
    },
    IntroduceMutant {
        date: NaiveDate,
        admin_level: String,
        unit_id: i32,
        fraction: f64,
        alleles: Vec<AlleleSwitch>,
    },
    IntroduceMutantRaster {
        date: NaiveDate,
        /// 0/1 per location; any other value is a raster error.
        mask_by_location: Vec<f64>,
        fraction: f64,
        alleles: Vec<AlleleSwitch>,
    },
    TurnOnMutation {
        date: NaiveDate,
    },
    TurnOffMutation {
        date: NaiveDate,
    },
    ChangeMutationProbabilityPerLocus {
        date: NaiveDate,
        probability: f64,
    },
    ChangeMutationMask {
        date: NaiveDate,
        mask: String,
    },
    ChangeWithinHostInducedFreeRecombination {
        date: NaiveDate,
        value: bool,
    },
    ChangeInterruptedFeedingRate {
        date: NaiveDate,
        location: usize,
        rate: f64,
    },
    AnnualBetaUpdate {
        date: NaiveDate,
        rate: f64,
    },
    AnnualCoverageUpdate {
        date: NaiveDate,
        rate: f64,
    },
    ChangeCirculationPercent {
        date: NaiveDate,
        percent: f64,
    },
    ImportationPeriodicallyRandom {
        date: NaiveDate,
        aa_sequence: String,
        count_per_month: usize,
        log_parasite_density: f64,
    },
    UpdateBetaRaster {
        date: NaiveDate,
        beta_by_location: Vec<f64>,
    },
    RotateTreatmentStrategy {
        date: NaiveDate,
        years: i32,
        first_strategy_id: usize,
        second_strategy_id: usize,
    },
    DistrictImportationDaily {
        date: NaiveDate,
        district: i32,
        daily_rate: f64,
        aa_sequence: String,
    },
    UpdateEcozone {
        date: NaiveDate,
        from: usize,
        to: usize,
    },
}

impl PopulationEventDef {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            PopulationEventDef::IntroduceParasites { date, .. }
            | PopulationEventDef::IntroduceParasitesPeriodically { date, .. }
            | PopulationEventDef::ChangeTreatmentCoverage { date, .. }
            | PopulationEventDef::ChangeTreatmentStrategy { date, .. }
            | PopulationEventDef::SingleRoundMda { date, .. }
            | PopulationEventDef::ModifyNestedMftStrategy { date, .. }
            | PopulationEventDef::IntroduceMutant { date, .. }
            | PopulationEventDef::IntroduceMutantRaster { date, .. }
            | PopulationEventDef::TurnOnMutation { date }
            | PopulationEventDef::TurnOffMutation { date }
            | PopulationEventDef::ChangeMutationProbabilityPerLocus { date, .. }
            | PopulationEventDef::ChangeMutationMask { date, .. }
            | PopulationEventDef::ChangeWithinHostInducedFreeRecombination { date, .. }
            | PopulationEventDef::ChangeInterruptedFeedingRate { date, .. }
            | PopulationEventDef::AnnualBetaUpdate { date, .. }
            | PopulationEventDef::AnnualCoverageUpdate { date, .. }
            | PopulationEventDef::ChangeCirculationPercent { date, .. }
            | PopulationEventDef::ImportationPeriodicallyRandom { date, .. }
            | PopulationEventDef::UpdateBetaRaster { date, .. }
            | PopulationEventDef::RotateTreatmentStrategy { date, .. }
            | PopulationEventDef::DistrictImportationDaily { date, .. }
            | PopulationEventDef::UpdateEcozone { date, .. } => *date,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub simulation_timeframe: SimulationTimeframe,
    #[serde(default)]
    pub population_demographic: PopulationDemographic,
    #[serde(default)]
    pub spatial_settings: SpatialSettings,
    #[serde(default)]
    pub seasonality_settings: SeasonalitySettings,
    #[serde(default)]
    pub movement_settings: MovementSettings,
    #[serde(default)]
    pub genotype_parameters: GenotypeParameters,
    #[serde(default)]
    pub drug_parameters: DrugParameters,
    #[serde(default)]
    pub therapy_parameters: TherapyParameters,
    #[serde(default)]
    pub strategy_parameters: StrategyParameters,
    #[serde(default)]
    pub immune_system_parameters: ImmuneSystemParameters,
    #[serde(default)]
    pub parasite_parameters: ParasiteParameters,
    #[serde(default)]
    pub epidemiological_parameters: EpidemiologicalParameters,
    #[serde(default)]
    pub population_events: Vec<PopulationEventDef>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SimError::config(format!("cannot parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of locations declared by the spatial settings. Grid-based mode
    /// only knows this after rasters load.
    #[must_use]
    pub fn declared_location_count(&self) -> Option<usize> {
        match &self.spatial_settings {
            SpatialSettings::GridBased(_) => None,
            SpatialSettings::LocationBased(s) => Some(s.locations.len()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let timeframe = &self.simulation_timeframe;
        if timeframe.ending_date <= timeframe.starting_date {
            return Err(SimError::config(
                "ending_date must be after starting_date".to_string(),
            ));
        }

        let demographic = &self.population_demographic;
        if demographic.age_structure.is_empty() {
            return Err(SimError::config("age_structure is empty".to_string()));
        }
        if demographic.age_structure.windows(2).any(|w| w[0] > w[1]) {
            return Err(SimError::config(
                "age_structure must be non-decreasing".to_string(),
            ));
        }
        if demographic.mortality_when_treatment_fail_by_age_class.len()
            != demographic.number_of_age_classes()
        {
            return Err(SimError::config(format!(
                "mortality_when_treatment_fail_by_age_class has {} entries, expected {}",
                demographic.mortality_when_treatment_fail_by_age_class.len(),
                demographic.number_of_age_classes()
            )));
        }

        if let SpatialSettings::LocationBased(s) = &self.spatial_settings {
            let n = s.locations.len();
            if n == 0 {
                return Err(SimError::config("no locations declared".to_string()));
            }
            let check = |label: &str, len: usize| -> Result<()> {
                if len != n {
                    return Err(SimError::config(format!(
                        "{label} has {len} entries for {n} locations"
                    )));
                }
                Ok(())
            };
            check(
                "population_size_by_location",
                s.population_size_by_location.len(),
            )?;
            check("beta_by_location", s.beta_by_location.len())?;
            check(
                "p_treatment_under_5_by_location",
                s.p_treatment_under_5_by_location.len(),
            )?;
            check(
                "p_treatment_over_5_by_location",
                s.p_treatment_over_5_by_location.len(),
            )?;
            if let Some(districts) = &s.district_by_location {
                check("district_by_location", districts.len())?;
            }
            if let Some(zones) = &s.ecozone_by_location {
                check("ecozone_by_location", zones.len())?;
            }
            if let Some(sizes) = &s.mosquito_size_by_location {
                check("mosquito_size_by_location", sizes.len())?;
            }
            if let Some(rates) = &s.mosquito_ifr_by_location {
                check("mosquito_ifr_by_location", rates.len())?;
                for rate in rates {
                    if !(0.0..=1.0).contains(rate) {
                        return Err(SimError::domain(format!(
                            "interrupted feeding rate {rate} outside [0, 1]"
                        )));
                    }
                }
            }
            if s.age_distribution_by_location.len() > 1 {
                check(
                    "age_distribution_by_location",
                    s.age_distribution_by_location.len(),
                )?;
            }
            for p in s
                .p_treatment_under_5_by_location
                .iter()
                .chain(s.p_treatment_over_5_by_location.iter())
            {
                if !(0.0..=1.0).contains(p) {
                    return Err(SimError::domain(format!(
                        "treatment probability {p} outside [0, 1]"
                    )));
                }
            }
            for beta in &s.beta_by_location {
                if *beta < 0.0 {
                    return Err(SimError::domain(format!("negative beta {beta}")));
                }
            }
        }

        let genotype = &self.genotype_parameters;
        if !genotype.pf_genotype_info.loci.is_empty()
            && genotype.mutation_mask.len() != genotype.pf_genotype_info.sequence_length()
        {
            return Err(SimError::config(format!(
                "mutation_mask length {} does not match the {} loci of the schema",
                genotype.mutation_mask.len(),
                genotype.pf_genotype_info.sequence_length()
            )));
        }
        if !(0.0..=1.0).contains(&genotype.mutation_probability_per_locus) {
            return Err(SimError::domain(
                "mutation_probability_per_locus outside [0, 1]".to_string(),
            ));
        }

        validate_therapy_db(&self.therapy_parameters.therapy_db)?;
        for therapy in &self.therapy_parameters.therapy_db {
            if let Therapy::SingleCourse { drug_ids, .. } = therapy {
                for drug_id in drug_ids {
                    if *drug_id >= self.drug_parameters.drug_db.len() {
                        return Err(SimError::config(format!(
                            "therapy references unknown drug id {drug_id}"
                        )));
                    }
                }
            }
        }

        let strategies = &self.strategy_parameters;
        if strategies.initial_strategy_id >= strategies.strategy_db.len() {
            return Err(SimError::config(format!(
                "initial_strategy_id {} outside strategy_db of size {}",
                strategies.initial_strategy_id,
                strategies.strategy_db.len()
            )));
        }

        let movement = &self.movement_settings;
        if !(0.0..=1.0).contains(&movement.circulation_percent) {
            return Err(SimError::domain(
                "circulation_percent outside [0, 1]".to_string(),
            ));
        }

        if let SeasonalityMode::Rainfall { adjustments } = &self.seasonality_settings.mode {
            if self.seasonality_settings.enable && adjustments.len() != 365 {
                return Err(SimError::config(format!(
                    "rainfall seasonality needs 365 daily values, found {}",
                    adjustments.len()
                )));
            }
            for value in adjustments {
                if !(0.0..=1.0).contains(value) {
                    return Err(SimError::domain(format!(
                        "rainfall factor {value} outside [0, 1]"
                    )));
                }
            }
        }

        Ok(())
    }
}
