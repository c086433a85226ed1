//! Within-host clonal parasite populations.
//!
//! Each clone tracks its genotype, log10 density and gametocyte level, and
//! carries a pluggable density update function. Clones below the cured
//! threshold are swept on the next update.

use serde::{Deserialize, Serialize};

use crate::model::drug::{DrugType, DrugsInBlood};
use crate::model::genotype::GenotypeDb;
use crate::model::immunity::{ImmuneSystem, ImmuneSystemParameters};
use crate::model::random::Random;

/// Sentinel for "no parasites at all"; not a real log density.
pub const LOG_ZERO_PARASITE_DENSITY: f64 = -1000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParasiteDensityLevels {
    pub log_parasite_density_cured: f64,
    pub log_parasite_density_from_liver: f64,
    pub log_parasite_density_asymptomatic: f64,
    pub log_parasite_density_clinical: f64,
    pub log_parasite_density_detectable: f64,
}

impl Default for ParasiteDensityLevels {
    fn default() -> Self {
        Self {
            log_parasite_density_cured: -4.699,
            log_parasite_density_from_liver: -2.0,
            log_parasite_density_asymptomatic: 3.0,
            log_parasite_density_clinical: 4.301,
            log_parasite_density_detectable: 1.0,
        }
    }
}

/// Density update functions; the set is fixed, selection happens per clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParasiteUpdateFn {
    /// Grow by the immune formula toward the asymptomatic plateau.
    Progress,
    /// Follow the immune formula; decays once immunity has risen.
    ImmunityClearance,
    /// Immune formula plus drug killing applied by `update_by_drugs`.
    DrugEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClonalParasitePopulation {
    /// Stable per-host id; events refer to clones by this, never by index.
    pub id: u32,
    pub genotype_id: usize,
    pub last_update_log10_parasite_density: f64,
    pub gametocyte_level: f64,
    pub update_fn: ParasiteUpdateFn,
}

impl ClonalParasitePopulation {
    #[must_use]
    pub fn is_detectable(&self, levels: &ParasiteDensityLevels) -> bool {
        self.last_update_log10_parasite_density >= levels.log_parasite_density_detectable
    }

    #[must_use]
    pub fn is_gametocytaemic(&self) -> bool {
        self.gametocyte_level > 0.0
            && self.last_update_log10_parasite_density > LOG_ZERO_PARASITE_DENSITY
    }
}

/// All clones inside one host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClonalParasitePopulations {
    parasites: Vec<ClonalParasitePopulation>,
    next_id: u32,
}

impl ClonalParasitePopulations {
    #[must_use]
    pub fn len(&self) -> usize {
        self.parasites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parasites.is_empty()
    }

    pub fn add(&mut self, genotype_id: usize, log10_density: f64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.parasites.push(ClonalParasitePopulation {
            id,
            genotype_id,
            last_update_log10_parasite_density: log10_density,
            gametocyte_level: 0.0,
            update_fn: ParasiteUpdateFn::ImmunityClearance,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&ClonalParasitePopulation> {
        self.parasites.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut ClonalParasitePopulation> {
        self.parasites.iter_mut().find(|p| p.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.parasites.iter().any(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClonalParasitePopulation> {
        self.parasites.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClonalParasitePopulation> {
        self.parasites.iter_mut()
    }

    pub fn clear(&mut self) {
        self.parasites.clear();
    }

    /// Apply each clone's update function over `days` elapsed days.
    pub fn update(
        &mut self,
        days: i32,
        immune: &ImmuneSystem,
        genotype_db: &GenotypeDb,
        levels: &ParasiteDensityLevels,
        params: &ImmuneSystemParameters,
    ) {
        if days <= 0 {
            return;
        }
        for parasite in &mut self.parasites {
            let fitness = genotype_db.genotype(parasite.genotype_id).daily_fitness;
            let current = parasite.last_update_log10_parasite_density;
            let grown = immune.parasite_size_after_days(days, current, fitness, params);
            // Densities never grow past the asymptomatic plateau; clones
            // already above it (clinical spikes) may only decay.
            let cap = current.max(levels.log_parasite_density_asymptomatic);
            parasite.last_update_log10_parasite_density = match parasite.update_fn {
                ParasiteUpdateFn::Progress => {
                    grown.min(levels.log_parasite_density_asymptomatic)
                }
                ParasiteUpdateFn::ImmunityClearance | ParasiteUpdateFn::DrugEffect => {
                    grown.min(cap)
                }
            };
        }
    }

    /// Apply combined drug killing for `days` days and flip clones to the
    /// drug-effect function while any drug is active. The combined kill per
    /// day is the sum of the per-drug killing rates, clamped to [0, 1].
    pub fn update_by_drugs(
        &mut self,
        days: i32,
        drugs: &DrugsInBlood,
        drug_db: &[DrugType],
        genotype_db: &GenotypeDb,
        levels: &ParasiteDensityLevels,
    ) {
        if days <= 0 || drugs.is_empty() {
            return;
        }
        for parasite in &mut self.parasites {
            let ec50 = &genotype_db.genotype(parasite.genotype_id).ec50_power_n;
            let survival = drugs.survival_fraction(drug_db, ec50);
            if survival >= 1.0 {
                continue;
            }
            if survival <= 0.0 {
                // The whole parasite load is killed within the day.
                parasite.last_update_log10_parasite_density = levels.log_parasite_density_cured;
            } else {
                parasite.last_update_log10_parasite_density +=
                    f64::from(days) * survival.log10();
            }
            parasite.update_fn = ParasiteUpdateFn::DrugEffect;
        }
    }

    /// Remove clones below the cured threshold; returns how many cleared.
    pub fn clear_cured_parasites(&mut self, levels: &ParasiteDensityLevels) -> usize {
        let before = self.parasites.len();
        self.parasites
            .retain(|p| p.last_update_log10_parasite_density > levels.log_parasite_density_cured);
        before - self.parasites.len()
    }

    #[must_use]
    pub fn has_detectable_parasite(&self, levels: &ParasiteDensityLevels) -> bool {
        self.parasites.iter().any(|p| p.is_detectable(levels))
    }

    #[must_use]
    pub fn is_gametocytaemic(&self) -> bool {
        self.parasites.iter().any(ClonalParasitePopulation::is_gametocytaemic)
    }

    /// Highest log10 density across clones, or the zero sentinel.
    #[must_use]
    pub fn max_log10_density(&self) -> f64 {
        self.parasites
            .iter()
            .map(|p| p.last_update_log10_parasite_density)
            .fold(LOG_ZERO_PARASITE_DENSITY, f64::max)
    }

    /// Sample a gametocytaemic clone's genotype uniformly.
    pub fn sample_gametocyte_genotype(&self, random: &mut Random) -> Option<usize> {
        let candidates: Vec<usize> = self
            .parasites
            .iter()
            .filter(|p| p.is_gametocytaemic())
            .map(|p| p.genotype_id)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[random.random_uniform(candidates.len())])
    }

    /// Sample up to two distinct gametocytaemic genotypes from this host.
    pub fn sample_gametocyte_pair(&self, random: &mut Random) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .parasites
            .iter()
            .filter(|p| p.is_gametocytaemic())
            .map(|p| p.genotype_id)
            .collect();
        candidates.dedup();
        match candidates.len() {
            0 => Vec::new(),
            1 => candidates,
            _ => {
                let first = random.random_uniform(candidates.len());
                let mut second = random.random_uniform(candidates.len() - 1);
                if second >= first {
                    second += 1;
                }
                vec![candidates[first], candidates[second]]
            }
        }
    }

    pub fn change_all_update_functions(&mut self, from: ParasiteUpdateFn, to: ParasiteUpdateFn) {
        for parasite in &mut self.parasites {
            if parasite.update_fn == from {
                parasite.update_fn = to;
            }
        }
    }
}

/// Host-to-mosquito infectivity at a given log10 density.
#[must_use]
pub fn relative_infectivity(log10_density: f64, sigma: f64, ro_star: f64, random: &Random) -> f64 {
    if log10_density <= LOG_ZERO_PARASITE_DENSITY {
        return 0.0;
    }
    let d_n = log10_density * sigma + ro_star;
    let p = random.cdf_standard_normal(d_n);
    p * p + 0.01
}
