//! Drug pharmacokinetics and pharmacodynamics.
//!
//! `DrugType` is the static pharmacology read from configuration;
//! `DrugInBlood` is one course of that drug inside a host. Concentration ramps
//! up over the dosing days and then decays by the half-life; a drug below its
//! cutoff is removed and its killing contribution disappears.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::random::Random;

fn default_cutoff() -> f64 {
    0.1
}

fn default_hill() -> f64 {
    25.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugType {
    pub name: String,
    /// Elimination half-life in days.
    pub half_life: f64,
    /// Maximum fraction of parasites killed per day at saturating
    /// concentration.
    pub maximum_parasite_killing_rate: f64,
    /// Hill slope of the concentration-effect curve.
    #[serde(default = "default_hill")]
    pub n: f64,
    /// EC50 of the fully sensitive genotype; allele multipliers scale it.
    pub base_ec50: f64,
    /// Mean starting concentration by age class (relative units, 1.0 = adult
    /// reference dose).
    pub age_specific_drug_absorption: Vec<f64>,
    /// Standard deviation of the starting concentration by age class.
    pub age_specific_drug_concentration_sd: Vec<f64>,
    /// Concentration below which the drug is cleared from the blood.
    #[serde(default = "default_cutoff")]
    pub cut_off_value: f64,
}

impl DrugType {
    /// Days from first dose until activity is negligible: the dosing window
    /// plus seven half-lives.
    #[must_use]
    pub fn total_duration_of_activity(&self, dosing_days: i32) -> i32 {
        dosing_days + (7.0 * self.half_life).ceil() as i32
    }

    /// Fraction of parasites killed per day at `concentration` against a
    /// genotype with the given EC50^n.
    #[must_use]
    pub fn parasite_killing_rate(&self, concentration: f64, ec50_power_n: f64) -> f64 {
        if concentration <= 0.0 {
            return 0.0;
        }
        let c_n = concentration.powf(self.n);
        self.maximum_parasite_killing_rate * c_n / (c_n + ec50_power_n)
    }

    pub fn absorption_for_age_class(&self, age_class: usize) -> (f64, f64) {
        let idx = age_class.min(self.age_specific_drug_absorption.len().saturating_sub(1));
        let sd_idx = age_class.min(
            self.age_specific_drug_concentration_sd
                .len()
                .saturating_sub(1),
        );
        (
            self.age_specific_drug_absorption[idx],
            self.age_specific_drug_concentration_sd[sd_idx],
        )
    }
}

/// One course of one drug inside a host.
#[derive(Debug, Clone)]
pub struct DrugInBlood {
    pub drug_type_id: usize,
    pub starting_value: f64,
    pub last_update_value: f64,
    pub last_update_time: i32,
    pub dosing_days: i32,
    pub start_time: i32,
    pub end_time: i32,
}

impl DrugInBlood {
    /// Concentration at `time`: linear ramp to the starting value across the
    /// dosing days, then exponential decay by the half-life.
    #[must_use]
    pub fn concentration_at(&self, time: i32, drug_type: &DrugType) -> f64 {
        let days = time - self.start_time;
        if days <= 0 {
            return 0.0;
        }
        if days <= self.dosing_days {
            return self.starting_value * f64::from(days) / f64::from(self.dosing_days.max(1));
        }
        let decay_days = f64::from(days - self.dosing_days);
        self.starting_value * (-decay_days * std::f64::consts::LN_2 / drug_type.half_life).exp()
    }

    pub fn update(&mut self, time: i32, drug_type: &DrugType) {
        self.last_update_value = self.concentration_at(time, drug_type);
        self.last_update_time = time;
    }
}

/// The set of drug courses currently in a host's blood, at most one per drug
/// type.
#[derive(Debug, Clone, Default)]
pub struct DrugsInBlood {
    drugs: BTreeMap<usize, DrugInBlood>,
}

impl DrugsInBlood {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    #[must_use]
    pub fn get(&self, drug_type_id: usize) -> Option<&DrugInBlood> {
        self.drugs.get(&drug_type_id)
    }

    #[must_use]
    pub fn contains(&self, drug_type_id: usize) -> bool {
        self.drugs.contains_key(&drug_type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrugInBlood> {
        self.drugs.values()
    }

    /// Insert or replace the course for this drug type, keeping the highest
    /// last-update value so a fresh dose never erases residual concentration.
    pub fn add(&mut self, drug: DrugInBlood) {
        match self.drugs.get_mut(&drug.drug_type_id) {
            Some(existing) => {
                let residual = existing.last_update_value;
                *existing = drug;
                existing.last_update_value = existing.last_update_value.max(residual);
            }
            None => {
                self.drugs.insert(drug.drug_type_id, drug);
            }
        }
    }

    pub fn update(&mut self, time: i32, drug_db: &[DrugType]) {
        for drug in self.drugs.values_mut() {
            drug.update(time, &drug_db[drug.drug_type_id]);
        }
    }

    /// Drop every course whose concentration fell below its type cutoff.
    pub fn clear_cut_off_drugs(&mut self, drug_db: &[DrugType]) {
        self.drugs
            .retain(|id, drug| drug.last_update_value >= drug_db[*id].cut_off_value);
    }

    pub fn clear(&mut self) {
        self.drugs.clear();
    }

    /// Daily fraction of a genotype surviving every active course. The
    /// combined kill is the sum of the per-drug killing rates, clamped to
    /// [0, 1].
    #[must_use]
    pub fn survival_fraction(&self, drug_db: &[DrugType], ec50_power_n: &[f64]) -> f64 {
        let mut total_kill = 0.0;
        for drug in self.drugs.values() {
            let drug_type = &drug_db[drug.drug_type_id];
            total_kill += drug_type
                .parasite_killing_rate(drug.last_update_value, ec50_power_n[drug.drug_type_id]);
        }
        1.0 - total_kill.clamp(0.0, 1.0)
    }
}

/// Draw the starting blood level of a new course for a host in `age_class`.
pub fn draw_starting_value(
    drug_type: &DrugType,
    age_class: usize,
    random: &mut Random,
) -> f64 {
    let (mean, sd) = drug_type.absorption_for_age_class(age_class);
    random.random_normal_truncated(mean, sd).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn artemisinin() -> DrugType {
        DrugType {
            name: "artemisinin".to_string(),
            half_life: 2.0,
            maximum_parasite_killing_rate: 0.999,
            n: 25.0,
            base_ec50: 0.75,
            age_specific_drug_absorption: vec![1.0; 8],
            age_specific_drug_concentration_sd: vec![0.1; 8],
            cut_off_value: 0.1,
        }
    }

    fn course(start: i32, dosing_days: i32) -> DrugInBlood {
        DrugInBlood {
            drug_type_id: 0,
            starting_value: 1.0,
            last_update_value: 0.0,
            last_update_time: start,
            dosing_days,
            start_time: start,
            end_time: start + 17,
        }
    }

    #[test]
    fn test_concentration_ramps_then_decays() {
        let dt = artemisinin();
        let drug = course(0, 3);
        assert_relative_eq!(drug.concentration_at(0, &dt), 0.0);
        assert_relative_eq!(drug.concentration_at(1, &dt), 1.0 / 3.0);
        assert_relative_eq!(drug.concentration_at(3, &dt), 1.0);
        // one half-life after the dosing window
        assert_relative_eq!(drug.concentration_at(5, &dt), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cut_off_clearance() {
        let db = vec![artemisinin()];
        let mut drugs = DrugsInBlood::default();
        drugs.add(course(0, 3));
        drugs.update(3, &db);
        drugs.clear_cut_off_drugs(&db);
        assert_eq!(drugs.len(), 1);
        // ~10 half-lives later the course is gone
        drugs.update(26, &db);
        drugs.clear_cut_off_drugs(&db);
        assert!(drugs.is_empty());
    }

    #[test]
    fn test_killing_rate_sigmoid() {
        let dt = artemisinin();
        let ec50_power_n = dt.base_ec50.powf(dt.n);
        // At EC50 the rate is half-maximal.
        let at_ec50 = dt.parasite_killing_rate(dt.base_ec50, ec50_power_n);
        assert_relative_eq!(at_ec50, dt.maximum_parasite_killing_rate / 2.0, epsilon = 1e-9);
        // Far above EC50 it approaches the maximum.
        let saturated = dt.parasite_killing_rate(2.0, ec50_power_n);
        assert!(saturated > 0.99 * dt.maximum_parasite_killing_rate);
        assert_eq!(dt.parasite_killing_rate(0.0, ec50_power_n), 0.0);
    }

    #[test]
    fn test_survival_fraction_sums_killing_rates() {
        let mut slow = artemisinin();
        slow.name = "piperaquine".to_string();
        slow.maximum_parasite_killing_rate = 0.9;
        let db = vec![artemisinin(), slow];
        let ec50 = vec![db[0].base_ec50.powf(db[0].n), db[1].base_ec50.powf(db[1].n)];

        // At EC50 each drug kills half its maximum; the kills add up.
        let mut drugs = DrugsInBlood::default();
        let mut first = course(0, 1);
        first.last_update_value = db[0].base_ec50;
        let mut second = course(0, 1);
        second.drug_type_id = 1;
        second.last_update_value = db[1].base_ec50;
        drugs.add(first);
        drugs.add(second);
        let survival = drugs.survival_fraction(&db, &ec50);
        assert_relative_eq!(survival, 1.0 - (0.999 + 0.9) / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_survival_fraction_clamps_at_total_kill() {
        let mut slow = artemisinin();
        slow.name = "piperaquine".to_string();
        slow.maximum_parasite_killing_rate = 0.9;
        let db = vec![artemisinin(), slow];
        let ec50 = vec![db[0].base_ec50.powf(db[0].n), db[1].base_ec50.powf(db[1].n)];

        // Two saturating courses sum past 1.0 and clamp to a full kill.
        let mut drugs = DrugsInBlood::default();
        let mut first = course(0, 1);
        first.last_update_value = 2.0;
        let mut second = course(0, 1);
        second.drug_type_id = 1;
        second.last_update_value = 2.0;
        drugs.add(first);
        drugs.add(second);
        assert_eq!(drugs.survival_fraction(&db, &ec50), 0.0);
    }
}
