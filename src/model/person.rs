//! A simulated human host.
//!
//! Each person owns their immune state, blood-stage clones, drug courses and
//! a private event queue; cancelling everything on death stays O(own queue)
//! instead of O(world queue).

use uuid::Uuid;

use crate::model::config::Config;
use crate::model::drug::{self, DrugInBlood};
use crate::model::drug::DrugsInBlood;
use crate::model::error::Result;
use crate::model::events::queue::EventQueue;
use crate::model::events::PersonEventKind;
use crate::model::genotype::GenotypeDb;
use crate::model::immunity::{ImmuneComponent, ImmuneSystem};
use crate::model::parasite::{ClonalParasitePopulations, LOG_ZERO_PARASITE_DENSITY};
use crate::model::random::Random;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HostState {
    Susceptible,
    Exposed,
    Asymptomatic,
    Clinical,
    Dead,
}

#[derive(Debug)]
pub struct Person {
    pub id: Uuid,
    pub residence_location: usize,
    pub location: usize,
    pub age: i32,
    /// Simulation day of birth; negative for people born before day 0.
    pub birthday: i32,
    pub age_class: usize,
    pub host_state: HostState,
    pub moving_level: usize,
    pub innate_relative_biting_rate: f64,
    pub current_relative_biting_rate: f64,
    pub latest_update_time: i32,
    pub immune_system: ImmuneSystem,
    pub parasites: ClonalParasitePopulations,
    pub drugs_in_blood: DrugsInBlood,
    pub events: EventQueue<PersonEventKind>,
    /// At most one pre-blood infection pending in the liver.
    pub liver_parasite_genotype: Option<usize>,
    pub today_infections: Vec<usize>,
    pub today_target_locations: Vec<usize>,
    /// Starting blood levels recorded per drug for a multi-course regimen.
    pub starting_drug_values_for_mac: std::collections::BTreeMap<usize, f64>,
    pub last_therapy_id: Option<usize>,
    pub number_of_times_bitten: u32,
    pub number_of_trips_taken: u32,
    /// Drawn lazily per MDA age bracket.
    pub prob_present_at_mda_by_age: Vec<f64>,
}

impl Person {
    #[must_use]
    pub fn new(id: Uuid, location: usize, age: i32, birthday: i32, age_class: usize) -> Self {
        let component = if age < 1 {
            ImmuneComponent::Infant
        } else {
            ImmuneComponent::NonInfant
        };
        Self {
            id,
            residence_location: location,
            location,
            age,
            birthday,
            age_class,
            host_state: HostState::Susceptible,
            moving_level: 0,
            innate_relative_biting_rate: 1.0,
            current_relative_biting_rate: 1.0,
            latest_update_time: -1,
            immune_system: ImmuneSystem::new(component),
            parasites: ClonalParasitePopulations::default(),
            drugs_in_blood: DrugsInBlood::default(),
            events: EventQueue::default(),
            liver_parasite_genotype: None,
            today_infections: Vec::new(),
            today_target_locations: Vec::new(),
            starting_drug_values_for_mac: std::collections::BTreeMap::new(),
            last_therapy_id: None,
            number_of_times_bitten: 0,
            number_of_trips_taken: 0,
            prob_present_at_mda_by_age: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.host_state != HostState::Dead
    }

    #[must_use]
    pub fn is_under_five(&self) -> bool {
        self.age <= 5
    }

    /// Schedule a person event, logging and dropping out-of-range times.
    pub fn schedule_event(
        &mut self,
        time: i32,
        kind: PersonEventKind,
        current_time: i32,
        end_time: i32,
    ) {
        let name = kind.name();
        if let Err(e) = self.events.schedule(time, kind, current_time, end_time, name) {
            if time > end_time {
                // Routine near the end of the simulation.
                tracing::debug!(person = %self.id, error = %e, "dropping event");
            } else {
                tracing::error!(person = %self.id, error = %e, "dropping event");
            }
        }
    }

    pub fn increase_age_by_one_year(&mut self, config: &Config) {
        self.age += 1;
        // Advances at most one class per birthday.
        let ladder = &config.population_demographic.age_structure;
        if self.age_class < ladder.len() - 1 && self.age >= ladder[self.age_class] {
            self.age_class += 1;
        }
    }

    /// Lazy within-host update: parasite densities, drug concentrations, drug
    /// killing, immunity and current state. A no-op when already updated at
    /// `current_time`.
    pub fn update(&mut self, current_time: i32, config: &Config, genotype_db: &GenotypeDb) {
        debug_assert!(self.host_state != HostState::Dead);
        if self.latest_update_time == current_time {
            return;
        }
        let days = if self.latest_update_time < 0 {
            0
        } else {
            current_time - self.latest_update_time
        };

        let levels = &config.parasite_parameters.parasite_density_levels;
        let immune_params = &config.immune_system_parameters;
        let drug_db = &config.drug_parameters.drug_db;

        self.parasites
            .update(days, &self.immune_system, genotype_db, levels, immune_params);
        self.drugs_in_blood.update(current_time, drug_db);
        self.parasites
            .update_by_drugs(days, &self.drugs_in_blood, drug_db, genotype_db, levels);
        self.immune_system.update(days, self.age, immune_params);

        // Clear cleared drugs and cured clones, then settle the host state.
        self.drugs_in_blood.clear_cut_off_drugs(drug_db);
        self.parasites.clear_cured_parasites(levels);
        if self.parasites.is_empty() {
            self.change_state_when_no_parasite_in_blood();
        } else {
            self.immune_system.increase = true;
        }

        self.update_relative_biting_rate(current_time, config);
        self.latest_update_time = current_time;
    }

    pub fn change_state_when_no_parasite_in_blood(&mut self) {
        if self.parasites.is_empty() && self.host_state != HostState::Dead {
            self.host_state = if self.liver_parasite_genotype.is_none() {
                HostState::Susceptible
            } else {
                HostState::Exposed
            };
            self.immune_system.increase = false;
        }
    }

    /// Transition to Dead: clears parasites and drugs, cancels every queued
    /// event. The caller records the death with the data collector.
    pub fn die(&mut self) {
        self.host_state = HostState::Dead;
        self.parasites.clear();
        self.liver_parasite_genotype = None;
        self.drugs_in_blood.clear();
        self.today_infections.clear();
        self.today_target_locations.clear();
        self.events.cancel_all();
    }

    pub fn update_relative_biting_rate(&mut self, current_time: i32, config: &Config) {
        let info = &config.epidemiological_parameters.relative_biting_info;
        self.current_relative_biting_rate = if info.using_age_dependent_biting_level {
            self.innate_relative_biting_rate * self.age_dependent_biting_factor(current_time)
        } else {
            self.innate_relative_biting_rate
        };
    }

    /// Body-surface proxy for mosquito exposure by age.
    #[must_use]
    pub fn age_dependent_biting_factor(&self, current_time: i32) -> f64 {
        if self.age < 1 {
            let fraction =
                ((current_time - self.birthday).rem_euclid(365)) as f64 / 365.0;
            if fraction < 0.25 {
                return 0.106;
            }
            if fraction < 0.5 {
                return 0.13;
            }
            if fraction < 0.75 {
                return 0.1463;
            }
            return 0.1545;
        }
        match self.age {
            1 => 0.1789,
            2 => 0.2195,
            3 => 0.2520,
            4..=19 => (17.5 + f64::from(self.age - 4) * 2.75) / 61.5,
            _ => 1.0,
        }
    }

    /// Innate biting rate: clamped gamma draw plus the configured floor.
    pub fn draw_random_relative_biting_rate(random: &mut Random, config: &Config) -> f64 {
        let info = &config.epidemiological_parameters.relative_biting_info;
        let span = info.max_relative_biting_value - info.min_relative_biting_value;
        let mut result = random.random_gamma(info.gamma_a, info.gamma_b);
        while result > span {
            result = random.random_gamma(info.gamma_a, info.gamma_b);
        }
        result + info.min_relative_biting_value
    }

    #[must_use]
    pub fn has_detectable_parasite(&self, config: &Config) -> bool {
        self.parasites
            .has_detectable_parasite(&config.parasite_parameters.parasite_density_levels)
    }

    #[must_use]
    pub fn is_gametocytaemic(&self) -> bool {
        self.parasites.is_gametocytaemic()
    }

    /// Host-to-mosquito infectivity of the densest clone.
    #[must_use]
    pub fn relative_infectivity(&self, config: &Config, random: &Random) -> f64 {
        let info = &config.epidemiological_parameters.relative_infectivity;
        let density = self.parasites.max_log10_density();
        if density <= LOG_ZERO_PARASITE_DENSITY {
            return 0.0;
        }
        crate::model::parasite::relative_infectivity(density, info.sigma, info.ro_star, random)
    }

    /// Chance that an infectious bite takes, declining with immunity.
    #[must_use]
    pub fn p_infection_from_an_infectious_bite(&self) -> f64 {
        (1.0 - self.immune_system.latest_value()) / 8.333 + 0.04
    }

    #[must_use]
    pub fn clinical_progression_probability(&self, config: &Config) -> f64 {
        self.immune_system
            .clinical_progression_probability(&config.immune_system_parameters)
    }

    pub fn will_progress_to_death_when_receive_no_treatment(
        &self,
        random: &mut Random,
        config: &Config,
    ) -> bool {
        let p = random.random_flat(0.0, 1.0);
        p <= config.population_demographic.mortality_when_treatment_fail_by_age_class
            [self.age_class]
    }

    pub fn will_progress_to_death_when_receive_treatment(
        &self,
        random: &mut Random,
        config: &Config,
    ) -> bool {
        // 90% lower than without treatment.
        let p = random.random_flat(0.0, 1.0);
        p <= config.population_demographic.mortality_when_treatment_fail_by_age_class
            [self.age_class]
            * 0.1
    }

    /// Register an infectious bite outcome; the winning genotype is resolved
    /// once per day by `randomly_choose_parasite`.
    pub fn push_today_infection(&mut self, genotype_id: usize) {
        self.today_infections.push(genotype_id);
    }

    /// Pick one of today's pending infection genotypes uniformly and try to
    /// seed the liver with it.
    pub fn randomly_choose_parasite(
        &mut self,
        current_time: i32,
        end_time: i32,
        random: &mut Random,
    ) {
        if self.today_infections.is_empty() {
            return;
        }
        let genotype_id = if self.today_infections.len() == 1 {
            self.today_infections[0]
        } else {
            self.today_infections[random.random_uniform(self.today_infections.len())]
        };
        self.infected_by(genotype_id, current_time, end_time);
        self.today_infections.clear();
    }

    /// Seed the liver slot when it is free; the sporozoites move to the blood
    /// after seven days.
    pub fn infected_by(&mut self, genotype_id: usize, current_time: i32, end_time: i32) {
        const DAYS_IN_LIVER: i32 = 7;
        if self.liver_parasite_genotype.is_some() || self.host_state == HostState::Dead {
            return;
        }
        if self.host_state == HostState::Susceptible {
            self.host_state = HostState::Exposed;
        }
        self.liver_parasite_genotype = Some(genotype_id);
        self.schedule_event(
            current_time + DAYS_IN_LIVER,
            PersonEventKind::MoveParasiteToBlood { genotype_id },
            current_time,
            end_time,
        );
    }

    /// Add one drug course, reusing recorded starting levels inside a
    /// multi-course regimen so later components stay consistent.
    pub fn add_drug_to_blood(
        &mut self,
        drug_type_id: usize,
        dosing_days: i32,
        is_part_of_mac_therapy: bool,
        current_time: i32,
        config: &Config,
        random: &mut Random,
    ) {
        let drug_type = &config.drug_parameters.drug_db[drug_type_id];
        let mut drug_level = drug::draw_starting_value(drug_type, self.age_class, random);

        if is_part_of_mac_therapy {
            if let Some(existing) = self.drugs_in_blood.get(drug_type_id) {
                // Long half-life drugs still circulating keep their level.
                drug_level = existing.starting_value;
            } else if let Some(recorded) = self.starting_drug_values_for_mac.get(&drug_type_id) {
                // Short half-life drugs already cleared reuse the recorded
                // starting value.
                drug_level = *recorded;
            }
            self.starting_drug_values_for_mac
                .insert(drug_type_id, drug_level);
        }

        let last_update_value = self
            .drugs_in_blood
            .get(drug_type_id)
            .map_or(0.0, |d| d.last_update_value);

        self.drugs_in_blood.add(DrugInBlood {
            drug_type_id,
            starting_value: drug_level,
            last_update_value,
            last_update_time: current_time,
            dosing_days,
            start_time: current_time,
            end_time: current_time + drug_type.total_duration_of_activity(dosing_days),
        });
    }

    /// Lazily draw this person's present-at-MDA probabilities per bracket.
    pub fn prob_present_at_mda(&mut self, config: &Config, random: &mut Random) -> f64 {
        let mda = &config.strategy_parameters.mda;
        if self.prob_present_at_mda_by_age.is_empty() {
            for params in &mda.prob_individual_present_at_mda_distribution {
                self.prob_present_at_mda_by_age
                    .push(random.random_beta(params.alpha, params.beta));
            }
        }
        let mut bracket = 0;
        while bracket < mda.age_bracket_prob_individual_present_at_mda.len() - 1
            && self.age > mda.age_bracket_prob_individual_present_at_mda[bracket]
        {
            bracket += 1;
        }
        self.prob_present_at_mda_by_age[bracket]
    }

    #[must_use]
    pub fn has_return_to_residence_event(&self) -> bool {
        self.events
            .has_where(|k| matches!(k, PersonEventKind::ReturnToResidence))
    }

    pub fn cancel_all_return_to_residence_events(&mut self) {
        self.events
            .cancel_where(|k| matches!(k, PersonEventKind::ReturnToResidence));
    }

    pub fn cancel_all_other_progress_to_clinical_events(&mut self, keep_parasite_id: u32) {
        self.events.cancel_where(|k| match k {
            PersonEventKind::ProgressToClinical { parasite_id } => {
                *parasite_id != keep_parasite_id
            }
            _ => false,
        });
    }

    #[must_use]
    pub fn age_in_years_float(&self, current_time: i32) -> f64 {
        f64::from(current_time - self.birthday) / 365.0
    }
}

/// Validate the Dead-person invariant; used by tests and debug assertions.
pub fn dead_person_invariant_holds(person: &Person) -> Result<()> {
    if person.host_state == HostState::Dead {
        debug_assert!(person.parasites.is_empty());
        debug_assert!(person.drugs_in_blood.is_empty());
        debug_assert!(person.events.all_cancelled());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Person {
        Person::new(Uuid::nil(), 0, 20, -20 * 365, 5)
    }

    #[test]
    fn test_death_clears_everything() {
        let mut p = person();
        p.parasites.add(0, 3.0);
        p.liver_parasite_genotype = Some(0);
        p.schedule_event(10, PersonEventKind::Birthday, 0, 100);
        p.die();
        assert_eq!(p.host_state, HostState::Dead);
        assert!(p.parasites.is_empty());
        assert!(p.drugs_in_blood.is_empty());
        assert!(p.events.all_cancelled());
        dead_person_invariant_holds(&p).unwrap();
    }

    #[test]
    fn test_liver_slot_holds_one_genotype() {
        let mut p = person();
        p.infected_by(3, 0, 100);
        assert_eq!(p.host_state, HostState::Exposed);
        assert_eq!(p.liver_parasite_genotype, Some(3));
        // A second infection cannot displace the liver occupant.
        p.infected_by(9, 0, 100);
        assert_eq!(p.liver_parasite_genotype, Some(3));
    }

    #[test]
    fn test_empty_parasites_state_transitions() {
        let mut p = person();
        p.host_state = HostState::Asymptomatic;
        p.change_state_when_no_parasite_in_blood();
        assert_eq!(p.host_state, HostState::Susceptible);

        p.host_state = HostState::Asymptomatic;
        p.liver_parasite_genotype = Some(0);
        p.change_state_when_no_parasite_in_blood();
        assert_eq!(p.host_state, HostState::Exposed);
    }

    #[test]
    fn test_age_class_advances_one_step_per_birthday() {
        let config = Config::default();
        let mut p = Person::new(Uuid::nil(), 0, 0, 0, 0);
        p.increase_age_by_one_year(&config);
        assert_eq!(p.age, 1);
        assert_eq!(p.age_class, 1);
        p.increase_age_by_one_year(&config);
        assert_eq!(p.age_class, 1);
    }

    #[test]
    fn test_randomly_choose_parasite_clears_pending() {
        let mut random = Random::new(2);
        let mut p = person();
        p.push_today_infection(4);
        p.push_today_infection(6);
        p.randomly_choose_parasite(0, 100, &mut random);
        assert!(p.today_infections.is_empty());
        let chosen = p.liver_parasite_genotype.unwrap();
        assert!(chosen == 4 || chosen == 6);
    }

    #[test]
    fn test_mac_dose_levels_carry_over() {
        let mut config = Config::default();
        config.drug_parameters.drug_db.push(crate::model::drug::DrugType {
            name: "dha".to_string(),
            half_life: 1.0,
            maximum_parasite_killing_rate: 0.999,
            n: 25.0,
            base_ec50: 0.75,
            age_specific_drug_absorption: vec![1.0; 8],
            age_specific_drug_concentration_sd: vec![0.2; 8],
            cut_off_value: 0.1,
        });
        let mut random = Random::new(3);
        let mut p = person();
        p.add_drug_to_blood(0, 3, true, 0, &config, &mut random);
        let first_level = p.drugs_in_blood.get(0).unwrap().starting_value;
        // A later course in the same regimen reuses the recorded level even
        // after the blood cleared.
        p.drugs_in_blood.clear();
        p.add_drug_to_blood(0, 3, true, 10, &config, &mut random);
        let second_level = p.drugs_in_blood.get(0).unwrap().starting_value;
        assert_eq!(first_level, second_level);
    }

    #[test]
    fn test_p_infection_declines_with_immunity() {
        let mut p = person();
        let naive = p.p_infection_from_an_infectious_bite();
        p.immune_system.set_latest_value(0.9);
        assert!(p.p_infection_from_an_infectious_bite() < naive);
    }
}
