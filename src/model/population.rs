//! The person container: ownership, location indexes, event drains and the
//! end-of-day death sweep.

use chrono::NaiveDate;

use crate::model::config::Config;
use crate::model::events::{execute_person_event, EventContext, PersonEventKind};
use crate::model::person::{HostState, Person};
use crate::model::random::Random;
use crate::model::time;

pub struct Population {
    pub persons: Vec<Person>,
    /// Person indexes currently present at each location; rebuilt daily
    /// before the biting pass.
    presence_by_location: Vec<Vec<usize>>,
    number_of_locations: usize,
}

impl Population {
    #[must_use]
    pub fn new(persons: Vec<Person>, number_of_locations: usize) -> Self {
        let mut population = Self {
            persons,
            presence_by_location: vec![Vec::new(); number_of_locations],
            number_of_locations,
        };
        population.rebuild_presence_index();
        population
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    #[must_use]
    pub fn number_of_locations(&self) -> usize {
        self.number_of_locations
    }

    /// Residents per location (by residence, not presence); feeds the
    /// movement kernels.
    #[must_use]
    pub fn residents_by_location(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.number_of_locations];
        for person in &self.persons {
            if person.is_alive() {
                counts[person.residence_location] += 1;
            }
        }
        counts
    }

    /// Rebuild the presence index from current person locations. Movement
    /// events change locations during the event drain, so this runs before
    /// every biting pass.
    pub fn rebuild_presence_index(&mut self) {
        for bucket in &mut self.presence_by_location {
            bucket.clear();
        }
        for (idx, person) in self.persons.iter().enumerate() {
            if person.is_alive() {
                self.presence_by_location[person.location].push(idx);
            }
        }
    }

    #[must_use]
    pub fn present_at(&self, location: usize) -> &[usize] {
        &self.presence_by_location[location]
    }

    /// Drain every living person's queue up to the current day. Events that
    /// schedule same-day follow-ups on the same queue run in the same step.
    pub fn execute_person_events(&mut self, ctx: &mut EventContext) {
        for idx in 0..self.persons.len() {
            loop {
                if !self.persons[idx].is_alive() {
                    break;
                }
                let due = self.persons[idx].events.take_due(ctx.current_time);
                if due.is_empty() {
                    break;
                }
                for entry in due {
                    if !entry.executable || !self.persons[idx].is_alive() {
                        continue;
                    }
                    let name = entry.payload.name();
                    if let Err(e) = execute_person_event(entry.payload, &mut self.persons[idx], ctx)
                    {
                        tracing::error!(
                            event = name,
                            time = ctx.current_time,
                            person = %self.persons[idx].id,
                            error = %e,
                            "error in person event, skipping"
                        );
                    }
                }
            }
        }
    }

    /// Resolve today's pending infections for every living person.
    pub fn resolve_today_infections(
        &mut self,
        current_time: i32,
        end_time: i32,
        random: &mut Random,
    ) {
        for person in &mut self.persons {
            if person.is_alive() {
                person.randomly_choose_parasite(current_time, end_time, random);
            }
        }
    }

    /// Replace each dead person with a newborn at the same residence,
    /// keeping the population size constant. Returns the birth locations.
    pub fn sweep_dead(
        &mut self,
        current_time: i32,
        calendar_date: NaiveDate,
        end_time: i32,
        config: &Config,
        random: &mut Random,
    ) -> Vec<usize> {
        let mut birth_locations = Vec::new();
        for person in &mut self.persons {
            if person.host_state == HostState::Dead {
                let location = person.residence_location;
                *person = create_person(location, 0, current_time, calendar_date, end_time, config, random);
                birth_locations.push(location);
            }
        }
        if !birth_locations.is_empty() {
            self.rebuild_presence_index();
        }
        birth_locations
    }
}

/// Build a person of the given integer age with their recurring events
/// scheduled. The birthday offset within the year is randomised so the
/// population does not age in lockstep.
pub fn create_person(
    location: usize,
    age: i32,
    current_time: i32,
    calendar_date: NaiveDate,
    end_time: i32,
    config: &Config,
    random: &mut Random,
) -> Person {
    let days_since_birthday = if age == 0 && current_time >= 0 {
        0
    } else {
        random.random_uniform(365) as i32
    };
    let birthday = current_time - age * 365 - days_since_birthday;
    let age_class = config.population_demographic.age_class_of(age);

    let mut person = Person::new(random.uuid(), location, age, birthday, age_class);
    person.immune_system.draw_random_immune(random);
    person.innate_relative_biting_rate =
        Person::draw_random_relative_biting_rate(random, config);
    person.moving_level = random
        .sample_weighted(&config.movement_settings.moving_level_distribution)
        .unwrap_or(0);
    person.update_relative_biting_rate(current_time, config);
    person.latest_update_time = current_time;

    let next_birthday = current_time + (365 - days_since_birthday).max(1);
    person.schedule_event(
        next_birthday.min(end_time),
        PersonEventKind::Birthday,
        current_time,
        end_time,
    );
    if age < 1 {
        // Maternal immunity hands over at the first birthday.
        person.schedule_event(
            (current_time + time::days_to_next_year(calendar_date)).min(end_time),
            PersonEventKind::SwitchImmuneComponent,
            current_time,
            end_time,
        );
    }
    let k = config.epidemiological_parameters.update_frequency;
    let stagger = random.random_uniform(k.max(1) as usize) as i32 + 1;
    person.schedule_event(
        (current_time + stagger).min(end_time),
        PersonEventKind::UpdateEveryKDays,
        current_time,
        end_time,
    );
    person
}

/// Seed a blood-stage infection directly (initial cases and importations
/// bypass the liver stage).
pub fn infect_with_genotype(
    person: &mut Person,
    genotype_id: usize,
    log10_density: f64,
    current_time: i32,
    end_time: i32,
    config: &Config,
    random: &mut Random,
) {
    if !person.is_alive() {
        return;
    }
    let parasite_id = person.parasites.add(genotype_id, log10_density);
    if matches!(
        person.host_state,
        HostState::Susceptible | HostState::Exposed
    ) {
        person.host_state = HostState::Asymptomatic;
    }
    person.immune_system.increase = true;

    let epi = &config.epidemiological_parameters;
    let gametocyte_delay = if person.is_under_five() {
        epi.days_mature_gametocyte_under_five
    } else {
        epi.days_mature_gametocyte_over_five
    };
    person.schedule_event(
        current_time + gametocyte_delay,
        PersonEventKind::MatureGametocyte { parasite_id },
        current_time,
        end_time,
    );

    let p = random.random_flat(0.0, 1.0);
    if p <= person.clinical_progression_probability(config) {
        if let Some(parasite) = person.parasites.get_mut(parasite_id) {
            parasite.update_fn = crate::model::parasite::ParasiteUpdateFn::Progress;
        }
        let days_to_clinical = if person.is_under_five() {
            epi.days_to_clinical_under_five
        } else {
            epi.days_to_clinical_over_five
        };
        person.schedule_event(
            current_time + days_to_clinical,
            PersonEventKind::ProgressToClinical { parasite_id },
            current_time,
            end_time,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    #[test]
    fn test_presence_index_tracks_locations() {
        let config = Config::default();
        let mut random = Random::new(1);
        let persons = vec![
            create_person(0, 20, 0, calendar(), 1000, &config, &mut random),
            create_person(0, 30, 0, calendar(), 1000, &config, &mut random),
        ];
        let mut population = Population::new(persons, 2);
        assert_eq!(population.present_at(0).len(), 2);
        assert_eq!(population.present_at(1).len(), 0);

        population.persons[0].location = 1;
        population.rebuild_presence_index();
        assert_eq!(population.present_at(0).len(), 1);
        assert_eq!(population.present_at(1).len(), 1);
    }

    #[test]
    fn test_sweep_replaces_dead_with_newborns() {
        let config = Config::default();
        let mut random = Random::new(2);
        let persons = vec![create_person(0, 40, 0, calendar(), 10_000, &config, &mut random)];
        let mut population = Population::new(persons, 1);
        population.persons[0].die();
        let births = population.sweep_dead(100, calendar(), 10_000, &config, &mut random);
        assert_eq!(births, vec![0]);
        let newborn = &population.persons[0];
        assert_eq!(newborn.age, 0);
        assert_eq!(newborn.host_state, HostState::Susceptible);
        assert!(newborn.is_alive());
        assert_eq!(population.residents_by_location(), vec![1]);
    }

    #[test]
    fn test_new_person_has_recurring_events() {
        let config = Config::default();
        let mut random = Random::new(3);
        let infant = create_person(0, 0, 0, calendar(), 10_000, &config, &mut random);
        assert!(infant
            .events
            .has_where(|k| matches!(k, PersonEventKind::Birthday)));
        assert!(infant
            .events
            .has_where(|k| matches!(k, PersonEventKind::SwitchImmuneComponent)));
        assert!(infant
            .events
            .has_where(|k| matches!(k, PersonEventKind::UpdateEveryKDays)));

        let adult = create_person(0, 30, 0, calendar(), 10_000, &config, &mut random);
        assert!(!adult
            .events
            .has_where(|k| matches!(k, PersonEventKind::SwitchImmuneComponent)));
    }

    #[test]
    fn test_infect_with_genotype_seeds_blood_stage() {
        let config = Config::default();
        let mut random = Random::new(4);
        let mut person = create_person(0, 25, 0, calendar(), 10_000, &config, &mut random);
        infect_with_genotype(&mut person, 0, 3.0, 0, 10_000, &config, &mut random);
        assert_eq!(person.host_state, HostState::Asymptomatic);
        assert_eq!(person.parasites.len(), 1);
        assert!(person.immune_system.increase);
    }
}
