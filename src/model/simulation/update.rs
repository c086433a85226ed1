//! The daily step: world events, person events, movement, transmission,
//! infection resolution, the death sweep and the monthly hooks.

use crate::model::events::EventContext;
use crate::model::time;
use crate::model::transmission;

use super::Simulation;

impl Simulation {
    /// Process one simulation day. The caller advances the scheduler.
    pub fn perform_daily_update(&mut self) {
        self.begin_time_step();
        self.execute_world_events();
        self.execute_person_events();
        self.perform_circulation();
        self.perform_transmission();
        self.resolve_infections();
        self.end_time_step();
        if time::is_first_day_of_month(self.scheduler.calendar_date()) {
            self.perform_monthly_update();
        }
    }

    fn begin_time_step(&mut self) {
        self.mdc.begin_time_step();
        let mut reporters = std::mem::take(&mut self.reporters);
        for reporter in &mut reporters {
            reporter.begin_time_step(self);
        }
        self.reporters = reporters;
    }

    /// Drain world events due today; re-check so events scheduled by an
    /// executing event for the same day still run this step.
    fn execute_world_events(&mut self) {
        loop {
            let due = self.scheduler.take_due_world_events();
            if due.is_empty() {
                break;
            }
            for entry in due {
                if !entry.executable {
                    continue;
                }
                let name = entry.payload.name();
                if let Err(e) = entry.payload.execute(self) {
                    tracing::error!(
                        event = name,
                        time = self.scheduler.current_time(),
                        error = %e,
                        "error in world event, skipping"
                    );
                }
            }
        }
    }

    fn execute_person_events(&mut self) {
        let Simulation {
            config,
            random,
            scheduler,
            genotype_db,
            admin,
            strategies,
            coverage,
            population,
            mdc,
            ..
        } = self;
        let mut ctx = EventContext {
            config,
            random,
            genotype_db,
            strategies,
            coverage,
            admin,
            mdc,
            current_time: scheduler.current_time(),
            calendar_date: scheduler.calendar_date(),
            end_time: scheduler.total_time(),
        };
        population.execute_person_events(&mut ctx);
    }

    fn perform_circulation(&mut self) {
        transmission::perform_circulation(
            &mut self.population,
            &self.movement_model,
            &self.config,
            &mut self.random,
            self.scheduler.current_time(),
            self.scheduler.total_time(),
        );
    }

    fn perform_transmission(&mut self) {
        transmission::perform_daily_transmission(
            &mut self.population,
            &self.locations,
            &self.seasonality,
            &self.mosquito,
            &mut self.genotype_db,
            &mut self.mdc,
            &self.config,
            &mut self.random,
            self.scheduler.current_time(),
            self.scheduler.calendar_date(),
        );
    }

    fn resolve_infections(&mut self) {
        self.population.resolve_today_infections(
            self.scheduler.current_time(),
            self.scheduler.total_time(),
            &mut self.random,
        );
    }

    fn end_time_step(&mut self) {
        let current_time = self.scheduler.current_time();

        // Person-days accumulate per presence location.
        if self.mdc.is_collecting(current_time) {
            self.population.rebuild_presence_index();
            for location in 0..self.locations.len() {
                self.mdc
                    .record_person_days(location, self.population.present_at(location).len() as u64);
            }
        }

        let births = self.population.sweep_dead(
            current_time,
            self.scheduler.calendar_date(),
            self.scheduler.total_time(),
            &self.config,
            &mut self.random,
        );
        for location in births {
            self.mdc.record_1_birth(location);
        }

        self.strategies.update_end_of_time_step(current_time);
        self.mdc.end_of_time_step(current_time);
    }

    fn perform_monthly_update(&mut self) {
        let current_time = self.scheduler.current_time();
        self.coverage.monthly_update(current_time);
        self.strategies.monthly_update(current_time, &self.mdc);
        self.perform_population_statistics();

        let mut reporters = std::mem::take(&mut self.reporters);
        for reporter in &mut reporters {
            reporter.monthly_report(self);
        }
        self.reporters = reporters;

        self.mdc.monthly_reset();
    }

    /// Monthly population scan: blood-slide prevalence by location and age
    /// class plus genotype carrier counts.
    fn perform_population_statistics(&mut self) {
        let Simulation {
            config,
            scheduler,
            genotype_db,
            population,
            mdc,
            ..
        } = self;
        let current_time = scheduler.current_time();
        let levels = &config.parasite_parameters.parasite_density_levels;

        mdc.begin_monthly_snapshot(genotype_db.len());
        for person in &mut population.persons {
            if !person.is_alive() {
                continue;
            }
            person.update(current_time, config, genotype_db);
            let slide_positive = person.parasites.has_detectable_parasite(levels);
            mdc.record_blood_slide(person.location, person.age_class, slide_positive);
            if slide_positive {
                let mut seen: Vec<usize> = Vec::new();
                for parasite in person.parasites.iter() {
                    if parasite.is_detectable(levels) && !seen.contains(&parasite.genotype_id) {
                        seen.push(parasite.genotype_id);
                        mdc.record_genotype_carrier(parasite.genotype_id);
                    }
                }
            }
        }
    }
}
