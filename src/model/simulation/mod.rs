//! The simulation root: owns every subsystem and drives the daily loop.
//!
//! Constructed once at startup from a validated configuration and torn down
//! at shutdown; subsystems borrow it, nothing is a global.

use crate::model::collector::ModelDataCollector;
use crate::model::config::Config;
use crate::model::coverage::TreatmentCoverageModel;
use crate::model::error::Result;
use crate::model::genotype::GenotypeDb;
use crate::model::population::Population;
use crate::model::random::Random;
use crate::model::reporter::Reporter;
use crate::model::scheduler::Scheduler;
use crate::model::seasonality::Seasonality;
use crate::model::spatial::{AdminLevels, Location, MovementModel};
use crate::model::strategy::StrategyDb;
use crate::model::transmission::Mosquito;

pub mod init;
pub mod update;

pub struct Simulation {
    pub config: Config,
    pub random: Random,
    pub scheduler: Scheduler,
    pub genotype_db: GenotypeDb,
    pub locations: Vec<Location>,
    pub admin: AdminLevels,
    pub seasonality: Seasonality,
    pub movement_model: MovementModel,
    pub strategies: StrategyDb,
    pub coverage: TreatmentCoverageModel,
    pub mosquito: Mosquito,
    pub population: Population,
    pub mdc: ModelDataCollector,
    pub reporters: Vec<Box<dyn Reporter>>,
}

impl Simulation {
    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    /// Run day steps until the ending date.
    pub fn run(&mut self) -> Result<()> {
        let mut reporters = std::mem::take(&mut self.reporters);
        for reporter in &mut reporters {
            reporter.before_run(self);
        }
        self.reporters = reporters;

        while !self.scheduler.is_done() {
            self.perform_daily_update();
            self.scheduler.advance();
        }

        let mut reporters = std::mem::take(&mut self.reporters);
        for reporter in &mut reporters {
            reporter.after_run(self);
        }
        self.reporters = reporters;
        Ok(())
    }
}
