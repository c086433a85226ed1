//! Event types and execution.
//!
//! Two families: person events execute against their owning person and die
//! with them; world events are queued on the scheduler and mutate global
//! state. Cancellation is a flag on the queue entry, not a type property.

pub mod person;
pub mod queue;
pub mod world;

pub use person::{execute_person_event, PersonEventKind};
pub use world::WorldEvent;

use chrono::NaiveDate;

use crate::model::collector::ModelDataCollector;
use crate::model::config::Config;
use crate::model::coverage::TreatmentCoverageModel;
use crate::model::genotype::GenotypeDb;
use crate::model::random::Random;
use crate::model::spatial::AdminLevels;
use crate::model::strategy::StrategyDb;

/// Everything a person event may touch besides its owning person. Person
/// events never reach other persons; cross-person effects belong to world
/// events.
pub struct EventContext<'a> {
    pub config: &'a Config,
    pub random: &'a mut Random,
    pub genotype_db: &'a GenotypeDb,
    pub strategies: &'a StrategyDb,
    pub coverage: &'a TreatmentCoverageModel,
    pub admin: &'a AdminLevels,
    pub mdc: &'a mut ModelDataCollector,
    pub current_time: i32,
    pub calendar_date: NaiveDate,
    pub end_time: i32,
}
