//! Individual-based malaria transmission and drug-resistance evolution
//! model.
//!
//! The engine advances a population of humans, their within-host parasite
//! populations and drug concentrations through discrete daily time steps,
//! drives transmission via a spatially distributed biting process, and
//! applies configurable treatment strategies. Single-threaded and
//! deterministic for a fixed seed.

pub mod model;

pub use model::config::Config;
pub use model::error::{Result, SimError};
pub use model::simulation::Simulation;
