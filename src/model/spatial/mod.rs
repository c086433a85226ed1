pub mod admin;
pub mod kernel;
pub mod location;

pub use admin::{AdminBoundary, AdminLevels};
pub use kernel::{normalise_travel_surface, MovementKernel, MovementModel};
pub use location::{Coordinate, DistanceMatrix, Location};
