//! Locations and distances.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine great-circle distance in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let p = std::f64::consts::PI / 180.0;
        let d_lat = p * (self.latitude - other.latitude);
        let d_lon = p * (self.longitude - other.longitude);
        let a = (d_lat / 2.0).sin().powi(2)
            + (self.latitude * p).cos() * (other.latitude * p).cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// One population cell. The coordinate and grid position are fixed at load
/// time; beta, treatment access and the mosquito parameters change through
/// population events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: usize,
    pub coordinate: Coordinate,
    /// Grid position when loaded from rasters.
    pub row: usize,
    pub col: usize,
    pub population_size: usize,
    pub beta: f64,
    pub p_treatment_under_5: f64,
    pub p_treatment_over_5: f64,
    pub mosquito_size: usize,
    pub mosquito_interrupted_feeding_rate: f64,
    /// Weights over the initial age buckets used when seeding the population.
    pub age_distribution: Vec<f64>,
}

impl Location {
    #[must_use]
    pub fn new(id: usize, latitude: f64, longitude: f64, population_size: usize) -> Self {
        Self {
            id,
            coordinate: Coordinate::new(latitude, longitude),
            row: 0,
            col: 0,
            population_size,
            beta: 0.0,
            p_treatment_under_5: 0.0,
            p_treatment_over_5: 0.0,
            mosquito_size: 100,
            mosquito_interrupted_feeding_rate: 0.19,
            age_distribution: Vec::new(),
        }
    }
}

/// Pairwise distances between locations, precomputed once at startup.
#[derive(Debug, Clone, Default)]
pub struct DistanceMatrix {
    pub values: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Great-circle distances from latitude/longitude pairs.
    #[must_use]
    pub fn from_coordinates(locations: &[Location]) -> Self {
        let values = locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| from.coordinate.distance_km(&to.coordinate))
                    .collect()
            })
            .collect();
        Self { values }
    }

    /// Euclidean distances over grid cells, scaled by the cell size in km.
    #[must_use]
    pub fn from_grid(locations: &[Location], cellsize_km: f64) -> Self {
        let values = locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| {
                        let dr = from.row as f64 - to.row as f64;
                        let dc = from.col as f64 - to.col as f64;
                        cellsize_km * (dr * dr + dc * dc).sqrt()
                    })
                    .collect()
            })
            .collect();
        Self { values }
    }

    #[must_use]
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.values[from][to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_known_distance() {
        // Hanoi to Ho Chi Minh City, roughly 1150 km.
        let hanoi = Coordinate::new(21.0285, 105.8542);
        let hcmc = Coordinate::new(10.8231, 106.6297);
        let d = hanoi.distance_km(&hcmc);
        assert!((1100.0..1200.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn test_zero_distance_to_self() {
        let c = Coordinate::new(12.0, 104.0);
        assert_relative_eq!(c.distance_km(&c), 0.0);
    }

    #[test]
    fn test_grid_distances() {
        let mut a = Location::new(0, 0.0, 0.0, 10);
        let mut b = Location::new(1, 0.0, 0.0, 10);
        a.row = 0;
        a.col = 0;
        b.row = 3;
        b.col = 4;
        let matrix = DistanceMatrix::from_grid(&[a, b], 5.0);
        assert_relative_eq!(matrix.distance(0, 1), 25.0);
        assert_relative_eq!(matrix.distance(0, 0), 0.0);
    }
}
