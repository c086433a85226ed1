//! Administrative-unit indexing.
//!
//! Each named level partitions the location set into units; source data may be
//! 0- or 1-based. The `district` level backs district-scoped features
//! (district MFT, district importation, mutant introduction).

use std::collections::BTreeMap;

use crate::model::error::{Result, SimError};

/// One named partitioning of the location set.
#[derive(Debug, Clone)]
pub struct AdminBoundary {
    pub name: String,
    /// location id -> unit id
    location_to_unit: Vec<i32>,
    /// unit id -> ordered location ids
    unit_to_locations: BTreeMap<i32, Vec<usize>>,
    pub min_unit_id: i32,
    pub max_unit_id: i32,
}

impl AdminBoundary {
    /// Build from a per-location unit-id vector. The vector must cover every
    /// location exactly once.
    pub fn new(name: &str, unit_by_location: Vec<i32>) -> Result<Self> {
        if unit_by_location.is_empty() {
            return Err(SimError::config(format!(
                "administrative level '{name}' covers no locations"
            )));
        }
        let mut unit_to_locations: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (loc, &unit) in unit_by_location.iter().enumerate() {
            if unit < 0 {
                return Err(SimError::config(format!(
                    "administrative level '{name}' has negative unit id {unit} at location {loc}"
                )));
            }
            unit_to_locations.entry(unit).or_default().push(loc);
        }
        let min_unit_id = *unit_to_locations.keys().next().expect("non-empty");
        let max_unit_id = *unit_to_locations.keys().last().expect("non-empty");
        if min_unit_id > 1 {
            return Err(SimError::config(format!(
                "administrative level '{name}' must be 0- or 1-based, first unit id is {min_unit_id}"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            location_to_unit: unit_by_location,
            unit_to_locations,
            min_unit_id,
            max_unit_id,
        })
    }

    #[must_use]
    pub fn unit_of(&self, location: usize) -> i32 {
        self.location_to_unit[location]
    }

    #[must_use]
    pub fn locations_in(&self, unit: i32) -> &[usize] {
        self.unit_to_locations
            .get(&unit)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.unit_to_locations.len()
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.unit_to_locations.keys().copied()
    }
}

/// Registry of administrative levels by name.
#[derive(Debug, Clone, Default)]
pub struct AdminLevels {
    levels: Vec<AdminBoundary>,
}

impl AdminLevels {
    pub fn register(&mut self, boundary: AdminBoundary) -> Result<()> {
        if self.get(&boundary.name).is_some() {
            return Err(SimError::config(format!(
                "administrative level '{}' registered twice",
                boundary.name
            )));
        }
        self.levels.push(boundary);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AdminBoundary> {
        self.levels.iter().find(|b| b.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&AdminBoundary> {
        self.get(name)
            .ok_or_else(|| SimError::config(format!("administrative level '{name}' not configured")))
    }

    #[must_use]
    pub fn district(&self) -> Option<&AdminBoundary> {
        self.get("district")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_covers_every_location_once() {
        let boundary = AdminBoundary::new("district", vec![1, 1, 2, 2, 2]).unwrap();
        assert_eq!(boundary.unit_count(), 2);
        assert_eq!(boundary.min_unit_id, 1);
        assert_eq!(boundary.max_unit_id, 2);
        assert_eq!(boundary.unit_of(0), 1);
        assert_eq!(boundary.locations_in(2), &[2, 3, 4]);
        let total: usize = boundary.unit_ids().map(|u| boundary.locations_in(u).len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_zero_based_accepted() {
        let boundary = AdminBoundary::new("province", vec![0, 0, 1]).unwrap();
        assert_eq!(boundary.min_unit_id, 0);
    }

    #[test]
    fn test_unknown_unit_is_empty() {
        let boundary = AdminBoundary::new("district", vec![0, 1]).unwrap();
        assert!(boundary.locations_in(7).is_empty());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let mut levels = AdminLevels::default();
        levels
            .register(AdminBoundary::new("district", vec![0]).unwrap())
            .unwrap();
        assert!(levels
            .register(AdminBoundary::new("district", vec![0]).unwrap())
            .is_err());
    }
}
