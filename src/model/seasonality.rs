//! Per-location seasonal transmission factor.
//!
//! Chosen once from configuration; every variant returns a non-negative
//! multiplier applied to a location's biting rate on a given day.

use chrono::{Datelike, NaiveDate};

use crate::model::config::{SeasonalityMode, SeasonalitySettings};
use crate::model::error::{Result, SimError};
use crate::model::spatial::AdminLevels;
use crate::model::time::day_of_year;

#[derive(Debug, Clone)]
pub enum Seasonality {
    Disabled,
    Equation {
        /// Per-location coefficients resolved from the ecozone layer.
        base: Vec<f64>,
        a: Vec<f64>,
        b: Vec<f64>,
        phi: Vec<f64>,
        /// Reference coefficients per ecozone, kept for zone remapping.
        reference_base: Vec<f64>,
        reference_a: Vec<f64>,
        reference_b: Vec<f64>,
        reference_phi: Vec<f64>,
        zone_by_location: Vec<usize>,
    },
    Rainfall {
        adjustments: Vec<f64>,
    },
    Pattern {
        /// Admin unit id per location, already resolved.
        unit_by_location: Vec<i32>,
        min_unit_id: i32,
        adjustments_by_unit: Vec<Vec<f64>>,
        monthly: bool,
    },
}

impl Seasonality {
    pub fn from_config(
        settings: &SeasonalitySettings,
        number_of_locations: usize,
        ecozone_by_location: Option<&[usize]>,
        admin: &AdminLevels,
    ) -> Result<Self> {
        if !settings.enable {
            return Ok(Seasonality::Disabled);
        }
        match &settings.mode {
            SeasonalityMode::Disabled => Ok(Seasonality::Disabled),
            SeasonalityMode::Equation { base, a, b, phi } => {
                let zone_count = base.len();
                if zone_count == 0
                    || a.len() != zone_count
                    || b.len() != zone_count
                    || phi.len() != zone_count
                {
                    return Err(SimError::config(
                        "seasonal equation coefficient vectors must share one length per ecozone"
                            .to_string(),
                    ));
                }
                // Single-zone default when no ecozone layer is provided.
                let zone_by_location: Vec<usize> = match ecozone_by_location {
                    Some(zones) => zones.to_vec(),
                    None => vec![0; number_of_locations],
                };
                for &zone in &zone_by_location {
                    if zone >= zone_count {
                        return Err(SimError::config(format!(
                            "ecozone {zone} has no seasonal equation coefficients"
                        )));
                    }
                }
                let pick = |table: &[f64]| -> Vec<f64> {
                    zone_by_location.iter().map(|&z| table[z]).collect()
                };
                Ok(Seasonality::Equation {
                    base: pick(base),
                    a: pick(a),
                    b: pick(b),
                    phi: pick(phi),
                    reference_base: base.clone(),
                    reference_a: a.clone(),
                    reference_b: b.clone(),
                    reference_phi: phi.clone(),
                    zone_by_location,
                })
            }
            SeasonalityMode::Rainfall { adjustments } => Ok(Seasonality::Rainfall {
                adjustments: adjustments.clone(),
            }),
            SeasonalityMode::Pattern {
                admin_level,
                adjustments_by_unit,
            } => {
                let boundary = admin.require(admin_level)?;
                let period = adjustments_by_unit
                    .first()
                    .map(Vec::len)
                    .ok_or_else(|| SimError::config("empty seasonal pattern".to_string()))?;
                if period != 12 && period != 365 {
                    return Err(SimError::config(format!(
                        "seasonal pattern rows must hold 12 or 365 values, found {period}"
                    )));
                }
                for row in adjustments_by_unit {
                    if row.len() != period {
                        return Err(SimError::config(
                            "seasonal pattern rows have inconsistent lengths".to_string(),
                        ));
                    }
                    if row.iter().any(|v| *v < 0.0) {
                        return Err(SimError::domain(
                            "seasonal factor less than zero".to_string(),
                        ));
                    }
                }
                let expected = boundary.unit_count();
                if adjustments_by_unit.len() != expected {
                    return Err(SimError::config(format!(
                        "seasonal pattern has {} rows for {expected} admin units",
                        adjustments_by_unit.len()
                    )));
                }
                let unit_by_location: Vec<i32> = (0..number_of_locations)
                    .map(|loc| boundary.unit_of(loc))
                    .collect();
                Ok(Seasonality::Pattern {
                    unit_by_location,
                    min_unit_id: boundary.min_unit_id,
                    adjustments_by_unit: adjustments_by_unit.clone(),
                    monthly: period == 12,
                })
            }
        }
    }

    /// Seasonal multiplier for `location` on `date`; always >= 0.
    #[must_use]
    pub fn seasonal_factor(&self, date: NaiveDate, location: usize) -> f64 {
        match self {
            Seasonality::Disabled => 1.0,
            Seasonality::Equation {
                base, a, b, phi, ..
            } => {
                let day = f64::from(day_of_year(date));
                let multiplier = a[location]
                    * (b[location] * std::f64::consts::PI * (day - phi[location]) / 365.0).sin();
                multiplier.max(0.0) + base[location]
            }
            Seasonality::Rainfall { adjustments } => {
                let mut doy = day_of_year(date);
                // Leap day reuses the December 30 value.
                doy = if doy == 366 { 364 } else { doy - 1 };
                adjustments[doy as usize]
            }
            Seasonality::Pattern {
                unit_by_location,
                min_unit_id,
                adjustments_by_unit,
                monthly,
            } => {
                let row = (unit_by_location[location] - min_unit_id) as usize;
                if *monthly {
                    adjustments_by_unit[row][date.month0() as usize]
                } else {
                    let doy = day_of_year(date);
                    let idx = if doy == 366 { 364 } else { doy - 1 };
                    adjustments_by_unit[row][idx as usize]
                }
            }
        }
    }

    /// Remap every location carrying ecozone `from` to the coefficients of
    /// ecozone `to`.
    pub fn update_seasonality(&mut self, from: usize, to: usize) -> Result<()> {
        match self {
            Seasonality::Equation {
                base,
                a,
                b,
                phi,
                reference_base,
                reference_a,
                reference_b,
                reference_phi,
                zone_by_location,
            } => {
                if from >= reference_base.len() || to >= reference_base.len() {
                    return Err(SimError::config(format!(
                        "ecozone remap {from} -> {to} outside the coefficient table"
                    )));
                }
                for (loc, zone) in zone_by_location.iter_mut().enumerate() {
                    if *zone == from {
                        *zone = to;
                        base[loc] = reference_base[to];
                        a[loc] = reference_a[to];
                        b[loc] = reference_b[to];
                        phi[loc] = reference_phi[to];
                    }
                }
                Ok(())
            }
            _ => Err(SimError::config(
                "ecozone update requires equation seasonality".to_string(),
            )),
        }
    }
}
