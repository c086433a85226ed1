//! Treatment strategies.
//!
//! A strategy resolves which therapy a treated case receives. The variant set
//! is fixed at configuration time; nested variants delegate to other entries
//! of the strategy table by id.

use std::collections::BTreeMap;

use crate::model::collector::ModelDataCollector;
use crate::model::config::{StrategyDef, StrategyParameters};
use crate::model::error::{Result, SimError};
use crate::model::random::Random;
use crate::model::spatial::AdminLevels;

#[derive(Debug, Clone)]
pub struct MftEntry {
    pub therapy_ids: Vec<usize>,
    pub distribution: Vec<f64>,
}

impl MftEntry {
    fn sample(&self, random: &mut Random) -> Result<usize> {
        let index = random
            .sample_weighted(&self.distribution)
            .ok_or_else(|| SimError::domain("MFT distribution sums to zero".to_string()))?;
        Ok(self.therapy_ids[index])
    }
}

#[derive(Debug, Clone)]
pub enum TreatmentStrategy {
    Sft {
        name: String,
        therapy_id: usize,
    },
    Mft {
        name: String,
        entry: MftEntry,
    },
    Cycling {
        name: String,
        therapy_ids: Vec<usize>,
        cycling_time: i32,
        index: usize,
        next_switching_day: i32,
    },
    AdaptiveCycling {
        name: String,
        therapy_ids: Vec<usize>,
        index: usize,
        trigger_value: f64,
        delay_until_actual_trigger: i32,
        turn_off_days: i32,
        switch_at: Option<i32>,
        latest_switch_time: i32,
    },
    NestedMft {
        name: String,
        strategy_ids: Vec<usize>,
        distribution: Vec<f64>,
    },
    NestedMftMultiLocation {
        name: String,
        strategy_ids: Vec<usize>,
        distribution_by_location: Vec<Vec<f64>>,
    },
    DistrictMft {
        name: String,
        district_strategies: BTreeMap<i32, MftEntry>,
    },
}

impl TreatmentStrategy {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TreatmentStrategy::Sft { name, .. }
            | TreatmentStrategy::Mft { name, .. }
            | TreatmentStrategy::Cycling { name, .. }
            | TreatmentStrategy::AdaptiveCycling { name, .. }
            | TreatmentStrategy::NestedMft { name, .. }
            | TreatmentStrategy::NestedMftMultiLocation { name, .. }
            | TreatmentStrategy::DistrictMft { name, .. } => name,
        }
    }

    /// Restart rotation counters when this strategy becomes active.
    pub fn adjust_started_time_point(&mut self, current_time: i32) {
        match self {
            TreatmentStrategy::Cycling {
                cycling_time,
                next_switching_day,
                ..
            } => {
                *next_switching_day = current_time + *cycling_time;
            }
            TreatmentStrategy::AdaptiveCycling {
                switch_at,
                latest_switch_time,
                ..
            } => {
                *switch_at = None;
                *latest_switch_time = current_time;
            }
            _ => {}
        }
    }
}

/// The strategy table plus the id of the active strategy.
pub struct StrategyDb {
    strategies: Vec<TreatmentStrategy>,
    active_id: usize,
}

/// Assign a district's MFT, failing on the second assignment.
fn set_district_strategy(
    districts: &mut BTreeMap<i32, MftEntry>,
    district: i32,
    entry: MftEntry,
) -> Result<()> {
    if districts.contains_key(&district) {
        return Err(SimError::config(format!(
            "district {district} already has an MFT strategy assigned"
        )));
    }
    districts.insert(district, entry);
    Ok(())
}

impl StrategyDb {
    pub fn from_config(params: &StrategyParameters, current_time: i32) -> Result<Self> {
        let mut strategies = Vec::with_capacity(params.strategy_db.len());
        for def in &params.strategy_db {
            let strategy = match def {
                StrategyDef::Sft { name, therapy_id } => TreatmentStrategy::Sft {
                    name: name.clone(),
                    therapy_id: *therapy_id,
                },
                StrategyDef::Mft {
                    name,
                    therapy_ids,
                    distribution,
                } => {
                    if therapy_ids.len() != distribution.len() {
                        return Err(SimError::config(format!(
                            "MFT '{name}' has {} therapies but {} weights",
                            therapy_ids.len(),
                            distribution.len()
                        )));
                    }
                    TreatmentStrategy::Mft {
                        name: name.clone(),
                        entry: MftEntry {
                            therapy_ids: therapy_ids.clone(),
                            distribution: distribution.clone(),
                        },
                    }
                }
                StrategyDef::Cycling {
                    name,
                    therapy_ids,
                    cycling_time,
                } => TreatmentStrategy::Cycling {
                    name: name.clone(),
                    therapy_ids: therapy_ids.clone(),
                    cycling_time: *cycling_time,
                    index: 0,
                    next_switching_day: current_time + cycling_time,
                },
                StrategyDef::AdaptiveCycling {
                    name,
                    therapy_ids,
                    trigger_value,
                    delay_until_actual_trigger,
                    turn_off_days,
                } => TreatmentStrategy::AdaptiveCycling {
                    name: name.clone(),
                    therapy_ids: therapy_ids.clone(),
                    index: 0,
                    trigger_value: *trigger_value,
                    delay_until_actual_trigger: *delay_until_actual_trigger,
                    turn_off_days: *turn_off_days,
                    switch_at: None,
                    latest_switch_time: current_time,
                },
                StrategyDef::NestedMft {
                    name,
                    strategy_ids,
                    distribution,
                } => TreatmentStrategy::NestedMft {
                    name: name.clone(),
                    strategy_ids: strategy_ids.clone(),
                    distribution: distribution.clone(),
                },
                StrategyDef::NestedMftMultiLocation {
                    name,
                    strategy_ids,
                    distribution_by_location,
                } => TreatmentStrategy::NestedMftMultiLocation {
                    name: name.clone(),
                    strategy_ids: strategy_ids.clone(),
                    distribution_by_location: distribution_by_location.clone(),
                },
                StrategyDef::DistrictMft {
                    name,
                    district_strategies,
                } => {
                    let mut districts = BTreeMap::new();
                    for entry in district_strategies {
                        set_district_strategy(
                            &mut districts,
                            entry.district,
                            MftEntry {
                                therapy_ids: entry.therapy_ids.clone(),
                                distribution: entry.distribution.clone(),
                            },
                        )?;
                    }
                    TreatmentStrategy::DistrictMft {
                        name: name.clone(),
                        district_strategies: districts,
                    }
                }
            };
            strategies.push(strategy);
        }
        for strategy in &strategies {
            if let TreatmentStrategy::NestedMft { strategy_ids, .. }
            | TreatmentStrategy::NestedMftMultiLocation { strategy_ids, .. } = strategy
            {
                for id in strategy_ids {
                    if *id >= strategies.len() {
                        return Err(SimError::config(format!(
                            "nested strategy '{}' references unknown strategy id {id}",
                            strategy.name()
                        )));
                    }
                }
            }
        }
        Ok(Self {
            strategies,
            active_id: params.initial_strategy_id,
        })
    }

    #[must_use]
    pub fn active_id(&self) -> usize {
        self.active_id
    }

    #[must_use]
    pub fn active(&self) -> &TreatmentStrategy {
        &self.strategies[self.active_id]
    }

    #[must_use]
    pub fn get(&self, id: usize) -> &TreatmentStrategy {
        &self.strategies[id]
    }

    pub fn set_active(&mut self, id: usize, current_time: i32) -> Result<()> {
        if id >= self.strategies.len() {
            return Err(SimError::config(format!("unknown strategy id {id}")));
        }
        self.active_id = id;
        self.strategies[id].adjust_started_time_point(current_time);
        tracing::info!(strategy = self.strategies[id].name(), "switched treatment strategy");
        Ok(())
    }

    /// Replace slot 0 of the active nested strategy and restart its clock.
    pub fn modify_nested_slot(&mut self, new_strategy_id: usize, current_time: i32) -> Result<()> {
        if new_strategy_id >= self.strategies.len() {
            return Err(SimError::config(format!(
                "unknown strategy id {new_strategy_id}"
            )));
        }
        match &mut self.strategies[self.active_id] {
            TreatmentStrategy::NestedMft { strategy_ids, .. }
            | TreatmentStrategy::NestedMftMultiLocation { strategy_ids, .. } => {
                strategy_ids[0] = new_strategy_id;
            }
            other => {
                return Err(SimError::config(format!(
                    "active strategy '{}' is not a nested MFT",
                    other.name()
                )));
            }
        }
        self.strategies[new_strategy_id].adjust_started_time_point(current_time);
        Ok(())
    }

    /// Resolve the therapy for a treated case at `location`.
    pub fn get_therapy(
        &self,
        location: usize,
        admin: &AdminLevels,
        random: &mut Random,
    ) -> Result<usize> {
        self.resolve_therapy(self.active_id, location, admin, random, 0)
    }

    fn resolve_therapy(
        &self,
        strategy_id: usize,
        location: usize,
        admin: &AdminLevels,
        random: &mut Random,
        depth: usize,
    ) -> Result<usize> {
        if depth > self.strategies.len() {
            return Err(SimError::config(
                "nested strategy delegation cycle".to_string(),
            ));
        }
        match &self.strategies[strategy_id] {
            TreatmentStrategy::Sft { therapy_id, .. } => Ok(*therapy_id),
            TreatmentStrategy::Mft { entry, .. } => entry.sample(random),
            TreatmentStrategy::Cycling {
                therapy_ids, index, ..
            }
            | TreatmentStrategy::AdaptiveCycling {
                therapy_ids, index, ..
            } => Ok(therapy_ids[*index]),
            TreatmentStrategy::NestedMft {
                strategy_ids,
                distribution,
                ..
            } => {
                let pick = random
                    .sample_weighted(distribution)
                    .ok_or_else(|| SimError::domain("nested MFT weights sum to zero".to_string()))?;
                self.resolve_therapy(strategy_ids[pick], location, admin, random, depth + 1)
            }
            TreatmentStrategy::NestedMftMultiLocation {
                strategy_ids,
                distribution_by_location,
                ..
            } => {
                let row = distribution_by_location
                    .get(location)
                    .ok_or_else(|| {
                        SimError::config(format!(
                            "no nested distribution for location {location}"
                        ))
                    })?;
                let pick = random
                    .sample_weighted(row)
                    .ok_or_else(|| SimError::domain("nested MFT weights sum to zero".to_string()))?;
                self.resolve_therapy(strategy_ids[pick], location, admin, random, depth + 1)
            }
            TreatmentStrategy::DistrictMft {
                district_strategies,
                ..
            } => {
                let boundary = admin.require("district")?;
                let district = boundary.unit_of(location);
                let entry = district_strategies.get(&district).ok_or_else(|| {
                    SimError::config(format!("district {district} has no MFT assigned"))
                })?;
                entry.sample(random)
            }
        }
    }

    /// Monthly hook: adaptive cycling arms a delayed rotation once the
    /// current therapy's 60-day failure ratio crosses the trigger.
    pub fn monthly_update(&mut self, current_time: i32, mdc: &ModelDataCollector) {
        if let TreatmentStrategy::AdaptiveCycling {
            name,
            therapy_ids,
            index,
            trigger_value,
            delay_until_actual_trigger,
            turn_off_days,
            switch_at,
            latest_switch_time,
        } = &mut self.strategies[self.active_id]
        {
            if switch_at.is_some() {
                return;
            }
            if current_time < *latest_switch_time + *turn_off_days {
                return;
            }
            let tf = mdc.current_tf_by_therapy(therapy_ids[*index]);
            if tf > *trigger_value {
                *switch_at = Some(current_time + *delay_until_actual_trigger);
                tracing::info!(
                    strategy = name.as_str(),
                    tf,
                    at = switch_at.unwrap(),
                    "treatment failure trigger reached, rotation armed"
                );
            }
        }
    }

    /// Daily hook: perform due rotations.
    pub fn update_end_of_time_step(&mut self, current_time: i32) {
        match &mut self.strategies[self.active_id] {
            TreatmentStrategy::Cycling {
                name,
                therapy_ids,
                cycling_time,
                index,
                next_switching_day,
            } => {
                if current_time == *next_switching_day {
                    *index = (*index + 1) % therapy_ids.len();
                    *next_switching_day = current_time + *cycling_time;
                    tracing::info!(
                        strategy = name.as_str(),
                        therapy = therapy_ids[*index],
                        "cycling strategy rotated"
                    );
                }
            }
            TreatmentStrategy::AdaptiveCycling {
                therapy_ids,
                index,
                switch_at,
                latest_switch_time,
                ..
            } => {
                if *switch_at == Some(current_time) {
                    *index = (*index + 1) % therapy_ids.len();
                    *switch_at = None;
                    *latest_switch_time = current_time;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::DistrictMftEntryConfig;
    use crate::model::spatial::AdminBoundary;

    fn admin_with_districts(units: Vec<i32>) -> AdminLevels {
        let mut levels = AdminLevels::default();
        levels
            .register(AdminBoundary::new("district", units).unwrap())
            .unwrap();
        levels
    }

    fn db(defs: Vec<StrategyDef>, initial: usize) -> StrategyDb {
        let params = StrategyParameters {
            strategy_db: defs,
            initial_strategy_id: initial,
            mda: Default::default(),
        };
        StrategyDb::from_config(&params, 0).unwrap()
    }

    #[test]
    fn test_sft_constant() {
        let db = db(
            vec![StrategyDef::Sft {
                name: "sft".to_string(),
                therapy_id: 7,
            }],
            0,
        );
        let admin = AdminLevels::default();
        let mut random = Random::new(1);
        for _ in 0..10 {
            assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 7);
        }
    }

    #[test]
    fn test_cycling_rotates_on_schedule() {
        let mut db = db(
            vec![StrategyDef::Cycling {
                name: "cycle".to_string(),
                therapy_ids: vec![0, 1, 2],
                cycling_time: 10,
            }],
            0,
        );
        let admin = AdminLevels::default();
        let mut random = Random::new(1);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 0);
        db.update_end_of_time_step(10);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 1);
        db.update_end_of_time_step(20);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 2);
        db.update_end_of_time_step(30);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 0);
    }

    #[test]
    fn test_adaptive_cycling_triggers_on_tf() {
        let mut db = db(
            vec![StrategyDef::AdaptiveCycling {
                name: "adaptive".to_string(),
                therapy_ids: vec![0, 1],
                trigger_value: 0.1,
                delay_until_actual_trigger: 5,
                turn_off_days: 0,
            }],
            0,
        );
        let mut mdc = ModelDataCollector::new(1, 1, 2, 0);
        mdc.begin_time_step();
        for _ in 0..10 {
            mdc.record_1_treatment(0, 0, 0);
            mdc.record_1_treatment_failure(0, 0, 0);
        }
        mdc.end_of_time_step(0);
        db.monthly_update(30, &mdc);
        let admin = AdminLevels::default();
        let mut random = Random::new(1);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 0);
        db.update_end_of_time_step(35);
        assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 1);
    }

    #[test]
    fn test_district_mft_routes_by_district() {
        let db = db(
            vec![StrategyDef::DistrictMft {
                name: "district".to_string(),
                district_strategies: vec![
                    DistrictMftEntryConfig {
                        district: 1,
                        therapy_ids: vec![3],
                        distribution: vec![1.0],
                    },
                    DistrictMftEntryConfig {
                        district: 2,
                        therapy_ids: vec![4],
                        distribution: vec![1.0],
                    },
                ],
            }],
            0,
        );
        let admin = admin_with_districts(vec![1, 2]);
        let mut random = Random::new(1);
        for _ in 0..100 {
            assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 3);
            assert_eq!(db.get_therapy(1, &admin, &mut random).unwrap(), 4);
        }
    }

    #[test]
    fn test_district_double_assignment_fails() {
        let params = StrategyParameters {
            strategy_db: vec![StrategyDef::DistrictMft {
                name: "district".to_string(),
                district_strategies: vec![
                    DistrictMftEntryConfig {
                        district: 1,
                        therapy_ids: vec![0],
                        distribution: vec![1.0],
                    },
                    DistrictMftEntryConfig {
                        district: 1,
                        therapy_ids: vec![1],
                        distribution: vec![1.0],
                    },
                ],
            }],
            initial_strategy_id: 0,
            mda: Default::default(),
        };
        assert!(StrategyDb::from_config(&params, 0).is_err());
    }

    #[test]
    fn test_nested_mft_delegates() {
        let mut db = db(
            vec![
                StrategyDef::Sft {
                    name: "a".to_string(),
                    therapy_id: 0,
                },
                StrategyDef::Sft {
                    name: "b".to_string(),
                    therapy_id: 1,
                },
                StrategyDef::NestedMft {
                    name: "nested".to_string(),
                    strategy_ids: vec![0, 1],
                    distribution: vec![1.0, 0.0],
                },
            ],
            2,
        );
        let admin = AdminLevels::default();
        let mut random = Random::new(1);
        for _ in 0..20 {
            assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 0);
        }
        db.modify_nested_slot(1, 0).unwrap();
        for _ in 0..20 {
            assert_eq!(db.get_therapy(0, &admin, &mut random).unwrap(), 1);
        }
    }
}
