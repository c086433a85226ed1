//! Therapies: ordered drug sets and multi-course regimens.

use serde::{Deserialize, Serialize};

use crate::model::error::{Result, SimError};
use crate::model::random::Random;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Therapy {
    /// An ordered list of drugs taken together over a dosing window.
    SingleCourse {
        drug_ids: Vec<usize>,
        /// Full-compliance dosing length in days.
        dosing_days: i32,
        /// When present, probability of completing exactly day 1, 2, ... of
        /// the regimen; must sum to 1. Absent means full compliance.
        #[serde(default)]
        pr_completed_days: Option<Vec<f64>>,
    },
    /// Ordered (therapy id, start day) pairs; every component must be a
    /// fully compliant single-course therapy. Start days are 1-based.
    MultiCourse {
        therapy_ids: Vec<usize>,
        start_at_days: Vec<i32>,
    },
}

impl Therapy {
    #[must_use]
    pub fn is_multi_course(&self) -> bool {
        matches!(self, Therapy::MultiCourse { .. })
    }

    #[must_use]
    pub fn full_compliance(&self) -> bool {
        match self {
            Therapy::SingleCourse {
                pr_completed_days, ..
            } => pr_completed_days.is_none(),
            Therapy::MultiCourse { .. } => true,
        }
    }

    /// Draw the number of dosing days actually completed.
    pub fn complied_dosing_days(&self, random: &mut Random) -> Result<i32> {
        match self {
            Therapy::SingleCourse {
                dosing_days,
                pr_completed_days: None,
                ..
            } => Ok(*dosing_days),
            Therapy::SingleCourse {
                pr_completed_days: Some(probabilities),
                ..
            } => {
                let rv = random.random_flat(0.0, 1.0);
                let mut upper_bound = 0.0;
                for (day, p) in probabilities.iter().enumerate() {
                    upper_bound += p;
                    if rv < upper_bound {
                        return Ok(day as i32 + 1);
                    }
                }
                Err(SimError::domain(format!(
                    "completion probabilities exhausted: rv = {rv}"
                )))
            }
            Therapy::MultiCourse { .. } => Err(SimError::domain(
                "multi-course therapy has no dosing days of its own".to_string(),
            )),
        }
    }
}

/// Validate the therapy table: multi-course components must exist and be
/// fully compliant single-course therapies.
pub fn validate_therapy_db(therapy_db: &[Therapy]) -> Result<()> {
    for (id, therapy) in therapy_db.iter().enumerate() {
        if let Therapy::MultiCourse {
            therapy_ids,
            start_at_days,
        } = therapy
        {
            if therapy_ids.len() != start_at_days.len() {
                return Err(SimError::config(format!(
                    "complex therapy {id} has {} components but {} start days",
                    therapy_ids.len(),
                    start_at_days.len()
                )));
            }
            for (&component, &start_day) in therapy_ids.iter().zip(start_at_days.iter()) {
                if start_day < 1 {
                    return Err(SimError::config(format!(
                        "complex therapy {id} has start day {start_day}; days are 1-based"
                    )));
                }
                match therapy_db.get(component) {
                    None => {
                        return Err(SimError::config(format!(
                            "complex therapy {id} references unknown therapy id {component}"
                        )));
                    }
                    Some(Therapy::MultiCourse { .. }) => {
                        return Err(SimError::config(format!(
                            "complex therapy {id} nests complex therapy {component}"
                        )));
                    }
                    Some(inner) if !inner.full_compliance() => {
                        return Err(SimError::config(format!(
                            "complex therapy {id} references therapy {component} with variable compliance"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act() -> Therapy {
        Therapy::SingleCourse {
            drug_ids: vec![0, 1],
            dosing_days: 3,
            pr_completed_days: None,
        }
    }

    #[test]
    fn test_full_compliance_returns_fixed_days() {
        let mut random = Random::new(1);
        assert_eq!(act().complied_dosing_days(&mut random).unwrap(), 3);
    }

    #[test]
    fn test_variable_compliance_distribution() {
        let therapy = Therapy::SingleCourse {
            drug_ids: vec![0],
            dosing_days: 3,
            pr_completed_days: Some(vec![0.0, 0.0, 1.0]),
        };
        let mut random = Random::new(2);
        for _ in 0..20 {
            assert_eq!(therapy.complied_dosing_days(&mut random).unwrap(), 3);
        }
    }

    #[test]
    fn test_multi_course_validation() {
        let db = vec![
            act(),
            Therapy::MultiCourse {
                therapy_ids: vec![0, 0],
                start_at_days: vec![1, 8],
            },
        ];
        assert!(validate_therapy_db(&db).is_ok());

        let bad = vec![
            Therapy::SingleCourse {
                drug_ids: vec![0],
                dosing_days: 3,
                pr_completed_days: Some(vec![0.5, 0.5]),
            },
            Therapy::MultiCourse {
                therapy_ids: vec![0],
                start_at_days: vec![1],
            },
        ];
        assert!(validate_therapy_db(&bad).is_err());

        let unknown = vec![Therapy::MultiCourse {
            therapy_ids: vec![9],
            start_at_days: vec![1],
        }];
        assert!(validate_therapy_db(&unknown).is_err());
    }
}
