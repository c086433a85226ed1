//! Treatment coverage models.
//!
//! Coverage is the per-location probability that a clinical case accesses
//! treatment, split by under/over five. The steady model is constant; the
//! linear model interpolates monthly between two levels.

use crate::model::config::CoverageConfig;
use crate::model::error::{Result, SimError};

#[derive(Debug, Clone)]
pub enum TreatmentCoverageModel {
    Steady {
        p_treatment_under_5: Vec<f64>,
        p_treatment_over_5: Vec<f64>,
    },
    Linear {
        p_treatment_under_5: Vec<f64>,
        p_treatment_over_5: Vec<f64>,
        rate_of_change_under_5: Vec<f64>,
        rate_of_change_over_5: Vec<f64>,
        end_time: i32,
    },
}

impl TreatmentCoverageModel {
    #[must_use]
    pub fn steady(p_treatment_under_5: Vec<f64>, p_treatment_over_5: Vec<f64>) -> Self {
        Self::Steady {
            p_treatment_under_5,
            p_treatment_over_5,
        }
    }

    /// Linear interpolation: each monthly update moves the coverage by
    /// 30 * (to - from) / (end - start).
    pub fn linear(
        from_under_5: Vec<f64>,
        from_over_5: Vec<f64>,
        to_under_5: Vec<f64>,
        to_over_5: Vec<f64>,
        starting_time: i32,
        end_time: i32,
    ) -> Result<Self> {
        if end_time <= starting_time {
            return Err(SimError::config(
                "linear coverage end_time must be after starting_time".to_string(),
            ));
        }
        let span = f64::from(end_time - starting_time);
        let rate = |from: &[f64], to: &[f64]| -> Vec<f64> {
            from.iter()
                .zip(to.iter())
                .map(|(f, t)| 30.0 * (t - f) / span)
                .collect()
        };
        Ok(Self::Linear {
            rate_of_change_under_5: rate(&from_under_5, &to_under_5),
            rate_of_change_over_5: rate(&from_over_5, &to_over_5),
            p_treatment_under_5: from_under_5,
            p_treatment_over_5: from_over_5,
            end_time,
        })
    }

    pub fn from_config(
        config: &CoverageConfig,
        day_of: impl Fn(chrono::NaiveDate) -> i32,
    ) -> Result<Self> {
        match config {
            CoverageConfig::Steady {
                p_treatment_under_5,
                p_treatment_over_5,
            } => Ok(Self::steady(
                p_treatment_under_5.clone(),
                p_treatment_over_5.clone(),
            )),
            CoverageConfig::Linear {
                starting_date,
                end_date,
                from_under_5,
                from_over_5,
                to_under_5,
                to_over_5,
            } => Self::linear(
                from_under_5.clone(),
                from_over_5.clone(),
                to_under_5.clone(),
                to_over_5.clone(),
                day_of(*starting_date),
                day_of(*end_date),
            ),
        }
    }

    #[must_use]
    pub fn p_treatment(&self, location: usize, under_five: bool) -> f64 {
        let (under, over) = match self {
            Self::Steady {
                p_treatment_under_5,
                p_treatment_over_5,
            }
            | Self::Linear {
                p_treatment_under_5,
                p_treatment_over_5,
                ..
            } => (p_treatment_under_5, p_treatment_over_5),
        };
        let table = if under_five { under } else { over };
        table.get(location).copied().unwrap_or(0.0)
    }

    pub fn monthly_update(&mut self, current_time: i32) {
        if let Self::Linear {
            p_treatment_under_5,
            p_treatment_over_5,
            rate_of_change_under_5,
            rate_of_change_over_5,
            end_time,
        } = self
        {
            if current_time <= *end_time {
                for (p, rate) in p_treatment_under_5.iter_mut().zip(rate_of_change_under_5.iter()) {
                    *p = (*p + rate).clamp(0.0, 1.0);
                }
                for (p, rate) in p_treatment_over_5.iter_mut().zip(rate_of_change_over_5.iter()) {
                    *p = (*p + rate).clamp(0.0, 1.0);
                }
            }
        }
    }

    /// Annual adjustment: c += rate * (1 - c), truncated at the third decimal
    /// and capped at 1.0.
    pub fn annual_adjust(&mut self, rate: f64) {
        fn adjust(coverage: f64, rate: f64) -> f64 {
            let mut c = coverage + (1.0 - coverage) * rate;
            c = (c * 1000.0).trunc() / 1000.0;
            c.min(1.0)
        }
        match self {
            Self::Steady {
                p_treatment_under_5,
                p_treatment_over_5,
            }
            | Self::Linear {
                p_treatment_under_5,
                p_treatment_over_5,
                ..
            } => {
                for p in p_treatment_under_5.iter_mut() {
                    *p = adjust(*p, rate);
                }
                for p in p_treatment_over_5.iter_mut() {
                    *p = adjust(*p, rate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_reaches_target_after_monthly_updates() {
        let mut tcm = TreatmentCoverageModel::linear(
            vec![0.2],
            vec![0.2],
            vec![0.8],
            vec![0.8],
            0,
            360,
        )
        .unwrap();
        for month in 0..12 {
            tcm.monthly_update(month * 30);
        }
        assert!((tcm.p_treatment(0, true) - 0.8).abs() < 1e-2);
        assert!((tcm.p_treatment(0, false) - 0.8).abs() < 1e-2);
    }

    #[test]
    fn test_linear_stops_after_end_time() {
        let mut tcm = TreatmentCoverageModel::linear(
            vec![0.2],
            vec![0.2],
            vec![0.8],
            vec![0.8],
            0,
            60,
        )
        .unwrap();
        for month in 0..24 {
            tcm.monthly_update(month * 30);
        }
        assert!(tcm.p_treatment(0, true) <= 0.8 + 1e-9);
    }

    #[test]
    fn test_annual_adjust_never_exceeds_one() {
        let mut tcm = TreatmentCoverageModel::steady(vec![0.9], vec![0.9]);
        for _ in 0..50 {
            tcm.annual_adjust(0.3);
        }
        assert!(tcm.p_treatment(0, true) <= 1.0);
        assert!(tcm.p_treatment(0, false) <= 1.0);
    }

    #[test]
    fn test_annual_adjust_truncates_third_decimal() {
        let mut tcm = TreatmentCoverageModel::steady(vec![0.5], vec![0.5]);
        tcm.annual_adjust(0.1);
        // 0.5 + 0.5 * 0.1 = 0.55 exactly
        assert!((tcm.p_treatment(0, true) - 0.55).abs() < 1e-9);
        let value = tcm.p_treatment(0, true);
        assert_eq!((value * 1000.0).fract(), 0.0);
    }
}
