//! Summary metrics.
//!
//! A summary collapses the per-partition values of one metric output into a
//! single survey-level number. Invalid entries are dropped from the
//! population unless the statistic says otherwise.

use crate::error::{ConfigError, Result};
use crate::metric::check_non_negative;
use crate::stats;
use crate::value::{MetricValue, SummaryValue};
use serde::{Deserialize, Serialize};

/// Statistic computed by a [`SummaryMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statistic", deny_unknown_fields)]
pub enum SummaryStatistic {
    Mean,
    Median,
    Min,
    Max,
    Sum,
    /// Number of valid entries.
    Count,
    /// Population standard deviation.
    Rms,
    /// (p75 - p25) / 1.349
    RobustRms,
    /// Percentile in [0, 100], linearly interpolated.
    Percentile { percentile: f64 },
    CountAbove { cut: f64 },
    CountBelow { cut: f64 },
    FracAbove { cut: f64 },
    FracBelow { cut: f64 },
    /// Fraction of all partitions below `cut`; invalid partitions count as
    /// failures and stay in the denominator.
    FracBelowCountingInvalid { cut: f64 },
    /// Every value in input order.
    Identity,
}

impl SummaryStatistic {
    /// Default label used in output names.
    pub fn label(&self) -> String {
        match self {
            SummaryStatistic::Mean => "Mean".to_string(),
            SummaryStatistic::Median => "Median".to_string(),
            SummaryStatistic::Min => "Min".to_string(),
            SummaryStatistic::Max => "Max".to_string(),
            SummaryStatistic::Sum => "Sum".to_string(),
            SummaryStatistic::Count => "Count".to_string(),
            SummaryStatistic::Rms => "Rms".to_string(),
            SummaryStatistic::RobustRms => "RobustRms".to_string(),
            SummaryStatistic::Percentile { percentile } => format!("{}th%ile", percentile),
            SummaryStatistic::CountAbove { cut } => format!("Count > {}", cut),
            SummaryStatistic::CountBelow { cut } => format!("Count < {}", cut),
            SummaryStatistic::FracAbove { cut } => format!("Frac > {}", cut),
            SummaryStatistic::FracBelow { cut } => format!("Frac < {}", cut),
            SummaryStatistic::FracBelowCountingInvalid { cut } => {
                format!("Frac < {} (invalid counted)", cut)
            }
            SummaryStatistic::Identity => "Identity".to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            SummaryStatistic::Percentile { percentile } => {
                check_non_negative("percentile", *percentile)?;
                if *percentile > 100.0 {
                    return Err(ConfigError::invalid(
                        "percentile",
                        format!("must be in [0, 100], got {}", percentile),
                    )
                    .into());
                }
                Ok(())
            }
            SummaryStatistic::CountAbove { cut }
            | SummaryStatistic::CountBelow { cut }
            | SummaryStatistic::FracAbove { cut }
            | SummaryStatistic::FracBelow { cut }
            | SummaryStatistic::FracBelowCountingInvalid { cut } => {
                if cut.is_nan() {
                    return Err(ConfigError::invalid("cut", "must not be NaN").into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A validated summary statistic with a display name.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMetric {
    name: String,
    statistic: SummaryStatistic,
}

impl SummaryMetric {
    pub fn new(statistic: SummaryStatistic) -> Result<Self> {
        statistic.validate()?;
        Ok(Self {
            name: statistic.label(),
            statistic,
        })
    }

    /// Override the display name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statistic(&self) -> &SummaryStatistic {
        &self.statistic
    }

    /// Summarize the per-partition values of one output.
    pub fn summarize(&self, values: &[MetricValue]) -> SummaryValue {
        let entries = scalar_entries(values);

        match self.statistic {
            SummaryStatistic::Identity => return SummaryValue::Passthrough(entries),
            SummaryStatistic::FracBelowCountingInvalid { cut } => {
                if entries.is_empty() {
                    return SummaryValue::Invalid;
                }
                let below = entries.iter().flatten().filter(|v| **v < cut).count();
                return SummaryValue::scalar(below as f64 / entries.len() as f64);
            }
            _ => {}
        }

        let valid: Vec<f64> = entries.into_iter().flatten().collect();
        if valid.is_empty() {
            return SummaryValue::Invalid;
        }
        let count = |pred: &dyn Fn(f64) -> bool| valid.iter().filter(|v| pred(**v)).count() as f64;
        let result = match self.statistic {
            SummaryStatistic::Mean => stats::mean(&valid),
            SummaryStatistic::Median => stats::median(&valid),
            SummaryStatistic::Min => stats::min(&valid),
            SummaryStatistic::Max => stats::max(&valid),
            SummaryStatistic::Sum => stats::sum(&valid),
            SummaryStatistic::Count => Some(valid.len() as f64),
            SummaryStatistic::Rms => stats::std(&valid),
            SummaryStatistic::RobustRms => stats::robust_rms(&valid),
            SummaryStatistic::Percentile { percentile } => stats::percentile(&valid, percentile),
            SummaryStatistic::CountAbove { cut } => Some(count(&|v| v > cut)),
            SummaryStatistic::CountBelow { cut } => Some(count(&|v| v < cut)),
            SummaryStatistic::FracAbove { cut } => Some(count(&|v| v > cut) / valid.len() as f64),
            SummaryStatistic::FracBelow { cut } => Some(count(&|v| v < cut) / valid.len() as f64),
            SummaryStatistic::FracBelowCountingInvalid { .. } | SummaryStatistic::Identity => None,
        };
        result.map_or(SummaryValue::Invalid, SummaryValue::scalar)
    }
}

/// Scalar view of each entry; invalid and vector entries become `None`.
fn scalar_entries(values: &[MetricValue]) -> Vec<Option<f64>> {
    let mut vectors = 0usize;
    let entries = values
        .iter()
        .map(|v| match v {
            MetricValue::Scalar(x) if x.is_finite() => Some(*x),
            MetricValue::Vector(_) => {
                vectors += 1;
                None
            }
            _ => None,
        })
        .collect();
    if vectors > 0 {
        log::warn!("summary received {} vector values, treated as invalid", vectors);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[f64]) -> Vec<MetricValue> {
        v.iter().map(|x| MetricValue::scalar(*x)).collect()
    }

    fn summary(statistic: SummaryStatistic) -> SummaryMetric {
        SummaryMetric::new(statistic).unwrap()
    }

    #[test]
    fn test_invalid_entries_excluded() {
        let mut v = values(&[1.0, 3.0]);
        v.push(MetricValue::Invalid);
        assert_eq!(summary(SummaryStatistic::Mean).summarize(&v).as_scalar(), Some(2.0));
        assert_eq!(summary(SummaryStatistic::Count).summarize(&v).as_scalar(), Some(2.0));
    }

    #[test]
    fn test_counting_invalid_is_distinct() {
        let v = vec![
            MetricValue::Scalar(1.0),
            MetricValue::Invalid,
            MetricValue::Scalar(5.0),
            MetricValue::Invalid,
        ];
        let plain = summary(SummaryStatistic::FracBelow { cut: 2.0 });
        let counting = summary(SummaryStatistic::FracBelowCountingInvalid { cut: 2.0 });
        assert_eq!(plain.summarize(&v).as_scalar(), Some(0.5));
        assert_eq!(counting.summarize(&v).as_scalar(), Some(0.25));
    }

    #[test]
    fn test_all_invalid() {
        let v = vec![MetricValue::Invalid, MetricValue::Invalid];
        assert!(summary(SummaryStatistic::Median).summarize(&v).is_invalid());
        assert_eq!(
            summary(SummaryStatistic::FracBelowCountingInvalid { cut: 1.0 })
                .summarize(&v)
                .as_scalar(),
            Some(0.0)
        );
    }

    #[test]
    fn test_identity_preserves_order() {
        let v = vec![
            MetricValue::Scalar(3.0),
            MetricValue::Invalid,
            MetricValue::Scalar(1.0),
        ];
        assert_eq!(
            summary(SummaryStatistic::Identity).summarize(&v),
            SummaryValue::Passthrough(vec![Some(3.0), None, Some(1.0)])
        );
    }

    #[test]
    fn test_single_value_spread_is_zero() {
        let v = values(&[4.2]);
        assert_eq!(summary(SummaryStatistic::Rms).summarize(&v).as_scalar(), Some(0.0));
        assert_eq!(summary(SummaryStatistic::RobustRms).summarize(&v).as_scalar(), Some(0.0));
        assert_eq!(
            summary(SummaryStatistic::Percentile { percentile: 90.0 })
                .summarize(&v)
                .as_scalar(),
            Some(4.2)
        );
    }

    #[test]
    fn test_counts() {
        let v = values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            summary(SummaryStatistic::CountAbove { cut: 2.0 }).summarize(&v).as_scalar(),
            Some(2.0)
        );
        assert_eq!(
            summary(SummaryStatistic::FracAbove { cut: 3.5 }).summarize(&v).as_scalar(),
            Some(0.25)
        );
    }

    #[test]
    fn test_bad_percentile_rejected() {
        assert!(SummaryMetric::new(SummaryStatistic::Percentile { percentile: 120.0 }).is_err());
        assert!(SummaryMetric::new(SummaryStatistic::FracAbove { cut: f64::NAN }).is_err());
    }

    #[test]
    fn test_statistic_from_json() {
        let stat: SummaryStatistic =
            serde_json::from_str(r#"{"statistic": "Percentile", "percentile": 25.0}"#).unwrap();
        assert_eq!(stat, SummaryStatistic::Percentile { percentile: 25.0 });
        assert!(serde_json::from_str::<SummaryStatistic>(r#"{"statistic": "Mode"}"#).is_err());
    }
}
