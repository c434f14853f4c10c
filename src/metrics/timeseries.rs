//! Per-time-bin series, such as visits accumulated year by year.

use super::bin_index;
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_edges, insufficient, metric_info_accessors, Metric, MetricInfo, VectorMetric,
};
use crate::reduce::{ReduceKind, ReduceRegistry};
use crate::value::{Binned, Bins, MetricValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What each time bin holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistogramStatistic {
    /// Visits in the bin.
    #[default]
    Count,
    /// Visits in the bin and every earlier bin.
    Accumulate,
    /// Mean of `value_col` in the bin; NaN for empty bins.
    Mean,
}

/// Configuration for [`TimeHistogramMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeHistogramConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Column averaged by [`HistogramStatistic::Mean`]; must be unset for
    /// the other statistics.
    pub value_col: Option<String>,
    /// Bin edges in days after `time_origin`.
    pub bins: Vec<f64>,
    /// Time of the first edge; the earliest visit of each partition when
    /// unset.
    pub time_origin: Option<f64>,
    pub statistic: HistogramStatistic,
}

impl Default for TimeHistogramConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            value_col: None,
            bins: (0..=10).map(|year| year as f64 * 365.25).collect(),
            time_origin: None,
            statistic: HistogramStatistic::Count,
        }
    }
}

/// Visit counts, running totals or column means per time bin.
///
/// Reduces: `Last` (final bin), `Max`, `Total` (sum over bins).
#[derive(Debug, Clone)]
pub struct TimeHistogramMetric {
    info: MetricInfo,
    config: TimeHistogramConfig,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl TimeHistogramMetric {
    pub fn new(config: TimeHistogramConfig) -> Result<Self> {
        check_edges("bins", &config.bins)?;
        if config.time_origin.is_some_and(|t| !t.is_finite()) {
            return Err(ConfigError::invalid("time_origin", "must be finite").into());
        }
        let mut columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let (default_name, default_units) = match (&config.statistic, &config.value_col) {
            (HistogramStatistic::Mean, Some(col)) => {
                columns = columns.require("value_col", col)?;
                (format!("Mean {} per time bin", col), col.clone())
            }
            (HistogramStatistic::Mean, None) => {
                return Err(ConfigError::invalid(
                    "value_col",
                    "required by the Mean statistic",
                )
                .into());
            }
            (HistogramStatistic::Count | HistogramStatistic::Accumulate, Some(_)) => {
                return Err(ConfigError::invalid(
                    "value_col",
                    "only used by the Mean statistic",
                )
                .into());
            }
            (HistogramStatistic::Count, None) => {
                ("Visits per time bin".to_string(), "#".to_string())
            }
            (HistogramStatistic::Accumulate, None) => {
                ("Accumulated visits".to_string(), "#".to_string())
            }
        };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            default_name,
            &default_units,
            columns,
        );
        let reducers = ReduceRegistry::new()
            .with("Last", ReduceKind::Last)
            .with("Max", ReduceKind::Max)
            .with("Total", ReduceKind::Sum);
        Ok(Self {
            bins: Arc::new(Bins::from_edges(&config.bins)),
            info,
            config,
            reducers,
        })
    }
}

impl Metric for TimeHistogramMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let times = data.floats(&self.config.time_col)?;
        let values = match &self.config.value_col {
            Some(col) => Some(data.floats(col)?),
            None => None,
        };
        let origin = match self.config.time_origin {
            Some(t) => t,
            None => match crate::stats::min(times) {
                Some(t) => t,
                None => return Ok(insufficient(&self.info.name, 0, 1)),
            },
        };

        let n_bins = self.bins.len();
        let mut counts = vec![0.0; n_bins];
        let mut sums = vec![0.0; n_bins];
        for (i, t) in times.iter().enumerate() {
            let value = values.map_or(0.0, |v| v[i]);
            if value.is_nan() {
                continue;
            }
            if let Some(b) = bin_index(&self.config.bins, t - origin) {
                counts[b] += 1.0;
                sums[b] += value;
            }
        }

        let series = match self.config.statistic {
            HistogramStatistic::Count => counts,
            HistogramStatistic::Accumulate => counts
                .iter()
                .scan(0.0, |total, c| {
                    *total += c;
                    Some(*total)
                })
                .collect(),
            HistogramStatistic::Mean => sums
                .iter()
                .zip(&counts)
                .map(|(s, c)| if *c > 0.0 { s / c } else { f64::NAN })
                .collect(),
        };
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), series)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for TimeHistogramMetric {
    fn bins(&self) -> &Bins {
        &self.bins
    }

    fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;

    fn visits() -> DataSlice {
        DataSlice::new()
            .with_floats("expMJD", vec![100.0, 101.0, 105.0, 112.0, f64::NAN])
            .unwrap()
            .with_floats("airmass", vec![1.0, 1.2, 1.4, 2.0, 1.0])
            .unwrap()
    }

    fn config(statistic: HistogramStatistic) -> TimeHistogramConfig {
        TimeHistogramConfig {
            bins: vec![0.0, 5.0, 10.0, 15.0],
            statistic,
            ..Default::default()
        }
    }

    fn series(metric: &TimeHistogramMetric, data: &DataSlice) -> Vec<f64> {
        let value = metric.run(data, &SlicePoint::new(0)).unwrap();
        value.as_vector().unwrap().values.clone()
    }

    #[test]
    fn test_counts_from_first_visit() {
        let metric = TimeHistogramMetric::new(config(HistogramStatistic::Count)).unwrap();
        assert_eq!(series(&metric, &visits()), vec![2.0, 1.0, 1.0]);
        assert_eq!(metric.bin_labels().len(), 3);
    }

    #[test]
    fn test_accumulate_with_origin() {
        let metric = TimeHistogramMetric::new(TimeHistogramConfig {
            time_origin: Some(95.0),
            ..config(HistogramStatistic::Accumulate)
        })
        .unwrap();
        // offsets 5, 6, 10, 17: the last falls outside
        assert_eq!(series(&metric, &visits()), vec![0.0, 2.0, 3.0]);
        let value = metric.run(&visits(), &SlicePoint::new(0)).unwrap();
        assert_eq!(metric.apply_reduce("Last", &value).unwrap().as_scalar(), Some(3.0));
        assert_eq!(metric.apply_reduce("Total", &value).unwrap().as_scalar(), Some(5.0));
    }

    #[test]
    fn test_mean_per_bin() {
        let metric = TimeHistogramMetric::new(TimeHistogramConfig {
            value_col: Some("airmass".to_string()),
            bins: vec![0.0, 5.0, 10.0, 15.0, 20.0],
            ..config(HistogramStatistic::Mean)
        })
        .unwrap();
        let s = series(&metric, &visits());
        assert!((s[0] - 1.1).abs() < 1e-12);
        assert_eq!(&s[1..3], &[1.4, 2.0]);
        assert!(s[3].is_nan());
        let value = metric.run(&visits(), &SlicePoint::new(0)).unwrap();
        assert!(metric.apply_reduce("Last", &value).unwrap().is_invalid());
        assert_eq!(metric.apply_reduce("Max", &value).unwrap().as_scalar(), Some(2.0));
    }

    #[test]
    fn test_mean_needs_value_column() {
        assert!(TimeHistogramMetric::new(config(HistogramStatistic::Mean)).is_err());
    }

    #[test]
    fn test_value_column_rejected_for_counts() {
        for statistic in [HistogramStatistic::Count, HistogramStatistic::Accumulate] {
            let err = TimeHistogramMetric::new(TimeHistogramConfig {
                value_col: Some("airmass".to_string()),
                ..config(statistic)
            });
            assert!(matches!(
                err,
                Err(MetricError::Config(ConfigError::InvalidValue { ref option, .. }))
                    if option == "value_col"
            ));
        }
    }
}
