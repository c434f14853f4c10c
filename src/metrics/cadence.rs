//! Cadence and gap metrics.
//!
//! Every metric here sorts the partition by time before differencing, so row
//! order never affects the result.

use super::{histogram, linear_grid, sorted_times};
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_edges, check_min_samples, check_positive, insufficient, metric_info_accessors, Metric,
    MetricInfo, VectorMetric,
};
use crate::reduce::{ReduceKind, ReduceRegistry};
use crate::stats;
use crate::value::{Binned, Bins, MetricValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which successive-visit pairs contribute a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GapScope {
    #[default]
    All,
    /// Only pairs taken in the same night.
    IntraNight,
    /// Only pairs spanning a night boundary.
    InterNight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GapStatistic {
    #[default]
    Median,
    Mean,
    Min,
    Max,
}

/// Configuration for [`VisitGapsMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisitGapsConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Night identifier; read only when `scope` is not `All`.
    pub night_col: String,
    pub scope: GapScope,
    pub statistic: GapStatistic,
    /// Multiplier applied to gaps in days (24 reports hours).
    pub units_factor: f64,
    pub min_samples: usize,
}

impl Default for VisitGapsConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            night_col: "night".to_string(),
            scope: GapScope::All,
            statistic: GapStatistic::Median,
            units_factor: 24.0,
            min_samples: 2,
        }
    }
}

/// Statistic of the time between successive visits.
#[derive(Debug, Clone)]
pub struct VisitGapsMetric {
    info: MetricInfo,
    config: VisitGapsConfig,
}

impl VisitGapsMetric {
    pub fn new(config: VisitGapsConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_positive("units_factor", config.units_factor)?;
        let mut columns = ColumnSet::new().require("time_col", &config.time_col)?;
        if config.scope != GapScope::All {
            columns = columns.require("night_col", &config.night_col)?;
        }
        let scope = match config.scope {
            GapScope::All => "",
            GapScope::IntraNight => " intra-night",
            GapScope::InterNight => " inter-night",
        };
        let default_units = if config.units_factor == 24.0 { "hours" } else { "" };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("{:?}{} gap {}", config.statistic, scope, config.time_col),
            default_units,
            columns,
        );
        Ok(Self { info, config })
    }

    fn gaps(&self, data: &DataSlice) -> Result<Vec<f64>> {
        let times = data.floats(&self.config.time_col)?;
        let order: Vec<usize> = data
            .time_order(&self.config.time_col)?
            .into_iter()
            .filter(|&i| times[i].is_finite())
            .collect();
        let nights = match self.config.scope {
            GapScope::All => None,
            _ => Some(data.categories(&self.config.night_col)?),
        };

        let gaps = order
            .windows(2)
            .filter(|w| match (&nights, self.config.scope) {
                (Some(n), GapScope::IntraNight) => n[w[0]] == n[w[1]],
                (Some(n), GapScope::InterNight) => n[w[0]] != n[w[1]],
                _ => true,
            })
            .map(|w| (times[w[1]] - times[w[0]]) * self.config.units_factor)
            .collect();
        Ok(gaps)
    }
}

impl Metric for VisitGapsMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let gaps = self.gaps(data)?;
        if gaps.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let value = match self.config.statistic {
            GapStatistic::Median => stats::median(&gaps),
            GapStatistic::Mean => stats::mean(&gaps),
            GapStatistic::Min => stats::min(&gaps),
            GapStatistic::Max => stats::max(&gaps),
        };
        Ok(value.map_or(MetricValue::Invalid, MetricValue::scalar))
    }
}

/// Configuration for [`UniformityMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniformityConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Survey start (same units as `time_col`); the earliest visit if unset.
    pub survey_start: Option<f64>,
    /// Survey length in days.
    pub survey_length: f64,
    pub min_samples: usize,
}

impl Default for UniformityConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            survey_start: None,
            survey_length: 3652.5,
            min_samples: 1,
        }
    }
}

/// Maximum distance between the cumulative distribution of visit times and
/// a uniform one over the survey: 0 is perfectly uniform, 1 means every
/// visit happened at the first instant.
#[derive(Debug, Clone)]
pub struct UniformityMetric {
    info: MetricInfo,
    config: UniformityConfig,
}

impl UniformityMetric {
    pub fn new(config: UniformityConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_positive("survey_length", config.survey_length)?;
        if let Some(start) = config.survey_start {
            if !start.is_finite() {
                return Err(ConfigError::invalid("survey_start", "must be finite").into());
            }
        }
        let columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Uniformity {}", config.time_col),
            "fraction",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for UniformityMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let times = sorted_times(data, &self.config.time_col)?;
        if times.len() < self.config.min_samples || times.is_empty() {
            return Ok(insufficient(&self.info.name, times.len(), self.config.min_samples));
        }
        let start = self.config.survey_start.unwrap_or(times[0]);
        let n = times.len() as f64;
        let d_max = times
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let x = ((t - start) / self.config.survey_length).clamp(0.0, 1.0);
                let above = (i + 1) as f64 / n - x;
                let below = x - i as f64 / n;
                above.max(below)
            })
            .fold(0.0, f64::max);
        Ok(MetricValue::scalar(d_max))
    }
}

/// Configuration for [`TgapsMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TgapsConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Histogram edges in days.
    pub bins: Vec<f64>,
    /// Histogram every pairwise separation instead of adjacent gaps.
    pub all_gaps: bool,
    pub min_samples: usize,
}

impl Default for TgapsConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            bins: vec![
                0.0, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0,
            ],
            all_gaps: false,
            min_samples: 2,
        }
    }
}

/// Histogram of time gaps between visits.
///
/// Reduces: `Total` (gaps counted), `Max` (largest bin count), `PeakGap`
/// (center of the most populated bin).
#[derive(Debug, Clone)]
pub struct TgapsMetric {
    info: MetricInfo,
    config: TgapsConfig,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl TgapsMetric {
    pub fn new(config: TgapsConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_edges("bins", &config.bins)?;
        let columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let kind = if config.all_gaps { "All" } else { "Adjacent" };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("{} TGaps {}", kind, config.time_col),
            "count",
            columns,
        );
        let reducers = ReduceRegistry::new()
            .with("Total", ReduceKind::Sum)
            .with("Max", ReduceKind::Max)
            .with("PeakGap", ReduceKind::ArgMaxCenter);
        Ok(Self {
            bins: Arc::new(Bins::from_edges(&config.bins)),
            info,
            config,
            reducers,
        })
    }
}

impl Metric for TgapsMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let times = sorted_times(data, &self.config.time_col)?;
        if times.len() < self.config.min_samples.max(2) {
            return Ok(insufficient(&self.info.name, times.len(), self.config.min_samples));
        }
        let gaps: Vec<f64> = if self.config.all_gaps {
            times
                .iter()
                .enumerate()
                .flat_map(|(i, t)| times[i + 1..].iter().map(move |u| u - t))
                .collect()
        } else {
            times.windows(2).map(|w| w[1] - w[0]).collect()
        };
        let counts = histogram(&gaps, &self.config.bins);
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), counts)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for TgapsMetric {
    fn bins(&self) -> &Bins {
        &self.bins
    }

    fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }
}

/// Configuration for [`PhaseGapMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseGapConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Shortest trial period in days.
    pub period_min: f64,
    /// Longest trial period in days.
    pub period_max: f64,
    /// Number of trial periods, evenly spaced.
    pub n_periods: usize,
    pub min_samples: usize,
}

impl Default for PhaseGapConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            period_min: 3.0,
            period_max: 35.0,
            n_periods: 5,
            min_samples: 3,
        }
    }
}

/// Largest gap in phase coverage for each trial period.
///
/// Values are fractions of a cycle. Reduces: `MeanGap`, `MedianGap`,
/// `LargestGap`, and `WorstPeriod` (period with the largest gap).
#[derive(Debug, Clone)]
pub struct PhaseGapMetric {
    info: MetricInfo,
    config: PhaseGapConfig,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl PhaseGapMetric {
    pub fn new(config: PhaseGapConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_positive("period_min", config.period_min)?;
        check_positive("period_max", config.period_max)?;
        if config.period_max < config.period_min {
            return Err(ConfigError::invalid("period_max", "must not be below period_min").into());
        }
        if config.n_periods == 0 {
            return Err(ConfigError::invalid("n_periods", "must be at least 1").into());
        }
        let columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Phase gap {}", config.time_col),
            "fraction",
            columns,
        );
        let periods = linear_grid(config.period_min, config.period_max, config.n_periods);
        let reducers = ReduceRegistry::new()
            .with("MeanGap", ReduceKind::Mean)
            .with("MedianGap", ReduceKind::Median)
            .with("LargestGap", ReduceKind::Max)
            .with("WorstPeriod", ReduceKind::ArgMaxCenter);
        Ok(Self {
            bins: Arc::new(Bins::from_points(&periods, "d")),
            info,
            config,
            reducers,
        })
    }

    pub fn periods(&self) -> &[f64] {
        self.bins.centers()
    }
}

/// Largest gap between consecutive phases of `times` folded on `period`,
/// including the wrap-around gap.
pub(crate) fn largest_phase_gap(times: &[f64], period: f64) -> f64 {
    let mut phases: Vec<f64> = times.iter().map(|t| t.rem_euclid(period) / period).collect();
    phases.sort_by(f64::total_cmp);
    let (Some(first), Some(last)) = (phases.first(), phases.last()) else {
        return f64::NAN;
    };
    let wrap = 1.0 - last + first;
    phases
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(wrap, f64::max)
}

impl Metric for PhaseGapMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let times = sorted_times(data, &self.config.time_col)?;
        if times.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, times.len(), self.config.min_samples));
        }
        let gaps = self
            .periods()
            .iter()
            .map(|p| largest_phase_gap(&times, *p))
            .collect();
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), gaps)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for PhaseGapMetric {
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

    fn times(t: Vec<f64>) -> DataSlice {
        DataSlice::new().with_floats("expMJD", t).unwrap()
    }

    #[test]
    fn test_visit_gaps_sorted_internally() {
        let metric = VisitGapsMetric::new(VisitGapsConfig {
            statistic: GapStatistic::Max,
            units_factor: 1.0,
            ..Default::default()
        })
        .unwrap();
        let forward = times(vec![1.0, 2.0, 5.0, 5.5]);
        let reverse = times(vec![5.5, 5.0, 2.0, 1.0]);
        let point = SlicePoint::new(0);
        assert_eq!(metric.run(&forward, &point).unwrap().as_scalar(), Some(3.0));
        assert_eq!(
            metric.run(&forward, &point).unwrap(),
            metric.run(&reverse, &point).unwrap()
        );
    }

    #[test]
    fn test_visit_gaps_scopes() {
        let data = DataSlice::new()
            .with_floats("expMJD", vec![1.0, 1.1, 2.0, 2.05])
            .unwrap()
            .with_floats("night", vec![1.0, 1.0, 2.0, 2.0])
            .unwrap();
        let intra = VisitGapsMetric::new(VisitGapsConfig {
            scope: GapScope::IntraNight,
            statistic: GapStatistic::Min,
            units_factor: 1.0,
            ..Default::default()
        })
        .unwrap();
        let inter = VisitGapsMetric::new(VisitGapsConfig {
            scope: GapScope::InterNight,
            units_factor: 1.0,
            ..Default::default()
        })
        .unwrap();
        let point = SlicePoint::new(0);
        let v = intra.run(&data, &point).unwrap().as_scalar().unwrap();
        assert!((v - 0.05).abs() < 1e-9);
        let v = inter.run(&data, &point).unwrap().as_scalar().unwrap();
        assert!((v - 0.9).abs() < 1e-9);
        assert!(intra.columns().contains("night"));
    }

    #[test]
    fn test_single_visit_has_no_gap() {
        let metric = VisitGapsMetric::new(VisitGapsConfig {
            min_samples: 1,
            ..Default::default()
        })
        .unwrap();
        assert!(metric
            .run(&times(vec![3.0]), &SlicePoint::new(0))
            .unwrap()
            .is_invalid());
    }

    #[test]
    fn test_uniformity_extremes() {
        let metric = UniformityMetric::new(UniformityConfig {
            survey_start: Some(0.0),
            survey_length: 10.0,
            ..Default::default()
        })
        .unwrap();
        let point = SlicePoint::new(0);
        let clumped = metric.run(&times(vec![0.0; 4]), &point).unwrap();
        assert_eq!(clumped.as_scalar(), Some(1.0));
        let spread = metric
            .run(&times(vec![1.25, 3.75, 6.25, 8.75]), &point)
            .unwrap()
            .as_scalar()
            .unwrap();
        assert!((spread - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_tgaps_histogram() {
        let metric = TgapsMetric::new(TgapsConfig {
            bins: vec![0.0, 1.0, 5.0],
            ..Default::default()
        })
        .unwrap();
        let value = metric
            .run(&times(vec![0.0, 0.5, 3.0, 3.2, 10.0]), &SlicePoint::new(0))
            .unwrap();
        let binned = value.as_vector().unwrap();
        // gaps 0.5, 2.5, 0.2, 6.8 (last one out of range)
        assert_eq!(binned.values, vec![2.0, 1.0]);
        assert_eq!(metric.apply_reduce("Total", &value).unwrap().as_scalar(), Some(3.0));
        assert_eq!(metric.apply_reduce("PeakGap", &value).unwrap().as_scalar(), Some(0.5));
    }

    #[test]
    fn test_tgaps_all_pairs() {
        let metric = TgapsMetric::new(TgapsConfig {
            bins: vec![0.0, 10.0],
            all_gaps: true,
            ..Default::default()
        })
        .unwrap();
        let value = metric
            .run(&times(vec![0.0, 1.0, 2.0]), &SlicePoint::new(0))
            .unwrap();
        assert_eq!(value.as_vector().unwrap().values, vec![3.0]);
    }

    #[test]
    fn test_phase_gap() {
        assert!((largest_phase_gap(&[0.0, 1.0, 2.0, 3.0], 4.0) - 0.25).abs() < 1e-12);
        // all on one phase: the whole cycle is uncovered
        assert!((largest_phase_gap(&[0.0, 4.0, 8.0], 4.0) - 1.0).abs() < 1e-12);

        let metric = PhaseGapMetric::new(PhaseGapConfig {
            period_min: 2.0,
            period_max: 4.0,
            n_periods: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(metric.bin_labels().len(), 3);
        let value = metric
            .run(&times(vec![0.0, 1.0, 2.0, 3.0]), &SlicePoint::new(0))
            .unwrap();
        // period 2 folds everything onto two phases
        assert_eq!(
            metric.apply_reduce("WorstPeriod", &value).unwrap().as_scalar(),
            Some(2.0)
        );
    }

    #[test]
    fn test_phase_gap_rejects_bad_range() {
        let bad = PhaseGapConfig {
            period_min: 5.0,
            period_max: 1.0,
            ..Default::default()
        };
        assert!(PhaseGapMetric::new(bad).is_err());
    }
}
