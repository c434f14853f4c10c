//! Visit grouping metrics.
//!
//! A group is a maximal run of time-adjacent visits: walking the visits in
//! time order, a visit joins the current group iff its separation from the
//! previous visit is at most `gap` (and, in [`FilterMode::Same`], it was
//! taken in the same filter).

use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_min_samples, check_non_negative, insufficient, metric_info_accessors, Metric,
    MetricInfo, VectorMetric,
};
use crate::reduce::ReduceRegistry;
use crate::stats;
use crate::value::{Binned, Bins, MetricValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::MINUTES_PER_DAY;

/// Whether a filter change breaks a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Filters are ignored.
    #[default]
    Any,
    /// Consecutive visits must share a filter.
    Same,
}

/// One group of visits.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitGroup {
    /// Row indices into the partition, in time order.
    pub indices: Vec<usize>,
    pub start: f64,
    pub end: f64,
}

impl VisitGroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Partition visits into groups with a single forward scan over time.
///
/// Visits with a missing time are skipped. Ties in time keep input order.
pub fn group_visits(
    times: &[f64],
    filters: Option<&[String]>,
    gap: f64,
    mode: FilterMode,
) -> Vec<VisitGroup> {
    let mut order: Vec<usize> = (0..times.len()).filter(|&i| times[i].is_finite()).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let same_filter = |a: usize, b: usize| match (mode, filters) {
        (FilterMode::Same, Some(f)) => f[a] == f[b],
        _ => true,
    };

    let mut groups: Vec<VisitGroup> = Vec::new();
    let mut prev: Option<usize> = None;
    for i in order {
        match (prev, groups.last_mut()) {
            (Some(p), Some(current)) if times[i] - times[p] <= gap && same_filter(p, i) => {
                current.indices.push(i);
                current.end = times[i];
            }
            _ => groups.push(VisitGroup {
                indices: vec![i],
                start: times[i],
                end: times[i],
            }),
        }
        prev = Some(i);
    }
    groups
}

const GROUP_BINS: [&str; 5] = [
    "NGroups",
    "NVisitsInGroups",
    "MeanGroupSize",
    "MaxGroupSize",
    "MeanDuration",
];

/// Configuration for [`VisitGroupsMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisitGroupsConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Read only in `FilterMode::Same`.
    pub filter_col: String,
    /// Largest separation inside a group, days.
    pub gap: f64,
    pub filter_mode: FilterMode,
    /// Groups smaller than this are not counted.
    pub min_group_size: usize,
    pub min_samples: usize,
}

impl Default for VisitGroupsConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            filter_col: "filter".to_string(),
            gap: 90.0 / MINUTES_PER_DAY,
            filter_mode: FilterMode::Any,
            min_group_size: 2,
            min_samples: 1,
        }
    }
}

fn grouping_columns(
    time_col: &str,
    filter_col: &str,
    mode: FilterMode,
) -> Result<ColumnSet> {
    let columns = ColumnSet::new().require("time_col", time_col)?;
    match mode {
        FilterMode::Any => Ok(columns),
        FilterMode::Same => columns.require("filter_col", filter_col),
    }
}

fn partition_groups(
    data: &DataSlice,
    time_col: &str,
    filter_col: &str,
    gap: f64,
    mode: FilterMode,
) -> Result<Vec<VisitGroup>> {
    let times = data.floats(time_col)?;
    let filters = match mode {
        FilterMode::Any => None,
        FilterMode::Same => Some(data.categories(filter_col)?),
    };
    Ok(group_visits(times, filters.as_deref(), gap, mode))
}

/// Statistics of visit groups. Bins (each also a reduce function):
/// `NGroups`, `NVisitsInGroups`, `MeanGroupSize`, `MaxGroupSize`, and
/// `MeanDuration` in minutes.
#[derive(Debug, Clone)]
pub struct VisitGroupsMetric {
    info: MetricInfo,
    config: VisitGroupsConfig,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl VisitGroupsMetric {
    pub fn new(config: VisitGroupsConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_min_samples(config.min_group_size)
            .map_err(|_| ConfigError::invalid("min_group_size", "must be at least 1"))?;
        check_non_negative("gap", config.gap)?;
        let columns = grouping_columns(&config.time_col, &config.filter_col, config.filter_mode)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Visit groups {}", config.time_col),
            "visits",
            columns,
        );
        let bins = Bins::categorical(GROUP_BINS.to_vec());
        let reducers = ReduceRegistry::new().per_bin(bins.labels());
        Ok(Self {
            info,
            config,
            bins: Arc::new(bins),
            reducers,
        })
    }
}

impl Metric for VisitGroupsMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let all = partition_groups(
            data,
            &self.config.time_col,
            &self.config.filter_col,
            self.config.gap,
            self.config.filter_mode,
        )?;
        // visits with a usable time
        let usable: usize = all.iter().map(VisitGroup::len).sum();
        if usable < self.config.min_samples || usable == 0 {
            return Ok(insufficient(&self.info.name, usable, self.config.min_samples));
        }
        let groups: Vec<VisitGroup> = all
            .into_iter()
            .filter(|g| g.len() >= self.config.min_group_size)
            .collect();

        let in_groups: usize = groups.iter().map(VisitGroup::len).sum();
        let sizes: Vec<f64> = groups.iter().map(|g| g.len() as f64).collect();
        let durations: Vec<f64> = groups
            .iter()
            .map(|g| g.duration() * MINUTES_PER_DAY)
            .collect();
        let values = vec![
            groups.len() as f64,
            in_groups as f64,
            stats::mean(&sizes).unwrap_or(f64::NAN),
            stats::max(&sizes).unwrap_or(f64::NAN),
            stats::mean(&durations).unwrap_or(f64::NAN),
        ];
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), values)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for VisitGroupsMetric {
    fn bins(&self) -> &Bins {
        &self.bins
    }

    fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }
}

/// Configuration for [`PairFractionMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairFractionConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    pub filter_col: String,
    /// Largest separation inside a pair, days.
    pub gap: f64,
    pub filter_mode: FilterMode,
    pub min_samples: usize,
}

impl Default for PairFractionConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            filter_col: "filter".to_string(),
            gap: 90.0 / MINUTES_PER_DAY,
            filter_mode: FilterMode::Any,
            min_samples: 1,
        }
    }
}

/// Fraction of visits that belong to a group of two or more.
#[derive(Debug, Clone)]
pub struct PairFractionMetric {
    info: MetricInfo,
    config: PairFractionConfig,
}

impl PairFractionMetric {
    pub fn new(config: PairFractionConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_non_negative("gap", config.gap)?;
        let columns = grouping_columns(&config.time_col, &config.filter_col, config.filter_mode)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Pair fraction {}", config.time_col),
            "fraction",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for PairFractionMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let groups = partition_groups(
            data,
            &self.config.time_col,
            &self.config.filter_col,
            self.config.gap,
            self.config.filter_mode,
        )?;
        let total: usize = groups.iter().map(VisitGroup::len).sum();
        if total < self.config.min_samples || total == 0 {
            return Ok(insufficient(&self.info.name, total, self.config.min_samples));
        }
        let paired: usize = groups.iter().filter(|g| g.len() >= 2).map(VisitGroup::len).sum();
        Ok(MetricValue::scalar(paired as f64 / total as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(groups: &[VisitGroup]) -> Vec<Vec<usize>> {
        groups.iter().map(|g| g.indices.clone()).collect()
    }

    #[test]
    fn test_two_groups_with_inclusive_threshold() {
        let groups = group_visits(&[0.0, 1.0, 2.0, 10.0, 11.0], None, 3.0, FilterMode::Any);
        assert_eq!(sets(&groups), vec![vec![0, 1, 2], vec![3, 4]]);

        // separation equal to the threshold stays in the group
        let groups = group_visits(&[0.0, 3.0], None, 3.0, FilterMode::Any);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_grouping_ignores_row_order() {
        let groups = group_visits(&[11.0, 2.0, 10.0, 0.0, 1.0], None, 3.0, FilterMode::Any);
        assert_eq!(sets(&groups), vec![vec![3, 4, 1], vec![2, 0]]);
        assert_eq!(groups[1].duration(), 1.0);
    }

    #[test]
    fn test_filter_change_splits_group() {
        let filters: Vec<String> = ["g", "g", "r"].iter().map(|s| s.to_string()).collect();
        let same = group_visits(&[0.0, 0.01, 0.02], Some(&filters), 1.0, FilterMode::Same);
        assert_eq!(same.len(), 2);
        let any = group_visits(&[0.0, 0.01, 0.02], Some(&filters), 1.0, FilterMode::Any);
        assert_eq!(any.len(), 1);
    }

    #[test]
    fn test_visit_groups_metric() {
        let metric = VisitGroupsMetric::new(VisitGroupsConfig {
            gap: 3.0,
            ..Default::default()
        })
        .unwrap();
        let data = DataSlice::new()
            .with_floats("expMJD", vec![0.0, 1.0, 2.0, 10.0, 11.0, 30.0])
            .unwrap();
        let value = metric.run(&data, &SlicePoint::new(0)).unwrap();
        let binned = value.as_vector().unwrap();
        assert_eq!(&binned.values[..4], &[2.0, 5.0, 2.5, 3.0]);
        assert_eq!(binned.values[4], 1.5 * MINUTES_PER_DAY);
        assert_eq!(
            metric.apply_reduce("NGroups", &value).unwrap().as_scalar(),
            Some(2.0)
        );
        assert_eq!(metric.reduce_names(), GROUP_BINS.to_vec());
    }

    #[test]
    fn test_visit_groups_without_usable_times() {
        let metric = VisitGroupsMetric::new(VisitGroupsConfig::default()).unwrap();
        let data = DataSlice::new()
            .with_floats("expMJD", vec![f64::NAN; 6])
            .unwrap();
        assert!(metric.run(&data, &SlicePoint::new(0)).unwrap().is_invalid());

        // one usable visit is enough, even when it forms no group
        let data = DataSlice::new()
            .with_floats("expMJD", vec![f64::NAN, 5.0, f64::NAN])
            .unwrap();
        let value = metric.run(&data, &SlicePoint::new(0)).unwrap();
        let binned = value.as_vector().unwrap();
        assert_eq!(binned.values[0], 0.0);
        assert!(binned.values[1].is_sign_positive());
        assert_eq!(binned.values[1], 0.0);
    }

    #[test]
    fn test_visit_groups_min_samples_counts_usable_visits() {
        let metric = VisitGroupsMetric::new(VisitGroupsConfig {
            min_samples: 3,
            ..Default::default()
        })
        .unwrap();
        let data = DataSlice::new()
            .with_floats("expMJD", vec![0.0, 0.01, f64::NAN, f64::NAN])
            .unwrap();
        assert!(metric.run(&data, &SlicePoint::new(0)).unwrap().is_invalid());
    }

    #[test]
    fn test_pair_fraction() {
        let metric = PairFractionMetric::new(PairFractionConfig {
            gap: 3.0,
            ..Default::default()
        })
        .unwrap();
        let data = DataSlice::new()
            .with_floats("expMJD", vec![0.0, 1.0, 20.0, 40.0])
            .unwrap();
        assert_eq!(
            metric.run(&data, &SlicePoint::new(0)).unwrap().as_scalar(),
            Some(0.5)
        );
        assert!(!metric.columns().contains("filter"));
    }
}
