//! Technical metrics: state changes (usually filter changes), effective
//! exposure time, shutter efficiency and visit completeness.

use super::MINUTES_PER_DAY;
use crate::astro::FILTERS;
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_non_negative, check_positive, insufficient, metric_info_accessors, Metric, MetricInfo,
    VectorMetric,
};
use crate::reduce::ReduceRegistry;
use crate::value::{Binned, Bins, MetricValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Time-ordered state changes of one column.
struct StateChanges {
    /// Time of the first visit.
    start: f64,
    /// Time of each visit whose state differs from the previous visit.
    times: Vec<f64>,
}

impl StateChanges {
    fn find(data: &DataSlice, change_col: &str, time_col: &str) -> Result<Option<Self>> {
        let times = data.floats(time_col)?;
        let states = data.categories(change_col)?;
        let order: Vec<usize> = data
            .time_order(time_col)?
            .into_iter()
            .filter(|&i| times[i].is_finite())
            .collect();
        let Some(&first) = order.first() else {
            return Ok(None);
        };
        let changes = order
            .windows(2)
            .filter(|w| states[w[0]] != states[w[1]])
            .map(|w| times[w[1]])
            .collect();
        Ok(Some(Self {
            start: times[first],
            times: changes,
        }))
    }

    /// Time elapsed since the previous change (or the first visit), days.
    fn intervals(&self) -> Vec<f64> {
        let mut prev = self.start;
        self.times
            .iter()
            .map(|t| {
                let dt = t - prev;
                prev = *t;
                dt
            })
            .collect()
    }
}

fn state_columns(change_col: &str, time_col: &str) -> Result<ColumnSet> {
    ColumnSet::new()
        .require("change_col", change_col)?
        .require("time_col", time_col)
}

/// Configuration for [`NChangesMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NChangesConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    /// Column whose changes are counted.
    pub col: String,
    /// Column defining visit order.
    pub order_by: String,
}

impl Default for NChangesConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            col: "filter".to_string(),
            order_by: "expMJD".to_string(),
        }
    }
}

/// Number of times a column changes value between consecutive visits.
#[derive(Debug, Clone)]
pub struct NChangesMetric {
    info: MetricInfo,
    config: NChangesConfig,
}

impl NChangesMetric {
    pub fn new(config: NChangesConfig) -> Result<Self> {
        let columns = ColumnSet::new()
            .require("col", &config.col)?
            .require("order_by", &config.order_by)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Number of {} changes", config.col),
            "#",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for NChangesMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        match StateChanges::find(data, &self.config.col, &self.config.order_by)? {
            Some(changes) => Ok(MetricValue::scalar(changes.times.len() as f64)),
            None => Ok(insufficient(&self.info.name, 0, 1)),
        }
    }
}

/// Configuration for [`MinTimeBetweenStatesMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinTimeBetweenStatesConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub change_col: String,
    pub time_col: String,
}

impl Default for MinTimeBetweenStatesConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            change_col: "filter".to_string(),
            time_col: "expMJD".to_string(),
        }
    }
}

/// Shortest time, in minutes, spent in one state before changing.
#[derive(Debug, Clone)]
pub struct MinTimeBetweenStatesMetric {
    info: MetricInfo,
    config: MinTimeBetweenStatesConfig,
}

impl MinTimeBetweenStatesMetric {
    pub fn new(config: MinTimeBetweenStatesConfig) -> Result<Self> {
        let columns = state_columns(&config.change_col, &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Minimum time between {} changes", config.change_col),
            "minutes",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for MinTimeBetweenStatesMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let changes = StateChanges::find(data, &self.config.change_col, &self.config.time_col)?;
        let min = changes
            .map(|c| c.intervals())
            .and_then(|dt| dt.into_iter().min_by(f64::total_cmp));
        match min {
            Some(days) => Ok(MetricValue::scalar(days * MINUTES_PER_DAY)),
            None => Ok(insufficient(&self.info.name, 0, 1)),
        }
    }
}

/// Configuration for [`NStateChangesFasterThanMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NStateChangesFasterThanConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub change_col: String,
    pub time_col: String,
    /// Minutes.
    pub cutoff: f64,
}

impl Default for NStateChangesFasterThanConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            change_col: "filter".to_string(),
            time_col: "expMJD".to_string(),
            cutoff: 20.0,
        }
    }
}

/// Number of state changes that follow the previous change in less than
/// `cutoff` minutes.
#[derive(Debug, Clone)]
pub struct NStateChangesFasterThanMetric {
    info: MetricInfo,
    config: NStateChangesFasterThanConfig,
}

impl NStateChangesFasterThanMetric {
    pub fn new(config: NStateChangesFasterThanConfig) -> Result<Self> {
        check_positive("cutoff", config.cutoff)?;
        let columns = state_columns(&config.change_col, &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!(
                "Number of {} changes faster than <{:.1} minutes",
                config.change_col, config.cutoff
            ),
            "#",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for NStateChangesFasterThanMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let Some(changes) =
            StateChanges::find(data, &self.config.change_col, &self.config.time_col)?
        else {
            return Ok(insufficient(&self.info.name, 0, 1));
        };
        let cutoff = self.config.cutoff / MINUTES_PER_DAY;
        let fast = changes.intervals().iter().filter(|dt| **dt < cutoff).count();
        Ok(MetricValue::scalar(fast as f64))
    }
}

/// Configuration for [`MaxStateChangesWithinMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxStateChangesWithinConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub change_col: String,
    pub time_col: String,
    /// Minutes.
    pub timespan: f64,
}

impl Default for MaxStateChangesWithinConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            change_col: "filter".to_string(),
            time_col: "expMJD".to_string(),
            timespan: 20.0,
        }
    }
}

/// Largest number of other state changes within `timespan` minutes of any
/// one change.
#[derive(Debug, Clone)]
pub struct MaxStateChangesWithinMetric {
    info: MetricInfo,
    config: MaxStateChangesWithinConfig,
}

impl MaxStateChangesWithinMetric {
    pub fn new(config: MaxStateChangesWithinConfig) -> Result<Self> {
        check_positive("timespan", config.timespan)?;
        let columns = state_columns(&config.change_col, &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!(
                "Max number of {} changes within {:.1} minutes",
                config.change_col, config.timespan
            ),
            "#",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for MaxStateChangesWithinMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let Some(changes) =
            StateChanges::find(data, &self.config.change_col, &self.config.time_col)?
        else {
            return Ok(insufficient(&self.info.name, 0, 1));
        };
        let span = self.config.timespan / MINUTES_PER_DAY;
        let times = &changes.times;
        let most = times
            .iter()
            .enumerate()
            .map(|(i, t)| {
                // times are ascending: count the window around t
                let lo = times.partition_point(|u| *u < t - span);
                let hi = times.partition_point(|u| *u <= t + span);
                debug_assert!(lo <= i && i < hi);
                hi - lo - 1
            })
            .max()
            .unwrap_or(0);
        Ok(MetricValue::scalar(most as f64))
    }
}

fn default_fiducial_depth() -> BTreeMap<String, f64> {
    FILTERS
        .iter()
        .zip([23.9, 25.0, 24.7, 24.0, 23.3, 22.1])
        .map(|(f, d)| (f.to_string(), d))
        .collect()
}

/// Configuration for [`TeffMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TeffConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub m5_col: String,
    pub filter_col: String,
    /// Design five-sigma depth per filter.
    pub fiducial_depth: BTreeMap<String, f64>,
    /// Exposure time (seconds) that reaches the fiducial depth.
    pub teff_base: f64,
    /// Divide by the effective time of the same visits at fiducial depth.
    pub normed: bool,
}

impl Default for TeffConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            m5_col: "fiveSigmaDepth".to_string(),
            filter_col: "filter".to_string(),
            fiducial_depth: default_fiducial_depth(),
            teff_base: 30.0,
            normed: false,
        }
    }
}

/// Effective exposure time: each visit contributes
/// `teff_base * 10^(0.8 (m5 - fiducial))`.
#[derive(Debug, Clone)]
pub struct TeffMetric {
    info: MetricInfo,
    config: TeffConfig,
}

impl TeffMetric {
    pub fn new(config: TeffConfig) -> Result<Self> {
        check_positive("teff_base", config.teff_base)?;
        if config.fiducial_depth.is_empty() {
            return Err(ConfigError::invalid("fiducial_depth", "no filters given").into());
        }
        if config.fiducial_depth.values().any(|d| !d.is_finite()) {
            return Err(ConfigError::invalid("fiducial_depth", "depths must be finite").into());
        }
        let columns = ColumnSet::new()
            .require("m5_col", &config.m5_col)?
            .require("filter_col", &config.filter_col)?;
        let units = if config.normed { "fraction" } else { "seconds" };
        let info = MetricInfo::new(&config.metric_name, &config.units, "tEff".to_string(), units, columns);
        Ok(Self { info, config })
    }
}

impl Metric for TeffMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let m5 = data.floats(&self.config.m5_col)?;
        let filters = data.categories(&self.config.filter_col)?;
        let mut used = 0usize;
        let mut teff = 0.0;
        for (depth, filter) in m5.iter().zip(&filters) {
            let Some(fiducial) = self.config.fiducial_depth.get(filter) else {
                continue;
            };
            if depth.is_finite() {
                teff += 10f64.powf(0.8 * (depth - fiducial));
                used += 1;
            }
        }
        if used == 0 {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let value = if self.config.normed {
            teff / used as f64
        } else {
            teff * self.config.teff_base
        };
        Ok(MetricValue::scalar(value))
    }
}

/// Configuration for [`OpenShutterFractionMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenShutterFractionConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub exp_time_col: String,
    pub visit_time_col: String,
    pub slew_time_col: String,
}

impl Default for OpenShutterFractionConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            exp_time_col: "visitExpTime".to_string(),
            visit_time_col: "visitTime".to_string(),
            slew_time_col: "slewTime".to_string(),
        }
    }
}

/// Open-shutter time divided by total visit plus slew time.
#[derive(Debug, Clone)]
pub struct OpenShutterFractionMetric {
    info: MetricInfo,
    config: OpenShutterFractionConfig,
}

impl OpenShutterFractionMetric {
    pub fn new(config: OpenShutterFractionConfig) -> Result<Self> {
        let columns = ColumnSet::new()
            .require("exp_time_col", &config.exp_time_col)?
            .require("visit_time_col", &config.visit_time_col)?
            .require("slew_time_col", &config.slew_time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "OpenShutterFraction".to_string(),
            "OpenShutter/TotalTime",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for OpenShutterFractionMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let exp = data.floats(&self.config.exp_time_col)?;
        let visit = data.floats(&self.config.visit_time_col)?;
        let slew = data.floats(&self.config.slew_time_col)?;
        let (open, total) = exp
            .iter()
            .zip(visit)
            .zip(slew)
            .filter(|((e, v), s)| e.is_finite() && v.is_finite() && s.is_finite())
            .fold((0.0_f64, 0.0_f64), |(open, total), ((e, v), s)| (open + e, total + v + s));
        if total <= 0.0 {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        Ok(MetricValue::scalar(open / total))
    }
}

/// Configuration for [`CompletenessMetric`]: requested visits per filter.
/// Filters left at zero are not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletenessConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub filter_col: String,
    pub u: f64,
    pub g: f64,
    pub r: f64,
    pub i: f64,
    pub z: f64,
    pub y: f64,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            filter_col: "filter".to_string(),
            u: 0.0,
            g: 0.0,
            r: 0.0,
            i: 0.0,
            z: 0.0,
            y: 0.0,
        }
    }
}

/// Visits obtained over visits requested, per requested filter, plus
/// `Joint` (the minimum over filters). Every bin is a reduce function.
#[derive(Debug, Clone)]
pub struct CompletenessMetric {
    info: MetricInfo,
    config: CompletenessConfig,
    requested: Vec<(String, f64)>,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl CompletenessMetric {
    pub fn new(config: CompletenessConfig) -> Result<Self> {
        let counts = [config.u, config.g, config.r, config.i, config.z, config.y];
        for (filter, n) in FILTERS.iter().zip(counts) {
            check_non_negative(filter, n)?;
        }
        let requested: Vec<(String, f64)> = FILTERS
            .iter()
            .zip(counts)
            .filter(|(_, n)| *n > 0.0)
            .map(|(f, n)| (f.to_string(), n))
            .collect();
        if requested.is_empty() {
            return Err(ConfigError::invalid(
                "u/g/r/i/z/y",
                "request visits in at least one filter",
            )
            .into());
        }

        let columns = ColumnSet::new().require("filter_col", &config.filter_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "Completeness".to_string(),
            "fraction",
            columns,
        );
        let mut labels: Vec<String> = requested.iter().map(|(f, _)| f.clone()).collect();
        labels.push("Joint".to_string());
        let bins = Bins::categorical(labels);
        let reducers = ReduceRegistry::new().per_bin(bins.labels());
        Ok(Self {
            info,
            config,
            requested,
            bins: Arc::new(bins),
            reducers,
        })
    }
}

impl Metric for CompletenessMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let filters = data.categories(&self.config.filter_col)?;
        let mut values: Vec<f64> = self
            .requested
            .iter()
            .map(|(f, n)| filters.iter().filter(|v| *v == f).count() as f64 / n)
            .collect();
        let joint = values.iter().copied().fold(f64::INFINITY, f64::min);
        values.push(joint);
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), values)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for CompletenessMetric {
    fn bins(&self) -> &Bins {
        &self.bins
    }

    fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }
}
