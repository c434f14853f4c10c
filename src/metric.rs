//! The metric contract.
//!
//! A metric turns one partition into one [`MetricValue`]. Metrics that emit
//! a vector over fixed bins additionally implement [`VectorMetric`], which
//! exposes the bins and the reduce functions that collapse the vector into
//! named scalars.

use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::reduce::ReduceRegistry;
use crate::value::{Bins, MetricValue};

/// Interface shared by every metric.
///
/// Implementations hold only configuration fixed at construction, so one
/// instance can be evaluated concurrently on disjoint partitions.
pub trait Metric: Send + Sync {
    /// Human-readable name, derived from type and configuration.
    fn name(&self) -> &str;

    /// Output units label.
    fn units(&self) -> &str;

    /// Columns read by [`Metric::run`].
    fn columns(&self) -> &ColumnSet;

    /// Evaluate one partition.
    ///
    /// Returns [`MetricValue::Invalid`] when the partition has too little
    /// usable data: no rows, fewer than the metric's minimum, or no valid
    /// value in a needed column.
    ///
    /// Callers must first check the partition with
    /// `data.validate(metric.columns())`, as [`crate::MetricBundle`] does.
    /// Called on an unvalidated partition, `run` returns
    /// [`crate::DataError::MissingColumn`] for an absent column. A column of
    /// the wrong kind is [`crate::DataError::ColumnType`] either way.
    fn run(&self, data: &DataSlice, slice_point: &SlicePoint) -> Result<MetricValue>;

    /// Vector capability, if the metric produces binned output.
    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        None
    }
}

/// Capability of metrics whose output is a vector over fixed bins.
pub trait VectorMetric: Metric {
    /// Bins of every vector this metric returns; same on every call.
    fn bins(&self) -> &Bins;

    /// Reduce functions declared for this metric type.
    fn reducers(&self) -> &ReduceRegistry;

    fn bin_labels(&self) -> &[String] {
        self.bins().labels()
    }

    /// Declared reduce-function names, in declaration order.
    fn reduce_names(&self) -> Vec<&str> {
        self.reducers().names().collect()
    }

    /// Apply a declared reduce function to a value produced by this metric.
    fn apply_reduce(&self, name: &str, value: &MetricValue) -> Result<MetricValue> {
        let reducer = self.reducers().resolve(self.name(), name)?;
        Ok(reducer.apply(value))
    }
}

/// Name, units and columns, resolved once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricInfo {
    pub name: String,
    pub units: String,
    pub columns: ColumnSet,
}

impl MetricInfo {
    /// Resolve name and units; the `metric_name` and `units` options every
    /// config carries override the defaults.
    pub fn new(
        metric_name: &Option<String>,
        units: &Option<String>,
        default_name: String,
        default_units: &str,
        columns: ColumnSet,
    ) -> Self {
        let info = Self {
            name: metric_name.clone().unwrap_or(default_name),
            units: units.clone().unwrap_or_else(|| default_units.to_string()),
            columns,
        };
        log::debug!(
            "built metric `{}` [{}] reading {:?}",
            info.name,
            info.units,
            info.columns.names().collect::<Vec<_>>()
        );
        info
    }
}

/// The sentinel for a partition with too little usable data.
pub(crate) fn insufficient(metric: &str, usable: usize, needed: usize) -> MetricValue {
    log::trace!("`{}`: {} usable rows, need {}", metric, usable, needed);
    MetricValue::Invalid
}

/// Validate a minimum-sample threshold.
pub(crate) fn check_min_samples(min_samples: usize) -> Result<()> {
    if min_samples == 0 {
        return Err(ConfigError::invalid("min_samples", "must be at least 1").into());
    }
    Ok(())
}

/// Validate a strictly positive finite option.
pub(crate) fn check_positive(option: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::invalid(option, format!("must be positive, got {}", value)).into());
    }
    Ok(())
}

/// Validate a non-negative finite option.
pub(crate) fn check_non_negative(option: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(
            ConfigError::invalid(option, format!("must be non-negative, got {}", value)).into(),
        );
    }
    Ok(())
}

/// Validate a strictly increasing list of finite bin edges.
pub(crate) fn check_edges(option: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(ConfigError::invalid(option, "needs at least two edges").into());
    }
    if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ConfigError::invalid(option, "edges must be finite and increasing").into());
    }
    Ok(())
}

/// Implements the name/units/columns accessors from a `MetricInfo` field.
macro_rules! metric_info_accessors {
    () => {
        fn name(&self) -> &str {
            &self.info.name
        }

        fn units(&self) -> &str {
            &self.info.units
        }

        fn columns(&self) -> &$crate::columns::ColumnSet {
            &self.info.columns
        }
    };
}

pub(crate) use metric_info_accessors;
