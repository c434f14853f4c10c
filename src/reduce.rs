//! Reduce functions for vector metrics.
//!
//! Each vector metric type declares an ordered set of named reducers when
//! it is built. A reducer maps the metric's vector output to one scalar and
//! is total over the metric's bins. Names are resolved at setup time, so an
//! unknown name fails before any partition is evaluated.

use crate::error::{ConfigError, Result};
use crate::stats;
use crate::value::{Binned, MetricValue};
use serde::{Deserialize, Serialize};

/// Transformation applied by a reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReduceKind {
    /// Value of one bin.
    Bin(usize),
    /// Value of the last bin.
    Last,
    Max,
    Min,
    Mean,
    Median,
    Sum,
    /// Center coordinate of the bin holding the maximum value.
    ArgMaxCenter,
    /// Trapezoid-rule area under the values, over bin centers.
    Area,
    /// Fraction of valid bins whose value exceeds the threshold.
    FractionAbove(f64),
}

/// A named reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceFunction {
    name: String,
    kind: ReduceKind,
}

impl ReduceFunction {
    pub fn new(name: &str, kind: ReduceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ReduceKind {
        &self.kind
    }

    /// Reduce a vector value. Invalid input (or a non-vector) yields
    /// `Invalid`; so does a reduction with no valid bins to work on.
    pub fn apply(&self, value: &MetricValue) -> MetricValue {
        match value {
            MetricValue::Vector(binned) => self.reduce(binned),
            MetricValue::Invalid => MetricValue::Invalid,
            MetricValue::Scalar(_) => {
                log::warn!("reducer `{}` applied to a scalar value", self.name);
                MetricValue::Invalid
            }
        }
    }

    fn reduce(&self, binned: &Binned) -> MetricValue {
        let values = &binned.values;
        let result = match self.kind {
            ReduceKind::Bin(i) => values.get(i).copied(),
            ReduceKind::Last => values.last().copied(),
            ReduceKind::Max => stats::max(values),
            ReduceKind::Min => stats::min(values),
            ReduceKind::Mean => stats::mean(values),
            ReduceKind::Median => stats::median(values),
            ReduceKind::Sum => stats::sum(values),
            ReduceKind::ArgMaxCenter => values
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_nan())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .and_then(|(i, _)| binned.bins.centers().get(i).copied()),
            ReduceKind::Area => {
                let (x, y): (Vec<f64>, Vec<f64>) = binned
                    .bins
                    .centers()
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| !v.is_nan())
                    .map(|(c, v)| (*c, *v))
                    .unzip();
                stats::trapezoid(&x, &y)
            }
            ReduceKind::FractionAbove(threshold) => {
                let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                if valid.is_empty() {
                    None
                } else {
                    let above = valid.iter().filter(|v| **v > threshold).count();
                    Some(above as f64 / valid.len() as f64)
                }
            }
        };
        result.map_or(MetricValue::Invalid, MetricValue::scalar)
    }
}

/// Ordered, name-unique collection of reducers declared by a metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReduceRegistry {
    functions: Vec<ReduceFunction>,
}

impl ReduceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a reducer. A repeated name replaces the earlier entry.
    pub fn with(mut self, name: &str, kind: ReduceKind) -> Self {
        match self.functions.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.functions.push(ReduceFunction::new(name, kind)),
        }
        self
    }

    /// One `Bin(i)` reducer per label, named after the label.
    pub fn per_bin<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        for (i, label) in labels.iter().enumerate() {
            self = self.with(label.as_ref(), ReduceKind::Bin(i));
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ReduceFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a reducer, failing with a configuration error if undeclared.
    pub fn resolve(&self, metric: &str, name: &str) -> Result<&ReduceFunction> {
        self.get(name).ok_or_else(|| {
            ConfigError::UnknownReduce {
                metric: metric.to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReduceFunction> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
