//! Values produced by metrics and summaries.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered bins of a vector metric.
///
/// `labels` name the bins for display; `centers` carry a numeric
/// coordinate per bin (a period, a gap length, a time) that reducers such
/// as `PeakPeriod` or `Area` use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bins {
    labels: Vec<String>,
    centers: Vec<f64>,
}

impl Bins {
    /// Bins with explicit labels and numeric centers of equal length.
    pub fn new(labels: Vec<String>, centers: Vec<f64>) -> Self {
        debug_assert_eq!(labels.len(), centers.len());
        Self { labels, centers }
    }

    /// Categorical bins; centers are the bin indices.
    pub fn categorical<S: Into<String>>(labels: Vec<S>) -> Self {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let centers = (0..labels.len()).map(|i| i as f64).collect();
        Self { labels, centers }
    }

    /// Bins built from `n + 1` ascending edges. Labels read `[lo, hi)`.
    pub fn from_edges(edges: &[f64]) -> Self {
        let labels = edges
            .windows(2)
            .map(|w| format!("[{}, {})", w[0], w[1]))
            .collect();
        let centers = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        Self { labels, centers }
    }

    /// Bins at the given numeric points, labelled with `unit` suffix.
    pub fn from_points(points: &[f64], unit: &str) -> Self {
        let labels = points.iter().map(|p| format!("{:.4} {}", p, unit)).collect();
        Self {
            labels,
            centers: points.to_vec(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Vector output of a metric, tagged with its bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binned {
    pub bins: Arc<Bins>,
    pub values: Vec<f64>,
}

impl Binned {
    pub fn new(bins: Arc<Bins>, values: Vec<f64>) -> Self {
        debug_assert_eq!(bins.len(), values.len());
        Self { bins, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of one metric evaluation on one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Scalar(f64),
    Vector(Binned),
    /// The partition held too little usable data.
    Invalid,
}

impl MetricValue {
    /// Scalar result, mapping non-finite numbers to `Invalid`.
    pub fn scalar(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Scalar(value)
        } else {
            MetricValue::Invalid
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MetricValue::Invalid)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Binned> {
        match self {
            MetricValue::Vector(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::scalar(value)
    }
}

/// Output of a summary statistic over many partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SummaryValue {
    Scalar(f64),
    Invalid,
    /// Every partition value in input order; invalid entries are `None`.
    Passthrough(Vec<Option<f64>>),
}

impl SummaryValue {
    pub fn scalar(value: f64) -> Self {
        if value.is_finite() {
            SummaryValue::Scalar(value)
        } else {
            SummaryValue::Invalid
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            SummaryValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, SummaryValue::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_scalar_is_invalid() {
        assert!(MetricValue::scalar(f64::NAN).is_invalid());
        assert!(MetricValue::scalar(f64::INFINITY).is_invalid());
        assert_eq!(MetricValue::scalar(2.0).as_scalar(), Some(2.0));
    }

    #[test]
    fn test_bins_from_edges() {
        let bins = Bins::from_edges(&[0.0, 1.0, 3.0]);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.centers(), &[0.5, 2.0]);
        assert_eq!(bins.labels()[1], "[1, 3)");
    }

    #[test]
    fn test_categorical_bins() {
        let bins = Bins::categorical(vec!["u", "g", "Joint"]);
        assert_eq!(bins.position("Joint"), Some(2));
        assert_eq!(bins.position("y"), None);
    }

    #[test]
    fn test_value_serialization() {
        let bins = Arc::new(Bins::categorical(vec!["a", "b"]));
        let value = MetricValue::Vector(Binned::new(bins, vec![1.0, 2.0]));
        let json = serde_json::to_string(&value).unwrap();
        let parsed: MetricValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
