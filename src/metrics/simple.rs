//! Single-column statistics.

use crate::columns::ColumnSet;
use crate::data::{finite, DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{check_min_samples, insufficient, metric_info_accessors, Metric, MetricInfo};
use crate::stats;
use crate::value::MetricValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Statistic computed by a [`SimpleMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleStatistic {
    Mean,
    Median,
    Min,
    Max,
    /// Population standard deviation.
    Rms,
    /// (p75 - p25) / 1.349
    RobustRms,
    Sum,
    /// Number of non-missing values.
    Count,
    /// Number of distinct non-missing values; accepts text columns.
    CountUnique,
    /// max - min
    Range,
    /// The `percentile` option, in [0, 100].
    Percentile,
    /// Fraction of values above `cut`.
    FracAbove,
    /// Fraction of values below `cut`.
    FracBelow,
}

/// Configuration for [`SimpleMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimpleConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    /// Column to summarize.
    pub col: String,
    pub statistic: SimpleStatistic,
    /// Used by `Percentile`.
    pub percentile: f64,
    /// Used by `FracAbove` and `FracBelow`.
    pub cut: f64,
    pub min_samples: usize,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            col: "fiveSigmaDepth".to_string(),
            statistic: SimpleStatistic::Mean,
            percentile: 50.0,
            cut: 0.0,
            min_samples: 1,
        }
    }
}

/// One statistic over the non-missing values of one column.
#[derive(Debug, Clone)]
pub struct SimpleMetric {
    info: MetricInfo,
    config: SimpleConfig,
}

impl SimpleMetric {
    pub fn new(config: SimpleConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        if !(0.0..=100.0).contains(&config.percentile) {
            return Err(ConfigError::invalid(
                "percentile",
                format!("must be in [0, 100], got {}", config.percentile),
            )
            .into());
        }
        if config.cut.is_nan() {
            return Err(ConfigError::invalid("cut", "must not be NaN").into());
        }

        let columns = ColumnSet::new().require("col", &config.col)?;
        let label = match config.statistic {
            SimpleStatistic::Percentile => format!("{}th%ile", config.percentile),
            SimpleStatistic::FracAbove => format!("FracAbove {}", config.cut),
            SimpleStatistic::FracBelow => format!("FracBelow {}", config.cut),
            other => format!("{:?}", other),
        };
        let default_units = match config.statistic {
            SimpleStatistic::Count | SimpleStatistic::CountUnique => "#",
            SimpleStatistic::FracAbove | SimpleStatistic::FracBelow => "fraction",
            _ => config.col.as_str(),
        };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("{} {}", label, config.col),
            default_units,
            columns,
        );
        Ok(Self { info, config })
    }

    fn count_unique(&self, data: &DataSlice) -> Result<MetricValue> {
        let distinct: BTreeSet<String> = data
            .categories(&self.config.col)?
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        Ok(MetricValue::scalar(distinct.len() as f64))
    }
}

impl Metric for SimpleMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        if self.config.statistic == SimpleStatistic::CountUnique {
            return self.count_unique(data);
        }

        let values = finite(data.floats(&self.config.col)?);
        if values.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, values.len(), self.config.min_samples));
        }
        let n = values.len() as f64;
        let cut = self.config.cut;
        let result = match self.config.statistic {
            SimpleStatistic::Mean => stats::mean(&values),
            SimpleStatistic::Median => stats::median(&values),
            SimpleStatistic::Min => stats::min(&values),
            SimpleStatistic::Max => stats::max(&values),
            SimpleStatistic::Rms => stats::std(&values),
            SimpleStatistic::RobustRms => stats::robust_rms(&values),
            SimpleStatistic::Sum => stats::sum(&values),
            SimpleStatistic::Count => Some(n),
            SimpleStatistic::Range => stats::max(&values).zip(stats::min(&values)).map(|(a, b)| a - b),
            SimpleStatistic::Percentile => stats::percentile(&values, self.config.percentile),
            SimpleStatistic::FracAbove => Some(values.iter().filter(|v| **v > cut).count() as f64 / n),
            SimpleStatistic::FracBelow => Some(values.iter().filter(|v| **v < cut).count() as f64 / n),
            SimpleStatistic::CountUnique => None,
        };
        Ok(result.map_or(MetricValue::Invalid, MetricValue::scalar))
    }
}
