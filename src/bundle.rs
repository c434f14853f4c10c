//! Reduction pipeline
//!
//! A [`MetricBundle`] runs one metric over many partitions, applies the
//! selected reduce functions to every vector output, and summarizes each
//! resulting series across partitions.
//!
//! Output series are named `<metric name>` for the raw values and
//! `<metric name> <reduce name>` for reduced ones. Summaries run on scalar
//! series only: the raw series of a scalar metric and every reduced series.

use crate::config::BundleSpec;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::Metric;
use crate::reduce::ReduceFunction;
use crate::summary::SummaryMetric;
use crate::value::{MetricValue, SummaryValue};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One partition handed to a bundle: its rows and its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub point: SlicePoint,
    pub data: DataSlice,
}

impl Partition {
    pub fn new(point: SlicePoint, data: DataSlice) -> Self {
        Self { point, data }
    }
}

/// A metric together with the reduce functions and summaries run after it.
pub struct MetricBundle {
    metric: Box<dyn Metric>,
    reducers: Vec<ReduceFunction>,
    summaries: Vec<SummaryMetric>,
}

impl std::fmt::Debug for MetricBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBundle")
            .field("metric", &self.metric.name())
            .field("reducers", &self.reducers)
            .field("summaries", &self.summaries)
            .finish()
    }
}

impl MetricBundle {
    /// Bundle with no reduce functions and no summaries.
    pub fn new(metric: Box<dyn Metric>) -> Self {
        Self {
            metric,
            reducers: Vec::new(),
            summaries: Vec::new(),
        }
    }

    /// Build from a parsed configuration document.
    pub fn from_spec(spec: &BundleSpec) -> Result<Self> {
        let mut bundle = Self::new(spec.metric.build()?);
        match &spec.reduce {
            Some(names) => {
                for name in names {
                    bundle = bundle.with_reduce(name)?;
                }
            }
            None if bundle.metric.as_vector().is_some() => {
                bundle = bundle.with_all_reduces()?;
            }
            None => {}
        }
        for statistic in &spec.summaries {
            bundle = bundle.with_summary(SummaryMetric::new(statistic.clone())?);
        }
        log::debug!(
            "bundle `{}`: reduces {:?}, {} summaries",
            bundle.metric.name(),
            bundle.reduce_names(),
            bundle.summaries.len()
        );
        Ok(bundle)
    }

    /// Apply the metric's reduce function `name` to every partition value.
    pub fn with_reduce(mut self, name: &str) -> Result<Self> {
        let vector = self
            .metric
            .as_vector()
            .ok_or_else(|| ConfigError::NotAVectorMetric {
                metric: self.metric.name().to_string(),
            })?;
        let reducer = vector.reducers().resolve(self.metric.name(), name)?.clone();
        if !self.reducers.iter().any(|r| r.name() == reducer.name()) {
            self.reducers.push(reducer);
        }
        Ok(self)
    }

    /// Apply every reduce function the metric declares.
    pub fn with_all_reduces(mut self) -> Result<Self> {
        let vector = self
            .metric
            .as_vector()
            .ok_or_else(|| ConfigError::NotAVectorMetric {
                metric: self.metric.name().to_string(),
            })?;
        self.reducers = vector.reducers().iter().cloned().collect();
        Ok(self)
    }

    pub fn with_summary(mut self, summary: SummaryMetric) -> Self {
        self.summaries.push(summary);
        self
    }

    pub fn metric(&self) -> &dyn Metric {
        self.metric.as_ref()
    }

    pub fn reduce_names(&self) -> Vec<&str> {
        self.reducers.iter().map(|r| r.name()).collect()
    }

    /// Evaluate every partition in order.
    pub fn evaluate(&self, partitions: &[Partition]) -> Result<BundleOutput> {
        let values = partitions
            .iter()
            .map(|p| self.run_one(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.assemble(partitions, values))
    }

    /// Evaluate partitions on the rayon thread pool.
    ///
    /// Same output as [`MetricBundle::evaluate`]: values keep the input
    /// order and randomized metrics seed per partition.
    pub fn evaluate_parallel(&self, partitions: &[Partition]) -> Result<BundleOutput> {
        let values = partitions
            .par_iter()
            .map(|p| self.run_one(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.assemble(partitions, values))
    }

    fn run_one(&self, partition: &Partition) -> Result<MetricValue> {
        partition.data.validate(self.metric.columns())?;
        self.metric.run(&partition.data, &partition.point)
    }

    fn assemble(&self, partitions: &[Partition], values: Vec<MetricValue>) -> BundleOutput {
        let name = self.metric.name();
        let mut series = Vec::with_capacity(self.reducers.len() + 1);

        for reducer in &self.reducers {
            let reduced: Vec<MetricValue> = values.iter().map(|v| reducer.apply(v)).collect();
            series.push(self.summarized(format!("{} {}", name, reducer.name()), reduced));
        }
        let raw = if self.metric.as_vector().is_some() {
            OutputSeries {
                name: name.to_string(),
                values,
                summaries: Vec::new(),
            }
        } else {
            self.summarized(name.to_string(), values)
        };
        series.insert(0, raw);

        let invalid = series[0].values.iter().filter(|v| v.is_invalid()).count();
        log::debug!(
            "`{}`: {} partitions, {} invalid",
            name,
            partitions.len(),
            invalid
        );
        BundleOutput {
            metric: name.to_string(),
            units: self.metric.units().to_string(),
            sids: partitions.iter().map(|p| p.point.sid).collect(),
            series,
        }
    }

    fn summarized(&self, name: String, values: Vec<MetricValue>) -> OutputSeries {
        let summaries = self
            .summaries
            .iter()
            .map(|s| SummaryResult {
                name: s.name().to_string(),
                value: s.summarize(&values),
            })
            .collect();
        OutputSeries {
            name,
            values,
            summaries,
        }
    }
}

/// A summary statistic evaluated on one output series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub name: String,
    pub value: SummaryValue,
}

/// Per-partition values of one output, with their summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSeries {
    pub name: String,
    pub values: Vec<MetricValue>,
    pub summaries: Vec<SummaryResult>,
}

impl OutputSeries {
    pub fn summary(&self, name: &str) -> Option<&SummaryValue> {
        self.summaries.iter().find(|s| s.name == name).map(|s| &s.value)
    }
}

/// Everything a bundle produced for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOutput {
    pub metric: String,
    pub units: String,
    /// Partition ids, aligned with every series.
    pub sids: Vec<u64>,
    pub series: Vec<OutputSeries>,
}

impl BundleOutput {
    pub fn series(&self, name: &str) -> Option<&OutputSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;
    use crate::metrics::{SimpleConfig, SimpleMetric, TgapsConfig, TgapsMetric};
    use crate::summary::SummaryStatistic;

    fn partitions() -> Vec<Partition> {
        let times = [vec![0.0, 1.0, 3.0], vec![5.0], vec![2.0, 2.5, 9.0, 10.0]];
        times
            .iter()
            .enumerate()
            .map(|(sid, t)| {
                let data = DataSlice::new()
                    .with_floats("expMJD", t.clone())
                    .unwrap()
                    .with_floats("fiveSigmaDepth", vec![24.0; t.len()])
                    .unwrap();
                Partition::new(SlicePoint::new(sid as u64), data)
            })
            .collect()
    }

    fn tgaps() -> Box<dyn Metric> {
        Box::new(
            TgapsMetric::new(TgapsConfig {
                bins: vec![0.0, 1.0, 10.0],
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_scalar_metric_series() {
        let metric = SimpleMetric::new(SimpleConfig::default()).unwrap();
        let bundle = MetricBundle::new(Box::new(metric))
            .with_summary(SummaryMetric::new(SummaryStatistic::Mean).unwrap());
        let output = bundle.evaluate(&partitions()).unwrap();
        assert_eq!(output.series.len(), 1);
        assert_eq!(output.sids, vec![0, 1, 2]);
        let series = output.series("Mean fiveSigmaDepth").unwrap();
        assert_eq!(series.summary("Mean"), Some(&SummaryValue::Scalar(24.0)));
    }

    #[test]
    fn test_reduced_series() {
        let bundle = MetricBundle::new(tgaps())
            .with_reduce("Total")
            .unwrap()
            .with_summary(SummaryMetric::new(SummaryStatistic::Sum).unwrap());
        let output = bundle.evaluate(&partitions()).unwrap();
        assert_eq!(output.series.len(), 2);
        assert!(output.series[0].summaries.is_empty());
        let total = output.series("Adjacent TGaps expMJD Total").unwrap();
        // the single-visit partition is invalid
        assert!(total.values[1].is_invalid());
        assert_eq!(total.summary("Sum").and_then(|v| v.as_scalar()), Some(5.0));
    }

    #[test]
    fn test_reduce_errors() {
        let metric = SimpleMetric::new(SimpleConfig::default()).unwrap();
        let err = MetricBundle::new(Box::new(metric)).with_reduce("Max");
        assert!(matches!(
            err,
            Err(MetricError::Config(ConfigError::NotAVectorMetric { .. }))
        ));
        let err = MetricBundle::new(tgaps()).with_reduce("Nope");
        assert!(matches!(
            err,
            Err(MetricError::Config(ConfigError::UnknownReduce { .. }))
        ));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let bundle = MetricBundle::new(tgaps());
        let bad = vec![Partition::new(
            SlicePoint::new(0),
            DataSlice::new().with_floats("mjd", vec![1.0]).unwrap(),
        )];
        assert!(matches!(bundle.evaluate(&bad), Err(MetricError::Data(_))));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let bundle = MetricBundle::new(tgaps()).with_all_reduces().unwrap();
        let parts = partitions();
        assert_eq!(
            bundle.evaluate(&parts).unwrap(),
            bundle.evaluate_parallel(&parts).unwrap()
        );
    }

    #[test]
    fn test_from_spec_and_json() {
        let spec = BundleSpec::from_json(
            r#"{"metric": {"metric": "Tgaps", "bins": [0, 1, 10]},
                "summaries": [{"statistic": "Median"}]}"#,
        )
        .unwrap();
        let bundle = MetricBundle::from_spec(&spec).unwrap();
        assert_eq!(bundle.reduce_names(), vec!["Total", "Max", "PeakGap"]);
        let json = bundle.evaluate(&partitions()).unwrap().to_json().unwrap();
        assert!(json.contains("Adjacent TGaps expMJD PeakGap"));
    }
}
