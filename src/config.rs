//! Typed configuration documents
//!
//! A [`MetricSpec`] names a metric type and carries its options:
//!
//! ```json
//! { "metric": "VisitGaps", "scope": "InterNight", "statistic": "Median" }
//! ```
//!
//! A [`BundleSpec`] adds the reduce functions and summaries to run on top.
//! Unknown keys and unknown type names are rejected when the document is
//! parsed; option values are validated when the metric is built.

use crate::error::Result;
use crate::metric::Metric;
use crate::metrics::*;
use crate::summary::SummaryStatistic;
use serde::{Deserialize, Serialize};

/// Metric type plus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric")]
pub enum MetricSpec {
    Simple(SimpleConfig),
    VisitGaps(VisitGapsConfig),
    Uniformity(UniformityConfig),
    Tgaps(TgapsConfig),
    PhaseGap(PhaseGapConfig),
    Periodogram(PeriodogramConfig),
    PeriodRecovery(PeriodRecoveryConfig),
    VisitGroups(VisitGroupsConfig),
    PairFraction(PairFractionConfig),
    Transient(TransientConfig),
    NChanges(NChangesConfig),
    MinTimeBetweenStates(MinTimeBetweenStatesConfig),
    NStateChangesFasterThan(NStateChangesFasterThanConfig),
    MaxStateChangesWithin(MaxStateChangesWithinConfig),
    Teff(TeffConfig),
    OpenShutterFraction(OpenShutterFractionConfig),
    Completeness(CompletenessConfig),
    Parallax(ParallaxConfig),
    ProperMotion(ProperMotionConfig),
    ParallaxCoverage(ParallaxCoverageConfig),
    ParallaxHaDegen(ParallaxHaDegenConfig),
    RadiusObs(RadiusObsConfig),
    TimeHistogram(TimeHistogramConfig),
}

impl MetricSpec {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build and validate the configured metric.
    pub fn build(&self) -> Result<Box<dyn Metric>> {
        let metric: Box<dyn Metric> = match self {
            MetricSpec::Simple(c) => Box::new(SimpleMetric::new(c.clone())?),
            MetricSpec::VisitGaps(c) => Box::new(VisitGapsMetric::new(c.clone())?),
            MetricSpec::Uniformity(c) => Box::new(UniformityMetric::new(c.clone())?),
            MetricSpec::Tgaps(c) => Box::new(TgapsMetric::new(c.clone())?),
            MetricSpec::PhaseGap(c) => Box::new(PhaseGapMetric::new(c.clone())?),
            MetricSpec::Periodogram(c) => Box::new(PeriodogramMetric::new(c.clone())?),
            MetricSpec::PeriodRecovery(c) => Box::new(PeriodRecoveryMetric::new(c.clone())?),
            MetricSpec::VisitGroups(c) => Box::new(VisitGroupsMetric::new(c.clone())?),
            MetricSpec::PairFraction(c) => Box::new(PairFractionMetric::new(c.clone())?),
            MetricSpec::Transient(c) => Box::new(TransientMetric::new(c.clone())?),
            MetricSpec::NChanges(c) => Box::new(NChangesMetric::new(c.clone())?),
            MetricSpec::MinTimeBetweenStates(c) => {
                Box::new(MinTimeBetweenStatesMetric::new(c.clone())?)
            }
            MetricSpec::NStateChangesFasterThan(c) => {
                Box::new(NStateChangesFasterThanMetric::new(c.clone())?)
            }
            MetricSpec::MaxStateChangesWithin(c) => {
                Box::new(MaxStateChangesWithinMetric::new(c.clone())?)
            }
            MetricSpec::Teff(c) => Box::new(TeffMetric::new(c.clone())?),
            MetricSpec::OpenShutterFraction(c) => {
                Box::new(OpenShutterFractionMetric::new(c.clone())?)
            }
            MetricSpec::Completeness(c) => Box::new(CompletenessMetric::new(c.clone())?),
            MetricSpec::Parallax(c) => Box::new(ParallaxMetric::new(c.clone())?),
            MetricSpec::ProperMotion(c) => Box::new(ProperMotionMetric::new(c.clone())?),
            MetricSpec::ParallaxCoverage(c) => Box::new(ParallaxCoverageMetric::new(c.clone())?),
            MetricSpec::ParallaxHaDegen(c) => Box::new(ParallaxHaDegenMetric::new(c.clone())?),
            MetricSpec::RadiusObs(c) => Box::new(RadiusObsMetric::new(c.clone())?),
            MetricSpec::TimeHistogram(c) => Box::new(TimeHistogramMetric::new(c.clone())?),
        };
        Ok(metric)
    }
}

/// Summary statistic configuration, tagged by `"statistic"`.
pub type SummarySpec = SummaryStatistic;

/// A metric with its reduce functions and summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSpec {
    pub metric: MetricSpec,
    /// Reduce functions to apply; every declared one when unset.
    #[serde(default)]
    pub reduce: Option<Vec<String>>,
    #[serde(default)]
    pub summaries: Vec<SummarySpec>,
}

impl BundleSpec {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
