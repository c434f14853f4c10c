//! Transient detectability.
//!
//! A transient with a linear rise and decline (in magnitudes) repeats every
//! `transient_duration` days across the partition's time span. Each random
//! phase offset shifts the start of that train of light curves; a light
//! curve counts as detected when enough of its visits see it above the
//! signal-to-noise threshold.

use super::partition_rng;
use crate::astro::m5_to_snr;
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_min_samples, check_positive, insufficient, metric_info_accessors, Metric, MetricInfo,
};
use crate::value::MetricValue;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Peak magnitude of the transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeakMag {
    /// Same peak in every filter.
    Uniform(f64),
    /// Peak per filter; visits in other filters never detect the transient.
    PerFilter(BTreeMap<String, f64>),
}

impl PeakMag {
    fn get(&self, filter: &str) -> Option<f64> {
        match self {
            PeakMag::Uniform(m) => Some(*m),
            PeakMag::PerFilter(map) => map.get(filter).copied(),
        }
    }
}

/// Configuration for [`TransientMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransientConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    pub m5_col: String,
    pub filter_col: String,
    /// Magnitude change per day before peak (negative: brightening).
    pub rise_slope: f64,
    /// Magnitude change per day after peak.
    pub decline_slope: f64,
    /// Days from the start of a light curve to its peak.
    pub peak_time: f64,
    /// Light-curve length in days; the train repeats with this period.
    pub transient_duration: f64,
    pub peak_mag: PeakMag,
    pub detect_snr: f64,
    /// Detections required before peak.
    pub n_pre_peak: usize,
    /// Detections required per light curve.
    pub n_per_lc: usize,
    /// Distinct filters required among the detections.
    pub n_filters: usize,
    /// Random phase offsets simulated per partition.
    pub n_offsets: usize,
    pub seed: u64,
    pub min_samples: usize,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            m5_col: "fiveSigmaDepth".to_string(),
            filter_col: "filter".to_string(),
            rise_slope: -2.0,
            decline_slope: 0.5,
            peak_time: 20.0,
            transient_duration: 100.0,
            peak_mag: PeakMag::Uniform(20.0),
            detect_snr: 5.0,
            n_pre_peak: 0,
            n_per_lc: 1,
            n_filters: 1,
            n_offsets: 10,
            seed: 42,
            min_samples: 1,
        }
    }
}

/// Fraction of simulated transients detected.
#[derive(Debug, Clone)]
pub struct TransientMetric {
    info: MetricInfo,
    config: TransientConfig,
}

struct Visit<'a> {
    time: f64,
    m5: f64,
    filter: &'a str,
}

impl TransientMetric {
    pub fn new(config: TransientConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_positive("transient_duration", config.transient_duration)?;
        check_positive("detect_snr", config.detect_snr)?;
        if !(config.rise_slope.is_finite() && config.decline_slope.is_finite()) {
            return Err(ConfigError::invalid("rise_slope", "slopes must be finite").into());
        }
        if !(0.0..=config.transient_duration).contains(&config.peak_time) {
            return Err(ConfigError::invalid(
                "peak_time",
                "must lie within the light curve",
            )
            .into());
        }
        if config.n_offsets == 0 {
            return Err(ConfigError::invalid("n_offsets", "must be at least 1").into());
        }
        if let PeakMag::PerFilter(map) = &config.peak_mag {
            if map.is_empty() {
                return Err(ConfigError::invalid("peak_mag", "no filters given").into());
            }
        }

        let columns = ColumnSet::new()
            .require("time_col", &config.time_col)?
            .require("m5_col", &config.m5_col)?
            .require("filter_col", &config.filter_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Transient detection {:.0}d", config.transient_duration),
            "fraction detected",
            columns,
        );
        Ok(Self { info, config })
    }

    /// Magnitude of the transient `epoch` days after the light curve starts.
    fn light_curve(&self, epoch: f64, peak: f64) -> f64 {
        let c = &self.config;
        if epoch < c.peak_time {
            peak + c.rise_slope * (epoch - c.peak_time)
        } else {
            peak + c.decline_slope * (epoch - c.peak_time)
        }
    }

    fn detected(&self, visits: &[Visit]) -> bool {
        let c = &self.config;
        let mut n_detected = 0;
        let mut n_pre = 0;
        let mut filters = BTreeSet::new();
        for visit in visits {
            n_detected += 1;
            if visit.time < c.peak_time {
                n_pre += 1;
            }
            filters.insert(visit.filter);
        }
        n_detected >= c.n_per_lc && n_pre >= c.n_pre_peak && filters.len() >= c.n_filters
    }
}

impl Metric for TransientMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let c = &self.config;
        let times = data.floats(&c.time_col)?;
        let m5 = data.floats(&c.m5_col)?;
        let filters = data.categories(&c.filter_col)?;

        let mut visits: Vec<Visit> = (0..data.len())
            .filter(|&i| times[i].is_finite() && m5[i].is_finite())
            .map(|i| Visit {
                time: times[i],
                m5: m5[i],
                filter: filters[i].as_str(),
            })
            .collect();
        if visits.len() < c.min_samples {
            return Ok(insufficient(&self.info.name, visits.len(), c.min_samples));
        }
        visits.sort_by(|a, b| a.time.total_cmp(&b.time));
        let t0 = visits[0].time;
        let span = visits[visits.len() - 1].time - t0;

        let mut rng = partition_rng(c.seed, slice_point.sid);
        let mut n_transients = 0usize;
        let mut n_detected = 0usize;
        for _ in 0..c.n_offsets {
            let shift = rng.gen::<f64>() * c.transient_duration;
            let n_curves = ((span + shift) / c.transient_duration).floor() as usize + 1;

            // detections per light curve, with epochs relative to its start
            let mut curves: Vec<Vec<Visit>> = (0..n_curves).map(|_| Vec::new()).collect();
            for visit in &visits {
                let elapsed = visit.time - t0 + shift;
                let index = (elapsed / c.transient_duration).floor() as usize;
                let epoch = elapsed - index as f64 * c.transient_duration;
                let Some(peak) = c.peak_mag.get(visit.filter) else {
                    continue;
                };
                let mag = self.light_curve(epoch, peak);
                if m5_to_snr(mag, visit.m5) >= c.detect_snr {
                    if let Some(curve) = curves.get_mut(index) {
                        curve.push(Visit {
                            time: epoch,
                            m5: visit.m5,
                            filter: visit.filter,
                        });
                    }
                }
            }

            n_transients += n_curves;
            n_detected += curves
                .iter()
                .filter(|curve| self.detected(curve))
                .count();
        }
        Ok(MetricValue::scalar(n_detected as f64 / n_transients as f64))
    }
}
