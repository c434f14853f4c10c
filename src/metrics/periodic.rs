//! Periodicity metrics for unevenly sampled time series.
//!
//! Power spectra are computed directly at each trial period (Lomb-Scargle
//! with the time offset tau), never through a uniform-grid FFT.

use super::{linear_grid, log_grid, partition_rng, sorted_times};
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_min_samples, check_non_negative, check_positive, insufficient, metric_info_accessors,
    Metric, MetricInfo, VectorMetric,
};
use crate::reduce::{ReduceKind, ReduceRegistry};
use crate::value::{Binned, Bins, MetricValue};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::sync::Arc;

const EPS: f64 = 1e-12;

/// Normalized Lomb-Scargle power of `values` sampled at `times`, one entry
/// per trial period. Power lies in [0, 1]; a constant series has zero power
/// everywhere.
pub fn lomb_scargle(times: &[f64], values: &[f64], periods: &[f64]) -> Vec<f64> {
    let n = times.len().min(values.len());
    if n == 0 {
        return vec![0.0; periods.len()];
    }
    let mean = values[..n].iter().sum::<f64>() / n as f64;
    let y: Vec<f64> = values[..n].iter().map(|v| v - mean).collect();
    let yy: f64 = y.iter().map(|v| v * v).sum();
    if yy <= EPS {
        return vec![0.0; periods.len()];
    }

    periods
        .iter()
        .map(|period| {
            let w = TAU / period;
            let (s2, c2) = times[..n].iter().fold((0.0, 0.0), |(s, c), t| {
                let (sin, cos) = (2.0 * w * t).sin_cos();
                (s + sin, c + cos)
            });
            let tau = s2.atan2(c2) / (2.0 * w);

            let (mut yc, mut ys, mut cc, mut ss) = (0.0, 0.0, 0.0, 0.0);
            for (t, yi) in times[..n].iter().zip(&y) {
                let (sin, cos) = (w * (t - tau)).sin_cos();
                yc += yi * cos;
                ys += yi * sin;
                cc += cos * cos;
                ss += sin * sin;
            }
            let mut power = 0.0;
            if cc > EPS {
                power += yc * yc / cc;
            }
            if ss > EPS {
                power += ys * ys / ss;
            }
            (power / yy).clamp(0.0, 1.0)
        })
        .collect()
}

/// Spectral window |(1/N) sum exp(i w t)|^2 of the sampling times at each
/// trial period. 1 means every visit lands on the same phase.
pub fn spectral_window(times: &[f64], periods: &[f64]) -> Vec<f64> {
    let n = times.len() as f64;
    periods
        .iter()
        .map(|period| {
            if times.is_empty() {
                return 0.0;
            }
            let w = TAU / period;
            let (re, im) = times.iter().fold((0.0, 0.0), |(re, im), t| {
                let (sin, cos) = (w * t).sin_cos();
                (re + cos, im + sin)
            });
            (re * re + im * im) / (n * n)
        })
        .collect()
}

fn check_period_range(min: f64, max: f64) -> Result<()> {
    check_positive("period_min", min)?;
    check_positive("period_max", max)?;
    if max <= min {
        return Err(ConfigError::invalid("period_max", "must exceed period_min").into());
    }
    Ok(())
}

/// Configuration for [`PeriodogramMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeriodogramConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Shortest trial period in days.
    pub period_min: f64,
    /// Longest trial period in days.
    pub period_max: f64,
    /// Number of trial periods, log-spaced.
    pub n_periods: usize,
    pub min_samples: usize,
}

impl Default for PeriodogramConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            period_min: 0.1,
            period_max: 100.0,
            n_periods: 100,
            min_samples: 5,
        }
    }
}

/// Spectral window power of the visit times over a grid of periods.
///
/// Peaks mark periods the cadence aliases onto. Reduces: `MaxPower`,
/// `PeakPeriod`, `Area` (over period), `FracAboveHalf`.
#[derive(Debug, Clone)]
pub struct PeriodogramMetric {
    info: MetricInfo,
    config: PeriodogramConfig,
    bins: Arc<Bins>,
    reducers: ReduceRegistry,
}

impl PeriodogramMetric {
    pub fn new(config: PeriodogramConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_period_range(config.period_min, config.period_max)?;
        if config.n_periods < 2 {
            return Err(ConfigError::invalid("n_periods", "must be at least 2").into());
        }
        let columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Periodogram {}", config.time_col),
            "power",
            columns,
        );
        let periods = log_grid(config.period_min, config.period_max, config.n_periods);
        let reducers = ReduceRegistry::new()
            .with("MaxPower", ReduceKind::Max)
            .with("PeakPeriod", ReduceKind::ArgMaxCenter)
            .with("Area", ReduceKind::Area)
            .with("FracAboveHalf", ReduceKind::FractionAbove(0.5));
        Ok(Self {
            bins: Arc::new(Bins::from_points(&periods, "d")),
            info,
            config,
            reducers,
        })
    }
}

impl Metric for PeriodogramMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let times = sorted_times(data, &self.config.time_col)?;
        if times.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, times.len(), self.config.min_samples));
        }
        let power = spectral_window(&times, self.bins.centers());
        Ok(MetricValue::Vector(Binned::new(self.bins.clone(), power)))
    }

    fn as_vector(&self) -> Option<&dyn VectorMetric> {
        Some(self)
    }
}

impl VectorMetric for PeriodogramMetric {
    fn bins(&self) -> &Bins {
        &self.bins
    }

    fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }
}

/// Configuration for [`PeriodRecoveryMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeriodRecoveryConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub time_col: String,
    /// Injected periods in days.
    pub periods: Vec<f64>,
    pub amplitude: f64,
    /// Gaussian noise sigma added to each injected point.
    pub noise: f64,
    /// Random phases drawn per injected period.
    pub n_phases: usize,
    /// Accepted fractional error of the recovered period.
    pub tolerance: f64,
    /// Search range in days.
    pub period_min: f64,
    pub period_max: f64,
    /// Trial frequencies in the search, evenly spaced in frequency.
    pub n_trial: usize,
    pub seed: u64,
    pub min_samples: usize,
}

impl Default for PeriodRecoveryConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            time_col: "expMJD".to_string(),
            periods: vec![0.5, 2.0, 10.0],
            amplitude: 1.0,
            noise: 0.1,
            n_phases: 5,
            tolerance: 0.05,
            period_min: 0.1,
            period_max: 100.0,
            n_trial: 5000,
            seed: 42,
            min_samples: 10,
        }
    }
}

/// Fraction of injected sinusoids whose periodogram peak lands within
/// `tolerance` of the injected period.
#[derive(Debug, Clone)]
pub struct PeriodRecoveryMetric {
    info: MetricInfo,
    config: PeriodRecoveryConfig,
    search: Vec<f64>,
    noise: Normal<f64>,
}

impl PeriodRecoveryMetric {
    pub fn new(config: PeriodRecoveryConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_period_range(config.period_min, config.period_max)?;
        check_positive("amplitude", config.amplitude)?;
        check_non_negative("noise", config.noise)?;
        check_positive("tolerance", config.tolerance)?;
        if config.periods.is_empty() {
            return Err(ConfigError::invalid("periods", "at least one period is required").into());
        }
        for p in &config.periods {
            check_positive("periods", *p)?;
        }
        if config.n_phases == 0 {
            return Err(ConfigError::invalid("n_phases", "must be at least 1").into());
        }
        if config.n_trial < 2 {
            return Err(ConfigError::invalid("n_trial", "must be at least 2").into());
        }
        let noise = Normal::new(0.0, config.noise)
            .map_err(|e| ConfigError::invalid("noise", e.to_string()))?;

        let columns = ColumnSet::new().require("time_col", &config.time_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("Period recovery {}", config.time_col),
            "fraction",
            columns,
        );
        let search = linear_grid(1.0 / config.period_max, 1.0 / config.period_min, config.n_trial)
            .into_iter()
            .map(|f| 1.0 / f)
            .collect();
        Ok(Self {
            info,
            config,
            search,
            noise,
        })
    }
}

impl Metric for PeriodRecoveryMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), self.config.min_samples));
        }
        let times = sorted_times(data, &self.config.time_col)?;
        if times.len() < self.config.min_samples {
            return Ok(insufficient(&self.info.name, times.len(), self.config.min_samples));
        }

        let mut rng = partition_rng(self.config.seed, slice_point.sid);
        let mut recovered = 0usize;
        let mut trials = 0usize;
        for period in &self.config.periods {
            for _ in 0..self.config.n_phases {
                let phase = rng.gen::<f64>() * TAU;
                let values: Vec<f64> = times
                    .iter()
                    .map(|t| {
                        self.config.amplitude * (TAU * t / period + phase).sin()
                            + self.noise.sample(&mut rng)
                    })
                    .collect();
                let power = lomb_scargle(&times, &values, &self.search);
                let peak = power
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| self.search[i]);
                if let Some(found) = peak {
                    if ((found - period) / period).abs() <= self.config.tolerance {
                        recovered += 1;
                    }
                }
                trials += 1;
            }
        }
        Ok(MetricValue::scalar(recovered as f64 / trials as f64))
    }
}
