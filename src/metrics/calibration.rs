//! Astrometric calibration metrics.
//!
//! Per-visit centroid errors come from the signal-to-noise of a fiducial
//! star in each visit, combined in quadrature with a floor for atmospheric
//! centroiding error. Seeing and `atm_err` are in arcseconds.

use crate::astro::{
    angular_distance, astrometric_precision, m5_to_snr, sigma_slope, stellar_mags, SedTemplate,
};
use crate::columns::ColumnSet;
use crate::data::{DataSlice, SlicePoint};
use crate::error::{ConfigError, Result};
use crate::metric::{
    check_min_samples, check_non_negative, check_positive, insufficient, metric_info_accessors,
    Metric, MetricInfo,
};
use crate::stats;
use crate::value::MetricValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

const DAYS_PER_YEAR: f64 = 365.25;
const MAS_PER_ARCSEC: f64 = 1e3;

/// Fiducial star whose centroid errors the metrics estimate.
#[derive(Debug, Clone)]
struct FiducialStar {
    mags: BTreeMap<String, f64>,
    atm_err: f64,
}

impl FiducialStar {
    fn new(template: SedTemplate, rmag: f64, atm_err: f64) -> Result<Self> {
        if !rmag.is_finite() {
            return Err(ConfigError::invalid("rmag", "must be finite").into());
        }
        check_non_negative("atm_err", atm_err)?;
        Ok(Self {
            mags: stellar_mags(template, rmag),
            atm_err,
        })
    }

    /// SNR of the star per visit; NaN for filters without a magnitude.
    fn snr(&self, filters: &[String], m5: &[f64]) -> Vec<f64> {
        filters
            .iter()
            .zip(m5)
            .map(|(f, depth)| match self.mags.get(f) {
                Some(mag) => m5_to_snr(*mag, *depth),
                None => f64::NAN,
            })
            .collect()
    }

    /// Centroid error (arcsec) of a visit with the given seeing and SNR.
    fn position_error(&self, seeing: f64, snr: f64) -> f64 {
        astrometric_precision(seeing, snr).hypot(self.atm_err)
    }
}

/// Columns and per-visit quantities shared by the parallax metrics.
struct Visits {
    snr: Vec<f64>,
    error: Vec<f64>,
    ra_pi: Vec<f64>,
    dec_pi: Vec<f64>,
}

impl Visits {
    /// Visits with a finite positive error and finite parallax factors.
    fn load(
        data: &DataSlice,
        star: &FiducialStar,
        cols: &PhotometryColumns,
        ra_pi_col: &str,
        dec_pi_col: &str,
    ) -> Result<Self> {
        let filters = data.categories(&cols.filter_col)?;
        let m5 = data.floats(&cols.m5_col)?;
        let seeing = data.floats(&cols.seeing_col)?;
        let ra_pi = data.floats(ra_pi_col)?;
        let dec_pi = data.floats(dec_pi_col)?;
        let snr = star.snr(&filters, m5);

        let mut visits = Visits {
            snr: Vec::new(),
            error: Vec::new(),
            ra_pi: Vec::new(),
            dec_pi: Vec::new(),
        };
        for i in 0..data.len() {
            let error = star.position_error(seeing[i], snr[i]);
            if error.is_finite() && error > 0.0 && ra_pi[i].is_finite() && dec_pi[i].is_finite() {
                visits.snr.push(snr[i]);
                visits.error.push(error);
                visits.ra_pi.push(ra_pi[i]);
                visits.dec_pi.push(dec_pi[i]);
            }
        }
        Ok(visits)
    }

    fn len(&self) -> usize {
        self.error.len()
    }
}

/// Column names every photometric calibration metric reads.
#[derive(Debug, Clone)]
struct PhotometryColumns {
    m5_col: String,
    filter_col: String,
    seeing_col: String,
}

impl PhotometryColumns {
    fn require(&self, columns: ColumnSet) -> Result<ColumnSet> {
        columns
            .require("m5_col", &self.m5_col)?
            .require("filter_col", &self.filter_col)?
            .require_with_units("seeing_col", &self.seeing_col, "arcsec")
    }
}

/// Parallax uncertainty from independent fits along each axis, combined.
/// Milliarcseconds; `None` when no visit constrains the parallax.
fn parallax_sigma(error: &[f64], ra_pi: &[f64], dec_pi: &[f64]) -> Option<f64> {
    let info: f64 = error
        .iter()
        .zip(ra_pi.iter().zip(dec_pi))
        .map(|(e, (a, b))| (a / e).powi(2) + (b / e).powi(2))
        .sum();
    (info > 0.0).then(|| MAS_PER_ARCSEC / info.sqrt())
}

/// Configuration for [`ParallaxMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallaxConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub m5_col: String,
    pub time_col: String,
    pub filter_col: String,
    pub seeing_col: String,
    pub ra_pi_col: String,
    pub dec_pi_col: String,
    /// r-band magnitude of the fiducial star.
    pub rmag: f64,
    pub sed_template: SedTemplate,
    /// Atmospheric centroiding floor, arcsec.
    pub atm_err: f64,
    /// Report the best achievable uncertainty (every visit at full parallax
    /// factor along RA) divided by the actual one.
    pub normalize: bool,
    pub min_samples: usize,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            m5_col: "fiveSigmaDepth".to_string(),
            time_col: "expMJD".to_string(),
            filter_col: "filter".to_string(),
            seeing_col: "FWHMgeom".to_string(),
            ra_pi_col: "ra_pi_amp".to_string(),
            dec_pi_col: "dec_pi_amp".to_string(),
            rmag: 20.0,
            sed_template: SedTemplate::Flat,
            atm_err: 0.01,
            normalize: false,
            min_samples: 2,
        }
    }
}

/// Expected parallax uncertainty of the fiducial star.
#[derive(Debug, Clone)]
pub struct ParallaxMetric {
    info: MetricInfo,
    config: ParallaxConfig,
    photometry: PhotometryColumns,
    star: FiducialStar,
}

impl ParallaxMetric {
    pub fn new(config: ParallaxConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        let star = FiducialStar::new(config.sed_template, config.rmag, config.atm_err)?;
        let photometry = PhotometryColumns {
            m5_col: config.m5_col.clone(),
            filter_col: config.filter_col.clone(),
            seeing_col: config.seeing_col.clone(),
        };
        let columns = photometry.require(
            ColumnSet::new()
                .require("time_col", &config.time_col)?
                .require("ra_pi_col", &config.ra_pi_col)?
                .require("dec_pi_col", &config.dec_pi_col)?,
        )?;
        let units = if config.normalize { "ratio" } else { "mas" };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "Parallax".to_string(),
            units,
            columns,
        );
        Ok(Self {
            info,
            config,
            photometry,
            star,
        })
    }
}

impl Metric for ParallaxMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        let needed = self.config.min_samples;
        if data.len() < needed {
            return Ok(insufficient(&self.info.name, data.len(), needed));
        }
        let visits = Visits::load(
            data,
            &self.star,
            &self.photometry,
            &self.config.ra_pi_col,
            &self.config.dec_pi_col,
        )?;
        if visits.len() < needed {
            return Ok(insufficient(&self.info.name, visits.len(), needed));
        }
        let Some(sigma) = parallax_sigma(&visits.error, &visits.ra_pi, &visits.dec_pi) else {
            return Ok(insufficient(&self.info.name, 0, needed));
        };
        if !self.config.normalize {
            return Ok(MetricValue::scalar(sigma));
        }
        let ones = vec![1.0; visits.len()];
        let zeros = vec![0.0; visits.len()];
        let best = parallax_sigma(&visits.error, &ones, &zeros);
        Ok(best.map_or(MetricValue::Invalid, |best| MetricValue::scalar(best / sigma)))
    }
}

/// Configuration for [`ProperMotionMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProperMotionConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub m5_col: String,
    pub time_col: String,
    pub filter_col: String,
    pub seeing_col: String,
    pub rmag: f64,
    pub sed_template: SedTemplate,
    pub atm_err: f64,
    /// Report the uncertainty of a survey with half its visits at the start
    /// and half at the end of `baseline` divided by the actual one.
    pub normalize: bool,
    /// Survey length in years, for normalization.
    pub baseline: f64,
    pub min_samples: usize,
}

impl Default for ProperMotionConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            m5_col: "fiveSigmaDepth".to_string(),
            time_col: "expMJD".to_string(),
            filter_col: "filter".to_string(),
            seeing_col: "FWHMgeom".to_string(),
            rmag: 20.0,
            sed_template: SedTemplate::Flat,
            atm_err: 0.01,
            normalize: false,
            baseline: 10.0,
            min_samples: 2,
        }
    }
}

/// Expected proper-motion uncertainty of the fiducial star, mas/yr.
///
/// Filters with a single visit cannot constrain the slope and are dropped.
#[derive(Debug, Clone)]
pub struct ProperMotionMetric {
    info: MetricInfo,
    config: ProperMotionConfig,
    photometry: PhotometryColumns,
    star: FiducialStar,
}

impl ProperMotionMetric {
    pub fn new(config: ProperMotionConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_positive("baseline", config.baseline)?;
        let star = FiducialStar::new(config.sed_template, config.rmag, config.atm_err)?;
        let photometry = PhotometryColumns {
            m5_col: config.m5_col.clone(),
            filter_col: config.filter_col.clone(),
            seeing_col: config.seeing_col.clone(),
        };
        let columns =
            photometry.require(ColumnSet::new().require("time_col", &config.time_col)?)?;
        let units = if config.normalize { "ratio" } else { "mas/yr" };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "Proper motion".to_string(),
            units,
            columns,
        );
        Ok(Self {
            info,
            config,
            photometry,
            star,
        })
    }
}

impl Metric for ProperMotionMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        let needed = self.config.min_samples;
        if data.len() < needed {
            return Ok(insufficient(&self.info.name, data.len(), needed));
        }
        let times = data.floats(&self.config.time_col)?;
        let m5 = data.floats(&self.photometry.m5_col)?;
        let seeing = data.floats(&self.photometry.seeing_col)?;
        let filters = data.categories(&self.photometry.filter_col)?;
        let snr = self.star.snr(&filters, m5);

        let usable: Vec<usize> = (0..data.len())
            .filter(|&i| times[i].is_finite())
            .filter(|&i| {
                let e = self.star.position_error(seeing[i], snr[i]);
                e.is_finite() && e > 0.0
            })
            .collect();
        let mut per_filter: BTreeMap<&str, usize> = BTreeMap::new();
        for &i in &usable {
            *per_filter.entry(filters[i].as_str()).or_default() += 1;
        }
        let (dates, precision): (Vec<f64>, Vec<f64>) = usable
            .iter()
            .filter(|&&i| per_filter[filters[i].as_str()] >= 2)
            .map(|&i| (times[i], self.star.position_error(seeing[i], snr[i])))
            .unzip();
        if dates.len() < needed {
            return Ok(insufficient(&self.info.name, dates.len(), needed));
        }

        let sigma = astro_slope_mas_per_year(&dates, &precision);
        if !self.config.normalize {
            return Ok(MetricValue::scalar(sigma));
        }
        let half = dates.len() / 2;
        let ideal: Vec<f64> = (0..dates.len())
            .map(|k| if k < half { 0.0 } else { self.config.baseline * DAYS_PER_YEAR })
            .collect();
        let best = astro_slope_mas_per_year(&ideal, &precision);
        Ok(MetricValue::scalar(best / sigma))
    }
}

/// Slope uncertainty for dates in days and errors in arcsec, as mas/yr.
fn astro_slope_mas_per_year(dates: &[f64], precision: &[f64]) -> f64 {
    sigma_slope(dates, precision) * DAYS_PER_YEAR * MAS_PER_ARCSEC
}

/// Configuration for [`ParallaxCoverageMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallaxCoverageConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub m5_col: String,
    pub time_col: String,
    pub filter_col: String,
    pub seeing_col: String,
    pub ra_pi_col: String,
    pub dec_pi_col: String,
    pub rmag: f64,
    pub sed_template: SedTemplate,
    pub atm_err: f64,
    /// Required spread of parallax-offset angles (radians) among visits
    /// above `snr_limit`; 0 disables the check.
    pub theta_range: f64,
    pub snr_limit: f64,
    pub min_samples: usize,
}

impl Default for ParallaxCoverageConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            m5_col: "fiveSigmaDepth".to_string(),
            time_col: "expMJD".to_string(),
            filter_col: "filter".to_string(),
            seeing_col: "FWHMgeom".to_string(),
            ra_pi_col: "ra_pi_amp".to_string(),
            dec_pi_col: "dec_pi_amp".to_string(),
            rmag: 20.0,
            sed_template: SedTemplate::Flat,
            atm_err: 0.01,
            theta_range: 0.0,
            snr_limit: 5.0,
            min_samples: 2,
        }
    }
}

/// How evenly the parallax ellipse is sampled: the weighted mean distance of
/// the parallax offsets from their weighted centre.
///
/// Near 1 for good coverage at the ecliptic poles, about 0.5 for uniform
/// sampling on the ecliptic, near 0 when all visits share one phase.
#[derive(Debug, Clone)]
pub struct ParallaxCoverageMetric {
    info: MetricInfo,
    config: ParallaxCoverageConfig,
    photometry: PhotometryColumns,
    star: FiducialStar,
}

impl ParallaxCoverageMetric {
    pub fn new(config: ParallaxCoverageConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_non_negative("theta_range", config.theta_range)?;
        check_non_negative("snr_limit", config.snr_limit)?;
        let star = FiducialStar::new(config.sed_template, config.rmag, config.atm_err)?;
        let photometry = PhotometryColumns {
            m5_col: config.m5_col.clone(),
            filter_col: config.filter_col.clone(),
            seeing_col: config.seeing_col.clone(),
        };
        let columns = photometry.require(
            ColumnSet::new()
                .require("time_col", &config.time_col)?
                .require("ra_pi_col", &config.ra_pi_col)?
                .require("dec_pi_col", &config.dec_pi_col)?,
        )?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "Parallax coverage".to_string(),
            "ratio",
            columns,
        );
        Ok(Self {
            info,
            config,
            photometry,
            star,
        })
    }

    /// Whether the offset angles of confident visits span `theta_range`,
    /// measured both directly and after a half-turn rotation.
    fn spans_theta_range(&self, visits: &Visits) -> bool {
        let theta: Vec<f64> = (0..visits.len())
            .filter(|&i| visits.snr[i] >= self.config.snr_limit)
            .map(|i| visits.dec_pi[i].atan2(visits.ra_pi[i]))
            .collect();
        let spread = |angles: &[f64]| match (stats::min(angles), stats::max(angles)) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => f64::NAN,
        };
        let direct = spread(&theta);
        if direct.is_nan() || direct < self.config.theta_range {
            return false;
        }
        let rotated: Vec<f64> = theta.iter().map(|t| (t + PI).rem_euclid(2.0 * PI)).collect();
        spread(&rotated) >= self.config.theta_range
    }
}

impl Metric for ParallaxCoverageMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        let needed = self.config.min_samples;
        if data.len() < needed {
            return Ok(insufficient(&self.info.name, data.len(), needed));
        }
        let visits = Visits::load(
            data,
            &self.star,
            &self.photometry,
            &self.config.ra_pi_col,
            &self.config.dec_pi_col,
        )?;
        if visits.len() < needed.max(2) {
            return Ok(insufficient(&self.info.name, visits.len(), needed));
        }

        let weights: Vec<f64> = visits.error.iter().map(|e| 1.0 / (e * e)).collect();
        let total: f64 = weights.iter().sum();
        let weighted_mean = |xs: &[f64]| -> f64 {
            xs.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / total
        };
        let x0 = weighted_mean(&visits.ra_pi);
        let y0 = weighted_mean(&visits.dec_pi);
        let radius: Vec<f64> = visits
            .ra_pi
            .iter()
            .zip(&visits.dec_pi)
            .map(|(x, y)| (x - x0).hypot(y - y0))
            .collect();
        let mean_radius = weighted_mean(&radius);

        if self.config.theta_range > 0.0 && !self.spans_theta_range(&visits) {
            return Ok(MetricValue::scalar(0.0));
        }
        Ok(MetricValue::scalar(mean_radius))
    }
}

/// Configuration for [`ParallaxHaDegenMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallaxHaDegenConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub ha_col: String,
    pub m5_col: String,
    pub filter_col: String,
    pub ra_pi_col: String,
    pub dec_pi_col: String,
    pub rmag: f64,
    pub sed_template: SedTemplate,
    /// Only visits at or above this SNR are correlated.
    pub snr_limit: f64,
    pub min_samples: usize,
}

impl Default for ParallaxHaDegenConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            ha_col: "HA".to_string(),
            m5_col: "fiveSigmaDepth".to_string(),
            filter_col: "filter".to_string(),
            ra_pi_col: "ra_pi_amp".to_string(),
            dec_pi_col: "dec_pi_amp".to_string(),
            rmag: 20.0,
            sed_template: SedTemplate::Flat,
            snr_limit: 5.0,
            min_samples: 2,
        }
    }
}

/// Spearman rank correlation between parallax-factor amplitude and hour
/// angle. Near 0 means parallax is separable from differential refraction;
/// near ±1 means they are degenerate.
#[derive(Debug, Clone)]
pub struct ParallaxHaDegenMetric {
    info: MetricInfo,
    config: ParallaxHaDegenConfig,
    mags: BTreeMap<String, f64>,
}

impl ParallaxHaDegenMetric {
    pub fn new(config: ParallaxHaDegenConfig) -> Result<Self> {
        check_min_samples(config.min_samples)?;
        check_non_negative("snr_limit", config.snr_limit)?;
        let mags = FiducialStar::new(config.sed_template, config.rmag, 0.0)?.mags;
        let columns = ColumnSet::new()
            .require_with_units("ha_col", &config.ha_col, "hours")?
            .require("m5_col", &config.m5_col)?
            .require("filter_col", &config.filter_col)?
            .require("ra_pi_col", &config.ra_pi_col)?
            .require("dec_pi_col", &config.dec_pi_col)?;
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            "Parallax-DCR degeneracy".to_string(),
            "Correlation",
            columns,
        );
        Ok(Self { info, config, mags })
    }
}

impl Metric for ParallaxHaDegenMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, _slice_point: &SlicePoint) -> Result<MetricValue> {
        let c = &self.config;
        if data.len() < c.min_samples {
            return Ok(insufficient(&self.info.name, data.len(), c.min_samples));
        }
        let ha = data.floats(&c.ha_col)?;
        let m5 = data.floats(&c.m5_col)?;
        let filters = data.categories(&c.filter_col)?;
        let ra_pi = data.floats(&c.ra_pi_col)?;
        let dec_pi = data.floats(&c.dec_pi_col)?;

        let (amplitude, hour_angle): (Vec<f64>, Vec<f64>) = (0..data.len())
            .filter(|&i| {
                self.mags
                    .get(&filters[i])
                    .is_some_and(|mag| m5_to_snr(*mag, m5[i]) >= c.snr_limit)
            })
            .map(|i| (ra_pi[i].hypot(dec_pi[i]), ha[i]))
            .filter(|(pf, h)| pf.is_finite() && h.is_finite())
            .unzip();
        let needed = c.min_samples.max(2);
        if amplitude.len() < needed {
            return Ok(insufficient(&self.info.name, amplitude.len(), needed));
        }
        Ok(stats::spearman(&amplitude, &hour_angle)
            .map_or(MetricValue::Invalid, MetricValue::scalar))
    }
}

/// Statistic of the visit distances reported by [`RadiusObsMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadiusStatistic {
    #[default]
    Mean,
    /// Population standard deviation.
    Rms,
    /// Largest minus smallest distance.
    FullRange,
}

/// Configuration for [`RadiusObsMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadiusObsConfig {
    pub metric_name: Option<String>,
    pub units: Option<String>,
    /// Pointing right ascension, radians.
    pub ra_col: String,
    /// Pointing declination, radians.
    pub dec_col: String,
    pub statistic: RadiusStatistic,
}

impl Default for RadiusObsConfig {
    fn default() -> Self {
        Self {
            metric_name: None,
            units: None,
            ra_col: "fieldRA".to_string(),
            dec_col: "fieldDec".to_string(),
            statistic: RadiusStatistic::Mean,
        }
    }
}

/// Angular distance of each pointing centre from the partition centre,
/// which measures where in the focal plane the point was observed.
#[derive(Debug, Clone)]
pub struct RadiusObsMetric {
    info: MetricInfo,
    config: RadiusObsConfig,
}

impl RadiusObsMetric {
    pub fn new(config: RadiusObsConfig) -> Result<Self> {
        let columns = ColumnSet::new()
            .require_with_units("ra_col", &config.ra_col, "radians")?
            .require_with_units("dec_col", &config.dec_col, "radians")?;
        let label = match config.statistic {
            RadiusStatistic::Mean => "Mean",
            RadiusStatistic::Rms => "Rms",
            RadiusStatistic::FullRange => "FullRange",
        };
        let info = MetricInfo::new(
            &config.metric_name,
            &config.units,
            format!("{} radiusObs", label),
            "radians",
            columns,
        );
        Ok(Self { info, config })
    }
}

impl Metric for RadiusObsMetric {
    metric_info_accessors!();

    fn run(&self, data: &DataSlice, slice_point: &SlicePoint) -> Result<MetricValue> {
        if data.is_empty() {
            return Ok(insufficient(&self.info.name, 0, 1));
        }
        let (Some(ra0), Some(dec0)) = (slice_point.ra, slice_point.dec) else {
            log::warn!(
                "`{}`: partition {} has no sky position",
                self.info.name,
                slice_point.sid
            );
            return Ok(MetricValue::Invalid);
        };
        let ra = data.floats(&self.config.ra_col)?;
        let dec = data.floats(&self.config.dec_col)?;
        let distances: Vec<f64> = ra
            .iter()
            .zip(dec)
            .filter(|(r, d)| r.is_finite() && d.is_finite())
            .map(|(r, d)| angular_distance(ra0, dec0, *r, *d))
            .collect();
        let value = match self.config.statistic {
            RadiusStatistic::Mean => stats::mean(&distances),
            RadiusStatistic::Rms => stats::std(&distances),
            RadiusStatistic::FullRange => stats::max(&distances)
                .zip(stats::min(&distances))
                .map(|(hi, lo)| hi - lo),
        };
        Ok(value.map_or(MetricValue::Invalid, MetricValue::scalar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parallax_visits(ra_pi: Vec<f64>, dec_pi: Vec<f64>) -> DataSlice {
        let n = ra_pi.len();
        DataSlice::new()
            .with_floats("expMJD", (0..n).map(|i| i as f64 * 30.0).collect())
            .unwrap()
            .with_floats("fiveSigmaDepth", vec![24.0; n])
            .unwrap()
            .with_texts("filter", vec!["r"; n])
            .unwrap()
            .with_floats("FWHMgeom", vec![0.7; n])
            .unwrap()
            .with_floats("ra_pi_amp", ra_pi)
            .unwrap()
            .with_floats("dec_pi_amp", dec_pi)
            .unwrap()
    }

    fn run<M: Metric>(metric: &M, data: &DataSlice) -> MetricValue {
        metric.run(data, &SlicePoint::new(0)).unwrap()
    }

    #[test]
    fn test_parallax_improves_with_visits() {
        let metric = ParallaxMetric::new(ParallaxConfig::default()).unwrap();
        let few = run(&metric, &parallax_visits(vec![1.0, -1.0], vec![0.5, 0.5]));
        let many = run(
            &metric,
            &parallax_visits(vec![1.0, -1.0, 1.0, -1.0], vec![0.5, 0.5, 0.5, 0.5]),
        );
        let (few, many) = (few.as_scalar().unwrap(), many.as_scalar().unwrap());
        assert!(many < few);
        assert_relative_eq!(few / many, 2f64.sqrt(), epsilon = 1e-9);
        assert_eq!(metric.units(), "mas");
    }

    #[test]
    fn test_parallax_normalized_is_one_at_full_factor() {
        let metric = ParallaxMetric::new(ParallaxConfig {
            normalize: true,
            ..Default::default()
        })
        .unwrap();
        let value = run(&metric, &parallax_visits(vec![1.0, -1.0], vec![0.0, 0.0]));
        assert_relative_eq!(value.as_scalar().unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(metric.units(), "ratio");
    }

    #[test]
    fn test_parallax_without_factors_is_invalid() {
        let metric = ParallaxMetric::new(ParallaxConfig::default()).unwrap();
        let value = run(&metric, &parallax_visits(vec![0.0, 0.0], vec![0.0, 0.0]));
        assert!(value.is_invalid());
    }

    fn astrometry_visits(times: Vec<f64>, filters: Vec<&str>) -> DataSlice {
        let n = times.len();
        DataSlice::new()
            .with_floats("expMJD", times)
            .unwrap()
            .with_floats("fiveSigmaDepth", vec![24.5; n])
            .unwrap()
            .with_texts("filter", filters)
            .unwrap()
            .with_floats("FWHMgeom", vec![0.8; n])
            .unwrap()
    }

    #[test]
    fn test_proper_motion_longer_baseline_is_better() {
        let metric = ProperMotionMetric::new(ProperMotionConfig::default()).unwrap();
        let short = run(&metric, &astrometry_visits(vec![0.0, 100.0, 200.0], vec!["r"; 3]));
        let long = run(&metric, &astrometry_visits(vec![0.0, 1000.0, 2000.0], vec!["r"; 3]));
        assert!(long.as_scalar().unwrap() < short.as_scalar().unwrap());
    }

    #[test]
    fn test_proper_motion_drops_single_visit_filters() {
        let metric = ProperMotionMetric::new(ProperMotionConfig::default()).unwrap();
        let value = run(&metric, &astrometry_visits(vec![0.0, 500.0], vec!["g", "r"]));
        assert!(value.is_invalid());
        // same epoch: the slope is unconstrained
        let value = run(&metric, &astrometry_visits(vec![0.0, 0.0], vec!["r", "r"]));
        assert!(value.is_invalid());
    }

    #[test]
    fn test_proper_motion_normalized_ideal_survey() {
        let metric = ProperMotionMetric::new(ProperMotionConfig {
            normalize: true,
            ..Default::default()
        })
        .unwrap();
        let end = 10.0 * DAYS_PER_YEAR;
        let value = run(&metric, &astrometry_visits(vec![0.0, 0.0, end, end], vec!["r"; 4]));
        assert_relative_eq!(value.as_scalar().unwrap(), 1.0, epsilon = 1e-9);
        let value = run(
            &metric,
            &astrometry_visits(vec![0.0, 100.0, 200.0, 300.0], vec!["r"; 4]),
        );
        assert!(value.as_scalar().unwrap() < 1.0);
    }

    #[test]
    fn test_parallax_coverage() {
        let metric = ParallaxCoverageMetric::new(ParallaxCoverageConfig::default()).unwrap();
        let circle = run(
            &metric,
            &parallax_visits(vec![1.0, 0.0, -1.0, 0.0], vec![0.0, 1.0, 0.0, -1.0]),
        );
        assert_relative_eq!(circle.as_scalar().unwrap(), 1.0, epsilon = 1e-12);
        let clumped = run(&metric, &parallax_visits(vec![0.3, 0.3], vec![0.2, 0.2]));
        assert_relative_eq!(clumped.as_scalar().unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallax_coverage_theta_range() {
        let metric = ParallaxCoverageMetric::new(ParallaxCoverageConfig {
            theta_range: 1.0,
            ..Default::default()
        })
        .unwrap();
        // all offsets at the same angle
        let line = run(&metric, &parallax_visits(vec![1.0, 0.5], vec![1.0, 0.5]));
        assert_eq!(line.as_scalar(), Some(0.0));
        let circle = run(
            &metric,
            &parallax_visits(vec![1.0, 0.0, -1.0, 0.0], vec![0.0, 1.0, 0.0, -1.0]),
        );
        assert!(circle.as_scalar().unwrap() > 0.9);
    }

    #[test]
    fn test_parallax_ha_degeneracy() {
        let metric = ParallaxHaDegenMetric::new(ParallaxHaDegenConfig::default()).unwrap();
        let data = DataSlice::new()
            .with_floats("HA", vec![-2.0, -1.0, 0.0, 1.0, 2.0])
            .unwrap()
            .with_floats("fiveSigmaDepth", vec![24.0; 5])
            .unwrap()
            .with_texts("filter", vec!["r"; 5])
            .unwrap()
            .with_floats("ra_pi_amp", vec![0.1, 0.2, 0.3, 0.4, 0.5])
            .unwrap()
            .with_floats("dec_pi_amp", vec![0.0; 5])
            .unwrap();
        assert_relative_eq!(run(&metric, &data).as_scalar().unwrap(), 1.0);

        // too faint to pass the SNR limit
        let faint = ParallaxHaDegenMetric::new(ParallaxHaDegenConfig {
            rmag: 30.0,
            ..Default::default()
        })
        .unwrap();
        assert!(run(&faint, &data).is_invalid());
    }

    #[test]
    fn test_radius_obs() {
        let metric = RadiusObsMetric::new(RadiusObsConfig {
            statistic: RadiusStatistic::FullRange,
            ..Default::default()
        })
        .unwrap();
        let data = DataSlice::new()
            .with_floats("fieldRA", vec![1.0, 1.0, 1.0])
            .unwrap()
            .with_floats("fieldDec", vec![0.0, 0.01, 0.03])
            .unwrap();
        let point = SlicePoint::new(3).at(1.0, 0.0);
        let range = metric.run(&data, &point).unwrap().as_scalar().unwrap();
        assert_relative_eq!(range, 0.03, epsilon = 1e-6);

        assert!(metric.run(&data, &SlicePoint::new(3)).unwrap().is_invalid());
    }
}
