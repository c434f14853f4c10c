// Survey Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic survey generation.
//!
//! Each clear night observes a sequence of visits, hopping between fields
//! and occasionally changing filter. Depth, seeing and airmass are drawn
//! from simple noise models; parallax factors follow the Sun's ecliptic
//! longitude. The output is realistic enough to exercise every metric, not
//! to predict any real survey.

use crate::survey::{Survey, SurveyError, SurveyField, SurveyMetadata, Visit};
use chrono::{Datelike, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Day number (from the common era) of MJD 0, 1858-11-17.
const MJD_EPOCH_DAYS: i32 = 678_576;
/// MJD of the vernal equinox 2000, when the Sun's ecliptic longitude is 0.
const EQUINOX_MJD: f64 = 51_623.8;

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// First night of the survey.
    pub start_date: NaiveDate,
    pub n_nights: u32,
    pub n_fields: usize,
    pub visits_per_night: usize,
    /// Probability of losing a whole night.
    pub weather_loss: f64,
    /// Probability of a filter change before each visit.
    pub filter_change_prob: f64,
    /// Median five-sigma depth per filter.
    pub depth: BTreeMap<String, f64>,
    /// Scatter of the five-sigma depth, magnitudes.
    pub depth_scatter: f64,
    /// Median seeing, arcseconds.
    pub seeing: f64,
    pub exposure_time: f64,
    /// Exposure plus readout, seconds.
    pub visit_time: f64,
    /// Mean slew between visits, seconds.
    pub slew_time: f64,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        let depth = [
            ("u", 23.8),
            ("g", 24.8),
            ("r", 24.4),
            ("i", 23.9),
            ("z", 23.3),
            ("y", 22.4),
        ]
        .into_iter()
        .map(|(f, m)| (f.to_string(), m))
        .collect();
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap_or(NaiveDate::MIN),
            n_nights: 365,
            n_fields: 12,
            visits_per_night: 40,
            weather_loss: 0.2,
            filter_change_prob: 0.05,
            depth,
            depth_scatter: 0.3,
            seeing: 0.8,
            exposure_time: 30.0,
            visit_time: 34.0,
            slew_time: 6.0,
            seed: None,
        }
    }
}

impl SurveyConfig {
    /// Create a new survey config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set survey length.
    pub fn with_nights(mut self, n_nights: u32) -> Self {
        self.n_nights = n_nights;
        self
    }

    /// Set number of fields.
    pub fn with_fields(mut self, n_fields: usize) -> Self {
        self.n_fields = n_fields;
        self
    }

    /// Set visits per clear night.
    pub fn with_visits_per_night(mut self, n: usize) -> Self {
        self.visits_per_night = n;
        self
    }

    /// Set the probability of losing a night.
    pub fn with_weather_loss(mut self, p: f64) -> Self {
        self.weather_loss = p;
        self
    }

    /// Modified Julian Date of the first night's start.
    pub fn start_mjd(&self) -> f64 {
        (self.start_date.num_days_from_ce() - MJD_EPOCH_DAYS) as f64
    }

    fn validate(&self) -> Result<(), SurveyError> {
        if self.n_fields == 0 {
            return Err(SurveyError::InvalidConfig("n_fields must be positive".into()));
        }
        if self.depth.is_empty() {
            return Err(SurveyError::InvalidConfig("no filters configured".into()));
        }
        for (name, p) in [
            ("weather_loss", self.weather_loss),
            ("filter_change_prob", self.filter_change_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SurveyError::InvalidConfig(format!(
                    "{} must be a probability, got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Fields spread evenly in right ascension, alternating between two
/// declination bands.
pub fn field_grid(n_fields: usize) -> Vec<SurveyField> {
    (0..n_fields)
        .map(|i| SurveyField {
            id: i as u64,
            ra: TAU * i as f64 / n_fields as f64,
            dec: if i % 2 == 0 { -0.5 } else { -1.1 },
        })
        .collect()
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>, SurveyError> {
    Normal::new(mean, std).map_err(|e| SurveyError::InvalidConfig(e.to_string()))
}

/// Generate a survey from configuration.
pub fn generate_survey(config: &SurveyConfig) -> Result<Survey, SurveyError> {
    config.validate()?;
    let mut rng: Box<dyn RngCore> = match config.seed {
        Some(s) => Box::new(StdRng::seed_from_u64(s)),
        None => Box::new(StdRng::from_entropy()),
    };

    let depth_noise = normal(0.0, config.depth_scatter)?;
    let seeing_noise = normal(0.0, config.seeing * 0.2)?;
    let slew_noise = normal(config.slew_time, config.slew_time * 0.3)?;
    let filters: Vec<(&String, &f64)> = config.depth.iter().collect();
    let fields = field_grid(config.n_fields);
    let start_mjd = config.start_mjd();

    let mut visits = Vec::new();
    let mut nights_lost = 0;
    for night in 0..config.n_nights {
        if rng.gen::<f64>() < config.weather_loss {
            nights_lost += 1;
            continue;
        }
        let mut time = start_mjd + night as f64 + 0.05 + rng.gen::<f64>() * 0.02;
        let mut filter = rng.gen_range(0..filters.len());

        for k in 0..config.visits_per_night {
            let mut slew: f64 = slew_noise.sample(&mut *rng).max(2.0);
            if k > 0 && rng.gen::<f64>() < config.filter_change_prob {
                filter = rng.gen_range(0..filters.len());
                slew += 120.0;
            }
            time += (config.visit_time + slew) / SECONDS_PER_DAY;

            let field = fields[rng.gen_range(0..fields.len())];
            let hour_angle: f64 = rng.gen_range(-4.0..4.0);
            let zenith = (hour_angle * PI / 12.0).abs().min(1.2);
            let airmass = 1.0 / zenith.cos();
            let fwhm = (config.seeing + seeing_noise.sample(&mut *rng)).max(0.3) * airmass.powf(0.6);
            let (name, median_depth) = filters[filter];
            let depth = median_depth + depth_noise.sample(&mut *rng)
                - 1.25 * airmass.log10()
                - 0.5 * (fwhm - config.seeing).max(0.0);

            let sun = TAU * (time - EQUINOX_MJD) / 365.25;
            let phase = sun - field.ra;

            visits.push(Visit {
                obs_id: visits.len() as u64,
                field_id: field.id,
                exp_mjd: time,
                night,
                filter: name.clone(),
                five_sigma_depth: depth,
                fwhm_geom: fwhm,
                airmass,
                hour_angle,
                field_ra: field.ra,
                field_dec: field.dec,
                ra_pi_amp: phase.sin(),
                dec_pi_amp: phase.cos() * field.dec.sin(),
                visit_exp_time: config.exposure_time,
                visit_time: config.visit_time,
                slew_time: slew,
            });
        }
    }

    Ok(Survey {
        fields,
        visits,
        metadata: SurveyMetadata {
            seed: config.seed,
            start_mjd,
            n_nights: config.n_nights,
            nights_lost,
        },
    })
}
