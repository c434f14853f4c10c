// Survey Testdata - Visit tables
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Visit tables and their conversion into metric partitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use survey_metrics::{DataSlice, MetricError, Partition, SlicePoint};
use thiserror::Error;

/// Survey error types.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid generator configuration: {0}")]
    InvalidConfig(String),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),
}

/// Column names written by [`Survey::to_slice`], in CSV order.
pub const COLUMNS: [&str; 16] = [
    "obsHistID",
    "fieldID",
    "expMJD",
    "night",
    "filter",
    "fiveSigmaDepth",
    "FWHMgeom",
    "airmass",
    "HA",
    "fieldRA",
    "fieldDec",
    "ra_pi_amp",
    "dec_pi_amp",
    "visitExpTime",
    "visitTime",
    "slewTime",
];

/// A pointing on the sky; one partition per field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyField {
    pub id: u64,
    /// Radians.
    pub ra: f64,
    /// Radians.
    pub dec: f64,
}

/// One simulated visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub obs_id: u64,
    pub field_id: u64,
    pub exp_mjd: f64,
    pub night: u32,
    pub filter: String,
    pub five_sigma_depth: f64,
    /// Arcseconds.
    pub fwhm_geom: f64,
    pub airmass: f64,
    /// Hours.
    pub hour_angle: f64,
    pub field_ra: f64,
    pub field_dec: f64,
    pub ra_pi_amp: f64,
    pub dec_pi_amp: f64,
    /// Seconds.
    pub visit_exp_time: f64,
    /// Seconds.
    pub visit_time: f64,
    /// Seconds.
    pub slew_time: f64,
}

/// Survey metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub start_mjd: f64,
    pub n_nights: u32,
    /// Nights lost to weather.
    pub nights_lost: u32,
}

/// A generated survey: its fields and its visits in time order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub fields: Vec<SurveyField>,
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub metadata: SurveyMetadata,
}

impl Survey {
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Columnar table of the given visits.
    pub fn to_slice(visits: &[&Visit]) -> Result<DataSlice, SurveyError> {
        let floats = |f: fn(&Visit) -> f64| visits.iter().map(|v| f(v)).collect::<Vec<f64>>();
        let slice = DataSlice::new()
            .with_floats("obsHistID", floats(|v| v.obs_id as f64))?
            .with_floats("fieldID", floats(|v| v.field_id as f64))?
            .with_floats("expMJD", floats(|v| v.exp_mjd))?
            .with_floats("night", floats(|v| v.night as f64))?
            .with_texts("filter", visits.iter().map(|v| v.filter.clone()).collect())?
            .with_floats("fiveSigmaDepth", floats(|v| v.five_sigma_depth))?
            .with_floats("FWHMgeom", floats(|v| v.fwhm_geom))?
            .with_floats("airmass", floats(|v| v.airmass))?
            .with_floats("HA", floats(|v| v.hour_angle))?
            .with_floats("fieldRA", floats(|v| v.field_ra))?
            .with_floats("fieldDec", floats(|v| v.field_dec))?
            .with_floats("ra_pi_amp", floats(|v| v.ra_pi_amp))?
            .with_floats("dec_pi_amp", floats(|v| v.dec_pi_amp))?
            .with_floats("visitExpTime", floats(|v| v.visit_exp_time))?
            .with_floats("visitTime", floats(|v| v.visit_time))?
            .with_floats("slewTime", floats(|v| v.slew_time))?;
        Ok(slice)
    }

    /// Every visit as one partition.
    pub fn whole(&self) -> Result<Partition, SurveyError> {
        let visits: Vec<&Visit> = self.visits.iter().collect();
        Ok(Partition::new(SlicePoint::new(0), Self::to_slice(&visits)?))
    }

    /// One partition per field, centred on the field, in field order.
    /// Fields without visits yield empty partitions.
    pub fn partitions_by_field(&self) -> Result<Vec<Partition>, SurveyError> {
        let mut by_field: BTreeMap<u64, Vec<&Visit>> = BTreeMap::new();
        for visit in &self.visits {
            by_field.entry(visit.field_id).or_default().push(visit);
        }
        self.fields
            .iter()
            .map(|field| {
                let visits = by_field.remove(&field.id).unwrap_or_default();
                let point = SlicePoint::new(field.id).at(field.ra, field.dec);
                Ok(Partition::new(point, Self::to_slice(&visits)?))
            })
            .collect()
    }

    /// Export visits to CSV.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SurveyError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", COLUMNS.join(","))?;
        for v in &self.visits {
            writeln!(
                writer,
                "{},{},{:.6},{},{},{:.4},{:.4},{:.4},{:.4},{:.6},{:.6},{:.6},{:.6},{},{},{:.3}",
                v.obs_id,
                v.field_id,
                v.exp_mjd,
                v.night,
                v.filter,
                v.five_sigma_depth,
                v.fwhm_geom,
                v.airmass,
                v.hour_angle,
                v.field_ra,
                v.field_dec,
                v.ra_pi_amp,
                v.dec_pi_amp,
                v.visit_exp_time,
                v.visit_time,
                v.slew_time
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export to JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SurveyError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Import from JSON.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, SurveyError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
