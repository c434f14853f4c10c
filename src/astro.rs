//! Photometric and astrometric helpers used by the calibration metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Survey filters in wavelength order.
pub const FILTERS: [&str; 6] = ["u", "g", "r", "i", "z", "y"];

/// Signal-to-noise ratio of a source of magnitude `mag` in a visit whose
/// five-sigma limiting depth is `m5`.
pub fn m5_to_snr(mag: f64, m5: f64) -> f64 {
    5.0 * 10f64.powf(-0.4 * (mag - m5))
}

/// Centroid precision (same units as `fwhm`) of a source detected at `snr`.
pub fn astrometric_precision(fwhm: f64, snr: f64) -> f64 {
    fwhm / snr
}

/// Uncertainty of the weighted least-squares slope of positions with
/// per-point errors `sigma` measured at times `x`.
///
/// NaN when the fit is degenerate (fewer than two distinct times).
pub fn sigma_slope(x: &[f64], sigma: &[f64]) -> f64 {
    let mut sw = 0.0;
    let mut swx = 0.0;
    let mut swxx = 0.0;
    for (xi, si) in x.iter().zip(sigma) {
        let w = 1.0 / (si * si);
        sw += w;
        swx += w * xi;
        swxx += w * xi * xi;
    }
    let denom = sw * swxx - swx * swx;
    if denom.is_nan() || denom <= 0.0 {
        return f64::NAN;
    }
    (sw / denom).sqrt()
}

/// Great-circle distance (radians) by the spherical law of cosines.
///
/// All inputs in radians. The cosine is clamped so rounding never yields NaN.
pub fn angular_distance(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let d = dec2.sin() * dec1.sin() + dec1.cos() * dec2.cos() * (ra2 - ra1).cos();
    d.clamp(-1.0, 1.0).acos()
}

/// Spectral energy distribution assumed for the fiducial star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SedTemplate {
    /// Same magnitude in every filter.
    #[default]
    Flat,
    O,
    B,
    A,
    F,
    G,
    K,
    M,
}

impl SedTemplate {
    /// Colors `[u-g, g-r, r-i, i-z, z-y]` of a typical star of this type.
    fn colors(self) -> [f64; 5] {
        match self {
            SedTemplate::Flat => [0.0; 5],
            SedTemplate::O => [-0.4835688497, -0.5201721327, -0.3991733698, -0.3106800468, -0.2072290744],
            SedTemplate::B => [-0.3457202828, -0.4834762052, -0.3812792176, -0.2906072887, -0.1927230035],
            SedTemplate::A => [0.8823182684, -0.237288029, -0.2280783991, -0.1587960264, -0.03043824335],
            SedTemplate::F => [0.9140316091, 0.1254277486, -0.03419150003, -0.0802010739, -0.03802756413],
            SedTemplate::G => [1.198219095, 0.3915608688, 0.09129426676, 0.002604263747, -0.004659443668],
            SedTemplate::K => [1.716635024, 0.6081567546, 0.1796910856, 0.06492278686, 0.0425155827],
            SedTemplate::M => [2.747842719, 1.287599638, 0.5375622482, 0.4313486709, 0.219308065],
        }
    }
}

/// Expected magnitude in each filter of a star with r-band magnitude `rmag`.
pub fn stellar_mags(template: SedTemplate, rmag: f64) -> BTreeMap<String, f64> {
    let [ug, gr, ri, iz, zy] = template.colors();
    let g = rmag + gr;
    let i = rmag - ri;
    let z = i - iz;
    [
        ("u", g + ug),
        ("g", g),
        ("r", rmag),
        ("i", i),
        ("z", z),
        ("y", z - zy),
    ]
    .into_iter()
    .map(|(f, m)| (f.to_string(), m))
    .collect()
}
