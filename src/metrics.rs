//! Concrete metric families
//!
//! - [`simple`]: single-column statistics
//! - [`cadence`]: visit gaps, uniformity, gap and phase-gap histograms
//! - [`periodic`]: Lomb-Scargle periodograms and period recovery
//! - [`grouping`]: visit groups within a time window
//! - [`transient`]: simulated transient light curves
//! - [`technical`]: filter changes, effective time, shutter efficiency
//! - [`calibration`]: parallax and proper-motion precision
//! - [`timeseries`]: per-time-bin histograms

pub mod cadence;
pub mod calibration;
pub mod grouping;
pub mod periodic;
pub mod simple;
pub mod technical;
pub mod timeseries;
pub mod transient;

pub use cadence::{
    GapScope, GapStatistic, PhaseGapConfig, PhaseGapMetric, TgapsConfig, TgapsMetric,
    UniformityConfig, UniformityMetric, VisitGapsConfig, VisitGapsMetric,
};
pub use calibration::{
    ParallaxConfig, ParallaxCoverageConfig, ParallaxCoverageMetric, ParallaxHaDegenConfig,
    ParallaxHaDegenMetric, ParallaxMetric, ProperMotionConfig, ProperMotionMetric,
    RadiusObsConfig, RadiusObsMetric, RadiusStatistic,
};
pub use grouping::{
    group_visits, FilterMode, PairFractionConfig, PairFractionMetric, VisitGroup,
    VisitGroupsConfig, VisitGroupsMetric,
};
pub use periodic::{
    lomb_scargle, spectral_window, PeriodRecoveryConfig, PeriodRecoveryMetric,
    PeriodogramConfig, PeriodogramMetric,
};
pub use simple::{SimpleConfig, SimpleMetric, SimpleStatistic};
pub use technical::{
    CompletenessConfig, CompletenessMetric, MaxStateChangesWithinConfig,
    MaxStateChangesWithinMetric, MinTimeBetweenStatesConfig, MinTimeBetweenStatesMetric,
    NChangesConfig, NChangesMetric, NStateChangesFasterThanConfig, NStateChangesFasterThanMetric,
    OpenShutterFractionConfig, OpenShutterFractionMetric, TeffConfig, TeffMetric,
};
pub use timeseries::{HistogramStatistic, TimeHistogramConfig, TimeHistogramMetric};
pub use transient::{PeakMag, TransientConfig, TransientMetric};

use crate::data::DataSlice;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Minutes per day.
pub(crate) const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Finite values of a time column, ascending.
pub(crate) fn sorted_times(data: &DataSlice, col: &str) -> Result<Vec<f64>> {
    let mut times: Vec<f64> = data
        .floats(col)?
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .collect();
    times.sort_by(f64::total_cmp);
    Ok(times)
}

/// Bin index of `x` for ascending `edges`. Bins are half-open except the
/// last, which includes its right edge.
pub(crate) fn bin_index(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len().checked_sub(1)?;
    if n == 0 || !(x >= edges[0] && x <= edges[n]) {
        return None;
    }
    if x == edges[n] {
        return Some(n - 1);
    }
    // last edge <= x
    Some(edges.partition_point(|e| *e <= x) - 1)
}

/// Counts of `values` per bin; values outside the edges are dropped.
pub(crate) fn histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let mut counts = vec![0.0; edges.len().saturating_sub(1)];
    for v in values {
        if let Some(i) = bin_index(edges, *v) {
            counts[i] += 1.0;
        }
    }
    counts
}

/// `n` evenly spaced points from `min` to `max` inclusive.
pub(crate) fn linear_grid(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        }
    }
}

/// `n` logarithmically spaced points from `min` to `max` inclusive.
pub(crate) fn log_grid(min: f64, max: f64, n: usize) -> Vec<f64> {
    linear_grid(min.ln(), max.ln(), n)
        .into_iter()
        .map(f64::exp)
        .collect()
}

/// Random source for one partition.
///
/// Depends only on the configured seed and the partition id, so results do
/// not depend on evaluation order or thread.
pub(crate) fn partition_rng(seed: u64, sid: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ sid.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
