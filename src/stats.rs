//! Descriptive statistics shared by metrics and summaries.
//!
//! Every function ignores NaN inputs and returns `None` when nothing is
//! left to summarize.

use std::cmp::Ordering;

fn clean(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = clean(values);
    v.sort_by(f64::total_cmp);
    v
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let v = clean(values);
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / v.len() as f64)
}

pub fn sum(values: &[f64]) -> Option<f64> {
    let v = clean(values);
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum())
}

pub fn min(values: &[f64]) -> Option<f64> {
    clean(values).into_iter().min_by(f64::total_cmp)
}

pub fn max(values: &[f64]) -> Option<f64> {
    clean(values).into_iter().max_by(f64::total_cmp)
}

/// Median; even-length populations average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile `p` in [0, 100] with linear interpolation between ranks.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let v = sorted(values);
    percentile_sorted(&v, p)
}

pub(crate) fn percentile_sorted(v: &[f64], p: f64) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (v.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(v[lo] + (v[hi] - v[lo]) * frac)
}

/// Population standard deviation.
pub fn std(values: &[f64]) -> Option<f64> {
    let v = clean(values);
    let m = mean(&v)?;
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / v.len() as f64;
    Some(var.sqrt())
}

/// Interquartile range scaled to a Gaussian sigma: (p75 - p25) / 1.349.
pub fn robust_rms(values: &[f64]) -> Option<f64> {
    let v = sorted(values);
    let q75 = percentile_sorted(&v, 75.0)?;
    let q25 = percentile_sorted(&v, 25.0)?;
    Some((q75 - q25) / 1.349)
}

/// Trapezoid-rule area of `y` over `x`.
pub fn trapezoid(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let area = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum();
    Some(area)
}

/// Fractional ranks (1-based) with ties sharing their average rank.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Pearson correlation coefficient.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = x.iter().sum::<f64>() / x.len() as f64;
    let my = y.iter().sum::<f64>() / y.len() as f64;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Spearman rank correlation coefficient.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    pearson(&ranks(x), &ranks(y))
}
