//! Small descriptive-statistics and regression helpers.
//!
//! Moments come from `statrs`, regressions are solved through nalgebra's SVD.
//! Percentiles use linear interpolation between closest ranks.

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

/// Relative singular-value cutoff below which a design matrix is rank deficient
const RANK_TOLERANCE: f64 = 1e-10;

/// Arithmetic mean (0 for an empty slice).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Population variance (0 for an empty slice).
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().population_variance()
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Sorted copy with NaNs ordered last.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Percentile `p ∈ [0, 100]` of an already sorted slice, with linear
/// interpolation between closest ranks. 0 for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Percentile of an unsorted slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(values), p)
}

/// Median (mean of the two middle values for even lengths).
pub fn median(values: &[f64]) -> f64 {
    let v = sorted(values);
    let n = v.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => v[n / 2],
        _ => (v[n / 2 - 1] + v[n / 2]) / 2.0,
    }
}

/// Pearson correlation coefficient; 0 when either side has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (sx, sy) = (std_dev(x), std_dev(y));
    if sx <= f64::EPSILON || sy <= f64::EPSILON {
        return 0.0;
    }
    (x.iter().population_covariance(y.iter()) / (sx * sy)).clamp(-1.0, 1.0)
}

/// Simple linear regression result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares fit of `y = slope·x + intercept`.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let design: Vec<Vec<f64>> = points.iter().map(|&(x, _)| vec![1.0, x]).collect();
    let ys: Vec<f64> = points.iter().map(|&(_, y)| y).collect();
    let beta = least_squares(&design, &ys, 0.0)?;
    let (intercept, slope) = (beta[0], beta[1]);

    let mean_y = mean(&ys);
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Multiple least squares `min ‖Xβ - y‖² + λ‖β‖²`, solved by SVD on `X`
/// stacked over `√λ·I`. Rows of `x` must include any intercept column.
/// Returns `None` when the design is rank deficient or ragged.
pub fn least_squares(x: &[Vec<f64>], y: &[f64], ridge: f64) -> Option<Vec<f64>> {
    let p = x.first()?.len();
    if p == 0 || x.len() != y.len() || x.iter().any(|row| row.len() != p) {
        return None;
    }

    let n = x.len();
    let penalty = if ridge > 0.0 { ridge.sqrt() } else { 0.0 };
    let rows = if penalty > 0.0 { n + p } else { n };
    let design = DMatrix::from_fn(rows, p, |i, j| {
        if i < n {
            x[i][j]
        } else if i - n == j {
            penalty
        } else {
            0.0
        }
    });
    let target = DVector::from_fn(rows, |i, _| if i < n { y[i] } else { 0.0 });

    let svd = design.svd(true, true);
    let largest = svd.singular_values.max();
    if largest.is_nan() || largest <= 0.0 {
        return None;
    }
    let eps = largest * RANK_TOLERANCE;
    if svd.rank(eps) < p {
        return None;
    }
    let beta = svd.solve(&target, eps).ok()?;
    if beta.iter().all(|b| b.is_finite()) {
        Some(beta.iter().copied().collect())
    } else {
        None
    }
}
