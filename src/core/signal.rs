// WellSleuth - core/signal.rs
//
// Signal-conditioning operators for a single curve: denoise, despike and
// baseline correction. Stateless and pure: each takes a curve's values
// (one `Option<f64>` per row) and returns a new vector of the same length.
//
// Missing values are never fed into a window. Operators run on the compact
// sequence of present samples and write results back to their original
// rows, so `None` cells stay `None`.

use crate::core::model::{median, robust_scale};
use crate::util::constants;
use crate::util::error::AlgorithmError;
use serde::{Deserialize, Serialize};

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMethod {
    /// Local least-squares polynomial (Savitzky-Golay).
    #[default]
    SavitzkyGolay,
    MovingAverage,
    Median,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseOptions {
    pub enabled: bool,
    pub method: DenoiseMethod,
    /// Odd number of samples per window.
    pub window_size: usize,
    pub polynomial_order: usize,
    /// Blend factor between original (0.0) and fully smoothed (1.0) values.
    pub strength: f64,
    /// Leave isolated excursions untouched and keep them out of neighbouring fits.
    pub preserve_spikes: bool,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            method: DenoiseMethod::default(),
            window_size: constants::DEFAULT_DENOISE_WINDOW,
            polynomial_order: constants::DEFAULT_DENOISE_ORDER,
            strength: constants::DEFAULT_DENOISE_STRENGTH,
            preserve_spikes: true,
        }
    }
}

impl DenoiseOptions {
    pub fn validate(&self) -> Result<(), AlgorithmError> {
        validate_window(self.window_size)?;
        if self.method == DenoiseMethod::SavitzkyGolay {
            validate_order(self.polynomial_order)?;
            if self.polynomial_order >= self.window_size {
                return Err(AlgorithmError::InvalidParameter {
                    parameter: "polynomial_order",
                    value: self.polynomial_order.to_string(),
                    expected: "an order smaller than the window size",
                });
            }
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(AlgorithmError::InvalidParameter {
                parameter: "strength",
                value: self.strength.to_string(),
                expected: "a value between 0.0 and 1.0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DespikeMethod {
    /// Window median with scaled median absolute deviation (Hampel filter).
    #[default]
    Mad,
    /// Window mean and standard deviation, excluding the tested point.
    ZScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMethod {
    /// Monotone piecewise cubic (Fritsch-Carlson) across unflagged neighbours.
    #[default]
    Pchip,
    Linear,
    /// Median of the unflagged samples in the window.
    Median,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DespikeOptions {
    pub enabled: bool,
    pub method: DespikeMethod,
    /// Number of robust deviations beyond which a sample is a spike.
    pub threshold: f64,
    pub window_size: usize,
    pub replacement: ReplacementMethod,
}

impl Default for DespikeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            method: DespikeMethod::default(),
            threshold: constants::DEFAULT_DESPIKE_THRESHOLD,
            window_size: constants::DEFAULT_DESPIKE_WINDOW,
            replacement: ReplacementMethod::default(),
        }
    }
}

impl DespikeOptions {
    pub fn validate(&self) -> Result<(), AlgorithmError> {
        validate_window(self.window_size)?;
        if !(self.threshold > 0.0 && self.threshold <= constants::MAX_DESPIKE_THRESHOLD) {
            return Err(AlgorithmError::InvalidParameter {
                parameter: "threshold",
                value: self.threshold.to_string(),
                expected: "a positive value no greater than 50",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    #[default]
    Polynomial,
    /// First-order trend regardless of `polynomial_order`.
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineOptions {
    pub enabled: bool,
    pub method: BaselineMethod,
    pub polynomial_order: usize,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            method: BaselineMethod::default(),
            polynomial_order: constants::DEFAULT_BASELINE_ORDER,
        }
    }
}

impl BaselineOptions {
    pub fn validate(&self) -> Result<(), AlgorithmError> {
        if self.method == BaselineMethod::Polynomial {
            validate_order(self.polynomial_order)?;
        }
        Ok(())
    }

    fn effective_order(&self) -> usize {
        match self.method {
            BaselineMethod::Polynomial => self.polynomial_order,
            BaselineMethod::Linear => 1,
        }
    }
}

fn validate_window(window: usize) -> Result<(), AlgorithmError> {
    if window < constants::MIN_WINDOW_SIZE
        || window > constants::MAX_WINDOW_SIZE
        || window % 2 == 0
    {
        return Err(AlgorithmError::InvalidParameter {
            parameter: "window_size",
            value: window.to_string(),
            expected: "an odd number of samples between 3 and 201",
        });
    }
    Ok(())
}

fn validate_order(order: usize) -> Result<(), AlgorithmError> {
    if order > constants::MAX_POLYNOMIAL_ORDER {
        return Err(AlgorithmError::InvalidParameter {
            parameter: "polynomial_order",
            value: order.to_string(),
            expected: "an order between 0 and 6",
        });
    }
    Ok(())
}

// =============================================================================
// Compact sequence helpers
// =============================================================================

/// Present samples of a curve with their row positions.
struct Present {
    rows: Vec<usize>,
    values: Vec<f64>,
}

impl Present {
    fn collect(values: &[Option<f64>]) -> Self {
        let mut rows = Vec::with_capacity(values.len());
        let mut present = Vec::with_capacity(values.len());
        for (i, v) in values.iter().enumerate() {
            if let Some(v) = v {
                rows.push(i);
                present.push(*v);
            }
        }
        Self {
            rows,
            values: present,
        }
    }

    /// Scatter `updated` (one entry per present sample) back into a full-length copy.
    fn scatter(&self, original: &[Option<f64>], updated: &[f64]) -> Vec<Option<f64>> {
        let mut out = original.to_vec();
        for (&row, &v) in self.rows.iter().zip(updated) {
            out[row] = Some(v);
        }
        out
    }
}

/// `[lo, hi)` bounds of a full-size window around `i`, shifted inward at the
/// edges. Caller guarantees `window <= n`.
fn window_bounds(i: usize, window: usize, n: usize) -> (usize, usize) {
    let half = window / 2;
    let lo = i.saturating_sub(half).min(n - window);
    (lo, lo + window)
}

fn ensure_window_fits(window: usize, available: usize) -> Result<(), AlgorithmError> {
    if window > available {
        return Err(AlgorithmError::WindowTooLarge { window, available });
    }
    Ok(())
}

// =============================================================================
// Least squares
// =============================================================================

/// Coefficients `c[0] + c[1] x + ... + c[order] x^order` minimising squared
/// error. `None` when the normal equations are singular.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], order: usize) -> Option<Vec<f64>> {
    let m = order + 1;
    if xs.len() < m || xs.len() != ys.len() {
        return None;
    }

    // Power sums for the normal equations.
    let mut sums = vec![0.0; 2 * order + 1];
    let mut rhs = vec![0.0; m];
    for (&x, &y) in xs.iter().zip(ys) {
        let mut p = 1.0;
        for (k, s) in sums.iter_mut().enumerate() {
            *s += p;
            if k < m {
                rhs[k] += p * y;
            }
            p *= x;
        }
    }

    let mut a: Vec<Vec<f64>> = (0..m)
        .map(|r| {
            let mut row: Vec<f64> = (0..m).map(|c| sums[r + c]).collect();
            row.push(rhs[r]);
            row
        })
        .collect();
    solve_augmented(&mut a)
}

/// Gaussian elimination with partial pivoting on an `m x (m+1)` system.
fn solve_augmented(a: &mut [Vec<f64>]) -> Option<Vec<f64>> {
    let m = a.len();
    for col in 0..m {
        let pivot = (col..m).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in col + 1..m {
            let factor = a[row][col] / a[col][col];
            if factor != 0.0 {
                for k in col..=m {
                    a[row][k] -= factor * a[col][k];
                }
            }
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| a[row][k] * x[k]).sum();
        x[row] = (a[row][m] - tail) / a[row][row];
    }
    Some(x)
}

pub fn eval_polynomial(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

// =============================================================================
// Denoise
// =============================================================================

/// Smooth one curve.
///
/// With `preserve_spikes`, samples deviating from their window median by
/// more than `SPIKE_PRESERVE_FACTOR` robust deviations are returned
/// unchanged and excluded from every fit they fall inside.
pub fn denoise(values: &[Option<f64>], options: &DenoiseOptions) -> Result<Vec<Option<f64>>, AlgorithmError> {
    options.validate()?;
    let present = Present::collect(values);
    if present.values.is_empty() {
        return Ok(values.to_vec());
    }
    let n = present.values.len();
    let w = options.window_size;
    ensure_window_fits(w, n)?;

    let y = &present.values;
    let spikes = if options.preserve_spikes {
        spike_mask(y, w, constants::SPIKE_PRESERVE_FACTOR)
    } else {
        vec![false; n]
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if spikes[i] {
            out.push(y[i]);
            continue;
        }
        let (lo, hi) = window_bounds(i, w, n);
        let keep: Vec<usize> = (lo..hi).filter(|&j| !spikes[j]).collect();
        let smoothed = match options.method {
            DenoiseMethod::SavitzkyGolay => {
                local_polynomial(y, &keep, i, w, options.polynomial_order)
            }
            DenoiseMethod::MovingAverage => {
                keep.iter().map(|&j| y[j]).sum::<f64>() / keep.len() as f64
            }
            DenoiseMethod::Median => {
                let samples: Vec<f64> = keep.iter().map(|&j| y[j]).collect();
                median(&samples).unwrap_or(y[i])
            }
        };
        out.push((1.0 - options.strength) * y[i] + options.strength * smoothed);
    }

    Ok(present.scatter(values, &out))
}

/// Least-squares polynomial over `keep` evaluated at sample `i`. Falls back
/// to lower orders when spike exclusion leaves too few samples.
fn local_polynomial(y: &[f64], keep: &[usize], i: usize, window: usize, order: usize) -> f64 {
    // Offsets scaled to [-1, 1] keep the normal equations well conditioned.
    let half = (window / 2).max(1) as f64;
    let xs: Vec<f64> = keep.iter().map(|&j| (j as f64 - i as f64) / half).collect();
    let ys: Vec<f64> = keep.iter().map(|&j| y[j]).collect();

    let mut order = order.min(keep.len().saturating_sub(1));
    loop {
        if let Some(coeffs) = fit_polynomial(&xs, &ys, order) {
            return coeffs[0];
        }
        if order == 0 {
            return y[i];
        }
        order -= 1;
    }
}

/// Windowed Hampel test: true where a sample lies more than `factor` robust
/// deviations from its window median.
fn spike_mask(y: &[f64], window: usize, factor: f64) -> Vec<bool> {
    let n = y.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = window_bounds(i, window, n);
            let segment = &y[lo..hi];
            let Some(center) = median(segment) else {
                return false;
            };
            let scale = robust_scale(segment, center);
            scale > 0.0 && (y[i] - center).abs() > factor * scale
        })
        .collect()
}

// =============================================================================
// Despike
// =============================================================================

/// Despiked values plus the rows that were replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct DespikeOutput {
    pub values: Vec<Option<f64>>,
    pub spike_rows: Vec<usize>,
}

impl DespikeOutput {
    pub fn spike_count(&self) -> usize {
        self.spike_rows.len()
    }
}

/// Detect and replace isolated spikes in one curve.
///
/// Detection runs on the original values only, so a spike never masks its
/// neighbour. Flagged samples are then replaced from unflagged samples.
pub fn despike(values: &[Option<f64>], options: &DespikeOptions) -> Result<DespikeOutput, AlgorithmError> {
    options.validate()?;
    let present = Present::collect(values);
    if present.values.is_empty() {
        return Ok(DespikeOutput {
            values: values.to_vec(),
            spike_rows: Vec::new(),
        });
    }
    let n = present.values.len();
    let w = options.window_size;
    ensure_window_fits(w, n)?;

    let y = &present.values;
    let flags: Vec<bool> = match options.method {
        DespikeMethod::Mad => spike_mask(y, w, options.threshold),
        DespikeMethod::ZScore => zscore_mask(y, w, options.threshold),
    };

    let mut out = y.clone();
    let good: Vec<usize> = (0..n).filter(|&i| !flags[i]).collect();
    if good.is_empty() {
        // Nothing trustworthy to rebuild from.
        return Ok(DespikeOutput {
            values: values.to_vec(),
            spike_rows: Vec::new(),
        });
    }
    let slopes = match options.replacement {
        ReplacementMethod::Pchip => pchip_slopes(&good, y),
        _ => Vec::new(),
    };

    let mut spike_rows = Vec::new();
    for i in (0..n).filter(|&i| flags[i]) {
        out[i] = match options.replacement {
            ReplacementMethod::Median => {
                let (lo, hi) = window_bounds(i, w, n);
                let samples: Vec<f64> = (lo..hi).filter(|&j| !flags[j]).map(|j| y[j]).collect();
                median(&samples).or_else(|| median(&y[lo..hi])).unwrap_or(y[i])
            }
            ReplacementMethod::Linear => interpolate(&good, y, i, None),
            ReplacementMethod::Pchip => interpolate(&good, y, i, Some(slopes.as_slice())),
        };
        spike_rows.push(present.rows[i]);
    }

    tracing::trace!(spikes = spike_rows.len(), samples = n, "despike");
    Ok(DespikeOutput {
        values: present.scatter(values, &out),
        spike_rows,
    })
}

/// Leave-one-out z-score: mean and standard deviation of the window without
/// the tested sample.
fn zscore_mask(y: &[f64], window: usize, threshold: f64) -> Vec<bool> {
    let n = y.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = window_bounds(i, window, n);
            let others: Vec<f64> = (lo..hi).filter(|&j| j != i).map(|j| y[j]).collect();
            if others.is_empty() {
                return false;
            }
            let mean = others.iter().sum::<f64>() / others.len() as f64;
            let var = others.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / others.len() as f64;
            let std = var.sqrt();
            if std > 0.0 {
                (y[i] - mean).abs() / std > threshold
            } else {
                // Flat surroundings: any departure is a spike.
                (y[i] - mean).abs() > constants::MEAN_EPSILON
            }
        })
        .collect()
}

/// Fritsch-Carlson derivative at each knot of `good` (indices into `y`).
fn pchip_slopes(good: &[usize], y: &[f64]) -> Vec<f64> {
    let k = good.len();
    if k < 2 {
        return vec![0.0; k];
    }
    let h: Vec<f64> = good.windows(2).map(|p| (p[1] - p[0]) as f64).collect();
    let delta: Vec<f64> = good
        .windows(2)
        .zip(&h)
        .map(|(p, &h)| (y[p[1]] - y[p[0]]) / h)
        .collect();

    let mut d = vec![0.0; k];
    if k == 2 {
        d[0] = delta[0];
        d[1] = delta[0];
        return d;
    }

    for i in 1..k - 1 {
        let (d0, d1) = (delta[i - 1], delta[i]);
        if d0 == 0.0 || d1 == 0.0 || d0.signum() != d1.signum() {
            d[i] = 0.0;
        } else {
            let w1 = 2.0 * h[i] + h[i - 1];
            let w2 = h[i] + 2.0 * h[i - 1];
            d[i] = (w1 + w2) / (w1 / d0 + w2 / d1);
        }
    }
    d[0] = pchip_end_slope(h[0], h[1], delta[0], delta[1]);
    d[k - 1] = pchip_end_slope(h[k - 2], h[k - 3], delta[k - 2], delta[k - 3]);
    d
}

/// One-sided three-point end derivative, limited to keep monotonicity.
fn pchip_end_slope(h0: f64, h1: f64, del0: f64, del1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * del0 - h0 * del1) / (h0 + h1);
    if d.signum() != del0.signum() {
        0.0
    } else if del0.signum() != del1.signum() && d.abs() > 3.0 * del0.abs() {
        3.0 * del0
    } else {
        d
    }
}

/// Value at sample `i` from the unflagged knots. Linear when `slopes` is
/// `None`, cubic Hermite otherwise. Beyond the outermost knot the nearest
/// knot value is held.
fn interpolate(good: &[usize], y: &[f64], i: usize, slopes: Option<&[f64]>) -> f64 {
    let pos = good.partition_point(|&g| g < i);
    if pos == 0 {
        return y[good[0]];
    }
    if pos == good.len() {
        return y[good[good.len() - 1]];
    }
    let (a, b) = (good[pos - 1], good[pos]);
    let h = (b - a) as f64;
    let t = (i - a) as f64 / h;
    let (y0, y1) = (y[a], y[b]);

    match slopes {
        None => y0 + (y1 - y0) * t,
        Some(d) => {
            let (d0, d1) = (d[pos - 1], d[pos]);
            let t2 = t * t;
            let t3 = t2 * t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h10 = t3 - 2.0 * t2 + t;
            let h11 = t3 - t2;
            // h00 = 1 - h01, folded in so flat segments reproduce y0 exactly.
            y0 + (y1 - y0) * h01 + h * (d0 * h10 + d1 * h11)
        }
    }
}

// =============================================================================
// Baseline
// =============================================================================

/// Remove a low-order polynomial trend against depth.
///
/// The fitted trend minus its mean is subtracted, so the curve keeps its
/// average level and only the drift is removed. Subtracting the whole fit
/// would centre the curve on zero and fail every physical-range check that
/// runs after correction.
pub fn baseline_correct(
    depths: &[f64],
    values: &[Option<f64>],
    options: &BaselineOptions,
) -> Result<Vec<Option<f64>>, AlgorithmError> {
    options.validate()?;
    let order = options.effective_order();

    let present = Present::collect(values);
    let n = present.values.len();
    if n == 0 {
        return Ok(values.to_vec());
    }
    if n < order + 1 {
        return Err(AlgorithmError::InsufficientData {
            required: order + 1,
            available: n,
        });
    }

    let xs_raw: Vec<f64> = present.rows.iter().map(|&r| depths[r]).collect();
    let lo = xs_raw.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs_raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if order > 0 && span <= 0.0 {
        return Err(AlgorithmError::Degenerate {
            reason: "all sample depths are identical",
        });
    }
    let xs: Vec<f64> = xs_raw
        .iter()
        .map(|d| if span > 0.0 { 2.0 * (d - lo) / span - 1.0 } else { 0.0 })
        .collect();

    let coeffs = fit_polynomial(&xs, &present.values, order).ok_or(AlgorithmError::Degenerate {
        reason: "baseline least-squares system is singular",
    })?;
    let trend: Vec<f64> = xs.iter().map(|&x| eval_polynomial(&coeffs, x)).collect();
    let level = trend.iter().sum::<f64>() / n as f64;

    let corrected: Vec<f64> = present
        .values
        .iter()
        .zip(&trend)
        .map(|(v, t)| v - (t - level))
        .collect();
    Ok(present.scatter(values, &corrected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn despike_opts(threshold: f64) -> DespikeOptions {
        DespikeOptions {
            threshold,
            ..DespikeOptions::default()
        }
    }

    #[test]
    fn test_fit_polynomial_recovers_quadratic() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 / 3.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 1.5 - 2.0 * x + 0.5 * x * x).collect();
        let c = fit_polynomial(&xs, &ys, 2).unwrap();
        assert!((c[0] - 1.5).abs() < 1e-9);
        assert!((c[1] + 2.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
        assert!((eval_polynomial(&c, 2.0) - (1.5 - 4.0 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fit_polynomial_singular() {
        assert!(fit_polynomial(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], 1).is_none());
    }

    #[test]
    fn test_despike_replaces_single_outlier() {
        let mut raw = vec![50.0; 21];
        raw[10] = 150.0;
        let out = despike(&some(&raw), &despike_opts(2.5)).unwrap();
        assert_eq!(out.spike_rows, vec![10]);
        assert!((out.values[10].unwrap() - 50.0).abs() < 1e-9);
        for (i, v) in out.values.iter().enumerate() {
            if i != 10 {
                assert_eq!(*v, Some(50.0));
            }
        }
    }

    #[test]
    fn test_despike_is_idempotent() {
        let mut raw = vec![50.0; 21];
        raw[10] = 150.0;
        let first = despike(&some(&raw), &despike_opts(2.5)).unwrap();
        let second = despike(&first.values, &despike_opts(2.5)).unwrap();
        assert_eq!(second.spike_count(), 0);
        assert_eq!(second.values, first.values);
    }

    #[test]
    fn test_despike_skips_missing_and_keeps_them_missing() {
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(20.0 + (i % 2) as f64)).collect();
        values[4] = None;
        values[9] = Some(400.0);
        let out = despike(&values, &DespikeOptions::default()).unwrap();
        assert_eq!(out.values[4], None);
        assert_eq!(out.spike_rows, vec![9]);
        let v = out.values[9].unwrap();
        assert!((19.0..=22.0).contains(&v), "replacement {v}");
    }

    #[test]
    fn test_despike_linear_and_median_replacement() {
        let raw: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let mut spiked = raw.clone();
        spiked[7] = 90.0;
        let linear = despike(
            &some(&spiked),
            &DespikeOptions {
                replacement: ReplacementMethod::Linear,
                ..DespikeOptions::default()
            },
        )
        .unwrap();
        assert!((linear.values[7].unwrap() - 7.0).abs() < 1e-9);

        let med = despike(
            &some(&spiked),
            &DespikeOptions {
                replacement: ReplacementMethod::Median,
                ..DespikeOptions::default()
            },
        )
        .unwrap();
        assert!((med.values[7].unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_despike_pchip_follows_trend() {
        let raw: Vec<f64> = (0..15).map(|i| 2.0 * i as f64).collect();
        let mut spiked = raw.clone();
        spiked[6] = -80.0;
        let out = despike(&some(&spiked), &DespikeOptions::default()).unwrap();
        assert_eq!(out.spike_count(), 1);
        assert!((out.values[6].unwrap() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_zscore_detects_isolated_spike() {
        let mut raw: Vec<f64> = (0..20).map(|i| 10.0 + 0.1 * (i % 2) as f64).collect();
        raw[12] = 40.0;
        let out = despike(
            &some(&raw),
            &DespikeOptions {
                method: DespikeMethod::ZScore,
                ..DespikeOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out.spike_rows, vec![12]);
    }

    #[test]
    fn test_denoise_preserves_spike_and_reduces_variance() {
        let mut raw: Vec<f64> = (0..41).map(|i| if i % 2 == 0 { 10.5 } else { 9.5 }).collect();
        raw[20] = 100.0;
        let options = DenoiseOptions {
            strength: 1.0,
            ..DenoiseOptions::default()
        };
        let out = denoise(&some(&raw), &options).unwrap();
        assert_eq!(out[20], Some(100.0));

        let others: Vec<f64> = out
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 20)
            .map(|(_, v)| v.unwrap())
            .collect();
        let mean = others.iter().sum::<f64>() / others.len() as f64;
        let var = others.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / others.len() as f64;
        assert!(var < 0.25, "variance {var}");
    }

    #[test]
    fn test_denoise_strength_zero_is_identity() {
        let raw = some(&[1.0, 3.0, 2.0, 5.0, 4.0, 6.0, 5.0]);
        let options = DenoiseOptions {
            strength: 0.0,
            ..DenoiseOptions::default()
        };
        let out = denoise(&raw, &options).unwrap();
        for (a, b) in out.iter().zip(&raw) {
            assert!((a.unwrap() - b.unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_denoise_polynomial_reproduces_quadratic() {
        let raw: Vec<f64> = (0..12).map(|i| (i * i) as f64).collect();
        let options = DenoiseOptions {
            strength: 1.0,
            preserve_spikes: false,
            ..DenoiseOptions::default()
        };
        let out = denoise(&some(&raw), &options).unwrap();
        for (a, b) in out.iter().zip(&raw) {
            assert!((a.unwrap() - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_denoise_moving_average_and_median() {
        let raw = some(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let avg = denoise(
            &raw,
            &DenoiseOptions {
                method: DenoiseMethod::MovingAverage,
                strength: 1.0,
                preserve_spikes: false,
                window_size: 3,
                ..DenoiseOptions::default()
            },
        )
        .unwrap();
        assert!((avg[3].unwrap() - 4.0).abs() < 1e-12);
        // Edge window is shifted inward: [1, 2, 3].
        assert!((avg[0].unwrap() - 2.0).abs() < 1e-12);

        let med = denoise(
            &some(&[1.0, 9.0, 2.0, 3.0, 4.0]),
            &DenoiseOptions {
                method: DenoiseMethod::Median,
                strength: 1.0,
                preserve_spikes: false,
                window_size: 3,
                ..DenoiseOptions::default()
            },
        )
        .unwrap();
        assert_eq!(med[2], Some(3.0));
    }

    #[test]
    fn test_window_larger_than_data_is_error() {
        let raw = some(&[1.0, 2.0, 3.0]);
        let err = denoise(&raw, &DenoiseOptions::default()).unwrap_err();
        assert_eq!(
            err,
            AlgorithmError::WindowTooLarge {
                window: 5,
                available: 3
            }
        );
        assert!(matches!(
            despike(&raw, &DespikeOptions::default()),
            Err(AlgorithmError::WindowTooLarge { .. })
        ));
    }

    #[test]
    fn test_missing_values_do_not_count_toward_window() {
        let raw = vec![Some(1.0), None, Some(2.0), None, Some(3.0), Some(4.0)];
        let err = denoise(&raw, &DenoiseOptions::default()).unwrap_err();
        assert!(matches!(err, AlgorithmError::WindowTooLarge { available: 4, .. }));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let even = DenoiseOptions {
            window_size: 4,
            ..DenoiseOptions::default()
        };
        assert!(matches!(
            even.validate(),
            Err(AlgorithmError::InvalidParameter { parameter: "window_size", .. })
        ));
        let order = DenoiseOptions {
            window_size: 3,
            polynomial_order: 3,
            ..DenoiseOptions::default()
        };
        assert!(matches!(
            order.validate(),
            Err(AlgorithmError::InvalidParameter { parameter: "polynomial_order", .. })
        ));
        let strength = DenoiseOptions {
            strength: 1.5,
            ..DenoiseOptions::default()
        };
        assert!(strength.validate().is_err());
        assert!(despike_opts(0.0).validate().is_err());
        assert!(despike_opts(-1.0).validate().is_err());
    }

    #[test]
    fn test_baseline_removes_linear_drift_keeps_level() {
        let depths: Vec<f64> = (0..50).map(|i| 1000.0 + i as f64 * 0.5).collect();
        let values: Vec<Option<f64>> = depths
            .iter()
            .enumerate()
            .map(|(i, d)| Some(60.0 + 0.2 * (d - 1000.0) + if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        let options = BaselineOptions {
            enabled: true,
            method: BaselineMethod::Linear,
            ..BaselineOptions::default()
        };
        let out = baseline_correct(&depths, &values, &options).unwrap();

        let before_mean = values.iter().flatten().sum::<f64>() / 50.0;
        let after: Vec<f64> = out.iter().flatten().copied().collect();
        let after_mean = after.iter().sum::<f64>() / 50.0;
        assert!((before_mean - after_mean).abs() < 1e-9);

        // Drift gone: first and last halves now share a level.
        let first = after[..25].iter().sum::<f64>() / 25.0;
        let last = after[25..].iter().sum::<f64>() / 25.0;
        assert!((first - last).abs() < 0.1, "{first} vs {last}");
    }

    #[test]
    fn test_baseline_degenerate_depths() {
        let depths = vec![5.0; 4];
        let values = some(&[1.0, 2.0, 3.0, 4.0]);
        let options = BaselineOptions {
            enabled: true,
            ..BaselineOptions::default()
        };
        assert!(matches!(
            baseline_correct(&depths, &values, &options),
            Err(AlgorithmError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_baseline_insufficient_data() {
        let depths = vec![1.0, 2.0, 3.0];
        let values = vec![Some(1.0), None, Some(2.0)];
        let options = BaselineOptions {
            enabled: true,
            polynomial_order: 2,
            ..BaselineOptions::default()
        };
        assert_eq!(
            baseline_correct(&depths, &values, &options),
            Err(AlgorithmError::InsufficientData {
                required: 3,
                available: 2
            })
        );
    }
}
