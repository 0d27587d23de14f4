//! Ordinary least squares regression of a regional volume on ICV.

use ndarray::{Array1, Array2};
use ndarray_stats::CorrelationExt;

use crate::error::{IcvError, Result};

/// Slope and intercept of a single predictor least squares fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of complete (x, y) pairs the fit used.
    pub n: usize,
}

impl OlsFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}


/// Keep only the pairs where both values are present.
pub fn complete_pairs(pairs: &[(Option<f64>, Option<f64>)]) -> (Array1<f64>, Array1<f64>) {
    let (x, y): (Vec<f64>, Vec<f64>) = pairs
        .iter()
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .unzip();
    (Array1::from(x), Array1::from(y))
}


/// Fit `y = slope * x + intercept` by least squares.
///
/// Fails with [`IcvError::InsufficientData`] for fewer than two samples or when all `x` are
/// (numerically) equal, instead of returning a meaningless slope.
pub fn fit_ols(x: &Array1<f64>, y: &Array1<f64>) -> Result<OlsFit> {
    let n = x.len();
    if n != y.len() {
        return Err(IcvError::InsufficientData(format!("{} predictor values but {} responses", n, y.len())));
    }
    if n < 2 {
        return Err(IcvError::InsufficientData(format!("at least 2 samples required, got {}", n)));
    }

    let x_mean = x.sum() / n as f64;
    let y_mean = y.sum() / n as f64;
    let dx = x - x_mean;
    let dy = y - y_mean;
    let sxx = dx.dot(&dx);
    let sxy = dx.dot(&dy);

    // Centred sums of constant data are not exactly zero after rounding.
    if sxx <= f64::EPSILON * x.dot(x) {
        return Err(IcvError::InsufficientData(String::from("no variance in ICV")));
    }

    let slope = sxy / sxx;
    Ok(OlsFit { slope, intercept: y_mean - slope * x_mean, n })
}


/// Fit on paired optional samples, dropping pairs with a missing side first.
pub fn fit_ols_pairs(pairs: &[(Option<f64>, Option<f64>)]) -> Result<OlsFit> {
    let (x, y) = complete_pairs(pairs);
    fit_ols(&x, &y)
}


/// Observed minus predicted values.
pub fn residuals(fit: &OlsFit, x: &Array1<f64>, y: &Array1<f64>) -> Array1<f64> {
    y - &x.mapv(|v| fit.predict(v))
}


/// Sample standard deviation of the residuals (n - 2 degrees of freedom). `None` for n <= 2.
pub fn residual_sd(fit: &OlsFit, x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    if x.len() <= 2 {
        return None;
    }
    let r = residuals(fit, x, y);
    Some((r.dot(&r) / (x.len() - 2) as f64).sqrt())
}


/// Pearson correlation of two equally long samples. `None` if it is undefined.
pub fn pearson_r(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let observations = Array2::from_shape_fn((2, n), |(row, col)| if row == 0 { x[col] } else { y[col] });
    let r = observations.pearson_correlation().ok()?[[0, 1]];
    if r.is_finite() {
        Some(r)
    } else {
        None
    }
}
