//! Least squares solvers.
//!
//! Two flavours are needed:
//!
//! - a general SVD solve for the plane detrend of each window (3 columns,
//!   many rows)
//! - a weighted straight-line fit *with parameter standard errors* for the
//!   Tanaka band regressions, where the slope uncertainty propagates into
//!   the depth uncertainty
//!
//! The SVD path uses a relaxed tolerance ladder: detrending degenerate
//! windows (e.g. constant data) can produce rank-deficient design matrices,
//! and we prefer a usable solution over a hard failure.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if the strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A weighted straight-line fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Standard error of the slope.
    pub slope_err: f64,
    /// Standard error of the intercept.
    pub intercept_err: f64,
    /// Residual sum of squares (weighted).
    pub sse: f64,
}

/// Weighted least-squares line fit with standard errors.
///
/// Weights are inverse-variance style (larger weight means more influence).
/// Parameter errors follow the textbook normal-equation covariance scaled by
/// the residual variance, which keeps them meaningful even when the supplied
/// weights are only relative.
///
/// Returns `None` for fewer than 3 points, non-finite inputs, or a
/// degenerate x-spread.
pub fn linear_fit(x: &[f64], y: &[f64], w: &[f64]) -> Option<LineFit> {
    let n = x.len();
    if n < 3 || y.len() != n || w.len() != n {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }
    if w.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }

    let sw: f64 = w.iter().sum();
    let xbar: f64 = x.iter().zip(w).map(|(xi, wi)| wi * xi).sum::<f64>() / sw;
    let ybar: f64 = y.iter().zip(w).map(|(yi, wi)| wi * yi).sum::<f64>() / sw;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - xbar;
        sxx += w[i] * dx * dx;
        sxy += w[i] * dx * (y[i] - ybar);
    }
    if sxx <= 1e-300 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = ybar - slope * xbar;

    let mut sse = 0.0;
    for i in 0..n {
        let r = y[i] - intercept - slope * x[i];
        sse += w[i] * r * r;
    }

    // Residual variance with 2 fitted parameters.
    let dof = (n - 2) as f64;
    let s2 = (sse / dof).max(0.0);

    let slope_err = (s2 / sxx).sqrt();
    let intercept_err = (s2 * (1.0 / sw + xbar * xbar / sxx)).sqrt();

    if !(slope.is_finite() && intercept.is_finite()) {
        return None;
    }

    Some(LineFit {
        slope,
        intercept,
        slope_err,
        intercept_err,
        sse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 - 2.0 * v).collect();
        let w = [1.0; 5];

        let fit = linear_fit(&x, &y, &w).unwrap();
        assert!((fit.slope + 2.0).abs() < 1e-12);
        assert!((fit.intercept - 0.5).abs() < 1e-12);
        // Exact data: errors collapse to ~0.
        assert!(fit.slope_err < 1e-10);
    }

    #[test]
    fn linear_fit_rejects_degenerate_x() {
        let x = [1.0, 1.0, 1.0];
        let y = [0.0, 1.0, 2.0];
        let w = [1.0; 3];
        assert!(linear_fit(&x, &y, &w).is_none());
    }

    #[test]
    fn linear_fit_weights_pull_toward_heavy_points() {
        // Two populations; the heavily weighted one defines the line.
        let x = [0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0];
        let mut y = [0.0; 8];
        for i in 0..4 {
            y[i] = 1.0 + 2.0 * x[i]; // heavy
            y[i + 4] = 10.0 - x[i + 4]; // light
        }
        let mut w = [1e-6; 8];
        for wi in w.iter_mut().take(4) {
            *wi = 1.0;
        }

        let fit = linear_fit(&x, &y, &w).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-3);
    }
}
