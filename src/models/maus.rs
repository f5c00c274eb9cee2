//! Maus et al. (1995) fractal half-space model.
//!
//! The magnetic basement is treated as a half-space with fractally
//! distributed magnetisation:
//!
//! ```text
//! Φ(k) = C - 2 k z_t - β ln k
//! ```
//!
//! This is the `Δz → ∞` shape limit of the Bouligand model. The model is
//! linear in `(C, z_t, β)`, so the fit is a weighted linear least squares
//! problem with a closed-form covariance.

use nalgebra::{Matrix3, Vector3};

use crate::domain::{MausFit, RadialSpectrum};
use crate::error::AppError;

/// Evaluate `Φ(k)` for the Maus (1995) model. NaN for `k <= 0`.
pub fn maus1995(k: f64, beta: f64, zt: f64, c: f64) -> f64 {
    if !(k > 0.0) || !(beta.is_finite() && zt.is_finite() && c.is_finite()) {
        return f64::NAN;
    }
    c - 2.0 * k * zt - beta * k.ln()
}

/// Fit the Maus model to a radial spectrum by weighted linear least squares.
///
/// Weights are `1/max(sigma, sigma_floor)^2`. The `z_t` standard error comes
/// from the normal-equation covariance scaled by the residual variance.
pub fn fit_maus1995(
    spectrum: &RadialSpectrum,
    sigma_floor: f64,
) -> Result<MausFit, AppError> {
    let n = spectrum.len();
    if n < 5 {
        return Err(AppError::new(
            3,
            format!("Maus fit needs at least 5 spectrum bins, got {n}."),
        ));
    }

    // Normal equations for the design [1, -2k, -ln k] -> (C, z_t, beta).
    let mut ata = Matrix3::<f64>::zeros();
    let mut aty = Vector3::<f64>::zeros();
    for i in 0..n {
        let k = spectrum.k[i];
        let y = spectrum.power[i];
        let s = spectrum.sigma[i].max(sigma_floor);
        let w = 1.0 / (s * s);
        let row = [1.0, -2.0 * k, -k.ln()];
        for a in 0..3 {
            aty[a] += w * row[a] * y;
            for b in 0..3 {
                ata[(a, b)] += w * row[a] * row[b];
            }
        }
    }

    let inv = ata
        .try_inverse()
        .ok_or_else(|| AppError::new(4, "Singular normal equations in Maus fit."))?;
    let params = inv * aty;
    let (c, zt, beta) = (params[0], params[1], params[2]);
    if !(c.is_finite() && zt.is_finite() && beta.is_finite()) {
        return Err(AppError::new(4, "Non-finite Maus fit parameters."));
    }

    // Residual variance with 3 fitted parameters.
    let mut sse = 0.0;
    for i in 0..n {
        let s = spectrum.sigma[i].max(sigma_floor);
        let w = 1.0 / (s * s);
        let r = spectrum.power[i] - maus1995(spectrum.k[i], beta, zt, c);
        sse += w * r * r;
    }
    let s2 = sse / (n - 3) as f64;
    let zt_err = (inv[(1, 1)] * s2).max(0.0).sqrt();

    Ok(MausFit {
        beta,
        zt,
        zt_err,
        c,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_spectrum(beta: f64, zt: f64, c: f64) -> RadialSpectrum {
        let k: Vec<f64> = (1..=40).map(|i| 0.02 * i as f64).collect();
        let power: Vec<f64> = k.iter().map(|&ki| maus1995(ki, beta, zt, c)).collect();
        let n = k.len();
        RadialSpectrum {
            k,
            power,
            sigma: vec![0.2; n],
            counts: vec![16; n],
        }
    }

    #[test]
    fn recovers_exact_parameters_from_noiseless_spectrum() {
        let s = synthetic_spectrum(3.0, 1.5, 7.0);
        let fit = fit_maus1995(&s, 0.1).unwrap();
        assert!((fit.beta - 3.0).abs() < 1e-8);
        assert!((fit.zt - 1.5).abs() < 1e-8);
        assert!((fit.c - 7.0).abs() < 1e-8);
        assert!(fit.zt_err < 1e-6);
    }

    #[test]
    fn too_few_bins_is_a_data_error() {
        let mut s = synthetic_spectrum(3.0, 1.5, 7.0);
        s.k.truncate(4);
        s.power.truncate(4);
        s.sigma.truncate(4);
        s.counts.truncate(4);
        let err = fit_maus1995(&s, 0.1).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
