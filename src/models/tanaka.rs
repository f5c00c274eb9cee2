//! Tanaka et al. (1999) centroid method.
//!
//! Two weighted straight-line fits on the radial spectrum:
//!
//! - top depth: `ln √P(k)` vs `k` over a high-wavenumber band,
//!   slope `= -z_t`
//! - centroid depth: `ln(√P(k)/k)` vs `k` over a low-wavenumber band,
//!   slope `= -z_0`
//!
//! and the Okubo et al. (1985) combination for the base of the magnetic
//! layer, `z_b = 2 z_0 - z_t`, which is read as the Curie-point depth.
//! With `k` in rad/km both slopes are directly in km.

use crate::domain::{RadialSpectrum, TanakaBands, TanakaFit};
use crate::error::AppError;
use crate::math::linear_fit;

/// Minimum spectrum bins per band for a meaningful slope.
const MIN_BAND_BINS: usize = 3;

/// Run both band fits and combine them into a Curie-depth estimate.
pub fn tanaka1999(
    spectrum: &RadialSpectrum,
    bands: &TanakaBands,
    sigma_floor: f64,
) -> Result<TanakaFit, AppError> {
    let (zt, zt_err) = band_slope(spectrum, bands.zt_band, sigma_floor, false)?;
    let (z0, z0_err) = band_slope(spectrum, bands.z0_band, sigma_floor, true)?;
    let (zb, zb_err) = compute_tanaka(zt, zt_err, z0, z0_err);
    Ok(TanakaFit {
        zt,
        zt_err,
        z0,
        z0_err,
        zb,
        zb_err,
    })
}

/// Curie-point depth from top and centroid depths (Okubo et al. 1985):
/// `z_b = 2 z_0 - z_t`, `σ_b = √(4 σ_0² + σ_t²)`.
pub fn compute_tanaka(zt: f64, zt_err: f64, z0: f64, z0_err: f64) -> (f64, f64) {
    let zb = 2.0 * z0 - zt;
    let zb_err = (4.0 * z0_err * z0_err + zt_err * zt_err).sqrt();
    (zb, zb_err)
}

/// Weighted slope of the band-restricted amplitude spectrum.
///
/// `centroid = true` divides the amplitude by `k` first (the `ln(√P/k)`
/// form). Depth is `-slope`.
fn band_slope(
    spectrum: &RadialSpectrum,
    (kmin, kmax): (f64, f64),
    sigma_floor: f64,
    centroid: bool,
) -> Result<(f64, f64), AppError> {
    if !(kmin.is_finite() && kmax.is_finite() && kmax > kmin && kmin >= 0.0) {
        return Err(AppError::new(
            2,
            format!("Invalid Tanaka wavenumber band [{kmin}, {kmax}]."),
        ));
    }

    let band = spectrum.band(kmin, kmax);
    if band.len() < MIN_BAND_BINS {
        return Err(AppError::new(
            3,
            format!(
                "Tanaka band [{kmin:.4}, {kmax:.4}] rad/km holds {} bins (needs {MIN_BAND_BINS}); \
                 widen the band or the window.",
                band.len()
            ),
        ));
    }

    // ln sqrt(P) = Phi / 2; subtract ln k for the centroid form. The factor
    // 1/2 halves the sigmas as well, which the weights absorb.
    let mut y = Vec::with_capacity(band.len());
    let mut w = Vec::with_capacity(band.len());
    for i in 0..band.len() {
        let mut yi = 0.5 * band.power[i];
        if centroid {
            yi -= band.k[i].ln();
        }
        y.push(yi);
        let s = (0.5 * band.sigma[i]).max(sigma_floor);
        w.push(1.0 / (s * s));
    }

    let fit = linear_fit(&band.k, &y, &w)
        .ok_or_else(|| AppError::new(4, "Degenerate Tanaka band regression."))?;

    Ok((-fit.slope, fit.slope_err))
}
