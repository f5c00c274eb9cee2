//! Bouligand et al. (2009) radial power-spectrum model.
//!
//! For a layer of fractally magnetised crust between depths `z_t` and
//! `z_t + Δz` (km), the radial log-power spectrum at wavenumber `k`
//! (rad/km) is
//!
//! ```text
//! Φ(k) = C - 2 k z_t - (β - 1) ln k - k Δz + ln A(kΔz, β)
//! A(x, β) = (√π / Γ(1 + β/2)) ·
//!           [ cosh(x) Γ((1+β)/2) / 2  -  K_ν(x) (x/2)^ν ],  ν = (1+β)/2
//! ```
//!
//! `C` absorbs field strength and FFT normalisation, so only spectral
//! *shape* matters for depth estimates.

use crate::domain::BouligandParams;
use crate::math::{bessel_k, ln_gamma};

/// `cosh` overflows near 710; above this the Bessel term is already
/// negligible, so we switch to the large-argument form of `ln A`.
const LARGE_KDZ: f64 = 600.0;

/// Evaluate `Φ(k)` for the Bouligand (2009) model.
///
/// Returns NaN for `k <= 0` or parameters outside the model's domain
/// (`Δz <= 0`, non-finite inputs). Callers treat NaN as "reject candidate".
pub fn bouligand2009(k: f64, beta: f64, zt: f64, dz: f64, c: f64) -> f64 {
    if !(k > 0.0 && dz > 0.0) || !(beta.is_finite() && zt.is_finite() && c.is_finite()) {
        return f64::NAN;
    }

    let nu = 0.5 * (1.0 + beta);
    let ln_gamma_nu = ln_gamma(nu);
    let ln_gamma_b2 = ln_gamma(1.0 + 0.5 * beta);
    if !(ln_gamma_nu.is_finite() && ln_gamma_b2.is_finite()) {
        return f64::NAN;
    }

    let kdz = k * dz;
    let base = c - 2.0 * k * zt - (beta - 1.0) * k.ln();

    if kdz > LARGE_KDZ {
        // cosh(x) -> e^x / 2 and K_v(x) x^v -> 0: the -kΔz term cancels and
        // the spectrum becomes independent of Δz (half-space limit).
        let ln_a = 0.5 * std::f64::consts::PI.ln() + ln_gamma_nu - ln_gamma_b2 - (4.0f64).ln();
        return base + ln_a;
    }

    let gamma_nu = ln_gamma_nu.exp();
    let kv = bessel_k(nu, kdz);
    if !kv.is_finite() {
        return f64::NAN;
    }

    let a = std::f64::consts::PI.sqrt() / ln_gamma_b2.exp()
        * (0.5 * kdz.cosh() * gamma_nu - kv * (0.5 * kdz).powf(nu));
    if !(a > 0.0) {
        return f64::NAN;
    }

    base - kdz + a.ln()
}

/// Evaluate the model over a wavenumber array.
pub fn bouligand2009_vec(k: &[f64], p: &BouligandParams) -> Vec<f64> {
    k.iter()
        .map(|&ki| bouligand2009(ki, p.beta, p.zt, p.dz, p.c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k_range() -> Vec<f64> {
        (1..=60).map(|i| 0.02 * i as f64).collect()
    }

    #[test]
    fn model_is_finite_over_typical_parameters() {
        for &beta in &[0.5, 2.0, 3.0, 5.0] {
            for &zt in &[0.0, 0.5, 2.0] {
                for &dz in &[5.0, 20.0, 80.0] {
                    for &k in &k_range() {
                        let phi = bouligand2009(k, beta, zt, dz, 1.0);
                        assert!(
                            phi.is_finite(),
                            "phi not finite at beta={beta} zt={zt} dz={dz} k={k}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn deeper_top_lowers_power_at_all_wavenumbers() {
        for &k in &k_range() {
            let shallow = bouligand2009(k, 3.0, 0.5, 20.0, 0.0);
            let deep = bouligand2009(k, 3.0, 2.0, 20.0, 0.0);
            assert!(deep < shallow, "expected attenuation at k={k}");
        }
    }

    #[test]
    fn constant_shifts_spectrum_additively() {
        let a = bouligand2009(0.1, 3.0, 1.0, 25.0, 0.0);
        let b = bouligand2009(0.1, 3.0, 1.0, 25.0, 2.5);
        assert!((b - a - 2.5).abs() < 1e-12);
    }

    #[test]
    fn large_kdz_branch_is_continuous() {
        // Straddle the asymptotic switch with a huge thickness: values on
        // either side of the threshold should agree closely.
        let dz = 1.0e4;
        let k_lo = (LARGE_KDZ - 1.0) / dz;
        let k_hi = (LARGE_KDZ + 1.0) / dz;
        let lo = bouligand2009(k_lo, 3.0, 1.0, dz, 0.0);
        let hi = bouligand2009(k_hi, 3.0, 1.0, dz, 0.0);
        // Compare against the local slope implied by nearby points.
        let mid = bouligand2009((k_lo + k_hi) / 2.0, 3.0, 1.0, dz, 0.0);
        assert!(lo.is_finite() && hi.is_finite() && mid.is_finite());
        assert!((lo - mid).abs() < 0.05 && (hi - mid).abs() < 0.05);
    }

    #[test]
    fn rejects_bad_domain() {
        assert!(bouligand2009(0.0, 3.0, 1.0, 20.0, 0.0).is_nan());
        assert!(bouligand2009(0.1, 3.0, 1.0, -5.0, 0.0).is_nan());
    }
}
