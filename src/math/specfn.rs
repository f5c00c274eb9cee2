//! Special functions for the Bouligand (2009) spectral model.
//!
//! The model needs the real gamma function and the modified Bessel function
//! of the second kind `K_ν(x)` at *fractional* order `ν = (1 + β)/2`.
//!
//! Numerical notes:
//! - `ln_gamma` is the Lanczos approximation (g = 7, 9 terms), accurate to
//!   ~1e-13 over the arguments we use.
//! - `bessel_k` combines the Temme power series for `x ≤ 2` with Steed's
//!   continued fraction for `x > 2`, then recurses upward in order.
//!   Upward recurrence is stable for `K` (it grows with order).
//! - Both routines return NaN on out-of-domain input rather than panic;
//!   callers treat NaN as "candidate invalid".

use std::f64::consts::PI;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx).
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = LANCZOS_COEF[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, &c) in LANCZOS_COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Gamma function for `x > 0`.
pub fn gamma(x: f64) -> f64 {
    ln_gamma(x).exp()
}

const BESSEL_EPS: f64 = 1e-15;
const BESSEL_MAX_ITER: usize = 10_000;

/// Modified Bessel function of the second kind `K_ν(x)` for real order.
///
/// `K_{-ν} = K_ν`, so the sign of `ν` is ignored. Returns NaN for `x ≤ 0`
/// or if the series fails to converge.
pub fn bessel_k(nu: f64, x: f64) -> f64 {
    if !(nu.is_finite() && x.is_finite()) || x <= 0.0 {
        return f64::NAN;
    }
    let nu = nu.abs();

    // Split the order into an integer count of upward recurrences and a
    // fractional part mu in [-0.5, 0.5).
    let nl = (nu + 0.5).floor() as usize;
    let mu = nu - nl as f64;
    let mu2 = mu * mu;
    let xi = 1.0 / x;
    let xi2 = 2.0 * xi;

    let (mut k_mu, mut k_mu1) = if x <= 2.0 {
        match temme_series(mu, mu2, x) {
            Some(pair) => pair,
            None => return f64::NAN,
        }
    } else {
        match steed_cf2(mu, mu2, x, xi) {
            Some(pair) => pair,
            None => return f64::NAN,
        }
    };

    // K_{v+1} = K_{v-1} + (2v/x) K_v, stable upward.
    for i in 1..=nl {
        let next = (mu + i as f64) * xi2 * k_mu1 + k_mu;
        k_mu = k_mu1;
        k_mu1 = next;
    }
    k_mu
}

/// Temme's series for `K_mu` and `K_{mu+1}` at small argument (`x ≤ 2`).
fn temme_series(mu: f64, mu2: f64, x: f64) -> Option<(f64, f64)> {
    let x2 = 0.5 * x;
    let pimu = PI * mu;
    let fact = if pimu.abs() < BESSEL_EPS {
        1.0
    } else {
        pimu / pimu.sin()
    };

    let mut d = -x2.ln();
    let e = mu * d;
    let fact2 = if e.abs() < BESSEL_EPS { 1.0 } else { e.sinh() / e };

    let (gam1, gam2, gampl, gammi) = temme_gammas(mu);

    let mut ff = fact * (gam1 * e.cosh() + gam2 * fact2 * d);
    let mut sum = ff;
    let e = e.exp();
    let mut p = 0.5 * e / gampl;
    let mut q = 0.5 / (e * gammi);
    let mut c = 1.0;
    d = x2 * x2;
    let mut sum1 = p;

    let mut converged = false;
    for i in 1..=BESSEL_MAX_ITER {
        let fi = i as f64;
        ff = (fi * ff + p + q) / (fi * fi - mu2);
        c *= d / fi;
        p /= fi - mu;
        q /= fi + mu;
        let del = c * ff;
        sum += del;
        let del1 = c * (p - fi * ff);
        sum1 += del1;
        if del.abs() < sum.abs() * BESSEL_EPS {
            converged = true;
            break;
        }
    }
    if !converged {
        return None;
    }

    let xi2 = 2.0 / x;
    Some((sum, sum1 * xi2))
}

/// Steed's continued fraction CF2 for `K_mu` and `K_{mu+1}` at `x > 2`.
fn steed_cf2(mu: f64, mu2: f64, x: f64, xi: f64) -> Option<(f64, f64)> {
    let mut b = 2.0 * (1.0 + x);
    let mut d = 1.0 / b;
    let mut h = d;
    let mut delh = d;
    let mut q1 = 0.0;
    let mut q2 = 1.0;
    let a1 = 0.25 - mu2;
    let mut q = a1;
    let mut c = a1;
    let mut a = -a1;
    let mut s = 1.0 + q * delh;

    let mut converged = false;
    for i in 2..=BESSEL_MAX_ITER {
        let fi = i as f64;
        a -= 2.0 * (fi - 1.0);
        c = -a * c / fi;
        let qnew = (q1 - b * q2) / a;
        q1 = q2;
        q2 = qnew;
        q += c * qnew;
        b += 2.0;
        d = 1.0 / (b + a * d);
        delh = (b * d - 1.0) * delh;
        h += delh;
        let dels = q * delh;
        s += dels;
        if (dels / s).abs() < BESSEL_EPS {
            converged = true;
            break;
        }
    }
    if !converged {
        return None;
    }

    let h = a1 * h;
    let k_mu = (PI / (2.0 * x)).sqrt() * (-x).exp() / s;
    let k_mu1 = k_mu * (mu + x + 0.5 - h) * xi;
    Some((k_mu, k_mu1))
}

/// Temme's gamma combinations for |mu| <= 0.5:
///
/// - `gam1 = [1/Γ(1-μ) - 1/Γ(1+μ)] / (2μ)` (limit `-γ` as μ → 0)
/// - `gam2 = [1/Γ(1-μ) + 1/Γ(1+μ)] / 2`
/// - plus `1/Γ(1+μ)` and `1/Γ(1-μ)` themselves
fn temme_gammas(mu: f64) -> (f64, f64, f64, f64) {
    let gampl = (-ln_gamma(1.0 + mu)).exp();
    let gammi = (-ln_gamma(1.0 - mu)).exp();
    let gam1 = if mu.abs() < 1e-8 {
        -EULER_GAMMA
    } else {
        (gammi - gampl) / (2.0 * mu)
    };
    let gam2 = 0.5 * (gammi + gampl);
    (gam1, gam2, gampl, gammi)
}
