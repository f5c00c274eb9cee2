//! Windowed power spectra.
//!
//! Pipeline per window: detrend (plane) -> taper -> 2-D FFT -> bin
//! `ln |F|²` into annuli of width `dk = 2π/(n·dx)`.
//!
//! The 2-D FFT is composed from rustfft's 1-D transforms: rows, transpose,
//! rows again, transpose back. Absolute power normalisation is deliberately
//! left out; it folds into the additive model constant `C`.

use nalgebra::DMatrix;
use rustfft::{FftPlanner, num_complex::Complex};

use crate::domain::{AzimuthalSpectrum, RadialSpectrum, Taper};
use crate::error::AppError;
use crate::grid::CurieGrid;

/// Fewest populated annuli for a spectrum to be worth fitting.
const MIN_BINS: usize = 5;

/// Azimuthally averaged log-power spectrum of one square window.
///
/// `dx_m` is the node spacing in metres; wavenumbers come out in rad/km.
/// Annuli beyond the axis Nyquist are discarded (corner cells are sampled
/// anisotropically).
pub fn radial_spectrum(
    sub: &DMatrix<f64>,
    dx_m: f64,
    taper: Taper,
) -> Result<RadialSpectrum, AppError> {
    let (power, nw, dk) = window_power(sub, dx_m, taper)?;
    let nbins = nw / 2;

    let mut sum = vec![0.0f64; nbins + 1];
    let mut sumsq = vec![0.0f64; nbins + 1];
    let mut count = vec![0usize; nbins + 1];

    for j in 0..nw {
        let ky = signed_freq(j, nw) as f64 * dk;
        for i in 0..nw {
            let kx = signed_freq(i, nw) as f64 * dk;
            let kk = (kx * kx + ky * ky).sqrt();
            let bin = (kk / dk).round() as usize;
            if bin == 0 || bin > nbins {
                continue;
            }
            let ln_p = power[j * nw + i].max(1e-300).ln();
            sum[bin] += ln_p;
            sumsq[bin] += ln_p * ln_p;
            count[bin] += 1;
        }
    }

    let mut out = RadialSpectrum {
        k: Vec::new(),
        power: Vec::new(),
        sigma: Vec::new(),
        counts: Vec::new(),
    };
    for bin in 1..=nbins {
        if count[bin] == 0 {
            continue;
        }
        let n = count[bin] as f64;
        let mean = sum[bin] / n;
        let var = (sumsq[bin] / n - mean * mean).max(0.0);
        out.k.push(bin as f64 * dk);
        out.power.push(mean);
        out.sigma.push(var.sqrt());
        out.counts.push(count[bin]);
    }

    if out.len() < MIN_BINS {
        return Err(AppError::new(
            4,
            format!(
                "Radial spectrum has only {} populated annuli (needs {MIN_BINS}); \
                 use a larger window.",
                out.len()
            ),
        ));
    }
    if out.power.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Non-finite radial spectrum."));
    }
    Ok(out)
}

/// Direction-resolved log-power spectrum, binned by annulus and by azimuth
/// sector of width `theta_deg`. Sectors span `[-90, 90)`; the FFT of a real
/// field is point-symmetric, so 180 degrees covers every direction.
pub fn azimuthal_spectrum(
    sub: &DMatrix<f64>,
    dx_m: f64,
    taper: Taper,
    theta_deg: f64,
) -> Result<AzimuthalSpectrum, AppError> {
    if !(theta_deg.is_finite() && theta_deg >= 1.0 && theta_deg <= 90.0) {
        return Err(AppError::new(
            2,
            format!("Sector width {theta_deg} deg out of range [1, 90]."),
        ));
    }

    let (power, nw, dk) = window_power(sub, dx_m, taper)?;
    let nbins = nw / 2;
    let nsec = (180.0 / theta_deg).round().max(1.0) as usize;
    let sector_width = 180.0 / nsec as f64;

    let mut sum = vec![vec![0.0f64; nbins + 1]; nsec];
    let mut count = vec![vec![0usize; nbins + 1]; nsec];

    for j in 0..nw {
        let ky = signed_freq(j, nw) as f64 * dk;
        for i in 0..nw {
            let kx = signed_freq(i, nw) as f64 * dk;
            let kk = (kx * kx + ky * ky).sqrt();
            let bin = (kk / dk).round() as usize;
            if bin == 0 || bin > nbins {
                continue;
            }
            // Fold onto [-90, 90).
            let mut az = ky.atan2(kx).to_degrees();
            if az >= 90.0 {
                az -= 180.0;
            } else if az < -90.0 {
                az += 180.0;
            }
            let sec = (((az + 90.0) / sector_width) as usize).min(nsec - 1);
            let ln_p = power[j * nw + i].max(1e-300).ln();
            sum[sec][bin] += ln_p;
            count[sec][bin] += 1;
        }
    }

    let k: Vec<f64> = (1..=nbins).map(|b| b as f64 * dk).collect();
    let theta: Vec<f64> = (0..nsec)
        .map(|s| -90.0 + (s as f64 + 0.5) * sector_width)
        .collect();
    let power_out: Vec<Vec<f64>> = (0..nsec)
        .map(|s| {
            (1..=nbins)
                .map(|b| {
                    if count[s][b] == 0 {
                        f64::NAN
                    } else {
                        sum[s][b] / count[s][b] as f64
                    }
                })
                .collect()
        })
        .collect();

    Ok(AzimuthalSpectrum {
        k,
        theta,
        power: power_out,
    })
}

/// Shared preparation: validate, detrend, taper, FFT, return `|F|²` in
/// row-major order together with the window node count and `dk` (rad/km).
fn window_power(
    sub: &DMatrix<f64>,
    dx_m: f64,
    taper: Taper,
) -> Result<(Vec<f64>, usize, f64), AppError> {
    let (ny, nx) = sub.shape();
    if nx != ny {
        return Err(AppError::new(
            4,
            format!("Spectrum windows must be square, got {nx}x{ny}."),
        ));
    }
    if nx < 8 {
        return Err(AppError::new(
            4,
            format!("Window of {nx} nodes is too small for a spectrum."),
        ));
    }
    if !(dx_m.is_finite() && dx_m > 0.0) {
        return Err(AppError::new(2, format!("Invalid node spacing {dx_m} m.")));
    }

    let nw = nx;
    let detrended = CurieGrid::remove_trend(sub);
    let taper_1d = taper_weights(taper, nw);

    let mut buf: Vec<Complex<f64>> = Vec::with_capacity(nw * nw);
    for j in 0..nw {
        for i in 0..nw {
            let v = detrended[(j, i)] * taper_1d[j] * taper_1d[i];
            buf.push(Complex::new(v, 0.0));
        }
    }

    fft2_in_place(&mut buf, nw);

    let power: Vec<f64> = buf.iter().map(|c| c.norm_sqr()).collect();
    let dx_km = dx_m / 1000.0;
    let dk = 2.0 * std::f64::consts::PI / (nw as f64 * dx_km);
    Ok((power, nw, dk))
}

/// In-place 2-D FFT of a row-major `n x n` complex buffer.
pub(crate) fn fft2_in_place(buf: &mut [Complex<f64>], n: usize) {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);

    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
}

/// In-place inverse 2-D FFT. Unnormalised: the caller divides by `n²`.
pub(crate) fn ifft2_in_place(buf: &mut [Complex<f64>], n: usize) {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_inverse(n);

    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
}

fn transpose(buf: &mut [Complex<f64>], n: usize) {
    for j in 0..n {
        for i in (j + 1)..n {
            buf.swap(j * n + i, i * n + j);
        }
    }
}

/// FFT frequency index folded to the signed convention: `0..n/2` positive,
/// the rest negative.
pub(crate) fn signed_freq(i: usize, n: usize) -> isize {
    if i <= n / 2 {
        i as isize
    } else {
        i as isize - n as isize
    }
}

/// 1-D taper weights (applied as an outer product).
pub fn taper_weights(taper: Taper, n: usize) -> Vec<f64> {
    let m = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = i as f64 / m;
            match taper {
                Taper::None => 1.0,
                Taper::Hanning => 0.5 * (1.0 - (2.0 * std::f64::consts::PI * x).cos()),
                Taper::Blackman => {
                    0.42 - 0.5 * (2.0 * std::f64::consts::PI * x).cos()
                        + 0.08 * (4.0 * std::f64::consts::PI * x).cos()
                }
            }
        })
        .collect()
}
