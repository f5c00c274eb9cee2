//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they
//! can be:
//!
//! - used in-memory during windowing and inversion
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons
//!
//! Unit conventions (everywhere in this crate):
//! - grid coordinates and window sizes: metres
//! - radial wavenumber `k`: rad/km
//! - depths (`z_t`, `Δz`, `z_0`, `z_b`): km, positive down
//! - `Φ(k)`: natural log of azimuthally averaged FFT power

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Taper applied to each window before the FFT.
///
/// Tapering suppresses the spectral leakage caused by the non-periodic
/// window edges. `Hanning` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Taper {
    /// No taper (boxcar).
    None,
    Hanning,
    Blackman,
}

/// Which depth-estimation method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MethodSpec {
    /// Bouligand et al. (2009): full spectral model, MAP + optional MCMC.
    Bouligand,
    /// Tanaka et al. (1999): two-band slope method (top + centroid depth).
    Tanaka,
    /// Maus et al. (1995): fractal half-space slope model.
    Maus,
}

impl MethodSpec {
    pub fn display_name(self) -> &'static str {
        match self {
            MethodSpec::Bouligand => "Bouligand (2009)",
            MethodSpec::Tanaka => "Tanaka (1999)",
            MethodSpec::Maus => "Maus (1995)",
        }
    }
}

/// A rectangular map extent in projected metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.xmin.is_finite()
            && self.xmax.is_finite()
            && self.ymin.is_finite()
            && self.ymax.is_finite()
            && self.xmax > self.xmin
            && self.ymax > self.ymin
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Azimuthally averaged (radial) power spectrum of one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadialSpectrum {
    /// Annulus-centre wavenumbers, strictly increasing (rad/km).
    pub k: Vec<f64>,
    /// Mean of `ln |F|²` per annulus.
    pub power: Vec<f64>,
    /// In-annulus standard deviation of `ln |F|²`.
    pub sigma: Vec<f64>,
    /// Number of FFT cells per annulus.
    pub counts: Vec<usize>,
}

impl RadialSpectrum {
    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    /// Restrict the spectrum to a wavenumber band (inclusive).
    pub fn band(&self, kmin: f64, kmax: f64) -> RadialSpectrum {
        let mut out = RadialSpectrum {
            k: Vec::new(),
            power: Vec::new(),
            sigma: Vec::new(),
            counts: Vec::new(),
        };
        for i in 0..self.k.len() {
            if self.k[i] >= kmin && self.k[i] <= kmax {
                out.k.push(self.k[i]);
                out.power.push(self.power[i]);
                out.sigma.push(self.sigma[i]);
                out.counts.push(self.counts[i]);
            }
        }
        out
    }
}

/// Direction-resolved power spectrum (for anisotropy checks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzimuthalSpectrum {
    /// Annulus-centre wavenumbers (rad/km).
    pub k: Vec<f64>,
    /// Sector-centre azimuths in degrees, in `[-90, 90)`.
    pub theta: Vec<f64>,
    /// `power[s][i]` = mean `ln |F|²` in sector `s`, annulus `i` (NaN when
    /// the cell had no FFT samples).
    pub power: Vec<Vec<f64>>,
}

/// A Gaussian prior on one model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mean: f64,
    pub sigma: f64,
}

impl Prior {
    /// Negative log density up to a constant: `((x - mean)/sigma)^2 / 2`.
    pub fn neg_log(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sigma;
        0.5 * z * z
    }
}

/// Optional Gaussian priors for the Bouligand parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Priors {
    pub beta: Option<Prior>,
    pub zt: Option<Prior>,
    pub dz: Option<Prior>,
    pub c: Option<Prior>,
}

/// Inclusive box bounds for the Bouligand parameters.
///
/// The defaults cover the range reported in the literature for continental
/// crust; the CLI can widen them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub beta: (f64, f64),
    pub zt: (f64, f64),
    pub dz: (f64, f64),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            beta: (0.0, 8.0),
            zt: (0.0, 10.0),
            dz: (1.0, 100.0),
        }
    }
}

impl ParamBounds {
    pub fn is_valid(&self) -> bool {
        let ok = |(lo, hi): (f64, f64)| lo.is_finite() && hi.is_finite() && hi > lo;
        ok(self.beta) && ok(self.zt) && ok(self.dz) && self.zt.0 >= 0.0 && self.dz.0 > 0.0
    }

    pub fn contains(&self, p: &BouligandParams) -> bool {
        p.beta >= self.beta.0
            && p.beta <= self.beta.1
            && p.zt >= self.zt.0
            && p.zt <= self.zt.1
            && p.dz >= self.dz.0
            && p.dz <= self.dz.1
    }
}

/// The four Bouligand (2009) model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BouligandParams {
    /// Fractal exponent of the magnetisation distribution.
    pub beta: f64,
    /// Depth to the top of the magnetic layer (km).
    pub zt: f64,
    /// Magnetic layer thickness (km).
    pub dz: f64,
    /// Additive spectral constant (absorbs field strength and FFT scaling).
    pub c: f64,
}

impl BouligandParams {
    /// Depth to the base of the magnetic layer: the Curie-point depth (km).
    pub fn curie_depth(&self) -> f64 {
        self.zt + self.dz
    }
}

/// Quality of a spectral fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitQuality {
    /// Negative log posterior at the optimum (misfit + priors).
    pub objective: f64,
    /// RMS of sigma-normalised residuals.
    pub rms: f64,
    /// Number of spectrum bins used.
    pub n_bins: usize,
}

/// MAP estimate for one window under the Bouligand model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BouligandFit {
    pub params: BouligandParams,
    pub quality: FitQuality,
}

/// Posterior summary from Metropolis–Hastings sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McmcSummary {
    pub mean: BouligandParams,
    /// Posterior standard deviation per parameter (`c` included).
    pub sd: BouligandParams,
    pub acceptance: f64,
    pub n_samples: usize,
}

/// Two-band Tanaka (1999) estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TanakaFit {
    /// Depth to top of magnetic sources (km) and its standard error.
    pub zt: f64,
    pub zt_err: f64,
    /// Centroid depth (km) and its standard error.
    pub z0: f64,
    pub z0_err: f64,
    /// Curie-point (base) depth `2 z0 - zt` (km) and propagated error.
    pub zb: f64,
    pub zb_err: f64,
}

/// Maus (1995) fractal slope estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MausFit {
    pub beta: f64,
    pub zt: f64,
    pub zt_err: f64,
    pub c: f64,
}

/// Per-window outcome of a batch map run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowEstimate {
    /// Window centre (metres, grid coordinates).
    pub xc: f64,
    pub yc: f64,
    pub fit: BouligandFit,
    /// Present when the batch ran with MCMC uncertainty.
    pub mcmc: Option<McmcSummary>,
}

/// A window whose estimate failed (kept for diagnostics, not fatal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowFailure {
    pub xc: f64,
    pub yc: f64,
    pub reason: String,
}

/// Settings for a single-window or batch Bouligand inversion.
#[derive(Debug, Clone)]
pub struct InversionConfig {
    /// Window edge length (metres).
    pub window: f64,
    pub taper: Taper,
    /// Floor applied to annulus sigmas before weighting (ln-power units).
    pub sigma_floor: f64,
    /// Wavenumber band used in the objective (rad/km); `None` = full band.
    pub k_band: Option<(f64, f64)>,
    pub bounds: ParamBounds,
    pub priors: Priors,
    /// Coarse-seed grid steps per parameter dimension.
    pub seed_steps: usize,
    /// Nelder–Mead iteration cap.
    pub max_iters: usize,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            window: 200e3,
            taper: Taper::Hanning,
            sigma_floor: 0.1,
            k_band: None,
            bounds: ParamBounds::default(),
            priors: Priors::default(),
            seed_steps: 8,
            max_iters: 400,
        }
    }
}

/// Settings for Metropolis–Hastings sampling around a MAP estimate.
#[derive(Debug, Clone)]
pub struct McmcConfig {
    pub n_steps: usize,
    pub burn_in: usize,
    pub thin: usize,
    /// Proposal standard deviation per parameter (beta, zt, dz, c).
    pub step: [f64; 4],
    pub seed: u64,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            n_steps: 10_000,
            burn_in: 1_000,
            thin: 5,
            step: [0.10, 0.10, 1.0, 0.05],
            seed: 42,
        }
    }
}

/// Wavenumber bands for the Tanaka two-slope method (rad/km).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TanakaBands {
    /// Band for the top-depth fit (higher wavenumbers).
    pub zt_band: (f64, f64),
    /// Band for the centroid-depth fit (lower wavenumbers).
    pub z0_band: (f64, f64),
}

impl Default for TanakaBands {
    fn default() -> Self {
        Self {
            zt_band: (0.05, 0.50),
            z0_band: (0.005, 0.05),
        }
    }
}

/// Saved fit document (JSON), the portable result of `curie fit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub method: MethodSpec,
    /// Window centre (metres).
    pub xc: f64,
    pub yc: f64,
    /// Window edge length (metres).
    pub window: f64,
    pub taper: Taper,
    pub bouligand: Option<BouligandFit>,
    pub mcmc: Option<McmcSummary>,
    pub tanaka: Option<TanakaFit>,
    pub maus: Option<MausFit>,
    pub spectrum: RadialSpectrum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_restricts_inclusively() {
        let s = RadialSpectrum {
            k: vec![0.01, 0.05, 0.1, 0.5],
            power: vec![1.0, 2.0, 3.0, 4.0],
            sigma: vec![0.1; 4],
            counts: vec![8; 4],
        };
        let b = s.band(0.05, 0.1);
        assert_eq!(b.k, vec![0.05, 0.1]);
        assert_eq!(b.power, vec![2.0, 3.0]);
    }

    #[test]
    fn bounds_contain_defaults() {
        let bounds = ParamBounds::default();
        assert!(bounds.is_valid());
        let p = BouligandParams {
            beta: 3.0,
            zt: 1.0,
            dz: 20.0,
            c: 5.0,
        };
        assert!(bounds.contains(&p));
        assert!((p.curie_depth() - 21.0).abs() < 1e-12);
    }

    #[test]
    fn prior_neg_log_is_quadratic() {
        let prior = Prior {
            mean: 3.0,
            sigma: 2.0,
        };
        assert!(prior.neg_log(3.0).abs() < 1e-12);
        assert!((prior.neg_log(5.0) - 0.5).abs() < 1e-12);
    }
}
