//! Command-line parsing for the Curie-depth mapper.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the spectral/inversion code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{MethodSpec, Prior, Taper};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "curie", version, about = "Curie depth estimation from magnetic anomaly grids")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a synthetic anomaly grid with a known spectrum.
    Synth(SynthArgs),
    /// Compute and plot the radial (and optionally azimuthal) spectrum of one window.
    Spectrum(SpectrumArgs),
    /// Fit one window: Bouligand MAP (+ optional MCMC), Tanaka, or Maus.
    Fit(FitArgs),
    /// Fit every window over the grid and export a Curie-depth map.
    Map(MapArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// How to read the input grid. Shared by spectrum/fit/map.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Input grid: ESRI ASCII raster (.asc) or x y z columns.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Treat xyz coordinates as lon/lat degrees and project to this UTM zone.
    #[arg(long, value_name = "ZONE")]
    pub utm_zone: Option<u8>,

    /// Project to a southern-hemisphere UTM zone.
    #[arg(long)]
    pub utm_south: bool,

    /// Resample scattered xyz data onto NX,NY nodes (requires --extent).
    #[arg(long, value_name = "NX,NY", value_parser = parse_usize_pair)]
    pub resample: Option<(usize, usize)>,

    /// Target extent for --resample: xmin,xmax,ymin,ymax (metres).
    #[arg(long, value_name = "X0,X1,Y0,Y1", value_parser = parse_extent)]
    pub extent: Option<[f64; 4]>,
}

/// Window selection shared by spectrum and fit.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// Window edge length in metres.
    #[arg(short = 'w', long, default_value_t = 200e3)]
    pub window: f64,

    /// Window centre x in metres (default: grid centre).
    #[arg(long)]
    pub xc: Option<f64>,

    /// Window centre y in metres (default: grid centre).
    #[arg(long)]
    pub yc: Option<f64>,

    /// Taper applied before the FFT.
    #[arg(long, value_enum, default_value_t = Taper::Hanning)]
    pub taper: Taper,
}

/// Terminal plot size.
#[derive(Debug, Args, Clone)]
pub struct PlotSizeArgs {
    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for `curie synth`.
#[derive(Debug, Args)]
pub struct SynthArgs {
    /// Nodes per axis.
    #[arg(short = 'n', long, default_value_t = 128)]
    pub nodes: usize,

    /// Node spacing in metres.
    #[arg(long, default_value_t = 1000.0)]
    pub cell: f64,

    /// Fractal exponent beta.
    #[arg(long, default_value_t = 3.0)]
    pub beta: f64,

    /// Depth to the top of the magnetic layer (km).
    #[arg(long, default_value_t = 1.0)]
    pub zt: f64,

    /// Magnetic layer thickness (km).
    #[arg(long, default_value_t = 20.0)]
    pub dz: f64,

    /// Additive spectral constant C.
    #[arg(long, default_value_t = 5.0)]
    pub c0: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output raster path (ESRI ASCII).
    #[arg(short = 'o', long, value_name = "FILE", default_value = "synth.asc")]
    pub out: PathBuf,
}

/// Options for `curie spectrum`.
#[derive(Debug, Args)]
pub struct SpectrumArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub win: WindowArgs,

    /// Also compute the azimuthal spectrum with this sector width (degrees).
    #[arg(long, value_name = "DEG")]
    pub theta: Option<f64>,

    /// Export the radial spectrum to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotSizeArgs,
}

/// Options for `curie fit`.
#[derive(Debug, Args)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub win: WindowArgs,

    /// Depth-estimation method.
    #[arg(short = 'm', long, value_enum, default_value_t = MethodSpec::Bouligand)]
    pub method: MethodSpec,

    /// Restrict the Bouligand objective to this wavenumber band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band)]
    pub k_band: Option<(f64, f64)>,

    /// Gaussian prior on beta: mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_beta: Option<Prior>,

    /// Gaussian prior on z_t (km): mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_zt: Option<Prior>,

    /// Gaussian prior on dz (km): mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_dz: Option<Prior>,

    /// Tanaka top-depth band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band, default_value = "0.05,0.5")]
    pub zt_band: (f64, f64),

    /// Tanaka centroid-depth band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band, default_value = "0.005,0.05")]
    pub z0_band: (f64, f64),

    /// Sample the posterior with Metropolis-Hastings after the MAP fit.
    #[arg(long)]
    pub mcmc: bool,

    /// MCMC chain length.
    #[arg(long, default_value_t = 10_000)]
    pub mcmc_steps: usize,

    /// MCMC burn-in steps.
    #[arg(long, default_value_t = 1_000)]
    pub burn_in: usize,

    /// Keep every N-th post-burn-in sample.
    #[arg(long, default_value_t = 5)]
    pub thin: usize,

    /// Random seed for the MCMC chain.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the fit (method, parameters, spectrum) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Export the radial spectrum to CSV.
    #[arg(long = "export-spectrum", value_name = "CSV")]
    pub export_spectrum: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotSizeArgs,
}

/// Options for `curie map`.
#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub win: WindowArgs,

    /// Depth-estimation method (bouligand or tanaka).
    #[arg(short = 'm', long, value_enum, default_value_t = MethodSpec::Bouligand)]
    pub method: MethodSpec,

    /// Spacing between window centres in metres (default: window / 2).
    #[arg(short = 's', long)]
    pub spacing: Option<f64>,

    /// Restrict the Bouligand objective to this wavenumber band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band)]
    pub k_band: Option<(f64, f64)>,

    /// Gaussian prior on beta: mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_beta: Option<Prior>,

    /// Gaussian prior on z_t (km): mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_zt: Option<Prior>,

    /// Gaussian prior on dz (km): mean,sigma.
    #[arg(long, value_name = "MEAN,SIGMA", value_parser = parse_prior)]
    pub prior_dz: Option<Prior>,

    /// Tanaka top-depth band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band, default_value = "0.05,0.5")]
    pub zt_band: (f64, f64),

    /// Tanaka centroid-depth band (rad/km).
    #[arg(long, value_name = "KMIN,KMAX", value_parser = parse_band, default_value = "0.005,0.05")]
    pub z0_band: (f64, f64),

    /// Attach per-window MCMC uncertainties (Bouligand only).
    #[arg(long)]
    pub mcmc: bool,

    /// MCMC chain length per window.
    #[arg(long, default_value_t = 5_000)]
    pub mcmc_steps: usize,

    /// MCMC burn-in steps per window.
    #[arg(long, default_value_t = 500)]
    pub burn_in: usize,

    /// Keep every N-th post-burn-in sample.
    #[arg(long, default_value_t = 5)]
    pub thin: usize,

    /// Base random seed (each window derives its own).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the map to CSV.
    #[arg(short = 'o', long, value_name = "CSV", default_value = "curie_map.csv")]
    pub export: PathBuf,
}

/// Options for `curie plot`.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Fit JSON file produced by `curie fit --export`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

fn parse_two(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("expected two comma-separated values, got {s:?}"));
    }
    let a: f64 = parts[0].parse().map_err(|_| format!("{:?} is not a number", parts[0]))?;
    let b: f64 = parts[1].parse().map_err(|_| format!("{:?} is not a number", parts[1]))?;
    Ok((a, b))
}

fn parse_prior(s: &str) -> Result<Prior, String> {
    let (mean, sigma) = parse_two(s)?;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(format!("prior sigma must be positive, got {sigma}"));
    }
    Ok(Prior { mean, sigma })
}

fn parse_band(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = parse_two(s)?;
    if !(lo.is_finite() && hi.is_finite() && hi > lo && lo >= 0.0) {
        return Err(format!("band must satisfy 0 <= kmin < kmax, got {s:?}"));
    }
    Ok((lo, hi))
}

fn parse_usize_pair(s: &str) -> Result<(usize, usize), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("expected NX,NY, got {s:?}"));
    }
    let a: usize = parts[0].parse().map_err(|_| format!("{:?} is not an integer", parts[0]))?;
    let b: usize = parts[1].parse().map_err(|_| format!("{:?} is not an integer", parts[1]))?;
    Ok((a, b))
}

fn parse_extent(s: &str) -> Result<[f64; 4], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|t| t.trim().parse::<f64>().map_err(|_| format!("{t:?} is not a number")))
        .collect::<Result<_, _>>()?;
    if parts.len() != 4 {
        return Err(format!("expected xmin,xmax,ymin,ymax, got {s:?}"));
    }
    Ok([parts[0], parts[1], parts[2], parts[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_args_parse_with_priors_and_band() {
        let cli = Cli::parse_from([
            "curie",
            "fit",
            "-i",
            "grid.asc",
            "--prior-zt",
            "1.5,0.5",
            "--k-band",
            "0.01,0.6",
            "--mcmc",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let prior = args.prior_zt.unwrap();
        assert!((prior.mean - 1.5).abs() < 1e-12);
        assert_eq!(args.k_band, Some((0.01, 0.6)));
        assert!(args.mcmc);
        assert_eq!(args.method, MethodSpec::Bouligand);
    }

    #[test]
    fn bad_band_is_rejected() {
        assert!(parse_band("0.6,0.01").is_err());
        assert!(parse_band("-1,0.5").is_err());
        assert!(parse_prior("1.0,0").is_err());
    }

    #[test]
    fn map_defaults_are_sensible() {
        let cli = Cli::parse_from(["curie", "map", "-i", "grid.asc"]);
        let Command::Map(args) = cli.command else {
            panic!("expected map");
        };
        assert_eq!(args.win.window, 200e3);
        assert!(args.spacing.is_none());
        assert_eq!(args.export.to_str().unwrap(), "curie_map.csv");
    }
}
