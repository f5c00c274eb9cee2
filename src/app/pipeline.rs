//! Shared pipeline logic used by the CLI handlers.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load grid -> window -> spectrum -> fit (-> MCMC) -> report/export
//!
//! The handlers in `app` then focus on presentation and file output.

use crate::cli::{FitArgs, InputArgs, MapArgs, WindowArgs};
use crate::domain::{
    BouligandFit, Extent, InversionConfig, MausFit, McmcConfig, MethodSpec, McmcSummary, Priors,
    RadialSpectrum, TanakaBands, TanakaFit,
};
use crate::error::AppError;
use crate::grid::CurieGrid;
use crate::io::ingest::{grid_from_xyz, read_esri_ascii, read_xyz, resample_xyz, LoadedGrid};
use crate::mapping::{transform_coordinates, Crs};
use crate::models::{fit_maus1995, tanaka1999};
use crate::optimise::CurieOptimise;
use crate::parallel::{CurieParallel, MapResult, TanakaMapResult};

/// All computed outputs of a single `curie fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub spectrum: RadialSpectrum,
    pub bouligand: Option<BouligandFit>,
    pub mcmc: Option<McmcSummary>,
    pub tanaka: Option<TanakaFit>,
    pub maus: Option<MausFit>,
}

/// Outcome of a `curie map` run (method-dependent shape).
#[derive(Debug, Clone)]
pub enum MapRun {
    Bouligand(MapResult),
    Tanaka(TanakaMapResult),
}

/// Load the input grid, projecting and resampling xyz data when asked.
pub fn load_grid(args: &InputArgs) -> Result<LoadedGrid, AppError> {
    let is_raster = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("asc"));
    if is_raster {
        return read_esri_ascii(&args.input);
    }

    let mut data = read_xyz(&args.input)?;
    if let Some(zone) = args.utm_zone {
        let (x, y) = transform_coordinates(
            &data.x,
            &data.y,
            Crs::Geographic,
            Crs::Utm {
                zone,
                south: args.utm_south,
            },
        )?;
        data.x = x;
        data.y = y;
    }

    let grid = match args.resample {
        Some((nx, ny)) => {
            let e = args.extent.ok_or_else(|| {
                AppError::new(2, "--resample needs --extent xmin,xmax,ymin,ymax.")
            })?;
            let extent = Extent::new(e[0], e[1], e[2], e[3]);
            if !extent.is_valid() {
                return Err(AppError::new(2, "Invalid --extent; needs xmin < xmax and ymin < ymax."));
            }
            resample_xyz(&data, extent, nx, ny)?
        }
        None => grid_from_xyz(&data)?,
    };

    Ok(LoadedGrid {
        grid,
        source: args.input.display().to_string(),
        nodata_filled: 0,
    })
}

/// Window centre: explicit flags, or the middle of the grid.
pub fn window_centre(win: &WindowArgs, grid: &CurieGrid) -> (f64, f64) {
    let e = grid.extent();
    let xc = win.xc.unwrap_or_else(|| 0.5 * (e.xmin + e.xmax));
    let yc = win.yc.unwrap_or_else(|| 0.5 * (e.ymin + e.ymax));
    (xc, yc)
}

fn inversion_config(
    win: &WindowArgs,
    k_band: Option<(f64, f64)>,
    priors: Priors,
) -> InversionConfig {
    InversionConfig {
        window: win.window,
        taper: win.taper,
        k_band,
        priors,
        ..InversionConfig::default()
    }
}

/// Execute the single-window pipeline for `curie fit`.
pub fn run_fit(grid: CurieGrid, args: &FitArgs) -> Result<FitRun, AppError> {
    let priors = Priors {
        beta: args.prior_beta,
        zt: args.prior_zt,
        dz: args.prior_dz,
        c: None,
    };
    let config = inversion_config(&args.win, args.k_band, priors);
    let sigma_floor = config.sigma_floor;
    let opt = CurieOptimise::new(grid, config)?;
    let (xc, yc) = window_centre(&args.win, opt.grid());
    let spectrum = opt.window_spectrum(xc, yc)?;

    let mut run = FitRun {
        spectrum,
        bouligand: None,
        mcmc: None,
        tanaka: None,
        maus: None,
    };

    match args.method {
        MethodSpec::Bouligand => {
            let fit = opt.optimise_spectrum(&run.spectrum)?;
            if args.mcmc {
                let cfg = McmcConfig {
                    n_steps: args.mcmc_steps,
                    burn_in: args.burn_in,
                    thin: args.thin,
                    seed: args.seed,
                    ..McmcConfig::default()
                };
                run.mcmc = Some(opt.metropolis_hastings(&run.spectrum, &fit.params, &cfg)?);
            }
            run.bouligand = Some(fit);
        }
        MethodSpec::Tanaka => {
            let bands = TanakaBands {
                zt_band: args.zt_band,
                z0_band: args.z0_band,
            };
            run.tanaka = Some(tanaka1999(&run.spectrum, &bands, sigma_floor)?);
        }
        MethodSpec::Maus => {
            run.maus = Some(fit_maus1995(&run.spectrum, sigma_floor)?);
        }
    }

    Ok(run)
}

/// Execute the batch pipeline for `curie map`.
pub fn run_map(grid: CurieGrid, args: &MapArgs) -> Result<MapRun, AppError> {
    let priors = Priors {
        beta: args.prior_beta,
        zt: args.prior_zt,
        dz: args.prior_dz,
        c: None,
    };
    let config = inversion_config(&args.win, args.k_band, priors);
    let spacing = args.spacing.unwrap_or(args.win.window / 2.0);
    let par = CurieParallel::new(grid, config, spacing, spacing)?;

    match args.method {
        MethodSpec::Bouligand => {
            let mcmc = args.mcmc.then(|| McmcConfig {
                n_steps: args.mcmc_steps,
                burn_in: args.burn_in,
                thin: args.thin,
                seed: args.seed,
                ..McmcConfig::default()
            });
            Ok(MapRun::Bouligand(par.map_bouligand(mcmc.as_ref())?))
        }
        MethodSpec::Tanaka => {
            let bands = TanakaBands {
                zt_band: args.zt_band,
                z0_band: args.z0_band,
            };
            Ok(MapRun::Tanaka(par.map_tanaka(&bands)?))
        }
        MethodSpec::Maus => Err(AppError::new(
            2,
            "Map mode supports the bouligand and tanaka methods.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use crate::data::{synthetic_grid, SynthConfig};
    use clap::Parser;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["curie", "fit", "-i", "grid.asc"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fit(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn fit_pipeline_runs_all_three_methods_on_a_synthetic_grid() {
        let grid = synthetic_grid(&SynthConfig::default()).unwrap();

        let args = fit_args(&["-w", "100000", "--taper", "none"]);
        let run = run_fit(grid.clone(), &args).unwrap();
        assert!(run.bouligand.is_some());
        assert!(run.mcmc.is_none());

        let args = fit_args(&[
            "-w", "100000", "-m", "tanaka", "--zt-band", "0.4,1.2", "--z0-band", "0.06,0.3",
        ]);
        let run = run_fit(grid.clone(), &args).unwrap();
        assert!(run.tanaka.is_some());

        let args = fit_args(&["-w", "100000", "-m", "maus"]);
        let run = run_fit(grid, &args).unwrap();
        assert!(run.maus.is_some());
    }

    #[test]
    fn map_rejects_the_maus_method() {
        let grid = synthetic_grid(&SynthConfig::default()).unwrap();
        let args = match Cli::parse_from(["curie", "map", "-i", "g.asc", "-m", "maus"]).command {
            Command::Map(args) => args,
            _ => unreachable!(),
        };
        assert_eq!(run_map(grid, &args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn window_centre_defaults_to_the_middle() {
        let grid = synthetic_grid(&SynthConfig::default()).unwrap();
        let args = fit_args(&[]);
        let (xc, yc) = window_centre(&args.win, &grid);
        assert!((xc - 63.5e3).abs() < 1.0);
        assert!((yc - 63.5e3).abs() < 1.0);
    }
}
