//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads (or synthesises) grids
//! - runs the spectral pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, FitArgs, MapArgs, PlotArgs, SpectrumArgs, SynthArgs};
use crate::data::{synthetic_grid, SynthConfig};
use crate::domain::{BouligandParams, FitFile};
use crate::error::AppError;
use crate::io;
use crate::io::fitfile::TOOL_NAME;
use crate::spectrum::azimuthal_spectrum;

pub mod pipeline;

/// Entry point for the `curie` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Synth(args) => handle_synth(args),
        Command::Spectrum(args) => handle_spectrum(args),
        Command::Fit(args) => handle_fit(args),
        Command::Map(args) => handle_map(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        n: args.nodes,
        cell: args.cell,
        params: BouligandParams {
            beta: args.beta,
            zt: args.zt,
            dz: args.dz,
            c: args.c0,
        },
        seed: args.seed,
    };
    let grid = synthetic_grid(&config)?;
    io::write_esri_ascii(&args.out, &grid)?;

    println!(
        "Wrote {} ({}x{} nodes, cell={:.0} m)",
        args.out.display(),
        grid.nx(),
        grid.ny(),
        grid.dx()
    );
    println!(
        "Model: beta={:.2} z_t={:.2} km dz={:.2} km C={:.2} seed={}",
        args.beta, args.zt, args.dz, args.c0, args.seed
    );
    Ok(())
}

fn handle_spectrum(args: SpectrumArgs) -> Result<(), AppError> {
    let loaded = pipeline::load_grid(&args.input)?;
    print!("{}", crate::report::format_grid_summary(&loaded));

    let (xc, yc) = pipeline::window_centre(&args.win, &loaded.grid);
    let sub = loaded.grid.subgrid(args.win.window, xc, yc)?;
    let spec = crate::spectrum::radial_spectrum(&sub, loaded.grid.dx(), args.win.taper)?;

    println!(
        "Window: {:.0} m at ({:.0}, {:.0}) | {} annuli | k=[{:.4}, {:.4}] rad/km",
        args.win.window,
        xc,
        yc,
        spec.len(),
        spec.k.first().copied().unwrap_or(0.0),
        spec.k.last().copied().unwrap_or(0.0)
    );

    if let Some(theta) = args.theta {
        let az = azimuthal_spectrum(&sub, loaded.grid.dx(), args.win.taper, theta)?;
        println!("Azimuthal sectors ({} x {:.0} deg):", az.theta.len(), theta);
        for (s, &t) in az.theta.iter().enumerate() {
            let finite: Vec<f64> = az.power[s].iter().copied().filter(|v| v.is_finite()).collect();
            let mean = if finite.is_empty() {
                f64::NAN
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            };
            println!("  {t:>6.1} deg | mean ln-power {mean:>8.2}");
        }
    }

    if !args.plot.no_plot {
        println!();
        print!(
            "{}",
            crate::plot::render_spectrum_plot(&spec, None, args.plot.width, args.plot.height)
        );
    }

    if let Some(path) = &args.export {
        io::write_spectrum_csv(path, &spec)?;
        println!("Exported spectrum CSV: {}", path.display());
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let loaded = pipeline::load_grid(&args.input)?;
    print!("{}", crate::report::format_grid_summary(&loaded));

    let (xc, yc) = pipeline::window_centre(&args.win, &loaded.grid);
    let run = pipeline::run_fit(loaded.grid, &args)?;

    println!(
        "Window: {:.0} m at ({:.0}, {:.0}) | method: {}",
        args.win.window,
        xc,
        yc,
        args.method.display_name()
    );
    print!(
        "{}",
        crate::report::format_fit_summary(
            &run.spectrum,
            run.bouligand.as_ref(),
            run.mcmc.as_ref(),
            run.tanaka.as_ref(),
            run.maus.as_ref(),
        )
    );

    if !args.plot.no_plot {
        let model = run.bouligand.as_ref().map(|b| &b.params);
        println!();
        print!(
            "{}",
            crate::plot::render_spectrum_plot(&run.spectrum, model, args.plot.width, args.plot.height)
        );
    }

    if let Some(path) = &args.export_spectrum {
        io::write_spectrum_csv(path, &run.spectrum)?;
        println!("Exported spectrum CSV: {}", path.display());
    }
    if let Some(path) = &args.export {
        let fit = FitFile {
            tool: TOOL_NAME.to_string(),
            method: args.method,
            xc,
            yc,
            window: args.win.window,
            taper: args.win.taper,
            bouligand: run.bouligand.clone(),
            mcmc: run.mcmc.clone(),
            tanaka: run.tanaka,
            maus: run.maus,
            spectrum: run.spectrum.clone(),
        };
        io::write_fit(path, &fit)?;
        println!("Exported fit JSON: {}", path.display());
    }
    Ok(())
}

fn handle_map(args: MapArgs) -> Result<(), AppError> {
    let loaded = pipeline::load_grid(&args.input)?;
    print!("{}", crate::report::format_grid_summary(&loaded));

    match pipeline::run_map(loaded.grid, &args)? {
        pipeline::MapRun::Bouligand(result) => {
            print!("{}", crate::report::format_map_summary(&result));
            io::write_map_csv(&args.export, &result)?;
        }
        pipeline::MapRun::Tanaka(result) => {
            print!("{}", crate::report::format_tanaka_map_summary(&result));
            io::write_tanaka_csv(&args.export, &result)?;
        }
    }
    println!("Exported map CSV: {}", args.export.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fit = io::read_fit(&args.fit)?;
    println!(
        "Fit: {} | window {:.0} m at ({:.0}, {:.0})",
        fit.method.display_name(),
        fit.window,
        fit.xc,
        fit.yc
    );
    print!(
        "{}",
        crate::plot::render_fit_file_plot(&fit, args.width, args.height)
    );
    Ok(())
}
