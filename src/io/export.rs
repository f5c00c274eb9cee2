//! Result writers: CSV tables and ESRI ASCII rasters.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::RadialSpectrum;
use crate::error::AppError;
use crate::grid::CurieGrid;
use crate::parallel::{MapResult, TanakaMapResult};

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::new(3, format!("Cannot write {}: {e}", path.display())))
}

fn finish(mut w: BufWriter<File>, path: &Path) -> Result<(), AppError> {
    w.flush()
        .map_err(|e| AppError::new(3, format!("Cannot write {}: {e}", path.display())))
}

macro_rules! out {
    ($w:expr, $path:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*)
            .map_err(|e| AppError::new(3, format!("Cannot write {}: {e}", $path.display())))?
    };
}

/// Write a Bouligand map run as CSV. Posterior standard deviations are
/// included when the run carried MCMC.
pub fn write_map_csv(path: &Path, result: &MapResult) -> Result<(), AppError> {
    let with_mcmc = result.estimates.iter().any(|e| e.mcmc.is_some());
    let mut w = create(path)?;

    if with_mcmc {
        out!(w, path, "x,y,beta,zt,dz,zb,c,rms,beta_sd,zt_sd,dz_sd,zb_sd,acceptance");
    } else {
        out!(w, path, "x,y,beta,zt,dz,zb,c,rms");
    }
    for e in &result.estimates {
        let p = &e.fit.params;
        if with_mcmc {
            match &e.mcmc {
                Some(m) => {
                    // sd(zb) <= sd(zt) + sd(dz); the sum is the conservative bound.
                    let zb_sd = m.sd.zt + m.sd.dz;
                    out!(
                        w,
                        path,
                        "{:.1},{:.1},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.3}",
                        e.xc, e.yc, p.beta, p.zt, p.dz, p.curie_depth(), p.c, e.fit.quality.rms,
                        m.sd.beta, m.sd.zt, m.sd.dz, zb_sd, m.acceptance
                    );
                }
                None => {
                    out!(
                        w,
                        path,
                        "{:.1},{:.1},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},,,,,",
                        e.xc, e.yc, p.beta, p.zt, p.dz, p.curie_depth(), p.c, e.fit.quality.rms
                    );
                }
            }
        } else {
            out!(
                w,
                path,
                "{:.1},{:.1},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
                e.xc, e.yc, p.beta, p.zt, p.dz, p.curie_depth(), p.c, e.fit.quality.rms
            );
        }
    }
    finish(w, path)
}

/// Write a Tanaka map run as CSV.
pub fn write_tanaka_csv(path: &Path, result: &TanakaMapResult) -> Result<(), AppError> {
    let mut w = create(path)?;
    out!(w, path, "x,y,zt,zt_err,z0,z0_err,zb,zb_err");
    for e in &result.estimates {
        let f = &e.fit;
        out!(
            w,
            path,
            "{:.1},{:.1},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
            e.xc, e.yc, f.zt, f.zt_err, f.z0, f.z0_err, f.zb, f.zb_err
        );
    }
    finish(w, path)
}

/// Write one radial spectrum as CSV.
pub fn write_spectrum_csv(path: &Path, spectrum: &RadialSpectrum) -> Result<(), AppError> {
    let mut w = create(path)?;
    out!(w, path, "k,power,sigma,count");
    for i in 0..spectrum.len() {
        out!(
            w,
            path,
            "{:.6},{:.6},{:.6},{}",
            spectrum.k[i], spectrum.power[i], spectrum.sigma[i], spectrum.counts[i]
        );
    }
    finish(w, path)
}

/// Write a grid as an ESRI ASCII raster (the inverse of the reader: node
/// centres become cell centres, rows go out north to south).
pub fn write_esri_ascii(path: &Path, grid: &CurieGrid) -> Result<(), AppError> {
    let mut w = create(path)?;
    let e = grid.extent();
    let cell = grid.dx();
    out!(w, path, "ncols {}", grid.nx());
    out!(w, path, "nrows {}", grid.ny());
    out!(w, path, "xllcorner {}", e.xmin - 0.5 * cell);
    out!(w, path, "yllcorner {}", e.ymin - 0.5 * cell);
    out!(w, path, "cellsize {}", cell);
    for j in (0..grid.ny()).rev() {
        let row: Vec<String> = (0..grid.nx())
            .map(|i| format!("{:.6}", grid.data()[(j, i)]))
            .collect();
        out!(w, path, "{}", row.join(" "));
    }
    finish(w, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BouligandFit, BouligandParams, FitQuality, WindowEstimate};
    use crate::io::ingest::read_esri_ascii;
    use nalgebra::DMatrix;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("curie-export-{}-{name}", std::process::id()))
    }

    fn demo_estimate(xc: f64) -> WindowEstimate {
        WindowEstimate {
            xc,
            yc: 1000.0,
            fit: BouligandFit {
                params: BouligandParams {
                    beta: 3.0,
                    zt: 1.2,
                    dz: 18.0,
                    c: 4.5,
                },
                quality: FitQuality {
                    objective: 12.0,
                    rms: 0.8,
                    n_bins: 20,
                },
            },
            mcmc: None,
        }
    }

    #[test]
    fn map_csv_has_one_row_per_estimate() {
        let path = scratch("map.csv");
        let result = MapResult {
            estimates: vec![demo_estimate(0.0), demo_estimate(5000.0)],
            failures: Vec::new(),
        };
        write_map_csv(&path, &result).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("x,y,beta,zt,dz,zb"));
        assert!(lines[1].contains("19.2000")); // zb = zt + dz
    }

    #[test]
    fn esri_ascii_round_trips_through_the_reader() {
        let path = scratch("grid.asc");
        let data = DMatrix::from_fn(10, 10, |j, i| (i as f64 * 0.3 + j as f64 * 0.7).sin());
        let grid = CurieGrid::new(data.clone(), 0.0, 9000.0, 0.0, 9000.0).unwrap();

        write_esri_ascii(&path, &grid).unwrap();
        let back = read_esri_ascii(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.nodata_filled, 0);
        assert!((back.grid.extent().xmin - 0.0).abs() < 1e-9);
        assert!((back.grid.dx() - 1000.0).abs() < 1e-9);
        for j in 0..10 {
            for i in 0..10 {
                assert!((back.grid.data()[(j, i)] - data[(j, i)]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn spectrum_csv_lists_every_bin() {
        let path = scratch("spec.csv");
        let s = RadialSpectrum {
            k: vec![0.1, 0.2, 0.3],
            power: vec![10.0, 8.0, 6.5],
            sigma: vec![0.5, 0.4, 0.3],
            counts: vec![8, 16, 24],
        };
        write_spectrum_csv(&path, &s).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(2).unwrap().ends_with(",16"));
    }
}
