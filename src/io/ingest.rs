//! Grid ingestion: ESRI ASCII rasters and xyz column files.
//!
//! Both readers deliver a [`CurieGrid`] in the crate's storage convention
//! (row 0 = southern edge). ESRI ASCII lists rows north to south, so that
//! reader flips the row order. Grid coordinates are taken to be node
//! centres; for ESRI rasters the lower-left node sits half a cell in from
//! `xllcorner`/`yllcorner`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::Extent;
use crate::error::AppError;
use crate::grid::CurieGrid;
use crate::mapping;

/// Relative tolerance when snapping xyz coordinates onto a regular lattice.
const NODE_SNAP_TOL: f64 = 1e-4;

/// A grid plus provenance worth reporting.
#[derive(Debug, Clone)]
pub struct LoadedGrid {
    pub grid: CurieGrid,
    pub source: String,
    /// Nodata cells replaced by the grid mean.
    pub nodata_filled: usize,
}

/// Scattered (or regularly ordered) xyz samples.
#[derive(Debug, Clone, Default)]
pub struct XyzData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl XyzData {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Read an ESRI ASCII raster (`.asc`).
///
/// Nodata cells are filled with the mean of the valid cells and counted in
/// the result; a raster with no valid cell is a data error.
pub fn read_esri_ascii(path: &Path) -> Result<LoadedGrid, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(3, format!("Cannot read {}: {e}", path.display())))?;
    let mut lines = text.lines();

    let mut header: HashMap<String, f64> = HashMap::new();
    let mut body: Vec<&str> = Vec::new();
    for line in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let first = parts.next().unwrap_or("");
        if first.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            let value: f64 = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| AppError::new(3, format!("Bad header line in {}: {trimmed:?}", path.display())))?;
            header.insert(first.to_ascii_lowercase(), value);
        } else {
            body.push(trimmed);
            break;
        }
    }
    body.extend(lines.filter(|l| !l.trim().is_empty()));

    let get = |key: &str| {
        header
            .get(key)
            .copied()
            .ok_or_else(|| AppError::new(3, format!("{} is missing header field {key}.", path.display())))
    };
    let ncols = get("ncols")? as usize;
    let nrows = get("nrows")? as usize;
    let xll = get("xllcorner")?;
    let yll = get("yllcorner")?;
    let cell = get("cellsize")?;
    let nodata = header.get("nodata_value").copied();
    if ncols == 0 || nrows == 0 || !(cell.is_finite() && cell > 0.0) {
        return Err(AppError::new(3, format!("Degenerate raster header in {}.", path.display())));
    }

    let mut values: Vec<f64> = Vec::with_capacity(ncols * nrows);
    for line in &body {
        for tok in line.split_whitespace() {
            let v: f64 = tok
                .parse()
                .map_err(|_| AppError::new(3, format!("Bad raster value {tok:?} in {}.", path.display())))?;
            values.push(v);
        }
    }
    if values.len() != ncols * nrows {
        return Err(AppError::new(
            3,
            format!(
                "{}: expected {} values ({ncols}x{nrows}), found {}.",
                path.display(),
                ncols * nrows,
                values.len()
            ),
        ));
    }

    // Fill nodata with the mean of the valid cells.
    let is_nodata = |v: f64| nodata.is_some_and(|nd| v == nd || (v - nd).abs() < 1e-9) || !v.is_finite();
    let valid: Vec<f64> = values.iter().copied().filter(|&v| !is_nodata(v)).collect();
    if valid.is_empty() {
        return Err(AppError::new(3, format!("{} holds no valid cells.", path.display())));
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let nodata_filled = values.len() - valid.len();

    // ESRI rows run north to south; our row 0 is the southern edge.
    let data = DMatrix::from_fn(nrows, ncols, |j, i| {
        let v = values[(nrows - 1 - j) * ncols + i];
        if is_nodata(v) { mean } else { v }
    });

    let xmin = xll + 0.5 * cell;
    let ymin = yll + 0.5 * cell;
    let grid = CurieGrid::new(
        data,
        xmin,
        xmin + (ncols - 1) as f64 * cell,
        ymin,
        ymin + (nrows - 1) as f64 * cell,
    )?;

    Ok(LoadedGrid {
        grid,
        source: path.display().to_string(),
        nodata_filled,
    })
}

/// Read a whitespace- or comma-separated `x y z` column file.
/// Lines starting with `#` are comments.
pub fn read_xyz(path: &Path) -> Result<XyzData, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(3, format!("Cannot read {}: {e}", path.display())))?;

    let mut out = XyzData::default();
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let cols: Vec<f64> = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| {
                AppError::new(3, format!("{} line {}: not numeric.", path.display(), lineno + 1))
            })?;
        if cols.len() < 3 {
            return Err(AppError::new(
                3,
                format!("{} line {}: expected x y z columns.", path.display(), lineno + 1),
            ));
        }
        out.x.push(cols[0]);
        out.y.push(cols[1]);
        out.z.push(cols[2]);
    }
    if out.is_empty() {
        return Err(AppError::new(3, format!("{} holds no data rows.", path.display())));
    }
    Ok(out)
}

/// Assemble a grid from xyz samples that already lie on a regular lattice.
///
/// The lattice is inferred from the unique x and y values (snapped within
/// [`NODE_SNAP_TOL`] of the spacing); every node must be covered exactly
/// once. Scattered data should go through [`resample_xyz`] instead.
pub fn grid_from_xyz(data: &XyzData) -> Result<CurieGrid, AppError> {
    let xs = unique_sorted(&data.x)?;
    let ys = unique_sorted(&data.y)?;
    let (nx, ny) = (xs.len(), ys.len());
    if nx < 2 || ny < 2 || nx * ny != data.len() {
        return Err(AppError::new(
            3,
            format!(
                "xyz data is not a regular {nx}x{ny} lattice ({} samples); \
                 resample scattered data explicitly.",
                data.len()
            ),
        ));
    }
    check_uniform(&xs, "x")?;
    check_uniform(&ys, "y")?;

    let dx = xs[1] - xs[0];
    let dy = ys[1] - ys[0];
    let mut grid = DMatrix::from_element(ny, nx, f64::NAN);
    for p in 0..data.len() {
        let i = ((data.x[p] - xs[0]) / dx).round() as usize;
        let j = ((data.y[p] - ys[0]) / dy).round() as usize;
        if i >= nx || j >= ny || !grid[(j, i)].is_nan() {
            return Err(AppError::new(
                3,
                format!("xyz sample {} does not map onto a unique lattice node.", p + 1),
            ));
        }
        grid[(j, i)] = data.z[p];
    }
    if grid.iter().any(|v| v.is_nan()) {
        return Err(AppError::new(3, "xyz lattice has uncovered nodes."));
    }

    CurieGrid::new(grid, xs[0], xs[nx - 1], ys[0], ys[ny - 1])
}

/// Resample scattered xyz samples onto a regular `nx` x `ny` grid by
/// inverse-distance weighting.
pub fn resample_xyz(
    data: &XyzData,
    extent: Extent,
    nx: usize,
    ny: usize,
) -> Result<CurieGrid, AppError> {
    let values = mapping::grid(&data.x, &data.y, &data.z, extent, nx, ny)?;
    CurieGrid::new(values, extent.xmin, extent.xmax, extent.ymin, extent.ymax)
}

fn unique_sorted(values: &[f64]) -> Result<Vec<f64>, AppError> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.is_empty() || sorted.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(3, "xyz coordinates are empty or non-finite."));
    }
    let span = sorted[sorted.len() - 1] - sorted[0];
    let tol = (span * NODE_SNAP_TOL).max(f64::EPSILON);
    let mut out: Vec<f64> = Vec::new();
    for v in sorted {
        if out.last().is_none_or(|&last| v - last > tol) {
            out.push(v);
        }
    }
    Ok(out)
}

fn check_uniform(axis: &[f64], name: &str) -> Result<(), AppError> {
    let step = axis[1] - axis[0];
    for w in axis.windows(2) {
        if ((w[1] - w[0]) - step).abs() > step * NODE_SNAP_TOL {
            return Err(AppError::new(
                3,
                format!("xyz {name} coordinates are not uniformly spaced."),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("curie-ingest-{}-{name}", std::process::id()))
    }

    #[test]
    fn esri_ascii_reads_flipped_rows_and_fills_nodata() {
        let path = scratch("flip.asc");
        let mut text = String::from(
            "ncols 8\nnrows 8\nxllcorner 0\nyllcorner 0\ncellsize 1000\nNODATA_value -9999\n",
        );
        // First listed row is the northern edge; tag it with 80s.
        for row in 0..8 {
            let base = 80 - row * 10;
            let line: Vec<String> = (0..8)
                .map(|i| {
                    if row == 3 && i == 3 {
                        "-9999".to_string()
                    } else {
                        format!("{}", base + i)
                    }
                })
                .collect();
            text.push_str(&line.join(" "));
            text.push('\n');
        }
        std::fs::write(&path, text).unwrap();

        let loaded = read_esri_ascii(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.nodata_filled, 1);
        let g = loaded.grid;
        assert_eq!((g.ny(), g.nx()), (8, 8));
        // Row 0 must be the southern (last listed) raster row.
        assert!((g.data()[(0, 0)] - 10.0).abs() < 1e-12);
        assert!((g.data()[(7, 0)] - 80.0).abs() < 1e-12);
        // Node centres are half a cell in from the corner.
        assert!((g.extent().xmin - 500.0).abs() < 1e-9);
        assert!((g.dx() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn xyz_regular_lattice_round_trips() {
        let path = scratch("lattice.xyz");
        let mut text = String::from("# x y z\n");
        for j in 0..9 {
            for i in 0..9 {
                text.push_str(&format!(
                    "{} {} {}\n",
                    i as f64 * 500.0,
                    j as f64 * 500.0,
                    (i + 10 * j) as f64
                ));
            }
        }
        std::fs::write(&path, text).unwrap();

        let data = read_xyz(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let g = grid_from_xyz(&data).unwrap();
        assert_eq!((g.ny(), g.nx()), (9, 9));
        assert!((g.data()[(2, 4)] - 24.0).abs() < 1e-12);
        assert!((g.dx() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn scattered_xyz_is_rejected_by_the_lattice_reader() {
        let mut data = XyzData::default();
        // 40 samples that share no common lattice.
        for p in 0..40 {
            data.x.push((p as f64 * 137.3) % 1000.0);
            data.y.push((p as f64 * 291.7) % 1000.0);
            data.z.push(p as f64);
        }
        let err = grid_from_xyz(&data).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn bad_header_is_a_data_error() {
        let path = scratch("bad.asc");
        std::fs::write(&path, "ncols 4\nnrows 4\ncellsize 1000\n1 2 3 4\n").unwrap();
        let err = read_esri_ascii(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn resample_uses_idw_onto_the_requested_lattice() {
        // Dense regular samples of a constant field resample exactly.
        let mut data = XyzData::default();
        for j in 0..20 {
            for i in 0..20 {
                data.x.push(i as f64 * 100.0);
                data.y.push(j as f64 * 100.0);
                data.z.push(42.0);
            }
        }
        let extent = Extent::new(0.0, 1900.0, 0.0, 1900.0);
        let g = resample_xyz(&data, extent, 10, 10).unwrap();
        for v in g.data().iter() {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }
}
