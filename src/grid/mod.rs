//! Regular magnetic-anomaly grids and window extraction.
//!
//! `CurieGrid` owns a validated, regularly spaced 2-D grid of total-field
//! anomaly values and provides the windowing operations the spectral
//! pipeline is built on:
//!
//! - `subgrid`: cut a square window (metres) centred on a point
//! - `centroids`: regularly spaced centres of all fully interior windows
//! - `remove_trend`: subtract the best-fit plane from a window
//!
//! Storage: `data[(row, col)]` with `col` along x (west→east) and `row`
//! along y (south→north), i.e. row 0 is the southern edge.

use nalgebra::{DMatrix, DVector};

use crate::domain::Extent;
use crate::error::AppError;
use crate::math::solve_least_squares;

/// Minimum nodes per axis for a usable grid (and window).
const MIN_NODES: usize = 8;

/// Allowed relative difference between dx and dy. Radial averaging assumes
/// isotropic cells.
const CELL_ANISOTROPY_TOL: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct CurieGrid {
    data: DMatrix<f64>,
    extent: Extent,
    dx: f64,
    dy: f64,
}

impl CurieGrid {
    /// Build a grid from node values and the extent of the node centres.
    ///
    /// `data` is `(ny, nx)` with row 0 at `ymin`. Spacing is derived from
    /// the extent and must be near-square.
    pub fn new(
        data: DMatrix<f64>,
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    ) -> Result<Self, AppError> {
        let extent = Extent::new(xmin, xmax, ymin, ymax);
        if !extent.is_valid() {
            return Err(AppError::new(
                3,
                format!("Invalid grid extent: x=[{xmin}, {xmax}], y=[{ymin}, {ymax}]."),
            ));
        }

        let (ny, nx) = data.shape();
        if nx < MIN_NODES || ny < MIN_NODES {
            return Err(AppError::new(
                3,
                format!("Grid too small: {nx}x{ny} nodes (need at least {MIN_NODES} per axis)."),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AppError::new(
                3,
                "Grid contains non-finite values; fill or trim nodata first.",
            ));
        }

        let dx = extent.width() / (nx - 1) as f64;
        let dy = extent.height() / (ny - 1) as f64;
        if ((dx - dy) / dx).abs() > CELL_ANISOTROPY_TOL {
            return Err(AppError::new(
                3,
                format!(
                    "Grid cells are anisotropic (dx={dx:.3} m, dy={dy:.3} m); \
                     radial averaging needs near-square cells."
                ),
            ));
        }

        Ok(Self {
            data,
            extent,
            dx,
            dy,
        })
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Node spacing along x (metres).
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Node spacing along y (metres).
    pub fn dy(&self) -> f64 {
        self.dy
    }

    pub fn nx(&self) -> usize {
        self.data.ncols()
    }

    pub fn ny(&self) -> usize {
        self.data.nrows()
    }

    /// Extract the square window of edge `window` metres centred on the
    /// node nearest `(xc, yc)`.
    ///
    /// Errors when the window is too small to resolve a spectrum or falls
    /// partially outside the grid.
    pub fn subgrid(&self, window: f64, xc: f64, yc: f64) -> Result<DMatrix<f64>, AppError> {
        if !(window.is_finite() && window > 0.0) {
            return Err(AppError::new(2, format!("Invalid window size {window} m.")));
        }

        let nw = (window / self.dx).round() as usize;
        if nw < MIN_NODES {
            return Err(AppError::new(
                2,
                format!(
                    "Window {window:.0} m spans only {nw} nodes at dx={:.0} m \
                     (need at least {MIN_NODES}).",
                    self.dx
                ),
            ));
        }

        let ic = ((xc - self.extent.xmin) / self.dx).round() as isize;
        let jc = ((yc - self.extent.ymin) / self.dy).round() as isize;
        let i0 = ic - (nw / 2) as isize;
        let j0 = jc - (nw / 2) as isize;

        if i0 < 0
            || j0 < 0
            || i0 as usize + nw > self.nx()
            || j0 as usize + nw > self.ny()
        {
            return Err(AppError::new(
                3,
                format!(
                    "Window {window:.0} m at ({xc:.0}, {yc:.0}) falls outside the grid extent."
                ),
            ));
        }

        Ok(self
            .data
            .view((j0 as usize, i0 as usize), (nw, nw))
            .into_owned())
    }

    /// Centre points of all windows of edge `window` that fit fully inside
    /// the grid, spaced by (`spacing_x`, `spacing_y`) metres.
    ///
    /// Deterministic row-major order: y increases in the outer loop.
    pub fn centroids(
        &self,
        window: f64,
        spacing_x: f64,
        spacing_y: f64,
    ) -> Result<Vec<(f64, f64)>, AppError> {
        if !(window.is_finite() && window > 0.0) {
            return Err(AppError::new(2, format!("Invalid window size {window} m.")));
        }
        if !(spacing_x.is_finite() && spacing_x > 0.0 && spacing_y.is_finite() && spacing_y > 0.0)
        {
            return Err(AppError::new(
                2,
                format!("Invalid centroid spacing ({spacing_x}, {spacing_y}) m."),
            ));
        }

        let half = window / 2.0;
        let x0 = self.extent.xmin + half;
        let x1 = self.extent.xmax - half;
        let y0 = self.extent.ymin + half;
        let y1 = self.extent.ymax - half;
        if x1 < x0 || y1 < y0 {
            return Err(AppError::new(
                3,
                format!(
                    "Window {window:.0} m exceeds the grid extent \
                     ({:.0} x {:.0} m).",
                    self.extent.width(),
                    self.extent.height()
                ),
            ));
        }

        // Half-cell slack so floating point does not drop the last column.
        let eps_x = 0.5 * self.dx;
        let eps_y = 0.5 * self.dy;

        let mut out = Vec::new();
        let mut y = y0;
        while y <= y1 + eps_y {
            let mut x = x0;
            while x <= x1 + eps_x {
                out.push((x.min(x1), y.min(y1)));
                x += spacing_x;
            }
            y += spacing_y;
        }
        Ok(out)
    }

    /// Subtract the least-squares plane from a window.
    ///
    /// Long-wavelength trends alias into the lowest annuli after tapering;
    /// removing the plane first is the standard preconditioning step.
    pub fn remove_trend(sub: &DMatrix<f64>) -> DMatrix<f64> {
        let (ny, nx) = sub.shape();
        let n = nx * ny;

        // Design [1, u, v] with node indices normalised to [-1, 1].
        let mut x = DMatrix::<f64>::zeros(n, 3);
        let mut y = DVector::<f64>::zeros(n);
        let mut idx = 0;
        for j in 0..ny {
            for i in 0..nx {
                let u = 2.0 * i as f64 / (nx - 1).max(1) as f64 - 1.0;
                let v = 2.0 * j as f64 / (ny - 1).max(1) as f64 - 1.0;
                x[(idx, 0)] = 1.0;
                x[(idx, 1)] = u;
                x[(idx, 2)] = v;
                y[idx] = sub[(j, i)];
                idx += 1;
            }
        }

        // A rank-deficient plane fit (constant window) degrades to
        // mean removal; never fail here.
        let Some(beta) = solve_least_squares(&x, &y) else {
            let mean = sub.iter().sum::<f64>() / n as f64;
            return sub.map(|v| v - mean);
        };

        let mut out = sub.clone();
        for j in 0..ny {
            for i in 0..nx {
                let u = 2.0 * i as f64 / (nx - 1).max(1) as f64 - 1.0;
                let v = 2.0 * j as f64 / (ny - 1).max(1) as f64 - 1.0;
                out[(j, i)] -= beta[0] + beta[1] * u + beta[2] * v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_grid(nx: usize, ny: usize, cell: f64) -> CurieGrid {
        let data = DMatrix::from_fn(ny, nx, |j, i| (i as f64 * 0.1 + j as f64 * 0.2).sin());
        CurieGrid::new(
            data,
            0.0,
            (nx - 1) as f64 * cell,
            0.0,
            (ny - 1) as f64 * cell,
        )
        .unwrap()
    }

    #[test]
    fn construction_derives_spacing() {
        let g = demo_grid(41, 41, 1000.0);
        assert!((g.dx() - 1000.0).abs() < 1e-9);
        assert!((g.dy() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_anisotropic_cells() {
        let data = DMatrix::zeros(21, 41);
        let err = CurieGrid::new(data, 0.0, 40e3, 0.0, 40e3).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn subgrid_is_square_and_centered() {
        let g = demo_grid(41, 41, 1000.0);
        let sub = g.subgrid(10e3, 20e3, 20e3).unwrap();
        assert_eq!(sub.shape(), (10, 10));
        // Centre value matches the source node.
        assert!((sub[(5, 5)] - g.data()[(20, 20)]).abs() < 1e-12);
    }

    #[test]
    fn subgrid_outside_extent_fails() {
        let g = demo_grid(41, 41, 1000.0);
        let err = g.subgrid(10e3, 2e3, 20e3).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn centroids_cover_interior_only() {
        let g = demo_grid(41, 41, 1000.0);
        let window = 20e3;
        let cs = g.centroids(window, 10e3, 10e3).unwrap();
        assert!(!cs.is_empty());
        for &(x, y) in &cs {
            // Every centroid window must extract cleanly.
            g.subgrid(window, x, y).unwrap();
        }
        // Row-major: y of the first and last differ, x starts at the west.
        assert!((cs[0].0 - 10e3).abs() < 1.0);
        assert!((cs[0].1 - 10e3).abs() < 1.0);
    }

    #[test]
    fn remove_trend_kills_a_plane_exactly() {
        let nx = 16;
        let sub = DMatrix::from_fn(nx, nx, |j, i| 5.0 + 0.3 * i as f64 - 0.7 * j as f64);
        let flat = CurieGrid::remove_trend(&sub);
        for v in flat.iter() {
            assert!(v.abs() < 1e-9, "residual {v}");
        }
    }

    #[test]
    fn remove_trend_preserves_signal_mean_zero() {
        let g = demo_grid(41, 41, 1000.0);
        let sub = g.subgrid(20e3, 20e3, 20e3).unwrap();
        let flat = CurieGrid::remove_trend(&sub);
        let mean = flat.iter().sum::<f64>() / flat.len() as f64;
        assert!(mean.abs() < 1e-9);
    }
}
