//! Batch Curie-depth mapping over a lattice of overlapping windows.
//!
//! The per-window inversions are independent, so the batch is a plain
//! rayon `par_iter` over the window centres. Results come back in the same
//! deterministic row-major centroid order regardless of thread count, and
//! per-window MCMC chains are seeded from the base seed plus the window
//! index so a re-run reproduces every chain exactly.
//!
//! A failed window (spectrum too sparse, window off the edge after
//! rounding) is recorded and skipped, not fatal; only a batch where every
//! window fails is an error.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{
    InversionConfig, McmcConfig, TanakaBands, TanakaFit, WindowEstimate, WindowFailure,
};
use crate::error::AppError;
use crate::grid::CurieGrid;
use crate::models::tanaka1999;
use crate::optimise::CurieOptimise;

/// Outcome of a Bouligand map run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResult {
    pub estimates: Vec<WindowEstimate>,
    pub failures: Vec<WindowFailure>,
}

/// One successful Tanaka window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TanakaEstimate {
    /// Window centre (metres, grid coordinates).
    pub xc: f64,
    pub yc: f64,
    pub fit: TanakaFit,
}

/// Outcome of a Tanaka map run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TanakaMapResult {
    pub estimates: Vec<TanakaEstimate>,
    pub failures: Vec<WindowFailure>,
}

/// Windowed inversion fanned out over all interior window centres.
#[derive(Debug, Clone)]
pub struct CurieParallel {
    optimise: CurieOptimise,
    spacing_x: f64,
    spacing_y: f64,
}

impl CurieParallel {
    pub fn new(
        grid: CurieGrid,
        config: InversionConfig,
        spacing_x: f64,
        spacing_y: f64,
    ) -> Result<Self, AppError> {
        if !(spacing_x.is_finite() && spacing_x > 0.0 && spacing_y.is_finite() && spacing_y > 0.0)
        {
            return Err(AppError::new(
                2,
                format!("Invalid window spacing ({spacing_x}, {spacing_y}) m."),
            ));
        }
        let optimise = CurieOptimise::new(grid, config)?;
        Ok(Self {
            optimise,
            spacing_x,
            spacing_y,
        })
    }

    pub fn optimiser(&self) -> &CurieOptimise {
        &self.optimise
    }

    /// Window centres in deterministic row-major order.
    pub fn centroids(&self) -> Result<Vec<(f64, f64)>, AppError> {
        self.optimise.grid().centroids(
            self.optimise.config().window,
            self.spacing_x,
            self.spacing_y,
        )
    }

    /// Run the Bouligand MAP inversion (optionally with MCMC uncertainty)
    /// over every window.
    pub fn map_bouligand(&self, mcmc: Option<&McmcConfig>) -> Result<MapResult, AppError> {
        let centres = self.centroids()?;

        let outcomes: Vec<Result<WindowEstimate, WindowFailure>> = centres
            .par_iter()
            .enumerate()
            .map(|(idx, &(xc, yc))| self.fit_window(idx, xc, yc, mcmc))
            .collect();

        let mut result = MapResult {
            estimates: Vec::new(),
            failures: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(e) => result.estimates.push(e),
                Err(f) => result.failures.push(f),
            }
        }

        if result.estimates.is_empty() {
            return Err(AppError::new(
                3,
                format!("All {} windows failed; first: {}", centres.len(), first_reason(&result.failures)),
            ));
        }
        Ok(result)
    }

    /// Run the Tanaka two-band method over every window.
    pub fn map_tanaka(&self, bands: &TanakaBands) -> Result<TanakaMapResult, AppError> {
        let centres = self.centroids()?;
        let sigma_floor = self.optimise.config().sigma_floor;

        let outcomes: Vec<Result<TanakaEstimate, WindowFailure>> = centres
            .par_iter()
            .map(|&(xc, yc)| {
                let spec = self
                    .optimise
                    .window_spectrum(xc, yc)
                    .map_err(|e| failure(xc, yc, &e))?;
                let fit = tanaka1999(&spec, bands, sigma_floor).map_err(|e| failure(xc, yc, &e))?;
                Ok(TanakaEstimate { xc, yc, fit })
            })
            .collect();

        let mut result = TanakaMapResult {
            estimates: Vec::new(),
            failures: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(e) => result.estimates.push(e),
                Err(f) => result.failures.push(f),
            }
        }

        if result.estimates.is_empty() {
            return Err(AppError::new(
                3,
                format!("All {} windows failed; first: {}", centres.len(), first_reason(&result.failures)),
            ));
        }
        Ok(result)
    }

    fn fit_window(
        &self,
        idx: usize,
        xc: f64,
        yc: f64,
        mcmc: Option<&McmcConfig>,
    ) -> Result<WindowEstimate, WindowFailure> {
        let (spec, fit) = self.optimise.optimise(xc, yc).map_err(|e| failure(xc, yc, &e))?;

        let mcmc_summary = match mcmc {
            Some(cfg) => {
                // One independent, reproducible chain per window.
                let window_cfg = McmcConfig {
                    seed: cfg.seed.wrapping_add(idx as u64),
                    ..cfg.clone()
                };
                Some(
                    self.optimise
                        .metropolis_hastings(&spec, &fit.params, &window_cfg)
                        .map_err(|e| failure(xc, yc, &e))?,
                )
            }
            None => None,
        };

        Ok(WindowEstimate {
            xc,
            yc,
            fit,
            mcmc: mcmc_summary,
        })
    }
}

fn failure(xc: f64, yc: f64, err: &AppError) -> WindowFailure {
    WindowFailure {
        xc,
        yc,
        reason: err.to_string(),
    }
}

fn first_reason(failures: &[WindowFailure]) -> String {
    failures
        .first()
        .map(|f| f.reason.clone())
        .unwrap_or_else(|| "no windows inside the grid".to_string())
}
