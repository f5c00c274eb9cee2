//! Report formatting.
//!
//! Formatting code lives in one place so:
//! - the math/inversion code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{BouligandFit, MausFit, McmcSummary, RadialSpectrum, TanakaFit};
use crate::io::ingest::LoadedGrid;
use crate::parallel::{MapResult, TanakaMapResult};

/// Dataset header: where the grid came from and what it covers.
pub fn format_grid_summary(loaded: &LoadedGrid) -> String {
    let g = &loaded.grid;
    let e = g.extent();
    let (mut lo, mut hi, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for &v in g.data().iter() {
        lo = lo.min(v);
        hi = hi.max(v);
        sum += v;
    }
    let mean = sum / (g.nx() * g.ny()) as f64;

    let mut out = String::new();
    out.push_str("=== curie - Curie Depth from Magnetic Anomaly Grids ===\n");
    out.push_str(&format!("Source: {}\n", loaded.source));
    out.push_str(&format!(
        "Grid: {}x{} nodes | cell={:.0} m | x=[{:.0}, {:.0}] m | y=[{:.0}, {:.0}] m\n",
        g.nx(),
        g.ny(),
        g.dx(),
        e.xmin,
        e.xmax,
        e.ymin,
        e.ymax
    ));
    out.push_str(&format!(
        "Anomaly: [{lo:.1}, {hi:.1}] nT | mean={mean:.1} nT\n"
    ));
    if loaded.nodata_filled > 0 {
        out.push_str(&format!(
            "Nodata: {} cells filled with the grid mean\n",
            loaded.nodata_filled
        ));
    }
    out
}

/// Single-window fit diagnostics for any combination of methods.
pub fn format_fit_summary(
    spectrum: &RadialSpectrum,
    bouligand: Option<&BouligandFit>,
    mcmc: Option<&McmcSummary>,
    tanaka: Option<&TanakaFit>,
    maus: Option<&MausFit>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Spectrum: {} annuli | k=[{:.4}, {:.4}] rad/km\n",
        spectrum.len(),
        spectrum.k.first().copied().unwrap_or(0.0),
        spectrum.k.last().copied().unwrap_or(0.0)
    ));

    if let Some(fit) = bouligand {
        let p = &fit.params;
        out.push_str("\nBouligand (2009) MAP estimate:\n");
        out.push_str(&format!("- beta  = {:.3}\n", p.beta));
        out.push_str(&format!("- z_t   = {:.3} km\n", p.zt));
        out.push_str(&format!("- dz    = {:.3} km\n", p.dz));
        out.push_str(&format!("- C     = {:.3}\n", p.c));
        out.push_str(&format!("- z_b   = {:.3} km (Curie depth)\n", p.curie_depth()));
        out.push_str(&format!(
            "- misfit: objective={:.3} | rms={:.3} over {} bins\n",
            fit.quality.objective, fit.quality.rms, fit.quality.n_bins
        ));
    }

    if let Some(m) = mcmc {
        out.push_str("\nPosterior (Metropolis-Hastings):\n");
        out.push_str(&format!("- beta  = {:.3} +/- {:.3}\n", m.mean.beta, m.sd.beta));
        out.push_str(&format!("- z_t   = {:.3} +/- {:.3} km\n", m.mean.zt, m.sd.zt));
        out.push_str(&format!("- dz    = {:.3} +/- {:.3} km\n", m.mean.dz, m.sd.dz));
        out.push_str(&format!(
            "- z_b   = {:.3} km | {} samples | acceptance={:.2}\n",
            m.mean.curie_depth(),
            m.n_samples,
            m.acceptance
        ));
    }

    if let Some(t) = tanaka {
        out.push_str("\nTanaka (1999) two-band estimate:\n");
        out.push_str(&format!("- z_t = {:.3} +/- {:.3} km\n", t.zt, t.zt_err));
        out.push_str(&format!("- z_0 = {:.3} +/- {:.3} km\n", t.z0, t.z0_err));
        out.push_str(&format!(
            "- z_b = {:.3} +/- {:.3} km (Curie depth)\n",
            t.zb, t.zb_err
        ));
    }

    if let Some(m) = maus {
        out.push_str("\nMaus (1995) slope estimate:\n");
        out.push_str(&format!("- beta = {:.3}\n", m.beta));
        out.push_str(&format!("- z_t  = {:.3} +/- {:.3} km\n", m.zt, m.zt_err));
        out.push_str(&format!("- C    = {:.3}\n", m.c));
    }

    out
}

/// Batch summary for a Bouligand map run.
pub fn format_map_summary(result: &MapResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Windows: {} fitted | {} failed\n",
        result.estimates.len(),
        result.failures.len()
    ));

    let depths: Vec<f64> = result
        .estimates
        .iter()
        .map(|e| e.fit.params.curie_depth())
        .collect();
    out.push_str(&format!("Curie depth: {}\n", fmt_stats(&depths)));

    let rms: Vec<f64> = result.estimates.iter().map(|e| e.fit.quality.rms).collect();
    out.push_str(&format!("Fit rms: {}\n", fmt_stats(&rms)));

    for f in result.failures.iter().take(5) {
        out.push_str(&format!(
            "  (failed window at {:.0}, {:.0}) {}\n",
            f.xc, f.yc, f.reason
        ));
    }
    if result.failures.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", result.failures.len() - 5));
    }
    out
}

/// Batch summary for a Tanaka map run.
pub fn format_tanaka_map_summary(result: &TanakaMapResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Windows: {} fitted | {} failed\n",
        result.estimates.len(),
        result.failures.len()
    ));
    let depths: Vec<f64> = result.estimates.iter().map(|e| e.fit.zb).collect();
    out.push_str(&format!("Curie depth: {}\n", fmt_stats(&depths)));
    for f in result.failures.iter().take(5) {
        out.push_str(&format!(
            "  (failed window at {:.0}, {:.0}) {}\n",
            f.xc, f.yc, f.reason
        ));
    }
    out
}

fn fmt_stats(values: &[f64]) -> String {
    if values.is_empty() {
        return "n=0".to_string();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    format!(
        "mean={mean:.2} km | sd={:.2} km | range=[{lo:.2}, {hi:.2}] km | n={}",
        var.sqrt(),
        values.len()
    )
}
