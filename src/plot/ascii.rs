//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed spectrum bins: `o`
//! - fitted model curve: `-`

use crate::domain::{BouligandParams, FitFile, RadialSpectrum};
use crate::models::bouligand2009;

/// Render the radial spectrum with an optional fitted model overlay.
pub fn render_spectrum_plot(
    spectrum: &RadialSpectrum,
    model: Option<&BouligandParams>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let Some((k_min, k_max)) = k_range(spectrum) else {
        return "Plot: spectrum too short to draw\n".to_string();
    };

    let curve = model.map(|p| sample_model(p, k_min, k_max, width));
    let (p_min, p_max) = power_range(spectrum, curve.as_deref()).unwrap_or((0.0, 1.0));
    let (p_min, p_max) = pad_range(p_min, p_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw the curve first so observed bins can overlay it.
    if let Some(curve) = &curve {
        for &(k, phi) in curve {
            if !phi.is_finite() {
                continue;
            }
            let x = map_x(k, k_min, k_max, width);
            let y = map_y(phi, p_min, p_max, height);
            if grid[y][x] == ' ' {
                grid[y][x] = '-';
            }
        }
    }

    for i in 0..spectrum.len() {
        let x = map_x(spectrum.k[i], k_min, k_max, width);
        let y = map_y(spectrum.power[i], p_min, p_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: k=[{k_min:.4}, {k_max:.4}] rad/km | Phi=[{p_min:.2}, {p_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

/// Render a saved fit file: its spectrum plus the Bouligand overlay when
/// the file carries one.
pub fn render_fit_file_plot(fit: &FitFile, width: usize, height: usize) -> String {
    let model = fit.bouligand.as_ref().map(|b| &b.params);
    render_spectrum_plot(&fit.spectrum, model, width, height)
}

fn sample_model(p: &BouligandParams, k_min: f64, k_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let k = k_min + u * (k_max - k_min);
        out.push((k, bouligand2009(k, p.beta, p.zt, p.dz, p.c)));
    }
    out
}

fn k_range(spectrum: &RadialSpectrum) -> Option<(f64, f64)> {
    let (first, last) = (spectrum.k.first()?, spectrum.k.last()?);
    if last > first {
        Some((*first, *last))
    } else {
        None
    }
}

fn power_range(spectrum: &RadialSpectrum, curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_p = f64::INFINITY;
    let mut max_p = f64::NEG_INFINITY;
    for &p in &spectrum.power {
        min_p = min_p.min(p);
        max_p = max_p.max(p);
    }
    if let Some(curve) = curve {
        for &(_, p) in curve {
            if p.is_finite() {
                min_p = min_p.min(p);
                max_p = max_p.max(p);
            }
        }
    }
    if min_p.is_finite() && max_p.is_finite() && max_p > min_p {
        Some((min_p, max_p))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(k: f64, k_min: f64, k_max: f64, width: usize) -> usize {
    let u = ((k - k_min) / (k_max - k_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(p: f64, p_min: f64, p_max: f64, height: usize) -> usize {
    let u = ((p - p_min) / (p_max - p_min)).clamp(0.0, 1.0);
    // Largest power at the top row.
    (height as f64 - 1.0 - u * (height as f64 - 1.0)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_spectrum() -> RadialSpectrum {
        let k: Vec<f64> = (1..=30).map(|i| 0.02 * i as f64).collect();
        let power: Vec<f64> = k.iter().map(|&ki| 12.0 - 8.0 * ki).collect();
        let n = k.len();
        RadialSpectrum {
            k,
            power,
            sigma: vec![0.3; n],
            counts: vec![16; n],
        }
    }

    #[test]
    fn plot_is_deterministic_and_sized() {
        let s = demo_spectrum();
        let a = render_spectrum_plot(&s, None, 60, 15);
        let b = render_spectrum_plot(&s, None, 60, 15);
        assert_eq!(a, b);
        assert_eq!(a.lines().count(), 16); // header + height rows
        assert!(a.lines().skip(1).all(|l| l.chars().count() == 60));
        assert!(a.contains('o'));
    }

    #[test]
    fn model_overlay_draws_a_curve() {
        let s = demo_spectrum();
        let p = BouligandParams {
            beta: 3.0,
            zt: 1.0,
            dz: 20.0,
            c: 5.0,
        };
        let text = render_spectrum_plot(&s, Some(&p), 60, 15);
        assert!(text.contains('-'));
    }

    #[test]
    fn decreasing_power_puts_first_bin_highest() {
        let s = demo_spectrum();
        let text = render_spectrum_plot(&s, None, 40, 10);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        let first_o_row = rows.iter().position(|r| r.contains('o')).unwrap();
        // The top populated row holds a low-k bin (left half of the plot).
        let col = rows[first_o_row].find('o').unwrap();
        assert!(col < 20, "first bin at column {col}");
    }
}
