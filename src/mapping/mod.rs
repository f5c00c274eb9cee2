//! Coordinate and scattered-data utilities.
//!
//! - `transform_coordinates`: WGS84 geographic <-> UTM, vectorised
//! - `grid`: inverse-distance resampling of scattered points onto a
//!   regular grid
//! - `trim`: clip scattered points to an extent
//!
//! The transverse-Mercator series are the standard Snyder (1987) forms for
//! the WGS84 ellipsoid; accuracy is well under a metre inside a UTM zone,
//! which is far below typical aeromagnetic grid spacing.

use nalgebra::DMatrix;

use crate::domain::Extent;
use crate::error::AppError;

// WGS84.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A coordinate reference system we can transform between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS84 longitude/latitude in degrees (`x` = lon, `y` = lat).
    Geographic,
    /// UTM easting/northing in metres.
    Utm { zone: u8, south: bool },
}

/// Transform coordinate arrays between reference systems.
///
/// `x`/`y` must have equal length. UTM zones are validated (1..=60).
pub fn transform_coordinates(
    x: &[f64],
    y: &[f64],
    from: Crs,
    to: Crs,
) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    if x.len() != y.len() {
        return Err(AppError::new(
            2,
            format!("Coordinate arrays differ in length: {} vs {}.", x.len(), y.len()),
        ));
    }
    validate_crs(from)?;
    validate_crs(to)?;

    if from == to {
        return Ok((x.to_vec(), y.to_vec()));
    }

    // Route through geographic for UTM -> UTM.
    let (lon, lat) = match from {
        Crs::Geographic => (x.to_vec(), y.to_vec()),
        Crs::Utm { zone, south } => {
            let mut lon = Vec::with_capacity(x.len());
            let mut lat = Vec::with_capacity(x.len());
            for i in 0..x.len() {
                let (lo, la) = utm_to_geographic(x[i], y[i], zone, south)?;
                lon.push(lo);
                lat.push(la);
            }
            (lon, lat)
        }
    };

    match to {
        Crs::Geographic => Ok((lon, lat)),
        Crs::Utm { zone, south } => {
            let mut e = Vec::with_capacity(lon.len());
            let mut n = Vec::with_capacity(lon.len());
            for i in 0..lon.len() {
                let (ei, ni) = geographic_to_utm(lon[i], lat[i], zone, south)?;
                e.push(ei);
                n.push(ni);
            }
            Ok((e, n))
        }
    }
}

fn validate_crs(crs: Crs) -> Result<(), AppError> {
    if let Crs::Utm { zone, .. } = crs {
        if !(1..=60).contains(&zone) {
            return Err(AppError::new(2, format!("UTM zone {zone} out of range 1..=60.")));
        }
    }
    Ok(())
}

fn central_meridian_deg(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Forward transverse Mercator (Snyder 1987, eq. 8-9..8-13).
fn geographic_to_utm(lon: f64, lat: f64, zone: u8, south: bool) -> Result<(f64, f64), AppError> {
    if !((-180.0..=180.0).contains(&lon) && (-84.0..=84.0).contains(&lat)) {
        return Err(AppError::new(
            3,
            format!("Coordinate ({lon}, {lat}) outside the UTM domain."),
        ));
    }

    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let phi = lat.to_radians();
    let dlam = (lon - central_meridian_deg(zone)).to_radians();

    let sin_p = phi.sin();
    let cos_p = phi.cos();
    let n = WGS84_A / (1.0 - e2 * sin_p * sin_p).sqrt();
    let t = (phi.tan()).powi(2);
    let c = ep2 * cos_p * cos_p;
    let a = cos_p * dlam;

    let m = meridional_arc(phi, e2);

    let a2 = a * a;
    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a2 * a2 * a / 120.0)
        + FALSE_EASTING;
    let mut northing = UTM_K0
        * (m + n
            * phi.tan()
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a2 * a2 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a2 * a2 * a2 / 720.0));
    if south {
        northing += FALSE_NORTHING_SOUTH;
    }
    Ok((easting, northing))
}

/// Inverse transverse Mercator via the footpoint latitude.
fn utm_to_geographic(easting: f64, northing: f64, zone: u8, south: bool) -> Result<(f64, f64), AppError> {
    if !(easting.is_finite() && northing.is_finite()) {
        return Err(AppError::new(3, "Non-finite UTM coordinate."));
    }

    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let x = easting - FALSE_EASTING;
    let y = if south {
        northing - FALSE_NORTHING_SOUTH
    } else {
        northing
    };

    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));

    let sqrt1me2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt1me2) / (1.0 + sqrt1me2);
    let e1_2 = e1 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1 * e1_2 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_2 * e1_2 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1 * e1_2 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_2 * e1_2 / 512.0) * (8.0 * mu).sin();

    let sin_p1 = phi1.sin();
    let cos_p1 = phi1.cos();
    let c1 = ep2 * cos_p1 * cos_p1;
    let t1 = (phi1.tan()).powi(2);
    let n1 = WGS84_A / (1.0 - e2 * sin_p1 * sin_p1).sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin_p1 * sin_p1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let d2 = d * d;
    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d2 * d2 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d2
                    * d2
                    * d2
                    / 720.0);
    let lam = (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
            * d2
            * d2
            * d
            / 120.0)
        / cos_p1;

    Ok((central_meridian_deg(zone) + lam.to_degrees(), phi.to_degrees()))
}

/// Meridional arc length from the equator (Snyder 3-21).
fn meridional_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Search radius for `grid`, in cells, before a node counts as uncovered.
const IDW_MAX_RING: isize = 4;

/// Resample scattered points onto a regular `(ny, nx)` grid over `extent`
/// by inverse-distance-squared weighting of nearby points.
///
/// A sample lying on a node (within a millimetre) passes through exactly.
/// Errors when any node has no point within the search radius; that means
/// the requested grid is finer than the data supports.
pub fn grid(
    xs: &[f64],
    ys: &[f64],
    values: &[f64],
    extent: Extent,
    nx: usize,
    ny: usize,
) -> Result<DMatrix<f64>, AppError> {
    if xs.len() != ys.len() || xs.len() != values.len() {
        return Err(AppError::new(2, "Coordinate/value arrays differ in length."));
    }
    if xs.is_empty() {
        return Err(AppError::new(3, "No points to grid."));
    }
    if !extent.is_valid() || nx < 2 || ny < 2 {
        return Err(AppError::new(2, "Invalid target grid shape or extent."));
    }

    let dx = extent.width() / (nx - 1) as f64;
    let dy = extent.height() / (ny - 1) as f64;

    // Bucket points by target cell for neighbourhood lookups.
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); nx * ny];
    for p in 0..xs.len() {
        if !(xs[p].is_finite() && ys[p].is_finite() && values[p].is_finite()) {
            return Err(AppError::new(3, format!("Non-finite input point at index {p}.")));
        }
        if !extent.contains(xs[p], ys[p]) {
            continue;
        }
        let i = (((xs[p] - extent.xmin) / dx).round() as usize).min(nx - 1);
        let j = (((ys[p] - extent.ymin) / dy).round() as usize).min(ny - 1);
        buckets[j * nx + i].push(p);
    }

    let mut out = DMatrix::<f64>::zeros(ny, nx);
    let mut uncovered = 0usize;
    for j in 0..ny {
        for i in 0..nx {
            let x0 = extent.xmin + i as f64 * dx;
            let y0 = extent.ymin + j as f64 * dy;
            match idw_at(x0, y0, i, j, nx, ny, dx, dy, &buckets, xs, ys, values) {
                Some(v) => out[(j, i)] = v,
                None => uncovered += 1,
            }
        }
    }

    if uncovered > 0 {
        return Err(AppError::new(
            3,
            format!(
                "{uncovered} of {} grid nodes have no data within {IDW_MAX_RING} cells; \
                 use a coarser grid or trim the extent.",
                nx * ny
            ),
        ));
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn idw_at(
    x0: f64,
    y0: f64,
    i: usize,
    j: usize,
    nx: usize,
    ny: usize,
    dx: f64,
    dy: f64,
    buckets: &[Vec<usize>],
    xs: &[f64],
    ys: &[f64],
    values: &[f64],
) -> Option<f64> {
    for ring in 0..=IDW_MAX_RING {
        let mut num = 0.0;
        let mut den = 0.0;
        let mut found = false;
        for dj in -ring..=ring {
            for di in -ring..=ring {
                let jj = j as isize + dj;
                let ii = i as isize + di;
                if jj < 0 || ii < 0 || jj as usize >= ny || ii as usize >= nx {
                    continue;
                }
                for &p in &buckets[jj as usize * nx + ii as usize] {
                    let ddx = xs[p] - x0;
                    let ddy = ys[p] - y0;
                    let d2 = ddx * ddx + ddy * ddy;
                    if d2 < 1e-6 {
                        return Some(values[p]);
                    }
                    // Cap the influence radius at the current ring.
                    let r = (ring as f64 + 1.0) * dx.max(dy);
                    if d2 > r * r {
                        continue;
                    }
                    num += values[p] / d2;
                    den += 1.0 / d2;
                    found = true;
                }
            }
        }
        if found {
            return Some(num / den);
        }
    }
    None
}

/// Keep only points inside `extent`.
///
/// Errors if nothing survives, which almost always signals mixed-up units
/// or coordinate systems.
pub fn trim(
    xs: &[f64],
    ys: &[f64],
    values: &[f64],
    extent: Extent,
) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), AppError> {
    if xs.len() != ys.len() || xs.len() != values.len() {
        return Err(AppError::new(2, "Coordinate/value arrays differ in length."));
    }
    if !extent.is_valid() {
        return Err(AppError::new(2, "Invalid trim extent."));
    }

    let mut ox = Vec::new();
    let mut oy = Vec::new();
    let mut ov = Vec::new();
    for p in 0..xs.len() {
        if extent.contains(xs[p], ys[p]) {
            ox.push(xs[p]);
            oy.push(ys[p]);
            ov.push(values[p]);
        }
    }
    if ox.is_empty() {
        return Err(AppError::new(
            3,
            "No points inside the trim extent; check units and coordinate system.",
        ));
    }
    Ok((ox, oy, ov))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_meridian_maps_to_false_easting() {
        // Zone 31 central meridian is 3E; on the equator that is exactly
        // (500000, 0).
        let (e, n) = geographic_to_utm(3.0, 0.0, 31, false).unwrap();
        assert!((e - 500_000.0).abs() < 1e-6);
        assert!(n.abs() < 1e-6);
    }

    #[test]
    fn utm_round_trip_north_and_south() {
        for &(lon, lat, zone, south) in &[
            (11.57, 48.14, 32u8, false),  // Munich
            (144.96, -37.81, 55u8, true), // Melbourne
            (-70.66, -33.45, 19u8, true), // Santiago
        ] {
            let (x, y) = transform_coordinates(&[lon], &[lat], Crs::Geographic, Crs::Utm { zone, south })
                .unwrap();
            assert!(y[0] >= 0.0, "false northing keeps northings positive");
            let (lon2, lat2) =
                transform_coordinates(&x, &y, Crs::Utm { zone, south }, Crs::Geographic).unwrap();
            assert!((lon2[0] - lon).abs() < 1e-7, "lon {lon}: {}", lon2[0]);
            assert!((lat2[0] - lat).abs() < 1e-7, "lat {lat}: {}", lat2[0]);
        }
    }

    #[test]
    fn identity_transform_copies() {
        let (x, y) =
            transform_coordinates(&[1.0, 2.0], &[3.0, 4.0], Crs::Geographic, Crs::Geographic).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);
        assert_eq!(y, vec![3.0, 4.0]);
    }

    #[test]
    fn bad_zone_is_a_usage_error() {
        let err = transform_coordinates(&[0.0], &[0.0], Crs::Geographic, Crs::Utm { zone: 61, south: false })
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn grid_passes_through_on_node_points() {
        // Points exactly on nodes of a 3x3 grid.
        let xs = [0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        let ys = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let vals: Vec<f64> = (0..9).map(|v| v as f64).collect();
        let g = grid(&xs, &ys, &vals, Extent::new(0.0, 2.0, 0.0, 2.0), 3, 3).unwrap();
        for j in 0..3 {
            for i in 0..3 {
                assert!((g[(j, i)] - (j * 3 + i) as f64).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn grid_interpolates_a_constant_field_exactly() {
        let xs = [0.1, 0.9, 0.5, 0.3, 0.7, 0.2, 0.8];
        let ys = [0.2, 0.8, 0.5, 0.7, 0.3, 0.9, 0.1];
        let vals = [7.0; 7];
        let g = grid(&xs, &ys, &vals, Extent::new(0.0, 1.0, 0.0, 1.0), 4, 4).unwrap();
        for v in g.iter() {
            assert!((v - 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn grid_with_no_coverage_fails() {
        let xs = [0.0];
        let ys = [0.0];
        let vals = [1.0];
        let err = grid(&xs, &ys, &vals, Extent::new(0.0, 100.0, 0.0, 100.0), 50, 50).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn trim_clips_and_errors_when_empty() {
        let xs = [0.0, 5.0, 10.0];
        let ys = [0.0, 5.0, 10.0];
        let vals = [1.0, 2.0, 3.0];
        let (tx, _, tv) = trim(&xs, &ys, &vals, Extent::new(1.0, 9.0, 1.0, 9.0)).unwrap();
        assert_eq!(tx, vec![5.0]);
        assert_eq!(tv, vec![2.0]);

        let err = trim(&xs, &ys, &vals, Extent::new(100.0, 200.0, 100.0, 200.0)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
