//! Coordinate transforms between EPSG:4326 and EPSG:2180 (PUWG 1992).
//!
//! PUWG 1992 is the all-Poland transverse Mercator grid on GRS80:
//! central meridian 19°E, scale 0.9993, false easting 500 km, false
//! northing -5300 km. Forward and inverse follow Karney's series for
//! the transverse Mercator projection, sixth order in the third
//! flattening, accurate to well under a millimeter nationwide.

use geo::MapCoords;
use geo_types::{Coord, Geometry};

const SEMI_MAJOR: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;
const SCALE: f64 = 0.9993;
const LON0_DEG: f64 = 19.0;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING: f64 = -5_300_000.0;

#[derive(Debug, Clone, Copy)]
struct TmSeries {
    eccentricity: f64,
    /// Scaled rectifying radius: scale factor times Karney's A.
    radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

fn tm_series() -> TmSeries {
    let n = FLATTENING / (2.0 - FLATTENING);
    let n2 = n * n;
    let n3 = n2 * n;
    let n4 = n3 * n;
    let n5 = n4 * n;
    let n6 = n5 * n;

    let radius = SCALE * SEMI_MAJOR / (1.0 + n)
        * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

    let alpha = [
        n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
            + 7891.0 * n6 / 37800.0,
        13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
            - 1_983_433.0 * n6 / 1_935_360.0,
        61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
            + 167_603.0 * n6 / 181_440.0,
        49561.0 * n4 / 161_280.0 - 179.0 * n5 / 168.0 + 6_601_661.0 * n6 / 7_257_600.0,
        34729.0 * n5 / 80640.0 - 3_418_889.0 * n6 / 1_995_840.0,
        212_378_941.0 * n6 / 319_334_400.0,
    ];
    let beta = [
        n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
            + 96199.0 * n6 / 604_800.0,
        n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
            - 1_118_711.0 * n6 / 3_870_720.0,
        17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
        4397.0 * n4 / 161_280.0 - 11.0 * n5 / 504.0 - 830_251.0 * n6 / 7_257_600.0,
        4583.0 * n5 / 161_280.0 - 108_847.0 * n6 / 3_991_680.0,
        20_648_693.0 * n6 / 638_668_800.0,
    ];

    TmSeries {
        eccentricity: (FLATTENING * (2.0 - FLATTENING)).sqrt(),
        radius,
        alpha,
        beta,
    }
}

/// Project a geographic coordinate (lon/lat degrees) to PUWG 1992
/// meters (easting/northing).
pub fn project(coord: Coord<f64>) -> Coord<f64> {
    let series = tm_series();
    let e = series.eccentricity;
    let phi = coord.y.to_radians();
    let lam = coord.x.to_radians() - LON0_DEG.to_radians();

    // Conformal latitude
    let t = (phi.sin().atanh() - e * (e * phi.sin()).atanh()).sinh();
    let xi_prime = t.atan2(lam.cos());
    let eta_prime = (lam.sin() / t.hypot(lam.cos())).asinh();

    let mut xi = xi_prime;
    let mut eta = eta_prime;
    for (j, a) in series.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
        eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
    }

    Coord {
        x: FALSE_EASTING + series.radius * eta,
        y: FALSE_NORTHING + series.radius * xi,
    }
}

/// Inverse of [`project`]: PUWG 1992 meters back to lon/lat degrees.
pub fn unproject(coord: Coord<f64>) -> Coord<f64> {
    let series = tm_series();
    let e = series.eccentricity;
    let xi = (coord.y - FALSE_NORTHING) / series.radius;
    let eta = (coord.x - FALSE_EASTING) / series.radius;

    let mut xi_prime = xi;
    let mut eta_prime = eta;
    for (j, b) in series.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_prime -= b * (k * xi).sin() * (k * eta).cosh();
        eta_prime -= b * (k * xi).cos() * (k * eta).sinh();
    }

    let tau_prime = xi_prime.sin() / eta_prime.sinh().hypot(xi_prime.cos());
    let lam = eta_prime.sinh().atan2(xi_prime.cos());

    // Invert the conformal latitude by fixed-point iteration; converges
    // to machine precision in a handful of rounds.
    let mut phi = tau_prime.atan();
    for _ in 0..8 {
        phi = (tau_prime.asinh() + e * (e * phi.sin()).atanh()).sinh().atan();
    }

    Coord {
        x: (lam + LON0_DEG.to_radians()).to_degrees(),
        y: phi.to_degrees(),
    }
}

/// Reproject any geometry from EPSG:4326 to EPSG:2180.
pub fn geometry_to_puwg92(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(project)
}
