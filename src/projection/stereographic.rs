//! Polar stereographic projection.
//!
//! Used by the north (EPSG:3413) and south (EPSG:3031) polar gridded
//! ICESat-2 products. Implements the ellipsoidal (WGS84) form with a
//! standard parallel, following Snyder's Map Projections equations, with
//! the series expansion for the inverse latitude.
//!
//! The projection parameters include:
//! - Central meridian (lon0)
//! - Standard parallel (lat_ts): the latitude of true scale
//! - Aspect: north (projection plane at the north pole) or south

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity
const WGS84_E: f64 = 0.081_819_190_842_621_5;

/// Polar stereographic projection parameters.
///
/// Constants that depend only on the standard parallel are precomputed at
/// construction.
#[derive(Debug, Clone)]
pub struct PolarStereographic {
    /// Central meridian in radians
    pub lon0: f64,
    /// Standard parallel in radians (absolute value, pole-side)
    pub lat_ts: f64,
    /// South polar aspect
    pub south: bool,
    /// Ellipsoid semi-major axis (meters)
    pub a: f64,
    /// Ellipsoid eccentricity
    pub e: f64,
    /// t at the standard parallel
    t_c: f64,
    /// m at the standard parallel
    m_c: f64,
}

impl PolarStereographic {
    /// North polar aspect (EPSG:3413): lat_ts=70N, lon0=-45.
    pub fn north(lon0_deg: f64, lat_ts_deg: f64) -> Self {
        Self::new(lon0_deg, lat_ts_deg, false)
    }

    /// South polar aspect (EPSG:3031): lat_ts=71S, lon0=0.
    pub fn south(lon0_deg: f64, lat_ts_deg: f64) -> Self {
        Self::new(lon0_deg, lat_ts_deg, true)
    }

    fn new(lon0_deg: f64, lat_ts_deg: f64, south: bool) -> Self {
        let to_rad = PI / 180.0;
        let lon0 = lon0_deg * to_rad;
        // internally the standard parallel is held pole-side positive
        let lat_ts = lat_ts_deg.abs() * to_rad;

        let (a, e) = (WGS84_A, WGS84_E);
        let t_c = Self::tsfn(lat_ts, e);
        let m_c = lat_ts.cos() / (1.0 - e * e * lat_ts.sin().powi(2)).sqrt();

        Self {
            lon0,
            lat_ts,
            south,
            a,
            e,
            t_c,
            m_c,
        }
    }

    /// Snyder's t function (eq. 15-9).
    fn tsfn(phi: f64, e: f64) -> f64 {
        let esin = e * phi.sin();
        (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - esin) / (1.0 + esin)).powf(e / 2.0)
    }

    /// Forward projection: geographic (degrees) to projected meters.
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        // the south aspect mirrors the north-aspect equations
        let (lam, phi) = if self.south {
            (-lon_deg * to_rad, -lat_deg * to_rad)
        } else {
            (lon_deg * to_rad, lat_deg * to_rad)
        };
        let lon0 = if self.south { -self.lon0 } else { self.lon0 };

        let t = Self::tsfn(phi, self.e);
        let rho = self.a * self.m_c * t / self.t_c;
        let dlam = lam - lon0;
        let x = rho * dlam.sin();
        let y = -rho * dlam.cos();
        if self.south {
            (-x, -y)
        } else {
            (x, y)
        }
    }

    /// Inverse projection: projected meters to geographic (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (x, y) = if self.south { (-x, -y) } else { (x, y) };
        let lon0 = if self.south { -self.lon0 } else { self.lon0 };

        let rho = x.hypot(y);
        let (phi, lam) = if rho == 0.0 {
            (FRAC_PI_2, lon0)
        } else {
            let t = rho * self.t_c / (self.a * self.m_c);
            let chi = FRAC_PI_2 - 2.0 * t.atan();
            (self.chi_to_phi(chi), lon0 + x.atan2(-y))
        };

        let to_deg = 180.0 / PI;
        if self.south {
            (-lam * to_deg, -phi * to_deg)
        } else {
            (lam * to_deg, phi * to_deg)
        }
    }

    /// Series expansion from conformal latitude to geodetic latitude
    /// (Snyder eq. 3-5).
    fn chi_to_phi(&self, chi: f64) -> f64 {
        let e2 = self.e * self.e;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let e8 = e6 * e2;
        chi + (e2 / 2.0 + 5.0 * e4 / 24.0 + e6 / 12.0 + 13.0 * e8 / 360.0) * (2.0 * chi).sin()
            + (7.0 * e4 / 48.0 + 29.0 * e6 / 240.0 + 811.0 * e8 / 11520.0) * (4.0 * chi).sin()
            + (7.0 * e6 / 120.0 + 81.0 * e8 / 1120.0) * (6.0 * chi).sin()
            + (4279.0 * e8 / 161280.0) * (8.0 * chi).sin()
    }
}
