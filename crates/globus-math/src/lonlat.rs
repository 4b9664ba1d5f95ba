//! Geodetic coordinates and the spherical Web-Mercator (EPSG:3857) projection.

/// Half the circumference of the Web-Mercator square, in projected meters.
pub const POLE: f64 = 20_037_508.34;

/// Latitude (degrees) at which the Web-Mercator square is clipped.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A geodetic coordinate in degrees with an optional height above the ellipsoid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LonLat {
    /// Longitude in degrees, positive east.
    pub lon: f64,
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Height above the ellipsoid surface in meters.
    pub height: f64,
}

impl LonLat {
    /// Create a surface coordinate (zero height).
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            height: 0.0,
        }
    }

    /// Create a coordinate at the given height.
    pub const fn with_height(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }
}

/// Project Web-Mercator meters back to geodetic degrees.
pub fn inverse_mercator(x: f64, y: f64) -> LonLat {
    let lon = 180.0 * x / POLE;
    let lat = (2.0 * (y / POLE * std::f64::consts::PI).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    LonLat::new(lon, lat)
}

/// Project geodetic degrees to Web-Mercator meters.
///
/// Latitude is clamped to [`MAX_MERCATOR_LAT`] so the poles stay finite.
pub fn forward_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = lon * POLE / 180.0;
    let y = ((90.0 + lat).to_radians() * 0.5).tan().ln() / std::f64::consts::PI * POLE;
    (x, y)
}
