//! Oblate ellipsoid of revolution: geodetic to Cartesian sampling and surface normals.

use glam::DVec3;

use crate::lonlat::LonLat;

/// An ellipsoid of revolution centered at the origin with its polar axis on `z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    equatorial_radius: f64,
    polar_radius: f64,
    /// First eccentricity squared.
    e2: f64,
    inv_radii2: DVec3,
}

impl Ellipsoid {
    /// Create an ellipsoid from its equatorial (`a`) and polar (`b`) radii.
    pub fn new(equatorial_radius: f64, polar_radius: f64) -> Self {
        let a2 = equatorial_radius * equatorial_radius;
        let b2 = polar_radius * polar_radius;
        Self {
            equatorial_radius,
            polar_radius,
            e2: 1.0 - b2 / a2,
            inv_radii2: DVec3::new(1.0 / a2, 1.0 / a2, 1.0 / b2),
        }
    }

    /// The WGS84 reference ellipsoid.
    pub fn wgs84() -> Self {
        Self::new(6_378_137.0, 6_356_752.314_245)
    }

    /// A perfect sphere.
    pub fn sphere(radius: f64) -> Self {
        Self::new(radius, radius)
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    /// `(1/a², 1/a², 1/b²)`, used to derive outward normals from surface positions.
    pub fn inv_radii2(&self) -> DVec3 {
        self.inv_radii2
    }

    /// Geodetic coordinate to Earth-centered Cartesian position.
    pub fn lonlat_to_cartesian(&self, ll: LonLat) -> DVec3 {
        let (sin_lat, cos_lat) = ll.lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = ll.lon.to_radians().sin_cos();
        let n = self.equatorial_radius / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        DVec3::new(
            (n + ll.height) * cos_lat * cos_lon,
            (n + ll.height) * cos_lat * sin_lon,
            (n * (1.0 - self.e2) + ll.height) * sin_lat,
        )
    }

    /// Outward surface normal at a point on the ellipsoid surface: the position
    /// scaled by the inverse squared radii, normalized.
    pub fn surface_normal(&self, position: DVec3) -> DVec3 {
        (position * self.inv_radii2).normalize_or_zero()
    }

    /// Nearest intersection of a ray with the ellipsoid surface, if any.
    pub fn hit_ray(&self, origin: DVec3, direction: DVec3) -> Option<DVec3> {
        let r = self.inv_radii2;
        let scale = DVec3::new(r.x.sqrt(), r.y.sqrt(), r.z.sqrt());
        let o = origin * scale;
        let d = direction * scale;

        let a = d.length_squared();
        let b = 2.0 * o.dot(d);
        let c = o.length_squared() - 1.0;
        let disc = b * b - 4.0 * a * c;
        if a == 0.0 || disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t0 = (-b - sq) / (2.0 * a);
        let t1 = (-b + sq) / (2.0 * a);
        let t = if t0 >= 0.0 { t0 } else { t1 };
        (t >= 0.0).then(|| origin + direction * t)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_prime_meridian_on_x_axis() {
        let e = Ellipsoid::wgs84();
        let p = e.lonlat_to_cartesian(LonLat::new(0.0, 0.0));
        assert!((p.x - 6_378_137.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!(p.z.abs() < 1e-6);
    }

    #[test]
    fn test_north_pole_uses_polar_radius() {
        let e = Ellipsoid::wgs84();
        let p = e.lonlat_to_cartesian(LonLat::new(0.0, 90.0));
        assert!((p.z - e.polar_radius()).abs() < 1e-6, "z = {}", p.z);
    }

    #[test]
    fn test_surface_point_satisfies_ellipsoid_equation() {
        let e = Ellipsoid::wgs84();
        for &(lon, lat) in &[(10.0, 45.0), (-120.0, -30.0), (179.0, 89.0)] {
            let p = e.lonlat_to_cartesian(LonLat::new(lon, lat));
            let f = (p * p * e.inv_radii2()).element_sum();
            assert!((f - 1.0).abs() < 1e-12, "f = {f}");
        }
    }

    #[test]
    fn test_normal_matches_geodetic_latitude() {
        let e = Ellipsoid::wgs84();
        let lat: f64 = 45.0;
        let p = e.lonlat_to_cartesian(LonLat::new(0.0, lat));
        let n = e.surface_normal(p);
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert!((n.z.asin().to_degrees() - lat).abs() < 1e-9);
    }

    #[test]
    fn test_height_offsets_along_normal() {
        let e = Ellipsoid::wgs84();
        let ground = e.lonlat_to_cartesian(LonLat::new(30.0, 60.0));
        let raised = e.lonlat_to_cartesian(LonLat::with_height(30.0, 60.0, 1000.0));
        let expected = ground + e.surface_normal(ground) * 1000.0;
        assert!((raised - expected).length() < 1e-6);
    }

    #[test]
    fn test_hit_ray_toward_center() {
        let e = Ellipsoid::sphere(100.0);
        let hit = e
            .hit_ray(DVec3::new(500.0, 0.0, 0.0), DVec3::NEG_X)
            .unwrap();
        assert!((hit - DVec3::new(100.0, 0.0, 0.0)).length() < 1e-9);
        assert!(e.hit_ray(DVec3::new(500.0, 0.0, 0.0), DVec3::X).is_none());
    }
}
