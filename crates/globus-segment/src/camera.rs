//! The minimal camera contract the LOD metric needs.

use glam::DVec3;
use globus_math::{Ellipsoid, LonLat};

/// Eye position and vertical field of view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: DVec3,
    /// Tangent of half the vertical field of view.
    pub tan_half_fov: f64,
}

impl Camera {
    pub fn new(eye: DVec3, fov_deg: f64) -> Self {
        Self {
            eye,
            tan_half_fov: (fov_deg.to_radians() * 0.5).tan(),
        }
    }

    /// A camera `altitude` meters above the surface point at `position`.
    pub fn above(ellipsoid: &Ellipsoid, position: LonLat, altitude: f64, fov_deg: f64) -> Self {
        let eye = ellipsoid.lonlat_to_cartesian(LonLat::with_height(
            position.lon,
            position.lat,
            altitude,
        ));
        Self::new(eye, fov_deg)
    }

    /// Half the height of the view frustum slice through `p`: the world-space
    /// size one screen half-height covers at that distance.
    #[inline]
    pub fn projected_size(&self, p: DVec3) -> f64 {
        self.eye.distance(p) * self.tan_half_fov
    }
}
