//! Planet-level tuning knobs.

use globus_config::Config;
use globus_math::Ellipsoid;

/// Screen-space error threshold: a tile is accepted when its projected size
/// exceeds this ratio times its bounding radius.
pub const RATIO_LOD: f64 = 1.12;

/// Zoom beyond which a tile without elevation data collapses to a 3x3 mesh.
pub const DEGRADE_ZOOM: u8 = 5;

/// Settings the segment core reads while building and drawing tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanetSettings {
    pub ellipsoid: Ellipsoid,
    /// Scale applied to every height sample.
    pub height_factor: f64,
    pub ratio_lod: f64,
    /// Deepest zoom the quadtree subdivides to.
    pub max_zoom: u8,
    pub degrade_zoom: u8,
    pub lighting_enabled: bool,
    /// Normal-map queue entries processed per frame.
    pub normal_maps_per_frame: usize,
    /// Terrain requests allowed in flight at once.
    pub max_pending_requests: usize,
}

impl Default for PlanetSettings {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::wgs84(),
            height_factor: 1.0,
            ratio_lod: RATIO_LOD,
            max_zoom: 17,
            degrade_zoom: DEGRADE_ZOOM,
            lighting_enabled: true,
            normal_maps_per_frame: 32,
            max_pending_requests: 32,
        }
    }
}

impl From<&Config> for PlanetSettings {
    fn from(config: &Config) -> Self {
        Self {
            ellipsoid: Ellipsoid::new(
                config.ellipsoid.equatorial_radius_m,
                config.ellipsoid.polar_radius_m,
            ),
            height_factor: config.terrain.height_factor,
            ratio_lod: config.lod.ratio_lod,
            max_zoom: config.lod.max_zoom,
            degrade_zoom: config.lod.degrade_zoom,
            lighting_enabled: config.lighting.enabled,
            normal_maps_per_frame: config.lighting.normal_maps_per_frame.max(1),
            max_pending_requests: config.terrain.max_pending_requests.max(1),
        }
    }
}
