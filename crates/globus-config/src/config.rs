//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain provider settings.
    pub terrain: TerrainConfig,
    /// Level-of-detail settings.
    pub lod: LodConfig,
    /// Normal-map lighting settings.
    pub lighting: LightingConfig,
    /// Reference ellipsoid.
    pub ellipsoid: EllipsoidConfig,
    /// Demo camera flight.
    pub demo: DemoConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Terrain provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Seed for the procedural height field.
    pub seed: u64,
    /// Native sample grid of one terrain tile (`file_grid_size + 1` samples per side).
    pub file_grid_size: u32,
    /// Shallowest zoom at which the provider has data.
    pub min_zoom: u8,
    /// Deepest zoom at which the provider has data.
    pub max_zoom: u8,
    /// Render grid size per zoom. Zooms past the end use the last entry.
    pub grid_size_by_zoom: Vec<u32>,
    /// Multiplier applied to every height sample.
    pub height_factor: f64,
    /// Amplitude of the first noise octave in meters.
    pub amplitude_m: f64,
    /// Worker threads for the background provider (0 = derive from CPU count).
    pub worker_threads: usize,
    /// Maximum terrain requests in flight at once.
    pub max_pending_requests: usize,
}

/// Level-of-detail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Screen-space error ratio: a tile is rendered once its projected size
    /// exceeds `ratio_lod * bounding radius`.
    pub ratio_lod: f64,
    /// Deepest quadtree zoom.
    pub max_zoom: u8,
    /// Tiles deeper than this zoom with no elevation data collapse to a 3x3 mesh.
    pub degrade_zoom: u8,
}

/// Normal-map lighting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    /// Build and bake per-tile normal maps.
    pub enabled: bool,
    /// Maximum normal-map queue entries processed per frame.
    pub normal_maps_per_frame: usize,
}

/// Reference ellipsoid radii.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EllipsoidConfig {
    /// Equatorial radius in meters.
    pub equatorial_radius_m: f64,
    /// Polar radius in meters.
    pub polar_radius_m: f64,
}

/// Demo camera flight configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Frames to simulate.
    pub frames: u32,
    /// Longitude of the descent target in degrees.
    pub lon: f64,
    /// Latitude of the descent target in degrees.
    pub lat: f64,
    /// Camera altitude at the first frame in meters.
    pub start_altitude_m: f64,
    /// Camera altitude at the last frame in meters.
    pub end_altitude_m: f64,
    /// Vertical field of view in degrees.
    pub fov_deg: f64,
    /// Upload buffers through wgpu instead of the in-memory backend.
    pub use_gpu: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub file_logging: bool,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            file_grid_size: 32,
            min_zoom: 2,
            max_zoom: 14,
            grid_size_by_zoom: vec![
                64, 32, 16, 8, 8, 8, 8, 16, 16, 16, 16, 16, 32, 32, 32, 32, 32, 32, 32, 32, 32,
            ],
            height_factor: 1.0,
            amplitude_m: 4000.0,
            worker_threads: 0,
            max_pending_requests: 32,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            ratio_lod: 1.12,
            max_zoom: 17,
            degrade_zoom: 5,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            normal_maps_per_frame: 32,
        }
    }
}

impl Default for EllipsoidConfig {
    fn default() -> Self {
        Self {
            equatorial_radius_m: 6_378_137.0,
            polar_radius_m: 6_356_752.314_245,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: 240,
            lon: 86.925,
            lat: 27.988,
            start_altitude_m: 20_000_000.0,
            end_altitude_m: 10_000.0,
            fov_deg: 45.0,
            use_gpu: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logging: true,
        }
    }
}

impl TerrainConfig {
    /// First grid size that is not a nonzero power of two.
    pub fn invalid_grid(&self) -> Option<(&'static str, u32)> {
        std::iter::once(("file_grid_size", self.file_grid_size))
            .chain(
                self.grid_size_by_zoom
                    .iter()
                    .map(|&grid| ("grid_size_by_zoom", grid)),
            )
            .find(|&(_, grid)| !grid.is_power_of_two())
    }
}

// --- Load / Save / Reload ---

/// File name of the persisted config inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some((field, value)) = config.terrain.invalid_grid() {
        return Err(ConfigError::InvalidGrid {
            path: path.to_path_buf(),
            field,
            value,
        });
    }
    Ok(config)
}

impl Config {
    /// Load `config.ron` from `config_dir`, writing the defaults there first
    /// when it does not exist.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }
        let config = read_config(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write this config to `config_dir/config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let write_error = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_error)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(&path, serialized).map_err(write_error)
    }

    /// Re-read the file. `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Config reloaded with changes");
        Ok(Some(fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("file_grid_size: 32"));
        assert!(ron_str.contains("ratio_lod: 1.12"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(terrain: (seed: 7), lod: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.terrain.seed, 7);
        assert_eq!(config.terrain.file_grid_size, 32);
        assert_eq!(config.lighting, LightingConfig::default());
        assert_eq!(config.lod.degrade_zoom, 5);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.seed = 1234;
        config.lod.max_zoom = 12;
        config.lighting.enabled = false;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.lod.ratio_lod = 2.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().lod.ratio_lod, 2.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_default_grids_are_valid() {
        assert_eq!(TerrainConfig::default().invalid_grid(), None);
    }

    #[test]
    fn test_grid_that_is_not_a_power_of_two_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.grid_size_by_zoom = vec![64, 32, 6];
        config.save(dir.path()).unwrap();

        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidGrid {
                field: "grid_size_by_zoom",
                value: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_file_grid_rejected_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut broken = config.clone();
        broken.terrain.file_grid_size = 0;
        broken.save(dir.path()).unwrap();

        let err = config.reload(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidGrid {
                field: "file_grid_size",
                value: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.ron"));
    }
}
