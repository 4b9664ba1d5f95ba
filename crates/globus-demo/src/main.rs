//! Demo binary that flies a camera from orbit down to a mountain range and
//! logs how the terrain quadtree responds.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p globus-demo -- --frames 600 --gpu true`.

use std::time::{Duration, Instant};

use clap::Parser;
use globus_config::{CliArgs, Config, default_config_dir};
use globus_math::LonLat;
use globus_render::WgpuBackend;
use globus_segment::{Camera, GpuBackend, HeadlessBackend, Planet, PlanetSettings};
use globus_terrain::{HeightmapParams, NoiseTerrainProvider, TerrainMetadata};
use tracing::info;

const FRAME_TIME: Duration = Duration::from_millis(16);

fn terrain_metadata(config: &Config) -> TerrainMetadata {
    TerrainMetadata {
        file_grid_size: config.terrain.file_grid_size,
        min_zoom: config.terrain.min_zoom,
        max_zoom: config.terrain.max_zoom,
        grid_size_by_zoom: config.terrain.grid_size_by_zoom.clone(),
    }
}

fn heightmap_params(config: &Config) -> HeightmapParams {
    HeightmapParams {
        seed: config.terrain.seed,
        amplitude: config.terrain.amplitude_m,
        ..HeightmapParams::default()
    }
}

/// Camera altitude for `frame`, falling geometrically from the start to the
/// end altitude.
fn altitude_at(config: &Config, frame: u32) -> f64 {
    let start = config.demo.start_altitude_m.max(1.0);
    let end = config.demo.end_altitude_m.max(1.0);
    let t = if config.demo.frames > 1 {
        f64::from(frame) / f64::from(config.demo.frames - 1)
    } else {
        1.0
    };
    start * (end / start).powf(t)
}

fn fly<G: GpuBackend>(config: &Config, provider: NoiseTerrainProvider, gpu: G) -> G {
    let settings = PlanetSettings::from(config);
    let ellipsoid = settings.ellipsoid;
    let target = LonLat::new(config.demo.lon, config.demo.lat);
    let mut planet = Planet::new(provider, gpu, settings);
    let started = Instant::now();

    for frame in 0..config.demo.frames {
        let altitude = altitude_at(config, frame);
        let camera = Camera::above(&ellipsoid, target, altitude, config.demo.fov_deg);
        let items = planet.frame(&camera);
        let stats = planet.last_stats();

        if frame % 30 == 0 || frame + 1 == config.demo.frames {
            let deepest = items.iter().map(|item| item.key.zoom).max().unwrap_or(0);
            info!(
                "frame {frame}: altitude {altitude:.0} m, {} tiles (deepest zoom {deepest}), {} nodes, {} requested, {} elevated, {} no data, {} baked, {} destroyed, {} pending",
                stats.rendered,
                planet.tree().len(),
                stats.requested,
                stats.elevated,
                stats.no_data,
                stats.baked,
                stats.destroyed,
                planet.pending_requests()
            );
        }
        std::thread::sleep(FRAME_TIME);
    }

    let eye = Camera::above(
        &ellipsoid,
        target,
        config.demo.end_altitude_m,
        config.demo.fov_deg,
    )
    .eye;
    match planet.earth_point(target, eye) {
        Some(point) => info!(
            "Surface under the camera: {point} ({:.1} m from the ellipsoid point)",
            point.distance(ellipsoid.lonlat_to_cartesian(target))
        ),
        None => info!("Camera ray missed the planet"),
    }
    info!(
        "Flew {} frames in {:.2?}",
        config.demo.frames,
        started.elapsed()
    );

    planet.into_gpu()
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    globus_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let metadata = terrain_metadata(&config);
    let params = heightmap_params(&config);
    let provider = match config.terrain.worker_threads {
        0 => NoiseTerrainProvider::with_defaults(metadata, params),
        threads => NoiseTerrainProvider::new(
            metadata,
            params,
            threads,
            config.terrain.max_pending_requests.max(1) * 2,
        ),
    };
    let provider = match provider {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to start terrain workers: {e}");
            std::process::exit(1);
        }
    };

    if config.demo.use_gpu {
        match WgpuBackend::request_blocking() {
            Ok(gpu) => {
                let gpu = fly(&config, provider, gpu);
                info!(
                    "GPU resources left after shutdown: {} buffers, {} textures",
                    gpu.live_buffers(),
                    gpu.live_textures()
                );
                return;
            }
            Err(e) => tracing::warn!("{e}; falling back to the in-memory backend"),
        }
    }

    let gpu = fly(&config, provider, HeadlessBackend::new());
    info!(
        "Resources left after shutdown: {} buffers, {} textures ({} textures created)",
        gpu.live_buffers(),
        gpu.live_textures(),
        gpu.textures_created
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_descends_from_start_to_end() {
        let config = Config::default();
        let first = altitude_at(&config, 0);
        let last = altitude_at(&config, config.demo.frames - 1);
        assert!((first - config.demo.start_altitude_m).abs() < 1e-6);
        assert!((last - config.demo.end_altitude_m).abs() < 1e-3);
        assert!(altitude_at(&config, 10) < first);
    }

    #[test]
    fn test_metadata_follows_config() {
        let config = Config::default();
        let meta = terrain_metadata(&config);
        assert_eq!(meta.file_grid_size, 32);
        assert_eq!(meta.grid_size(0), 64);
        assert_eq!(meta.grid_size(30), 32);
    }
}
