//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Globus command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "globus", about = "Planet terrain segment demo")]
pub struct CliArgs {
    /// Terrain seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Deepest quadtree zoom.
    #[arg(long)]
    pub max_zoom: Option<u8>,

    /// Frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Upload through wgpu instead of the in-memory backend.
    #[arg(long)]
    pub gpu: Option<bool>,

    /// Disable normal-map baking.
    #[arg(long)]
    pub no_lighting: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(z) = args.max_zoom {
            self.lod.max_zoom = z;
        }
        if let Some(frames) = args.frames {
            self.demo.frames = frames;
        }
        if let Some(gpu) = args.gpu {
            self.demo.use_gpu = gpu;
        }
        if args.no_lighting {
            self.lighting.enabled = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            seed: Some(99),
            max_zoom: Some(10),
            no_lighting: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.seed, 99);
        assert_eq!(config.lod.max_zoom, 10);
        assert!(!config.lighting.enabled);
        // Non-overridden fields retain defaults
        assert_eq!(config.demo.frames, 240);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args =
            CliArgs::try_parse_from(["globus", "--seed", "5", "--gpu", "true", "--no-lighting"])
                .unwrap();
        assert_eq!(args.seed, Some(5));
        assert_eq!(args.gpu, Some(true));
        assert!(args.no_lighting);
    }
}
