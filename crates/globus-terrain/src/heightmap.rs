//! Multi-octave fractal Brownian motion (fBm) height field over the unit sphere.
//!
//! Sampling on the sphere rather than in projected space keeps the field
//! continuous across tile borders and the antimeridian.

use glam::DVec3;
use globus_math::LonLat;
use noise::{NoiseFn, Simplex};

/// Configuration for the fBm height field.
#[derive(Clone, Debug)]
pub struct HeightmapParams {
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Frequency of the first octave in cycles per unit-sphere radius.
    pub base_frequency: f64,
    /// Amplitude of the first octave in meters.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 8,
            lacunarity: 2.0,
            persistence: 0.5,
            amplitude: 4000.0,
            base_frequency: 1.5,
        }
    }
}

/// Generates heights by fractal Brownian motion over simplex noise.
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        let noise = Simplex::new(params.seed as u32);
        Self { noise, params }
    }

    /// Height in meters at a direction from the planet center.
    ///
    /// `direction` is expected to be unit length; the theoretical range is
    /// `[-max_amplitude, +max_amplitude]`.
    pub fn sample(&self, direction: DVec3) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            let p = direction * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Height at a geodetic coordinate, sampled on the unit sphere.
    pub fn sample_lonlat(&self, ll: LonLat) -> f64 {
        let (sin_lat, cos_lat) = ll.lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = ll.lon.to_radians().sin_cos();
        self.sample(DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat))
    }

    /// Geometric sum of all octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }

    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }
}
