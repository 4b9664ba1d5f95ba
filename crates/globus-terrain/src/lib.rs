//! Terrain elevation sources: the provider contract the segment core consumes,
//! a procedural fBm height field, and background and synchronous providers.

mod heightmap;
mod noise_provider;
mod provider;
mod tile;

pub use heightmap::{HeightmapParams, HeightmapSampler};
pub use noise_provider::{NoiseTerrainProvider, generate_tile_sync};
pub use provider::{SyncTerrainProvider, TerrainProvider};
pub use tile::{TerrainMetadata, TerrainRequest, TerrainResponse, Ticket, TileKey};
