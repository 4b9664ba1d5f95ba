//! Tile addressing and the messages exchanged with a terrain provider.

use globus_math::Extent;

/// XYZ tile address in the Web-Mercator quadtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// The projected rectangle covered by this tile.
    pub fn extent(&self) -> Extent {
        Extent::from_tile(self.zoom, self.x, self.y)
    }
}

/// Identifies one outstanding request. Responses carry the ticket back so the
/// caller can discard answers for tiles that no longer exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// A request for the height samples of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainRequest {
    pub ticket: Ticket,
    pub key: TileKey,
    pub extent: Extent,
}

/// Height samples for one tile.
///
/// `elevations` holds `(file_grid_size + 1)^2` samples, row-major from the
/// north-west corner. An empty vector means the provider has no data for the tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainResponse {
    pub ticket: Ticket,
    pub key: TileKey,
    pub elevations: Vec<f32>,
}

/// Static description of a provider's data.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainMetadata {
    /// Native sample grid: each tile has `file_grid_size + 1` samples per side.
    pub file_grid_size: u32,
    /// Shallowest zoom with data. Shallower tiles render the plain ellipsoid.
    pub min_zoom: u8,
    /// Deepest zoom with data.
    pub max_zoom: u8,
    /// Nominal render grid size per zoom.
    pub grid_size_by_zoom: Vec<u32>,
}

impl TerrainMetadata {
    /// Nominal render grid size at `zoom`. Zooms past the table use its last
    /// entry; an empty table falls back to the native grid.
    pub fn grid_size(&self, zoom: u8) -> u32 {
        self.grid_size_by_zoom
            .get(usize::from(zoom))
            .or_else(|| self.grid_size_by_zoom.last())
            .copied()
            .unwrap_or(self.file_grid_size)
            .max(1)
    }

    /// Number of samples a complete tile payload carries.
    pub fn samples_per_tile(&self) -> usize {
        let side = self.file_grid_size as usize + 1;
        side * side
    }

    /// Returns true if `zoom` lies in `[min_zoom, max_zoom]`.
    pub fn has_zoom(&self, zoom: u8) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }
}
