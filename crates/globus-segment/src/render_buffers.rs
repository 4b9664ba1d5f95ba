//! GPU buffer management for segments.
//!
//! Texture coordinates and the plain grid index buffer depend only on the grid
//! size, so they are built once per size and shared. A segment whose edges meet
//! coarser neighbors gets its own stitched index buffer: edge vertices are
//! snapped onto the coarser side's grid so the shared edge has no T-junctions.

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::gpu::{BufferHandle, GpuBackend};
use crate::plain::grid_index;
use crate::quad::Side;

/// An index buffer ready to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexBinding {
    pub handle: BufferHandle,
    pub count: u32,
    /// True for the cache-owned buffer shared by every segment of that grid size.
    pub shared: bool,
}

/// Triangle-list indexes for a full `grid_size` grid.
pub fn grid_indexes(grid_size: u32) -> Vec<u32> {
    stitched_indexes(grid_size, [grid_size; 4])
}

/// Triangle-list indexes for a `grid_size` grid whose edges present
/// `side_sizes` cells (indexed by [`Side`]).
///
/// An edge with fewer cells than the grid has its vertices floor-snapped onto
/// the coarser stride; triangles that collapse are dropped.
pub fn stitched_indexes(grid_size: u32, side_sizes: [u32; 4]) -> Vec<u32> {
    let g = grid_size.max(1);
    let step = |side: Side| {
        let s = side_sizes[side.index()];
        if s == 0 || s >= g { 1 } else { g / s }
    };
    let (sn, se, ss, sw) = (
        step(Side::North),
        step(Side::East),
        step(Side::South),
        step(Side::West),
    );

    let snap = |i: u32, j: u32| -> u32 {
        let (i, j) = if i == 0 {
            (0, j / sn * sn)
        } else if i == g {
            (g, j / ss * ss)
        } else if j == 0 {
            (i / sw * sw, 0)
        } else if j == g {
            (i / se * se, g)
        } else {
            (i, j)
        };
        grid_index(g, i, j) as u32
    };

    let mut out = Vec::with_capacity((g * g * 6) as usize);
    for i in 0..g {
        for j in 0..g {
            let a = snap(i, j);
            let b = snap(i, j + 1);
            let c = snap(i + 1, j);
            let d = snap(i + 1, j + 1);
            for tri in [[a, c, b], [b, c, d]] {
                if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                    out.extend_from_slice(&tri);
                }
            }
        }
    }
    out
}

/// Per-vertex `(u, v)` for a `grid_size` grid: `u` runs east, `v` runs south.
pub fn texture_coords(grid_size: u32) -> Vec<f32> {
    let g = grid_size.max(1);
    let mut out = Vec::with_capacity(((g + 1) * (g + 1) * 2) as usize);
    for i in 0..=g {
        for j in 0..=g {
            out.push(j as f32 / g as f32);
            out.push(i as f32 / g as f32);
        }
    }
    out
}

#[derive(Clone, Copy, Debug)]
struct SharedBuffer {
    handle: BufferHandle,
    count: u32,
}

/// Process-wide tables keyed by grid size.
#[derive(Debug, Default)]
pub struct RenderCache {
    texcoords: FxHashMap<u32, Vec<f32>>,
    indexes: FxHashMap<u32, SharedBuffer>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texture coordinates for `grid_size`, built on first use.
    pub fn texture_coords(&mut self, grid_size: u32) -> &[f32] {
        self.texcoords
            .entry(grid_size)
            .or_insert_with(|| texture_coords(grid_size))
    }

    /// The shared full-grid index buffer for `grid_size`, uploaded on first use.
    pub fn shared_index_buffer(&mut self, gpu: &mut dyn GpuBackend, grid_size: u32) -> IndexBinding {
        let shared = *self.indexes.entry(grid_size).or_insert_with(|| {
            let indexes = grid_indexes(grid_size);
            SharedBuffer {
                handle: gpu.create_element_buffer(&indexes),
                count: indexes.len() as u32,
            }
        });
        IndexBinding {
            handle: shared.handle,
            count: shared.count,
            shared: true,
        }
    }

    /// Number of shared index buffers uploaded.
    pub fn shared_index_buffers(&self) -> usize {
        self.indexes.len()
    }

    /// Release every shared buffer.
    pub fn release(&mut self, gpu: &mut dyn GpuBackend) {
        for (_, shared) in self.indexes.drain() {
            gpu.delete_buffer(shared.handle);
        }
        self.texcoords.clear();
    }
}

/// Buffers owned by one segment.
#[derive(Debug, Default)]
pub struct SegmentBuffers {
    position: Option<BufferHandle>,
    texcoord: Option<BufferHandle>,
    index: Option<(BufferHandle, u32)>,
    /// Side sizes the owned index buffer was built for.
    index_sides: [u32; 4],
    grid_size: u32,
}

impl SegmentBuffers {
    /// Upload positions and texture coordinates for a `grid_size` mesh,
    /// releasing whatever was there before.
    pub fn create_coords_buffers(
        &mut self,
        gpu: &mut dyn GpuBackend,
        cache: &mut RenderCache,
        vertices: &[DVec3],
        grid_size: u32,
    ) {
        self.delete(gpu);
        let positions: Vec<f32> = vertices
            .iter()
            .flat_map(|v| [v.x as f32, v.y as f32, v.z as f32])
            .collect();
        self.position = Some(gpu.create_array_buffer(&positions, 3));
        self.texcoord = Some(gpu.create_array_buffer(cache.texture_coords(grid_size), 2));
        self.grid_size = grid_size;
    }

    /// Choose the index buffer for the current side sizes.
    ///
    /// When every side presents the full grid the shared buffer is used.
    /// Otherwise a stitched buffer is built and kept until the side sizes change.
    pub fn select_index_buffer(
        &mut self,
        gpu: &mut dyn GpuBackend,
        cache: &mut RenderCache,
        side_sizes: [u32; 4],
    ) -> Option<IndexBinding> {
        self.position?;
        let g = self.grid_size;
        let all = side_sizes.iter().fold(u32::MAX, |acc, &s| acc & s);
        if all != 0 && side_sizes.iter().all(|&s| s == g) {
            return Some(cache.shared_index_buffer(gpu, g));
        }

        let sides = side_sizes.map(|s| if s == 0 { g } else { s.min(g) });
        match self.index {
            Some((handle, count)) if self.index_sides == sides => Some(IndexBinding {
                handle,
                count,
                shared: false,
            }),
            previous => {
                if let Some((handle, _)) = previous {
                    gpu.delete_buffer(handle);
                }
                let indexes = stitched_indexes(g, sides);
                let handle = gpu.create_element_buffer(&indexes);
                let count = indexes.len() as u32;
                self.index = Some((handle, count));
                self.index_sides = sides;
                Some(IndexBinding {
                    handle,
                    count,
                    shared: false,
                })
            }
        }
    }

    pub fn position(&self) -> Option<BufferHandle> {
        self.position
    }

    pub fn texcoord(&self) -> Option<BufferHandle> {
        self.texcoord
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
    }

    /// Release every owned buffer.
    pub fn delete(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(h) = self.position.take() {
            gpu.delete_buffer(h);
        }
        if let Some(h) = self.texcoord.take() {
            gpu.delete_buffer(h);
        }
        if let Some((h, _)) = self.index.take() {
            gpu.delete_buffer(h);
        }
        self.index_sides = [0; 4];
        self.grid_size = 0;
    }
}
