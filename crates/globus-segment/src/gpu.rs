//! The GPU buffer and texture service the segment core draws through, and an
//! in-memory implementation.

use glam::DVec3;
use rustc_hash::FxHashMap;

/// Opaque handle to a vertex or index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Opaque handle to a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Square RGBA8 image, row-major from the north-west texel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalMapImage {
    /// Texels per side.
    pub size: u32,
    pub pixels: Vec<u8>,
}

impl NormalMapImage {
    /// A single fully transparent texel.
    pub fn transparent() -> Self {
        Self {
            size: 1,
            pixels: vec![0; 4],
        }
    }

    /// Encode a normal-map mesh: one texel per vertex of a `size`-cell grid.
    /// Each accumulated normal is normalized and mapped from `[-1, 1]` to
    /// `[0, 255]`; alpha is opaque.
    pub fn from_normals(normals: &[DVec3], grid_size: u32) -> Self {
        let side = grid_size + 1;
        let mut pixels = Vec::with_capacity(normals.len() * 4);
        for n in normals {
            let n = n.normalize_or_zero() * 0.5 + DVec3::splat(0.5);
            pixels.push(encode_unit(n.x));
            pixels.push(encode_unit(n.y));
            pixels.push(encode_unit(n.z));
            pixels.push(255);
        }
        Self { size: side, pixels }
    }

    /// RGBA of texel `(row, column)`.
    pub fn texel(&self, row: u32, column: u32) -> Option<[u8; 4]> {
        let k = ((row * self.size + column) * 4) as usize;
        let px = self.pixels.get(k..k + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[inline]
fn encode_unit(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Buffer and texture service.
///
/// Handles are owned by whoever created them and must be released explicitly.
pub trait GpuBackend {
    /// Upload vertex attributes: `data.len() / item_size` items of `item_size` floats.
    fn create_array_buffer(&mut self, data: &[f32], item_size: u32) -> BufferHandle;

    /// Upload a triangle-list index buffer.
    fn create_element_buffer(&mut self, indexes: &[u32]) -> BufferHandle;

    fn delete_buffer(&mut self, handle: BufferHandle);

    /// Upload an image with a full mip chain.
    fn create_texture_mm(&mut self, image: &NormalMapImage) -> TextureHandle;

    fn delete_texture(&mut self, handle: TextureHandle);
}

/// What a [`HeadlessBackend`] remembers about a live buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum BufferRecord {
    Array { item_size: u32, items: usize },
    Element { indexes: usize },
}

/// In-memory backend: hands out handles and tracks what is alive.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    buffers: FxHashMap<BufferHandle, BufferRecord>,
    textures: FxHashMap<TextureHandle, u32>,
    /// Element buffers created over the backend's lifetime.
    pub element_buffers_created: usize,
    /// Textures created over the backend's lifetime.
    pub textures_created: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferRecord> {
        self.buffers.get(&handle)
    }

    /// Texels per side of a live texture.
    pub fn texture_size(&self, handle: TextureHandle) -> Option<u32> {
        self.textures.get(&handle).copied()
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_array_buffer(&mut self, data: &[f32], item_size: u32) -> BufferHandle {
        let handle = BufferHandle(self.next());
        let items = data.len() / item_size.max(1) as usize;
        self.buffers
            .insert(handle, BufferRecord::Array { item_size, items });
        handle
    }

    fn create_element_buffer(&mut self, indexes: &[u32]) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers.insert(
            handle,
            BufferRecord::Element {
                indexes: indexes.len(),
            },
        );
        self.element_buffers_created += 1;
        handle
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(&handle).is_none() {
            tracing::warn!("Deleting unknown buffer {handle:?}");
        }
    }

    fn create_texture_mm(&mut self, image: &NormalMapImage) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, image.size);
        self.textures_created += 1;
        handle
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_none() {
            tracing::warn!("Deleting unknown texture {handle:?}");
        }
    }
}
