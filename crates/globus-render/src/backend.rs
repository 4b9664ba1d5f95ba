//! GPU buffers and normal-map textures on a wgpu device.

use globus_segment::{BufferHandle, GpuBackend, NormalMapImage, TextureHandle};
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::mip::mip_chain;

/// Error type for backend initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// A normal-map texture with its default view.
pub struct NormalMapTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: u32,
}

/// [`GpuBackend`] over a wgpu device and queue.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,
    buffers: FxHashMap<BufferHandle, wgpu::Buffer>,
    textures: FxHashMap<TextureHandle, NormalMapTexture>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
        }
    }

    /// Open the default adapter without a surface.
    pub async fn request() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| BackendError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("globus-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self::new(device, queue))
    }

    /// [`WgpuBackend::request`] driven to completion with `pollster`.
    pub fn request_blocking() -> Result<Self, BackendError> {
        pollster::block_on(Self::request())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&NormalMapTexture> {
        self.textures.get(&handle)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for WgpuBackend {
    fn create_array_buffer(&mut self, data: &[f32], item_size: u32) -> BufferHandle {
        let handle = BufferHandle(self.next());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(if item_size == 3 {
                    "segment-positions"
                } else {
                    "segment-texcoords"
                }),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        self.buffers.insert(handle, buffer);
        handle
    }

    fn create_element_buffer(&mut self, indexes: &[u32]) -> BufferHandle {
        let handle = BufferHandle(self.next());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("segment-indexes"),
                contents: bytemuck::cast_slice(indexes),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            });
        self.buffers.insert(handle, buffer);
        handle
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        match self.buffers.remove(&handle) {
            Some(buffer) => buffer.destroy(),
            None => log::warn!("Deleting unknown buffer {handle:?}"),
        }
    }

    fn create_texture_mm(&mut self, image: &NormalMapImage) -> TextureHandle {
        let handle = TextureHandle(self.next());
        let chain = mip_chain(image);
        let size = image.size.max(1);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("segment-normal-map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: chain.len().max(1) as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, mip) in chain.iter().enumerate() {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &mip.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(mip.size * 4),
                    rows_per_image: None,
                },
                wgpu::Extent3d {
                    width: mip.size,
                    height: mip.size,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(
            handle,
            NormalMapTexture {
                texture,
                view,
                size,
            },
        );
        handle
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        match self.textures.remove(&handle) {
            Some(entry) => entry.texture.destroy(),
            None => log::warn!("Deleting unknown texture {handle:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_backend() -> Option<WgpuBackend> {
        WgpuBackend::request_blocking().ok()
    }

    #[test]
    fn test_buffers_are_tracked_and_released() {
        let Some(mut gpu) = create_test_backend() else {
            return;
        };
        let positions = gpu.create_array_buffer(&[0.0; 27], 3);
        let indexes = gpu.create_element_buffer(&[0, 1, 2, 1, 3, 2]);
        assert_ne!(positions, indexes);
        assert_eq!(gpu.live_buffers(), 2);
        assert_eq!(gpu.buffer(positions).map(|b| b.size()), Some(27 * 4));

        gpu.delete_buffer(positions);
        gpu.delete_buffer(indexes);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn test_normal_map_has_full_mip_chain() {
        let Some(mut gpu) = create_test_backend() else {
            return;
        };
        let image = NormalMapImage {
            size: 33,
            pixels: [128, 128, 255, 255].repeat(33 * 33),
        };
        let handle = gpu.create_texture_mm(&image);
        let entry = gpu.texture(handle).unwrap();
        assert_eq!(entry.size, 33);
        assert_eq!(entry.texture.mip_level_count(), 6);

        gpu.delete_texture(handle);
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn test_placeholder_texture_is_single_texel() {
        let Some(mut gpu) = create_test_backend() else {
            return;
        };
        let handle = gpu.create_texture_mm(&NormalMapImage::transparent());
        let entry = gpu.texture(handle).unwrap();
        assert_eq!(entry.texture.mip_level_count(), 1);
        assert_eq!(entry.texture.width(), 1);
    }
}
