//! wgpu implementation of the segment core's buffer and normal-map texture
//! service.

mod backend;
mod mip;

pub use backend::{BackendError, NormalMapTexture, WgpuBackend};
pub use mip::{mip_chain, mip_level_count};
