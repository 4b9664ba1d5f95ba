//! Planet terrain segments: Web-Mercator quadtree tiles with plain and
//! elevated geometry, seam-equalized normal maps, render buffers and
//! bounding volumes, driven per frame by [`Planet`].

mod camera;
mod error;
mod gpu;
mod plain;
mod planet;
mod quad;
mod queue;
mod render_buffers;
mod resample;
mod seam;
mod segment;
mod settings;
mod tree;

pub use camera::Camera;
pub use error::{SegmentError, TreeError};
pub use gpu::{BufferHandle, BufferRecord, GpuBackend, HeadlessBackend, NormalMapImage, TextureHandle};
pub use plain::{NormalMapMesh, PlainGeometry, build_plain_geometry, grid_index, vertex_count};
pub use planet::{DrawItem, FrameStats, Planet};
pub use quad::{Quadrant, Side};
pub use queue::SegmentQueue;
pub use render_buffers::{
    IndexBinding, RenderCache, SegmentBuffers, grid_indexes, stitched_indexes, texture_coords,
};
pub use resample::{ResamplePolicy, ResampledTerrain, degrade_to_3x3, resample};
pub use seam::{BakeOutcome, EdgeOutcome, MergeToken, SeamEqualizer, SeamLedger, fold_equal, fold_finer};
pub use segment::{FULL_TEXTURE_BIAS, Segment, TerrainApplied, TerrainLoad};
pub use settings::{DEGRADE_ZOOM, PlanetSettings, RATIO_LOD};
pub use tree::{MAX_TREE_ZOOM, Node, NodeId, QuadTree};
