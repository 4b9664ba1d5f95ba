//! Segment error types.

use crate::tree::NodeId;

/// Errors raised while applying data to a segment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    /// A non-empty elevation payload did not match the provider grid.
    #[error("expected {expected} elevation samples, got {actual}")]
    ElevationCount { expected: usize, actual: usize },

    /// The base mesh does not have the resolution the resampler needs.
    #[error("base mesh has grid {actual}, resampling needs {expected}")]
    GridMismatch { expected: u32, actual: u32 },

    /// Neither grid divides the other, or one of them is empty.
    #[error("cannot resample a {file_grid_size}-cell grid onto {grid_size} cells")]
    UnsupportedGrid { file_grid_size: u32, grid_size: u32 },
}

/// Errors raised by quadtree structure edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {0:?} no longer exists")]
    StaleNode(NodeId),

    #[error("node {0:?} is already subdivided")]
    AlreadySubdivided(NodeId),

    #[error("tile at zoom {0} cannot be subdivided further")]
    ZoomLimit(u8),
}
