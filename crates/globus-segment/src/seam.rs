//! Cross-tile normal equalization.
//!
//! Normal-map normals are unnormalized face-normal sums. Along a shared edge
//! both tiles must end up with the same sums or the baked normal maps disagree
//! and the seam shows. Each edge pair is folded once: the [`SeamLedger`] tracks
//! which pairs are merged and hands out a [`MergeToken`] only for pairs that
//! are not.

use glam::DVec3;
use globus_terrain::TerrainMetadata;
use rustc_hash::FxHashSet;

use crate::gpu::{GpuBackend, TextureHandle};
use crate::plain::grid_index;
use crate::queue::SegmentQueue;
use crate::quad::Side;
use crate::tree::{NodeId, QuadTree};

/// Index of the `k`-th vertex along the `line` row (horizontal edges) or
/// column (vertical edges).
#[inline]
fn edge_index(size: u32, side: Side, line: u32, k: u32) -> usize {
    if side.is_vertical() {
        grid_index(size, k, line)
    } else {
        grid_index(size, line, k)
    }
}

/// Fold the `side` edge of `a` with the opposite edge of the equal-zoom tile
/// `b`. Both edges end up holding the sum. Not idempotent.
pub fn fold_equal(a: &mut [DVec3], b: &mut [DVec3], size: u32, side: Side) {
    let line_a = side.edge_line(size);
    let line_b = size - line_a;
    for k in 0..=size {
        let ia = edge_index(size, side, line_a, k);
        let ib = edge_index(size, side, line_b, k);
        a[ia] += b[ib];
        b[ib] = a[ia];
    }
}

/// Fold the `side` edge of the fine tile with the matching stretch of the
/// coarse tile `dz` zooms up. `local` is the fine tile's position along the
/// coarse edge in fine-tile units. Not idempotent.
pub fn fold_finer(
    fine: &mut [DVec3],
    coarse: &mut [DVec3],
    size: u32,
    side: Side,
    dz: u8,
    local: u32,
) {
    let line_a = side.edge_line(size);
    let line_b = size - line_a;
    for k in 0..=size {
        let kb = (local * size + k) >> dz;
        let ia = edge_index(size, side, line_a, k);
        let ib = edge_index(size, side, line_b, kb);
        fine[ia] += coarse[ib];
        coarse[ib] = fine[ia];
    }
}

/// Proof that a tile pair is unmerged. Consumed by [`SeamLedger::commit`].
#[derive(Debug)]
pub struct MergeToken {
    pair: (NodeId, NodeId),
}

#[inline]
fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Merge state of every tile pair.
#[derive(Debug, Default)]
pub struct SeamLedger {
    merged: FxHashSet<(NodeId, NodeId)>,
}

impl SeamLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token for merging `a` with `b`, or `None` if they are already merged.
    pub fn claim(&self, a: NodeId, b: NodeId) -> Option<MergeToken> {
        let pair = pair_key(a, b);
        (!self.merged.contains(&pair)).then_some(MergeToken { pair })
    }

    /// Record the merge the token was claimed for.
    pub fn commit(&mut self, token: MergeToken) {
        self.merged.insert(token.pair);
    }

    pub fn is_merged(&self, a: NodeId, b: NodeId) -> bool {
        self.merged.contains(&pair_key(a, b))
    }

    /// Return every pair involving `id` to the unmerged state.
    pub fn forget(&mut self, id: NodeId) {
        self.merged.retain(|&(a, b)| a != id && b != id);
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    pub fn clear(&mut self) {
        self.merged.clear();
    }
}

/// Result of equalizing one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeOutcome {
    NoNeighbor,
    /// The neighbor has no elevation data yet (or none at all).
    NeighborNotReady,
    /// The neighbor was queued to run its own pass first.
    Deferred,
    AlreadyMerged,
    Merged,
    /// This tile is coarser; the finer tiles along the edge were queued.
    DelegatedToFiner,
    /// The two normal-map meshes have different resolutions.
    SizeMismatch,
}

/// Result of a normal-map pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeOutcome {
    Baked(TextureHandle),
    /// A neighbor is still loading; the tile went back on the queue.
    Deferred,
    Skipped,
}

/// Runs the edge protocol over the quadtree, queueing tiles that must run
/// their own pass.
pub struct SeamEqualizer<'a> {
    pub tree: &'a mut QuadTree,
    pub queue: &'a mut SegmentQueue,
    pub ledger: &'a mut SeamLedger,
}

impl SeamEqualizer<'_> {
    /// Equalize the `side` edge of `id` with its current neighbor.
    pub fn equalize_edge(&mut self, id: NodeId, side: Side) -> EdgeOutcome {
        let Some(node) = self.tree.get(id) else {
            return EdgeOutcome::NoNeighbor;
        };
        let Some(n) = node.neighbors[side.index()] else {
            return EdgeOutcome::NoNeighbor;
        };
        let zoom = node.segment.zoom();
        let key = node.segment.key;
        let Some(ns) = self.tree.segment(n) else {
            return EdgeOutcome::NoNeighbor;
        };
        let n_zoom = ns.zoom();
        let n_key = ns.key;
        let n_ready = ns.terrain_ready && ns.terrain_exists;
        let n_applied = ns.applied_neighbors_zoom[side.opposite().index()];

        if let Some(segment) = self.tree.segment_mut(id) {
            segment.applied_neighbors_zoom[side.index()] = n_zoom;
        }

        if !n_ready {
            return EdgeOutcome::NeighborNotReady;
        }

        if !self.queue.contains(n) && zoom > n_applied {
            self.queue.queue(n);
            tracing::trace!("Seam {key:?} {side:?}: deferred to {n_key:?}");
            return EdgeOutcome::Deferred;
        }

        if zoom < n_zoom {
            let dz = n_zoom - zoom;
            let across = globus_terrain::TileKey::new(zoom, n_key.x >> dz, n_key.y >> dz);
            let finer = match self.tree.find(across) {
                Some(top) => self.tree.leaves_along_edge(top, side.opposite()),
                None => vec![n],
            };
            for leaf in finer {
                self.queue.queue(leaf);
            }
            return EdgeOutcome::DelegatedToFiner;
        }

        let Some(token) = self.ledger.claim(id, n) else {
            return EdgeOutcome::AlreadyMerged;
        };
        let Some((a, b)) = self.tree.pair_mut(id, n) else {
            return EdgeOutcome::NoNeighbor;
        };
        let size = a.segment.normal_map.size;
        if size != b.segment.normal_map.size
            || !a.segment.normal_map.is_complete()
            || !b.segment.normal_map.is_complete()
        {
            tracing::trace!(
                "Seam {key:?} {side:?}: normal map {size} vs {}",
                b.segment.normal_map.size
            );
            return EdgeOutcome::SizeMismatch;
        }

        let fine = &mut a.segment.normal_map.normals;
        let coarse = &mut b.segment.normal_map.normals;
        if zoom == n_zoom {
            fold_equal(fine, coarse, size, side);
        } else {
            let dz = zoom - n_zoom;
            let local = if side.is_vertical() {
                key.y - (n_key.y << dz)
            } else {
                key.x - (n_key.x << dz)
            };
            fold_finer(fine, coarse, size, side, dz, local);
        }
        let rebake = b.segment.normal_map_ready;
        self.ledger.commit(token);

        if rebake {
            self.queue.queue(n);
        }
        tracing::trace!("Seam {key:?} {side:?}: merged with {n_key:?}");
        EdgeOutcome::Merged
    }

    /// Equalize all four edges and bake the tile's normal map.
    pub fn create_normal_map_texture(
        &mut self,
        id: NodeId,
        metadata: &TerrainMetadata,
        gpu: &mut dyn GpuBackend,
    ) -> BakeOutcome {
        let Some(node) = self.tree.get(id) else {
            return BakeOutcome::Skipped;
        };
        let segment = &node.segment;
        if segment.zoom() > metadata.max_zoom
            || !segment.terrain_ready
            || !segment.normal_map.is_complete()
        {
            return BakeOutcome::Skipped;
        }

        if segment.zoom() > metadata.min_zoom {
            let loading = node.neighbors.iter().flatten().any(|&n| {
                self.tree
                    .segment(n)
                    .is_some_and(|neighbor| neighbor.terrain_is_loading)
            });
            if loading {
                self.queue.queue(id);
                return BakeOutcome::Deferred;
            }
        }

        for side in [Side::North, Side::South, Side::West, Side::East] {
            self.equalize_edge(id, side);
        }

        match self.tree.segment_mut(id) {
            Some(segment) => BakeOutcome::Baked(segment.bake_normal_map(gpu)),
            None => BakeOutcome::Skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{HeadlessBackend, NormalMapImage};
    use crate::segment::Segment;
    use crate::settings::PlanetSettings;
    use globus_math::{Ellipsoid, Extent};

    fn metadata() -> TerrainMetadata {
        TerrainMetadata {
            file_grid_size: 4,
            min_zoom: 0,
            max_zoom: 10,
            grid_size_by_zoom: vec![4],
        }
    }

    fn id(index: u32) -> NodeId {
        NodeId {
            index,
            generation: 0,
        }
    }

    fn grid(size: u32, value: f64) -> Vec<DVec3> {
        vec![DVec3::splat(value); ((size + 1) * (size + 1)) as usize]
    }

    struct Fixture {
        tree: QuadTree,
        queue: SegmentQueue,
        ledger: SeamLedger,
        gpu: HeadlessBackend,
        children: [NodeId; 4],
    }

    impl Fixture {
        fn new() -> Self {
            let e = Ellipsoid::wgs84();
            let mut tree = QuadTree::new();
            let root = tree.insert_root(Segment::new(0, Extent::from_tile(0, 0, 0), &e));
            let children = tree.subdivide(root, &e).unwrap();
            Self {
                tree,
                queue: SegmentQueue::new(),
                ledger: SeamLedger::new(),
                gpu: HeadlessBackend::new(),
                children,
            }
        }

        fn elevate(&mut self, node: NodeId, height: f32) {
            let e = Ellipsoid::wgs84();
            let placeholder = self.gpu.create_texture_mm(&NormalMapImage::transparent());
            let segment = self.tree.segment_mut(node).unwrap();
            segment.create_plain_vertices(&metadata(), &e, placeholder);
            segment.load_terrain(&metadata(), &mut self.gpu);
            segment
                .apply_terrain(&[height; 25], &metadata(), &PlanetSettings::default(), &mut self.gpu)
                .unwrap();
        }

        fn refresh(&mut self) {
            let ids: Vec<NodeId> = self.tree.ids().collect();
            for id in ids {
                self.tree.refresh_neighbors(id);
            }
        }

        fn equalizer(&mut self) -> SeamEqualizer<'_> {
            SeamEqualizer {
                tree: &mut self.tree,
                queue: &mut self.queue,
                ledger: &mut self.ledger,
            }
        }
    }

    #[test]
    fn test_fold_equal_sums_edge() {
        let mut a = grid(2, 1.0);
        let mut b = grid(2, 2.0);
        fold_equal(&mut a, &mut b, 2, Side::East);
        for k in 0..=2 {
            assert_eq!(a[grid_index(2, k, 2)], DVec3::splat(3.0));
            assert_eq!(b[grid_index(2, k, 0)], DVec3::splat(3.0));
            assert_eq!(a[grid_index(2, k, 0)], DVec3::splat(1.0));
        }
    }

    #[test]
    fn test_fold_twice_double_counts() {
        let mut once_a = grid(2, 1.0);
        let mut once_b = grid(2, 2.0);
        fold_equal(&mut once_a, &mut once_b, 2, Side::North);

        let mut twice_a = grid(2, 1.0);
        let mut twice_b = grid(2, 2.0);
        fold_equal(&mut twice_a, &mut twice_b, 2, Side::North);
        fold_equal(&mut twice_a, &mut twice_b, 2, Side::North);

        assert_eq!(once_a[1], DVec3::splat(3.0));
        assert_ne!(once_a, twice_a);
    }

    #[test]
    fn test_fold_finer_maps_half_edge() {
        let size = 4;
        let mut fine = grid(size, 1.0);
        let mut coarse = grid(size, 0.0);
        // Fine tile is the second half of the coarse tile's west edge.
        fold_finer(&mut fine, &mut coarse, size, Side::East, 1, 1);
        // Two fine samples share each coarse sample, so the odd one picks up
        // what the even one just wrote there.
        let fine_edge: Vec<f64> = (0..=size)
            .map(|k| fine[grid_index(size, k, size)].x)
            .collect();
        assert_eq!(fine_edge, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        let coarse_edge: Vec<f64> = (0..=size)
            .map(|row| coarse[grid_index(size, row, 0)].x)
            .collect();
        assert_eq!(coarse_edge, vec![0.0, 0.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_ledger_claim_commit_forget() {
        let mut ledger = SeamLedger::new();
        let token = ledger.claim(id(2), id(1)).unwrap();
        assert!(!ledger.is_merged(id(1), id(2)));
        ledger.commit(token);
        assert!(ledger.is_merged(id(1), id(2)));
        assert!(ledger.claim(id(1), id(2)).is_none());
        ledger.forget(id(2));
        assert!(ledger.is_empty());
        assert!(ledger.claim(id(1), id(2)).is_some());
    }

    #[test]
    fn test_equalize_merges_exactly_once() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        f.elevate(nw, 10.0);
        f.elevate(ne, 10.0);
        f.refresh();
        f.tree.segment_mut(ne).unwrap().applied_neighbors_zoom[Side::West.index()] = 1;

        let before_nw = f.tree.segment(nw).unwrap().normal_map.normals.clone();
        let before_ne = f.tree.segment(ne).unwrap().normal_map.normals.clone();

        assert_eq!(f.equalizer().equalize_edge(nw, Side::East), EdgeOutcome::Merged);
        assert_eq!(f.equalizer().equalize_edge(nw, Side::East), EdgeOutcome::AlreadyMerged);
        assert_eq!(f.equalizer().equalize_edge(ne, Side::West), EdgeOutcome::AlreadyMerged);

        let a = &f.tree.segment(nw).unwrap().normal_map.normals;
        let b = &f.tree.segment(ne).unwrap().normal_map.normals;
        for k in 0..=4 {
            let ia = grid_index(4, k, 4);
            let ib = grid_index(4, k, 0);
            let expect = before_nw[ia] + before_ne[ib];
            assert!((a[ia] - expect).length() < 1e-9);
            assert_eq!(a[ia], b[ib]);
        }
        assert_eq!(f.tree.segment(nw).unwrap().applied_neighbors_zoom[Side::East.index()], 1);
    }

    #[test]
    fn test_stale_neighbor_state_defers() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        f.elevate(nw, 0.0);
        f.elevate(ne, 0.0);
        f.refresh();
        assert_eq!(f.equalizer().equalize_edge(nw, Side::East), EdgeOutcome::Deferred);
        assert!(f.queue.contains(ne));
        // Already queued: the pair merges now.
        assert_eq!(f.equalizer().equalize_edge(nw, Side::East), EdgeOutcome::Merged);
    }

    #[test]
    fn test_neighbor_without_terrain_is_skipped() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        f.elevate(nw, 0.0);
        f.refresh();
        assert_eq!(
            f.equalizer().equalize_edge(nw, Side::East),
            EdgeOutcome::NeighborNotReady
        );
        assert_eq!(f.equalizer().equalize_edge(nw, Side::North), EdgeOutcome::NoNeighbor);
        assert!(!f.queue.contains(ne));
    }

    #[test]
    fn test_coarse_tile_queues_finer_edge_tiles() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        let e = Ellipsoid::wgs84();
        let fine = f.tree.subdivide(ne, &e).unwrap();
        f.elevate(nw, 0.0);
        for &c in &fine {
            f.elevate(c, 0.0);
        }
        f.refresh();
        f.queue.queue(fine[0]);

        assert_eq!(
            f.equalizer().equalize_edge(nw, Side::East),
            EdgeOutcome::DelegatedToFiner
        );
        assert!(f.queue.contains(fine[0]));
        assert!(f.queue.contains(fine[2]));
        assert!(!f.queue.contains(fine[1]));
    }

    #[test]
    fn test_fine_tile_merges_into_coarse_half() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        let e = Ellipsoid::wgs84();
        let fine = f.tree.subdivide(ne, &e).unwrap();
        f.elevate(nw, 0.0);
        for &c in &fine {
            f.elevate(c, 0.0);
        }
        f.refresh();
        f.tree.segment_mut(nw).unwrap().applied_neighbors_zoom[Side::East.index()] = 2;

        let sw_fine = fine[2];
        let before_coarse = f.tree.segment(nw).unwrap().normal_map.normals.clone();
        let before_fine = f.tree.segment(sw_fine).unwrap().normal_map.normals.clone();
        assert_eq!(f.equalizer().equalize_edge(sw_fine, Side::West), EdgeOutcome::Merged);

        let coarse = &f.tree.segment(nw).unwrap().normal_map.normals;
        // Coarse rows 0 and 1 are untouched, row 2 onward gathered fine samples.
        assert_eq!(coarse[grid_index(4, 0, 4)], before_coarse[grid_index(4, 0, 4)]);
        assert_ne!(coarse[grid_index(4, 3, 4)], before_coarse[grid_index(4, 3, 4)]);
        let fine_now = &f.tree.segment(sw_fine).unwrap().normal_map.normals;
        assert_ne!(fine_now[grid_index(4, 0, 0)], before_fine[grid_index(4, 0, 0)]);
    }

    #[test]
    fn test_bake_defers_while_neighbor_loads() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        let meta = metadata();
        f.elevate(nw, 0.0);
        {
            let e = Ellipsoid::wgs84();
            let placeholder = f.gpu.create_texture_mm(&NormalMapImage::transparent());
            let s = f.tree.segment_mut(ne).unwrap();
            s.create_plain_vertices(&meta, &e, placeholder);
            s.load_terrain(&meta, &mut f.gpu);
        }
        f.refresh();

        let mut gpu = HeadlessBackend::new();
        let outcome = f.equalizer().create_normal_map_texture(nw, &meta, &mut gpu);
        assert_eq!(outcome, BakeOutcome::Deferred);
        assert!(f.queue.contains(nw));
        assert!(!f.tree.segment(nw).unwrap().normal_map_ready);
    }

    #[test]
    fn test_bake_sets_ready_and_requeues_baked_neighbor() {
        let mut f = Fixture::new();
        let [nw, ne, _, _] = f.children;
        f.elevate(nw, 0.0);
        f.elevate(ne, 0.0);
        f.refresh();
        let mut gpu = HeadlessBackend::new();

        f.queue.queue(ne);
        let first = f.equalizer().create_normal_map_texture(nw, &metadata(), &mut gpu);
        assert!(matches!(first, BakeOutcome::Baked(_)));
        assert!(f.tree.segment(nw).unwrap().normal_map_ready);
        assert_eq!(f.queue.pop(), Some(ne));

        let second = f.equalizer().create_normal_map_texture(ne, &metadata(), &mut gpu);
        assert!(matches!(second, BakeOutcome::Baked(_)));
        // The east tile found the pair merged; nothing else needed a rebake.
        assert!(f.ledger.is_merged(nw, ne));
        assert!(f.queue.is_empty());
        assert_eq!(gpu.live_textures(), 2);
    }
}
