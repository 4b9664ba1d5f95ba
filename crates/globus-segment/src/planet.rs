//! The planet: quadtree traversal, terrain and normal-map queues, and the draw
//! list handed to the renderer each frame.

use glam::{DVec2, DVec3};
use globus_math::{Extent, LonLat, forward_mercator};
use globus_terrain::{TerrainProvider, TerrainRequest, Ticket, TileKey};
use rustc_hash::FxHashMap;

use crate::camera::Camera;
use crate::gpu::{BufferHandle, GpuBackend, NormalMapImage, TextureHandle};
use crate::queue::SegmentQueue;
use crate::render_buffers::{IndexBinding, RenderCache};
use crate::seam::{BakeOutcome, SeamEqualizer, SeamLedger};
use crate::segment::{FULL_TEXTURE_BIAS, Segment, TerrainApplied, TerrainLoad};
use crate::settings::PlanetSettings;
use crate::tree::{NodeId, QuadTree};

/// Everything the renderer needs to draw one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub key: TileKey,
    pub position: BufferHandle,
    pub texcoord: BufferHandle,
    pub index: IndexBinding,
    /// The tile's own normal map, an ancestor's, or the transparent placeholder.
    pub normal_map: TextureHandle,
    /// `[offset_u, offset_v, scale]` into `normal_map`.
    pub normal_map_bias: [f32; 3],
    pub extent_params: [f32; 4],
}

/// Counters for the last frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rendered: usize,
    pub requested: usize,
    pub elevated: usize,
    pub no_data: usize,
    pub baked: usize,
    pub destroyed: usize,
}

/// A planet's terrain quadtree and the queues feeding it.
pub struct Planet<P: TerrainProvider, G: GpuBackend> {
    provider: P,
    gpu: G,
    settings: PlanetSettings,
    tree: QuadTree,
    root: NodeId,
    cache: RenderCache,
    terrain_queue: SegmentQueue,
    normal_map_queue: SegmentQueue,
    ledger: SeamLedger,
    tickets: FxHashMap<Ticket, NodeId>,
    next_ticket: u64,
    placeholder: TextureHandle,
    rendered: Vec<NodeId>,
    stats: FrameStats,
}

impl<P: TerrainProvider, G: GpuBackend> Planet<P, G> {
    pub fn new(provider: P, mut gpu: G, settings: PlanetSettings) -> Self {
        let placeholder = gpu.create_texture_mm(&NormalMapImage::transparent());
        let mut tree = QuadTree::new();
        let root = tree.insert_root(Segment::new(0, Extent::mercator_world(), &settings.ellipsoid));
        tracing::info!(
            "Planet ready: file grid {}, zoom {}..={}, lighting {}",
            provider.metadata().file_grid_size,
            provider.metadata().min_zoom,
            provider.metadata().max_zoom,
            settings.lighting_enabled
        );
        Self {
            provider,
            gpu,
            settings,
            tree,
            root,
            cache: RenderCache::new(),
            terrain_queue: SegmentQueue::new(),
            normal_map_queue: SegmentQueue::new(),
            ledger: SeamLedger::new(),
            tickets: FxHashMap::default(),
            next_ticket: 0,
            placeholder,
            rendered: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn settings(&self) -> &PlanetSettings {
        &self.settings
    }

    /// The transparent texture shown before any normal map exists.
    pub fn placeholder_texture(&self) -> TextureHandle {
        self.placeholder
    }

    pub fn last_stats(&self) -> FrameStats {
        self.stats
    }

    /// Nodes drawn by the last frame.
    pub fn rendered(&self) -> &[NodeId] {
        &self.rendered
    }

    /// Terrain requests submitted and not yet answered.
    pub fn pending_requests(&self) -> usize {
        self.tickets.len()
    }

    pub fn normal_map_queue_len(&self) -> usize {
        self.normal_map_queue.len()
    }

    /// Run one frame and return what to draw.
    pub fn frame(&mut self, camera: &Camera) -> Vec<DrawItem> {
        self.stats = FrameStats::default();
        self.apply_responses();
        self.traverse(camera);
        for i in 0..self.rendered.len() {
            self.tree.refresh_neighbors(self.rendered[i]);
        }
        self.submit_requests();
        self.process_normal_maps();
        let items = self.draw_items();
        self.stats.rendered = items.len();
        items
    }

    fn apply_responses(&mut self) {
        for response in self.provider.drain_responses() {
            let Some(id) = self.tickets.remove(&response.ticket) else {
                tracing::debug!("Discarding terrain for {:?}: unknown ticket", response.key);
                continue;
            };
            let Some(segment) = self.tree.segment_mut(id) else {
                continue;
            };
            if segment.ticket != Some(response.ticket) {
                continue;
            }
            segment.ticket = None;

            let metadata = self.provider.metadata();
            let applied = match segment.apply_terrain(
                &response.elevations,
                metadata,
                &self.settings,
                &mut self.gpu,
            ) {
                Ok(applied) => applied,
                Err(err) => {
                    tracing::warn!("Tile {:?}: {err}; treating it as having no data", response.key);
                    segment
                        .apply_terrain(&[], metadata, &self.settings, &mut self.gpu)
                        .unwrap_or(TerrainApplied::Ignored)
                }
            };

            match applied {
                TerrainApplied::Elevated => self.stats.elevated += 1,
                TerrainApplied::NoData => self.stats.no_data += 1,
                TerrainApplied::Ignored => continue,
            }
            if self.settings.lighting_enabled {
                self.normal_map_queue.queue(id);
            }
        }
    }

    /// Give a node its geometry on first visit and start its terrain load.
    fn prepare(&mut self, id: NodeId) {
        let metadata = self.provider.metadata();
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let parent = node.parent.zip(node.quadrant);

        if node.segment.plain.is_empty() {
            if let Some(segment) = self.tree.segment_mut(id) {
                segment.create_plain_vertices(metadata, &self.settings.ellipsoid, self.placeholder);
            }
            if let Some((parent, quadrant)) = parent
                && let Some((child, parent)) = self.tree.pair_mut(id, parent)
            {
                child.segment.inherit_temp_vertices(&parent.segment, quadrant);
            }
        }

        let Some(segment) = self.tree.segment_mut(id) else {
            return;
        };
        match segment.load_terrain(metadata, &mut self.gpu) {
            TerrainLoad::Request => {
                self.terrain_queue.queue(id);
            }
            TerrainLoad::PlainTerrain => {
                if self.settings.lighting_enabled {
                    self.normal_map_queue.queue(id);
                }
            }
            TerrainLoad::Inherited | TerrainLoad::Unchanged => {}
        }
    }

    fn traverse(&mut self, camera: &Camera) {
        self.rendered.clear();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            self.prepare(id);
            let Some(node) = self.tree.get(id) else {
                continue;
            };
            let children = node.children;
            let segment = &node.segment;
            let split = segment.terrain_ready
                && segment.zoom() < self.settings.max_zoom
                && !segment.accept_for_rendering(camera, self.settings.ratio_lod);

            if split {
                let children = match children {
                    Some(children) => children,
                    None => match self.tree.subdivide(id, &self.settings.ellipsoid) {
                        Ok(children) => children,
                        Err(err) => {
                            tracing::warn!("Cannot subdivide: {err}");
                            self.rendered.push(id);
                            continue;
                        }
                    },
                };
                stack.extend(children.iter().rev());
            } else {
                if children.is_some() {
                    let removed = self.tree.collapse(id);
                    self.release(removed);
                }
                self.rendered.push(id);
            }
        }
    }

    fn release(&mut self, removed: Vec<(NodeId, Segment)>) {
        self.stats.destroyed += removed.len();
        for (id, segment) in removed {
            if let Some(ticket) = segment.ticket {
                self.provider.cancel(ticket);
                self.tickets.remove(&ticket);
            }
            self.terrain_queue.remove(id);
            self.normal_map_queue.remove(id);
            self.ledger.forget(id);
            segment.destroy_segment(&mut self.gpu);
        }
    }

    fn submit_requests(&mut self) {
        while self.tickets.len() < self.settings.max_pending_requests {
            let Some(id) = self.terrain_queue.pop() else {
                break;
            };
            let Some(segment) = self.tree.segment_mut(id) else {
                continue;
            };
            if !segment.terrain_is_loading || segment.ticket.is_some() {
                continue;
            }

            let ticket = Ticket(self.next_ticket);
            self.next_ticket += 1;
            let request = TerrainRequest {
                ticket,
                key: segment.key,
                extent: segment.extent,
            };
            match self.provider.submit(request) {
                Ok(()) => {
                    segment.ticket = Some(ticket);
                    self.tickets.insert(ticket, id);
                    self.stats.requested += 1;
                }
                Err(_) => {
                    self.terrain_queue.shift(id);
                    break;
                }
            }
        }
    }

    fn process_normal_maps(&mut self) {
        if !self.settings.lighting_enabled {
            return;
        }
        let budget = self
            .settings
            .normal_maps_per_frame
            .min(self.normal_map_queue.len());
        let metadata = self.provider.metadata();
        let mut equalizer = SeamEqualizer {
            tree: &mut self.tree,
            queue: &mut self.normal_map_queue,
            ledger: &mut self.ledger,
        };
        for _ in 0..budget {
            let Some(id) = equalizer.queue.pop() else {
                break;
            };
            if let BakeOutcome::Baked(_) =
                equalizer.create_normal_map_texture(id, metadata, &mut self.gpu)
            {
                self.stats.baked += 1;
            }
        }
    }

    /// The texture and bias a node draws its normal map with: its own, the
    /// matching part of the nearest baked ancestor's, or the placeholder.
    pub fn normal_map_for(&self, id: NodeId) -> (TextureHandle, [f32; 3]) {
        let Some(node) = self.tree.get(id) else {
            return (self.placeholder, FULL_TEXTURE_BIAS);
        };
        let key = node.segment.key;
        let mut current = Some(node);
        while let Some(n) = current {
            let segment = &n.segment;
            if segment.normal_map_ready
                && let Some(texture) = segment.normal_map_texture
            {
                let dz = key.zoom - segment.zoom();
                if dz == 0 {
                    return (texture, FULL_TEXTURE_BIAS);
                }
                let scale = 1.0 / f64::from(1u32 << dz);
                let offset_x = f64::from(key.x - (segment.key.x << dz));
                let offset_y = f64::from(key.y - (segment.key.y << dz));
                return (
                    texture,
                    [
                        (offset_x * scale) as f32,
                        (offset_y * scale) as f32,
                        scale as f32,
                    ],
                );
            }
            current = n.parent.and_then(|p| self.tree.get(p));
        }
        (self.placeholder, FULL_TEXTURE_BIAS)
    }

    fn draw_items(&mut self) -> Vec<DrawItem> {
        let mut items = Vec::with_capacity(self.rendered.len());
        for i in 0..self.rendered.len() {
            let id = self.rendered[i];
            let (normal_map, normal_map_bias) = self.normal_map_for(id);
            let Some(node) = self.tree.get_mut(id) else {
                continue;
            };
            let side_size = node.side_size;
            let segment = &mut node.segment;
            if segment.buffers.is_empty() {
                segment.create_coords_buffers(&mut self.gpu, &mut self.cache);
            }
            let Some(index) =
                segment
                    .buffers
                    .select_index_buffer(&mut self.gpu, &mut self.cache, side_size)
            else {
                continue;
            };
            let (Some(position), Some(texcoord)) =
                (segment.buffers.position(), segment.buffers.texcoord())
            else {
                continue;
            };
            items.push(DrawItem {
                node: id,
                key: segment.key,
                position,
                texcoord,
                index,
                normal_map,
                normal_map_bias,
                extent_params: segment.extent_params,
            });
        }
        items
    }

    /// The rendered leaf covering a projected point.
    pub fn leaf_at(&self, merc: DVec2) -> Option<NodeId> {
        let mut current = self.root;
        loop {
            let node = self.tree.get(current)?;
            let Some(children) = node.children else {
                return Some(current);
            };
            current = children
                .into_iter()
                .find(|&c| self.tree.segment(c).is_some_and(|s| s.extent.contains(merc)))?;
        }
    }

    /// Surface point under `position` as seen from `eye`.
    pub fn earth_point(&self, position: LonLat, eye: DVec3) -> Option<DVec3> {
        let (x, y) = forward_mercator(position.lon, position.lat);
        let merc = DVec2::new(x, y);
        let segment = self.leaf_at(merc).and_then(|id| self.tree.segment(id));
        match segment {
            Some(segment) => segment.earth_point(merc, eye, &self.settings.ellipsoid),
            None => self
                .settings
                .ellipsoid
                .hit_ray(eye, -eye.normalize_or_zero()),
        }
    }

    /// Drop every tile below the root and every mesh, as after a provider
    /// change. The next frame rebuilds from scratch.
    pub fn clear(&mut self) {
        let removed = self.tree.collapse(self.root);
        self.release(removed);
        if let Some(segment) = self.tree.segment_mut(self.root) {
            if let Some(ticket) = segment.ticket {
                self.provider.cancel(ticket);
            }
            segment.clear_segment(&mut self.gpu);
        }
        self.tickets.clear();
        self.terrain_queue.clear();
        self.normal_map_queue.clear();
        self.ledger.clear();
        self.rendered.clear();
    }

    /// Release every GPU resource and hand the backend back.
    pub fn into_gpu(mut self) -> G {
        self.clear();
        self.cache.release(&mut self.gpu);
        self.gpu.delete_texture(self.placeholder);
        self.gpu
    }
}
