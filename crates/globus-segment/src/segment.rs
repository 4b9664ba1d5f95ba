//! The segment: one quadtree tile's geometry, lifecycle flags and GPU resources.

use glam::{DVec2, DVec3};
use globus_math::{
    BoundingBox, BoundingSphere, Bounds, Ellipsoid, Extent, POLE, Ray, RayHit, inverse_mercator,
};
use globus_terrain::{TerrainMetadata, Ticket, TileKey};

use crate::camera::Camera;
use crate::error::SegmentError;
use crate::gpu::{GpuBackend, NormalMapImage, TextureHandle};
use crate::plain::{NormalMapMesh, PlainGeometry, build_plain_geometry, grid_index, vertex_count};
use crate::quad::Quadrant;
use crate::render_buffers::{RenderCache, SegmentBuffers};
use crate::resample::{degrade_to_3x3, resample};
use crate::settings::PlanetSettings;

/// Bias of a texture that covers the whole tile.
pub const FULL_TEXTURE_BIAS: [f32; 3] = [0.0, 0.0, 1.0];

/// What [`Segment::load_terrain`] decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainLoad {
    /// Elevation must be requested from the provider.
    Request,
    /// Shallower than the provider's data: the plain mesh is the terrain.
    PlainTerrain,
    /// Deeper than the provider's data: the inherited mesh is the terrain.
    Inherited,
    /// Already loading or loaded.
    Unchanged,
}

/// Outcome of [`Segment::apply_terrain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainApplied {
    Elevated,
    NoData,
    /// The segment was not waiting for terrain.
    Ignored,
}

/// One Web-Mercator tile.
#[derive(Debug)]
pub struct Segment {
    pub key: TileKey,
    pub extent: Extent,
    /// `[west, south, 2 / width, 2 / height]` for overlay texture lookups.
    pub extent_params: [f32; 4],

    pub plain: PlainGeometry,
    pub terrain_vertices: Vec<DVec3>,
    /// Normal-map mesh and its accumulated normals.
    pub normal_map: NormalMapMesh,
    /// Placeholder mesh drawn until terrain arrives.
    pub temp_vertices: Vec<DVec3>,
    pub temp_grid_size: u32,
    /// Grid of `terrain_vertices`.
    pub grid_size: u32,

    pub bbox: BoundingBox,
    pub bsphere: BoundingSphere,

    pub ready: bool,
    pub terrain_is_loading: bool,
    pub terrain_ready: bool,
    pub terrain_exists: bool,
    pub normal_map_ready: bool,
    /// Zoom of each neighbor when its normals were last merged, by side.
    pub applied_neighbors_zoom: [u8; 4],

    pub buffers: SegmentBuffers,
    /// The baked normal map once `normal_map_ready`, else the placeholder.
    pub normal_map_texture: Option<TextureHandle>,
    pub normal_map_texture_bias: [f32; 3],
    /// Outstanding terrain request.
    pub ticket: Option<Ticket>,
}

impl Segment {
    pub fn new(zoom: u8, extent: Extent, ellipsoid: &Ellipsoid) -> Self {
        let mut segment = Self {
            key: TileKey::new(zoom, 0, 0),
            extent,
            extent_params: [0.0; 4],
            plain: PlainGeometry::default(),
            terrain_vertices: Vec::new(),
            normal_map: NormalMapMesh::default(),
            temp_vertices: Vec::new(),
            temp_grid_size: 0,
            grid_size: 0,
            bbox: BoundingBox::default(),
            bsphere: BoundingSphere::default(),
            ready: false,
            terrain_is_loading: false,
            terrain_ready: false,
            terrain_exists: false,
            normal_map_ready: false,
            applied_neighbors_zoom: [0; 4],
            buffers: SegmentBuffers::default(),
            normal_map_texture: None,
            normal_map_texture_bias: FULL_TEXTURE_BIAS,
            ticket: None,
        };
        segment.assign_tile_indexes(zoom, extent);
        segment.create_bounds_by_extent(ellipsoid);
        segment
    }

    #[inline]
    pub fn zoom(&self) -> u8 {
        self.key.zoom
    }

    /// Set the tile identity from its zoom and extent.
    pub fn assign_tile_indexes(&mut self, zoom: u8, extent: Extent) {
        let width = extent.width();
        let height = extent.height();
        let x = ((-POLE - extent.south_west.x).abs() / width).round() as u32;
        let y = ((POLE - extent.north_east.y).abs() / height).round() as u32;
        self.key = TileKey::new(zoom, x, y);
        self.extent = extent;
        self.extent_params = [
            extent.south_west.x as f32,
            extent.south_west.y as f32,
            (2.0 / width) as f32,
            (2.0 / height) as f32,
        ];
    }

    /// Bounding volumes from the four extent corners on the ellipsoid, used
    /// before any mesh exists.
    pub fn create_bounds_by_extent(&mut self, ellipsoid: &Ellipsoid) {
        let sw = self.extent.south_west;
        let ne = self.extent.north_east;
        let corners = [(sw.x, sw.y), (sw.x, ne.y), (ne.x, ne.y), (ne.x, sw.y)]
            .map(|(x, y)| ellipsoid.lonlat_to_cartesian(inverse_mercator(x, y)));
        let bounds = Bounds::from_points(&corners);
        self.bbox = BoundingBox::from_bounds(&bounds);
        self.bsphere = BoundingSphere::from_bounds(&bounds);
    }

    /// Build the plain and normal-map meshes and show the placeholder texture.
    pub fn create_plain_vertices(
        &mut self,
        metadata: &TerrainMetadata,
        ellipsoid: &Ellipsoid,
        placeholder: TextureHandle,
    ) {
        let grid_size = metadata.grid_size(self.zoom());
        let (plain, normal_map) =
            build_plain_geometry(&self.extent, metadata.file_grid_size, grid_size, ellipsoid);
        self.grid_size = plain.grid_size;
        self.plain = plain;
        self.normal_map = normal_map;
        if !self.normal_map_ready {
            self.normal_map_texture = Some(placeholder);
        }
        self.ready = true;
        self.update_bounds();
    }

    /// Take this tile's quarter of the parent's current mesh as the
    /// placeholder. Falls back to the plain mesh when the parent mesh is too
    /// coarse to split.
    pub fn inherit_temp_vertices(&mut self, parent: &Segment, quadrant: Quadrant) {
        let (vertices, grid) = parent.render_mesh();
        if grid >= 2 && vertices.len() == vertex_count(grid) {
            let half = grid / 2;
            let row = quadrant.row() * half;
            let column = quadrant.column() * half;
            self.temp_vertices = (0..=half)
                .flat_map(|i| (0..=half).map(move |j| (i, j)))
                .map(|(i, j)| vertices[grid_index(grid, row + i, column + j)])
                .collect();
            self.temp_grid_size = half;
        } else {
            self.temp_vertices = self.plain.vertices.clone();
            self.temp_grid_size = self.plain.grid_size;
        }
        self.update_bounds();
    }

    /// The mesh drawn right now and its grid size.
    pub fn render_mesh(&self) -> (&[DVec3], u32) {
        if self.terrain_ready && !self.terrain_vertices.is_empty() {
            (&self.terrain_vertices, self.grid_size)
        } else if !self.temp_vertices.is_empty() {
            (&self.temp_vertices, self.temp_grid_size)
        } else {
            (&self.plain.vertices, self.plain.grid_size)
        }
    }

    /// Recompute the box and sphere from the current render mesh.
    pub fn update_bounds(&mut self) {
        let bounds = Bounds::from_points(self.render_mesh().0);
        self.set_bounds(&bounds);
    }

    fn set_bounds(&mut self, bounds: &Bounds) {
        if bounds.is_empty() {
            return;
        }
        let (vertices, _) = self.render_mesh();
        self.bsphere = BoundingSphere::from_points(vertices, bounds);
        self.bbox = BoundingBox::from_bounds(bounds);
    }

    /// Decide how this tile gets its terrain.
    pub fn load_terrain(
        &mut self,
        metadata: &TerrainMetadata,
        gpu: &mut dyn GpuBackend,
    ) -> TerrainLoad {
        let zoom = self.zoom();
        if metadata.has_zoom(zoom) {
            if self.terrain_is_loading || self.terrain_ready {
                return TerrainLoad::Unchanged;
            }
            self.terrain_is_loading = true;
            return TerrainLoad::Request;
        }
        if self.terrain_ready {
            return TerrainLoad::Unchanged;
        }
        if zoom < metadata.min_zoom {
            self.terrain_vertices = self.plain.vertices.clone();
            self.grid_size = self.plain.grid_size;
            self.mark_terrain_ready(false, None, gpu);
            TerrainLoad::PlainTerrain
        } else {
            let (vertices, grid) = if self.temp_vertices.is_empty() {
                (self.plain.vertices.clone(), self.plain.grid_size)
            } else {
                (self.temp_vertices.clone(), self.temp_grid_size)
            };
            self.terrain_vertices = vertices;
            self.grid_size = grid;
            self.mark_terrain_ready(false, None, gpu);
            TerrainLoad::Inherited
        }
    }

    /// `bounds` comes from the resampler when it already scanned the mesh.
    fn mark_terrain_ready(
        &mut self,
        exists: bool,
        bounds: Option<Bounds>,
        gpu: &mut dyn GpuBackend,
    ) {
        self.terrain_is_loading = false;
        self.terrain_ready = true;
        self.terrain_exists = exists;
        self.temp_vertices.clear();
        self.temp_grid_size = 0;
        self.delete_buffers(gpu);
        match bounds {
            Some(bounds) => self.set_bounds(&bounds),
            None => self.update_bounds(),
        }
    }

    /// Apply a provider answer. An empty payload means the tile has no data.
    pub fn apply_terrain(
        &mut self,
        elevations: &[f32],
        metadata: &TerrainMetadata,
        settings: &PlanetSettings,
        gpu: &mut dyn GpuBackend,
    ) -> Result<TerrainApplied, SegmentError> {
        if !(self.ready && self.terrain_is_loading) {
            return Ok(TerrainApplied::Ignored);
        }
        if elevations.is_empty() {
            self.elevations_not_exists(settings, gpu);
            Ok(TerrainApplied::NoData)
        } else {
            self.elevations_exists(elevations, metadata, settings, gpu)?;
            Ok(TerrainApplied::Elevated)
        }
    }

    /// Elevate the tile from a full sample grid.
    pub fn elevations_exists(
        &mut self,
        elevations: &[f32],
        metadata: &TerrainMetadata,
        settings: &PlanetSettings,
        gpu: &mut dyn GpuBackend,
    ) -> Result<(), SegmentError> {
        let grid_size = metadata.grid_size(self.zoom());
        let out = resample(
            elevations,
            metadata.file_grid_size,
            grid_size,
            settings.height_factor,
            &self.normal_map,
            &self.plain,
        )?;

        self.terrain_vertices = out.terrain_vertices;
        self.grid_size = out.grid_size;
        self.normal_map = out.normal_map;
        self.mark_terrain_ready(true, Some(out.bounds), gpu);
        tracing::debug!(
            "Tile {}/{}/{} elevated at grid {}",
            self.key.zoom,
            self.key.x,
            self.key.y,
            self.grid_size
        );
        Ok(())
    }

    /// Keep the mesh already held and mark the tile as having no data. Deep
    /// tiles are reduced to a 3x3 mesh.
    pub fn elevations_not_exists(&mut self, settings: &PlanetSettings, gpu: &mut dyn GpuBackend) {
        let degrade = self.zoom() > settings.degrade_zoom;
        let (vertices, grid) = {
            let candidates = [
                (&self.terrain_vertices, self.grid_size),
                (&self.temp_vertices, self.temp_grid_size),
                (&self.plain.vertices, self.plain.grid_size),
            ];
            candidates
                .iter()
                .find(|(v, g)| !v.is_empty() && (!degrade || *g >= 2))
                .or_else(|| candidates.iter().find(|(v, _)| !v.is_empty()))
                .map(|(v, g)| ((*v).clone(), *g))
                .unwrap_or_default()
        };

        if degrade && grid >= 2 {
            self.terrain_vertices = degrade_to_3x3(&vertices, grid);
            self.grid_size = 2;
        } else {
            self.terrain_vertices = vertices;
            self.grid_size = grid;
        }
        self.mark_terrain_ready(false, None, gpu);
    }

    /// Encode the accumulated normals and upload them as this tile's normal map.
    pub fn bake_normal_map(&mut self, gpu: &mut dyn GpuBackend) -> TextureHandle {
        let image = NormalMapImage::from_normals(&self.normal_map.normals, self.normal_map.size);
        let handle = gpu.create_texture_mm(&image);
        if let Some(previous) = self.normal_map_texture.replace(handle)
            && self.normal_map_ready
        {
            gpu.delete_texture(previous);
        }
        self.normal_map_ready = true;
        self.normal_map_texture_bias = FULL_TEXTURE_BIAS;
        handle
    }

    pub fn accept_for_rendering(&self, camera: &Camera, ratio_lod: f64) -> bool {
        camera.projected_size(self.bsphere.center) > ratio_lod * self.bsphere.radius
    }

    /// Where the ray from `eye` toward the planet center meets this tile's
    /// mesh under the projected point `merc`. Falls back to the ellipsoid when
    /// the tile has no mesh or the ray misses the cell.
    pub fn earth_point(&self, merc: DVec2, eye: DVec3, ellipsoid: &Ellipsoid) -> Option<DVec3> {
        let ray = Ray::new(eye, -eye.normalize_or_zero());
        let fallback = || ellipsoid.hit_ray(ray.origin, ray.direction);

        let (vertices, size) = if self.terrain_ready {
            (&self.terrain_vertices, self.grid_size)
        } else {
            (&self.temp_vertices, self.temp_grid_size)
        };
        if vertices.is_empty() || size == 0 {
            return fallback();
        }

        let s = f64::from(size);
        let qx = self.extent.width() / s;
        let qy = self.extent.height() / s;
        let last = s - 1.0;
        let ind_x = ((merc.x - self.extent.south_west.x) / qx).floor().clamp(0.0, last) as u32;
        let ind_y = (s - (merc.y - self.extent.south_west.y) / qy)
            .floor()
            .clamp(0.0, last) as u32;

        let corner = |i: u32, j: u32| vertices.get(grid_index(size, i, j)).copied();
        let (Some(v0), Some(v1), Some(v2), Some(v3)) = (
            corner(ind_y, ind_x),
            corner(ind_y, ind_x + 1),
            corner(ind_y + 1, ind_x),
            corner(ind_y + 1, ind_x + 1),
        ) else {
            return fallback();
        };

        if let RayHit::Inside(p) = ray.hit_triangle(v0, v1, v2) {
            return Some(p);
        }
        if let RayHit::Inside(p) = ray.hit_triangle(v1, v3, v2) {
            return Some(p);
        }
        fallback()
    }

    /// Upload the current render mesh.
    pub fn create_coords_buffers(&mut self, gpu: &mut dyn GpuBackend, cache: &mut RenderCache) {
        let mut buffers = std::mem::take(&mut self.buffers);
        let (vertices, grid) = self.render_mesh();
        buffers.create_coords_buffers(gpu, cache, vertices, grid);
        self.buffers = buffers;
    }

    pub fn delete_buffers(&mut self, gpu: &mut dyn GpuBackend) {
        self.buffers.delete(gpu);
    }

    pub fn clear_buffers(&mut self, gpu: &mut dyn GpuBackend) {
        self.ready = false;
        self.delete_buffers(gpu);
    }

    /// Drop every mesh and the baked normal map, returning the tile to its
    /// freshly created state.
    pub fn delete_elevations(&mut self, gpu: &mut dyn GpuBackend) {
        self.terrain_ready = false;
        self.terrain_is_loading = false;
        self.terrain_exists = false;
        self.normal_map.clear();
        self.temp_vertices.clear();
        self.temp_grid_size = 0;
        self.terrain_vertices.clear();
        self.plain = PlainGeometry::default();
        if let Some(texture) = self.normal_map_texture.take()
            && self.normal_map_ready
        {
            gpu.delete_texture(texture);
        }
        self.normal_map_ready = false;
        self.applied_neighbors_zoom = [0; 4];
        self.normal_map_texture_bias = FULL_TEXTURE_BIAS;
        self.ticket = None;
    }

    pub fn clear_segment(&mut self, gpu: &mut dyn GpuBackend) {
        self.clear_buffers(gpu);
        self.delete_elevations(gpu);
    }

    /// Release everything the segment owns.
    pub fn destroy_segment(mut self, gpu: &mut dyn GpuBackend) {
        self.clear_segment(gpu);
    }
}
