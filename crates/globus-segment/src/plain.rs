//! Unelevated reference meshes sampled from the ellipsoid.
//!
//! Grids are stored row-major starting at the north-west corner: vertex
//! `(i, j)` (row `i` counted from the north, column `j` from the west) of a grid
//! with `g` cells per side lives at `i * (g + 1) + j`.

use glam::DVec3;
use globus_math::{Ellipsoid, Extent, inverse_mercator};

/// Index of vertex `(i, j)` in a grid of `grid_size` cells per side.
#[inline]
pub fn grid_index(grid_size: u32, i: u32, j: u32) -> usize {
    (i * (grid_size + 1) + j) as usize
}

/// Number of vertices in a grid of `grid_size` cells per side.
#[inline]
pub fn vertex_count(grid_size: u32) -> usize {
    let side = grid_size as usize + 1;
    side * side
}

/// The plain mesh: ellipsoid surface samples and their outward normals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlainGeometry {
    pub grid_size: u32,
    pub vertices: Vec<DVec3>,
    pub normals: Vec<DVec3>,
}

impl PlainGeometry {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Full-resolution mesh feeding the lighting normal map.
///
/// `normals` starts as unit ellipsoid normals. After elevation arrives it holds
/// unnormalized face-normal sums that neighbors keep adding to until the map is
/// baked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalMapMesh {
    pub size: u32,
    pub vertices: Vec<DVec3>,
    pub normals: Vec<DVec3>,
}

impl NormalMapMesh {
    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }

    /// True if `normals` covers the whole `size` grid.
    pub fn is_complete(&self) -> bool {
        self.size > 0 && self.normals.len() == vertex_count(self.size)
    }

    pub fn clear(&mut self) {
        self.size = 0;
        self.vertices.clear();
        self.normals.clear();
    }
}

/// Sample the tile surface at `max(file_grid_size, grid_size)` cells per side.
///
/// Returns the plain mesh, subsampled every `max(file_grid_size / grid_size, 1)`
/// rows and columns, and the full-resolution normal-map mesh. Grid sizes are
/// powers of two so the stride divides the full grid.
pub fn build_plain_geometry(
    extent: &Extent,
    file_grid_size: u32,
    grid_size: u32,
    ellipsoid: &Ellipsoid,
) -> (PlainGeometry, NormalMapMesh) {
    let full = file_grid_size.max(grid_size).max(1);
    let dg = (file_grid_size / grid_size.max(1)).max(1);
    let plain_grid = full / dg;

    let step_x = extent.width() / f64::from(full);
    let step_y = extent.height() / f64::from(full);
    let west = extent.south_west.x;
    let north = extent.north_east.y;
    let inv_radii2 = ellipsoid.inv_radii2();

    let mut nm_vertices = Vec::with_capacity(vertex_count(full));
    let mut nm_normals = Vec::with_capacity(vertex_count(full));
    let mut vertices = Vec::with_capacity(vertex_count(plain_grid));
    let mut normals = Vec::with_capacity(vertex_count(plain_grid));

    for i in 0..=full {
        let y = north - f64::from(i) * step_y;
        for j in 0..=full {
            let x = west + f64::from(j) * step_x;
            let v = ellipsoid.lonlat_to_cartesian(inverse_mercator(x, y));
            let n = (v * inv_radii2).normalize_or_zero();

            nm_vertices.push(v);
            nm_normals.push(n);

            if i % dg == 0 && j % dg == 0 {
                vertices.push(v);
                normals.push(n);
            }
        }
    }

    (
        PlainGeometry {
            grid_size: plain_grid,
            vertices,
            normals,
        },
        NormalMapMesh {
            size: full,
            vertices: nm_vertices,
            normals: nm_normals,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use globus_math::LonLat;

    fn tile() -> Extent {
        Extent::from_tile(3, 4, 3)
    }

    #[test]
    fn test_downsampled_plain_is_strided_subset() {
        let e = Ellipsoid::wgs84();
        let (plain, nm) = build_plain_geometry(&tile(), 32, 8, &e);
        assert_eq!(nm.size, 32);
        assert_eq!(nm.vertices.len(), 33 * 33);
        assert_eq!(plain.grid_size, 8);
        assert_eq!(plain.vertices.len(), 81);
        for i in 0..=8 {
            for j in 0..=8 {
                assert_eq!(
                    plain.vertices[grid_index(8, i, j)],
                    nm.vertices[grid_index(32, i * 4, j * 4)]
                );
            }
        }
    }

    #[test]
    fn test_fine_grid_uses_single_resolution() {
        let e = Ellipsoid::wgs84();
        let (plain, nm) = build_plain_geometry(&tile(), 16, 64, &e);
        assert_eq!(plain.grid_size, 64);
        assert_eq!(nm.size, 64);
        assert_eq!(plain.vertices, nm.vertices);
    }

    #[test]
    fn test_corners_match_extent() {
        let e = Ellipsoid::wgs84();
        let extent = tile();
        let (plain, _) = build_plain_geometry(&extent, 32, 16, &e);
        let nw = inverse_mercator(extent.south_west.x, extent.north_east.y);
        let se = inverse_mercator(extent.north_east.x, extent.south_west.y);
        let expect_nw = e.lonlat_to_cartesian(LonLat::new(nw.lon, nw.lat));
        let expect_se = e.lonlat_to_cartesian(LonLat::new(se.lon, se.lat));
        assert!((plain.vertices[0] - expect_nw).length() < 1e-6);
        assert!((plain.vertices[grid_index(16, 16, 16)] - expect_se).length() < 1e-6);
    }

    #[test]
    fn test_normals_are_unit_and_outward() {
        let e = Ellipsoid::wgs84();
        let (plain, nm) = build_plain_geometry(&tile(), 32, 16, &e);
        for (v, n) in plain.vertices.iter().zip(&plain.normals) {
            assert!((n.length() - 1.0).abs() < 1e-12);
            assert!(n.dot(*v) > 0.0);
        }
        assert!(nm.is_complete());
    }
}
