//! Elevation resampling: turns a tile's raw height grid into the elevated render
//! mesh and the normal-map mesh.
//!
//! Two policies share one output contract. When the provider grid is at least as
//! fine as the render grid, every source sample is elevated into the normal-map
//! mesh, every `stride`-th one into the render mesh, and face normals are summed
//! per vertex. When the provider grid is coarser, heights are interpolated over
//! the two triangles of each source quad and the plain normals are reused.

use glam::DVec3;
use globus_math::Bounds;

use crate::error::SegmentError;
use crate::plain::{NormalMapMesh, PlainGeometry, grid_index, vertex_count};

/// How source samples map onto the render grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResamplePolicy {
    /// Source grid is at least as fine as the render grid.
    Downsample { stride: u32 },
    /// Source grid is coarser; each source cell spans `cells_per_sample` render cells.
    Upsample { cells_per_sample: u32 },
}

impl ResamplePolicy {
    /// Pick the policy for a provider grid of `file_grid_size` cells and a render
    /// grid of `grid_size` cells.
    #[must_use]
    pub fn choose(file_grid_size: u32, grid_size: u32) -> Self {
        let grid_size = grid_size.max(1);
        if file_grid_size >= grid_size {
            ResamplePolicy::Downsample {
                stride: (file_grid_size / grid_size).max(1),
            }
        } else {
            ResamplePolicy::Upsample {
                cells_per_sample: grid_size / file_grid_size.max(1),
            }
        }
    }
}

/// Output of [`resample`].
#[derive(Clone, Debug)]
pub struct ResampledTerrain {
    /// Elevated render mesh, `(grid_size + 1)^2` vertices.
    pub terrain_vertices: Vec<DVec3>,
    pub grid_size: u32,
    /// Elevated normal-map mesh and its per-vertex normal accumulators.
    pub normal_map: NormalMapMesh,
    /// Extrema of `terrain_vertices`.
    pub bounds: Bounds,
}

/// Elevate a tile.
///
/// `elevations` must hold `(file_grid_size + 1)^2` samples row-major from the
/// north-west corner. `base` is the unelevated normal-map mesh (used when
/// downsampling, where it has `file_grid_size` cells) and `plain` the plain mesh
/// (used when upsampling, where it has `grid_size` cells).
pub fn resample(
    elevations: &[f32],
    file_grid_size: u32,
    grid_size: u32,
    height_factor: f64,
    base: &NormalMapMesh,
    plain: &PlainGeometry,
) -> Result<ResampledTerrain, SegmentError> {
    if !grids_nest(file_grid_size, grid_size) {
        return Err(SegmentError::UnsupportedGrid {
            file_grid_size,
            grid_size,
        });
    }
    let expected = vertex_count(file_grid_size);
    if elevations.len() != expected {
        return Err(SegmentError::ElevationCount {
            expected,
            actual: elevations.len(),
        });
    }

    match ResamplePolicy::choose(file_grid_size, grid_size) {
        ResamplePolicy::Downsample { stride } => {
            if base.size != file_grid_size || base.vertices.len() != expected {
                return Err(SegmentError::GridMismatch {
                    expected: file_grid_size,
                    actual: base.size,
                });
            }
            Ok(downsample(elevations, file_grid_size, stride, height_factor, base))
        }
        ResamplePolicy::Upsample { cells_per_sample } => {
            if plain.grid_size != grid_size || plain.vertices.len() != vertex_count(grid_size) {
                return Err(SegmentError::GridMismatch {
                    expected: grid_size,
                    actual: plain.grid_size,
                });
            }
            Ok(upsample(
                elevations,
                file_grid_size,
                grid_size,
                cells_per_sample,
                height_factor,
                plain,
            ))
        }
    }
}

/// One grid must evenly divide the other for samples to land on vertices.
fn grids_nest(file_grid_size: u32, grid_size: u32) -> bool {
    match (file_grid_size, grid_size) {
        (0, _) | (_, 0) => false,
        (f, g) if f >= g => f % g == 0,
        (f, g) => g % f == 0,
    }
}

fn downsample(
    elevations: &[f32],
    fgs: u32,
    stride: u32,
    height_factor: f64,
    base: &NormalMapMesh,
) -> ResampledTerrain {
    let grid_size = fgs / stride;
    let mut bounds = Bounds::empty();
    let mut terrain_vertices = Vec::with_capacity(vertex_count(grid_size));

    let nm_vertices: Vec<DVec3> = base
        .vertices
        .iter()
        .zip(&base.normals)
        .zip(elevations)
        .map(|((&v, &n), &h)| v + n * (height_factor * f64::from(h)))
        .collect();

    for i in (0..=fgs).step_by(stride as usize) {
        for j in (0..=fgs).step_by(stride as usize) {
            let v = nm_vertices[grid_index(fgs, i, j)];
            bounds.include(v);
            terrain_vertices.push(v);
        }
    }

    let mut normals = vec![DVec3::ZERO; nm_vertices.len()];
    for i in 0..fgs {
        for j in 0..fgs {
            let i0 = grid_index(fgs, i, j);
            let i1 = grid_index(fgs, i, j + 1);
            let i2 = grid_index(fgs, i + 1, j);
            let i3 = grid_index(fgs, i + 1, j + 1);
            let v0 = nm_vertices[i0];
            let e10 = nm_vertices[i1] - v0;
            let e20 = nm_vertices[i2] - v0;
            let e30 = nm_vertices[i3] - v0;

            let sw = e20.cross(e30);
            let ne = e30.cross(e10);
            let n0 = ne + sw;

            normals[i0] += n0;
            normals[i1] += ne;
            normals[i2] += sw;
            normals[i3] += n0;
        }
    }

    ResampledTerrain {
        terrain_vertices,
        grid_size,
        normal_map: NormalMapMesh {
            size: fgs,
            vertices: nm_vertices,
            normals,
        },
        bounds,
    }
}

/// Offset of render row/column `i` inside its source cell, and the cell index.
/// The last row/column belongs to the last cell at full offset.
#[inline]
fn locate(i: u32, grid_size: u32, one: u32) -> (u32, u32) {
    if i == grid_size {
        (one, i / one - 1)
    } else {
        (i % one, i / one)
    }
}

fn upsample(
    elevations: &[f32],
    fgs: u32,
    grid_size: u32,
    one: u32,
    height_factor: f64,
    plain: &PlainGeometry,
) -> ResampledTerrain {
    let mut bounds = Bounds::empty();
    let mut terrain_vertices = Vec::with_capacity(vertex_count(grid_size));
    let h = |i: u32, j: u32| f64::from(elevations[grid_index(fgs, i, j)]);
    let one_f = f64::from(one);

    for i in 0..=grid_size {
        let (inside_i, v_i) = locate(i, grid_size, one);
        for j in 0..=grid_size {
            let (inside_j, v_j) = locate(j, grid_size, one);

            let lt = h(v_i, v_j);
            let rt = h(v_i, v_j + 1);
            let lb = h(v_i + 1, v_j);
            let rb = h(v_i + 1, v_j + 1);

            let fi = f64::from(inside_i);
            let fj = f64::from(inside_j);
            let height = if inside_i + inside_j < one {
                lt + fj / one_f * (rt - lt) + fi / one_f * (lb - lt)
            } else {
                rb + (one_f - fj) / one_f * (lb - rb) + (one_f - fi) / one_f * (rt - rb)
            };

            let k = grid_index(grid_size, i, j);
            let v = plain.vertices[k] + plain.normals[k] * (height_factor * height);
            bounds.include(v);
            terrain_vertices.push(v);
        }
    }

    ResampledTerrain {
        normal_map: NormalMapMesh {
            size: grid_size,
            vertices: terrain_vertices.clone(),
            normals: plain.normals.clone(),
        },
        terrain_vertices,
        grid_size,
        bounds,
    }
}

/// Reduce a mesh to the 3x3 grid taken at rows and columns `0, g/2, g`.
pub fn degrade_to_3x3(vertices: &[DVec3], grid_size: u32) -> Vec<DVec3> {
    let half = grid_size / 2;
    let lines = [0, half, grid_size];
    let mut out = Vec::with_capacity(9);
    for &i in &lines {
        for &j in &lines {
            if let Some(&v) = vertices.get(grid_index(grid_size, i, j)) {
                out.push(v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plain::build_plain_geometry;
    use globus_math::{Ellipsoid, Extent};

    fn meshes(fgs: u32, tgs: u32) -> (PlainGeometry, NormalMapMesh) {
        build_plain_geometry(&Extent::from_tile(4, 9, 6), fgs, tgs, &Ellipsoid::wgs84())
    }

    #[test]
    fn test_policy_selection() {
        assert_eq!(
            ResamplePolicy::choose(32, 16),
            ResamplePolicy::Downsample { stride: 2 }
        );
        assert_eq!(
            ResamplePolicy::choose(32, 32),
            ResamplePolicy::Downsample { stride: 1 }
        );
        assert_eq!(
            ResamplePolicy::choose(16, 64),
            ResamplePolicy::Upsample { cells_per_sample: 4 }
        );
    }

    #[test]
    fn test_wrong_sample_count_rejected() {
        let (plain, nm) = meshes(32, 16);
        let err = resample(&[0.0; 10], 32, 16, 1.0, &nm, &plain).unwrap_err();
        assert_eq!(
            err,
            SegmentError::ElevationCount {
                expected: 33 * 33,
                actual: 10
            }
        );
    }

    #[test]
    fn test_grids_that_do_not_nest_rejected() {
        for (fgs, tgs) in [(4, 6), (6, 4), (0, 4), (4, 0)] {
            let (plain, nm) = meshes(fgs, tgs);
            let elevations = vec![0.0; vertex_count(fgs)];
            let err = resample(&elevations, fgs, tgs, 1.0, &nm, &plain).unwrap_err();
            assert_eq!(
                err,
                SegmentError::UnsupportedGrid {
                    file_grid_size: fgs,
                    grid_size: tgs
                },
                "fgs {fgs} tgs {tgs}"
            );
        }
    }

    #[test]
    fn test_constant_height_downsample_matches_offset_plain() {
        let (plain, nm) = meshes(32, 8);
        let out = resample(&[250.0; 33 * 33], 32, 8, 2.0, &nm, &plain).unwrap();
        assert_eq!(out.grid_size, 8);
        assert_eq!(out.terrain_vertices.len(), 81);
        for (k, v) in out.terrain_vertices.iter().enumerate() {
            let expect = plain.vertices[k] + plain.normals[k] * 500.0;
            assert!((*v - expect).length() < 1e-6);
        }
    }

    #[test]
    fn test_constant_height_upsample_matches_offset_plain() {
        let (plain, nm) = meshes(8, 32);
        let out = resample(&[100.0; 81], 8, 32, 1.0, &nm, &plain).unwrap();
        assert_eq!(out.grid_size, 32);
        assert_eq!(out.terrain_vertices.len(), 33 * 33);
        for (k, v) in out.terrain_vertices.iter().enumerate() {
            let expect = plain.vertices[k] + plain.normals[k] * 100.0;
            assert!((*v - expect).length() < 1e-6);
        }
        assert_eq!(out.normal_map.normals, plain.normals);
        assert_eq!(out.normal_map.size, 32);
    }

    #[test]
    fn test_upsample_hits_source_samples_at_cell_corners() {
        let (plain, nm) = meshes(2, 8);
        let elevations: Vec<f32> = (0..9).map(|k| k as f32 * 10.0).collect();
        let out = resample(&elevations, 2, 8, 1.0, &nm, &plain).unwrap();
        for si in 0..=2u32 {
            for sj in 0..=2u32 {
                let k = grid_index(8, si * 4, sj * 4);
                let h = (out.terrain_vertices[k] - plain.vertices[k]).dot(plain.normals[k]);
                let expect = f64::from(elevations[grid_index(2, si, sj)]);
                assert!((h - expect).abs() < 1e-6, "({si},{sj}): {h} vs {expect}");
            }
        }
    }

    #[test]
    fn test_upsample_interpolates_along_triangles() {
        // One source cell with a single raised corner (south-east).
        let (plain, nm) = meshes(1, 4);
        let out = resample(&[0.0, 0.0, 0.0, 40.0], 1, 4, 1.0, &nm, &plain).unwrap();
        let height = |i, j| {
            let k = grid_index(4, i, j);
            (out.terrain_vertices[k] - plain.vertices[k]).dot(plain.normals[k])
        };
        // North-west triangle stays flat.
        assert!(height(1, 1).abs() < 1e-6);
        assert!(height(0, 3).abs() < 1e-6);
        // On and below the anti-diagonal the SE corner contributes linearly.
        assert!(height(2, 2).abs() < 1e-6);
        assert!((height(3, 3) - 20.0).abs() < 1e-6);
        assert!((height(4, 4) - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_downsample_flat_normals_point_outward() {
        let (plain, nm) = meshes(16, 16);
        let out = resample(&[0.0; 17 * 17], 16, 16, 1.0, &nm, &plain).unwrap();
        for (n, v) in out.normal_map.normals.iter().zip(&out.normal_map.vertices) {
            assert!(n.dot(*v) > 0.0);
        }
    }

    #[test]
    fn test_downsample_accumulation_weights() {
        let (plain, nm) = meshes(2, 2);
        let out = resample(&[0.0; 9], 2, 2, 1.0, &nm, &plain).unwrap();
        let n = &out.normal_map.normals;
        // Interior vertex gathers contributions from all four quads, so it is
        // longer than a corner vertex that belongs to one quad only.
        let center = n[grid_index(2, 1, 1)].length();
        let ne_corner = n[grid_index(2, 0, 2)].length();
        assert!(center > 2.0 * ne_corner);
    }

    #[test]
    fn test_bounds_cover_render_mesh() {
        let (plain, nm) = meshes(32, 16);
        let elevations: Vec<f32> = (0..33 * 33).map(|k| (k % 97) as f32 * 30.0).collect();
        let out = resample(&elevations, 32, 16, 1.0, &nm, &plain).unwrap();
        for v in &out.terrain_vertices {
            assert!(v.cmpge(out.bounds.min).all() && v.cmple(out.bounds.max).all());
        }
    }

    #[test]
    fn test_degrade_to_3x3() {
        let grid: Vec<DVec3> = (0..25).map(|k| DVec3::splat(k as f64)).collect();
        let out = degrade_to_3x3(&grid, 4);
        let picked: Vec<f64> = out.iter().map(|v| v.x).collect();
        assert_eq!(picked, vec![0.0, 2.0, 4.0, 10.0, 12.0, 14.0, 20.0, 22.0, 24.0]);
    }
}
