//! Ray casting against triangles.

use glam::DVec3;

/// Result of a ray/triangle test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RayHit {
    /// The ray crosses the triangle at the given point.
    Inside(DVec3),
    /// The ray's supporting line crosses the triangle plane outside the triangle,
    /// or the ray is parallel to it.
    Outside,
    /// The triangle is behind the ray origin.
    Away,
}

/// A half-line starting at `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `origin` through `target`.
    pub fn towards(origin: DVec3, target: DVec3) -> Self {
        Self::new(origin, (target - origin).normalize_or_zero())
    }

    /// Möller–Trumbore intersection with triangle `(v0, v1, v2)`. Both windings hit.
    pub fn hit_triangle(&self, v0: DVec3, v1: DVec3, v2: DVec3) -> RayHit {
        const EPS: f64 = 1e-12;

        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPS {
            return RayHit::Outside;
        }
        let inv_det = 1.0 / det;
        let t_vec = self.origin - v0;
        let u = t_vec.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return RayHit::Outside;
        }
        let q = t_vec.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return RayHit::Outside;
        }
        let t = e2.dot(q) * inv_det;
        if t < 0.0 {
            return RayHit::Away;
        }
        RayHit::Inside(self.origin + self.direction * t)
    }
}
