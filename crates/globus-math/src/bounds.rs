//! Bounding volumes derived from vertex extrema.

use glam::DVec3;

/// Running per-axis extrema accumulator.
///
/// Starts inverted (`min = +MAX`, `max = -MAX`) so the first point sets both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    /// An empty accumulator.
    pub const fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::MAX),
            max: DVec3::splat(f64::MIN),
        }
    }

    /// Extrema of a slice of points.
    pub fn from_points(points: &[DVec3]) -> Self {
        let mut b = Self::empty();
        for &p in points {
            b.include(p);
        }
        b
    }

    /// Grow the extrema to include `p`.
    #[inline]
    pub fn include(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn from_bounds(bounds: &Bounds) -> Self {
        if bounds.is_empty() {
            return Self::default();
        }
        Self {
            min: bounds.min,
            max: bounds.max,
        }
    }

    /// Returns true if `p` is inside, allowing `tolerance` on every face.
    pub fn contains_point(&self, p: DVec3, tolerance: f64) -> bool {
        p.cmpge(self.min - DVec3::splat(tolerance)).all()
            && p.cmple(self.max + DVec3::splat(tolerance)).all()
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }
}

/// Bounding sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Sphere circumscribing the box given by the extrema: centered on the box
    /// center, radius half the box diagonal.
    pub fn from_bounds(bounds: &Bounds) -> Self {
        if bounds.is_empty() {
            return Self::default();
        }
        let center = bounds.center();
        Self {
            center,
            radius: center.distance(bounds.min),
        }
    }

    /// Sphere centered on the extrema's box center whose radius reaches the
    /// farthest point. Tighter than [`BoundingSphere::from_bounds`] and still
    /// encloses every point.
    pub fn from_points(points: &[DVec3], bounds: &Bounds) -> Self {
        if bounds.is_empty() {
            return Self::default();
        }
        let center = bounds.center();
        let radius2 = points
            .iter()
            .map(|p| p.distance_squared(center))
            .fold(0.0_f64, f64::max);
        Self {
            center,
            radius: radius2.sqrt(),
        }
    }

    /// Returns true if `p` lies within `radius + tolerance` of the center.
    pub fn contains_point(&self, p: DVec3, tolerance: f64) -> bool {
        p.distance(self.center) <= self.radius + tolerance
    }
}
