//! Axis-aligned rectangles in projected (Web-Mercator) space.

use glam::DVec2;

use crate::lonlat::POLE;

/// A projected bounding rectangle. `x` runs east, `y` runs north.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    /// South-west (minimum) corner.
    pub south_west: DVec2,
    /// North-east (maximum) corner.
    pub north_east: DVec2,
}

impl Extent {
    /// Create an extent from two corners, sorting components so `south_west <= north_east`.
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            south_west: a.min(b),
            north_east: a.max(b),
        }
    }

    /// The whole Web-Mercator square.
    pub fn mercator_world() -> Self {
        Self::new(DVec2::splat(-POLE), DVec2::splat(POLE))
    }

    /// The extent of tile `(x, y)` at `zoom` in the standard XYZ tiling
    /// (row 0 at the north edge).
    pub fn from_tile(zoom: u8, x: u32, y: u32) -> Self {
        let size = 2.0 * POLE / f64::from(1u32 << zoom);
        let west = -POLE + f64::from(x) * size;
        let north = POLE - f64::from(y) * size;
        Self::new(DVec2::new(west, north - size), DVec2::new(west + size, north))
    }

    pub fn width(&self) -> f64 {
        self.north_east.x - self.south_west.x
    }

    pub fn height(&self) -> f64 {
        self.north_east.y - self.south_west.y
    }

    pub fn center(&self) -> DVec2 {
        (self.south_west + self.north_east) * 0.5
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.south_west.x
            && p.x <= self.north_east.x
            && p.y >= self.south_west.y
            && p.y <= self.north_east.y
    }

    /// Returns true if the two extents overlap (touching edges count).
    pub fn intersects(&self, other: &Extent) -> bool {
        self.south_west.x <= other.north_east.x
            && self.north_east.x >= other.south_west.x
            && self.south_west.y <= other.north_east.y
            && self.north_east.y >= other.south_west.y
    }

    /// One quarter of this extent. Quadrants are numbered NW=0, NE=1, SW=2, SE=3.
    pub fn quadrant(&self, part_id: usize) -> Extent {
        let c = self.center();
        let (sw, ne) = match part_id & 3 {
            0 => (
                DVec2::new(self.south_west.x, c.y),
                DVec2::new(c.x, self.north_east.y),
            ),
            1 => (c, self.north_east),
            2 => (self.south_west, c),
            _ => (
                DVec2::new(c.x, self.south_west.y),
                DVec2::new(self.north_east.x, c.y),
            ),
        };
        Extent::new(sw, ne)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_sorts_corners() {
        let e = Extent::new(DVec2::new(10.0, 20.0), DVec2::new(0.0, 5.0));
        assert_eq!(e.south_west, DVec2::new(0.0, 5.0));
        assert_eq!(e.north_east, DVec2::new(10.0, 20.0));
    }

    #[test]
    fn test_quadrants_tile_parent_exactly() {
        let parent = Extent::mercator_world();
        let quads: Vec<Extent> = (0..4).map(|p| parent.quadrant(p)).collect();
        let area: f64 = quads.iter().map(|q| q.width() * q.height()).sum();
        assert!((area - parent.width() * parent.height()).abs() < 1.0);

        // NW touches the parent's north-west corner, SE the south-east corner.
        assert_eq!(quads[0].south_west.x, parent.south_west.x);
        assert_eq!(quads[0].north_east.y, parent.north_east.y);
        assert_eq!(quads[3].north_east.x, parent.north_east.x);
        assert_eq!(quads[3].south_west.y, parent.south_west.y);
    }

    #[test]
    fn test_from_tile_matches_quadrant_split() {
        let world = Extent::mercator_world();
        assert_eq!(Extent::from_tile(0, 0, 0), world);
        let ne = Extent::from_tile(1, 1, 0);
        let q = world.quadrant(1);
        assert!((ne.south_west - q.south_west).length() < 1e-6);
        assert!((ne.north_east - q.north_east).length() < 1e-6);
    }

    #[test]
    fn test_intersects_touching() {
        let a = Extent::new(DVec2::ZERO, DVec2::splat(10.0));
        let b = Extent::new(DVec2::new(10.0, 0.0), DVec2::new(20.0, 10.0));
        let c = Extent::new(DVec2::splat(11.0), DVec2::splat(12.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_contains_boundary() {
        let e = Extent::new(DVec2::ZERO, DVec2::splat(1.0));
        assert!(e.contains(DVec2::ZERO));
        assert!(e.contains(DVec2::splat(1.0)));
        assert!(!e.contains(DVec2::new(1.5, 0.5)));
    }
}
