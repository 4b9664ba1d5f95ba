//! Tile sides and quadrants.

/// One of the four tile edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    /// True for edges that run north-south (east and west edges).
    #[inline]
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::East | Side::West)
    }

    /// Row (horizontal edges) or column (vertical edges) of this edge in a grid
    /// of `size` cells.
    #[inline]
    pub fn edge_line(self, size: u32) -> u32 {
        match self {
            Side::North | Side::West => 0,
            Side::South | Side::East => size,
        }
    }

    /// The quadrant touching this edge that is visited first when descending
    /// toward it.
    #[must_use]
    pub fn first_quadrant(self) -> Quadrant {
        match self {
            Side::North | Side::West => Quadrant::NorthWest,
            Side::East => Quadrant::NorthEast,
            Side::South => Quadrant::SouthWest,
        }
    }
}

/// Position of a child tile inside its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest = 0,
    NorthEast = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Quadrant for a part id; only the low two bits are used.
    #[must_use]
    pub fn from_part_id(part_id: usize) -> Quadrant {
        Self::ALL[part_id & 3]
    }

    #[inline]
    pub fn part_id(self) -> usize {
        self as usize
    }

    /// Column offset (0 west, 1 east).
    #[inline]
    pub fn column(self) -> u32 {
        (self as u32) & 1
    }

    /// Row offset (0 north, 1 south).
    #[inline]
    pub fn row(self) -> u32 {
        (self as u32) >> 1
    }

    /// The other child touching the same parent edge when that edge is crossed
    /// toward `side`. East/west crossings pair north with south children,
    /// north/south crossings pair west with east children.
    #[must_use]
    pub fn edge_sibling(self, side: Side) -> Quadrant {
        if side.is_vertical() {
            Self::from_part_id(self.part_id() ^ 2)
        } else {
            Self::from_part_id(self.part_id() ^ 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        for side in Side::ALL {
            assert_eq!(side.opposite().opposite(), side);
            assert_ne!(side.opposite(), side);
        }
    }

    #[test]
    fn test_quadrant_offsets() {
        assert_eq!((Quadrant::NorthWest.column(), Quadrant::NorthWest.row()), (0, 0));
        assert_eq!((Quadrant::NorthEast.column(), Quadrant::NorthEast.row()), (1, 0));
        assert_eq!((Quadrant::SouthWest.column(), Quadrant::SouthWest.row()), (0, 1));
        assert_eq!((Quadrant::SouthEast.column(), Quadrant::SouthEast.row()), (1, 1));
    }

    #[test]
    fn test_edge_sibling() {
        assert_eq!(Quadrant::NorthWest.edge_sibling(Side::East), Quadrant::SouthWest);
        assert_eq!(Quadrant::NorthEast.edge_sibling(Side::West), Quadrant::SouthEast);
        assert_eq!(Quadrant::SouthWest.edge_sibling(Side::North), Quadrant::SouthEast);
        assert_eq!(Quadrant::NorthEast.edge_sibling(Side::South), Quadrant::NorthWest);
    }

    #[test]
    fn test_first_quadrant_touches_edge() {
        assert_eq!(Side::North.first_quadrant().row(), 0);
        assert_eq!(Side::South.first_quadrant().row(), 1);
        assert_eq!(Side::West.first_quadrant().column(), 0);
        assert_eq!(Side::East.first_quadrant().column(), 1);
    }

    #[test]
    fn test_edge_line() {
        assert_eq!(Side::North.edge_line(32), 0);
        assert_eq!(Side::South.edge_line(32), 32);
        assert_eq!(Side::West.edge_line(32), 0);
        assert_eq!(Side::East.edge_line(32), 32);
    }
}
