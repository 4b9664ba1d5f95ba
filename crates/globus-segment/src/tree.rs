//! Quadtree registry of segments.
//!
//! Nodes live in a slab addressed by generational [`NodeId`]s. Parent, child
//! and neighbor links are plain ids: a destroyed node frees its slot and bumps
//! the slot generation, so stale ids stop resolving instead of dangling.

use globus_math::Ellipsoid;
use globus_terrain::TileKey;
use rustc_hash::FxHashMap;

use crate::error::TreeError;
use crate::quad::{Quadrant, Side};
use crate::segment::Segment;

/// Deepest zoom a tile key can address.
pub const MAX_TREE_ZOOM: u8 = 30;

/// Handle to a quadtree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

/// A quadtree node and the segment it owns.
#[derive(Debug)]
pub struct Node {
    pub segment: Segment,
    pub parent: Option<NodeId>,
    /// Children in [`Quadrant`] order.
    pub children: Option<[NodeId; 4]>,
    /// Position under the parent; `None` for the root.
    pub quadrant: Option<Quadrant>,
    /// Adjacent rendered node per side, refreshed every frame.
    pub neighbors: [Option<NodeId>; 4],
    /// Cells each edge presents after matching coarser neighbors, by side.
    pub side_size: [u32; 4],
}

impl Node {
    fn new(segment: Segment, parent: Option<NodeId>, quadrant: Option<Quadrant>) -> Self {
        Self {
            segment,
            parent,
            children: None,
            quadrant,
            neighbors: [None; 4],
            side_size: [0; 4],
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Slab of quadtree nodes indexed by tile key.
#[derive(Debug, Default)]
pub struct QuadTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_key: FxHashMap<TileKey, NodeId>,
}

impl QuadTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let key = node.segment.key;
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        };
        self.by_key.insert(key, id);
        id
    }

    /// Add a parentless node.
    pub fn insert_root(&mut self, segment: Segment) -> NodeId {
        self.insert(Node::new(segment, None, None))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn segment(&self, id: NodeId) -> Option<&Segment> {
        self.get(id).map(|node| &node.segment)
    }

    pub fn segment_mut(&mut self, id: NodeId) -> Option<&mut Segment> {
        self.get_mut(id).map(|node| &mut node.segment)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The node holding tile `key`.
    pub fn find(&self, key: TileKey) -> Option<NodeId> {
        self.by_key.get(&key).copied()
    }

    /// Every live node id.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_key.values().copied()
    }

    /// Two distinct live nodes, both mutably.
    pub fn pair_mut(&mut self, a: NodeId, b: NodeId) -> Option<(&mut Node, &mut Node)> {
        if a.index == b.index || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ia, ib) = (a.index as usize, b.index as usize);
        let (first, second) = if ia < ib {
            let (head, tail) = self.slots.split_at_mut(ib);
            (&mut head[ia], &mut tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(ia);
            (&mut tail[0], &mut head[ib])
        };
        Some((first.node.as_mut()?, second.node.as_mut()?))
    }

    /// Split a leaf into four children.
    pub fn subdivide(&mut self, id: NodeId, ellipsoid: &Ellipsoid) -> Result<[NodeId; 4], TreeError> {
        let node = self.get(id).ok_or(TreeError::StaleNode(id))?;
        if node.children.is_some() {
            return Err(TreeError::AlreadySubdivided(id));
        }
        let zoom = node.segment.zoom();
        if zoom >= MAX_TREE_ZOOM {
            return Err(TreeError::ZoomLimit(zoom));
        }
        let extent = node.segment.extent;

        let children = Quadrant::ALL.map(|quadrant| {
            let segment = Segment::new(zoom + 1, extent.quadrant(quadrant.part_id()), ellipsoid);
            self.insert(Node::new(segment, Some(id), Some(quadrant)))
        });
        if let Some(node) = self.get_mut(id) {
            node.children = Some(children);
        }
        Ok(children)
    }

    /// Remove a node and all its descendants, returning their segments so the
    /// caller can release what they own.
    ///
    /// A node has four children or none, so removing a child collapses its
    /// parent and takes the siblings with it.
    pub fn destroy_subtree(&mut self, id: NodeId) -> Vec<(NodeId, Segment)> {
        if let Some(parent) = self.get(id).and_then(|node| node.parent)
            && self
                .get(parent)
                .and_then(|node| node.children)
                .is_some_and(|children| children.contains(&id))
        {
            return self.collapse(parent);
        }
        self.remove_recursive(id)
    }

    fn remove_recursive(&mut self, id: NodeId) -> Vec<(NodeId, Segment)> {
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(current.index as usize)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.by_key.remove(&node.segment.key);
            if let Some(children) = node.children {
                stack.extend(children);
            }
            removed.push((current, node.segment));
        }
        removed
    }

    /// Remove every descendant of `id`, making it a leaf again.
    pub fn collapse(&mut self, id: NodeId) -> Vec<(NodeId, Segment)> {
        let Some(children) = self.get_mut(id).and_then(|node| node.children.take()) else {
            return Vec::new();
        };
        children
            .into_iter()
            .flat_map(|child| self.remove_recursive(child))
            .collect()
    }

    /// The rendered node across `side`.
    ///
    /// A same-zoom tile is descended toward the shared edge to its first leaf.
    /// Without one, the nearest existing coarser tile covering that area is
    /// returned. Tiles past the map edge have no neighbor.
    pub fn neighbor(&self, id: NodeId, side: Side) -> Option<NodeId> {
        let key = self.get(id)?.segment.key;
        let span = 1u32 << key.zoom;
        let (nx, ny) = match side {
            Side::North => (key.x, key.y.checked_sub(1)?),
            Side::South => (key.x, (key.y + 1 < span).then_some(key.y + 1)?),
            Side::West => (key.x.checked_sub(1)?, key.y),
            Side::East => ((key.x + 1 < span).then_some(key.x + 1)?, key.y),
        };

        if let Some(mut current) = self.find(TileKey::new(key.zoom, nx, ny)) {
            let toward = side.opposite().first_quadrant();
            while let Some(children) = self.get(current)?.children {
                current = children[toward.part_id()];
            }
            return Some(current);
        }

        (1..=key.zoom).find_map(|dz| self.find(TileKey::new(key.zoom - dz, nx >> dz, ny >> dz)))
    }

    /// Every leaf under `id` touching its `side` edge, in edge order.
    pub fn leaves_along_edge(&self, id: NodeId, side: Side) -> Vec<NodeId> {
        let first = side.first_quadrant();
        let second = first.edge_sibling(side);
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.get(current).and_then(|node| node.children) {
                Some(children) => {
                    stack.push(children[second.part_id()]);
                    stack.push(children[first.part_id()]);
                }
                None if self.contains(current) => out.push(current),
                None => {}
            }
        }
        out
    }

    /// Recompute `id`'s neighbor links and side sizes.
    ///
    /// An edge facing a coarser tile presents that tile's cell count along the
    /// shared stretch; an edge facing an equal tile presents the smaller grid;
    /// an edge facing finer tiles or the map border presents the full grid.
    pub fn refresh_neighbors(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let zoom = node.segment.zoom();
        let own = node.segment.render_mesh().1;

        let mut neighbors = [None; 4];
        let mut side_size = [own; 4];
        for side in Side::ALL {
            let Some(n) = self.neighbor(id, side) else {
                continue;
            };
            neighbors[side.index()] = Some(n);
            let Some(ns) = self.segment(n) else {
                continue;
            };
            let grid = ns.render_mesh().1;
            if grid == 0 {
                continue;
            }
            let nz = ns.zoom();
            side_size[side.index()] = if nz < zoom {
                own.min((grid >> (zoom - nz)).max(1))
            } else if nz == zoom {
                own.min(grid)
            } else {
                own
            };
        }

        if let Some(node) = self.get_mut(id) {
            node.neighbors = neighbors;
            node.side_size = side_size;
        }
    }
}
