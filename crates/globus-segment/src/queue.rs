//! FIFO of quadtree nodes with an "already queued" guard.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::tree::NodeId;

/// A work queue that holds each node at most once.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    order: VecDeque<NodeId>,
    pending: FxHashSet<NodeId>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless it is already queued. Returns `true` if it was added.
    pub fn queue(&mut self, id: NodeId) -> bool {
        if self.pending.insert(id) {
            self.order.push_back(id);
            true
        } else {
            false
        }
    }

    /// Put `id` at the front unless it is already queued.
    pub fn shift(&mut self, id: NodeId) -> bool {
        if self.pending.insert(id) {
            self.order.push_front(id);
            true
        } else {
            false
        }
    }

    /// Take the oldest entry.
    pub fn pop(&mut self) -> Option<NodeId> {
        let id = self.order.pop_front()?;
        self.pending.remove(&id);
        Some(id)
    }

    /// Drop `id` from the queue if present.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.pending.remove(&id) {
            self.order.retain(|&queued| queued != id);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.pending.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.pending.clear();
    }
}
