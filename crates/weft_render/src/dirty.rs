//! Dirty-set collections
//!
//! The scheduler's state is a handful of node sets. Pending renders keep
//! insertion order so paints happen in the order they were requested; pending
//! layouts are ordered ancestor-first so a parent always lays out before the
//! children it may resize.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};
use weft_core::NodeId;

/// Insertion-ordered node set
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Nodes waiting for layout, shallowest first
#[derive(Debug, Default)]
pub struct LayoutQueue {
    order: BTreeSet<(usize, NodeId)>,
    depths: FxHashMap<NodeId, usize>,
}

impl LayoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `node` at the given tree depth; returns false if already queued
    pub fn insert(&mut self, node: NodeId, depth: usize) -> bool {
        if self.depths.contains_key(&node) {
            return false;
        }

        self.depths.insert(node, depth);
        self.order.insert((depth, node));
        true
    }

    pub fn remove(&mut self, node: NodeId) -> bool {
        match self.depths.remove(&node) {
            Some(depth) => self.order.remove(&(depth, node)),
            None => false,
        }
    }

    /// Shallowest queued node
    pub fn first(&self) -> Option<NodeId> {
        self.order.first().map(|(_, node)| *node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.depths.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.depths.clear();
    }
}
