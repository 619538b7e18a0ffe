//! Live interactions per target node
//!
//! Every event delivered to a node carries the full set of pointers currently
//! interacting with it (multi-touch). Locations are kept in the node's local
//! space; when a node moves or is transformed it is only flagged, and its
//! interactions are re-projected the next time an event targets it.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use weft_core::{Interaction, NodeId, NodeTree, PointerId};

/// Interactions of one target, at most one per pointer
pub type InteractionSet = SmallVec<[Interaction; 2]>;

#[derive(Debug, Default)]
pub struct TargetedInteractions {
    targets: FxHashMap<NodeId, InteractionSet>,
    changed_frames: FxHashSet<NodeId>,
}

impl TargetedInteractions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `interaction` to its target, replacing the same pointer's previous one
    ///
    /// Returns the target's updated set.
    pub fn record(&mut self, tree: &NodeTree, interaction: Interaction) -> InteractionSet {
        let target = interaction.target;
        let set = self.targets.entry(target).or_default();

        set.retain(|existing| existing.pointer != interaction.pointer);

        if self.changed_frames.remove(&target) {
            for existing in set.iter_mut() {
                existing.location = tree.from_absolute(target, existing.absolute_location);
            }
        }

        set.push(interaction);
        set.clone()
    }

    pub fn get(&self, node: NodeId) -> &[Interaction] {
        self.targets
            .get(&node)
            .map(|set| set.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.targets.contains_key(&node)
    }

    /// Every live interaction across all targets
    pub fn all(&self) -> impl Iterator<Item = &Interaction> + '_ {
        self.targets.values().flatten()
    }

    /// Remove `pointer`'s interaction from `node`
    ///
    /// Returns true when the node has no interactions left.
    pub fn release(&mut self, node: NodeId, pointer: PointerId) -> bool {
        let Some(set) = self.targets.get_mut(&node) else {
            return false;
        };

        set.retain(|existing| existing.pointer != pointer);
        if set.is_empty() {
            self.forget(node);
            return true;
        }
        false
    }

    /// Drop every interaction on `node`
    pub fn forget(&mut self, node: NodeId) {
        self.targets.remove(&node);
        self.changed_frames.remove(&node);
    }

    /// The node's reference frame (bounds or transform) changed
    pub fn mark_frame_changed(&mut self, node: NodeId) {
        if self.targets.contains_key(&node) {
            self.changed_frames.insert(node);
        }
    }

    pub fn is_frame_changed(&self, node: NodeId) -> bool {
        self.changed_frames.contains(&node)
    }
}
