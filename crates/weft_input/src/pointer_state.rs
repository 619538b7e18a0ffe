//! Per-pointer routing state
//!
//! Each pointer id owns at most one covered node (what it hovers) and at most
//! one clicked node (what it pressed on and has not released yet), plus the
//! nodes it passed through without being captured by them.

use rustc_hash::{FxHashMap, FxHashSet};
use weft_core::{NodeId, PointerId};

#[derive(Debug, Default)]
pub struct PointerStates {
    covered: FxHashMap<PointerId, NodeId>,
    clicked: FxHashMap<PointerId, NodeId>,
    /// Nodes a Down passed through, waiting for the matching Up
    clicked_pass_through: FxHashMap<PointerId, FxHashSet<NodeId>>,
    /// Subset of the above the pointer is currently over
    covered_pass_through: FxHashMap<PointerId, FxHashSet<NodeId>>,
    pressed: FxHashSet<PointerId>,
}

impl PointerStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn covered(&self, pointer: PointerId) -> Option<NodeId> {
        self.covered.get(&pointer).copied()
    }

    pub fn clicked(&self, pointer: PointerId) -> Option<NodeId> {
        self.clicked.get(&pointer).copied()
    }

    /// Replace the covered node, returning the previous one
    pub fn set_covered(&mut self, pointer: PointerId, node: NodeId) -> Option<NodeId> {
        self.covered.insert(pointer, node)
    }

    pub fn take_covered(&mut self, pointer: PointerId) -> Option<NodeId> {
        self.covered.remove(&pointer)
    }

    /// Replace the clicked node, returning the previous one
    pub fn set_clicked(&mut self, pointer: PointerId, node: NodeId) -> Option<NodeId> {
        self.clicked.insert(pointer, node)
    }

    pub fn take_clicked(&mut self, pointer: PointerId) -> Option<NodeId> {
        self.clicked.remove(&pointer)
    }

    pub fn press(&mut self, pointer: PointerId) {
        self.pressed.insert(pointer);
    }

    pub fn release(&mut self, pointer: PointerId) {
        self.pressed.remove(&pointer);
    }

    pub fn is_pressed(&self, pointer: PointerId) -> bool {
        self.pressed.contains(&pointer)
    }

    /// Whether any pointer covers or holds `node`
    pub fn references(&self, node: NodeId) -> bool {
        self.covered.values().chain(self.clicked.values()).any(|n| *n == node)
    }

    /// Remember that a Down passed through `node`
    ///
    /// The pointer is over the node at that moment, so it also counts as
    /// covered pass-through.
    pub fn add_clicked_pass_through(&mut self, pointer: PointerId, node: NodeId) {
        self.clicked_pass_through.entry(pointer).or_default().insert(node);
        self.add_covered_pass_through(pointer, node);
    }

    /// Forget a clicked pass-through node; true if it was known
    pub fn remove_clicked_pass_through(&mut self, pointer: PointerId, node: NodeId) -> bool {
        let removed = remove_from(&mut self.clicked_pass_through, pointer, node);
        self.remove_covered_pass_through(pointer, node);
        removed
    }

    pub fn is_clicked_pass_through(&self, pointer: PointerId, node: NodeId) -> bool {
        contains(&self.clicked_pass_through, pointer, node)
    }

    /// Returns true if `node` was not covered yet
    pub fn add_covered_pass_through(&mut self, pointer: PointerId, node: NodeId) -> bool {
        self.covered_pass_through.entry(pointer).or_default().insert(node)
    }

    pub fn remove_covered_pass_through(&mut self, pointer: PointerId, node: NodeId) -> bool {
        remove_from(&mut self.covered_pass_through, pointer, node)
    }

    pub fn is_covered_pass_through(&self, pointer: PointerId, node: NodeId) -> bool {
        contains(&self.covered_pass_through, pointer, node)
    }

    /// Pass-through nodes the pointer is currently over
    pub fn covered_pass_through(&self, pointer: PointerId) -> Vec<NodeId> {
        self.covered_pass_through
            .get(&pointer)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop all pass-through bookkeeping of a pointer
    pub fn clear_pass_through(&mut self, pointer: PointerId) {
        self.clicked_pass_through.remove(&pointer);
        self.covered_pass_through.remove(&pointer);
    }
}

fn contains(map: &FxHashMap<PointerId, FxHashSet<NodeId>>, pointer: PointerId, node: NodeId) -> bool {
    map.get(&pointer).is_some_and(|nodes| nodes.contains(&node))
}

fn remove_from(
    map: &mut FxHashMap<PointerId, FxHashSet<NodeId>>,
    pointer: PointerId,
    node: NodeId,
) -> bool {
    let Some(nodes) = map.get_mut(&pointer) else {
        return false;
    };

    let removed = nodes.remove(&node);
    if nodes.is_empty() {
        map.remove(&pointer);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn nodes() -> (NodeId, NodeId) {
        let mut keys: SlotMap<NodeId, ()> = SlotMap::with_key();
        (keys.insert(()), keys.insert(()))
    }

    #[test]
    fn test_one_capture_per_pointer() {
        let (a, b) = nodes();
        let mut states = PointerStates::new();

        assert_eq!(states.set_clicked(PointerId(1), a), None);
        assert_eq!(states.set_clicked(PointerId(1), b), Some(a));
        assert_eq!(states.clicked(PointerId(1)), Some(b));
        assert_eq!(states.clicked(PointerId(2)), None);

        assert_eq!(states.take_clicked(PointerId(1)), Some(b));
        assert_eq!(states.clicked(PointerId(1)), None);
    }

    #[test]
    fn test_pointers_are_independent() {
        let (a, b) = nodes();
        let mut states = PointerStates::new();

        states.set_covered(PointerId(1), a);
        states.set_covered(PointerId(2), b);
        states.press(PointerId(2));

        assert_eq!(states.covered(PointerId(1)), Some(a));
        assert_eq!(states.covered(PointerId(2)), Some(b));
        assert!(!states.is_pressed(PointerId(1)));
        assert!(states.is_pressed(PointerId(2)));
    }

    #[test]
    fn test_clicked_pass_through_is_also_covered() {
        let (a, _) = nodes();
        let mut states = PointerStates::new();

        states.add_clicked_pass_through(PointerId(1), a);
        assert!(states.is_clicked_pass_through(PointerId(1), a));
        assert!(states.is_covered_pass_through(PointerId(1), a));
        assert!(!states.is_clicked_pass_through(PointerId(2), a));
        assert_eq!(states.covered_pass_through(PointerId(1)), vec![a]);

        assert!(states.remove_clicked_pass_through(PointerId(1), a));
        assert!(!states.is_clicked_pass_through(PointerId(1), a));
        assert!(!states.is_covered_pass_through(PointerId(1), a));
        assert!(!states.remove_clicked_pass_through(PointerId(1), a));
        assert!(states.covered_pass_through(PointerId(1)).is_empty());
    }

    #[test]
    fn test_references_any_pointer() {
        let (a, b) = nodes();
        let mut states = PointerStates::new();

        states.set_covered(PointerId(1), a);
        states.set_clicked(PointerId(2), b);
        assert!(states.references(a));
        assert!(states.references(b));

        states.take_covered(PointerId(1));
        assert!(!states.references(a));
    }
}
