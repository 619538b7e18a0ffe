//! Clip-rect tracking
//!
//! A clip rect is the part of a node that can actually be seen: its own local
//! rect intersected with every ancestor's rect, expressed in the node's local
//! coordinates. Most nodes never ask for it, so the tree of cached clips is
//! built lazily and only covers nodes that monitor their clip rect plus the
//! ancestors needed to compute it.
//!
//! ```text
//! root (display)
//! └── panel        ClipNode (ancestor of a monitor)
//!     └── list     ClipNode (monitors)
//!         └── row  (no entry)
//! ```
//!
//! When a node moves, resizes or changes visibility its cached clip is
//! recomputed, and the change is pushed to the children only if the clip
//! actually changed.

use slotmap::SecondaryMap;
use smallvec::SmallVec;
use weft_core::{NodeId, NodeTree, Rect, Size};

#[derive(Debug)]
struct ClipNode {
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    clip: Rect,
}

/// Changed clip of a monitoring node: `(node, old, new)`
pub type ClipChange = (NodeId, Rect, Rect);

/// Lazily built mirror of the node tree caching clip rects
#[derive(Debug, Default)]
pub struct ClipTree {
    nodes: SecondaryMap<NodeId, ClipNode>,
}

impl ClipTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cached clip rect, if the node is tracked
    pub fn clip_rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node).map(|entry| entry.clip)
    }

    /// Start tracking `node` and, recursively, its ancestors below the root
    pub fn register(&mut self, tree: &NodeTree, node: NodeId) {
        if node == tree.root() || self.nodes.contains_key(node) {
            return;
        }

        self.nodes.insert(
            node,
            ClipNode {
                parent: None,
                children: SmallVec::new(),
                clip: tree.size(node).to_rect(),
            },
        );

        let parent = tree.parent(node).filter(|p| *p != tree.root());

        if let Some(parent) = parent {
            self.register(tree, parent);

            if let Some(parent_entry) = self.nodes.get_mut(parent) {
                parent_entry.children.push(node);
            }
            if let Some(entry) = self.nodes.get_mut(node) {
                entry.parent = Some(parent);
            }
        }

        let clip = self.compute(tree, node);
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.clip = clip;
        }
    }

    /// Stop tracking `node` unless it still monitors or has tracked children
    ///
    /// Ancestors that were only tracked on its behalf are pruned as well.
    pub fn unregister(&mut self, tree: &NodeTree, node: NodeId) {
        let mut current = Some(node);

        while let Some(node) = current {
            let Some(entry) = self.nodes.get(node) else {
                return;
            };
            if !entry.children.is_empty() || tree.monitors_clip_rect(node) {
                return;
            }

            current = self.detach(node);
        }
    }

    /// Drop `node` regardless of its monitoring flag, then prune ancestors
    pub fn forget(&mut self, tree: &NodeTree, node: NodeId) {
        if !self.nodes.contains_key(node) {
            return;
        }

        if let Some(entry) = self.nodes.get_mut(node) {
            for child in std::mem::take(&mut entry.children) {
                if let Some(child_entry) = self.nodes.get_mut(child) {
                    child_entry.parent = None;
                }
            }
        }

        if let Some(parent) = self.detach(node) {
            self.unregister(tree, parent);
        }
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let entry = self.nodes.remove(node)?;
        let parent = entry.parent?;

        if let Some(parent_entry) = self.nodes.get_mut(parent) {
            parent_entry.children.retain(|c| *c != node);
        }

        Some(parent)
    }

    /// Recompute the clip of `node` and push real changes down the tree
    ///
    /// Changes of monitoring nodes are appended to `changes`.
    pub fn check_change(&mut self, tree: &NodeTree, node: NodeId, changes: &mut Vec<ClipChange>) {
        let Some(old) = self.clip_rect(node) else {
            return;
        };

        let new = self.compute(tree, node);
        if new == old {
            return;
        }

        let children = match self.nodes.get_mut(node) {
            Some(entry) => {
                entry.clip = new;
                entry.children.clone()
            }
            None => return,
        };

        if tree.monitors_clip_rect(node) {
            changes.push((node, old, new));
        }

        for child in children {
            self.check_change(tree, child, changes);
        }
    }

    fn compute(&self, tree: &NodeTree, node: NodeId) -> Rect {
        let own = if tree.is_visible(node) {
            tree.size(node).to_rect()
        } else {
            Rect::ZERO
        };

        let position = tree.position(node);
        let parent_clip = self
            .nodes
            .get(node)
            .and_then(|entry| entry.parent)
            .and_then(|parent| self.clip_rect(parent));

        let parent_rect = match parent_clip {
            Some(clip) => clip.translate(-position.x, -position.y),
            None => tree
                .size(tree.root())
                .to_rect()
                .translate(-position.x, -position.y),
        };

        own.intersect(&parent_rect)
    }

    /// Clip rect computed by walking the ancestors, for untracked nodes
    pub fn display_rect(tree: &NodeTree, node: NodeId) -> Rect {
        if node == tree.root() {
            return tree.size(node).to_rect();
        }
        if tree.parent(node).is_none() {
            return Rect::ZERO;
        }

        let mut clip = if tree.is_visible(node) {
            tree.size(node).to_rect()
        } else {
            Rect::ZERO
        };

        let mut child = node;
        let (mut dx, mut dy) = (0.0, 0.0);

        while let Some(parent) = tree.parent(child) {
            let position = tree.position(child);
            dx += position.x;
            dy += position.y;

            let size = if tree.is_visible(parent) {
                tree.size(parent)
            } else {
                Size::ZERO
            };

            clip = clip.intersect(&Rect::new(-dx, -dy, size.width, size.height));
            child = parent;
        }

        clip
    }
}
