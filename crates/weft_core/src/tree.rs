//! Node tree
//!
//! The retained node model shared by the render scheduler and the pointer
//! router. All nodes live in one arena owned by [`NodeTree`] and are addressed
//! by [`NodeId`]. The tree is created with a root node that stands for the
//! display: its bounds are the display size and its direct children are the
//! top-level nodes.
//!
//! ```text
//! NodeTree
//! ├── nodes: SlotMap<NodeId, Node>
//! ├── root (display)
//! │   ├── top-level node
//! │   │   └── ...
//! │   └── top-level node
//! └── notifier (change mailboxes)
//! ```
//!
//! Mutators only notify when a value actually changes. Structural mutations
//! refuse to create cycles.

use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use tracing::trace;

use crate::behaviour::{
    Behaviours, Capabilities, ClipRectHandler, Layout, Painter, PointerHandler,
};
use crate::cursor::Cursor;
use crate::error::{Result, TreeError};
use crate::geometry::{Affine2D, Point, Rect, Size};
use crate::notify::{NodeChange, Notifier};

new_key_type! {
    /// Identity of a node in a [`NodeTree`]
    pub struct NodeId;
}

#[derive(Debug)]
struct Node {
    bounds: Rect,
    transform: Affine2D,
    visible: bool,
    enabled: bool,
    z_order: i32,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    monitors_clip_rect: bool,
    clips_contents: bool,
    cursor: Option<Cursor>,
    tooltip: String,
    capabilities: Capabilities,
    behaviours: Behaviours,
}

impl Node {
    fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            transform: Affine2D::IDENTITY,
            visible: true,
            enabled: true,
            z_order: 0,
            parent: None,
            children: SmallVec::new(),
            monitors_clip_rect: false,
            clips_contents: true,
            cursor: None,
            tooltip: String::new(),
            capabilities: Capabilities::default(),
            behaviours: Behaviours::default(),
        }
    }
}

/// Arena of nodes rooted at the display
#[derive(Debug)]
pub struct NodeTree {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    notifier: Notifier,
}

impl NodeTree {
    /// Create a tree whose root covers a display of the given size
    pub fn new(display_size: Size) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(display_size.to_rect()));

        Self {
            nodes,
            root,
            notifier: Notifier::new(),
        }
    }

    /// The display node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node
    pub fn create_node(&mut self, bounds: Rect) -> NodeId {
        self.nodes.insert(Node::new(bounds))
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

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Bounds in the parent's coordinate space
    pub fn bounds(&self, node: NodeId) -> Rect {
        self.nodes.get(node).map_or(Rect::ZERO, |n| n.bounds)
    }

    pub fn size(&self, node: NodeId) -> Size {
        self.bounds(node).size
    }

    pub fn position(&self, node: NodeId) -> Point {
        self.bounds(node).origin
    }

    pub fn transform(&self, node: NodeId) -> Affine2D {
        self.nodes
            .get(node)
            .map_or(Affine2D::IDENTITY, |n| n.transform)
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.visible)
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.enabled)
    }

    pub fn z_order(&self, node: NodeId) -> i32 {
        self.nodes.get(node).map_or(0, |n| n.z_order)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map_or(&[], |n| n.children.as_slice())
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        !self.children(node).is_empty()
    }

    /// Position of `node` among its siblings
    pub fn child_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    pub fn monitors_clip_rect(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.monitors_clip_rect)
    }

    /// Whether painting and children are clipped to the node's bounds
    pub fn clips_contents(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.clips_contents)
    }

    pub fn cursor(&self, node: NodeId) -> Option<Cursor> {
        self.nodes.get(node).and_then(|n| n.cursor)
    }

    pub fn tooltip_text(&self, node: NodeId) -> &str {
        self.nodes.get(node).map_or("", |n| n.tooltip.as_str())
    }

    pub fn capabilities(&self, node: NodeId) -> Capabilities {
        self.nodes
            .get(node)
            .map_or(Capabilities::PASS_THROUGH, |n| n.capabilities)
    }

    pub fn behaviours(&self, node: NodeId) -> Option<&Behaviours> {
        self.nodes.get(node).map(|n| &n.behaviours)
    }

    pub fn painter(&self, node: NodeId) -> Option<Rc<dyn Painter>> {
        self.nodes.get(node).and_then(|n| n.behaviours.painter.clone())
    }

    pub fn layout(&self, node: NodeId) -> Option<Rc<dyn Layout>> {
        self.nodes.get(node).and_then(|n| n.behaviours.layout.clone())
    }

    // =========================================================================
    // State mutators
    // =========================================================================

    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let old = n.bounds;
        if old == bounds {
            return;
        }
        n.bounds = bounds;
        self.notifier.notify(NodeChange::Bounds {
            node,
            old,
            new: bounds,
        });
    }

    pub fn set_size(&mut self, node: NodeId, size: Size) {
        let origin = self.position(node);
        self.set_bounds(node, Rect::from_origin_size(origin, size));
    }

    pub fn set_position(&mut self, node: NodeId, position: Point) {
        let size = self.size(node);
        self.set_bounds(node, Rect::from_origin_size(position, size));
    }

    pub fn set_transform(&mut self, node: NodeId, transform: Affine2D) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let old = n.transform;
        if old == transform {
            return;
        }
        n.transform = transform;
        self.notifier.notify(NodeChange::Transform {
            node,
            old,
            new: transform,
        });
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        if n.visible == visible {
            return;
        }
        n.visible = visible;
        self.notifier.notify(NodeChange::Visibility {
            node,
            old: !visible,
            new: visible,
        });
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        if n.enabled == enabled {
            return;
        }
        n.enabled = enabled;
        self.notifier.notify(NodeChange::Enabled {
            node,
            old: !enabled,
            new: enabled,
        });
    }

    pub fn set_z_order(&mut self, node: NodeId, z_order: i32) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let old = n.z_order;
        if old == z_order {
            return;
        }
        n.z_order = z_order;
        self.notifier.notify(NodeChange::ZOrder {
            node,
            old,
            new: z_order,
        });
    }

    pub fn set_cursor(&mut self, node: NodeId, cursor: Option<Cursor>) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let old = n.cursor;
        if old == cursor {
            return;
        }
        n.cursor = cursor;
        self.notifier.notify(NodeChange::Cursor {
            node,
            old,
            new: cursor,
        });
    }

    pub fn set_monitors_clip_rect(&mut self, node: NodeId, monitors: bool) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        if n.monitors_clip_rect == monitors {
            return;
        }
        n.monitors_clip_rect = monitors;
        self.notifier.notify(NodeChange::ClipMonitoring {
            node,
            old: !monitors,
            new: monitors,
        });
    }

    /// Takes effect on the node's next paint
    pub fn set_clips_contents(&mut self, node: NodeId, clips: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.clips_contents = clips;
        }
    }

    pub fn set_tooltip_text(&mut self, node: NodeId, text: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.tooltip = text.into();
        }
    }

    pub fn set_capabilities(&mut self, node: NodeId, capabilities: Capabilities) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.capabilities = capabilities;
        }
    }

    // =========================================================================
    // Behaviours
    // =========================================================================

    pub fn set_painter(&mut self, node: NodeId, painter: impl Painter + 'static) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.painter = Some(Rc::new(painter));
        }
    }

    pub fn set_layout(&mut self, node: NodeId, layout: impl Layout + 'static) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.layout = Some(Rc::new(layout));
        }
    }

    /// Bubbling handler for Down, Up, Click, Enter and Exit
    pub fn on_pointer(&mut self, node: NodeId, handler: PointerHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.pointer_handler = Some(handler);
        }
    }

    /// Sinking filter for Down, Up, Click, Enter and Exit
    pub fn on_pointer_filter(&mut self, node: NodeId, handler: PointerHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.pointer_filter = Some(handler);
        }
    }

    /// Bubbling handler for Move and Drag
    pub fn on_motion(&mut self, node: NodeId, handler: PointerHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.motion_handler = Some(handler);
        }
    }

    /// Sinking filter for Move and Drag
    pub fn on_motion_filter(&mut self, node: NodeId, handler: PointerHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.motion_filter = Some(handler);
        }
    }

    pub fn on_pass_through(&mut self, node: NodeId, handler: PointerHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.pass_through = Some(handler);
        }
    }

    pub fn on_clip_rect_changed(&mut self, node: NodeId, handler: ClipRectHandler) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.behaviours.clip_rect = Some(handler);
        }
    }

    /// Ask for the node to be painted again
    pub fn rerender(&mut self, node: NodeId) {
        if self.contains(node) {
            self.notifier.notify(NodeChange::RenderRequested { node });
        }
    }

    /// Ask for the node's children to be laid out again
    pub fn relayout(&mut self, node: NodeId) {
        if self.contains(node) {
            self.notifier.notify(NodeChange::LayoutRequested { node });
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Append `child` to the children of `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` at `index` among the children of `parent`
    ///
    /// A child that already has a parent is moved. Indices past the end append.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        if !self.contains(child) {
            return Err(TreeError::UnknownNode(child));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }

        let old_parent = self.parent(child);

        if old_parent == Some(parent) {
            return self.move_child(parent, index, child);
        }

        if let Some(old_parent) = old_parent {
            self.remove_child(old_parent, child)?;
        }

        let siblings = &mut self.nodes[parent].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child].parent = Some(parent);

        trace!(?parent, ?child, index, "child added");
        self.notifier.notify(NodeChange::ChildAdded {
            parent,
            child,
            index,
        });

        Ok(())
    }

    fn move_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        let siblings = &mut self.nodes[parent].children;
        let Some(from) = siblings.iter().position(|c| *c == child) else {
            return Err(TreeError::NotAChild { parent, child });
        };

        let to = index.min(siblings.len() - 1);
        if from == to {
            return Ok(());
        }

        siblings.remove(from);
        siblings.insert(to, child);

        self.notifier.notify(NodeChange::ChildMoved {
            parent,
            child,
            index: to,
        });

        Ok(())
    }

    /// Detach `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let Some(p) = self.nodes.get_mut(parent) else {
            return Err(TreeError::UnknownNode(parent));
        };
        let Some(position) = p.children.iter().position(|c| *c == child) else {
            return Err(TreeError::NotAChild { parent, child });
        };

        p.children.remove(position);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }

        trace!(?parent, ?child, "child removed");
        self.notifier
            .notify(NodeChange::ChildRemoved { parent, child });

        Ok(())
    }

    /// Detach `node` from its parent, if it has one
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            // parent/child links are kept in sync, so this cannot fail
            let _ = self.remove_child(parent, node);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Iterate the ancestors of `node`, nearest first
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// True when `ancestor` is a strict ancestor of `node`
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    /// True for the root and every node attached below it
    pub fn is_rooted(&self, node: NodeId) -> bool {
        node == self.root || self.is_ancestor_of(self.root, node)
    }

    /// Number of ancestors
    pub fn depth(&self, node: NodeId) -> usize {
        self.ancestors(node).count()
    }

    /// True when the node and all of its ancestors are visible
    pub fn is_recursively_visible(&self, node: NodeId) -> bool {
        self.is_visible(node) && self.ancestors(node).all(|n| self.is_visible(n))
    }

    // =========================================================================
    // Coordinates
    // =========================================================================

    /// Map a point in the node's local space into its parent's space
    pub fn to_parent(&self, node: NodeId, point: Point) -> Point {
        let position = self.position(node);
        self.transform(node)
            .transform_point(point.offset(position.x, position.y))
    }

    /// Map a point in the parent's space into the node's local space
    pub fn to_local(&self, node: NodeId, point: Point) -> Point {
        let position = self.position(node);
        let untransformed = self
            .transform(node)
            .inverse()
            .map_or(point, |inverse| inverse.transform_point(point));

        untransformed.offset(-position.x, -position.y)
    }

    /// Map a point in the node's local space into display coordinates
    pub fn to_absolute(&self, node: NodeId, point: Point) -> Point {
        let mut current = node;
        let mut point = self.to_parent(node, point);

        while let Some(parent) = self.parent(current) {
            point = self.to_parent(parent, point);
            current = parent;
        }

        point
    }

    /// Map a point in display coordinates into the node's local space
    pub fn from_absolute(&self, node: NodeId, point: Point) -> Point {
        let mut chain: SmallVec<[NodeId; 8]> = SmallVec::new();
        chain.push(node);
        chain.extend(self.ancestors(node));

        chain
            .iter()
            .rev()
            .fold(point, |point, n| self.to_local(*n, point))
    }

    /// True when a point in the parent's space falls inside the node
    pub fn contains_point(&self, node: NodeId, point: Point) -> bool {
        self.size(node).to_rect().contains(self.to_local(node, point))
    }
}
