//! Node behaviours
//!
//! Behaviours are the business logic attached to a node: how it paints, how it
//! arranges its children, how it reacts to pointer events. The runtime never
//! inspects node types; it only calls these hooks and queries
//! [`Capabilities`].
//!
//! Every hook receives `&mut NodeTree` so node code can mutate the tree (move
//! children, ask for a repaint) while it runs. The resulting notifications are
//! picked up by the scheduler and the router once the hook returns.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::events::{PointerEvent, PointerEventKind};
use crate::geometry::{Rect, Size};
use crate::tree::{NodeId, NodeTree};

/// Opaque paint target handed out by a surface
///
/// Drawing primitives are platform specific; painters downcast through
/// [`Canvas::as_any_mut`] to the canvas type of their platform.
pub trait Canvas {
    /// Size of the area being painted
    fn size(&self) -> Size;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Everything a painter can touch while painting one node
pub struct PaintContext<'a> {
    pub tree: &'a mut NodeTree,
    pub node: NodeId,
    pub canvas: &'a mut dyn Canvas,
}

/// Paints a node onto its surface
pub trait Painter {
    fn paint(&self, cx: &mut PaintContext<'_>);
}

impl<F> Painter for F
where
    F: Fn(&mut PaintContext<'_>),
{
    fn paint(&self, cx: &mut PaintContext<'_>) {
        self(cx)
    }
}

/// Arranges the children of a node
pub trait Layout {
    fn layout(&self, tree: &mut NodeTree, node: NodeId);

    /// Whether resizing `node` from `old` to `new` invalidates its children
    fn requires_layout(&self, _tree: &NodeTree, _node: NodeId, _old: Size, _new: Size) -> bool {
        true
    }

    /// Whether a bounds change of `child` invalidates the layout of `node`
    fn child_requires_layout(
        &self,
        _tree: &NodeTree,
        _node: NodeId,
        _child: NodeId,
        _old: Rect,
        _new: Rect,
    ) -> bool {
        true
    }
}

/// Pointer hook, called once per node of the dispatch chain
pub type PointerHandler = Rc<dyn Fn(&mut NodeTree, &mut PointerEvent)>;

/// Called with `(node, old, new)` when a monitored clip rect changes
pub type ClipRectHandler = Rc<dyn Fn(&mut NodeTree, NodeId, Rect, Rect)>;

/// What a node is willing to take part in
///
/// The pointer router decides accept/decline purely from these flags: a node
/// that does not accept an event kind is passed through to whatever lies
/// beneath it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts Down, Up, Click, Enter and Exit
    pub pointer: bool,
    /// Accepts Move and Drag
    pub motion: bool,
    /// Platform renders this node as a native scrolling region
    pub scroll_region: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            pointer: true,
            motion: true,
            scroll_region: false,
        }
    }
}

impl Capabilities {
    /// Transparent to all pointer input
    pub const PASS_THROUGH: Capabilities = Capabilities {
        pointer: false,
        motion: false,
        scroll_region: false,
    };

    pub fn accepts(&self, kind: PointerEventKind) -> bool {
        if kind.is_motion() {
            self.motion
        } else {
            self.pointer
        }
    }
}

/// Hooks installed on a node
#[derive(Clone, Default)]
pub struct Behaviours {
    pub painter: Option<Rc<dyn Painter>>,
    pub layout: Option<Rc<dyn Layout>>,
    /// Sinking phase, plain pointer events
    pub pointer_filter: Option<PointerHandler>,
    /// Bubbling phase, plain pointer events
    pub pointer_handler: Option<PointerHandler>,
    /// Sinking phase, motion events
    pub motion_filter: Option<PointerHandler>,
    /// Bubbling phase, motion events
    pub motion_handler: Option<PointerHandler>,
    /// Synthetic clicks for a node that let a press pass through it
    pub pass_through: Option<PointerHandler>,
    pub clip_rect: Option<ClipRectHandler>,
}

impl Behaviours {
    /// Handler for the sinking phase of the given event kind
    pub fn filter_for(&self, kind: PointerEventKind) -> Option<PointerHandler> {
        if kind.is_motion() {
            self.motion_filter.clone()
        } else {
            self.pointer_filter.clone()
        }
    }

    /// Handler for the bubbling phase of the given event kind
    pub fn handler_for(&self, kind: PointerEventKind) -> Option<PointerHandler> {
        if kind.is_motion() {
            self.motion_handler.clone()
        } else {
            self.pointer_handler.clone()
        }
    }
}

impl fmt::Debug for Behaviours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviours")
            .field("painter", &self.painter.is_some())
            .field("layout", &self.layout.is_some())
            .field("pointer_filter", &self.pointer_filter.is_some())
            .field("pointer_handler", &self.pointer_handler.is_some())
            .field("motion_filter", &self.motion_filter.is_some())
            .field("motion_handler", &self.motion_handler.is_some())
            .field("pass_through", &self.pass_through.is_some())
            .field("clip_rect", &self.clip_rect.is_some())
            .finish()
    }
}
