//! Headless surfaces
//!
//! A surface backend that draws nothing and records every operation it
//! receives. Used by tests and by drivers that only need the scheduling
//! behaviour (snapshotting, offscreen layout).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use weft_core::{Affine2D, Canvas, NodeId, Rect, Size};

use crate::surface::{Surface, SurfaceFactory};

/// One recorded surface operation
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    Created {
        node: NodeId,
        parent: Option<NodeId>,
        is_container: bool,
    },
    CreatedDetached,
    Bounds(NodeId, Rect),
    Transform(NodeId, Affine2D),
    ZOrder(NodeId, i32),
    Index(NodeId, usize),
    Visible(NodeId, bool),
    ClipsContents(NodeId, bool),
    Painted(NodeId),
    Released(NodeId),
}

/// Shared operation log
pub type SurfaceLog = Rc<RefCell<Vec<SurfaceOp>>>;

/// Canvas handed to painters by headless surfaces
#[derive(Debug, Default)]
pub struct HeadlessCanvas {
    size: Size,
}

impl Canvas for HeadlessCanvas {
    fn size(&self) -> Size {
        self.size
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Surface that records what it is told
#[derive(Debug)]
pub struct HeadlessSurface {
    node: Option<NodeId>,
    bounds: Rect,
    visible: bool,
    log: SurfaceLog,
}

impl HeadlessSurface {
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn record(&self, op: impl FnOnce(NodeId) -> SurfaceOp) {
        if let Some(node) = self.node {
            self.log.borrow_mut().push(op(node));
        }
    }
}

impl Surface for HeadlessSurface {
    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.record(|node| SurfaceOp::Bounds(node, bounds));
    }

    fn set_transform(&mut self, transform: Affine2D) {
        self.record(|node| SurfaceOp::Transform(node, transform));
    }

    fn set_z_order(&mut self, z_order: i32) {
        self.record(|node| SurfaceOp::ZOrder(node, z_order));
    }

    fn set_index(&mut self, index: usize) {
        self.record(|node| SurfaceOp::Index(node, index));
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.record(|node| SurfaceOp::Visible(node, visible));
    }

    fn set_clips_contents(&mut self, clips: bool) {
        self.record(|node| SurfaceOp::ClipsContents(node, clips));
    }

    fn render(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
        let mut canvas = HeadlessCanvas {
            size: self.bounds.size,
        };
        paint(&mut canvas);
        self.record(SurfaceOp::Painted);
    }
}

/// Factory for [`HeadlessSurface`]s sharing one operation log
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    log: SurfaceLog,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the operation log, shared with every surface
    pub fn log(&self) -> SurfaceLog {
        self.log.clone()
    }
}

impl SurfaceFactory for HeadlessFactory {
    type Surface = HeadlessSurface;

    fn create(
        &mut self,
        parent: Option<&mut HeadlessSurface>,
        node: NodeId,
        is_container: bool,
        _attach_if_rootless: bool,
    ) -> HeadlessSurface {
        self.log.borrow_mut().push(SurfaceOp::Created {
            node,
            parent: parent.and_then(|p| p.node),
            is_container,
        });

        HeadlessSurface {
            node: Some(node),
            bounds: Rect::ZERO,
            visible: true,
            log: self.log.clone(),
        }
    }

    fn create_detached(&mut self) -> HeadlessSurface {
        self.log.borrow_mut().push(SurfaceOp::CreatedDetached);

        HeadlessSurface {
            node: None,
            bounds: Rect::ZERO,
            visible: true,
            log: self.log.clone(),
        }
    }

    fn release(&mut self, node: NodeId, _surface: HeadlessSurface) {
        self.log.borrow_mut().push(SurfaceOp::Released(node));
    }
}
