//! Display
//!
//! The display owns the node tree and the two subsystems that follow it. All
//! tree mutation goes through [`Display::update`], which flushes the resulting
//! notifications to the render scheduler and the pointer router before
//! returning.
//!
//! ```text
//! platform input ──► on_pointer_event ──► PointerRouter ──► node handlers
//!                                                               │
//! update(|tree| ..) ─────────────────────────────► NodeTree ◄───┘
//!                                                     │ notifications
//! platform frame ──► on_frame ──► RenderScheduler ◄───┘
//!                                      │
//!                                      ▼
//!                                   Surfaces
//! ```

use tracing::debug;
use weft_core::{Cursor, NodeId, NodeTree, Rect, Size};
use weft_input::{EventPreprocessor, InputService, PointerRouter, RawPointerEvent};
use weft_render::{FrameScheduler, FrameStats, RenderConfig, RenderScheduler, SurfaceFactory};

/// A node tree shown on one platform display
pub struct Display<F: SurfaceFactory> {
    tree: NodeTree,
    scheduler: RenderScheduler<F>,
    router: PointerRouter,
}

impl<F: SurfaceFactory> Display<F> {
    pub fn new(
        size: Size,
        factory: F,
        frames: impl FrameScheduler + 'static,
        input: impl InputService + 'static,
    ) -> Self {
        Self::with_config(size, factory, frames, input, RenderConfig::default())
    }

    pub fn with_config(
        size: Size,
        factory: F,
        frames: impl FrameScheduler + 'static,
        input: impl InputService + 'static,
        config: RenderConfig,
    ) -> Self {
        let mut tree = NodeTree::new(size);
        let scheduler = RenderScheduler::with_config(&mut tree, factory, frames, config);
        let router = PointerRouter::new(&mut tree, input);

        debug!(width = size.width, height = size.height, "display created");

        Self {
            tree,
            scheduler,
            router,
        }
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// The display node; top-level content is added under it
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn size(&self) -> Size {
        self.tree.size(self.tree.root())
    }

    pub fn scheduler(&self) -> &RenderScheduler<F> {
        &self.scheduler
    }

    pub fn router(&self) -> &PointerRouter {
        &self.router
    }

    /// Mutate the tree, then let both subsystems catch up
    pub fn update<R>(&mut self, f: impl FnOnce(&mut NodeTree) -> R) -> R {
        let result = f(&mut self.tree);
        self.flush();
        result
    }

    fn flush(&mut self) {
        self.scheduler.pump(&mut self.tree);
        self.router.pump(&mut self.tree);
    }

    /// Frame callback from the platform
    pub fn on_frame(&mut self) -> FrameStats {
        let stats = self.scheduler.on_frame(&mut self.tree);
        self.router.pump(&mut self.tree);
        stats
    }

    /// Pointer input from the platform
    pub fn on_pointer_event(&mut self, event: &mut RawPointerEvent) {
        self.router.on_pointer_event(&mut self.tree, event);
        self.flush();
    }

    pub fn resize(&mut self, size: Size) {
        let root = self.tree.root();
        self.update(|tree| tree.set_size(root, size));
    }

    /// Force a cursor for the whole display, `None` to follow the nodes
    pub fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.router.set_display_cursor(cursor);
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.router.display_cursor()
    }

    pub fn set_preprocessor(&mut self, preprocessor: impl EventPreprocessor + 'static) {
        self.router.set_preprocessor(preprocessor);
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    // Pending notifications are pumped first so `node` is known to the scheduler

    pub fn mark_for_render(&mut self, node: NodeId) {
        self.flush();
        self.scheduler.mark_for_render(&self.tree, node);
    }

    pub fn mark_for_render_immediate(&mut self, node: NodeId) {
        self.flush();
        self.scheduler.mark_for_render_immediate(&mut self.tree, node);
        self.flush();
    }

    pub fn mark_for_layout(&mut self, node: NodeId) {
        self.flush();
        self.scheduler.mark_for_layout(&self.tree, node);
    }

    pub fn layout_immediate(&mut self, node: NodeId) {
        self.flush();
        self.scheduler.layout_immediate(&mut self.tree, node);
        self.flush();
    }

    /// Visible part of `node` in its own coordinates
    pub fn clip_rect_of(&self, node: NodeId) -> Rect {
        self.scheduler.clip_rect_of(&self.tree, node)
    }

    /// Surface created outside of the node tree
    pub fn create_detached_surface(&mut self) -> F::Surface {
        self.scheduler.create_detached_surface()
    }

    /// Cancel pending frames and detach both subsystems from the tree
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown(&mut self.tree);
        self.router.shutdown(&mut self.tree);
    }
}
