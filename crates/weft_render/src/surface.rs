//! Surfaces
//!
//! A surface is the platform paint target mirroring one rendered node (a DOM
//! element, a GPU layer, ...). The render scheduler is the only component that
//! creates, updates and releases surfaces; platforms plug in through
//! [`SurfaceFactory`].

use weft_core::{Affine2D, Canvas, NodeId, Rect};

/// Platform paint target for one node
pub trait Surface {
    /// Bounds in the parent surface's coordinates
    fn set_bounds(&mut self, bounds: Rect);

    fn set_transform(&mut self, transform: Affine2D);

    fn set_z_order(&mut self, z_order: i32);

    /// Position among sibling surfaces
    fn set_index(&mut self, index: usize);

    fn set_visible(&mut self, visible: bool);

    /// Whether child surfaces are clipped to this surface's bounds
    fn set_clips_contents(&mut self, clips: bool);

    /// Replace the surface's contents with whatever `paint` draws
    fn render(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas));
}

/// Creates and destroys surfaces
pub trait SurfaceFactory {
    type Surface: Surface;

    /// Create the surface for `node`
    ///
    /// `parent` is the surface of the node's parent, `None` for top-level
    /// nodes. `attach_if_rootless` asks the platform to attach a parentless
    /// surface to its root container.
    fn create(
        &mut self,
        parent: Option<&mut Self::Surface>,
        node: NodeId,
        is_container: bool,
        attach_if_rootless: bool,
    ) -> Self::Surface;

    /// Create a surface that is not attached anywhere
    fn create_detached(&mut self) -> Self::Surface;

    /// Destroy the surface that belonged to `node`
    fn release(&mut self, node: NodeId, surface: Self::Surface);
}
