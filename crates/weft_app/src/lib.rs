//! Weft App
//!
//! Entry point of the weft retained-mode UI runtime. A [`Display`] owns the
//! node tree, keeps platform surfaces in sync with it and routes pointer input
//! to its nodes. Platforms supply three hooks: a surface factory, a frame
//! scheduler and an input service.
//!
//! # Example
//!
//! ```rust
//! use weft_app::prelude::*;
//!
//! struct Platform;
//!
//! impl InputService for Platform {
//!     fn set_cursor(&mut self, _cursor: Option<Cursor>) {}
//!     fn set_tooltip_text(&mut self, _text: &str) {}
//! }
//!
//! weft_app::logging::init();
//!
//! let frames = ManualFrames::new();
//! let mut display = Display::new(
//!     Size::new(800.0, 600.0),
//!     HeadlessFactory::new(),
//!     frames.clone(),
//!     Platform,
//! );
//!
//! let panel = display.update(|tree| {
//!     let panel = tree.create_node(Rect::new(0.0, 0.0, 200.0, 100.0));
//!     tree.add_child(tree.root(), panel).map(|_| panel)
//! })?;
//!
//! assert!(frames.take().is_some());
//! let stats = display.on_frame();
//!
//! assert_eq!(stats.painted, 1);
//! assert!(display.scheduler().surface(panel).is_some());
//! # Ok::<(), TreeError>(())
//! ```

pub mod display;
pub mod logging;

pub use display::Display;

pub use weft_core;
pub use weft_input;
pub use weft_render;

/// Everything needed to build and drive a display
pub mod prelude {
    pub use crate::display::Display;

    pub use weft_core::{
        Affine2D, Buttons, Capabilities, Cursor, Layout, Modifiers, NodeId, NodeTree,
        PaintContext, Painter, Point, PointerEvent, PointerEventKind, PointerHandler, PointerId,
        Rect, Size, TreeError,
    };
    pub use weft_input::{EventPreprocessor, InputService, RawPointerEvent, RawPointerKind};
    pub use weft_render::{
        FrameScheduler, FrameStats, HeadlessFactory, ManualFrames, RenderConfig, Surface,
        SurfaceFactory,
    };
}
