//! Weft Render
//!
//! Turns node-tree changes into as little platform work as possible:
//!
//! - **Dirty tracking**: requests only mark nodes; nothing is painted until the
//!   next frame callback, and repeated requests collapse into one paint
//! - **Frame loop**: layout, paint and bounds sync repeat until the tree
//!   settles, capped by [`RenderConfig::max_passes`]
//! - **Surfaces**: one platform surface per rendered node, created lazily and
//!   released when the node leaves the display
//! - **Clip rects**: visible-area notifications for nodes that ask for them
//!
//! Platforms provide a [`SurfaceFactory`] and a [`FrameScheduler`];
//! [`headless`] has recording implementations of both for tests and offscreen
//! use.

pub mod clip;
pub mod config;
pub mod dirty;
pub mod frame;
pub mod headless;
pub mod scheduler;
pub mod surface;

pub use clip::{ClipChange, ClipTree};
pub use config::{RenderConfig, DEFAULT_MAX_PASSES};
pub use dirty::{FxIndexSet, LayoutQueue};
pub use frame::{FrameScheduler, FrameTask, ManualFrames};
pub use headless::{HeadlessCanvas, HeadlessFactory, HeadlessSurface, SurfaceLog, SurfaceOp};
pub use scheduler::{FrameStats, RenderScheduler};
pub use surface::{Surface, SurfaceFactory};
