//! Weft Core
//!
//! Shared model of the weft retained-mode UI runtime:
//!
//! - **Node tree**: arena of nodes with bounds, transform, visibility, z-order
//!   and ordered children, rooted at the display
//! - **Change notifications**: explicit per-observer mailboxes and
//!   subscriptions instead of ambient listener lists
//! - **Pointer events**: node-targeted events and interactions
//! - **Behaviours**: paint, layout and pointer hooks attached to nodes
//!
//! The render scheduler (`weft_render`) and the pointer router (`weft_input`)
//! are both built on top of these types.
//!
//! # Example
//!
//! ```rust
//! use weft_core::{NodeTree, Rect, Size, TreeError};
//!
//! let mut tree = NodeTree::new(Size::new(800.0, 600.0));
//! let panel = tree.create_node(Rect::new(0.0, 0.0, 200.0, 100.0));
//! let button = tree.create_node(Rect::new(10.0, 10.0, 80.0, 24.0));
//!
//! tree.add_child(tree.root(), panel).unwrap();
//! tree.add_child(panel, button).unwrap();
//!
//! // A node can never become its own ancestor
//! assert!(matches!(tree.add_child(button, panel), Err(TreeError::Cycle { .. })));
//! ```

pub mod behaviour;
pub mod cursor;
pub mod error;
pub mod events;
pub mod geometry;
pub mod notify;
pub mod tree;

pub use behaviour::{
    Behaviours, Canvas, Capabilities, ClipRectHandler, Layout, PaintContext, Painter,
    PointerHandler,
};
pub use cursor::Cursor;
pub use error::{Result, TreeError};
pub use events::{
    Buttons, Interaction, Modifiers, PointerEvent, PointerEventKind, PointerId,
};
pub use geometry::{Affine2D, Point, Rect, Size};
pub use notify::{ChangeMask, MailboxId, NodeChange, Notifier, SubscriptionId};
pub use tree::{NodeId, NodeTree};
