//! Weft Input
//!
//! Pointer input for the weft runtime:
//!
//! - **Hit testing**: [`HitTester`] resolves a display point to the deepest
//!   eligible node, honouring transforms, z-order, visibility and enabled state
//! - **Routing**: [`PointerRouter`] tracks every pointer's covered and clicked
//!   node, synthesizes Enter/Exit/Click/Drag, and dispatches each event through
//!   a sinking and a bubbling phase
//! - **Platform hooks**: [`InputService`] for cursor and tooltip,
//!   [`EventPreprocessor`] for a global pre-filter

pub mod interactions;
pub mod pointer_state;
pub mod raw;
pub mod router;
pub mod service;

pub use hit_test::{HitPredicate, HitTester, TreeHitTester};
pub use interactions::{InteractionSet, TargetedInteractions};
pub use pointer_state::PointerStates;
pub use raw::{RawPointerEvent, RawPointerKind};
pub use router::PointerRouter;
pub use service::{EventPreprocessor, InputService};
