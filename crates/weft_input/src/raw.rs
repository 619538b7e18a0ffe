//! Platform pointer events
//!
//! The platform adapter translates its native events into
//! [`RawPointerEvent`]s. Everything the router needs is already normalized:
//! display coordinates, a stable pointer id, and whether the platform is
//! rendering a native scroll region under the pointer.

use weft_core::{Buttons, Modifiers, Point, PointerId};

/// Kind of a raw pointer event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawPointerKind {
    Down,
    Up,
    Move,
    /// Pointer entered the display
    Enter,
    /// Pointer left the display (or a touch ended without an Up)
    Exit,
}

/// Pointer event as reported by the platform
#[derive(Clone, Debug, PartialEq)]
pub struct RawPointerEvent {
    pub pointer: PointerId,
    pub kind: RawPointerKind,
    /// Display coordinates
    pub location: Point,
    pub buttons: Buttons,
    pub click_count: u32,
    pub modifiers: Modifiers,
    /// The platform hit one of its own scrolling regions
    pub native_scroll_region: bool,
    consumed: bool,
}

impl RawPointerEvent {
    pub fn new(pointer: PointerId, kind: RawPointerKind, location: Point) -> Self {
        Self {
            pointer,
            kind,
            location,
            buttons: Buttons::NONE,
            click_count: 0,
            modifiers: Modifiers::NONE,
            native_scroll_region: false,
            consumed: false,
        }
    }

    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_click_count(mut self, click_count: u32) -> Self {
        self.click_count = click_count;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn in_native_scroll_region(mut self) -> Self {
        self.native_scroll_region = true;
        self
    }

    /// Tell the platform to skip its default handling
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}
