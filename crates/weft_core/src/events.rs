//! Pointer event types
//!
//! These are the node-targeted events produced by the pointer router. Each
//! event carries the live [`Interaction`]s of every pointer currently engaged
//! with its target, plus the interaction that caused it.

use std::ops::BitOr;

use smallvec::{smallvec, SmallVec};

use crate::geometry::Point;
use crate::tree::NodeId;

/// Platform pointer identifier (mouse, pen or one touch contact)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u32);

/// Pressed pointer buttons
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Buttons(u8);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    pub const PRIMARY: Buttons = Buttons(1 << 0);
    pub const SECONDARY: Buttons = Buttons(1 << 1);
    pub const AUXILIARY: Buttons = Buttons(1 << 2);

    pub const fn contains(self, other: Buttons) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Buttons) -> Buttons {
        Buttons(self.0 | rhs.0)
    }
}

/// Keyboard modifiers held during a pointer event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const SHIFT: Modifiers = Modifiers(1 << 0);
    pub const CTRL: Modifiers = Modifiers(1 << 1);
    pub const ALT: Modifiers = Modifiers(1 << 2);
    pub const META: Modifiers = Modifiers(1 << 3);

    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// Kind of a pointer event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    Down,
    Up,
    Click,
    Drag,
    Move,
    Enter,
    Exit,
}

impl PointerEventKind {
    /// Move and Drag are motion events; everything else is a plain pointer event
    pub fn is_motion(self) -> bool {
        matches!(self, PointerEventKind::Move | PointerEventKind::Drag)
    }
}

/// Live state of one pointer against one target node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interaction {
    pub pointer: PointerId,
    pub target: NodeId,
    pub kind: PointerEventKind,
    /// Location in the target's local coordinates
    pub location: Point,
    /// Location in display coordinates
    pub absolute_location: Point,
}

/// Pointer event delivered to a node
///
/// `source` is the node currently being offered the event while it travels
/// along the dispatch chain; `target` is the node the event was resolved to.
#[derive(Clone, Debug)]
pub struct PointerEvent {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: PointerEventKind,
    pub buttons: Buttons,
    pub click_count: u32,
    pub modifiers: Modifiers,
    /// Every live interaction on `target`, one per pointer
    pub target_interactions: SmallVec<[Interaction; 2]>,
    /// The interaction that produced this event
    pub changed_interactions: SmallVec<[Interaction; 1]>,
    consumed: bool,
    prevent_os_handling: bool,
}

impl PointerEvent {
    pub fn new(
        interaction: Interaction,
        target_interactions: SmallVec<[Interaction; 2]>,
        buttons: Buttons,
        click_count: u32,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            source: interaction.target,
            target: interaction.target,
            kind: interaction.kind,
            buttons,
            click_count,
            modifiers,
            target_interactions,
            changed_interactions: smallvec![interaction],
            consumed: false,
            prevent_os_handling: false,
        }
    }

    /// Copy of this event offered to another node of the dispatch chain
    pub fn with_source(&self, source: NodeId) -> Self {
        Self {
            source,
            consumed: false,
            prevent_os_handling: false,
            ..self.clone()
        }
    }

    /// Stop the event from travelling any further
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Ask the platform to skip its default handling without stopping dispatch
    pub fn prevent_os_handling(&mut self) {
        self.prevent_os_handling = true;
    }

    pub fn os_handling_prevented(&self) -> bool {
        self.prevent_os_handling
    }

    pub fn is_motion(&self) -> bool {
        self.kind.is_motion()
    }

    /// Location of the causing pointer in the target's coordinates
    pub fn location(&self) -> Point {
        self.changed_interactions
            .first()
            .map_or(Point::ZERO, |interaction| interaction.location)
    }

    /// Location of the causing pointer in display coordinates
    pub fn absolute_location(&self) -> Point {
        self.changed_interactions
            .first()
            .map_or(Point::ZERO, |interaction| interaction.absolute_location)
    }
}
