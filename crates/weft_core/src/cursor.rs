//! Pointer cursors

/// Cursor shown while the pointer is over a node or the display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
    Text,
    Crosshair,
    Move,
    Grab,
    Grabbing,
    Wait,
    Help,
    NotAllowed,
    EwResize,
    NsResize,
    None,
}
