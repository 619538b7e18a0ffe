//! Collaborators of the pointer router

use weft_core::{Cursor, PointerEvent};

/// Platform side of pointer input: cursor shape and tooltip
pub trait InputService {
    /// `None` restores the platform default cursor
    fn set_cursor(&mut self, cursor: Option<Cursor>);

    fn set_tooltip_text(&mut self, text: &str);
}

/// Sees every event before the nodes of the sinking phase do
///
/// Consuming the event here stops dispatch just like a node filter would.
pub trait EventPreprocessor {
    fn preprocess(&mut self, event: &mut PointerEvent);
}

impl<F> EventPreprocessor for F
where
    F: FnMut(&mut PointerEvent),
{
    fn preprocess(&mut self, event: &mut PointerEvent) {
        self(event)
    }
}
