//! Pointer routing
//!
//! Turns raw platform pointer events into node events.
//!
//! # Architecture
//!
//! ```text
//! RawPointerEvent (pointer id, kind, display location)
//!     ↓
//! hit test, skipping nodes that decline the event kind (pass-through)
//!     ↓
//! per-pointer state: covered / clicked / pressed
//!     ↓ synthesized Enter, Exit, Click, Drag
//! dispatch chain: target + enabled, visible ancestors
//!     sinking   display → target  (preprocessor, filters)
//!     bubbling  target → display  (handlers)
//! ```
//!
//! Dispatch stops as soon as a node consumes the event, and consumption (or a
//! request to skip OS handling) is reported back on the raw event.
//!
//! # Example
//!
//! ```rust
//! use weft_core::{Cursor, NodeTree, Point, PointerId, Rect, Size};
//! use weft_input::{InputService, PointerRouter, RawPointerEvent, RawPointerKind};
//!
//! struct Platform;
//!
//! impl InputService for Platform {
//!     fn set_cursor(&mut self, _cursor: Option<Cursor>) {}
//!     fn set_tooltip_text(&mut self, _text: &str) {}
//! }
//!
//! let mut tree = NodeTree::new(Size::new(100.0, 100.0));
//! let button = tree.create_node(Rect::new(0.0, 0.0, 50.0, 50.0));
//! tree.add_child(tree.root(), button).unwrap();
//!
//! let mut router = PointerRouter::new(&mut tree, Platform);
//! let mut down = RawPointerEvent::new(PointerId(1), RawPointerKind::Down, Point::new(10.0, 10.0));
//! router.on_pointer_event(&mut tree, &mut down);
//!
//! assert_eq!(router.clicked(PointerId(1)), Some(button));
//! ```

use slotmap::SecondaryMap;
use smallvec::SmallVec;
use tracing::{debug, trace};
use weft_core::{
    ChangeMask, Cursor, Interaction, MailboxId, NodeChange, NodeId, NodeTree, PointerEvent,
    PointerEventKind, PointerId, SubscriptionId,
};

use crate::hit_test::{HitTester, TreeHitTester};
use crate::interactions::TargetedInteractions;
use crate::pointer_state::PointerStates;
use crate::raw::{RawPointerEvent, RawPointerKind};
use crate::service::{EventPreprocessor, InputService};

/// Changes followed on every node with live interactions
const WATCH_MASK: ChangeMask = ChangeMask::CURSOR
    .union(ChangeMask::ENABLED)
    .union(ChangeMask::BOUNDS)
    .union(ChangeMask::TRANSFORM);

/// Dispatch chains rarely get deeper than this
type Chain = SmallVec<[NodeId; 8]>;

/// Routes raw pointer events to nodes
pub struct PointerRouter<H: HitTester = TreeHitTester> {
    hit_tester: H,
    input: Box<dyn InputService>,
    preprocessor: Option<Box<dyn EventPreprocessor>>,
    mailbox: MailboxId,
    watched: SecondaryMap<NodeId, SubscriptionId>,
    pointers: PointerStates,
    interactions: TargetedInteractions,
    /// Overrides every node cursor while set
    display_cursor: Option<Cursor>,
    cursor: Option<Cursor>,
    tooltip: String,
}

impl PointerRouter<TreeHitTester> {
    pub fn new(tree: &mut NodeTree, input: impl InputService + 'static) -> Self {
        Self::with_hit_tester(tree, input, TreeHitTester::new())
    }
}

impl<H: HitTester> PointerRouter<H> {
    pub fn with_hit_tester(
        tree: &mut NodeTree,
        input: impl InputService + 'static,
        hit_tester: H,
    ) -> Self {
        let mailbox = tree.notifier_mut().create_mailbox();

        let mut router = Self {
            hit_tester,
            input: Box::new(input),
            preprocessor: None,
            mailbox,
            watched: SecondaryMap::new(),
            pointers: PointerStates::new(),
            interactions: TargetedInteractions::new(),
            display_cursor: None,
            cursor: None,
            tooltip: String::new(),
        };

        router.set_cursor(None);
        router
    }

    /// Install the collaborator that sees events before the sinking phase
    pub fn set_preprocessor(&mut self, preprocessor: impl EventPreprocessor + 'static) {
        self.preprocessor = Some(Box::new(preprocessor));
    }

    /// Cursor forced for the whole display, `None` to use node cursors
    pub fn set_display_cursor(&mut self, cursor: Option<Cursor>) {
        self.display_cursor = cursor;
        self.set_cursor(cursor);
    }

    pub fn display_cursor(&self) -> Option<Cursor> {
        self.display_cursor
    }

    /// Stop following the tree
    pub fn shutdown(&mut self, tree: &mut NodeTree) {
        tree.notifier_mut().remove_mailbox(self.mailbox);
        self.watched.clear();
        debug!("pointer router shut down");
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Node the pointer is hovering
    pub fn covered(&self, pointer: PointerId) -> Option<NodeId> {
        self.pointers.covered(pointer)
    }

    /// Node the pointer pressed on and has not released yet
    pub fn clicked(&self, pointer: PointerId) -> Option<NodeId> {
        self.pointers.clicked(pointer)
    }

    pub fn is_pressed(&self, pointer: PointerId) -> bool {
        self.pointers.is_pressed(pointer)
    }

    pub fn interactions(&self, node: NodeId) -> &[Interaction] {
        self.interactions.get(node)
    }

    pub fn is_watching(&self, node: NodeId) -> bool {
        self.watched.contains_key(node)
    }

    /// Cursor last resolved from the covered node (before the display override)
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn tooltip_text(&self) -> &str {
        &self.tooltip
    }

    // =========================================================================
    // Entry point
    // =========================================================================

    /// Route one platform event
    pub fn on_pointer_event(&mut self, tree: &mut NodeTree, event: &mut RawPointerEvent) {
        self.pump(tree);

        match event.kind {
            RawPointerKind::Up => self.pointer_up(tree, event),
            RawPointerKind::Enter | RawPointerKind::Move => self.pointer_move(tree, event),
            RawPointerKind::Down => self.pointer_down(tree, event),
            RawPointerKind::Exit => self.pointer_exit(tree, event),
        }
    }

    /// Process queued changes of watched nodes
    pub fn pump(&mut self, tree: &mut NodeTree) {
        while let Some(change) = tree.notifier_mut().pop(self.mailbox) {
            match change {
                NodeChange::Cursor { node, .. } => {
                    let cursor = self.cursor_of(tree, Some(node));
                    self.set_cursor(cursor);
                }
                NodeChange::Enabled { node, new: false, .. } => {
                    self.interactions.forget(node);
                    self.unwatch(tree, node);
                }
                NodeChange::Bounds { node, .. } | NodeChange::Transform { node, .. } => {
                    self.interactions.mark_frame_changed(node);
                }
                _ => {}
            }
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn pointer_down(&mut self, tree: &mut NodeTree, raw: &mut RawPointerEvent) {
        let pointer = raw.pointer;
        self.set_tooltip(String::new());

        if let Some(node) = self.view_from(tree, raw) {
            if Some(node) != self.pointers.covered(pointer) {
                self.deliver(tree, raw, node, PointerEventKind::Enter);
                self.set_covered(tree, pointer, node);

                let cursor = self.cursor_of(tree, Some(node));
                self.set_cursor(cursor);
            }

            self.deliver(tree, raw, node, PointerEventKind::Down);
            self.pointers.set_clicked(pointer, node);
            debug!(?pointer, ?node, "pointer captured");
        }

        self.pointers.press(pointer);
    }

    fn pointer_up(&mut self, tree: &mut NodeTree, raw: &mut RawPointerEvent) {
        let pointer = raw.pointer;
        let view = self.view_from(tree, raw);

        if self.pointers.clicked(pointer).is_some() || self.pointers.is_pressed(pointer) {
            let clicked = self.pointers.clicked(pointer);

            if let Some(clicked) = clicked {
                self.deliver(tree, raw, clicked, PointerEventKind::Up);

                if view == Some(clicked) {
                    self.deliver(tree, raw, clicked, PointerEventKind::Click);
                }
            }

            if view != clicked {
                if let Some(clicked) = clicked {
                    // Released somewhere else without a move being seen first
                    if self.pointers.covered(pointer) == Some(clicked) {
                        self.take_covered(tree, pointer);
                        self.deliver(tree, raw, clicked, PointerEventKind::Exit);
                    }
                }

                match view {
                    Some(node) => self.hover_release(tree, raw, node),
                    None => self.set_cursor(None),
                }
            } else {
                let cursor = self.cursor_of(tree, view);
                self.set_cursor(cursor);
            }

            self.take_clicked(tree, pointer);
            debug!(?pointer, "pointer released");
        } else if let Some(node) = view {
            self.hover_release(tree, raw, node);
        } else {
            self.set_cursor(None);
        }

        self.leave_pass_through(tree, raw);
        self.pointers.release(pointer);
    }

    /// Up over `node` that was not pressed on: it becomes covered
    fn hover_release(&mut self, tree: &mut NodeTree, raw: &mut RawPointerEvent, node: NodeId) {
        self.set_covered(tree, raw.pointer, node);
        self.deliver(tree, raw, node, PointerEventKind::Enter);
        self.deliver(tree, raw, node, PointerEventKind::Up);

        let cursor = self.cursor_of(tree, Some(node));
        self.set_cursor(cursor);
    }

    fn pointer_move(&mut self, tree: &mut NodeTree, raw: &mut RawPointerEvent) {
        let pointer = raw.pointer;

        if let Some(clicked) = self.pointers.clicked(pointer) {
            self.deliver(tree, raw, clicked, PointerEventKind::Drag);

            let cursor = self.cursor_of(tree, Some(clicked));
            self.set_cursor(cursor);
        }

        let view = self.view_from(tree, raw);
        let covered = self.pointers.covered(pointer);
        let pressed = self.pointers.is_pressed(pointer);

        if view != covered {
            if let Some(old) = covered {
                if !pressed || Some(old) == self.pointers.clicked(pointer) {
                    self.deliver(tree, raw, old, PointerEventKind::Exit);
                }
            }

            match view {
                Some(node) => self.set_covered(tree, pointer, node),
                None => self.take_covered(tree, pointer),
            }

            if let Some(node) = view {
                if !pressed || Some(node) == self.pointers.clicked(pointer) {
                    self.deliver(tree, raw, node, PointerEventKind::Enter);

                    let cursor = self.cursor_of(tree, self.pointers.covered(pointer));
                    self.set_cursor(cursor);
                }
            } else if self.pointers.clicked(pointer).is_none() {
                self.set_tooltip(String::new());
                self.set_cursor(None);
            }
        } else if !pressed {
            if let Some(node) = covered {
                self.deliver(tree, raw, node, PointerEventKind::Move);
            } else {
                self.set_tooltip(String::new());
            }

            let cursor = self.cursor_of(tree, covered);
            self.set_cursor(cursor);
        }
    }

    fn pointer_exit(&mut self, tree: &mut NodeTree, raw: &mut RawPointerEvent) {
        let pointer = raw.pointer;

        if let Some(clicked) = self.pointers.clicked(pointer) {
            self.deliver(tree, raw, clicked, PointerEventKind::Exit);
            self.take_clicked(tree, pointer);
        }

        if let Some(covered) = self.pointers.covered(pointer) {
            self.deliver(tree, raw, covered, PointerEventKind::Exit);
            self.take_covered(tree, pointer);
        }

        self.leave_pass_through(tree, raw);
        self.pointers.release(pointer);
        debug!(?pointer, "pointer left display");
    }

    // =========================================================================
    // Per-pointer state
    // =========================================================================

    fn set_covered(&mut self, tree: &mut NodeTree, pointer: PointerId, node: NodeId) {
        self.watch(tree, node);

        if let Some(previous) = self.pointers.set_covered(pointer, node) {
            if previous != node {
                self.cleanup(tree, previous, pointer);
            }
        }
    }

    fn take_covered(&mut self, tree: &mut NodeTree, pointer: PointerId) {
        if let Some(previous) = self.pointers.take_covered(pointer) {
            self.cleanup(tree, previous, pointer);
        }
    }

    fn take_clicked(&mut self, tree: &mut NodeTree, pointer: PointerId) {
        if let Some(previous) = self.pointers.take_clicked(pointer) {
            if self.pointers.covered(pointer) != Some(previous) {
                self.cleanup(tree, previous, pointer);
            }
        }
    }

    /// Drop `pointer`'s interaction on `node` unless the pointer still holds it
    fn cleanup(&mut self, tree: &mut NodeTree, node: NodeId, pointer: PointerId) {
        if self.pointers.clicked(pointer) == Some(node) {
            return;
        }

        self.interactions.release(node, pointer);

        // Covered while another pointer was pressed: watched, never targeted
        if !self.interactions.contains(node) && !self.pointers.references(node) {
            self.unwatch(tree, node);
        }
    }

    fn watch(&mut self, tree: &mut NodeTree, node: NodeId) {
        if !self.watched.contains_key(node) {
            let subscription = tree.notifier_mut().subscribe(self.mailbox, node, WATCH_MASK);
            self.watched.insert(node, subscription);
        }
    }

    fn unwatch(&mut self, tree: &mut NodeTree, node: NodeId) {
        if let Some(subscription) = self.watched.remove(node) {
            tree.notifier_mut().unsubscribe(subscription);
        }
    }

    fn cursor_of(&self, tree: &NodeTree, node: Option<NodeId>) -> Option<Cursor> {
        self.display_cursor
            .or_else(|| node.and_then(|node| tree.cursor(node)))
    }

    fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor;
        self.input.set_cursor(cursor.or(self.display_cursor));
    }

    fn set_tooltip(&mut self, text: String) {
        self.input.set_tooltip_text(&text);
        self.tooltip = text;
    }

    // =========================================================================
    // Target resolution
    // =========================================================================

    /// Node that handles `raw`, skipping nodes that decline its kind
    fn view_from(&mut self, tree: &mut NodeTree, raw: &RawPointerEvent) -> Option<NodeId> {
        let kind = event_kind(raw.kind);
        let pointer = raw.pointer;

        let found = self.hit_tester.find(tree, raw.location, None, &|_, _| true);
        let mut target = adjust_for_native(tree, found, raw);
        let mut passed: SmallVec<[NodeId; 4]> = SmallVec::new();

        while let Some(node) = target {
            if tree.capabilities(node).accepts(kind) {
                break;
            }

            trace!(?node, ?kind, "passed through");

            match raw.kind {
                RawPointerKind::Down => self.pointers.add_clicked_pass_through(pointer, node),
                RawPointerKind::Up => {
                    if self.pointers.remove_clicked_pass_through(pointer, node) {
                        self.synthesize_pass_through(tree, raw, node, PointerEventKind::Click);
                    }
                }
                RawPointerKind::Enter | RawPointerKind::Move => {
                    if self.pointers.is_clicked_pass_through(pointer, node)
                        && self.pointers.add_covered_pass_through(pointer, node)
                    {
                        self.synthesize_pass_through(tree, raw, node, PointerEventKind::Enter);
                    }
                }
                RawPointerKind::Exit => {}
            }

            passed.push(node);

            let found = self.hit_tester.find(tree, raw.location, tree.parent(node), &|tree, n| {
                tree.is_enabled(n) && !passed.contains(&n)
            });
            target = adjust_for_native(tree, found, raw);
        }

        if matches!(raw.kind, RawPointerKind::Enter | RawPointerKind::Move) {
            for node in self.pointers.covered_pass_through(pointer) {
                if !passed.contains(&node) {
                    self.pointers.remove_covered_pass_through(pointer, node);
                    self.synthesize_pass_through(tree, raw, node, PointerEventKind::Exit);
                }
            }
        }

        target
    }

    /// The press is over: pass-through nodes still under the pointer are left
    fn leave_pass_through(&mut self, tree: &mut NodeTree, raw: &RawPointerEvent) {
        for node in self.pointers.covered_pass_through(raw.pointer) {
            self.synthesize_pass_through(tree, raw, node, PointerEventKind::Exit);
        }
        self.pointers.clear_pass_through(raw.pointer);
    }

    /// Notify a node that a press it let through entered, left or clicked it
    fn synthesize_pass_through(
        &mut self,
        tree: &mut NodeTree,
        raw: &RawPointerEvent,
        node: NodeId,
        kind: PointerEventKind,
    ) {
        let Some(handler) = tree.behaviours(node).and_then(|b| b.pass_through.clone()) else {
            return;
        };

        let interaction = Interaction {
            pointer: raw.pointer,
            target: node,
            kind,
            location: tree.from_absolute(node, raw.location),
            absolute_location: raw.location,
        };
        let mut event = PointerEvent::new(
            interaction,
            SmallVec::from_slice(&[interaction]),
            raw.buttons,
            raw.click_count,
            raw.modifiers,
        );

        trace!(?node, ?kind, "synthetic pass-through event");
        handler(tree, &mut event);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn create_pointer_event(
        &mut self,
        tree: &mut NodeTree,
        raw: &RawPointerEvent,
        target: NodeId,
        kind: PointerEventKind,
    ) -> PointerEvent {
        // Handlers may have moved nodes since the last event
        self.pump(tree);

        let interaction = Interaction {
            pointer: raw.pointer,
            target,
            kind,
            location: tree.from_absolute(target, raw.location),
            absolute_location: raw.location,
        };
        let target_interactions = self.interactions.record(tree, interaction);

        PointerEvent::new(
            interaction,
            target_interactions,
            raw.buttons,
            raw.click_count,
            raw.modifiers,
        )
    }

    /// Run `kind` through the sinking and bubbling phases; true if consumed
    fn deliver(
        &mut self,
        tree: &mut NodeTree,
        raw: &mut RawPointerEvent,
        target: NodeId,
        kind: PointerEventKind,
    ) -> bool {
        let event = self.create_pointer_event(tree, raw, target, kind);

        if matches!(
            kind,
            PointerEventKind::Enter | PointerEventKind::Move | PointerEventKind::Up
        ) {
            let text = tree.tooltip_text(target).to_owned();
            self.set_tooltip(text);
        }

        let chain = dispatch_chain(tree, target);
        trace!(?target, ?kind, depth = chain.len(), "deliver");

        // Sinking
        for &node in chain.iter().rev() {
            let mut offered = event.with_source(node);

            if let Some(preprocessor) = self.preprocessor.as_mut() {
                preprocessor.preprocess(&mut offered);
            }

            if !offered.is_consumed() {
                let filter = tree.behaviours(node).and_then(|b| b.filter_for(kind));
                if let Some(filter) = filter {
                    filter(tree, &mut offered);
                }
            }

            if offered.is_consumed() || offered.os_handling_prevented() {
                raw.consume();
            }
            if offered.is_consumed() {
                trace!(?node, ?kind, "consumed while sinking");
                return true;
            }
        }

        // Bubbling
        for &node in chain.iter() {
            let mut offered = event.with_source(node);

            let handler = tree.behaviours(node).and_then(|b| b.handler_for(kind));
            if let Some(handler) = handler {
                handler(tree, &mut offered);
            }

            if offered.is_consumed() || offered.os_handling_prevented() {
                raw.consume();
            }
            if offered.is_consumed() {
                trace!(?node, ?kind, "consumed while bubbling");
                return true;
            }
        }

        false
    }
}

/// Target followed by its enabled, visible ancestors (display excluded)
fn dispatch_chain(tree: &NodeTree, target: NodeId) -> Chain {
    let root = tree.root();
    let mut chain = Chain::new();
    chain.push(target);

    chain.extend(
        tree.ancestors(target)
            .filter(|node| *node != root && tree.is_enabled(*node) && tree.is_visible(*node)),
    );

    chain
}

/// Prefer the nearest native scroll region when the platform reports one
fn adjust_for_native(
    tree: &NodeTree,
    target: Option<NodeId>,
    raw: &RawPointerEvent,
) -> Option<NodeId> {
    let target = target?;

    if !raw.native_scroll_region {
        return Some(target);
    }

    let region = std::iter::once(target)
        .chain(tree.ancestors(target))
        .find(|node| tree.capabilities(*node).scroll_region);

    Some(region.unwrap_or(target))
}

fn event_kind(kind: RawPointerKind) -> PointerEventKind {
    match kind {
        RawPointerKind::Down => PointerEventKind::Down,
        RawPointerKind::Up => PointerEventKind::Up,
        RawPointerKind::Move => PointerEventKind::Move,
        RawPointerKind::Enter => PointerEventKind::Enter,
        RawPointerKind::Exit => PointerEventKind::Exit,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use weft_core::{Affine2D, Capabilities, Point, PointerHandler, Rect, Size};

    use weft_core::PointerEventKind::{Click, Down, Drag, Enter, Exit, Move, Up};

    type EventLog = Rc<RefCell<Vec<(NodeId, PointerEventKind)>>>;

    #[derive(Clone, Default)]
    struct Recorder {
        cursors: Rc<RefCell<Vec<Option<Cursor>>>>,
        tooltips: Rc<RefCell<Vec<String>>>,
    }

    impl InputService for Recorder {
        fn set_cursor(&mut self, cursor: Option<Cursor>) {
            self.cursors.borrow_mut().push(cursor);
        }

        fn set_tooltip_text(&mut self, text: &str) {
            self.tooltips.borrow_mut().push(text.to_owned());
        }
    }

    impl Recorder {
        fn last_cursor(&self) -> Option<Cursor> {
            self.cursors.borrow().last().copied().flatten()
        }

        fn last_tooltip(&self) -> String {
            self.tooltips.borrow().last().cloned().unwrap_or_default()
        }
    }

    fn recording_handler(log: &EventLog) -> PointerHandler {
        let log = log.clone();
        Rc::new(move |_: &mut NodeTree, event: &mut PointerEvent| {
            log.borrow_mut().push((event.source, event.kind));
        })
    }

    fn listen(tree: &mut NodeTree, node: NodeId, log: &EventLog) {
        let handler = recording_handler(log);
        tree.on_pointer(node, handler.clone());
        tree.on_motion(node, handler);
    }

    fn raw(kind: RawPointerKind, x: f32, y: f32) -> RawPointerEvent {
        RawPointerEvent::new(PointerId(1), kind, Point::new(x, y))
    }

    struct Fixture {
        tree: NodeTree,
        router: PointerRouter,
        recorder: Recorder,
        log: EventLog,
        child: NodeId,
        grandchild: NodeId,
    }

    impl Fixture {
        /// display → child (0,0,50,50) → grandchild (10,10,20,20)
        fn new() -> Self {
            let mut tree = NodeTree::new(Size::new(100.0, 100.0));
            let root = tree.root();
            let child = tree.create_node(Rect::new(0.0, 0.0, 50.0, 50.0));
            let grandchild = tree.create_node(Rect::new(10.0, 10.0, 20.0, 20.0));
            tree.add_child(root, child).unwrap();
            tree.add_child(child, grandchild).unwrap();

            let log = EventLog::default();
            listen(&mut tree, child, &log);
            listen(&mut tree, grandchild, &log);

            let recorder = Recorder::default();
            let router = PointerRouter::new(&mut tree, recorder.clone());

            Self {
                tree,
                router,
                recorder,
                log,
                child,
                grandchild,
            }
        }

        fn send(&mut self, mut event: RawPointerEvent) -> RawPointerEvent {
            self.router.on_pointer_event(&mut self.tree, &mut event);
            event
        }

        fn take_log(&self) -> Vec<(NodeId, PointerEventKind)> {
            std::mem::take(&mut *self.log.borrow_mut())
        }
    }

    #[test]
    fn test_down_enters_then_presses_deepest_node() {
        let mut f = Fixture::new();
        let (c, g) = (f.child, f.grandchild);

        f.send(raw(RawPointerKind::Down, 15.0, 15.0));

        assert_eq!(
            f.take_log(),
            vec![(g, Enter), (c, Enter), (g, Down), (c, Down)]
        );
        assert_eq!(f.router.clicked(PointerId(1)), Some(g));
        assert_eq!(f.router.covered(PointerId(1)), Some(g));
        assert!(f.router.is_pressed(PointerId(1)));
    }

    #[test]
    fn test_release_outside_drags_and_skips_click() {
        let mut f = Fixture::new();
        let (c, g) = (f.child, f.grandchild);
        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        f.take_log();

        f.send(raw(RawPointerKind::Move, 60.0, 60.0));
        assert_eq!(
            f.take_log(),
            vec![(g, Drag), (c, Drag), (g, Exit), (c, Exit)]
        );

        f.send(raw(RawPointerKind::Up, 60.0, 60.0));
        assert_eq!(f.take_log(), vec![(g, Up), (c, Up)]);
        assert_eq!(f.router.clicked(PointerId(1)), None);
        assert!(!f.router.is_pressed(PointerId(1)));
    }

    #[test]
    fn test_release_on_pressed_node_clicks() {
        let mut f = Fixture::new();
        let (c, g) = (f.child, f.grandchild);
        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        f.take_log();

        f.send(raw(RawPointerKind::Up, 16.0, 16.0));

        assert_eq!(
            f.take_log(),
            vec![(g, Up), (c, Up), (g, Click), (c, Click)]
        );
        assert_eq!(f.router.covered(PointerId(1)), Some(g));
    }

    #[test]
    fn test_hover_enter_move_exit() {
        let mut f = Fixture::new();
        let (c, g) = (f.child, f.grandchild);

        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        f.send(raw(RawPointerKind::Move, 16.0, 16.0));
        f.send(raw(RawPointerKind::Move, 40.0, 40.0));

        assert_eq!(
            f.take_log(),
            vec![
                (g, Enter),
                (c, Enter),
                (g, Move),
                (c, Move),
                (g, Exit),
                (c, Exit),
                (c, Enter),
            ]
        );
        assert_eq!(f.router.covered(PointerId(1)), Some(c));
    }

    #[test]
    fn test_consumed_while_sinking_reaches_nobody_else() {
        let mut f = Fixture::new();
        let c = f.child;
        f.tree.on_pointer_filter(
            c,
            Rc::new(|_: &mut NodeTree, event: &mut PointerEvent| event.consume()),
        );

        let event = f.send(raw(RawPointerKind::Down, 15.0, 15.0));

        assert!(f.take_log().is_empty());
        assert!(event.is_consumed());
    }

    #[test]
    fn test_prevent_os_handling_keeps_bubbling() {
        let mut f = Fixture::new();
        let (c, g) = (f.child, f.grandchild);
        let log = f.log.clone();
        f.tree.on_pointer(
            g,
            Rc::new(move |_: &mut NodeTree, event: &mut PointerEvent| {
                log.borrow_mut().push((event.source, event.kind));
                event.prevent_os_handling();
            }),
        );

        let event = f.send(raw(RawPointerKind::Down, 15.0, 15.0));

        assert!(event.is_consumed());
        assert!(f.take_log().contains(&(c, Down)));
    }

    #[test]
    fn test_preprocessor_sees_events_first() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        f.router.set_preprocessor(|event: &mut PointerEvent| {
            if event.kind == Down {
                event.consume();
            }
        });

        f.send(raw(RawPointerKind::Down, 15.0, 15.0));

        let log = f.take_log();
        assert!(log.contains(&(g, Enter)));
        assert!(!log.iter().any(|(_, kind)| *kind == Down));
    }

    #[test]
    fn test_pass_through_node_gets_synthetic_click() {
        let mut tree = NodeTree::new(Size::new(100.0, 100.0));
        let root = tree.root();
        let base = tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let overlay = tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        tree.add_child(root, base).unwrap();
        tree.add_child(root, overlay).unwrap();
        tree.set_capabilities(overlay, Capabilities::PASS_THROUGH);

        let log = EventLog::default();
        let passed = EventLog::default();
        listen(&mut tree, base, &log);
        tree.on_pass_through(overlay, recording_handler(&passed));

        let mut router = PointerRouter::new(&mut tree, Recorder::default());
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Down, 5.0, 5.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Up, 5.0, 5.0));

        assert_eq!(router.clicked(PointerId(1)), None);
        assert_eq!(*passed.borrow(), vec![(overlay, Click)]);
        assert_eq!(
            *log.borrow(),
            vec![(base, Enter), (base, Down), (base, Up), (base, Click)]
        );
    }

    #[test]
    fn test_native_scroll_region_takes_the_event() {
        let mut f = Fixture::new();
        let c = f.child;
        f.tree.set_capabilities(
            c,
            Capabilities {
                scroll_region: true,
                ..Capabilities::default()
            },
        );

        f.send(raw(RawPointerKind::Down, 15.0, 15.0).in_native_scroll_region());

        assert_eq!(f.router.clicked(PointerId(1)), Some(c));
    }

    #[test]
    fn test_pointers_capture_independently() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        let second = |kind| RawPointerEvent::new(PointerId(2), kind, Point::new(20.0, 20.0));

        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        f.send(second(RawPointerKind::Down));

        assert_eq!(f.router.interactions(g).len(), 2);
        assert_eq!(f.router.clicked(PointerId(1)), Some(g));
        assert_eq!(f.router.clicked(PointerId(2)), Some(g));

        f.send(raw(RawPointerKind::Up, 15.0, 15.0));

        assert_eq!(f.router.clicked(PointerId(1)), None);
        assert_eq!(f.router.clicked(PointerId(2)), Some(g));
        assert!(f.router.is_pressed(PointerId(2)));
    }

    #[test]
    fn test_exit_clears_pointer_state() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        f.take_log();

        f.send(raw(RawPointerKind::Exit, 15.0, 15.0));

        let exits = f.take_log().iter().filter(|(n, k)| *n == g && *k == Exit).count();
        assert_eq!(exits, 2);
        assert_eq!(f.router.clicked(PointerId(1)), None);
        assert_eq!(f.router.covered(PointerId(1)), None);
        assert!(!f.router.is_pressed(PointerId(1)));
        assert!(!f.router.is_watching(g));
    }

    #[test]
    fn test_cursor_follows_node_unless_display_overrides() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        f.tree.set_cursor(g, Some(Cursor::Pointer));

        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        assert_eq!(f.recorder.last_cursor(), Some(Cursor::Pointer));

        f.router.set_display_cursor(Some(Cursor::Wait));
        assert_eq!(f.recorder.last_cursor(), Some(Cursor::Wait));

        f.send(raw(RawPointerKind::Move, 16.0, 16.0));
        assert_eq!(f.recorder.last_cursor(), Some(Cursor::Wait));

        f.router.set_display_cursor(None);
        f.tree.set_cursor(g, Some(Cursor::Text));
        f.router.pump(&mut f.tree);
        assert_eq!(f.recorder.last_cursor(), Some(Cursor::Text));
    }

    #[test]
    fn test_tooltip_shown_on_hover_and_cleared_on_press() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        f.tree.set_tooltip_text(g, "hint");

        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        assert_eq!(f.recorder.last_tooltip(), "hint");

        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        assert_eq!(f.recorder.last_tooltip(), "");
        assert_eq!(f.router.tooltip_text(), "");
    }

    #[test]
    fn test_leaving_node_releases_its_watch() {
        let mut f = Fixture::new();
        let g = f.grandchild;

        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        assert!(f.router.is_watching(g));

        f.send(raw(RawPointerKind::Move, 60.0, 60.0));
        assert!(!f.router.is_watching(g));
        assert!(f.router.interactions(g).is_empty());
    }

    #[test]
    fn test_disabling_node_drops_its_interactions() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        assert_eq!(f.router.interactions(g).len(), 1);

        f.tree.set_enabled(g, false);
        f.router.pump(&mut f.tree);

        assert!(f.router.interactions(g).is_empty());
        assert!(!f.router.is_watching(g));
    }

    #[test]
    fn test_node_crossed_while_pressed_is_not_left_watched() {
        let mut f = Fixture::new();
        let root = f.tree.root();
        let side = f.tree.create_node(Rect::new(60.0, 0.0, 30.0, 30.0));
        f.tree.add_child(root, side).unwrap();
        listen(&mut f.tree, side, &f.log);

        f.send(raw(RawPointerKind::Down, 15.0, 15.0));
        f.send(raw(RawPointerKind::Move, 70.0, 10.0));
        assert_eq!(f.router.covered(PointerId(1)), Some(side));
        assert!(f.router.interactions(side).is_empty());

        f.send(raw(RawPointerKind::Move, 95.0, 95.0));
        f.send(raw(RawPointerKind::Up, 95.0, 95.0));

        assert!(!f.take_log().iter().any(|(node, _)| *node == side));
        assert_eq!(f.router.covered(PointerId(1)), None);
        assert!(!f.router.is_watching(side));

        f.tree.set_cursor(side, Some(Cursor::Text));
        f.router.pump(&mut f.tree);

        assert_eq!(f.recorder.last_cursor(), None);
    }

    #[test]
    fn test_watch_kept_while_another_pointer_covers_node() {
        let mut f = Fixture::new();
        let g = f.grandchild;
        let second = |kind, x, y| RawPointerEvent::new(PointerId(2), kind, Point::new(x, y));

        f.send(raw(RawPointerKind::Move, 15.0, 15.0));
        f.send(second(RawPointerKind::Move, 20.0, 20.0));
        f.send(raw(RawPointerKind::Move, 60.0, 60.0));

        assert!(f.router.is_watching(g));
        assert_eq!(f.router.interactions(g).len(), 1);

        f.send(second(RawPointerKind::Move, 60.0, 60.0));

        assert!(!f.router.is_watching(g));
    }

    #[test]
    fn test_moved_target_reprojects_other_pointers() {
        let mut f = Fixture::new();
        let g = f.grandchild;

        f.send(RawPointerEvent::new(
            PointerId(2),
            RawPointerKind::Down,
            Point::new(20.0, 20.0),
        ));
        let before = f.router.interactions(g)[0];
        assert_eq!(before.location, Point::new(10.0, 10.0));

        f.tree.set_position(g, Point::new(15.0, 15.0));
        f.send(raw(RawPointerKind::Down, 25.0, 25.0));

        let interactions = f.router.interactions(g);
        assert_eq!(interactions.len(), 2);

        let second = interactions.iter().find(|i| i.pointer == PointerId(2));
        let first = interactions.iter().find(|i| i.pointer == PointerId(1));
        assert_eq!(second.map(|i| i.location), Some(Point::new(5.0, 5.0)));
        assert_eq!(first.map(|i| i.location), Some(Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_transformed_target_reprojects_other_pointers() {
        let mut f = Fixture::new();
        let g = f.grandchild;

        f.send(RawPointerEvent::new(
            PointerId(2),
            RawPointerKind::Down,
            Point::new(20.0, 20.0),
        ));

        f.tree.set_transform(g, Affine2D::scale(0.5, 0.5));
        f.send(raw(RawPointerKind::Down, 12.0, 12.0));

        let second = f
            .router
            .interactions(g)
            .iter()
            .find(|i| i.pointer == PointerId(2))
            .map(|i| i.location);
        assert_eq!(second, Some(f.tree.from_absolute(g, Point::new(20.0, 20.0))));
        assert_ne!(second, Some(Point::new(10.0, 10.0)));
    }

    fn pass_through_overlay() -> (NodeTree, NodeId, EventLog) {
        let mut tree = NodeTree::new(Size::new(100.0, 100.0));
        let root = tree.root();
        let base = tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let overlay = tree.create_node(Rect::new(0.0, 0.0, 50.0, 100.0));
        tree.add_child(root, base).unwrap();
        tree.add_child(root, overlay).unwrap();
        tree.set_capabilities(overlay, Capabilities::PASS_THROUGH);

        let passed = EventLog::default();
        tree.on_pass_through(overlay, recording_handler(&passed));
        (tree, overlay, passed)
    }

    #[test]
    fn test_pass_through_node_sees_pointer_leave_and_return() {
        let (mut tree, overlay, passed) = pass_through_overlay();
        let mut router = PointerRouter::new(&mut tree, Recorder::default());

        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Down, 5.0, 5.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Move, 80.0, 80.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Move, 10.0, 10.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Up, 10.0, 10.0));

        assert_eq!(
            *passed.borrow(),
            vec![(overlay, Exit), (overlay, Enter), (overlay, Click)]
        );

        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Move, 80.0, 80.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Move, 10.0, 10.0));

        assert_eq!(passed.borrow().len(), 3);
    }

    #[test]
    fn test_pointer_exit_leaves_pass_through_node() {
        let (mut tree, overlay, passed) = pass_through_overlay();
        let mut router = PointerRouter::new(&mut tree, Recorder::default());

        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Down, 5.0, 5.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Exit, 5.0, 5.0));
        router.on_pointer_event(&mut tree, &mut raw(RawPointerKind::Up, 5.0, 5.0));

        assert_eq!(*passed.borrow(), vec![(overlay, Exit)]);
    }
}
