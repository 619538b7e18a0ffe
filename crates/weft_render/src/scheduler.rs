//! Render scheduler
//!
//! Keeps a tree of platform surfaces in sync with the node tree. Node changes
//! arrive through the scheduler's mailbox and only mark state dirty; the real
//! work happens once per frame in a fixed-point loop.
//!
//! # Architecture
//!
//! ```text
//! NodeTree mutation
//!     ↓ (mailbox)
//! pump(): record / mark dirty / queue layout / push z-order + transform
//!     ↓ (one FrameScheduler request)
//! on_frame():
//!     loop {
//!         layout   pending_layout   (ancestors first)
//!         paint    pending_render   (insertion order)
//!         sync     pending_bounds   (rendered nodes only)
//!     } until no pass produced new work, or max_passes
//! ```
//!
//! Nodes are "recorded" once they are attached, visible, under the root. A
//! recorded node gets a surface on its first paint; the surface is released
//! when the node leaves the rooted tree for good. Detaching and re-attaching a
//! node under the same parent within one batch keeps its surface.
//!
//! Missing state is never an error: a node that was queued and then removed is
//! simply skipped.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SecondaryMap;
use tracing::{debug, trace, warn};
use weft_core::{
    Canvas, ChangeMask, MailboxId, NodeChange, NodeId, NodeTree, PaintContext, Rect, Size,
    SubscriptionId,
};

use crate::clip::ClipTree;
use crate::config::RenderConfig;
use crate::dirty::{FxIndexSet, LayoutQueue};
use crate::frame::{FrameScheduler, FrameTask};
use crate::surface::{Surface, SurfaceFactory};

/// Changes the scheduler follows on every recorded node
const NODE_MASK: ChangeMask = ChangeMask::BOUNDS
    .union(ChangeMask::Z_ORDER)
    .union(ChangeMask::TRANSFORM)
    .union(ChangeMask::VISIBILITY)
    .union(ChangeMask::CHILDREN)
    .union(ChangeMask::CLIP_MONITORING)
    .union(ChangeMask::RENDER)
    .union(ChangeMask::LAYOUT);

/// Changes the scheduler follows on the display node
const ROOT_MASK: ChangeMask = ChangeMask::BOUNDS
    .union(ChangeMask::CHILDREN)
    .union(ChangeMask::LAYOUT);

/// Summary of one frame callback
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Layout/paint/sync passes run
    pub passes: usize,
    /// Nodes painted
    pub painted: usize,
    /// Nodes laid out
    pub laid_out: usize,
    /// The pass cap was hit and work was pushed to the next frame
    pub capped: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct RenderResult {
    rendered: bool,
    renderable: bool,
}

/// Dirty tracking and batched layout/paint for one display
pub struct RenderScheduler<F: SurfaceFactory> {
    factory: F,
    frames: Box<dyn FrameScheduler>,
    config: RenderConfig,
    mailbox: MailboxId,

    surfaces: SecondaryMap<NodeId, F::Surface>,
    subscriptions: SecondaryMap<NodeId, SubscriptionId>,
    /// Children added while hidden, watched until they become visible
    invisible: SecondaryMap<NodeId, SubscriptionId>,
    clips: ClipTree,

    recorded: FxHashSet<NodeId>,
    living: FxHashSet<NodeId>,
    dirty: FxHashSet<NodeId>,
    never_rendered: FxHashSet<NodeId>,
    visibility_dirty: FxHashSet<NodeId>,
    pending_layout: LayoutQueue,
    pending_render: FxIndexSet<NodeId>,
    pending_bounds: FxIndexSet<NodeId>,
    pending_cleanup: FxHashMap<NodeId, FxIndexSet<NodeId>>,
    /// Re-render requests a node made while it was being painted
    deferred_render: FxIndexSet<NodeId>,

    laying_out: Option<NodeId>,
    painting: bool,
    painting_node: Option<NodeId>,
    frame_task: Option<FrameTask>,
}

impl<F: SurfaceFactory> RenderScheduler<F> {
    /// Create a scheduler for `tree` and record its current content
    pub fn new(tree: &mut NodeTree, factory: F, frames: impl FrameScheduler + 'static) -> Self {
        Self::with_config(tree, factory, frames, RenderConfig::default())
    }

    pub fn with_config(
        tree: &mut NodeTree,
        factory: F,
        frames: impl FrameScheduler + 'static,
        config: RenderConfig,
    ) -> Self {
        let root = tree.root();
        let mailbox = tree.notifier_mut().create_mailbox();
        let root_subscription = tree.notifier_mut().subscribe(mailbox, root, ROOT_MASK);

        let mut subscriptions = SecondaryMap::new();
        subscriptions.insert(root, root_subscription);

        let mut scheduler = Self {
            factory,
            frames: Box::new(frames),
            config,
            mailbox,
            surfaces: SecondaryMap::new(),
            subscriptions,
            invisible: SecondaryMap::new(),
            clips: ClipTree::new(),
            recorded: FxHashSet::default(),
            living: FxHashSet::default(),
            dirty: FxHashSet::default(),
            never_rendered: FxHashSet::default(),
            visibility_dirty: FxHashSet::default(),
            pending_layout: LayoutQueue::new(),
            pending_render: FxIndexSet::default(),
            pending_bounds: FxIndexSet::default(),
            pending_cleanup: FxHashMap::default(),
            deferred_render: FxIndexSet::default(),
            laying_out: None,
            painting: false,
            painting_node: None,
            frame_task: None,
        };

        for child in tree.children(root).to_vec() {
            scheduler.child_added(tree, root, child);
        }
        scheduler.schedule_layout(tree, root);

        scheduler
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Request a repaint of `node` in the next frame
    pub fn mark_for_render(&mut self, tree: &NodeTree, node: NodeId) {
        self.render(tree, node, false);
    }

    /// Lay out (if needed) and paint `node` right now
    ///
    /// Parents that are still unpainted or dirty are painted first.
    pub fn mark_for_render_immediate(&mut self, tree: &mut NodeTree, node: NodeId) {
        self.pump(tree);

        if !self.recorded.contains(&node)
            || tree.bounds(node).is_empty()
            || !tree.is_rooted(node)
        {
            return;
        }

        self.dirty.insert(node);

        if self.pending_layout.contains(node) {
            self.perform_layout(tree, node);
        }

        if let Some(parent) = tree.parent(node) {
            if self.never_rendered.contains(&parent) || self.dirty.contains(&parent) {
                self.mark_for_render_immediate(tree, parent);
            }
        }

        if self.perform_render(tree, node).rendered {
            self.pending_render.shift_remove(&node);
        }
    }

    /// Queue a layout of `node`'s children for the next frame
    pub fn mark_for_layout(&mut self, tree: &NodeTree, node: NodeId) {
        self.schedule_layout(tree, node);
    }

    /// Lay out `node`'s children right now
    pub fn layout_immediate(&mut self, tree: &mut NodeTree, node: NodeId) {
        let eligible = node == tree.root()
            || (self.recorded.contains(&node) && !tree.bounds(node).is_empty());

        if self.laying_out != Some(node) && eligible && tree.is_rooted(node) {
            if self.queue_layout(tree, node) {
                self.perform_layout(tree, node);
            }
        }
    }

    /// Visible part of `node` in its own coordinates
    pub fn clip_rect_of(&self, tree: &NodeTree, node: NodeId) -> Rect {
        self.clips
            .clip_rect(node)
            .unwrap_or_else(|| ClipTree::display_rect(tree, node))
    }

    /// Create a surface that belongs to no node
    pub fn create_detached_surface(&mut self) -> F::Surface {
        self.factory.create_detached()
    }

    /// Cancel the outstanding frame and stop following the tree
    pub fn shutdown(&mut self, tree: &mut NodeTree) {
        if let Some(task) = self.frame_task.take() {
            self.frames.cancel(task);
        }

        tree.notifier_mut().remove_mailbox(self.mailbox);
        self.subscriptions.clear();
        self.invisible.clear();

        debug!("render scheduler shut down");
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn is_recorded(&self, node: NodeId) -> bool {
        self.recorded.contains(&node)
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.dirty.contains(&node)
    }

    pub fn is_pending_render(&self, node: NodeId) -> bool {
        self.pending_render.contains(&node)
    }

    pub fn is_pending_layout(&self, node: NodeId) -> bool {
        self.pending_layout.contains(node)
    }

    pub fn is_frame_pending(&self) -> bool {
        self.frame_task.is_some()
    }

    pub fn surface(&self, node: NodeId) -> Option<&F::Surface> {
        self.surfaces.get(node)
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Process every queued node change
    pub fn pump(&mut self, tree: &mut NodeTree) {
        while let Some(change) = tree.notifier_mut().pop(self.mailbox) {
            self.handle(tree, change);
        }
    }

    fn handle(&mut self, tree: &mut NodeTree, change: NodeChange) {
        let root = tree.root();

        match change {
            NodeChange::Bounds { node, .. } if node == root => self.display_resized(tree),
            NodeChange::Bounds { node, old, new } => self.bounds_changed(tree, node, old, new),
            NodeChange::ZOrder { node, new, .. } => {
                if let Some(surface) = self.surfaces.get_mut(node) {
                    surface.set_z_order(new);
                }
            }
            NodeChange::Transform { node, new, .. } => {
                if let Some(surface) = self.surfaces.get_mut(node) {
                    surface.set_transform(new);
                }
            }
            NodeChange::Visibility { node, new, .. } => self.visibility_changed(tree, node, new),
            NodeChange::ChildAdded { parent, child, .. } => {
                // Already moved on; a later notification covers it
                if tree.parent(child) != Some(parent) {
                    return;
                }
                self.child_added(tree, parent, child);
                self.children_changed(tree, parent);
            }
            NodeChange::ChildRemoved { parent, child } => {
                self.child_removed(tree, parent, child);
                self.children_changed(tree, parent);
            }
            NodeChange::ChildMoved { child, index, .. } => {
                if !self.pending_render.contains(&child) {
                    if let Some(surface) = self.surfaces.get_mut(child) {
                        surface.set_index(index);
                    }
                }
            }
            NodeChange::ClipMonitoring { node, new, .. } => {
                if new {
                    self.clips.register(tree, node);
                    let clip = self.clip_rect_of(tree, node);
                    notify_clip_change(tree, node, Rect::ZERO, clip);
                } else {
                    self.clips.unregister(tree, node);
                }
            }
            NodeChange::RenderRequested { node } => {
                if self.painting_node == Some(node) {
                    trace!(?node, "re-render requested while painting, deferred");
                    self.deferred_render.insert(node);
                } else {
                    self.render(tree, node, false);
                }
            }
            NodeChange::LayoutRequested { node } => self.schedule_layout(tree, node),
            NodeChange::Cursor { .. } | NodeChange::Enabled { .. } => {}
        }
    }

    fn display_resized(&mut self, tree: &mut NodeTree) {
        let root = tree.root();
        self.schedule_layout(tree, root);

        for child in tree.children(root).to_vec() {
            self.check_clip(tree, child);
        }
    }

    // =========================================================================
    // Recording and clean-up
    // =========================================================================

    fn record(&mut self, tree: &mut NodeTree, node: NodeId) {
        let root = tree.root();

        if node == root || self.recorded.contains(&node) || !tree.is_rooted(node) {
            return;
        }

        if let Some(parent) = tree.parent(node) {
            if parent != root && !self.recorded.contains(&parent) {
                // Recording the parent records its children
                self.record(tree, parent);
                return;
            }
        }

        if let Some(watch) = self.invisible.remove(node) {
            tree.notifier_mut().unsubscribe(watch);
        }

        self.recorded.insert(node);
        self.living.insert(node);
        let subscription = tree.notifier_mut().subscribe(self.mailbox, node, NODE_MASK);
        self.subscriptions.insert(node, subscription);

        self.dirty.insert(node);
        self.never_rendered.insert(node);
        self.pending_render.insert(node);
        self.pending_bounds.insert(node);

        trace!(?node, "recorded");

        for child in tree.children(node).to_vec() {
            self.child_added(tree, node, child);
        }

        self.queue_layout(tree, node);

        if tree.monitors_clip_rect(node) {
            self.clips.register(tree, node);
            let clip = self.clip_rect_of(tree, node);
            notify_clip_change(tree, node, Rect::ZERO, clip);
        }

        if tree.parent(node) == Some(root) {
            self.render(tree, node, true);
        } else {
            self.schedule_paint();
        }
    }

    fn child_added(&mut self, tree: &mut NodeTree, parent: NodeId, child: NodeId) {
        self.remove_from_cleanup(tree, parent, child);

        if self.recorded.contains(&child) {
            // Re-attached before its clean-up ran
            self.revive(tree, child);
            return;
        }

        if tree.is_visible(child) {
            self.record(tree, child);
        } else {
            self.watch_invisible(tree, child);
        }
    }

    fn watch_invisible(&mut self, tree: &mut NodeTree, node: NodeId) {
        if !self.invisible.contains_key(node) {
            let watch = tree
                .notifier_mut()
                .subscribe(self.mailbox, node, ChangeMask::VISIBILITY);
            self.invisible.insert(node, watch);
        }
    }

    fn revive(&mut self, tree: &mut NodeTree, node: NodeId) {
        if self.recorded.contains(&node) {
            self.living.insert(node);

            if tree.monitors_clip_rect(node) && !self.clips.contains(node) {
                self.clips.register(tree, node);
                let clip = self.clip_rect_of(tree, node);
                notify_clip_change(tree, node, Rect::ZERO, clip);
            }
        } else {
            // Added or shown while an ancestor was detached
            if tree.is_visible(node) {
                self.record(tree, node);
            } else {
                self.watch_invisible(tree, node);
            }
            return;
        }

        for child in tree.children(node).to_vec() {
            self.revive(tree, child);
        }
    }

    fn child_removed(&mut self, tree: &mut NodeTree, parent: NodeId, child: NodeId) {
        self.remove_from_living(tree, child);

        if let Some(watch) = self.invisible.remove(child) {
            tree.notifier_mut().unsubscribe(watch);
        }

        if parent == tree.root() {
            self.release_resources(tree, None, child);
        } else if self.recorded.contains(&child) {
            self.pending_cleanup.entry(parent).or_default().insert(child);
            self.forget_clips(tree, child);
        }
    }

    /// Detached nodes are not visible, whether or not their clean-up ran
    fn forget_clips(&mut self, tree: &NodeTree, node: NodeId) {
        for child in tree.children(node).to_vec() {
            self.forget_clips(tree, child);
        }
        self.clips.forget(tree, node);
    }

    fn children_changed(&mut self, tree: &mut NodeTree, parent: NodeId) {
        if parent == tree.root() {
            self.schedule_layout(tree, parent);
            return;
        }

        if !self.recorded.contains(&parent) {
            return;
        }

        if tree.is_visible(parent) && !tree.size(parent).is_empty() {
            self.schedule_layout(tree, parent);
            self.render(tree, parent, false);
        } else {
            // Nothing will paint the parent soon, so clean up now
            self.release_cleanup_of(tree, parent);

            if let Some(layout) = tree.layout(parent) {
                layout.layout(tree, parent);
            }
        }
    }

    fn remove_from_living(&mut self, tree: &NodeTree, node: NodeId) {
        self.living.remove(&node);
        for child in tree.children(node).to_vec() {
            self.remove_from_living(tree, child);
        }
    }

    fn remove_from_cleanup(&mut self, tree: &mut NodeTree, parent: NodeId, child: NodeId) {
        if !self.recorded.contains(&child) {
            return;
        }

        let old_parent = self
            .pending_cleanup
            .iter()
            .find(|(_, children)| children.contains(&child))
            .map(|(old_parent, _)| *old_parent);

        let Some(old_parent) = old_parent else {
            return;
        };

        if let Some(children) = self.pending_cleanup.get_mut(&old_parent) {
            children.shift_remove(&child);
            if children.is_empty() {
                self.pending_cleanup.remove(&old_parent);
            }
        }

        if old_parent != parent {
            // Surfaces cannot change parent, so the old one goes
            self.release_resources(tree, Some(old_parent), child);
        }
    }

    fn release_cleanup_of(&mut self, tree: &mut NodeTree, parent: NodeId) {
        if let Some(children) = self.pending_cleanup.remove(&parent) {
            for child in children {
                self.release_resources(tree, Some(parent), child);
            }
        }
    }

    fn release_resources(&mut self, tree: &mut NodeTree, parent: Option<NodeId>, node: NodeId) {
        if self.living.contains(&node) {
            if let Some(parent) = parent {
                self.forget_cleanup_entry(parent, node);
            }
            return;
        }

        if let Some(watch) = self.invisible.remove(node) {
            tree.notifier_mut().unsubscribe(watch);
        }

        if !self.recorded.contains(&node) {
            return;
        }

        for child in tree.children(node).to_vec() {
            self.release_resources(tree, Some(node), child);
        }
        self.release_cleanup_of(tree, node);

        self.recorded.remove(&node);
        self.dirty.remove(&node);
        self.never_rendered.remove(&node);
        self.visibility_dirty.remove(&node);
        self.pending_layout.remove(node);
        self.pending_render.shift_remove(&node);
        self.pending_bounds.shift_remove(&node);
        self.deferred_render.shift_remove(&node);

        if let Some(parent) = parent {
            self.forget_cleanup_entry(parent, node);
        }

        self.clips.forget(tree, node);

        if let Some(subscription) = self.subscriptions.remove(node) {
            tree.notifier_mut().unsubscribe(subscription);
        }

        if let Some(surface) = self.surfaces.remove(node) {
            debug!(?node, "surface released");
            self.factory.release(node, surface);
        }
    }

    fn forget_cleanup_entry(&mut self, parent: NodeId, node: NodeId) {
        if let Some(children) = self.pending_cleanup.get_mut(&parent) {
            children.shift_remove(&node);
            if children.is_empty() {
                self.pending_cleanup.remove(&parent);
            }
        }
    }

    // =========================================================================
    // Change handling
    // =========================================================================

    fn visibility_changed(&mut self, tree: &mut NodeTree, node: NodeId, visible: bool) {
        let root = tree.root();
        let mut was_added_invisible = false;

        if self.invisible.contains_key(node) {
            if !tree.is_visible(node) {
                return;
            }
            // The watch stays until recording succeeds; a detached ancestor
            // may still be re-attached within this batch
            was_added_invisible = true;
            self.record(tree, node);
        }

        if !self.recorded.contains(&node) {
            return;
        }

        match tree.parent(node) {
            Some(parent) if parent != root => {
                self.queue_layout(tree, parent);

                // Bounds changes while hidden were never synced
                if visible {
                    self.pending_bounds.insert(node);
                }

                self.visibility_dirty.insert(node);
                self.pending_render.insert(node);
                self.render(tree, parent, false);
                self.schedule_paint();
            }
            Some(_) => {
                if visible {
                    self.visibility_dirty.insert(node);
                    self.pending_bounds.insert(node);

                    if !was_added_invisible {
                        self.render(tree, node, false);
                    }
                } else {
                    if let Some(surface) = self.surfaces.get_mut(node) {
                        surface.set_visible(false);
                    }
                    self.pending_bounds.shift_remove(&node);
                }
            }
            None => {}
        }

        if visible {
            // Descendants recorded while hidden were skipped by earlier paints
            self.requeue_dirty_descendants(tree, node);
        }

        self.check_clip(tree, node);
    }

    fn requeue_dirty_descendants(&mut self, tree: &NodeTree, node: NodeId) {
        for child in tree.children(node).to_vec() {
            if self.dirty.contains(&child) {
                self.pending_render.insert(child);
            }
            self.requeue_dirty_descendants(tree, child);
        }
    }

    fn bounds_changed(&mut self, tree: &mut NodeTree, node: NodeId, old: Rect, new: Rect) {
        let Some(parent) = tree.parent(node) else {
            return;
        };
        if !tree.is_visible(node) || !self.recorded.contains(&node) {
            return;
        }

        let mut rerender = false;
        self.pending_bounds.insert(node);

        if old.size != new.size {
            rerender = true;

            let layout = tree.layout(node);
            let requires = tree.has_children(node)
                && layout
                    .as_ref()
                    .is_some_and(|l| l.requires_layout(tree, node, old.size, new.size));

            if requires {
                if self.laying_out != Some(node) {
                    self.queue_layout(tree, node);
                } else if sufficiently_different(old.size, new.size) {
                    // Resized in the middle of its own layout: redo it
                    if let Some(layout) = layout {
                        layout.layout(tree, node);
                    }
                } else {
                    return;
                }
            }
        }

        let parent_requires = tree
            .layout(parent)
            .is_some_and(|l| l.child_requires_layout(tree, parent, node, old, new));
        if parent_requires {
            self.queue_layout(tree, parent);
        }

        self.check_clip(tree, node);

        if rerender {
            self.render(tree, node, true);
        } else {
            self.schedule_paint();
        }
    }

    fn check_clip(&mut self, tree: &mut NodeTree, node: NodeId) {
        if !self.clips.contains(node) {
            return;
        }

        let mut changes = Vec::new();
        self.clips.check_change(tree, node, &mut changes);

        for (node, old, new) in changes {
            notify_clip_change(tree, node, old, new);
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    fn render(&mut self, tree: &NodeTree, node: NodeId, ignore_empty_bounds: bool) {
        if self.prepare_render(tree, node, ignore_empty_bounds) {
            self.schedule_paint();
        }
    }

    fn prepare_render(&mut self, tree: &NodeTree, node: NodeId, ignore_empty_bounds: bool) -> bool {
        let ready = (ignore_empty_bounds || !tree.bounds(node).is_empty())
            && self.recorded.contains(&node)
            && tree.is_rooted(node);

        if ready {
            self.dirty.insert(node);
            self.pending_render.insert(node);
        }

        ready
    }

    fn schedule_paint(&mut self) {
        if !self.painting && self.frame_task.is_none() {
            self.frame_task = Some(self.frames.request_frame());
            trace!("frame requested");
        }
    }

    fn schedule_layout(&mut self, tree: &NodeTree, node: NodeId) {
        if self.laying_out != Some(node) && self.queue_layout(tree, node) {
            self.schedule_paint();
        }
    }

    /// Only rooted nodes with children are ever queued
    fn queue_layout(&mut self, tree: &NodeTree, node: NodeId) -> bool {
        let eligible = tree.has_children(node)
            && (node == tree.root() || self.recorded.contains(&node));

        if eligible {
            self.pending_layout.insert(node, tree.depth(node));
        }

        eligible
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Run one frame: layout, paint and bounds sync until nothing is left
    pub fn on_frame(&mut self, tree: &mut NodeTree) -> FrameStats {
        self.frame_task = None;
        self.painting = true;

        self.pump(tree);

        let mut stats = FrameStats::default();

        loop {
            stats.passes += 1;

            while let Some(node) = self.pending_layout.first() {
                if tree.is_rooted(node) && tree.has_children(node) {
                    self.perform_layout(tree, node);
                    stats.laid_out += 1;
                } else {
                    self.pending_layout.remove(node);
                }
            }

            let mut retries = Vec::new();

            while let Some(node) = self.pending_render.shift_remove_index(0) {
                let result = self.perform_render(tree, node);

                if result.rendered {
                    stats.painted += 1;
                } else if result.renderable
                    && !tree.bounds(node).is_empty()
                    && self.dirty.contains(&node)
                {
                    retries.push(node);
                }
            }

            self.pending_render.extend(retries.iter().copied());

            let ready: Vec<NodeId> = self
                .pending_bounds
                .iter()
                .copied()
                .filter(|node| !self.never_rendered.contains(node))
                .collect();

            for node in ready {
                self.pending_bounds.shift_remove(&node);
                self.sync_bounds(tree, node);
            }

            self.pump(tree);

            let more_layout = !self.pending_layout.is_empty();
            let more_render = self
                .pending_render
                .iter()
                .any(|node| !retries.contains(node) || !self.never_rendered.contains(node));
            let more_bounds = self
                .pending_bounds
                .iter()
                .any(|node| !self.never_rendered.contains(node));

            if !(more_layout || more_render || more_bounds) {
                break;
            }

            if stats.passes >= self.config.max_passes {
                warn!(
                    passes = stats.passes,
                    pending_layout = self.pending_layout.len(),
                    pending_render = self.pending_render.len(),
                    "frame did not settle, continuing next frame"
                );
                stats.capped = true;
                break;
            }
        }

        self.painting = false;

        let deferred: Vec<NodeId> = self.deferred_render.drain(..).collect();
        let mut follow_up = stats.capped;
        for node in deferred {
            follow_up |= self.prepare_render(tree, node, false);
        }

        if follow_up {
            self.schedule_paint();
        }

        debug!(
            passes = stats.passes,
            painted = stats.painted,
            laid_out = stats.laid_out,
            "frame complete"
        );

        stats
    }

    fn perform_layout(&mut self, tree: &mut NodeTree, node: NodeId) {
        let previous = self.laying_out.replace(node);

        if let Some(layout) = tree.layout(node) {
            trace!(?node, "layout");
            layout.layout(tree, node);
        }

        // Changes made by the layout are seen while it still counts as running
        self.pump(tree);

        self.laying_out = previous;
        self.pending_layout.remove(node);
    }

    fn perform_render(&mut self, tree: &mut NodeTree, node: NodeId) -> RenderResult {
        if !self.recorded.contains(&node) || !tree.is_rooted(node) {
            return RenderResult::default();
        }

        let visibility_changed = self.visibility_dirty.contains(&node);
        let recursively_visible = tree.is_recursively_visible(node);
        let renderable = recursively_visible || visibility_changed;

        if !renderable {
            return RenderResult::default();
        }

        let paintable = recursively_visible && !tree.size(node).is_empty();

        if paintable {
            self.ensure_surface(tree, node);
        }

        let first_paint = paintable && self.never_rendered.contains(&node);
        let bounds_pending = self.pending_bounds.shift_remove(&node);

        if let Some(surface) = self.surfaces.get_mut(node) {
            if first_paint {
                surface.set_transform(tree.transform(node));
                surface.set_z_order(tree.z_order(node));
                surface.set_index(tree.child_index(node).unwrap_or(0));
            }
            if bounds_pending {
                surface.set_bounds(tree.bounds(node));
            }
            if visibility_changed {
                surface.set_visible(tree.is_visible(node));
            }
        }

        if bounds_pending {
            self.check_clip(tree, node);
        }
        if visibility_changed {
            self.visibility_dirty.remove(&node);
        }

        let mut result = RenderResult {
            rendered: false,
            renderable,
        };

        if !paintable {
            return result;
        }

        self.release_cleanup_of(tree, node);

        if self.dirty.remove(&node) {
            self.never_rendered.remove(&node);

            let painter = tree.painter(node);
            let clips_contents = tree.clips_contents(node);
            self.painting_node = Some(node);

            if let Some(surface) = self.surfaces.get_mut(node) {
                trace!(?node, "paint");
                surface.set_clips_contents(clips_contents);
                surface.render(&mut |canvas: &mut dyn Canvas| {
                    if let Some(painter) = &painter {
                        painter.paint(&mut PaintContext {
                            tree: &mut *tree,
                            node,
                            canvas,
                        });
                    }
                });
                result.rendered = true;
            }

            self.pump(tree);
            self.painting_node = None;
        }

        result
    }

    fn sync_bounds(&mut self, tree: &mut NodeTree, node: NodeId) {
        if let Some(surface) = self.surfaces.get_mut(node) {
            surface.set_bounds(tree.bounds(node));
        }
        self.check_clip(tree, node);
    }

    fn ensure_surface(&mut self, tree: &NodeTree, node: NodeId) {
        if self.surfaces.contains_key(node) {
            return;
        }

        let parent = tree
            .parent(node)
            .filter(|p| *p != tree.root() && self.recorded.contains(p));

        if let Some(parent) = parent {
            self.ensure_surface(tree, parent);
        }

        let is_container = tree.has_children(node);
        let parent_surface = parent.and_then(|p| self.surfaces.get_mut(p));
        let surface = self.factory.create(parent_surface, node, is_container, true);

        debug!(?node, ?parent, "surface created");
        self.surfaces.insert(node, surface);
    }
}

fn sufficiently_different(old: Size, new: Size) -> bool {
    const EPSILON: f32 = 1e-6;
    (old.width - new.width).abs() > EPSILON || (old.height - new.height).abs() > EPSILON
}

fn notify_clip_change(tree: &mut NodeTree, node: NodeId, old: Rect, new: Rect) {
    if old == new {
        return;
    }

    let handler = tree.behaviours(node).and_then(|b| b.clip_rect.clone());
    if let Some(handler) = handler {
        handler(tree, node, old, new);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::frame::ManualFrames;
    use crate::headless::{HeadlessFactory, SurfaceLog, SurfaceOp};
    use weft_core::Layout;

    struct Harness {
        tree: NodeTree,
        scheduler: RenderScheduler<HeadlessFactory>,
        frames: ManualFrames,
        log: SurfaceLog,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(RenderConfig::default())
        }

        fn with_config(config: RenderConfig) -> Self {
            let mut tree = NodeTree::new(Size::new(800.0, 600.0));
            let frames = ManualFrames::new();
            let factory = HeadlessFactory::new();
            let log = factory.log();
            let scheduler = RenderScheduler::with_config(&mut tree, factory, frames.clone(), config);

            Self {
                tree,
                scheduler,
                frames,
                log,
            }
        }

        fn frame(&mut self) -> FrameStats {
            self.scheduler.pump(&mut self.tree);
            self.frames.take();
            self.scheduler.on_frame(&mut self.tree)
        }

        fn ops(&self) -> Vec<SurfaceOp> {
            self.log.borrow().clone()
        }

        fn paints_of(&self, node: NodeId) -> usize {
            self.log
                .borrow()
                .iter()
                .filter(|op| **op == SurfaceOp::Painted(node))
                .count()
        }
    }

    /// Stretches every child over the whole node
    struct Fill;

    impl Layout for Fill {
        fn layout(&self, tree: &mut NodeTree, node: NodeId) {
            let rect = tree.size(node).to_rect();
            for child in tree.children(node).to_vec() {
                tree.set_bounds(child, rect);
            }
        }
    }

    /// Widens every child by one on each run
    struct Grow;

    impl Layout for Grow {
        fn layout(&self, tree: &mut NodeTree, node: NodeId) {
            for child in tree.children(node).to_vec() {
                let size = tree.size(child);
                tree.set_size(child, Size::new(size.width + 1.0, size.height));
            }
        }
    }

    #[test]
    fn test_repeated_requests_paint_once() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.add_child(root, node).unwrap();

        h.scheduler.pump(&mut h.tree);
        h.scheduler.mark_for_render(&h.tree, node);
        h.scheduler.mark_for_render(&h.tree, node);

        assert_eq!(h.frames.requested(), 1);

        let stats = h.frame();

        assert_eq!(stats.painted, 1);
        assert_eq!(h.paints_of(node), 1);
        assert!(!h.frames.is_pending());
        assert!(!h.scheduler.is_dirty(node));
        assert!(h.ops().contains(&SurfaceOp::Created {
            node,
            parent: None,
            is_container: false,
        }));
    }

    #[test]
    fn test_layout_runs_before_paint() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 100.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        let painted_sizes = Rc::new(RefCell::new(Vec::new()));

        let sizes = painted_sizes.clone();
        h.tree.set_painter(child, move |cx: &mut PaintContext<'_>| {
            sizes.borrow_mut().push(cx.canvas.size());
        });
        h.tree.set_layout(panel, Fill);
        h.tree.add_child(root, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();

        h.frame();

        assert_eq!(*painted_sizes.borrow(), vec![Size::new(200.0, 100.0)]);
        assert_eq!(h.scheduler.surface(child).map(|s| s.bounds()), Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
        assert!(h.ops().contains(&SurfaceOp::Created {
            node: child,
            parent: Some(panel),
            is_container: false,
        }));
    }

    #[test]
    fn test_parent_shrink_notifies_clip_once() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let parent = h.tree.create_node(Rect::new(0.0, 0.0, 50.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        h.tree.on_clip_rect_changed(
            child,
            Rc::new(move |_: &mut NodeTree, _: NodeId, old: Rect, new: Rect| {
                sink.borrow_mut().push((old, new))
            }),
        );
        h.tree.set_monitors_clip_rect(child, true);
        h.tree.add_child(root, parent).unwrap();
        h.tree.add_child(parent, child).unwrap();
        h.frame();

        assert_eq!(*seen.borrow(), vec![(Rect::ZERO, Rect::new(0.0, 0.0, 50.0, 100.0))]);
        seen.borrow_mut().clear();

        h.tree.set_bounds(parent, Rect::new(0.0, 0.0, 30.0, 200.0));
        h.frame();

        assert_eq!(
            *seen.borrow(),
            vec![(Rect::new(0.0, 0.0, 50.0, 100.0), Rect::new(0.0, 0.0, 30.0, 100.0))]
        );
        assert_eq!(
            h.scheduler.clip_rect_of(&h.tree, child),
            Rect::new(0.0, 0.0, 30.0, 100.0)
        );
    }

    #[test]
    fn test_rerender_during_own_paint_waits_for_next_frame() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let count = Rc::new(Cell::new(0));

        let paints = count.clone();
        h.tree.set_painter(node, move |cx: &mut PaintContext<'_>| {
            paints.set(paints.get() + 1);
            if paints.get() == 1 {
                cx.tree.rerender(cx.node);
            }
        });
        h.tree.add_child(root, node).unwrap();

        let first = h.frame();
        assert_eq!(first.painted, 1);
        assert_eq!(count.get(), 1);
        assert!(h.frames.is_pending());

        let second = h.frame();
        assert_eq!(second.painted, 1);
        assert_eq!(count.get(), 2);
        assert!(!h.frames.is_pending());
    }

    #[test]
    fn test_unsettled_frame_stops_at_pass_cap() {
        let mut h = Harness::with_config(RenderConfig::new().max_passes(4));
        let root = h.tree.root();
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));

        h.tree.set_layout(panel, Grow);
        h.tree.set_painter(child, move |cx: &mut PaintContext<'_>| {
            if let Some(parent) = cx.tree.parent(cx.node) {
                cx.tree.relayout(parent);
            }
        });
        h.tree.add_child(root, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();

        let stats = h.frame();

        assert!(stats.capped);
        assert_eq!(stats.passes, 4);
        assert!(h.frames.is_pending());
    }

    #[test]
    fn test_readd_to_same_parent_keeps_surface() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tree.add_child(root, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.frame();

        h.tree.remove_child(panel, child).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.frame();

        assert!(!h.ops().contains(&SurfaceOp::Released(child)));
        assert!(h.scheduler.surface(child).is_some());
    }

    #[test]
    fn test_move_to_other_parent_recreates_surface() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let first = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let second = h.tree.create_node(Rect::new(200.0, 0.0, 200.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tree.add_child(root, first).unwrap();
        h.tree.add_child(root, second).unwrap();
        h.tree.add_child(first, child).unwrap();
        h.frame();

        h.tree.add_child(second, child).unwrap();
        h.frame();

        let ops = h.ops();
        assert!(ops.contains(&SurfaceOp::Released(child)));
        assert!(ops.contains(&SurfaceOp::Created {
            node: child,
            parent: Some(second),
            is_container: false,
        }));
        assert!(h.scheduler.is_recorded(child));
    }

    #[test]
    fn test_removing_top_level_node_releases_subtree() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tree.add_child(root, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.frame();

        h.tree.remove_child(root, panel).unwrap();
        h.scheduler.pump(&mut h.tree);

        let ops = h.ops();
        let child_released = ops.iter().position(|op| *op == SurfaceOp::Released(child));
        let panel_released = ops.iter().position(|op| *op == SurfaceOp::Released(panel));
        assert!(child_released.is_some());
        assert!(child_released < panel_released);
        assert!(!h.scheduler.is_recorded(panel));
        assert!(!h.scheduler.is_recorded(child));
    }

    #[test]
    fn test_hidden_node_is_recorded_once_shown() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.set_visible(node, false);
        h.tree.add_child(root, node).unwrap();
        h.frame();

        assert!(!h.scheduler.is_recorded(node));
        assert_eq!(h.paints_of(node), 0);

        h.tree.set_visible(node, true);
        let stats = h.frame();

        assert!(h.scheduler.is_recorded(node));
        assert_eq!(stats.painted, 1);
    }

    #[test]
    fn test_hiding_top_level_node_hides_surface_immediately() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.add_child(root, node).unwrap();
        h.frame();

        h.tree.set_visible(node, false);
        h.scheduler.pump(&mut h.tree);

        assert_eq!(h.scheduler.surface(node).map(|s| s.is_visible()), Some(false));
    }

    #[test]
    fn test_immediate_render_paints_without_frame() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.add_child(root, node).unwrap();
        h.frame();

        h.scheduler.mark_for_render_immediate(&mut h.tree, node);

        assert_eq!(h.paints_of(node), 2);
        assert!(!h.scheduler.is_pending_render(node));
    }

    #[test]
    fn test_z_order_reaches_existing_surface() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.add_child(root, node).unwrap();
        h.frame();

        h.tree.set_z_order(node, 7);
        h.scheduler.pump(&mut h.tree);

        assert_eq!(h.ops().last(), Some(&SurfaceOp::ZOrder(node, 7)));
    }

    #[test]
    fn test_shutdown_cancels_outstanding_frame() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let node = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        h.tree.add_child(root, node).unwrap();
        h.scheduler.pump(&mut h.tree);
        assert!(h.scheduler.is_frame_pending());

        h.scheduler.shutdown(&mut h.tree);

        assert_eq!(h.frames.cancelled(), 1);
        assert!(!h.scheduler.is_frame_pending());
    }

    #[test]
    fn test_child_shown_while_ancestor_detached_is_painted_after_readd() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let group = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tree.set_visible(child, false);
        h.tree.add_child(root, group).unwrap();
        h.tree.add_child(group, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.frame();
        assert!(!h.scheduler.is_recorded(child));

        h.tree.remove_child(group, panel).unwrap();
        h.tree.set_visible(child, true);
        h.scheduler.pump(&mut h.tree);

        h.tree.add_child(group, panel).unwrap();
        h.frame();
        h.frame();

        assert!(h.scheduler.is_recorded(child));
        assert_eq!(h.paints_of(child), 1);
        assert!(!h.ops().contains(&SurfaceOp::Released(panel)));
    }

    #[test]
    fn test_child_added_while_parent_detached_is_painted_after_readd() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let group = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        h.tree.add_child(root, group).unwrap();
        h.tree.add_child(group, panel).unwrap();
        h.frame();

        h.tree.remove_child(group, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.scheduler.pump(&mut h.tree);
        assert!(!h.scheduler.is_recorded(child));

        h.tree.add_child(group, panel).unwrap();
        h.frame();

        assert!(h.scheduler.is_recorded(child));
        assert_eq!(h.paints_of(child), 1);
    }

    #[test]
    fn test_detached_node_clip_is_empty_until_readded() {
        let mut h = Harness::new();
        let root = h.tree.root();
        let panel = h.tree.create_node(Rect::new(0.0, 0.0, 200.0, 200.0));
        let child = h.tree.create_node(Rect::new(0.0, 0.0, 100.0, 100.0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        h.tree.on_clip_rect_changed(
            child,
            Rc::new(move |_: &mut NodeTree, _: NodeId, old: Rect, new: Rect| {
                sink.borrow_mut().push((old, new))
            }),
        );
        h.tree.set_monitors_clip_rect(child, true);
        h.tree.add_child(root, panel).unwrap();
        h.tree.add_child(panel, child).unwrap();
        h.frame();
        seen.borrow_mut().clear();

        h.tree.remove_child(panel, child).unwrap();
        h.scheduler.pump(&mut h.tree);

        assert_eq!(h.scheduler.clip_rect_of(&h.tree, child), Rect::ZERO);

        h.tree.set_size(panel, Size::new(50.0, 50.0));
        h.scheduler.pump(&mut h.tree);

        assert!(seen.borrow().is_empty());

        h.tree.add_child(panel, child).unwrap();
        h.frame();

        assert_eq!(
            h.scheduler.clip_rect_of(&h.tree, child),
            Rect::new(0.0, 0.0, 50.0, 50.0)
        );
        assert_eq!(
            *seen.borrow(),
            vec![(Rect::ZERO, Rect::new(0.0, 0.0, 50.0, 50.0))]
        );
        assert!(!h.ops().contains(&SurfaceOp::Released(child)));
    }
}
