//! Node change notifications
//!
//! Every observable mutation of a [`NodeTree`](crate::tree::NodeTree) produces a
//! [`NodeChange`]. Instead of ambient listener lists on each node, observers own
//! a mailbox in the tree's [`Notifier`] and register explicit subscriptions
//! `(mailbox, node, mask)`. A change is appended to every mailbox holding a
//! matching subscription, and the owner drains its own mailbox when it is ready
//! to react.
//!
//! ```text
//! NodeTree::set_bounds(node, ..)
//!     ↓
//! Notifier::notify(NodeChange::Bounds { .. })
//!     ↓ (subscriptions matching node + BOUNDS)
//! mailbox(RenderScheduler)   mailbox(PointerRouter)
//!     ↓                          ↓
//! scheduler.pump(tree)       router.pump(tree)
//! ```
//!
//! Subscriptions are released deterministically by their owner (for example
//! when a node is detached), never by dropping a closure.

use std::collections::VecDeque;
use std::ops::{BitOr, BitOrAssign};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::cursor::Cursor;
use crate::geometry::{Affine2D, Rect};
use crate::tree::NodeId;

new_key_type! {
    /// Queue of pending changes owned by one observer
    pub struct MailboxId;
    /// One registration of a mailbox against a node
    pub struct SubscriptionId;
}

/// Set of change categories a subscription is interested in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeMask(u16);

impl ChangeMask {
    pub const NONE: ChangeMask = ChangeMask(0);
    pub const BOUNDS: ChangeMask = ChangeMask(1 << 0);
    pub const Z_ORDER: ChangeMask = ChangeMask(1 << 1);
    pub const TRANSFORM: ChangeMask = ChangeMask(1 << 2);
    pub const VISIBILITY: ChangeMask = ChangeMask(1 << 3);
    pub const CURSOR: ChangeMask = ChangeMask(1 << 4);
    pub const ENABLED: ChangeMask = ChangeMask(1 << 5);
    pub const CHILDREN: ChangeMask = ChangeMask(1 << 6);
    pub const CLIP_MONITORING: ChangeMask = ChangeMask(1 << 7);
    pub const RENDER: ChangeMask = ChangeMask(1 << 8);
    pub const LAYOUT: ChangeMask = ChangeMask(1 << 9);
    pub const ALL: ChangeMask = ChangeMask((1 << 10) - 1);

    pub const fn union(self, other: ChangeMask) -> ChangeMask {
        ChangeMask(self.0 | other.0)
    }

    pub const fn intersects(self, other: ChangeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ChangeMask {
    type Output = ChangeMask;

    fn bitor(self, rhs: ChangeMask) -> ChangeMask {
        self.union(rhs)
    }
}

impl BitOrAssign for ChangeMask {
    fn bitor_assign(&mut self, rhs: ChangeMask) {
        *self = self.union(rhs);
    }
}

/// A single observable change of a node
#[derive(Clone, Debug, PartialEq)]
pub enum NodeChange {
    Bounds { node: NodeId, old: Rect, new: Rect },
    ZOrder { node: NodeId, old: i32, new: i32 },
    Transform { node: NodeId, old: Affine2D, new: Affine2D },
    Visibility { node: NodeId, old: bool, new: bool },
    Cursor { node: NodeId, old: Option<Cursor>, new: Option<Cursor> },
    Enabled { node: NodeId, old: bool, new: bool },
    /// `child` was inserted under `parent` at `index`
    ChildAdded { parent: NodeId, child: NodeId, index: usize },
    /// `child` left `parent`; it may be re-added elsewhere later
    ChildRemoved { parent: NodeId, child: NodeId },
    /// `child` changed position among its siblings
    ChildMoved { parent: NodeId, child: NodeId, index: usize },
    ClipMonitoring { node: NodeId, old: bool, new: bool },
    /// Node code asked to be painted again
    RenderRequested { node: NodeId },
    /// Node code asked for its children to be laid out again
    LayoutRequested { node: NodeId },
}

impl NodeChange {
    /// The node whose subscriptions this change is matched against
    ///
    /// Structural changes are reported against the parent.
    pub fn subject(&self) -> NodeId {
        match *self {
            NodeChange::Bounds { node, .. }
            | NodeChange::ZOrder { node, .. }
            | NodeChange::Transform { node, .. }
            | NodeChange::Visibility { node, .. }
            | NodeChange::Cursor { node, .. }
            | NodeChange::Enabled { node, .. }
            | NodeChange::ClipMonitoring { node, .. }
            | NodeChange::RenderRequested { node }
            | NodeChange::LayoutRequested { node } => node,
            NodeChange::ChildAdded { parent, .. }
            | NodeChange::ChildRemoved { parent, .. }
            | NodeChange::ChildMoved { parent, .. } => parent,
        }
    }

    /// Category of this change
    pub fn mask(&self) -> ChangeMask {
        match self {
            NodeChange::Bounds { .. } => ChangeMask::BOUNDS,
            NodeChange::ZOrder { .. } => ChangeMask::Z_ORDER,
            NodeChange::Transform { .. } => ChangeMask::TRANSFORM,
            NodeChange::Visibility { .. } => ChangeMask::VISIBILITY,
            NodeChange::Cursor { .. } => ChangeMask::CURSOR,
            NodeChange::Enabled { .. } => ChangeMask::ENABLED,
            NodeChange::ChildAdded { .. }
            | NodeChange::ChildRemoved { .. }
            | NodeChange::ChildMoved { .. } => ChangeMask::CHILDREN,
            NodeChange::ClipMonitoring { .. } => ChangeMask::CLIP_MONITORING,
            NodeChange::RenderRequested { .. } => ChangeMask::RENDER,
            NodeChange::LayoutRequested { .. } => ChangeMask::LAYOUT,
        }
    }
}

#[derive(Debug)]
struct Subscription {
    mailbox: MailboxId,
    node: NodeId,
    mask: ChangeMask,
}

/// Registration table routing node changes to observer mailboxes
#[derive(Debug, Default)]
pub struct Notifier {
    mailboxes: SlotMap<MailboxId, VecDeque<NodeChange>>,
    subscriptions: SlotMap<SubscriptionId, Subscription>,
    by_node: FxHashMap<NodeId, SmallVec<[SubscriptionId; 2]>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mailbox for a new observer
    pub fn create_mailbox(&mut self) -> MailboxId {
        self.mailboxes.insert(VecDeque::new())
    }

    /// Remove a mailbox together with all of its subscriptions
    pub fn remove_mailbox(&mut self, mailbox: MailboxId) {
        let owned: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.mailbox == mailbox)
            .map(|(id, _)| id)
            .collect();

        for id in owned {
            self.unsubscribe(id);
        }

        self.mailboxes.remove(mailbox);
    }

    /// Register `mailbox` for the changes of `node` matching `mask`
    pub fn subscribe(
        &mut self,
        mailbox: MailboxId,
        node: NodeId,
        mask: ChangeMask,
    ) -> SubscriptionId {
        let id = self.subscriptions.insert(Subscription {
            mailbox,
            node,
            mask,
        });
        self.by_node.entry(node).or_default().push(id);
        id
    }

    /// Release a subscription; unknown ids are ignored
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(sub) = self.subscriptions.remove(id) else {
            return;
        };

        if let Some(ids) = self.by_node.get_mut(&sub.node) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_node.remove(&sub.node);
            }
        }
    }

    /// Number of live subscriptions for a node
    pub fn subscription_count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map_or(0, |ids| ids.len())
    }

    /// Append a change to every mailbox subscribed to it
    ///
    /// A mailbox receives each change at most once, even when several of its
    /// subscriptions match.
    pub fn notify(&mut self, change: NodeChange) {
        let Some(ids) = self.by_node.get(&change.subject()) else {
            return;
        };

        let mask = change.mask();
        let mut targets: SmallVec<[MailboxId; 2]> = SmallVec::new();

        for id in ids {
            if let Some(sub) = self.subscriptions.get(*id) {
                if sub.mask.intersects(mask) && !targets.contains(&sub.mailbox) {
                    targets.push(sub.mailbox);
                }
            }
        }

        for mailbox in targets {
            if let Some(queue) = self.mailboxes.get_mut(mailbox) {
                queue.push_back(change.clone());
            }
        }
    }

    /// Take the oldest pending change of a mailbox
    pub fn pop(&mut self, mailbox: MailboxId) -> Option<NodeChange> {
        self.mailboxes.get_mut(mailbox)?.pop_front()
    }

    /// Number of pending changes in a mailbox
    pub fn pending(&self, mailbox: MailboxId) -> usize {
        self.mailboxes.get(mailbox).map_or(0, |queue| queue.len())
    }
}
