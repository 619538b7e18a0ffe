//! Error types for weft_core

use thiserror::Error;

use crate::tree::NodeId;

/// Errors returned by structural tree mutations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The child is the parent itself or one of its ancestors
    #[error("cannot add {child:?} under {parent:?}: it would become its own ancestor")]
    Cycle { parent: NodeId, child: NodeId },

    /// The node id does not belong to this tree
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The node is not a child of the given parent
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
