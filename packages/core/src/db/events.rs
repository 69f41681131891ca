//! Tree Events
//!
//! Events broadcast by `NodeService` after a mutation has committed, so that
//! client-side caches (or the SSE endpoint) can update without re-listing the
//! whole tree.
//!
//! Events are emitted through a tokio broadcast channel; a subscriber that
//! lags too far behind misses events and should re-list.

use crate::models::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// A committed change to the tree
///
/// Serialized internally tagged, e.g.
/// `{"type":"node:deleted","id":4,"deletedCount":2,"updatedSiblings":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TreeEvent {
    /// A new leaf was attached
    #[serde(rename = "node:created")]
    NodeCreated { node: Node },

    /// A node's title changed
    #[serde(rename = "node:updated")]
    NodeUpdated { node: Node },

    /// Nodes changed parent, ordering or depth
    ///
    /// Carries the directly moved nodes and any renumbered siblings.
    /// Descendants whose depth changed are not listed.
    #[serde(rename = "nodes:reordered")]
    NodesReordered { nodes: Vec<Node> },

    /// A subtree was removed
    #[serde(rename = "node:deleted", rename_all = "camelCase")]
    NodeDeleted {
        id: NodeId,
        deleted_count: u64,
        updated_siblings: Vec<Node>,
    },
}

impl TreeEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TreeEvent::NodeCreated { .. } => "node:created",
            TreeEvent::NodeUpdated { .. } => "node:updated",
            TreeEvent::NodesReordered { .. } => "nodes:reordered",
            TreeEvent::NodeDeleted { .. } => "node:deleted",
        }
    }
}
