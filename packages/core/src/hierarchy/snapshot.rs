//! Hierarchy Snapshot and Cycle Detection
//!
//! A `HierarchySnapshot` is an immutable parent→children adjacency built from
//! a full node listing. The ordering engine builds a fresh one inside each
//! structural transaction, right before checking whether a move would attach a
//! node beneath its own descendant.
//!
//! All walks are iterative and track visited nodes, so they terminate even if
//! the stored parent relation is ever cyclic.

use crate::models::{Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Immutable view of the parent relation at one point in time
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl HierarchySnapshot {
    /// Build the adjacency from any collection of nodes
    ///
    /// Children are kept in ascending `ordering` so walks are deterministic.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut ranked: HashMap<NodeId, Vec<(i64, NodeId)>> = HashMap::new();

        for node in nodes {
            if let Some(parent_id) = node.parent_id {
                ranked
                    .entry(parent_id)
                    .or_default()
                    .push((node.ordering, node.id));
            }
        }

        let children = ranked
            .into_iter()
            .map(|(parent_id, mut siblings)| {
                siblings.sort_unstable();
                (parent_id, siblings.into_iter().map(|(_, id)| id).collect())
            })
            .collect();

        Self { children }
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `candidate_id` lies in the subtree rooted at `ancestor_id`
    ///
    /// A node is not its own descendant.
    pub fn is_descendant(&self, ancestor_id: NodeId, candidate_id: NodeId) -> bool {
        let mut stack = vec![ancestor_id];
        let mut visited = HashSet::from([ancestor_id]);

        while let Some(current) = stack.pop() {
            for &child in self.children_of(current) {
                if child == candidate_id {
                    return true;
                }
                if visited.insert(child) {
                    stack.push(child);
                }
            }
        }

        false
    }

    /// Ids of the subtree rooted at `root_id` in pre-order, root first
    pub fn subtree(&self, root_id: NodeId) -> Vec<NodeId> {
        preorder(root_id, |id| self.children_of(id).to_vec())
    }
}

/// Convenience wrapper: build a snapshot and run a single descendant check
pub fn is_descendant(nodes: &[Node], ancestor_id: NodeId, candidate_id: NodeId) -> bool {
    HierarchySnapshot::from_nodes(nodes).is_descendant(ancestor_id, candidate_id)
}

/// Iterative pre-order walk from `root_id`
///
/// `children` yields the children of a node in the order they should be
/// visited. Each node is emitted at most once.
pub(crate) fn preorder<F, I>(root_id: NodeId, mut children: F) -> Vec<NodeId>
where
    F: FnMut(NodeId) -> I,
    I: IntoIterator<Item = NodeId>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root_id];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        order.push(current);
        // Reverse so the first child is popped first
        stack.extend(children(current).into_iter().rev());
    }

    order
}
