//! Depth Propagation
//!
//! After a node moves, every node below it must be re-levelled. The walk is
//! breadth-first: all children of one parent are written in a single batched
//! statement, and only then does the walk descend into them, so each level
//! is computed from a depth that has already been written.

use crate::db::NodeTransaction;
use crate::models::NodeId;
use anyhow::Result;
use std::collections::{HashSet, VecDeque};

/// Rewrite `depth` for every descendant of `subtree_root_id`
///
/// `root_depth` is the (already persisted) depth of the subtree root. Direct
/// children get `root_depth + 1`, their children `root_depth + 2`, and so on.
/// Calling it again with the same root depth changes nothing.
///
/// Returns the number of descendants visited.
pub async fn propagate_depth(
    tx: &mut dyn NodeTransaction,
    subtree_root_id: NodeId,
    root_depth: i64,
) -> Result<usize> {
    let mut frontier = VecDeque::from([(subtree_root_id, root_depth)]);
    let mut visited = HashSet::from([subtree_root_id]);

    while let Some((parent_id, parent_depth)) = frontier.pop_front() {
        let child_depth = parent_depth + 1;
        let child_ids = tx.set_children_depth(parent_id, child_depth).await?;

        for child_id in child_ids {
            if visited.insert(child_id) {
                frontier.push_back((child_id, child_depth));
            }
        }
    }

    let descendants = visited.len() - 1;
    tracing::debug!(
        "Propagated depth below node {} (depth {}) to {} descendants",
        subtree_root_id,
        root_depth,
        descendants
    );

    Ok(descendants)
}
