//! Tree Assembly
//!
//! Folds the flat node listing into a nested structure for rendering. Pure and
//! idempotent: the same listing always yields the same tree.
//!
//! Binary trees map sibling slots to fixed sides: ordering `2` is the left
//! child and ordering `1` the right child.

use crate::hierarchy::{preorder, LEFT_SLOT, RIGHT_SLOT};
use crate::models::{Node, NodeId};
use serde::Serialize;
use std::collections::HashMap;

/// General tree node with children in ascending ordering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<TreeNode>,
}

/// Binary tree node with fixed left/right slots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryTreeNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_child: Option<Box<BinaryTreeNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_child: Option<Box<BinaryTreeNode>>,
}

/// Assembled tree in the configured shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TreeView {
    General(TreeNode),
    Binary(BinaryTreeNode),
}

/// Index of a flat listing: nodes by id and children ids by parent
struct Index<'a> {
    nodes: HashMap<NodeId, &'a Node>,
    children: HashMap<NodeId, Vec<&'a Node>>,
    root: Option<&'a Node>,
}

impl<'a> Index<'a> {
    fn build(nodes: &'a [Node]) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<NodeId, Vec<&Node>> = HashMap::new();
        let mut root = None;

        for node in nodes {
            by_id.insert(node.id, node);
            match node.parent_id {
                Some(parent_id) => children.entry(parent_id).or_default().push(node),
                // Several parentless nodes would be corrupt data; the first wins
                None if root.is_none() => root = Some(node),
                None => {}
            }
        }

        for siblings in children.values_mut() {
            siblings.sort_by_key(|n| (n.ordering, n.id));
        }

        Self {
            nodes: by_id,
            children,
            root,
        }
    }

    fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children
            .get(&id)
            .map(|siblings| siblings.iter().map(|n| n.id).collect())
            .unwrap_or_default()
    }
}

/// Assemble a general tree from a flat listing
///
/// Returns `None` if no node is parentless. Nodes whose parent is missing
/// from the listing are left out.
pub fn assemble_tree(nodes: &[Node]) -> Option<TreeNode> {
    let index = Index::build(nodes);
    let root = index.root?;
    let order = preorder(root.id, |id| index.child_ids(id));

    // Build bottom-up: walking the pre-order backwards visits every child
    // before its parent
    let mut built: HashMap<NodeId, TreeNode> = HashMap::with_capacity(order.len());
    for id in order.iter().rev() {
        let children = index
            .child_ids(*id)
            .into_iter()
            .filter_map(|child_id| built.remove(&child_id))
            .collect();
        let node = index.nodes[id].clone();
        built.insert(*id, TreeNode { node, children });
    }

    built.remove(&root.id)
}

/// Assemble a binary tree from a flat listing
///
/// Children with ordering outside `{1, 2}` are ignored; if two children claim
/// the same slot the first in the listing wins.
pub fn assemble_binary_tree(nodes: &[Node]) -> Option<BinaryTreeNode> {
    let index = Index::build(nodes);
    let root = index.root?;

    // (left, right) per parent, in listing order
    let mut slot_map: HashMap<NodeId, (Option<NodeId>, Option<NodeId>)> = HashMap::new();
    for node in nodes {
        let Some(parent_id) = node.parent_id else {
            continue;
        };
        let (left, right) = slot_map.entry(parent_id).or_default();
        match node.ordering {
            LEFT_SLOT if left.is_none() => *left = Some(node.id),
            RIGHT_SLOT if right.is_none() => *right = Some(node.id),
            _ => {}
        }
    }

    let order = preorder(root.id, |id| {
        let (left, right) = slot_map.get(&id).copied().unwrap_or_default();
        left.into_iter().chain(right).collect::<Vec<_>>()
    });

    let mut built: HashMap<NodeId, BinaryTreeNode> = HashMap::with_capacity(order.len());
    for id in order.iter().rev() {
        let (left, right) = slot_map.get(id).copied().unwrap_or((None, None));
        let left_child = left.and_then(|l| built.remove(&l)).map(Box::new);
        let right_child = right.and_then(|r| built.remove(&r)).map(Box::new);
        let node = index.nodes[id].clone();
        built.insert(
            *id,
            BinaryTreeNode {
                node,
                left_child,
                right_child,
            },
        );
    }

    built.remove(&root.id)
}
