//! Data Models
//!
//! - [`Node`] - the single persisted entity, plus the input/output value types
//!   of the ordering engine
//! - [`TreeNode`] / [`BinaryTreeNode`] - nested views produced by the tree
//!   assembler

mod node;
mod tree;

pub use node::{
    normalize_title, CreateNodeParams, DeleteResult, NewNode, Node, NodeId, NodeListing,
    NodeUpdate, NodeWithChildren, ReorderResult, ShiftDirection, ValidationError,
    MAX_TITLE_LENGTH, ROOT_NODE_ID,
};
pub use tree::{assemble_binary_tree, assemble_tree, BinaryTreeNode, TreeNode, TreeView};
