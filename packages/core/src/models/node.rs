//! Node Data Structures
//!
//! This module defines the `Node` record and the value types that flow in and
//! out of the ordering engine.
//!
//! # Invariants
//!
//! - Exactly one node has no `parent_id`: the root
//! - `depth == parent.depth + 1` for every non-root node
//! - `ordering` is unique among siblings (dense `1..N` for general trees,
//!   one of `{1, 2}` for binary trees)
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::models::normalize_title;
//!
//! assert_eq!(normalize_title("  Spruce  ").unwrap(), "Spruce");
//! assert!(normalize_title("   ").is_err());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Node identifier. Assigned by the store, never reused.
pub type NodeId = i64;

/// Well-known id of the seeded root node
pub const ROOT_NODE_ID: NodeId = 1;

/// Titles must be strictly shorter than this many characters after trimming
pub const MAX_TITLE_LENGTH: usize = 20;

/// Validation errors for node input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required and must not be blank")]
    EmptyTitle,

    #[error("Title length must be between 1 and {max} characters long, got {length}")]
    TitleTooLong { length: usize, max: usize },

    #[error("Invalid ordering {ordering}: {reason}")]
    InvalidOrdering { ordering: i64, reason: String },

    #[error("Invalid shift direction {0}: expected -1 or 1")]
    InvalidDirection(i64),
}

/// Trim and validate a node title
///
/// Returns the trimmed title. Length is counted in characters, not bytes.
pub fn normalize_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let length = trimmed.chars().count();
    if length >= MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong {
            length,
            max: MAX_TITLE_LENGTH - 1,
        });
    }

    Ok(trimmed.to_string())
}

/// A single entry in the hierarchy
///
/// Serialized with the field names the web client expects
/// (`parentNodeId`, `createdAt`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,

    /// Display title (1-19 characters, trimmed)
    pub title: String,

    /// Parent reference, `None` only for the root
    #[serde(rename = "parentNodeId")]
    pub parent_id: Option<NodeId>,

    /// Distance from the root (root = 0)
    pub depth: i64,

    /// Rank among siblings
    pub ordering: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Whether this node is the parentless root
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Row data for inserting a node. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub title: String,
    pub parent_id: NodeId,
    pub depth: i64,
    pub ordering: i64,
}

/// Sparse update applied by the store (only `Some` fields change)
///
/// Structural fields can only point a node at a parent, never detach it:
/// the root is the only parentless node and it is never updated structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub parent_id: Option<NodeId>,
    pub depth: Option<i64>,
    pub ordering: Option<i64>,
}

impl NodeUpdate {
    /// Rename only
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Change sibling rank only
    pub fn ordering(ordering: i64) -> Self {
        Self {
            ordering: Some(ordering),
            ..Default::default()
        }
    }

    /// Full structural placement: parent, rank and depth together
    pub fn placement(parent_id: NodeId, ordering: i64, depth: i64) -> Self {
        Self {
            title: None,
            parent_id: Some(parent_id),
            depth: Some(depth),
            ordering: Some(ordering),
        }
    }
}

/// Parameters for creating a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNodeParams {
    /// Existing parent to attach under
    pub parent_id: NodeId,
    /// Raw title (trimmed and validated by the service)
    pub title: String,
    /// Explicit sibling slot; `None` appends
    pub ordering: Option<i64>,
}

impl CreateNodeParams {
    pub fn new(parent_id: NodeId, title: impl Into<String>) -> Self {
        Self {
            parent_id,
            title: title.into(),
            ordering: None,
        }
    }

    pub fn with_ordering(mut self, ordering: i64) -> Self {
        self.ordering = Some(ordering);
        self
    }
}

/// A node together with its direct children (ascending ordering)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWithChildren {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<Node>,
}

/// Full listing: every node (depth, then ordering) and the maximum depth
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListing {
    pub nodes: Vec<Node>,
    /// Deepest level present in the tree
    pub total: i64,
}

/// Outcome of a cascading delete
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// The node that was explicitly deleted (its subtree went with it)
    pub deleted_node: Node,
    /// Number of rows removed, the node itself included
    pub deleted_count: u64,
    /// Former siblings whose ordering was decremented to close the gap
    pub updated_siblings: Vec<Node>,
}

/// Outcome of a reorder: the moved node and the displaced occupant, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderResult {
    pub node: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swapped: Option<Node>,
}

/// Direction for swapping a node with its adjacent sibling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ShiftDirection {
    /// Towards ordering - 1
    Previous,
    /// Towards ordering + 1
    Next,
}

impl ShiftDirection {
    pub fn offset(self) -> i64 {
        match self {
            ShiftDirection::Previous => -1,
            ShiftDirection::Next => 1,
        }
    }
}

impl TryFrom<i64> for ShiftDirection {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(ShiftDirection::Previous),
            1 => Ok(ShiftDirection::Next),
            other => Err(ValidationError::InvalidDirection(other)),
        }
    }
}

impl From<ShiftDirection> for i64 {
    fn from(direction: ShiftDirection) -> Self {
        direction.offset()
    }
}
