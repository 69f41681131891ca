//! Service Layer Error Types
//!
//! Every failure of the ordering engine carries a stable [`ErrorKind`] and a
//! human-readable message. Validation always happens before any write, so
//! every kind except `Internal` means the store was not touched.

use crate::db::DatabaseError;
use crate::models::{NodeId, ValidationError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable failure category, independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Forbidden,
    Conflict,
    CircularDependency,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering engine errors
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Referenced parent does not exist
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: NodeId },

    /// Node has no parent, so it has no siblings either
    #[error("Node {id} has no parent")]
    NoParent { id: NodeId },

    /// Title, ordering or direction failed validation
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Structurally meaningless request (self-parenting, missing sibling, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not permitted on this node (the root)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested slot is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Move would attach a node beneath its own descendant
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// Store could not be opened
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Store failure during an operation; the transaction was rolled back
    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl NodeServiceError {
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    pub fn parent_not_found(parent_id: NodeId) -> Self {
        Self::ParentNotFound { parent_id }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } | Self::ParentNotFound { .. } | Self::NoParent { .. } => {
                ErrorKind::NotFound
            }
            Self::ValidationFailed(_) | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CircularReference { .. } => ErrorKind::CircularDependency,
            Self::DatabaseError(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
