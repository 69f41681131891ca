//! Database Error Types
//!
//! Failures while opening the database file, preparing the schema and
//! seeding the root node. Row-level failures inside a transaction surface as
//! `anyhow::Error` through the `NodeStore` traits instead.

use crate::models::NodeId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    #[error("Cannot create database directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// A schema or pragma statement failed
    #[error("Schema setup failed: {0}")]
    SchemaFailed(String),

    /// The configured root id belongs to a node that has a parent
    #[error("Node {root_id} exists but is not a root (parent {parent_id})")]
    RootConflict { root_id: NodeId, parent_id: NodeId },

    #[error("Database operation failed: {0}")]
    Libsql(#[from] libsql::Error),
}

impl DatabaseError {
    pub fn open_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::OpenFailed { path, source }
    }

    /// Map a directory creation failure, singling out permission problems
    pub fn directory(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::DirectoryCreationFailed { path, source }
        }
    }

    pub fn schema(statement: &str, source: libsql::Error) -> Self {
        Self::SchemaFailed(format!("'{}': {}", statement, source))
    }
}
