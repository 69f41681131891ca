//! Tree Configuration
//!
//! Selects the tree shape and describes the seeded root. Loaded from the
//! environment by the server binary:
//!
//! - `ARBOR_TREE_SHAPE` - `general` (default) or `binary`
//! - `ARBOR_ROOT_TITLE` - title given to the root when it is first seeded

use crate::hierarchy::TreeShape;
use crate::models::{normalize_title, NodeId, ValidationError, ROOT_NODE_ID};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Title of the seeded root unless overridden
pub const DEFAULT_ROOT_TITLE: &str = "Pinecone tree";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid root title: {0}")]
    InvalidRootTitle(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// Sibling slot policy shared by every operation
    pub shape: TreeShape,
    /// Id of the seeded root
    pub root_id: NodeId,
    /// Title of the seeded root
    pub root_title: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            shape: TreeShape::General,
            root_id: ROOT_NODE_ID,
            root_title: DEFAULT_ROOT_TITLE.to_string(),
        }
    }
}

impl TreeConfig {
    pub fn binary() -> Self {
        Self {
            shape: TreeShape::Binary,
            ..Default::default()
        }
    }

    /// Read overrides from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (unset keys keep defaults)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(shape) = lookup("ARBOR_TREE_SHAPE") {
            config.shape = shape
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "ARBOR_TREE_SHAPE".to_string(),
                    message,
                })?;
        }

        if let Some(title) = lookup("ARBOR_ROOT_TITLE") {
            config.root_title = normalize_title(&title)?;
        }

        Ok(config)
    }
}
