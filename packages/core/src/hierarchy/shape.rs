//! Tree Shape
//!
//! General and binary trees share one engine. The shape decides how sibling
//! slots are numbered, how many siblings a parent may hold, and whether a
//! vacated slot is closed up.
//!
//! - `General`: unlimited children, orderings dense `1..N`, gaps compacted
//! - `Binary`: at most two children, ordering `2` = left, `1` = right, slots
//!   keep their meaning so nothing is compacted

use crate::models::{Node, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordering value of a binary node's right child
pub const RIGHT_SLOT: i64 = 1;

/// Ordering value of a binary node's left child
pub const LEFT_SLOT: i64 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeShape {
    #[default]
    General,
    Binary,
}

impl TreeShape {
    /// Maximum number of children per parent, if capped
    pub fn sibling_cap(self) -> Option<usize> {
        match self {
            TreeShape::General => None,
            TreeShape::Binary => Some(2),
        }
    }

    /// Whether siblings after a vacated slot shift down by one
    pub fn compacts_on_removal(self) -> bool {
        matches!(self, TreeShape::General)
    }

    /// Check that an explicitly requested ordering is representable
    pub fn validate_ordering(self, ordering: i64) -> Result<(), ValidationError> {
        match self {
            TreeShape::General if ordering < 1 => Err(ValidationError::InvalidOrdering {
                ordering,
                reason: "ordering must be a positive integer".to_string(),
            }),
            TreeShape::Binary if ordering != LEFT_SLOT && ordering != RIGHT_SLOT => {
                Err(ValidationError::InvalidOrdering {
                    ordering,
                    reason: format!(
                        "binary trees only have slots {} (right) and {} (left)",
                        RIGHT_SLOT, LEFT_SLOT
                    ),
                })
            }
            _ => Ok(()),
        }
    }

    /// Slot a newly attached child takes when none is requested
    ///
    /// General trees append at `siblings + 1`. Binary trees take the lowest
    /// free slot, or `None` when both are taken.
    pub fn append_slot(self, siblings: &[Node]) -> Option<i64> {
        if self.sibling_cap().is_some_and(|cap| siblings.len() >= cap) {
            return None;
        }
        match self {
            TreeShape::General => Some(siblings.len() as i64 + 1),
            TreeShape::Binary => [RIGHT_SLOT, LEFT_SLOT]
                .into_iter()
                .find(|slot| siblings.iter().all(|s| s.ordering != *slot)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TreeShape::General => "general",
            TreeShape::Binary => "binary",
        }
    }
}

impl fmt::Display for TreeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(TreeShape::General),
            "binary" => Ok(TreeShape::Binary),
            other => Err(format!(
                "Unknown tree shape '{}': expected 'general' or 'binary'",
                other
            )),
        }
    }
}
