//! Hierarchy Algorithms
//!
//! Pure and store-level building blocks used by the ordering engine:
//!
//! - [`snapshot`] - parent/children adjacency and cycle detection
//! - [`depth`] - breadth-first depth propagation through a transaction
//! - [`shape`] - general vs binary sibling slot policy

pub mod depth;
pub mod shape;
pub mod snapshot;

pub use depth::propagate_depth;
pub use shape::{TreeShape, LEFT_SLOT, RIGHT_SLOT};
pub use snapshot::{is_descendant, HierarchySnapshot};

pub(crate) use snapshot::preorder;
