//! Business Services
//!
//! - `NodeService` - the hierarchical ordering engine: create, rename,
//!   delete, reattach, reorder and shift, plus listing and tree assembly
//!
//! Services own the tree invariants; the database layer below only executes
//! row operations.

pub mod error;
pub mod node_service;

pub use error::{ErrorKind, NodeServiceError};
pub use node_service::NodeService;
