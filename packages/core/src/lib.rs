//! Arbor Core - Hierarchical Ordering Engine
//!
//! This crate keeps a rooted tree of titled nodes consistent under structural
//! edits. It ships the engine, its persistence layer and the pure algorithms
//! the engine is built from.
//!
//! # Architecture
//!
//! - **One engine, two shapes**: general trees (unlimited, densely ordered
//!   children) and binary trees (fixed left/right slots) share `NodeService`
//! - **Transactional mutations**: every structural edit is one atomic
//!   `NodeTransaction`
//! - **libsql/Turso**: embedded SQLite-compatible storage, with an in-memory
//!   store for tests
//!
//! # Modules
//!
//! - [`models`] - `Node`, operation inputs/outputs, tree assembly
//! - [`hierarchy`] - cycle detection, depth propagation, tree shape
//! - [`db`] - row store traits, libsql and in-memory backends, events
//! - [`services`] - the ordering engine (`NodeService`)
//! - [`config`] - tree configuration
//!
//! # Example
//!
//! ```rust
//! use arbor_core::{CreateNodeParams, NodeService, TreeConfig, ROOT_NODE_ID};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), arbor_core::NodeServiceError> {
//! let service = NodeService::in_memory(TreeConfig::default());
//! let spruce = service.create_node(CreateNodeParams::new(ROOT_NODE_ID, "Spruce")).await?;
//! let fir = service.create_node(CreateNodeParams::new(ROOT_NODE_ID, "Fir")).await?;
//!
//! let moved = service.reattach_node(fir.id, Some(spruce.id)).await?;
//! assert_eq!(moved.depth, 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod models;
pub mod services;

pub use config::{ConfigError, TreeConfig};
pub use hierarchy::TreeShape;
pub use models::*;
pub use services::*;
