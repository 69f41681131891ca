//! Database Layer
//!
//! Persistence for the node tree:
//!
//! - [`NodeStore`] / [`NodeTransaction`] - the row store boundary used by the
//!   ordering engine
//! - [`TursoStore`] - embedded libsql (SQLite) backend via [`DatabaseService`]
//! - [`MemoryStore`] - in-process backend for tests and ephemeral trees
//! - [`TreeEvent`] - change notifications broadcast after commit

mod database;
mod error;
pub mod events;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use events::TreeEvent;
pub use memory_store::{MemoryStore, MemoryTransaction};
pub use node_store::{NodeStore, NodeTransaction};
pub use turso_store::{TursoStore, TursoTransaction};
