//! NodeStore Trait - Row Store Abstraction
//!
//! This module defines the persistence boundary of the ordering engine. The
//! engine only ever talks to these two traits, so the libsql backend
//! (`TursoStore`) and the in-memory backend (`MemoryStore`) are
//! interchangeable.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: all methods are async so embedded and networked
//!    backends fit the same shape
//! 2. **Explicit Transactions**: every structural mutation runs inside a
//!    `NodeTransaction`; reads made through the transaction see its own
//!    uncommitted writes
//! 3. **Error Handling**: uses `anyhow::Result` for flexible error context;
//!    the service layer maps store failures to `Internal`
//! 4. **No Business Rules**: the store never validates titles, orderings or
//!    ancestry, it only executes row operations
//!
//! # Examples
//!
//! ```rust,no_run
//! use arbor_core::db::{MemoryStore, NodeStore};
//! use arbor_core::models::{NewNode, NodeUpdate};
//! use arbor_core::TreeConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = MemoryStore::new(&TreeConfig::default());
//!
//!     let mut tx = store.begin().await?;
//!     let node = tx
//!         .insert_node(NewNode { title: "Spruce".into(), parent_id: 1, depth: 1, ordering: 1 })
//!         .await?;
//!     tx.update_node(node.id, NodeUpdate::title("Fir")).await?;
//!     tx.commit().await?;
//!
//!     Ok(())
//! }
//! ```

use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use anyhow::Result;
use async_trait::async_trait;

/// Entry point to node persistence
///
/// Implementations must be `Send + Sync` so a single store can be shared by
/// every request handler.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Open an atomic transaction scope
    ///
    /// Nothing written through the returned transaction is visible to other
    /// readers until `commit`. Dropping it without committing discards it.
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>>;

    /// Point lookup by id
    ///
    /// - `Ok(Some(node))` if the node exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Direct children of `parent_id` in ascending ordering
    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>>;

    /// Every node, sorted by depth then ordering
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Deepest depth present (0 for a tree holding only the root)
    async fn max_depth(&self) -> Result<i64>;
}

/// A single atomic unit of work against the store
#[async_trait]
pub trait NodeTransaction: Send + Sync {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Direct children of `parent_id` in ascending ordering
    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>>;

    /// The child of `parent_id` occupying `ordering`, if any
    async fn find_child_at(&self, parent_id: NodeId, ordering: i64) -> Result<Option<Node>>;

    /// Full snapshot of the tree as seen by this transaction
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Insert a node; the store assigns a fresh id and timestamps
    async fn insert_node(&mut self, node: NewNode) -> Result<Node>;

    /// Apply a sparse update and return the row as stored
    ///
    /// Fails if the node does not exist.
    async fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> Result<Node>;

    /// Decrement the ordering of every child of `parent_id` ranked after
    /// `ordering`, returning the renumbered rows in their new order
    async fn shift_orderings_after(&mut self, parent_id: NodeId, ordering: i64)
        -> Result<Vec<Node>>;

    /// Set `depth` on every direct child of `parent_id` in one write
    ///
    /// Returns the child ids so the caller can descend a level.
    async fn set_children_depth(&mut self, parent_id: NodeId, depth: i64) -> Result<Vec<NodeId>>;

    /// Delete a node together with its entire subtree
    ///
    /// Returns the number of rows removed (0 if the node did not exist).
    async fn delete_subtree(&mut self, id: NodeId) -> Result<u64>;

    /// Make every write of this transaction durable and visible
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write of this transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
