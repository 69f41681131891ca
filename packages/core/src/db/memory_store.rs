//! MemoryStore - In-Process NodeStore Implementation
//!
//! Keeps the whole tree in a `BTreeMap` behind a tokio mutex. A transaction
//! takes the mutex for its whole lifetime and works on a private copy of the
//! state; `commit` swaps the copy in, `rollback` (or drop) throws it away.
//! Transactions are therefore fully serialised, which matches the
//! all-or-nothing contract of the libsql backend.
//!
//! Used by tests and by short-lived embeddings that do not need durability.

use crate::config::TreeConfig;
use crate::db::node_store::{NodeStore, NodeTransaction};
use crate::hierarchy::HierarchySnapshot;
use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    nodes: BTreeMap<NodeId, Node>,
    /// Highest id ever handed out (ids are never reused)
    last_id: NodeId,
}

impl MemoryState {
    fn children(&self, parent_id: NodeId) -> Vec<Node> {
        let mut children: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|n| (n.ordering, n.id));
        children
    }

    fn sorted(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| (n.depth, n.ordering, n.id));
        nodes
    }
}

/// NodeStore backed by process memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create a store holding only the seeded root node
    pub fn new(config: &TreeConfig) -> Self {
        let now = Utc::now();
        let root = Node {
            id: config.root_id,
            title: config.root_title.clone(),
            parent_id: None,
            depth: 0,
            ordering: 0,
            created_at: now,
            modified_at: now,
        };

        let mut state = MemoryState {
            nodes: BTreeMap::new(),
            last_id: config.root_id,
        };
        state.nodes.insert(root.id, root);

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.state.lock().await.nodes.get(&id).cloned())
    }

    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>> {
        Ok(self.state.lock().await.children(parent_id))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state.lock().await.sorted())
    }

    async fn max_depth(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.nodes.values().map(|n| n.depth).max().unwrap_or(0))
    }
}

/// Exclusive working copy of the store state
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryTransaction {
    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.working
            .nodes
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Node {} does not exist", id))
    }
}

#[async_trait]
impl NodeTransaction for MemoryTransaction {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.working.nodes.get(&id).cloned())
    }

    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>> {
        Ok(self.working.children(parent_id))
    }

    async fn find_child_at(&self, parent_id: NodeId, ordering: i64) -> Result<Option<Node>> {
        Ok(self
            .working
            .nodes
            .values()
            .find(|n| n.parent_id == Some(parent_id) && n.ordering == ordering)
            .cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.working.sorted())
    }

    async fn insert_node(&mut self, node: NewNode) -> Result<Node> {
        let now = Utc::now();
        self.working.last_id += 1;
        let created = Node {
            id: self.working.last_id,
            title: node.title,
            parent_id: Some(node.parent_id),
            depth: node.depth,
            ordering: node.ordering,
            created_at: now,
            modified_at: now,
        };
        self.working.nodes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> Result<Node> {
        let node = self.node_mut(id)?;
        if let Some(title) = update.title {
            node.title = title;
        }
        if let Some(parent_id) = update.parent_id {
            node.parent_id = Some(parent_id);
        }
        if let Some(depth) = update.depth {
            node.depth = depth;
        }
        if let Some(ordering) = update.ordering {
            node.ordering = ordering;
        }
        node.modified_at = Utc::now();
        Ok(node.clone())
    }

    async fn shift_orderings_after(
        &mut self,
        parent_id: NodeId,
        ordering: i64,
    ) -> Result<Vec<Node>> {
        let now = Utc::now();
        let mut shifted = Vec::new();
        for node in self.working.nodes.values_mut() {
            if node.parent_id == Some(parent_id) && node.ordering > ordering {
                node.ordering -= 1;
                node.modified_at = now;
                shifted.push(node.clone());
            }
        }
        shifted.sort_by_key(|n| n.ordering);
        Ok(shifted)
    }

    async fn set_children_depth(&mut self, parent_id: NodeId, depth: i64) -> Result<Vec<NodeId>> {
        let now = Utc::now();
        let mut children = Vec::new();
        for node in self.working.nodes.values_mut() {
            if node.parent_id == Some(parent_id) {
                if node.depth != depth {
                    node.depth = depth;
                    node.modified_at = now;
                }
                children.push((node.ordering, node.id));
            }
        }
        children.sort_unstable();
        Ok(children.into_iter().map(|(_, id)| id).collect())
    }

    async fn delete_subtree(&mut self, id: NodeId) -> Result<u64> {
        if !self.working.nodes.contains_key(&id) {
            return Ok(0);
        }

        let subtree = HierarchySnapshot::from_nodes(self.working.nodes.values()).subtree(id);
        for node_id in &subtree {
            self.working.nodes.remove(node_id);
        }
        Ok(subtree.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
