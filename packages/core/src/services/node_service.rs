//! Node Service - Hierarchical Ordering Engine
//!
//! This module owns every structural rule of the tree:
//!
//! - unique sibling ordering (dense `1..N` for general trees, fixed `{1, 2}`
//!   slots for binary trees)
//! - `depth == parent.depth + 1` for every node
//! - acyclicity of the parent relation
//!
//! # Transactions
//!
//! Every mutation validates its plain inputs first, then opens one
//! `NodeTransaction`, re-reads what it needs through it, and performs all
//! row changes (placement, compaction of the vacated slot, depth propagation)
//! before committing. Any failure rolls the whole operation back, so callers
//! never observe a half-applied move.
//!
//! # Events
//!
//! A [`TreeEvent`] is broadcast after each successful commit. No-op requests
//! (moving a node onto its own slot) emit nothing.

use crate::config::TreeConfig;
use crate::db::{DatabaseService, MemoryStore, NodeStore, NodeTransaction, TreeEvent, TursoStore};
use crate::hierarchy::{propagate_depth, HierarchySnapshot, TreeShape};
use crate::models::{
    assemble_binary_tree, assemble_tree, normalize_title, CreateNodeParams, DeleteResult,
    NewNode, Node, NodeId, NodeListing, NodeUpdate, NodeWithChildren, ReorderResult,
    ShiftDirection, TreeView,
};
use crate::services::error::NodeServiceError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel capacity for tree events
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Context gathered for a reattach or reorder, read inside the transaction
struct MovePlan {
    node: Node,
    old_parent_id: NodeId,
    new_parent: Node,
    snapshot: HierarchySnapshot,
}

/// The ordering engine
///
/// Cheap to clone: the store and the event channel are shared.
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    config: Arc<TreeConfig>,
    event_tx: broadcast::Sender<TreeEvent>,
}

impl NodeService {
    /// Create a service over any store
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use arbor_core::db::MemoryStore;
    /// # use arbor_core::{NodeService, TreeConfig};
    /// # use std::sync::Arc;
    /// let config = TreeConfig::default();
    /// let service = NodeService::new(Arc::new(MemoryStore::new(&config)), config);
    /// ```
    pub fn new(store: Arc<dyn NodeStore>, config: TreeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            config: Arc::new(config),
            event_tx,
        }
    }

    /// Service over a fresh in-memory tree holding only the root
    pub fn in_memory(config: TreeConfig) -> Self {
        let store = Arc::new(MemoryStore::new(&config));
        Self::new(store, config)
    }

    /// Service over the libsql database at `db_path` (created if missing)
    pub async fn open(db_path: PathBuf, config: TreeConfig) -> Result<Self, NodeServiceError> {
        let db = DatabaseService::new(db_path, &config).await?;
        let store = Arc::new(TursoStore::new(Arc::new(db)));
        Ok(Self::new(store, config))
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn shape(&self) -> TreeShape {
        self.config.shape
    }

    /// Subscribe to tree events
    ///
    /// ```no_run
    /// # use arbor_core::{NodeService, TreeConfig};
    /// # #[tokio::main]
    /// # async fn main() {
    /// let service = NodeService::in_memory(TreeConfig::default());
    /// let mut rx = service.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("{}", event.event_type());
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Send to all subscribers (having none is fine)
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    fn ensure_not_root(&self, id: NodeId, action: &str) -> Result<(), NodeServiceError> {
        if id == self.config.root_id {
            return Err(NodeServiceError::forbidden(format!(
                "The root node cannot be {}",
                action
            )));
        }
        Ok(())
    }

    //
    // READS
    //

    /// Every node sorted by depth then ordering, with the maximum depth
    pub async fn list_nodes(&self) -> Result<NodeListing, NodeServiceError> {
        let nodes = self.store.list_nodes().await?;
        let total = self.store.max_depth().await?;
        Ok(NodeListing { nodes, total })
    }

    /// A node with its direct children in ascending ordering
    pub async fn get_node(&self, id: NodeId) -> Result<NodeWithChildren, NodeServiceError> {
        let node = self
            .store
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))?;
        let children = self.store.get_children(id).await?;
        Ok(NodeWithChildren { node, children })
    }

    /// The whole tree assembled in the configured shape
    pub async fn tree(&self) -> Result<Option<TreeView>, NodeServiceError> {
        let nodes = self.store.list_nodes().await?;
        Ok(match self.config.shape {
            TreeShape::General => assemble_tree(&nodes).map(TreeView::General),
            TreeShape::Binary => assemble_binary_tree(&nodes).map(TreeView::Binary),
        })
    }

    //
    // MUTATIONS
    //

    /// Create a leaf under an existing parent
    ///
    /// Without an explicit ordering the node is appended (general) or takes
    /// the lowest free slot (binary).
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: blank or over-long title, unrepresentable ordering,
    ///   or (general trees) an ordering past the next free slot
    /// - `NotFound`: the parent does not exist
    /// - `Conflict`: the requested slot is taken, or a binary parent is full
    pub async fn create_node(&self, params: CreateNodeParams) -> Result<Node, NodeServiceError> {
        let title = normalize_title(&params.title)?;
        if let Some(ordering) = params.ordering {
            self.config.shape.validate_ordering(ordering)?;
        }

        let mut tx = self.store.begin().await?;
        let outcome = self
            .create_in(tx.as_mut(), params.parent_id, title, params.ordering)
            .await;
        let node = finish(tx, outcome).await?;

        tracing::debug!(
            "Created node {} under {} at ordering {}",
            node.id,
            params.parent_id,
            node.ordering
        );
        self.emit_event(TreeEvent::NodeCreated { node: node.clone() });
        Ok(node)
    }

    async fn create_in(
        &self,
        tx: &mut dyn NodeTransaction,
        parent_id: NodeId,
        title: String,
        ordering: Option<i64>,
    ) -> Result<Node, NodeServiceError> {
        let parent = tx
            .get_node(parent_id)
            .await?
            .ok_or_else(|| NodeServiceError::parent_not_found(parent_id))?;
        let siblings = tx.get_children(parent_id).await?;

        let ordering = match ordering {
            Some(requested) => {
                if siblings.iter().any(|s| s.ordering == requested) {
                    return Err(NodeServiceError::conflict(format!(
                        "Ordering {} is already taken under node {}",
                        requested, parent_id
                    )));
                }
                if self.config.shape.compacts_on_removal() {
                    let next = siblings.len() as i64 + 1;
                    if requested != next {
                        return Err(NodeServiceError::invalid_argument(format!(
                            "Ordering {} would leave a gap under node {}: the next free slot is {}",
                            requested, parent_id, next
                        )));
                    }
                }
                requested
            }
            None => self.config.shape.append_slot(&siblings).ok_or_else(|| {
                NodeServiceError::conflict(format!(
                    "Node {} already has a left and a right child",
                    parent_id
                ))
            })?,
        };

        let node = tx
            .insert_node(NewNode {
                title,
                parent_id,
                depth: parent.depth + 1,
                ordering,
            })
            .await?;
        Ok(node)
    }

    /// Change a node's title
    pub async fn rename_node(&self, id: NodeId, title: &str) -> Result<Node, NodeServiceError> {
        let title = normalize_title(title)?;

        let mut tx = self.store.begin().await?;
        let outcome = rename_in(tx.as_mut(), id, title).await;
        let node = finish(tx, outcome).await?;

        tracing::debug!("Renamed node {} to '{}'", id, node.title);
        self.emit_event(TreeEvent::NodeUpdated { node: node.clone() });
        Ok(node)
    }

    /// Delete a node and its whole subtree
    ///
    /// In general trees every later sibling moves up one slot.
    pub async fn delete_node(&self, id: NodeId) -> Result<DeleteResult, NodeServiceError> {
        self.ensure_not_root(id, "deleted")?;

        let mut tx = self.store.begin().await?;
        let outcome = self.delete_in(tx.as_mut(), id).await;
        let result = finish(tx, outcome).await?;

        tracing::debug!(
            "Deleted node {} ({} rows), renumbered {} siblings",
            id,
            result.deleted_count,
            result.updated_siblings.len()
        );
        self.emit_event(TreeEvent::NodeDeleted {
            id,
            deleted_count: result.deleted_count,
            updated_siblings: result.updated_siblings.clone(),
        });
        Ok(result)
    }

    async fn delete_in(
        &self,
        tx: &mut dyn NodeTransaction,
        id: NodeId,
    ) -> Result<DeleteResult, NodeServiceError> {
        let node = load(&*tx, id).await?;
        let parent_id = node
            .parent_id
            .ok_or_else(|| NodeServiceError::forbidden("The root node cannot be deleted"))?;

        let deleted_count = tx.delete_subtree(id).await?;
        let updated_siblings = if self.config.shape.compacts_on_removal() {
            tx.shift_orderings_after(parent_id, node.ordering).await?
        } else {
            Vec::new()
        };

        Ok(DeleteResult {
            deleted_node: node,
            deleted_count,
            updated_siblings,
        })
    }

    /// Move a node (with its subtree) to the end of another parent's children
    ///
    /// Binary trees take the lowest free slot instead; reattaching to the
    /// current parent leaves a binary node where it is.
    ///
    /// # Errors
    ///
    /// - `Forbidden`: `id` is the root
    /// - `InvalidArgument`: no new parent given, or it is `id` itself
    /// - `NotFound`: either node does not exist
    /// - `CircularDependency`: the new parent lies inside the moved subtree
    /// - `Conflict`: the new binary parent already has two children
    pub async fn reattach_node(
        &self,
        id: NodeId,
        new_parent_id: Option<NodeId>,
    ) -> Result<Node, NodeServiceError> {
        self.ensure_not_root(id, "moved")?;
        let new_parent_id = require_new_parent(id, new_parent_id)?;

        let mut tx = self.store.begin().await?;
        let outcome = self.reattach_in(tx.as_mut(), id, new_parent_id).await;
        let (node, changed) = finish(tx, outcome).await?;

        if !changed.is_empty() {
            tracing::debug!(
                "Reattached node {} under {} at ordering {} (depth {})",
                id,
                new_parent_id,
                node.ordering,
                node.depth
            );
            self.emit_event(TreeEvent::NodesReordered { nodes: changed });
        }
        Ok(node)
    }

    async fn reattach_in(
        &self,
        tx: &mut dyn NodeTransaction,
        id: NodeId,
        new_parent_id: NodeId,
    ) -> Result<(Node, Vec<Node>), NodeServiceError> {
        let MovePlan {
            node,
            old_parent_id,
            new_parent,
            ..
        } = plan_move(&*tx, id, new_parent_id).await?;
        let shape = self.config.shape;

        if !shape.compacts_on_removal() && old_parent_id == new_parent.id {
            return Ok((node, Vec::new()));
        }

        // Close the vacated slot first; the node keeps its old ordering until
        // it is placed, so it is never shifted itself
        let mut changed = Vec::new();
        if shape.compacts_on_removal() {
            changed = tx.shift_orderings_after(old_parent_id, node.ordering).await?;
        }

        let siblings: Vec<Node> = tx
            .get_children(new_parent.id)
            .await?
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        let ordering = shape.append_slot(&siblings).ok_or_else(|| {
            NodeServiceError::conflict(format!(
                "Node {} already has a left and a right child",
                new_parent.id
            ))
        })?;

        let depth = new_parent.depth + 1;
        tx.update_node(id, NodeUpdate::placement(new_parent.id, ordering, depth))
            .await?;
        if depth != node.depth {
            propagate_depth(&mut *tx, id, depth).await?;
        }

        let moved = load(&*tx, id).await?;
        changed.insert(0, moved.clone());
        Ok((moved, changed))
    }

    /// Move a node to `(new_parent_id, new_ordering)`
    ///
    /// If another node holds that slot the two swap places: the occupant
    /// takes over the moved node's former parent, ordering and depth. Each
    /// swapped node's subtree is re-levelled when its depth changed.
    ///
    /// Moving into an empty slot is only allowed where it leaves no gap: the
    /// next free slot of a general parent, or either slot of a binary parent.
    ///
    /// # Errors
    ///
    /// Same as [`reattach_node`](Self::reattach_node), plus
    /// `InvalidArgument` for an unrepresentable or gap-leaving ordering and
    /// `CircularDependency` when one swapped node is an ancestor of the other.
    pub async fn reorder_node(
        &self,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        new_ordering: i64,
    ) -> Result<ReorderResult, NodeServiceError> {
        self.ensure_not_root(id, "moved")?;
        let new_parent_id = require_new_parent(id, new_parent_id)?;
        self.config.shape.validate_ordering(new_ordering)?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .reorder_in(tx.as_mut(), id, new_parent_id, new_ordering)
            .await;
        let (result, changed) = finish(tx, outcome).await?;

        if !changed.is_empty() {
            tracing::debug!(
                "Reordered node {} to ordering {} under {}{}",
                id,
                new_ordering,
                new_parent_id,
                result
                    .swapped
                    .as_ref()
                    .map(|s| format!(", swapped with {}", s.id))
                    .unwrap_or_default()
            );
            self.emit_event(TreeEvent::NodesReordered { nodes: changed });
        }
        Ok(result)
    }

    async fn reorder_in(
        &self,
        tx: &mut dyn NodeTransaction,
        id: NodeId,
        new_parent_id: NodeId,
        new_ordering: i64,
    ) -> Result<(ReorderResult, Vec<Node>), NodeServiceError> {
        let MovePlan {
            node,
            old_parent_id,
            new_parent,
            snapshot,
        } = plan_move(&*tx, id, new_parent_id).await?;
        let new_depth = new_parent.depth + 1;

        match tx.find_child_at(new_parent.id, new_ordering).await? {
            Some(occupant) if occupant.id == id => Ok((
                ReorderResult {
                    node,
                    swapped: None,
                },
                Vec::new(),
            )),

            Some(occupant) => {
                if occupant.depth != node.depth {
                    let (ancestor, descendant) = if node.depth < occupant.depth {
                        (node.id, occupant.id)
                    } else {
                        (occupant.id, node.id)
                    };
                    if snapshot.is_descendant(ancestor, descendant) {
                        return Err(NodeServiceError::circular_reference(format!(
                            "node {} is an ancestor of node {}, they cannot swap places",
                            ancestor, descendant
                        )));
                    }
                }

                tx.update_node(
                    occupant.id,
                    NodeUpdate::placement(old_parent_id, node.ordering, node.depth),
                )
                .await?;
                tx.update_node(
                    id,
                    NodeUpdate::placement(new_parent.id, new_ordering, new_depth),
                )
                .await?;

                if new_depth != node.depth && new_parent.id != occupant.id {
                    propagate_depth(&mut *tx, id, new_depth).await?;
                }
                if node.depth != occupant.depth && old_parent_id != id {
                    propagate_depth(&mut *tx, occupant.id, node.depth).await?;
                }

                let moved = load(&*tx, id).await?;
                let swapped = load(&*tx, occupant.id).await?;
                let changed = vec![moved.clone(), swapped.clone()];
                Ok((
                    ReorderResult {
                        node: moved,
                        swapped: Some(swapped),
                    },
                    changed,
                ))
            }

            None => {
                let mut changed = Vec::new();
                if self.config.shape.compacts_on_removal() {
                    let siblings = tx
                        .get_children(new_parent.id)
                        .await?
                        .into_iter()
                        .filter(|s| s.id != id)
                        .count();
                    let next = siblings as i64 + 1;
                    if new_ordering != next {
                        return Err(NodeServiceError::invalid_argument(format!(
                            "Ordering {} would leave a gap under node {}: the next free slot is {}",
                            new_ordering, new_parent.id, next
                        )));
                    }
                    changed = tx.shift_orderings_after(old_parent_id, node.ordering).await?;
                }

                tx.update_node(
                    id,
                    NodeUpdate::placement(new_parent.id, new_ordering, new_depth),
                )
                .await?;
                if new_depth != node.depth {
                    propagate_depth(&mut *tx, id, new_depth).await?;
                }

                let moved = load(&*tx, id).await?;
                changed.insert(0, moved.clone());
                Ok((
                    ReorderResult {
                        node: moved,
                        swapped: None,
                    },
                    changed,
                ))
            }
        }
    }

    /// Swap a node with its neighbour at `ordering + direction`
    ///
    /// Returns the two nodes, the requested one first.
    pub async fn shift_node(
        &self,
        id: NodeId,
        direction: ShiftDirection,
    ) -> Result<Vec<Node>, NodeServiceError> {
        let mut tx = self.store.begin().await?;
        let outcome = shift_in(tx.as_mut(), id, direction).await;
        let nodes = finish(tx, outcome).await?;

        tracing::debug!("Shifted node {} to ordering {}", id, nodes[0].ordering);
        self.emit_event(TreeEvent::NodesReordered {
            nodes: nodes.clone(),
        });
        Ok(nodes)
    }
}

async fn rename_in(
    tx: &mut dyn NodeTransaction,
    id: NodeId,
    title: String,
) -> Result<Node, NodeServiceError> {
    load(&*tx, id).await?;
    Ok(tx.update_node(id, NodeUpdate::title(title)).await?)
}

async fn shift_in(
    tx: &mut dyn NodeTransaction,
    id: NodeId,
    direction: ShiftDirection,
) -> Result<Vec<Node>, NodeServiceError> {
    let node = load(&*tx, id).await?;
    let parent_id = node.parent_id.ok_or(NodeServiceError::NoParent { id })?;

    let target = node.ordering + direction.offset();
    let sibling = tx
        .find_child_at(parent_id, target)
        .await?
        .ok_or_else(|| NodeServiceError::invalid_argument("No sibling in that direction"))?;

    let moved = tx.update_node(id, NodeUpdate::ordering(target)).await?;
    let other = tx
        .update_node(sibling.id, NodeUpdate::ordering(node.ordering))
        .await?;
    Ok(vec![moved, other])
}

fn require_new_parent(
    id: NodeId,
    new_parent_id: Option<NodeId>,
) -> Result<NodeId, NodeServiceError> {
    match new_parent_id {
        None => Err(NodeServiceError::invalid_argument(
            "A new parent node id is required",
        )),
        Some(parent_id) if parent_id == id => Err(NodeServiceError::invalid_argument(format!(
            "Node {} cannot become its own parent",
            id
        ))),
        Some(parent_id) => Ok(parent_id),
    }
}

async fn load(tx: &dyn NodeTransaction, id: NodeId) -> Result<Node, NodeServiceError> {
    tx.get_node(id)
        .await?
        .ok_or_else(|| NodeServiceError::node_not_found(id))
}

/// Load both ends of a move and reject moves into the node's own subtree
///
/// The snapshot is read inside the transaction, right before the check.
async fn plan_move(
    tx: &dyn NodeTransaction,
    id: NodeId,
    new_parent_id: NodeId,
) -> Result<MovePlan, NodeServiceError> {
    let node = load(tx, id).await?;
    let new_parent = tx
        .get_node(new_parent_id)
        .await?
        .ok_or_else(|| NodeServiceError::parent_not_found(new_parent_id))?;
    let old_parent_id = node
        .parent_id
        .ok_or_else(|| NodeServiceError::forbidden("The root node cannot be moved"))?;

    let snapshot = HierarchySnapshot::from_nodes(&tx.list_nodes().await?);
    if snapshot.is_descendant(id, new_parent_id) {
        return Err(NodeServiceError::circular_reference(format!(
            "node {} cannot be moved under its own descendant {}",
            id, new_parent_id
        )));
    }

    Ok(MovePlan {
        node,
        old_parent_id,
        new_parent,
        snapshot,
    })
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn NodeTransaction>,
    outcome: Result<T, NodeServiceError>,
) -> Result<T, NodeServiceError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("Rollback failed after '{}': {:#}", err, rollback_err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROOT_NODE_ID;
    use crate::services::error::ErrorKind;
    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    fn service() -> NodeService {
        NodeService::in_memory(TreeConfig::default())
    }

    /// Memory store whose transactions fail on the depth write
    struct FailingDepthStore(MemoryStore);

    struct FailingDepthTransaction(Box<dyn NodeTransaction>);

    #[async_trait]
    impl NodeStore for FailingDepthStore {
        async fn begin(&self) -> anyhow::Result<Box<dyn NodeTransaction>> {
            Ok(Box::new(FailingDepthTransaction(self.0.begin().await?)))
        }

        async fn get_node(&self, id: NodeId) -> anyhow::Result<Option<Node>> {
            self.0.get_node(id).await
        }

        async fn get_children(&self, parent_id: NodeId) -> anyhow::Result<Vec<Node>> {
            self.0.get_children(parent_id).await
        }

        async fn list_nodes(&self) -> anyhow::Result<Vec<Node>> {
            self.0.list_nodes().await
        }

        async fn max_depth(&self) -> anyhow::Result<i64> {
            self.0.max_depth().await
        }
    }

    #[async_trait]
    impl NodeTransaction for FailingDepthTransaction {
        async fn get_node(&self, id: NodeId) -> anyhow::Result<Option<Node>> {
            self.0.get_node(id).await
        }

        async fn get_children(&self, parent_id: NodeId) -> anyhow::Result<Vec<Node>> {
            self.0.get_children(parent_id).await
        }

        async fn find_child_at(
            &self,
            parent_id: NodeId,
            ordering: i64,
        ) -> anyhow::Result<Option<Node>> {
            self.0.find_child_at(parent_id, ordering).await
        }

        async fn list_nodes(&self) -> anyhow::Result<Vec<Node>> {
            self.0.list_nodes().await
        }

        async fn insert_node(&mut self, node: NewNode) -> anyhow::Result<Node> {
            self.0.insert_node(node).await
        }

        async fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> anyhow::Result<Node> {
            self.0.update_node(id, update).await
        }

        async fn shift_orderings_after(
            &mut self,
            parent_id: NodeId,
            ordering: i64,
        ) -> anyhow::Result<Vec<Node>> {
            self.0.shift_orderings_after(parent_id, ordering).await
        }

        async fn set_children_depth(
            &mut self,
            parent_id: NodeId,
            _depth: i64,
        ) -> anyhow::Result<Vec<NodeId>> {
            Err(anyhow::anyhow!("disk I/O error below node {}", parent_id))
        }

        async fn delete_subtree(&mut self, id: NodeId) -> anyhow::Result<u64> {
            self.0.delete_subtree(id).await
        }

        async fn commit(self: Box<Self>) -> anyhow::Result<()> {
            self.0.commit().await
        }

        async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
            self.0.rollback().await
        }
    }

    async fn create(service: &NodeService, parent_id: NodeId, title: &str) -> Node {
        service
            .create_node(CreateNodeParams::new(parent_id, title))
            .await
            .unwrap()
    }

    async fn ordering_of(service: &NodeService, id: NodeId) -> i64 {
        service.get_node(id).await.unwrap().node.ordering
    }

    #[tokio::test]
    async fn test_create_appends_with_derived_depth() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "  B  ").await;
        let c = create(&service, a.id, "C").await;

        assert_eq!((a.depth, a.ordering), (1, 1));
        assert_eq!((b.depth, b.ordering, b.title.as_str()), (1, 2, "B"));
        assert_eq!((c.depth, c.ordering), (2, 1));
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_creates_nothing() {
        let service = service();
        let err = service
            .create_node(CreateNodeParams::new(999, "Orphan"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(service.list_nodes().await.unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_titles() {
        let service = service();
        for title in ["", "   ", "x".repeat(20).as_str()] {
            let err = service
                .create_node(CreateNodeParams::new(ROOT_NODE_ID, title))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn test_create_with_explicit_ordering() {
        let service = service();
        create(&service, ROOT_NODE_ID, "A").await;

        let taken = service
            .create_node(CreateNodeParams::new(ROOT_NODE_ID, "B").with_ordering(1))
            .await
            .unwrap_err();
        assert_eq!(taken.kind(), ErrorKind::Conflict);

        let gap = service
            .create_node(CreateNodeParams::new(ROOT_NODE_ID, "B").with_ordering(5))
            .await
            .unwrap_err();
        assert_eq!(gap.kind(), ErrorKind::InvalidArgument);

        let b = service
            .create_node(CreateNodeParams::new(ROOT_NODE_ID, "B").with_ordering(2))
            .await
            .unwrap();
        assert_eq!(b.ordering, 2);
    }

    #[tokio::test]
    async fn test_rename_keeps_structure() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;

        let renamed = service.rename_node(a.id, " Alder ").await.unwrap();
        assert_eq!(renamed.title, "Alder");
        assert_eq!((renamed.depth, renamed.ordering), (a.depth, a.ordering));

        assert_eq!(
            service.rename_node(404, "x").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service.rename_node(a.id, "").await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_and_compacts() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        let c = create(&service, ROOT_NODE_ID, "C").await;
        let a1 = create(&service, a.id, "A1").await;
        create(&service, a1.id, "A1x").await;

        let result = service.delete_node(a.id).await.unwrap();
        assert_eq!(result.deleted_node.id, a.id);
        assert_eq!(result.deleted_count, 3);
        let renumbered: Vec<(NodeId, i64)> = result
            .updated_siblings
            .iter()
            .map(|n| (n.id, n.ordering))
            .collect();
        assert_eq!(renumbered, vec![(b.id, 1), (c.id, 2)]);

        let listing = service.list_nodes().await.unwrap();
        assert_eq!(listing.nodes.len(), 3);
        assert_eq!(listing.total, 1);
    }

    #[tokio::test]
    async fn test_root_is_protected() {
        let service = service();
        assert_eq!(
            service.delete_node(ROOT_NODE_ID).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        let a = create(&service, ROOT_NODE_ID, "A").await;
        assert_eq!(
            service
                .reattach_node(ROOT_NODE_ID, Some(a.id))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            service
                .shift_node(ROOT_NODE_ID, ShiftDirection::Next)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_reattach_propagates_depth_and_compacts() {
        // root(1) -> A(1) -> C ; root -> B(2)
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        let c = create(&service, a.id, "C").await;

        let moved = service.reattach_node(a.id, Some(b.id)).await.unwrap();
        assert_eq!(moved.parent_id, Some(b.id));
        assert_eq!(moved.depth, 2);
        assert_eq!(moved.ordering, 1);

        assert_eq!(service.get_node(c.id).await.unwrap().node.depth, 3);
        assert_eq!(ordering_of(&service, b.id).await, 1);
    }

    #[tokio::test]
    async fn test_reattach_into_descendant_is_rejected() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let c = create(&service, a.id, "C").await;

        let err = service.reattach_node(a.id, Some(c.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularDependency);

        let unchanged = service.get_node(a.id).await.unwrap().node;
        assert_eq!(unchanged, a);
    }

    #[tokio::test]
    async fn test_reattach_argument_errors() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;

        let missing = service.reattach_node(a.id, None).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::InvalidArgument);
        let own = service.reattach_node(a.id, Some(a.id)).await.unwrap_err();
        assert_eq!(own.kind(), ErrorKind::InvalidArgument);
        let gone = service.reattach_node(a.id, Some(404)).await.unwrap_err();
        assert_eq!(gone.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reattach_to_same_parent_moves_to_end() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        let c = create(&service, ROOT_NODE_ID, "C").await;

        let moved = service.reattach_node(a.id, Some(ROOT_NODE_ID)).await.unwrap();
        assert_eq!(moved.ordering, 3);
        assert_eq!(ordering_of(&service, b.id).await, 1);
        assert_eq!(ordering_of(&service, c.id).await, 2);
    }

    #[tokio::test]
    async fn test_reorder_swaps_with_occupant_across_parents() {
        // root -> A -> A1 ; root -> B -> B1 -> B1x
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        let a1 = create(&service, a.id, "A1").await;
        let b1 = create(&service, b.id, "B1").await;
        let b1x = create(&service, b1.id, "B1x").await;

        // Move A (depth 1) onto B1's slot (depth 2)
        let result = service.reorder_node(a.id, Some(b.id), 1).await.unwrap();
        let swapped = result.swapped.unwrap();

        assert_eq!(result.node.parent_id, Some(b.id));
        assert_eq!((result.node.depth, result.node.ordering), (2, 1));
        assert_eq!(swapped.id, b1.id);
        assert_eq!(swapped.parent_id, Some(ROOT_NODE_ID));
        assert_eq!((swapped.depth, swapped.ordering), (1, 1));

        assert_eq!(service.get_node(a1.id).await.unwrap().node.depth, 3);
        assert_eq!(service.get_node(b1x.id).await.unwrap().node.depth, 2);
    }

    #[tokio::test]
    async fn test_reorder_swap_with_descendant_is_rejected() {
        // root -> A -> A1 -> A2 ; moving A2 onto A's slot would cycle
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let a1 = create(&service, a.id, "A1").await;
        let a2 = create(&service, a1.id, "A2").await;

        let err = service
            .reorder_node(a2.id, Some(ROOT_NODE_ID), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularDependency);
        assert_eq!(service.get_node(a2.id).await.unwrap().node, a2);
    }

    #[tokio::test]
    async fn test_reorder_into_empty_slot() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        let c = create(&service, ROOT_NODE_ID, "C").await;

        // B has no children: only slot 1 is free without leaving a gap
        let gap = service.reorder_node(a.id, Some(b.id), 2).await.unwrap_err();
        assert_eq!(gap.kind(), ErrorKind::InvalidArgument);

        let result = service.reorder_node(a.id, Some(b.id), 1).await.unwrap();
        assert!(result.swapped.is_none());
        assert_eq!((result.node.depth, result.node.ordering), (2, 1));
        assert_eq!(ordering_of(&service, b.id).await, 1);
        assert_eq!(ordering_of(&service, c.id).await, 2);
    }

    #[tokio::test]
    async fn test_reorder_onto_own_slot_is_noop() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let mut rx = service.subscribe_to_events();

        let result = service
            .reorder_node(a.id, Some(ROOT_NODE_ID), 1)
            .await
            .unwrap();
        assert_eq!(result.node, a);
        assert!(result.swapped.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reorder_rejects_non_positive_ordering() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let err = service
            .reorder_node(a.id, Some(ROOT_NODE_ID), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_shift_swaps_with_neighbour() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;

        let swapped = service
            .shift_node(b.id, ShiftDirection::Previous)
            .await
            .unwrap();
        assert_eq!((swapped[0].id, swapped[0].ordering), (b.id, 1));
        assert_eq!((swapped[1].id, swapped[1].ordering), (a.id, 2));

        let err = service
            .shift_node(b.id, ShiftDirection::Previous)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        // Shifting back restores the original orderings
        service.shift_node(b.id, ShiftDirection::Next).await.unwrap();
        assert_eq!(ordering_of(&service, a.id).await, 1);
        assert_eq!(ordering_of(&service, b.id).await, 2);
    }

    #[tokio::test]
    async fn test_events_follow_commits() {
        let service = service();
        let mut rx = service.subscribe_to_events();

        let a = create(&service, ROOT_NODE_ID, "A").await;
        assert_eq!(rx.recv().await.unwrap(), TreeEvent::NodeCreated { node: a.clone() });

        // Failed operations broadcast nothing
        service.rename_node(a.id, "").await.unwrap_err();
        service.delete_node(a.id).await.unwrap();
        match rx.recv().await.unwrap() {
            TreeEvent::NodeDeleted { id, deleted_count, .. } => {
                assert_eq!(id, a.id);
                assert_eq!(deleted_count, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tree_view_matches_shape() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        create(&service, a.id, "A1").await;

        match service.tree().await.unwrap().unwrap() {
            TreeView::General(root) => {
                assert_eq!(root.node.id, ROOT_NODE_ID);
                assert_eq!(root.children[0].children.len(), 1);
            }
            TreeView::Binary(_) => panic!("expected a general tree"),
        }
    }

    #[tokio::test]
    async fn test_get_node_lists_children_in_order() {
        let service = service();
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        service.shift_node(b.id, ShiftDirection::Previous).await.unwrap();

        let root = service.get_node(ROOT_NODE_ID).await.unwrap();
        let ids: Vec<NodeId> = root.children.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(
            service.get_node(404).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_store_failure_mid_move_rolls_back() {
        let config = TreeConfig::default();
        let store = Arc::new(FailingDepthStore(MemoryStore::new(&config)));
        let service = NodeService::new(store, config);

        // Creates never touch child depths, so they succeed
        let a = create(&service, ROOT_NODE_ID, "A").await;
        let b = create(&service, ROOT_NODE_ID, "B").await;
        create(&service, a.id, "A1").await;
        let before = service.list_nodes().await.unwrap();
        let mut rx = service.subscribe_to_events();

        // A is placed under B before its child's depth write fails
        let err = service.reattach_node(a.id, Some(b.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(service.list_nodes().await.unwrap(), before);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
