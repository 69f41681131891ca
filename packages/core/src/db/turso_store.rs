//! TursoStore - NodeStore Implementation for the libsql Backend
//!
//! Wraps `DatabaseService` and maps node rows to the `Node` model. Plain reads
//! open a fresh connection each; a `TursoTransaction` holds one connection for
//! its whole lifetime and brackets its statements with `BEGIN IMMEDIATE` /
//! `COMMIT`.
//!
//! `BEGIN IMMEDIATE` takes the write lock up front, so two structural
//! mutations never interleave: the second waits (up to the busy timeout) until
//! the first commits and then reads the committed state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use arbor_core::db::{DatabaseService, NodeStore, TursoStore};
//! use arbor_core::TreeConfig;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = DatabaseService::new(PathBuf::from("./data/arbor.db"), &TreeConfig::default()).await?;
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(Arc::new(db)));
//!
//!     let root = store.get_node(1).await?;
//!     assert!(root.is_some());
//!     Ok(())
//! }
//! ```

use crate::db::node_store::{NodeStore, NodeTransaction};
use crate::db::DatabaseService;
use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Row};
use std::sync::Arc;

/// Column list matching `row_to_node`
const NODE_COLUMNS: &str = "id, title, parent_id, depth, ordering, created_at, modified_at";

/// NodeStore over an embedded libsql database
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    async fn connection(&self) -> Result<Connection> {
        self.db
            .connect_with_timeout()
            .await
            .context("Failed to open database connection")
    }
}

/// Parse timestamp from the database
///
/// Handles the SQLite `CURRENT_TIMESTAMP` format ("YYYY-MM-DD HH:MM:SS") and
/// RFC3339 for rows written by other tools.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(anyhow!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    ))
}

/// Convert a row selected with `NODE_COLUMNS` to a `Node`
fn row_to_node(row: &Row) -> Result<Node> {
    let id: i64 = row.get(0).context("Failed to get id")?;
    let title: String = row.get(1).context("Failed to get title")?;
    let parent_id: Option<i64> = row.get(2).context("Failed to get parent_id")?;
    let depth: i64 = row.get(3).context("Failed to get depth")?;
    let ordering: i64 = row.get(4).context("Failed to get ordering")?;
    let created_at_str: String = row.get(5).context("Failed to get created_at")?;
    let modified_at_str: String = row.get(6).context("Failed to get modified_at")?;

    let created_at = parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
    let modified_at = parse_timestamp(&modified_at_str).context("Failed to parse modified_at")?;

    Ok(Node {
        id,
        title,
        parent_id,
        depth,
        ordering,
        created_at,
        modified_at,
    })
}

async fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams + Send,
) -> Result<Vec<Node>> {
    let mut rows = conn
        .query(sql, params)
        .await
        .with_context(|| format!("Failed to execute query: {}", sql))?;

    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await.context("Failed to read row")? {
        nodes.push(row_to_node(&row)?);
    }
    Ok(nodes)
}

async fn query_node(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams + Send,
) -> Result<Option<Node>> {
    Ok(query_nodes(conn, sql, params).await?.into_iter().next())
}

async fn select_node(conn: &Connection, id: NodeId) -> Result<Option<Node>> {
    query_node(
        conn,
        &format!("SELECT {} FROM nodes WHERE id = ?", NODE_COLUMNS),
        [id],
    )
    .await
}

async fn select_children(conn: &Connection, parent_id: NodeId) -> Result<Vec<Node>> {
    query_nodes(
        conn,
        &format!(
            "SELECT {} FROM nodes WHERE parent_id = ? ORDER BY ordering ASC, id ASC",
            NODE_COLUMNS
        ),
        [parent_id],
    )
    .await
}

async fn select_all(conn: &Connection) -> Result<Vec<Node>> {
    query_nodes(
        conn,
        &format!(
            "SELECT {} FROM nodes ORDER BY depth ASC, ordering ASC, id ASC",
            NODE_COLUMNS
        ),
        (),
    )
    .await
}

/// Render integer ids as a SQL list literal, e.g. `(3, 7, 9)`
fn id_list(ids: &[NodeId]) -> String {
    let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("({})", joined.join(", "))
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>> {
        let conn = self.connection().await?;
        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .context("Failed to begin transaction")?;
        Ok(Box::new(TursoTransaction { conn }))
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        let conn = self.connection().await?;
        select_node(&conn, id).await
    }

    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>> {
        let conn = self.connection().await?;
        select_children(&conn, parent_id).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let conn = self.connection().await?;
        select_all(&conn).await
    }

    async fn max_depth(&self) -> Result<i64> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT COALESCE(MAX(depth), 0) FROM nodes", ())
            .await
            .context("Failed to query max depth")?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| anyhow!("Aggregate query returned no row"))?;
        row.get::<i64>(0).context("Failed to get max depth")
    }
}

/// One open `BEGIN IMMEDIATE` transaction
///
/// Dropping it without `commit` closes the connection, and SQLite rolls the
/// open transaction back.
pub struct TursoTransaction {
    conn: Connection,
}

#[async_trait]
impl NodeTransaction for TursoTransaction {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        select_node(&self.conn, id).await
    }

    async fn get_children(&self, parent_id: NodeId) -> Result<Vec<Node>> {
        select_children(&self.conn, parent_id).await
    }

    async fn find_child_at(&self, parent_id: NodeId, ordering: i64) -> Result<Option<Node>> {
        query_node(
            &self.conn,
            &format!(
                "SELECT {} FROM nodes WHERE parent_id = ? AND ordering = ? ORDER BY id LIMIT 1",
                NODE_COLUMNS
            ),
            (parent_id, ordering),
        )
        .await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        select_all(&self.conn).await
    }

    async fn insert_node(&mut self, node: NewNode) -> Result<Node> {
        self.conn
            .execute(
                "INSERT INTO nodes (title, parent_id, depth, ordering) VALUES (?, ?, ?, ?)",
                (node.title.as_str(), node.parent_id, node.depth, node.ordering),
            )
            .await
            .context("Failed to insert node")?;

        let id = self.conn.last_insert_rowid();
        select_node(&self.conn, id)
            .await?
            .ok_or_else(|| anyhow!("Inserted node {} could not be read back", id))
    }

    async fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> Result<Node> {
        let changed = self
            .conn
            .execute(
                "UPDATE nodes SET
                    title = COALESCE(?, title),
                    parent_id = COALESCE(?, parent_id),
                    depth = COALESCE(?, depth),
                    ordering = COALESCE(?, ordering),
                    modified_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                (
                    update.title,
                    update.parent_id,
                    update.depth,
                    update.ordering,
                    id,
                ),
            )
            .await
            .with_context(|| format!("Failed to update node {}", id))?;

        if changed == 0 {
            return Err(anyhow!("Node {} does not exist", id));
        }

        select_node(&self.conn, id)
            .await?
            .ok_or_else(|| anyhow!("Updated node {} could not be read back", id))
    }

    async fn shift_orderings_after(
        &mut self,
        parent_id: NodeId,
        ordering: i64,
    ) -> Result<Vec<Node>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM nodes WHERE parent_id = ? AND ordering > ?",
                (parent_id, ordering),
            )
            .await
            .context("Failed to select siblings to compact")?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.conn
            .execute(
                &format!(
                    "UPDATE nodes SET ordering = ordering - 1, modified_at = CURRENT_TIMESTAMP
                     WHERE id IN {}",
                    id_list(&ids)
                ),
                (),
            )
            .await
            .context("Failed to compact sibling orderings")?;

        query_nodes(
            &self.conn,
            &format!(
                "SELECT {} FROM nodes WHERE id IN {} ORDER BY ordering ASC",
                NODE_COLUMNS,
                id_list(&ids)
            ),
            (),
        )
        .await
    }

    async fn set_children_depth(&mut self, parent_id: NodeId, depth: i64) -> Result<Vec<NodeId>> {
        self.conn
            .execute(
                "UPDATE nodes SET depth = ?, modified_at = CURRENT_TIMESTAMP
                 WHERE parent_id = ? AND depth != ?",
                (depth, parent_id, depth),
            )
            .await
            .with_context(|| format!("Failed to set depth below node {}", parent_id))?;

        let mut rows = self
            .conn
            .query(
                "SELECT id FROM nodes WHERE parent_id = ? ORDER BY ordering ASC",
                [parent_id],
            )
            .await
            .context("Failed to select children")?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    async fn delete_subtree(&mut self, id: NodeId) -> Result<u64> {
        // UNION (not UNION ALL) so the walk stops even on a corrupted cycle
        const SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM nodes WHERE id = ?
                UNION
                SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
             )";

        // The change count skips rows removed by ON DELETE CASCADE, so count first
        let mut rows = self
            .conn
            .query(&format!("{} SELECT COUNT(*) FROM subtree", SUBTREE), [id])
            .await
            .with_context(|| format!("Failed to count subtree of node {}", id))?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        drop(rows);

        self.conn
            .execute(
                &format!(
                    "{} DELETE FROM nodes WHERE id IN (SELECT id FROM subtree)",
                    SUBTREE
                ),
                [id],
            )
            .await
            .with_context(|| format!("Failed to delete subtree of node {}", id))?;

        Ok(u64::try_from(count)?)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.conn
            .execute("COMMIT", ())
            .await
            .context("Failed to commit transaction")?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.conn
            .execute("ROLLBACK", ())
            .await
            .context("Failed to roll back transaction")?;
        Ok(())
    }
}
