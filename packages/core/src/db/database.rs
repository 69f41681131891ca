//! Database Connection Management
//!
//! Opens the embedded libsql database, prepares the `nodes` table and seeds the
//! root node.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any writable file path; parent directories are
//!   created on demand
//! - **WAL mode**: readers are not blocked by the single writer
//! - **Foreign keys**: enabled on every connection, so removing a parent row
//!   cascades to its children
//! - **Idempotent init**: `CREATE ... IF NOT EXISTS` and `INSERT OR IGNORE`
//!   make reopening an existing file a no-op
//!
//! # Connections in async code
//!
//! Always use `connect_with_timeout()` from async functions. It applies the
//! per-connection pragmas (busy timeout, foreign keys) that `connect()` does
//! not.
//!
//! ```no_run
//! # use arbor_core::db::DatabaseService;
//! # use arbor_core::TreeConfig;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/arbor.db"), &TreeConfig::default()).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::TreeConfig;
use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection, in milliseconds
const BUSY_TIMEOUT_MS: u32 = 5000;

/// `(parent_id, ordering)` is not unique at the SQL level: swaps and
/// compaction pass through transient duplicates inside a transaction.
const CREATE_NODES_TABLE: &str = "CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    parent_id INTEGER REFERENCES nodes(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL DEFAULT 0,
    ordering INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

/// Sibling scans and slot lookups, then listing order
const NODE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent_ordering ON nodes(parent_id, ordering)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_depth ON nodes(depth, ordering)",
];

/// Database service owning the libsql handle
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path`
    ///
    /// This will:
    /// 1. Ensure the parent directory exists
    /// 2. Open/create the database file
    /// 3. Create the `nodes` table and its indexes
    /// 4. Seed the root node described by `tree` if it is missing
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// connection fails, schema initialization fails, or the configured root
    /// id is already taken by a non-root row.
    pub async fn new(db_path: PathBuf, tree: &TreeConfig) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::directory(parent.to_path_buf(), e))?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::open_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;
        service.seed_root(tree).await?;

        tracing::info!(
            "Database ready at {} (shape: {})",
            service.db_path.display(),
            tree.shape
        );

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through `query()` rather
    /// than `execute()`.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn
            .prepare(pragma)
            .await
            .map_err(|e| DatabaseError::schema(pragma, e))?;
        stmt.query(())
            .await
            .map_err(|e| DatabaseError::schema(pragma, e))?;
        Ok(())
    }

    /// Create tables and indexes (safe to call repeatedly)
    ///
    /// # Schema
    ///
    /// - `nodes`: one row per node. `AUTOINCREMENT` keeps ids from ever being
    ///   reused after a delete.
    /// - `idx_nodes_parent_ordering`, `idx_nodes_depth`
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(CREATE_NODES_TABLE, ())
            .await
            .map_err(|e| DatabaseError::schema("CREATE TABLE nodes", e))?;

        self.create_indexes(&conn).await?;

        // Flush the fresh schema out of the WAL so a second handle opened
        // right away sees the table
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        for sql in NODE_INDEXES {
            conn.execute(sql, ())
                .await
                .map_err(|e| DatabaseError::schema(sql, e))?;
        }

        Ok(())
    }

    /// Insert the root row if it does not exist yet
    async fn seed_root(&self, tree: &TreeConfig) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO nodes (id, title, parent_id, depth, ordering)
                 VALUES (?, ?, NULL, 0, 0)",
                (tree.root_id, tree.root_title.as_str()),
            )
            .await?;

        if inserted > 0 {
            tracing::info!("Seeded root node {} '{}'", tree.root_id, tree.root_title);
            return Ok(());
        }

        // Row already present: make sure it really is the root
        let mut rows = conn
            .query("SELECT parent_id FROM nodes WHERE id = ?", [tree.root_id])
            .await?;
        if let Some(row) = rows.next().await? {
            if let Some(parent_id) = row.get::<Option<i64>>(0)? {
                return Err(DatabaseError::RootConflict {
                    root_id: tree.root_id,
                    parent_id,
                });
            }
        }

        Ok(())
    }

    /// Get a raw connection without per-connection pragmas
    ///
    /// Only for synchronous set-up code; async callers should use
    /// `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        Ok(self.db.connect()?)
    }

    /// Get a connection with busy timeout and foreign keys configured
    ///
    /// The busy timeout makes a writer wait for the lock held by another
    /// transaction instead of failing immediately with `SQLITE_BUSY`.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }
}
