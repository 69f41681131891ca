//! Server Configuration
//!
//! - `ARBOR_HOST` - bind address (default `127.0.0.1`)
//! - `ARBOR_PORT` - port (default `3001`)
//! - `ARBOR_DB_PATH` - libsql database file (default `~/.arbor/database/arbor.db`)
//!
//! Tree settings (`ARBOR_TREE_SHAPE`, `ARBOR_ROOT_TITLE`) are read by
//! [`TreeConfig`].

use anyhow::{Context, Result};
use arbor_core::TreeConfig;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub tree: TreeConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tree = TreeConfig::from_lookup(&lookup)?;

        let port = match lookup("ARBOR_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid ARBOR_PORT '{}'", port))?,
            None => DEFAULT_PORT,
        };

        let database_path = match lookup("ARBOR_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        Ok(Self {
            host: lookup("ARBOR_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_path,
            tree,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `~/.arbor/database/arbor.db`
fn default_database_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home_dir.join(".arbor").join("database").join("arbor.db"))
}
