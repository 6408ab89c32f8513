//! Graph store capability and connection settings.

use crate::memory::MemoryGraphStore;
use crate::neo4j::Neo4jHttpStore;
use async_trait::async_trait;
use simgraph_core::{Error, GraphEdge, GraphNode, RelationshipKind, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Merge-based property graph store.
///
/// Every call is one unit of work for the backend (one transaction for
/// Neo4j). Implementations must not retry on the caller's behalf.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Make `key_property` a unique merge key for `label`. Must be idempotent.
    async fn ensure_schema(&self, label: &str, key_property: &str) -> Result<()>;

    /// Detach-delete every node carrying `label`; returns nodes removed.
    async fn delete_by_label(&self, label: &str) -> Result<usize>;

    /// Create-or-update nodes by `(label, key)`; returns nodes written.
    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize>;

    /// Create-or-update edges by `(source, target, kind)`; returns edges written.
    ///
    /// Edges whose endpoints do not exist are not written.
    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize>;

    async fn count_nodes(&self, label: &str) -> Result<usize>;

    async fn count_edges(&self, kind: &RelationshipKind) -> Result<usize>;

    /// Backend name for logs and summaries
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Neo4j,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "neo4j" => Ok(StoreKind::Neo4j),
            other => Err(Error::InvalidConfig(format!("unknown store: {other}"))),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Memory => f.write_str("memory"),
            StoreKind::Neo4j => f.write_str("neo4j"),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// HTTP endpoint of the Neo4j server, e.g. `http://localhost:7474`
    pub uri: String,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            uri: "http://localhost:7474".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

// password stays out of logs
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("kind", &self.kind)
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kind == StoreKind::Neo4j {
            if !(self.uri.starts_with("http://") || self.uri.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "neo4j uri must be an http(s) endpoint, got {}",
                    self.uri
                )));
            }
            if self.password.is_none() {
                return Err(Error::InvalidConfig("neo4j password is required".to_string()));
            }
            if self.database.is_empty() {
                return Err(Error::InvalidConfig("neo4j database name is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Open the configured backend.
    pub fn connect(&self) -> Result<Arc<dyn GraphStore>> {
        self.validate()?;
        Ok(match self.kind {
            StoreKind::Memory => Arc::new(MemoryGraphStore::new()),
            StoreKind::Neo4j => Arc::new(Neo4jHttpStore::new(self)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neo4j_config_validation() {
        let mut config = StoreConfig {
            kind: StoreKind::Neo4j,
            uri: "bolt://localhost:7687".to_string(),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.uri = "http://localhost:7474".to_string();
        assert!(config.validate().is_ok());

        config.password = None;
        assert!(config.validate().is_err());
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = StoreConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_parse_store_kind() {
        assert_eq!("Neo4j".parse::<StoreKind>().unwrap(), StoreKind::Neo4j);
        assert!("sqlite".parse::<StoreKind>().is_err());
    }
}
