//! Neo4j backend over the transactional HTTP endpoint
//!
//! Every trait call is one `POST /db/{database}/tx/commit` request, so one
//! batch commits or fails as a whole. Rows are sent as `$rows` parameters and
//! applied with `UNWIND … MERGE`; labels, keys and relationship types are
//! validated identifiers, back-quoted into the statement text.

use crate::store::{GraphStore, StoreConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use simgraph_core::config::validate_identifier;
use simgraph_core::{Error, GraphEdge, GraphNode, RelationshipKind, Result};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub struct Neo4jHttpStore {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
}

impl Neo4jHttpStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let password = config
            .password
            .clone()
            .ok_or_else(|| Error::InvalidConfig("neo4j password is required".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/db/{}/tx/commit", config.uri.trim_end_matches('/'), config.database),
            user: config.user.clone(),
            password,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run statements in one transaction; returns the first column of each
    /// statement's first row.
    async fn commit(&self, statements: Vec<Statement>) -> Result<Vec<Option<Value>>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await
            .map_err(|e| Error::Persistence(format!("neo4j request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Persistence(format!("neo4j returned {status}: {body}")));
        }
        let body: TxResponse = response
            .json()
            .await
            .map_err(|e| Error::Persistence(format!("invalid neo4j response: {e}")))?;

        if let Some(err) = body.errors.first() {
            return Err(Error::Persistence(format!("{}: {}", err.code, err.message)));
        }
        Ok(body
            .results
            .into_iter()
            .map(|r| r.data.into_iter().next().and_then(|row| row.row.into_iter().next()))
            .collect())
    }

    async fn commit_counts(&self, statements: Vec<Statement>) -> Result<usize> {
        let values = self.commit(statements).await?;
        Ok(values
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_u64).unwrap_or(0) as usize)
            .sum())
    }
}

fn quoted(kind: &str, name: &str) -> Result<String> {
    validate_identifier(kind, name)?;
    Ok(format!("`{name}`"))
}

fn merge_nodes_statement(label: &str, key_property: &str, rows: Vec<Value>) -> Result<Statement> {
    let statement = format!(
        "UNWIND $rows AS row \
         MERGE (n:{label} {{{key}: row.key}}) \
         SET n += row.properties \
         RETURN count(n) AS written",
        label = quoted("label", label)?,
        key = quoted("key property", key_property)?,
    );
    Ok(Statement {
        statement,
        parameters: json!({ "rows": rows }),
    })
}

fn unique_constraint_statement(label: &str, key_property: &str) -> Result<Statement> {
    let name = format!("{}_{}_unique", label.to_lowercase(), key_property.to_lowercase());
    let statement = format!(
        "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{key} IS UNIQUE",
        name = quoted("constraint", &name)?,
        label = quoted("label", label)?,
        key = quoted("key property", key_property)?,
    );
    Ok(Statement {
        statement,
        parameters: json!({}),
    })
}

/// Groups edges sharing endpoint labels, key properties and relationship type.
type EdgeShape<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

fn merge_edges_statement(shape: EdgeShape<'_>, rows: Vec<Value>) -> Result<Statement> {
    let (source_label, source_key, target_label, target_key, kind) = shape;
    let statement = format!(
        "UNWIND $rows AS row \
         MATCH (a:{sl} {{{sk}: row.source}}) \
         MATCH (b:{tl} {{{tk}: row.target}}) \
         MERGE (a)-[r:{kind}]->(b) \
         SET r += row.properties \
         RETURN count(r) AS written",
        sl = quoted("label", source_label)?,
        sk = quoted("key property", source_key)?,
        tl = quoted("label", target_label)?,
        tk = quoted("key property", target_key)?,
        kind = quoted("relationship", kind)?,
    );
    Ok(Statement {
        statement,
        parameters: json!({ "rows": rows }),
    })
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn ensure_schema(&self, label: &str, key_property: &str) -> Result<()> {
        // the unique constraint also backs MERGE lookups with an index
        self.commit(vec![unique_constraint_statement(label, key_property)?]).await?;
        debug!(label, key_property, "unique constraint ensured");
        Ok(())
    }

    async fn delete_by_label(&self, label: &str) -> Result<usize> {
        let statement = Statement {
            statement: format!(
                "MATCH (n:{}) DETACH DELETE n RETURN count(n) AS deleted",
                quoted("label", label)?
            ),
            parameters: json!({}),
        };
        self.commit_counts(vec![statement]).await
    }

    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
        let mut groups: BTreeMap<(&str, &str), Vec<Value>> = BTreeMap::new();
        for node in nodes {
            groups
                .entry((node.node.label.as_str(), node.node.key_property.as_str()))
                .or_default()
                .push(json!({ "key": node.node.key, "properties": node.properties }));
        }
        let statements = groups
            .into_iter()
            .map(|((label, key), rows)| merge_nodes_statement(label, key, rows))
            .collect::<Result<Vec<_>>>()?;
        debug!(statements = statements.len(), nodes = nodes.len(), "merging nodes");
        self.commit_counts(statements).await
    }

    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
        let mut groups: BTreeMap<EdgeShape<'_>, Vec<Value>> = BTreeMap::new();
        for edge in edges {
            let shape = (
                edge.source.label.as_str(),
                edge.source.key_property.as_str(),
                edge.target.label.as_str(),
                edge.target.key_property.as_str(),
                edge.kind.as_str(),
            );
            groups.entry(shape).or_default().push(json!({
                "source": edge.source.key,
                "target": edge.target.key,
                "properties": edge.properties,
            }));
        }
        let statements = groups
            .into_iter()
            .map(|(shape, rows)| merge_edges_statement(shape, rows))
            .collect::<Result<Vec<_>>>()?;
        debug!(statements = statements.len(), edges = edges.len(), "merging edges");
        self.commit_counts(statements).await
    }

    async fn count_nodes(&self, label: &str) -> Result<usize> {
        let statement = Statement {
            statement: format!("MATCH (n:{}) RETURN count(n)", quoted("label", label)?),
            parameters: json!({}),
        };
        self.commit_counts(vec![statement]).await
    }

    async fn count_edges(&self, kind: &RelationshipKind) -> Result<usize> {
        let statement = Statement {
            statement: format!(
                "MATCH ()-[r:{}]->() RETURN count(r)",
                quoted("relationship", kind.as_str())?
            ),
            parameters: json!({}),
        };
        self.commit_counts(vec![statement]).await
    }

    fn name(&self) -> &str {
        "neo4j"
    }
}
