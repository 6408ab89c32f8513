//! In-process graph store with the same merge semantics as the Neo4j backend.

use crate::store::GraphStore;
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use simgraph_core::{GraphEdge, GraphNode, NodeRef, PropertyMap, RelationshipKind, Result};
use tracing::debug;

type EdgeKey = (NodeRef, NodeRef, RelationshipKind);

#[derive(Debug, Default)]
struct Graph {
    nodes: AHashMap<NodeRef, PropertyMap>,
    edges: AHashMap<EdgeKey, PropertyMap>,
}

#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: RwLock<Graph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties of one node, merged key included.
    pub fn node(&self, node: &NodeRef) -> Option<PropertyMap> {
        self.graph.read().nodes.get(node).cloned()
    }

    pub fn edge(&self, source: &NodeRef, target: &NodeRef, kind: &RelationshipKind) -> Option<PropertyMap> {
        self.graph
            .read()
            .edges
            .get(&(source.clone(), target.clone(), kind.clone()))
            .cloned()
    }

    /// All edges, sorted by (kind, source key, target key).
    pub fn edges(&self) -> Vec<GraphEdge> {
        let graph = self.graph.read();
        let mut edges: Vec<GraphEdge> = graph
            .edges
            .iter()
            .map(|((source, target, kind), properties)| GraphEdge {
                source: source.clone(),
                target: target.clone(),
                kind: kind.clone(),
                properties: properties.clone(),
            })
            .collect();
        edges.sort_by(|a, b| {
            (a.kind.as_str(), &a.source.key, &a.target.key).cmp(&(b.kind.as_str(), &b.source.key, &b.target.key))
        });
        edges
    }

    pub fn node_count(&self) -> usize {
        self.graph.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.read().edges.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    /// Node keys are unique by construction here.
    async fn ensure_schema(&self, _label: &str, _key_property: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_by_label(&self, label: &str) -> Result<usize> {
        let mut graph = self.graph.write();
        let before = graph.nodes.len();
        graph.nodes.retain(|node, _| node.label != label);
        graph
            .edges
            .retain(|(source, target, _), _| source.label != label && target.label != label);
        Ok(before - graph.nodes.len())
    }

    async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
        let mut graph = self.graph.write();
        for node in nodes {
            let entry = graph.nodes.entry(node.node.clone()).or_default();
            entry.insert(node.node.key_property.clone(), node.node.key.clone().into());
            for (k, v) in &node.properties {
                entry.insert(k.clone(), v.clone());
            }
        }
        Ok(nodes.len())
    }

    async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
        let mut graph = self.graph.write();
        let mut written = 0;
        for edge in edges {
            if !graph.nodes.contains_key(&edge.source) || !graph.nodes.contains_key(&edge.target) {
                debug!(source = %edge.source.key, target = %edge.target.key, kind = %edge.kind, "edge endpoint missing");
                continue;
            }
            let key = (edge.source.clone(), edge.target.clone(), edge.kind.clone());
            let entry = graph.edges.entry(key).or_default();
            for (k, v) in &edge.properties {
                entry.insert(k.clone(), v.clone());
            }
            written += 1;
        }
        Ok(written)
    }

    async fn count_nodes(&self, label: &str) -> Result<usize> {
        Ok(self.graph.read().nodes.keys().filter(|n| n.label == label).count())
    }

    async fn count_edges(&self, kind: &RelationshipKind) -> Result<usize> {
        Ok(self.graph.read().edges.keys().filter(|(_, _, k)| k == kind).count())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
