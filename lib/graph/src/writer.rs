//! Batched, merge-based graph writes
//!
//! A write runs four phases in order: `clear` (optional), `schema`, `nodes`,
//! `edges`. The schema phase asks the store for a unique key per node label.
//! Each batch is one store call and is awaited before the next is issued. A
//! failing batch aborts the run with an [`Error::Store`] naming the phase,
//! the batch index and how many batches of that phase had committed.

use crate::mapping::GraphPlan;
use crate::store::GraphStore;
use serde::Serialize;
use simgraph_core::{Error, PersistConfig, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Counts reported by the store for one write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub nodes_deleted: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    pub node_batches: usize,
    pub edge_batches: usize,
}

pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
    config: PersistConfig,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>, config: PersistConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub async fn write(&self, plan: &GraphPlan) -> Result<WriteReport> {
        let start = Instant::now();
        let mut report = WriteReport::default();

        if self.config.clear {
            for (i, label) in plan.owned_labels.iter().enumerate() {
                let deleted = self
                    .store
                    .delete_by_label(label)
                    .await
                    .map_err(|e| Error::store("clear", i, i, e.to_string()))?;
                info!(label = %label, deleted, "cleared label");
                report.nodes_deleted += deleted;
            }
        }

        for (i, (label, key_property)) in plan.node_keys().iter().enumerate() {
            self.store
                .ensure_schema(label, key_property)
                .await
                .map_err(|e| Error::store("schema", i, i, e.to_string()))?;
        }

        for (i, batch) in plan.nodes.chunks(self.config.batch_size).enumerate() {
            let written = self
                .store
                .merge_nodes(batch)
                .await
                .map_err(|e| Error::store("nodes", i, i, e.to_string()))?;
            debug!(batch = i, size = batch.len(), written, "node batch committed");
            report.nodes_written += written;
            report.node_batches += 1;
        }

        for (i, batch) in plan.edges.chunks(self.config.batch_size).enumerate() {
            let written = self
                .store
                .merge_edges(batch)
                .await
                .map_err(|e| Error::store("edges", i, i, e.to_string()))?;
            debug!(batch = i, size = batch.len(), written, "edge batch committed");
            report.edges_written += written;
            report.edge_batches += 1;
        }

        if report.edges_written < plan.edges.len() {
            warn!(
                planned = plan.edges.len(),
                written = report.edges_written,
                "some edges were not written, endpoints missing in store"
            );
        }

        info!(
            store = self.store.name(),
            nodes = report.nodes_written,
            edges = report.edges_written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "graph written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraphStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use simgraph_core::{GraphEdge, GraphNode, NodeRef, RelationshipKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plan(scores: &[(usize, usize, f64)], nodes: usize) -> GraphPlan {
        let key = |i: usize| format!("row-{i}");
        GraphPlan {
            owned_labels: vec!["Course".to_string()],
            nodes: (0..nodes).map(|i| GraphNode::new("Course", "title", key(i))).collect(),
            edges: scores
                .iter()
                .map(|&(s, t, score)| {
                    GraphEdge::new(
                        NodeRef::new("Course", "title", key(s)),
                        NodeRef::new("Course", "title", key(t)),
                        RelationshipKind::SimilarTo,
                    )
                    .with_property("score", score)
                })
                .collect(),
        }
    }

    fn writer(store: Arc<dyn GraphStore>, clear: bool, batch_size: usize) -> GraphWriter {
        GraphWriter::new(
            store,
            PersistConfig {
                clear,
                batch_size,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rebuild_with_clear_is_idempotent() {
        let store = Arc::new(MemoryGraphStore::new());
        let plan = plan(&[(0, 1, 0.9), (1, 0, 0.9), (2, 3, 0.7)], 5);
        let writer = writer(store.clone(), true, 2);

        let first = writer.write(&plan).await.unwrap();
        let second = writer.write(&plan).await.unwrap();

        assert_eq!(first.nodes_written, 5);
        assert_eq!(first.edges_written, 3);
        assert_eq!(first.node_batches, 3);
        assert_eq!(first.edge_batches, 2);
        assert_eq!(second.nodes_deleted, 5);
        assert_eq!((store.node_count(), store.edge_count()), (5, 3));
    }

    #[tokio::test]
    async fn test_rerun_updates_score_without_duplicates() {
        let store = Arc::new(MemoryGraphStore::new());
        let writer = writer(store.clone(), false, 100);
        writer.write(&plan(&[(0, 1, 0.9)], 2)).await.unwrap();
        writer.write(&plan(&[(0, 1, 0.6)], 2)).await.unwrap();

        assert_eq!(store.edge_count(), 1);
        let props = store
            .edge(
                &NodeRef::new("Course", "title", "row-0"),
                &NodeRef::new("Course", "title", "row-1"),
                &RelationshipKind::SimilarTo,
            )
            .unwrap();
        assert_eq!(props["score"], 0.6);
    }

    /// Accepts `ok_batches` edge batches, then fails.
    struct FailingStore {
        inner: MemoryGraphStore,
        ok_batches: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for FailingStore {
        async fn ensure_schema(&self, label: &str, key_property: &str) -> Result<()> {
            self.inner.ensure_schema(label, key_property).await
        }

        async fn delete_by_label(&self, label: &str) -> Result<usize> {
            self.inner.delete_by_label(label).await
        }

        async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
            self.inner.merge_nodes(nodes).await
        }

        async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_batches {
                return Err(Error::Persistence("connection reset".to_string()));
            }
            self.inner.merge_edges(edges).await
        }

        async fn count_nodes(&self, label: &str) -> Result<usize> {
            self.inner.count_nodes(label).await
        }

        async fn count_edges(&self, kind: &RelationshipKind) -> Result<usize> {
            self.inner.count_edges(kind).await
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failing_batch_reports_index() {
        let store = Arc::new(FailingStore {
            inner: MemoryGraphStore::new(),
            ok_batches: 1,
            calls: AtomicUsize::new(0),
        });
        let writer = writer(store.clone(), false, 1);
        let err = writer
            .write(&plan(&[(0, 1, 0.9), (1, 2, 0.8), (2, 0, 0.7)], 3))
            .await
            .unwrap_err();

        match err {
            Error::Store {
                phase,
                batch,
                committed,
                message,
            } => {
                assert_eq!(phase, "edges");
                assert_eq!(batch, 1);
                assert_eq!(committed, 1);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.inner.edge_count(), 1);
    }

    /// Logs every call made by the writer.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryGraphStore,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn ensure_schema(&self, label: &str, key_property: &str) -> Result<()> {
            self.calls.lock().push(format!("schema {label}.{key_property}"));
            Ok(())
        }

        async fn delete_by_label(&self, label: &str) -> Result<usize> {
            self.calls.lock().push(format!("clear {label}"));
            self.inner.delete_by_label(label).await
        }

        async fn merge_nodes(&self, nodes: &[GraphNode]) -> Result<usize> {
            self.calls.lock().push("nodes".to_string());
            self.inner.merge_nodes(nodes).await
        }

        async fn merge_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
            self.calls.lock().push("edges".to_string());
            self.inner.merge_edges(edges).await
        }

        async fn count_nodes(&self, label: &str) -> Result<usize> {
            self.inner.count_nodes(label).await
        }

        async fn count_edges(&self, kind: &RelationshipKind) -> Result<usize> {
            self.inner.count_edges(kind).await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_unique_keys_ensured_before_nodes() {
        let store = Arc::new(RecordingStore::default());
        let mut plan = plan(&[(0, 1, 0.9)], 2);
        plan.owned_labels.push("Skill".to_string());
        plan.nodes.push(GraphNode::new("Skill", "name", "python"));
        plan.nodes.push(GraphNode::new("Course", "title", "row-2"));

        writer(store.clone(), true, 10).write(&plan).await.unwrap();

        let calls = store.calls.lock().clone();
        assert_eq!(
            calls,
            vec!["clear Course", "clear Skill", "schema Course.title", "schema Skill.name", "nodes", "edges"]
        );
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryGraphStore::new());
        let config = PersistConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(GraphWriter::new(store, config).is_err());
    }
}
