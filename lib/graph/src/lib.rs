//! # simgraph Graph
//!
//! Maps entities and neighbor candidates onto a property graph and writes
//! them with merge (upsert) semantics.
//!
//! ## Features
//!
//! - **Natural keys**: one node per distinct key, reruns never duplicate nodes or edges
//! - **Batched writes**: fixed-size batches, fail-fast with the batch index reported
//! - **Optional clear**: detach-delete the labels a run owns before rebuilding
//! - **Backends**: in-memory store and Neo4j over the transactional HTTP endpoint
//! - **Integration**: link a profile graph to a course graph through shared labels
//!
//! ## Example
//!
//! ```rust,no_run
//! use simgraph_core::PersistConfig;
//! use simgraph_graph::{GraphPlan, GraphWriter, StoreConfig};
//!
//! # async fn run(plan: GraphPlan) -> simgraph_core::Result<()> {
//! let store = StoreConfig::default().connect()?;
//! let writer = GraphWriter::new(store, PersistConfig { clear: true, ..Default::default() })?;
//! let report = writer.write(&plan).await?;
//! println!("{} nodes, {} edges", report.nodes_written, report.edges_written);
//! # Ok(())
//! # }
//! ```

pub mod integration;
pub mod mapping;
pub mod memory;
pub mod neo4j;
pub mod store;
pub mod writer;

pub use integration::{GroupLink, IntegrationOptions};
pub use mapping::{
    entity_key, AttributeGraphOptions, EntityMapping, GraphPlan, GroupNeighbors, GroupSchema, VectorGraphOptions,
};
pub use memory::MemoryGraphStore;
pub use neo4j::Neo4jHttpStore;
pub use store::{GraphStore, StoreConfig, StoreKind};
pub use writer::{GraphWriter, WriteReport};
