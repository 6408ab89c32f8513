//! # simgraph
//!
//! Build weighted similarity graphs from tabular records.
//!
//! simgraph turns rows of a CSV file (course descriptions, role profiles)
//! into either dense vectors or categorical attribute sets, selects the top-K
//! most similar neighbors of every entity above a threshold, and writes the
//! result into a property graph with merge semantics.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! simgraph embed --input courses.csv --output-prefix out/courses --normalize
//! simgraph build-graph --embeddings-prefix out/courses --dataset courses.csv \
//!     --key-column course_title --top-k 5 --threshold 0.5 --clear
//! simgraph build-attribute-graph --dataset profiles.csv \
//!     --group skills=key_skills --delimiter lines --threshold 2 --clear
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use simgraph::prelude::*;
//!
//! let vectors = vec![
//!     Vector::new(vec![1.0, 0.0]),
//!     Vector::new(vec![0.9, 0.4]),
//!     Vector::new(vec![0.0, 1.0]),
//! ];
//! let metadata: Vec<_> = (0..3).map(|i| MetadataRecord::row(i, i, "")).collect();
//!
//! let engine = SimilarityEngine::new(NeighborConfig::default()).unwrap();
//! let neighbors = engine.vector_neighbors(&vectors, &metadata).unwrap();
//! assert!(neighbors.iter().all(|c| c.source != c.target));
//! ```
//!
//! ## Crate Structure
//!
//! - `simgraph-core` - Data model, configuration, errors, CSV tables
//! - `simgraph-embed` - Feature extraction, encoders, batched embedding
//! - `simgraph-similarity` - Cosine and shared-label top-K neighbor selection
//! - `simgraph-storage` - Vector/metadata file pairs with manifest
//! - `simgraph-graph` - Graph mapping, batched merge writes, store backends

pub mod pipeline;

// Re-export core types
pub use simgraph_core::{
    AttributeSet, AttributeTable, EmbedConfig, EmbeddingSet, Error, ExtractConfig, ExtractMode,
    FeatureRepresentation, GraphEdge, GraphNode, LabelDelimiter, MetadataRecord, NeighborCandidate,
    NeighborConfig, PersistConfig, RelationshipKind, Result, SharedLabelScore, Table, Vector,
};

pub use simgraph_embed::{BatchEmbedder, Encoder, FeatureExtractor, HashingEncoder, HttpEncoder};
pub use simgraph_graph::{
    AttributeGraphOptions, EntityMapping, GraphPlan, GraphStore, GraphWriter, MemoryGraphStore, Neo4jHttpStore,
    StoreConfig, StoreKind, VectorGraphOptions, WriteReport,
};
pub use simgraph_similarity::SimilarityEngine;
pub use simgraph_storage::VectorStore;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AttributeSet, BatchEmbedder, EmbedConfig, EmbeddingSet, Encoder, Error, ExtractConfig, ExtractMode,
        FeatureExtractor, GraphPlan, GraphStore, GraphWriter, HashingEncoder, MemoryGraphStore, MetadataRecord,
        NeighborCandidate, NeighborConfig, PersistConfig, Result, SimilarityEngine, StoreConfig, Table, Vector,
        VectorStore,
    };
}
