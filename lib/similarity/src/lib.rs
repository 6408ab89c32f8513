//! # simgraph Similarity
//!
//! Neighbor selection over dense vectors or attribute sets.
//!
//! ## Features
//!
//! - **Cosine metric**: rows are normalized before scoring, so stored magnitudes never bias results
//! - **Shared-label metric**: count or Jaccard ratio of labels shared within one attribute group
//! - **Top-K with threshold**: bounded heap per entity, ties broken by target position
//! - **Deterministic output**: grouped by source in input order, best first
//!
//! ## Example
//!
//! ```rust
//! use simgraph_core::{MetadataRecord, NeighborConfig, Vector};
//! use simgraph_similarity::SimilarityEngine;
//!
//! let vectors = vec![
//!     Vector::new(vec![1.0, 0.0]),
//!     Vector::new(vec![0.9, 0.1]),
//!     Vector::new(vec![0.0, 1.0]),
//! ];
//! let metadata: Vec<_> = (0..3).map(|i| MetadataRecord::row(i, i, "")).collect();
//!
//! let engine = SimilarityEngine::new(NeighborConfig { top_k: 1, threshold: 0.5, ..Default::default() }).unwrap();
//! let neighbors = engine.vector_neighbors(&vectors, &metadata).unwrap();
//! assert_eq!((neighbors[0].source, neighbors[0].target), (0, 1));
//! ```
//!
//! ## Scaling
//!
//! The scan is O(N²). A nearest-neighbor index can replace [`select_top_k`]
//! behind [`PairScore`] without changing the output contract.

pub mod metric;
pub mod neighbors;

pub use metric::{CosineScorer, PairScore, SharedLabelScorer};
pub use neighbors::{collapse_symmetric, neighbors_of, select_top_k, SimilarityEngine};
