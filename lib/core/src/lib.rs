//! # simgraph Core
//!
//! Core library for the simgraph similarity-graph builder.
//!
//! This crate provides the data model shared by every pipeline stage:
//!
//! - [`Vector`] - Dense embedding with cosine similarity and normalization
//! - [`Table`] / [`Record`] - Headered CSV input with stable row indices
//! - [`ColumnClassification`] - Text / categorical / ignored column tagging
//! - [`FeatureRepresentation`] / [`MetadataRecord`] - Index-aligned outputs of extraction
//! - [`NeighborCandidate`] - Scored directed pair selected by the similarity engine
//! - [`GraphNode`] / [`GraphEdge`] - Property-graph records written to a store
//!
//! ## Example
//!
//! ```rust
//! use simgraph_core::{AttributeSet, Vector};
//!
//! let a = Vector::new(vec![1.0, 0.0]);
//! let b = Vector::new(vec![1.0, 1.0]);
//! assert!(a.cosine_similarity(&b) > 0.7);
//!
//! let p1 = AttributeSet::new().with_group("skills", ["python", "sql"]);
//! let p2 = AttributeSet::new().with_group("skills", ["python", "java"]);
//! assert_eq!(p1.shared_count(&p2, "skills"), 1);
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod kernels;
pub mod representation;
pub mod table;
pub mod vector;

pub use config::{
    AttributeGroup, EmbedConfig, ExtractConfig, ExtractMode, LabelDelimiter, NeighborConfig,
    PersistConfig, SharedLabelScore,
};
pub use dataset::{AttributeTable, EmbeddingSet};
pub use error::{Error, Result};
pub use graph::{GraphEdge, GraphNode, NodeRef, PropertyMap, RelationshipKind};
pub use representation::{
    AttributeSet, FeatureRepresentation, MetadataRecord, NeighborCandidate, RepresentationKind,
    SourceKind,
};
pub use table::{ColumnClassification, ColumnKind, Record, Table};
pub use vector::Vector;
