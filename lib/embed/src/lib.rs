//! # simgraph Embed
//!
//! Feature extraction and batched embedding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌───────────────┐
//! │    Table    │────>│ FeatureExtractor │────>│ BatchEmbedder │────> EmbeddingSet
//! │  (records)  │     │  row/cell texts  │     │ batches → Enc │      (vectors + metadata)
//! └─────────────┘     └──────────────────┘     └───────────────┘
//!                              │
//!                              └── categorical ──> AttributeTable
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use simgraph_core::{EmbedConfig, ExtractConfig, Table};
//! use simgraph_embed::{BatchEmbedder, FeatureExtractor, HashingEncoder};
//! use std::sync::Arc;
//!
//! # async fn run() -> simgraph_core::Result<()> {
//! let table = Table::from_csv_path("courses.csv")?;
//! let extractor = FeatureExtractor::plan(&table, ExtractConfig::default())?;
//! let embedder = BatchEmbedder::new(Arc::new(HashingEncoder::default()), EmbedConfig::default())?;
//! let set = embedder.embed(&table, &extractor).await?;
//! assert_eq!(set.len(), set.metadata().len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod encoder;
pub mod extract;

pub use batch::BatchEmbedder;
pub use encoder::{Encoder, HashingEncoder, HttpEncoder};
pub use extract::{parse_labels, truncate_chars, FeatureExtractor, PreparedTexts};
