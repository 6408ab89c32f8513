//! Batched embedding
//!
//! Drives an [`Encoder`] over prepared texts in fixed-size batches, strictly
//! in order, so row `i` of the output always belongs to metadata row `i`.
//! Any batch failure aborts the run: skipping a batch would shift every later
//! row against its metadata.

use crate::encoder::Encoder;
use crate::extract::{FeatureExtractor, PreparedTexts};
use simgraph_core::{EmbedConfig, EmbeddingSet, Error, ExtractMode, Result, Table, Vector};
use std::sync::Arc;
use tracing::{debug, info};

pub struct BatchEmbedder {
    encoder: Arc<dyn Encoder>,
    config: EmbedConfig,
}

impl BatchEmbedder {
    pub fn new(encoder: Arc<dyn Encoder>, config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { encoder, config })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Extract texts from `table` and embed them.
    pub async fn embed(&self, table: &Table, extractor: &FeatureExtractor) -> Result<EmbeddingSet> {
        let prepared = extractor.prepare_texts(table)?;
        self.embed_prepared(prepared, extractor.mode()).await
    }

    /// Embed already prepared texts.
    pub async fn embed_prepared(
        &self,
        mut prepared: PreparedTexts,
        mode: ExtractMode,
    ) -> Result<EmbeddingSet> {
        Error::check_alignment(prepared.texts.len(), prepared.metadata.len())?;

        if let Some(sample) = self.config.sample.filter(|n| *n > 0) {
            if sample < prepared.len() {
                info!(sample, total = prepared.len(), "sampling first texts");
                prepared.truncate(sample);
            }
        }
        if prepared.is_empty() {
            return Err(Error::Input("no non-empty texts prepared for embedding".to_string()));
        }

        let dimension = self.encoder.dimension();
        let batch_size = self.config.batch_size;
        let total_batches = prepared.len().div_ceil(batch_size);
        let mut vectors = Vec::with_capacity(prepared.len());

        info!(
            texts = prepared.len(),
            batch_size,
            batches = total_batches,
            model = self.encoder.model(),
            "embedding"
        );

        for (batch, chunk) in prepared.texts.chunks(batch_size).enumerate() {
            let rows = self.encoder.encode(chunk).await.map_err(|e| match e {
                Error::Encoding { message, .. } => Error::Encoding { batch, message },
                other => Error::Encoding {
                    batch,
                    message: other.to_string(),
                },
            })?;

            if rows.len() != chunk.len() {
                return Err(Error::Encoding {
                    batch,
                    message: format!("encoder returned {} rows for {} texts", rows.len(), chunk.len()),
                });
            }

            let offset = vectors.len();
            for (i, row) in rows.into_iter().enumerate() {
                if row.len() != dimension {
                    return Err(Error::Encoding {
                        batch,
                        message: format!(
                            "encoder returned width {} for row {}, expected {dimension}",
                            row.len(),
                            offset + i
                        ),
                    });
                }
                let mut vector = Vector::new(row);
                if self.config.normalize {
                    vector.normalize();
                }
                vectors.push(vector);
            }
            debug!(batch = batch + 1, of = total_batches, rows = chunk.len(), "batch encoded");
        }

        let PreparedTexts { metadata, .. } = prepared;
        EmbeddingSet::new(
            vectors,
            metadata,
            dimension,
            self.encoder.model(),
            mode,
            self.config.normalize,
        )
    }
}
