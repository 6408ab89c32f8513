//! Encoder capability and backends.
//!
//! The encoder is an external black box: it receives one ordered batch of
//! strings and must return one row per input, in the same order. The
//! [`BatchEmbedder`](crate::BatchEmbedder) owns batching; encoders must not
//! reorder, drop or retry on its behalf.
//!
//! # Backends
//!
//! - [`HashingEncoder`]: deterministic feature hashing, no model required
//! - [`HttpEncoder`]: remote sentence-encoder service (`POST /embed`)

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use simgraph_core::config::DEFAULT_DIMENSION;
use simgraph_core::{Error, Result};
use std::time::Duration;

/// Trait for turning an ordered batch of texts into fixed-width rows.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode one batch; row `i` of the result belongs to `texts[i]`.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output dimensionality, fixed by configuration.
    fn dimension(&self) -> usize;

    /// Model identity recorded alongside persisted vectors.
    fn model(&self) -> &str;
}

/// Local encoder hashing word and character-trigram features into `dimension` buckets.
///
/// Output rows are raw counts (not unit length) so normalization stays the
/// embedder's decision. Empty text maps to the zero vector.
///
/// A feature's bucket and sign come from the first 8 bytes (little endian) of
/// `SHA-256(FEATURE_DOMAIN || feature)`, so stored vectors reproduce on any
/// platform and crate version.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

const FEATURE_DOMAIN: &[u8] = b"simgraph-feature-hashing/v1\0";

const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn feature_hash(feature: &str) -> u64 {
        let digest = Sha256::new()
            .chain_update(FEATURE_DOMAIN)
            .chain_update(feature.as_bytes())
            .finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(word)
    }

    fn add_feature(&self, row: &mut [f32], feature: &str, weight: f32) {
        let hash = Self::feature_hash(feature);
        let pos = (hash % self.dimension as u64) as usize;
        // sign bit spreads collisions around zero
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        row[pos] += sign * weight;
    }

    /// Encode a single text.
    pub fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut row = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut row, word, 1.0);

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut row, &trigram, TRIGRAM_WEIGHT);
            }
        }
        row
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Encoder for HashingEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "feature-hashing"
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    normalize: bool,
    truncate: bool,
}

/// Client for a text-embeddings-inference style service.
///
/// Sends `{"inputs": [...]}` and expects a JSON array of float rows.
#[derive(Debug, Clone)]
pub struct HttpEncoder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEncoder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            dimension,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Encoder for HttpEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            inputs: texts,
            normalize: false,
            truncate: true,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Encoding {
                batch: 0,
                message: format!("request to {} failed: {e}", self.endpoint),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Encoding {
                batch: 0,
                message: format!("{} returned {status}: {body}", self.endpoint),
            });
        }

        let rows: Vec<Vec<f32>> = response.json().await.map_err(|e| Error::Encoding {
            batch: 0,
            message: format!("invalid response body: {e}"),
        })?;
        Ok(rows)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgraph_core::Vector;

    #[test]
    fn test_hashing_deterministic() {
        let encoder = HashingEncoder::new(64);
        assert_eq!(encoder.encode_one("Network security basics"), encoder.encode_one("Network security basics"));
        assert_eq!(encoder.encode_one("x").len(), 64);
    }

    #[test]
    fn test_hashing_output_is_pinned() {
        // word "python" plus trigrams of " python ", hashed with SHA-256
        let encoder = HashingEncoder::new(8);
        let expected = vec![0.0, 0.0, 0.0, 0.5, 1.0, 0.0, 1.5, 0.0];
        assert_eq!(encoder.encode_one("python"), expected);
        assert_eq!(HashingEncoder::new(8).encode_one("Python"), expected);
    }

    #[test]
    fn test_hashing_empty_text_is_zero() {
        let encoder = HashingEncoder::new(16);
        assert!(encoder.encode_one("").iter().all(|v| *v == 0.0));
        assert!(encoder.encode_one("  !! ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hashing_similar_texts_score_higher() {
        let encoder = HashingEncoder::default();
        let a = Vector::new(encoder.encode_one("introduction to python programming"));
        let b = Vector::new(encoder.encode_one("python programming for beginners"));
        let c = Vector::new(encoder.encode_one("medieval french poetry"));
        assert!(a.cosine_similarity(&b) > a.cosine_similarity(&c));
    }

    #[tokio::test]
    async fn test_encode_batch_preserves_order() {
        let encoder = HashingEncoder::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let rows = encoder.encode(&texts).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], encoder.encode_one("beta"));
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn Encoder) {}
    }
}
