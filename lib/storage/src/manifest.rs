use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use simgraph_core::ExtractMode;

pub const FORMAT_VERSION: u32 = 1;

/// Written last; its presence marks the vector/metadata pair as complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub rows: usize,
    pub dimension: usize,
    pub normalized: bool,
    pub model: String,
    pub mode: ExtractMode,
    pub created_at: DateTime<Utc>,
    pub embeddings_sha256: String,
    pub metadata_sha256: String,
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
