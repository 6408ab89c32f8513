//! Paired vector/metadata files under one output prefix
//!
//! For prefix `P`:
//!
//! - `P_embeddings.npy` - `(N, D)` `<f4` matrix
//! - `P_metadata.csv` - N metadata rows, row `i` describing vector `i`
//! - `P_manifest.json` - shape, model, checksums of both files
//!
//! Each file is replaced atomically (temp file + rename). The manifest is
//! written after both data files, so an interrupted save leaves either the
//! previous manifest (whose checksums no longer match) or none at all.

use crate::manifest::{sha256_hex, Manifest, FORMAT_VERSION};
use crate::{metadata, npy};
use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::Utc;
use simgraph_core::{EmbeddingSet, Error, ExtractMode, Result, SourceKind};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Shape and provenance of a stored pair, read without loading vectors
#[derive(Debug, Clone, PartialEq)]
pub struct StoreInfo {
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
    pub rows: usize,
    pub dimension: usize,
    pub manifest: Option<Manifest>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    prefix: PathBuf,
}

impl VectorStore {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        Self {
            prefix: prefix.as_ref().to_path_buf(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.prefix.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.with_suffix("_embeddings.npy")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.with_suffix("_metadata.csv")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.with_suffix("_manifest.json")
    }

    /// Persist `set`; returns the manifest that was written.
    pub fn save(&self, set: &EmbeddingSet) -> Result<Manifest> {
        Error::check_alignment(set.len(), set.metadata().len())?;
        if let Some(parent) = self.prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let matrix = npy::encode(set.vectors(), set.dimension())?;
        let table = metadata::encode(set.metadata())?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            rows: set.len(),
            dimension: set.dimension(),
            normalized: set.normalized,
            model: set.model.clone(),
            mode: set.mode,
            created_at: Utc::now(),
            embeddings_sha256: sha256_hex(&matrix),
            metadata_sha256: sha256_hex(&table),
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;

        write_atomic(&self.embeddings_path(), &matrix)?;
        debug!(path = %self.embeddings_path().display(), bytes = matrix.len(), "embeddings written");
        write_atomic(&self.metadata_path(), &table)?;
        debug!(path = %self.metadata_path().display(), rows = set.len(), "metadata written");
        write_atomic(&self.manifest_path(), &manifest_json)?;

        info!(
            prefix = %self.prefix.display(),
            rows = manifest.rows,
            dimension = manifest.dimension,
            "vector store saved"
        );
        Ok(manifest)
    }

    /// Load and verify a stored pair.
    ///
    /// Without a manifest the pair is accepted only when `require_manifest`
    /// is false, and is then checked for row agreement alone.
    pub fn load(&self, require_manifest: bool) -> Result<EmbeddingSet> {
        let manifest = self.read_manifest()?;
        if manifest.is_none() {
            if require_manifest {
                return Err(Error::Persistence(format!(
                    "{} is missing; the vector store at {} is incomplete",
                    self.manifest_path().display(),
                    self.prefix.display()
                )));
            }
            warn!(prefix = %self.prefix.display(), "loading vector store without manifest");
        }

        let matrix = read_file(&self.embeddings_path())?;
        let table = read_file(&self.metadata_path())?;

        if let Some(m) = &manifest {
            if m.format_version != FORMAT_VERSION {
                return Err(Error::Persistence(format!("unsupported store format version {}", m.format_version)));
            }
            verify_checksum(&self.embeddings_path(), &matrix, &m.embeddings_sha256)?;
            verify_checksum(&self.metadata_path(), &table, &m.metadata_sha256)?;
        }

        let (header, vectors) = npy::decode(&matrix)?;
        let records = metadata::decode(&table)?;
        if header.rows != records.len() {
            return Err(Error::Persistence(format!(
                "{} holds {} rows but {} has {}",
                self.embeddings_path().display(),
                header.rows,
                self.metadata_path().display(),
                records.len()
            )));
        }

        let set = match manifest {
            Some(m) => {
                if m.rows != header.rows || m.dimension != header.cols {
                    return Err(Error::Persistence(format!(
                        "manifest shape ({}, {}) disagrees with matrix shape ({}, {})",
                        m.rows, m.dimension, header.rows, header.cols
                    )));
                }
                EmbeddingSet::new(vectors, records, header.cols, m.model, m.mode, m.normalized)?
            }
            None => {
                let mode = if records.iter().any(|r| r.source == SourceKind::Cell) {
                    ExtractMode::Cell
                } else {
                    ExtractMode::Row
                };
                EmbeddingSet::new(vectors, records, header.cols, "unknown", mode, false)?
            }
        };
        info!(prefix = %self.prefix.display(), rows = set.len(), dimension = set.dimension(), "vector store loaded");
        Ok(set)
    }

    /// Report N and D from the matrix header and manifest only.
    pub fn inspect(&self) -> Result<StoreInfo> {
        let path = self.embeddings_path();
        let file = File::open(&path).map_err(|e| Error::input_file(&path, e.to_string()))?;
        let header = npy::read_header(BufReader::new(file))?;
        Ok(StoreInfo {
            embeddings_path: path,
            metadata_path: self.metadata_path(),
            rows: header.rows,
            dimension: header.cols,
            manifest: self.read_manifest()?,
        })
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let manifest = serde_json::from_slice(&data)
            .map_err(|e| Error::Persistence(format!("invalid manifest {}: {e}", path.display())))?;
        Ok(Some(manifest))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(data))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => Error::Io(e),
        })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::input_file(path, e.to_string()))
}

fn verify_checksum(path: &Path, data: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(data);
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Persistence(format!(
            "checksum mismatch for {}: expected {expected}, got {actual}",
            path.display()
        )))
    }
}
