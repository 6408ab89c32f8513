//! Homogeneous, index-aligned collections of representations.
//!
//! Construction checks the invariants every later stage relies on:
//! one metadata row per representation, and one dimensionality per run.

use crate::{AttributeSet, Error, ExtractMode, MetadataRecord, Result, Vector};

/// Dense vectors from one embedding run plus their metadata
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSet {
    vectors: Vec<Vector>,
    metadata: Vec<MetadataRecord>,
    dimension: usize,
    pub normalized: bool,
    pub model: String,
    pub mode: ExtractMode,
}

impl EmbeddingSet {
    pub fn new(
        vectors: Vec<Vector>,
        metadata: Vec<MetadataRecord>,
        dimension: usize,
        model: impl Into<String>,
        mode: ExtractMode,
        normalized: bool,
    ) -> Result<Self> {
        Error::check_alignment(vectors.len(), metadata.len())?;
        for (row, v) in vectors.iter().enumerate() {
            if v.dim() != dimension {
                return Err(Error::InvalidDimension {
                    expected: dimension,
                    actual: v.dim(),
                    row,
                });
            }
        }
        Ok(Self {
            vectors,
            metadata,
            dimension,
            normalized,
            model: model.into(),
            mode,
        })
    }

    #[inline]
    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    #[inline]
    pub fn metadata(&self) -> &[MetadataRecord] {
        &self.metadata
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Attribute sets, one per source record, plus their metadata
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    sets: Vec<AttributeSet>,
    metadata: Vec<MetadataRecord>,
    groups: Vec<String>,
}

impl AttributeTable {
    pub fn new(sets: Vec<AttributeSet>, metadata: Vec<MetadataRecord>, groups: Vec<String>) -> Result<Self> {
        Error::check_alignment(sets.len(), metadata.len())?;
        Ok(Self {
            sets,
            metadata,
            groups,
        })
    }

    #[inline]
    pub fn sets(&self) -> &[AttributeSet] {
        &self.sets
    }

    #[inline]
    pub fn metadata(&self) -> &[MetadataRecord] {
        &self.metadata
    }

    /// Group names in configuration order
    #[inline]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_set_alignment() {
        let err = EmbeddingSet::new(
            vec![Vector::zeros(2)],
            vec![],
            2,
            "m",
            ExtractMode::Row,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlignmentViolation { representations: 1, metadata: 0 }));
    }

    #[test]
    fn test_embedding_set_dimension() {
        let meta = vec![MetadataRecord::row(0, 0, "a"), MetadataRecord::row(1, 1, "b")];
        let err = EmbeddingSet::new(
            vec![Vector::zeros(2), Vector::zeros(3)],
            meta,
            2,
            "m",
            ExtractMode::Row,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { expected: 2, actual: 3, row: 1 }));
    }
}
