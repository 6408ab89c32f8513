//! Pairwise metrics
//!
//! A [`PairScore`] scores one ordered pair of entity positions. Returning
//! `None` means "never a candidate", independent of the threshold.

use simgraph_core::{AttributeSet, SharedLabelScore, Vector};

pub trait PairScore: Sync {
    /// Number of entities
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(&self, source: usize, target: usize) -> Option<f32>;
}

/// Cosine similarity over unit-length copies of the input rows.
///
/// Rows are normalized here even if the caller already did, so stored
/// magnitudes never bias scores. Zero rows stay zero and score 0 against
/// everything.
#[derive(Debug, Clone)]
pub struct CosineScorer {
    rows: Vec<Vector>,
}

impl CosineScorer {
    pub fn new(vectors: &[Vector]) -> Self {
        Self {
            rows: vectors.iter().map(Vector::normalized).collect(),
        }
    }

    pub fn from_refs(vectors: &[&Vector]) -> Self {
        Self {
            rows: vectors.iter().map(|v| v.normalized()).collect(),
        }
    }
}

impl PairScore for CosineScorer {
    #[inline]
    fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    fn score(&self, source: usize, target: usize) -> Option<f32> {
        Some(self.rows[source].dot(&self.rows[target]))
    }
}

/// Shared labels within one attribute group, as a count or a Jaccard ratio
#[derive(Debug, Clone)]
pub struct SharedLabelScorer<'a> {
    sets: Vec<&'a AttributeSet>,
    group: String,
    score: SharedLabelScore,
}

impl<'a> SharedLabelScorer<'a> {
    pub fn new(sets: Vec<&'a AttributeSet>, group: impl Into<String>, score: SharedLabelScore) -> Self {
        Self {
            sets,
            group: group.into(),
            score,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl PairScore for SharedLabelScorer<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.sets.len()
    }

    fn score(&self, source: usize, target: usize) -> Option<f32> {
        let (a, b) = (self.sets[source], self.sets[target]);
        let shared = a.shared_count(b, &self.group);
        if shared == 0 {
            return None;
        }
        Some(match self.score {
            SharedLabelScore::Count => shared as f32,
            SharedLabelScore::Jaccard => a.jaccard(b, &self.group),
        })
    }
}
