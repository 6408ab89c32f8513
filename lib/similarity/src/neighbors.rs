//! Thresholded top-K neighbor selection
//!
//! Full pairwise scan: every entity is scored against every other entity,
//! scores below the threshold are dropped, and the best `top_k` survive.
//! Rows are scored in parallel, but results are collected in input order,
//! so the output is identical from run to run.

use crate::metric::{CosineScorer, PairScore, SharedLabelScorer};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use simgraph_core::{
    AttributeTable, EmbeddingSet, Error, FeatureRepresentation, MetadataRecord, NeighborCandidate,
    NeighborConfig, Result, Vector,
};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Heap entry ordered worst-first, so the heap root is the next one to evict.
///
/// Better means higher score, then lower target position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ranked {
    score: OrderedFloat<f32>,
    target: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.target.cmp(&other.target))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best `top_k` neighbors of `source`, sorted best first.
pub fn neighbors_of<S: PairScore + ?Sized>(
    scorer: &S,
    source: usize,
    top_k: usize,
    threshold: f32,
) -> Vec<NeighborCandidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(top_k.min(scorer.len()) + 1);

    for target in 0..scorer.len() {
        if target == source {
            continue;
        }
        let score = match scorer.score(source, target) {
            Some(s) if s >= threshold => s,
            _ => continue,
        };
        heap.push(Ranked {
            score: OrderedFloat(score),
            target,
        });
        if heap.len() > top_k {
            heap.pop();
        }
    }

    // ascending by Ord == best first
    heap.into_sorted_vec()
        .into_iter()
        .map(|r| NeighborCandidate::new(source, r.target, r.score.0))
        .collect()
}

/// Neighbors of every entity, grouped by source in input order.
pub fn select_top_k<S: PairScore + ?Sized>(scorer: &S, top_k: usize, threshold: f32) -> Vec<NeighborCandidate> {
    let groups: Vec<Vec<NeighborCandidate>> = (0..scorer.len())
        .into_par_iter()
        .map(|source| neighbors_of(scorer, source, top_k, threshold))
        .collect();
    groups.into_iter().flatten().collect()
}

/// Keep one candidate per unordered pair, oriented low position to high.
///
/// The first occurrence of a pair wins. Input order is otherwise preserved.
pub fn collapse_symmetric(candidates: &[NeighborCandidate]) -> Vec<NeighborCandidate> {
    let mut seen = ahash::AHashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .filter_map(|c| {
            let (lo, hi) = if c.source <= c.target {
                (c.source, c.target)
            } else {
                (c.target, c.source)
            };
            seen.insert((lo, hi)).then(|| NeighborCandidate::new(lo, hi, c.score))
        })
        .collect()
}

/// Builds neighbor candidates for one homogeneous set of representations
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    config: NeighborConfig,
}

impl SimilarityEngine {
    pub fn new(config: NeighborConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Cosine neighbors of dense vectors aligned with `metadata`.
    pub fn vector_neighbors(&self, vectors: &[Vector], metadata: &[MetadataRecord]) -> Result<Vec<NeighborCandidate>> {
        Error::check_alignment(vectors.len(), metadata.len())?;
        check_dimensions(vectors.iter())?;
        Ok(self.run(&CosineScorer::new(vectors), "cosine"))
    }

    pub fn embedding_neighbors(&self, set: &EmbeddingSet) -> Result<Vec<NeighborCandidate>> {
        self.vector_neighbors(set.vectors(), set.metadata())
    }

    /// Shared-label neighbors within `group`; zero overlap never yields a candidate.
    pub fn attribute_neighbors(&self, table: &AttributeTable, group: &str) -> Result<Vec<NeighborCandidate>> {
        Error::check_alignment(table.len(), table.metadata().len())?;
        if !table.groups().iter().any(|g| g == group) {
            return Err(Error::InvalidConfig(format!("unknown attribute group: {group}")));
        }
        let scorer = SharedLabelScorer::new(table.sets().iter().collect(), group, self.config.score);
        Ok(self.run(&scorer, "shared-labels"))
    }

    /// Neighbors of generic representations, dispatching on their kind.
    ///
    /// All representations must be of one kind. Attribute sets need `group`.
    pub fn build_neighbors(
        &self,
        representations: &[FeatureRepresentation],
        metadata: &[MetadataRecord],
        group: Option<&str>,
    ) -> Result<Vec<NeighborCandidate>> {
        Error::check_alignment(representations.len(), metadata.len())?;
        let Some(first) = representations.first() else {
            return Ok(Vec::new());
        };
        if representations.iter().any(|r| r.kind() != first.kind()) {
            return Err(Error::Input("representations mix dense vectors and attribute sets".to_string()));
        }

        match first {
            FeatureRepresentation::Dense(_) => {
                let vectors: Vec<&Vector> = representations
                    .iter()
                    .filter_map(|r| match r {
                        FeatureRepresentation::Dense(v) => Some(v),
                        FeatureRepresentation::Attributes(_) => None,
                    })
                    .collect();
                check_dimensions(vectors.iter().copied())?;
                Ok(self.run(&CosineScorer::from_refs(&vectors), "cosine"))
            }
            FeatureRepresentation::Attributes(_) => {
                let group = group.ok_or_else(|| {
                    Error::InvalidConfig("attribute-set neighbors need an attribute group".to_string())
                })?;
                let sets = representations
                    .iter()
                    .filter_map(|r| match r {
                        FeatureRepresentation::Attributes(s) => Some(s),
                        FeatureRepresentation::Dense(_) => None,
                    })
                    .collect();
                let scorer = SharedLabelScorer::new(sets, group, self.config.score);
                Ok(self.run(&scorer, "shared-labels"))
            }
        }
    }

    fn run<S: PairScore>(&self, scorer: &S, metric: &str) -> Vec<NeighborCandidate> {
        debug!(
            entities = scorer.len(),
            top_k = self.config.top_k,
            threshold = self.config.threshold,
            metric,
            "scanning pairs"
        );
        let candidates = select_top_k(scorer, self.config.top_k, self.config.threshold);
        info!(entities = scorer.len(), candidates = candidates.len(), metric, "neighbors selected");
        candidates
    }
}

fn check_dimensions<'a>(mut vectors: impl Iterator<Item = &'a Vector>) -> Result<()> {
    let Some(first) = vectors.next() else {
        return Ok(());
    };
    let expected = first.dim();
    for (i, v) in vectors.enumerate() {
        if v.dim() != expected {
            return Err(Error::InvalidDimension {
                expected,
                actual: v.dim(),
                row: i + 1,
            });
        }
    }
    Ok(())
}
