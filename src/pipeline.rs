//! Pipeline stages run by the `simgraph` binary
//!
//! Each stage takes its configuration by value, runs to completion and
//! returns a summary of what it produced. Embedding and graph building are
//! separate stages joined only by the files of a [`VectorStore`].

use serde::Serialize;
use simgraph_core::{
    EmbedConfig, ExtractConfig, ExtractMode, NeighborConfig, PersistConfig, RelationshipKind, Result, Table,
};
use simgraph_embed::{BatchEmbedder, Encoder, FeatureExtractor};
use simgraph_graph::{
    AttributeGraphOptions, GraphPlan, GraphStore, GraphWriter, GroupNeighbors, IntegrationOptions,
    VectorGraphOptions, WriteReport,
};
use simgraph_similarity::SimilarityEngine;
use simgraph_storage::{Manifest, VectorStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EmbedJob {
    pub input: PathBuf,
    pub output_prefix: PathBuf,
    pub extract: ExtractConfig,
    pub embed: EmbedConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedSummary {
    pub records: usize,
    pub vectors: usize,
    pub dimension: usize,
    pub model: String,
    pub normalized: bool,
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl fmt::Display for EmbedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records read:     {}", self.records)?;
        writeln!(f, "vectors written:  {} x {}", self.vectors, self.dimension)?;
        writeln!(f, "model:            {}", self.model)?;
        writeln!(f, "embeddings:       {}", self.embeddings_path.display())?;
        write!(f, "metadata:         {}", self.metadata_path.display())
    }
}

/// Extract, encode and persist one dataset.
///
/// Nothing is written unless every batch encodes.
pub async fn run_embed(job: EmbedJob, encoder: Arc<dyn Encoder>) -> Result<EmbedSummary> {
    let table = Table::from_csv_path(&job.input)?;
    let extractor = FeatureExtractor::plan(&table, job.extract)?;
    let embedder = BatchEmbedder::new(encoder, job.embed)?;
    let set = embedder.embed(&table, &extractor).await?;

    let store = VectorStore::new(&job.output_prefix);
    let manifest = store.save(&set)?;
    Ok(EmbedSummary {
        records: table.len(),
        vectors: manifest.rows,
        dimension: manifest.dimension,
        model: manifest.model,
        normalized: manifest.normalized,
        embeddings_path: store.embeddings_path(),
        metadata_path: store.metadata_path(),
    })
}

#[derive(Debug, Clone)]
pub struct VectorGraphJob {
    pub embeddings_prefix: PathBuf,
    /// Source dataset, read for natural keys and node properties
    pub dataset: Option<PathBuf>,
    pub require_manifest: bool,
    pub neighbors: NeighborConfig,
    pub options: VectorGraphOptions,
    pub persist: PersistConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub entities: usize,
    pub candidates: usize,
    pub planned_nodes: usize,
    pub planned_edges: usize,
    pub store: String,
    #[serde(flatten)]
    pub written: WriteReport,
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "entities:         {}", self.entities)?;
        writeln!(f, "candidates:       {}", self.candidates)?;
        if self.written.nodes_deleted > 0 {
            writeln!(f, "nodes deleted:    {}", self.written.nodes_deleted)?;
        }
        writeln!(f, "nodes written:    {} of {}", self.written.nodes_written, self.planned_nodes)?;
        writeln!(f, "edges written:    {} of {}", self.written.edges_written, self.planned_edges)?;
        write!(f, "store:            {}", self.store)
    }
}

/// Load stored vectors, select neighbors and write the similarity graph.
pub async fn run_vector_graph(job: VectorGraphJob, store: Arc<dyn GraphStore>) -> Result<GraphSummary> {
    let set = VectorStore::new(&job.embeddings_prefix).load(job.require_manifest)?;
    if !set.normalized {
        info!("stored vectors are not normalized, cosine scoring normalizes them");
    }
    let table = job.dataset.as_ref().map(Table::from_csv_path).transpose()?;

    let engine = SimilarityEngine::new(job.neighbors)?;
    let candidates = engine.embedding_neighbors(&set)?;
    let plan = GraphPlan::vector_graph(
        &set,
        table.as_ref(),
        &candidates,
        &job.options,
        job.persist.both_directions,
    )?;

    let writer = GraphWriter::new(store, job.persist)?;
    let written = writer.write(&plan).await?;
    Ok(GraphSummary {
        entities: set.len(),
        candidates: candidates.len(),
        planned_nodes: plan.nodes.len(),
        planned_edges: plan.edges.len(),
        store: writer.store().name().to_string(),
        written,
    })
}

#[derive(Debug, Clone)]
pub struct AttributeGraphJob {
    pub dataset: PathBuf,
    pub extract: ExtractConfig,
    /// `None` keeps every neighbor above the threshold
    pub top_k: Option<usize>,
    pub threshold: f32,
    pub options: AttributeGraphOptions,
    pub persist: PersistConfig,
}

/// Parse attribute sets and write the shared-label graph, one edge kind per group.
pub async fn run_attribute_graph(job: AttributeGraphJob, store: Arc<dyn GraphStore>) -> Result<GraphSummary> {
    let table = Table::from_csv_path(&job.dataset)?;
    let extract = ExtractConfig {
        mode: ExtractMode::Categorical,
        ..job.extract
    };
    let extractor = FeatureExtractor::plan(&table, extract)?;
    let attributes = extractor.extract_attributes(&table)?;

    let engine = SimilarityEngine::new(NeighborConfig {
        top_k: job.top_k.unwrap_or(attributes.len()).max(1),
        threshold: job.threshold,
        score: job.options.score,
    })?;
    let neighbors = attributes
        .groups()
        .iter()
        .map(|group| {
            Ok(GroupNeighbors {
                group: group.clone(),
                candidates: engine.attribute_neighbors(&attributes, group)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let candidates = neighbors.iter().map(|g| g.candidates.len()).sum();

    let plan = GraphPlan::attribute_graph(
        &attributes,
        Some(&table),
        &neighbors,
        &job.options,
        job.persist.both_directions,
    )?;

    let writer = GraphWriter::new(store, job.persist)?;
    let written = writer.write(&plan).await?;
    Ok(GraphSummary {
        entities: attributes.len(),
        candidates,
        planned_nodes: plan.nodes.len(),
        planned_edges: plan.edges.len(),
        store: writer.store().name().to_string(),
        written,
    })
}

#[derive(Debug, Clone)]
pub struct IntegrationJob {
    /// Course dataset the course graph was built from
    pub courses: PathBuf,
    /// Profile dataset the attribute graph was built from
    pub profiles: PathBuf,
    pub extract: ExtractConfig,
    pub options: IntegrationOptions,
    pub persist: PersistConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    pub courses: usize,
    pub profiles: usize,
    /// Planned edges per relationship type
    pub links: Vec<(String, usize)>,
    pub store: String,
    #[serde(flatten)]
    pub written: WriteReport,
}

impl fmt::Display for IntegrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "courses:          {}", self.courses)?;
        writeln!(f, "profiles:         {}", self.profiles)?;
        for (kind, n) in &self.links {
            writeln!(f, "{:<18}{n}", format!("{kind}:"))?;
        }
        writeln!(f, "edges written:    {}", self.written.edges_written)?;
        write!(f, "store:            {}", self.store)
    }
}

/// Link profiles, skills and knowledge areas to the courses mentioning them.
pub async fn run_integration(job: IntegrationJob, store: Arc<dyn GraphStore>) -> Result<IntegrationSummary> {
    let courses = Table::from_csv_path(&job.courses)?;
    let profiles = Table::from_csv_path(&job.profiles)?;
    let extract = ExtractConfig {
        mode: ExtractMode::Categorical,
        ..job.extract
    };
    let attributes = FeatureExtractor::plan(&profiles, extract)?.extract_attributes(&profiles)?;

    let plan = GraphPlan::integration(&courses, &attributes, Some(&profiles), &job.options)?;
    let links = job
        .options
        .links
        .iter()
        .flat_map(|link| [&link.label_edge, &link.entity_edge])
        .map(|kind| (kind.to_string(), plan.edges.iter().filter(|e| &e.kind == kind).count()))
        .collect();

    let writer = GraphWriter::new(store, job.persist)?;
    let written = writer.write(&plan).await?;
    Ok(IntegrationSummary {
        courses: courses.len(),
        profiles: attributes.len(),
        links,
        store: writer.store().name().to_string(),
        written,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectSummary {
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
    pub rows: usize,
    pub dimension: usize,
    pub manifest: Option<Manifest>,
}

impl fmt::Display for InspectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "embeddings:       {}", self.embeddings_path.display())?;
        writeln!(f, "metadata:         {}", self.metadata_path.display())?;
        write!(f, "shape:            ({}, {})", self.rows, self.dimension)?;
        match &self.manifest {
            Some(m) => write!(
                f,
                "\nmodel:            {}\nmode:             {:?}\nnormalized:       {}\ncreated:          {}",
                m.model, m.mode, m.normalized, m.created_at
            ),
            None => write!(f, "\nmanifest:         missing"),
        }
    }
}

/// Report N and D of a stored pair without loading the vectors.
pub fn inspect(prefix: PathBuf) -> Result<InspectSummary> {
    let info = VectorStore::new(prefix).inspect()?;
    Ok(InspectSummary {
        embeddings_path: info.embeddings_path,
        metadata_path: info.metadata_path,
        rows: info.rows,
        dimension: info.dimension,
        manifest: info.manifest,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSummary {
    pub nodes: Vec<(String, usize)>,
    pub edges: Vec<(String, usize)>,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self
            .nodes
            .iter()
            .map(|(label, n)| format!("(:{label}) {n}"))
            .chain(self.edges.iter().map(|(kind, n)| format!("[:{kind}] {n}")))
            .collect();
        write!(f, "{}", rows.join("\n"))
    }
}

/// Count nodes per label and edges per relationship kind.
pub async fn stats(store: &dyn GraphStore, labels: &[String], kinds: &[RelationshipKind]) -> Result<StatsSummary> {
    let mut summary = StatsSummary::default();
    for label in labels {
        summary.nodes.push((label.clone(), store.count_nodes(label).await?));
    }
    for kind in kinds {
        summary.edges.push((kind.to_string(), store.count_edges(kind).await?));
    }
    Ok(summary)
}
