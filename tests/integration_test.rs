// Integration tests for simgraph
use async_trait::async_trait;
use simgraph::pipeline::{self, AttributeGraphJob, EmbedJob, IntegrationJob, VectorGraphJob};
use simgraph_core::{
    AttributeGroup, EmbedConfig, EmbeddingSet, Error, ExtractConfig, ExtractMode, LabelDelimiter, MetadataRecord,
    NeighborConfig, NodeRef, PersistConfig, RelationshipKind, Result, SharedLabelScore, SourceKind, Table, Vector,
};
use simgraph_embed::{BatchEmbedder, Encoder, FeatureExtractor, HashingEncoder};
use simgraph_graph::{
    AttributeGraphOptions, EntityMapping, GraphPlan, GraphStore, GraphWriter, IntegrationOptions, MemoryGraphStore,
    VectorGraphOptions,
};
use simgraph_similarity::SimilarityEngine;
use simgraph_storage::VectorStore;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const COURSES: &str = "\
course_title,description,extracted_skills
Intro to Python,Learn Python programming basics,\"python, programming\"
Python Programming,Learn Python programming basics,\"Python, projects\"
Watercolor Painting,Brush techniques for landscapes,\"painting, art\"
Data Analysis,Analyze tables with pandas and SQL,\"sql, pandas\"
";

const PROFILES: &str = "\
profile_title,key_skills,key_knowledge
Analyst,\"• Python
• SQL
• Networking\",\"- Risk
- Law\"
Engineer,\"• python
• sql
• Java\",- Risk
Auditor,• CAD,\"- Law
- Risk\"
";

fn write_csv(dir: &TempDir, name: &str, data: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn embed_job(input: &Path, prefix: &Path) -> EmbedJob {
    EmbedJob {
        input: input.to_path_buf(),
        output_prefix: prefix.to_path_buf(),
        extract: ExtractConfig {
            columns: vec!["description".to_string()],
            ..Default::default()
        },
        embed: EmbedConfig {
            batch_size: 3,
            normalize: true,
            sample: None,
        },
    }
}

fn vector_job(prefix: &Path, dataset: &Path) -> VectorGraphJob {
    VectorGraphJob {
        embeddings_prefix: prefix.to_path_buf(),
        dataset: Some(dataset.to_path_buf()),
        require_manifest: true,
        neighbors: NeighborConfig {
            top_k: 2,
            threshold: 0.3,
            ..Default::default()
        },
        options: VectorGraphOptions {
            entity: EntityMapping::new("Course", "title").with_key_column("course_title"),
            skills_column: Some("extracted_skills".to_string()),
            ..Default::default()
        },
        persist: PersistConfig {
            clear: true,
            batch_size: 3,
            both_directions: true,
        },
    }
}

#[tokio::test]
async fn test_embed_then_build_graph() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "courses.csv", COURSES);
    let prefix = dir.path().join("out/courses");

    let summary = pipeline::run_embed(embed_job(&csv, &prefix), Arc::new(HashingEncoder::new(64)))
        .await
        .unwrap();
    assert_eq!((summary.records, summary.vectors, summary.dimension), (4, 4, 64));

    let info = pipeline::inspect(prefix.clone()).unwrap();
    assert_eq!((info.rows, info.dimension), (4, 64));
    assert!(info.manifest.unwrap().normalized);

    let store = Arc::new(MemoryGraphStore::new());
    let first = pipeline::run_vector_graph(vector_job(&prefix, &csv), store.clone())
        .await
        .unwrap();
    assert_eq!(first.entities, 4);
    assert_eq!(first.written.nodes_written, first.planned_nodes);

    assert_eq!(store.count_nodes("Course").await.unwrap(), 4);
    // python, programming, projects, painting, art, sql, pandas
    assert_eq!(store.count_nodes("Skill").await.unwrap(), 7);
    assert_eq!(store.count_edges(&RelationshipKind::HasSkill).await.unwrap(), 8);

    let intro = NodeRef::new("Course", "title", "Intro to Python");
    let programming = NodeRef::new("Course", "title", "Python Programming");
    let edge = store.edge(&intro, &programming, &RelationshipKind::SimilarTo).unwrap();
    assert!((edge["score"].as_f64().unwrap() - 1.0).abs() < 1e-4);
    assert!(store.edge(&programming, &intro, &RelationshipKind::SimilarTo).is_some());

    let mut per_source: HashMap<String, usize> = HashMap::new();
    for edge in store.edges().iter().filter(|e| e.kind == RelationshipKind::SimilarTo) {
        assert!(!edge.is_self_loop());
        assert!(edge.properties["score"].as_f64().unwrap() >= 0.3 - 1e-6);
        *per_source.entry(edge.source.key.clone()).or_default() += 1;
    }
    assert!(per_source.values().all(|&n| n <= 2));

    // rebuild with clear leaves the same graph
    let nodes = store.node_count();
    let edges = store.edge_count();
    let second = pipeline::run_vector_graph(vector_job(&prefix, &csv), store.clone())
        .await
        .unwrap();
    assert_eq!(second.written.nodes_deleted, nodes);
    assert_eq!((store.node_count(), store.edge_count()), (nodes, edges));
}

#[tokio::test]
async fn test_attribute_graph_from_profiles() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "profiles.csv", PROFILES);
    let store = Arc::new(MemoryGraphStore::new());

    let job = AttributeGraphJob {
        dataset: csv,
        extract: ExtractConfig {
            groups: vec![
                AttributeGroup::new("skills", "key_skills"),
                AttributeGroup::new("knowledge", "key_knowledge"),
            ],
            delimiter: LabelDelimiter::Lines,
            ..Default::default()
        },
        top_k: None,
        threshold: 2.0,
        options: AttributeGraphOptions {
            entity: EntityMapping::new("Profile", "title").with_key_column("profile_title"),
            label_nodes: true,
            score: SharedLabelScore::Count,
        },
        persist: PersistConfig {
            clear: true,
            batch_size: 4,
            both_directions: false,
        },
    };
    let summary = pipeline::run_attribute_graph(job, store.clone()).await.unwrap();
    assert_eq!(summary.entities, 3);

    assert_eq!(store.count_nodes("Profile").await.unwrap(), 3);
    assert_eq!(store.count_nodes("Skill").await.unwrap(), 5);
    assert_eq!(store.count_nodes("Knowledge").await.unwrap(), 2);
    assert_eq!(store.count_edges(&RelationshipKind::HasSkill).await.unwrap(), 7);
    assert_eq!(store.count_edges(&RelationshipKind::RequiresKnowledge).await.unwrap(), 5);
    assert_eq!(store.count_edges(&RelationshipKind::SharesSkillsWith).await.unwrap(), 1);
    assert_eq!(store.count_edges(&RelationshipKind::SharesKnowledgeWith).await.unwrap(), 1);

    let profile = |title: &str| NodeRef::new("Profile", "title", title);
    let shared = store
        .edge(&profile("Analyst"), &profile("Engineer"), &RelationshipKind::SharesSkillsWith)
        .unwrap();
    assert_eq!(shared["count"], 2);
    assert!(store
        .edge(&profile("Analyst"), &profile("Auditor"), &RelationshipKind::SharesKnowledgeWith)
        .is_some());
    assert!(store.node(&NodeRef::new("Skill", "name", "networking")).is_some());
}

fn profile_extract() -> ExtractConfig {
    ExtractConfig {
        groups: vec![
            AttributeGroup::new("skills", "key_skills"),
            AttributeGroup::new("knowledge", "key_knowledge"),
        ],
        delimiter: LabelDelimiter::Lines,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_integrate_links_profiles_to_courses() {
    let dir = TempDir::new().unwrap();
    let courses = write_csv(&dir, "courses.csv", COURSES);
    let profiles = write_csv(&dir, "profiles.csv", PROFILES);
    let store = Arc::new(MemoryGraphStore::new());

    let attribute_job = AttributeGraphJob {
        dataset: profiles.clone(),
        extract: profile_extract(),
        top_k: None,
        threshold: 2.0,
        options: AttributeGraphOptions {
            entity: EntityMapping::new("Profile", "title").with_key_column("profile_title"),
            ..Default::default()
        },
        persist: PersistConfig::default(),
    };
    pipeline::run_attribute_graph(attribute_job, store.clone()).await.unwrap();
    let intro = simgraph_core::GraphNode::new("Course", "title", "Intro to Python").with_property("row_index", 0);
    store.merge_nodes(&[intro]).await.unwrap();

    let job = || IntegrationJob {
        courses: courses.clone(),
        profiles: profiles.clone(),
        extract: profile_extract(),
        options: IntegrationOptions::default(),
        persist: PersistConfig::default(),
    };
    let summary = pipeline::run_integration(job(), store.clone()).await.unwrap();
    assert_eq!((summary.courses, summary.profiles), (4, 3));

    // python is in both Python courses, sql in Data Analysis; no course mentions risk or law
    assert_eq!(store.count_edges(&RelationshipKind::TaughtIn).await.unwrap(), 3);
    assert_eq!(store.count_edges(&RelationshipKind::RelevantCourse).await.unwrap(), 6);
    assert_eq!(store.count_edges(&RelationshipKind::CoveredIn).await.unwrap(), 0);
    assert_eq!(store.count_nodes("Course").await.unwrap(), 3);
    assert_eq!(store.count_nodes("Skill").await.unwrap(), 5);

    let analyst = NodeRef::new("Profile", "title", "Analyst");
    let course = NodeRef::new("Course", "title", "Data Analysis");
    let relevant = store.edge(&analyst, &course, &RelationshipKind::RelevantCourse).unwrap();
    assert_eq!(relevant["matching_skills"], 1);
    let intro = store.node(&NodeRef::new("Course", "title", "Intro to Python")).unwrap();
    assert_eq!(intro["row_index"], 0);

    let edges = store.edge_count();
    pipeline::run_integration(job(), store.clone()).await.unwrap();
    assert_eq!(store.edge_count(), edges);
}

#[tokio::test]
async fn test_default_write_keeps_one_edge_per_pair() {
    // cos(A, B) = 0.9, C is orthogonal to A
    let vectors = vec![
        Vector::new(vec![1.0, 0.0, 0.0]),
        Vector::new(vec![0.9, (1.0f32 - 0.81).sqrt(), 0.0]),
        Vector::new(vec![0.0, 0.0, 1.0]),
    ];
    let metadata = (0..3).map(|i| MetadataRecord::row(i, i, "")).collect();
    let set = EmbeddingSet::new(vectors, metadata, 3, "test", ExtractMode::Row, true).unwrap();

    let engine = SimilarityEngine::new(NeighborConfig {
        top_k: 1,
        threshold: 0.5,
        ..Default::default()
    })
    .unwrap();
    let candidates = engine.embedding_neighbors(&set).unwrap();
    assert_eq!(candidates.len(), 2);

    let persist = PersistConfig::default();
    let plan = GraphPlan::vector_graph(
        &set,
        None,
        &candidates,
        &VectorGraphOptions::default(),
        persist.both_directions,
    )
    .unwrap();
    assert_eq!(plan.edges.len(), 1);
    assert_eq!((plan.edges[0].source.key.as_str(), plan.edges[0].target.key.as_str()), ("row-0", "row-1"));

    let store = Arc::new(MemoryGraphStore::new());
    let report = GraphWriter::new(store.clone(), persist).unwrap().write(&plan).await.unwrap();
    assert_eq!(report.edges_written, 1);
    assert_eq!(store.count_edges(&RelationshipKind::SimilarTo).await.unwrap(), 1);
}

#[test]
fn test_shared_label_scenario() {
    let profiles = "name,skills\nP1,\"python, sql\"\nP2,\"python, java\"\nP3,cad\n";
    let table = Table::from_csv_str(profiles).unwrap();
    let extractor = FeatureExtractor::plan(
        &table,
        ExtractConfig {
            mode: ExtractMode::Categorical,
            groups: vec![AttributeGroup::new("skills", "skills")],
            ..Default::default()
        },
    )
    .unwrap();
    let attributes = extractor.extract_attributes(&table).unwrap();
    let engine = SimilarityEngine::new(NeighborConfig {
        top_k: 5,
        threshold: 1.0,
        score: SharedLabelScore::Count,
    })
    .unwrap();
    let candidates = engine.attribute_neighbors(&attributes, "skills").unwrap();

    let pairs: Vec<(usize, usize, f32)> = candidates.iter().map(|c| (c.source, c.target, c.score)).collect();
    assert_eq!(pairs, vec![(0, 1, 1.0), (1, 0, 1.0)]);
}

#[tokio::test]
async fn test_cell_mode_skips_empty_cells() {
    let table = Table::from_csv_str("title,summary\nAlpha,\nBeta,Second summary\n").unwrap();
    let extractor = FeatureExtractor::plan(
        &table,
        ExtractConfig {
            mode: ExtractMode::Cell,
            columns: vec!["title".to_string(), "summary".to_string()],
            ..Default::default()
        },
    )
    .unwrap();
    let embedder = BatchEmbedder::new(Arc::new(HashingEncoder::new(32)), EmbedConfig::default()).unwrap();
    let set = embedder.embed(&table, &extractor).await.unwrap();

    let first_record: Vec<_> = set.metadata().iter().filter(|m| m.row_index == 0).collect();
    assert_eq!(first_record.len(), 1);
    assert_eq!(first_record[0].column.as_deref(), Some("title"));
    assert_eq!(first_record[0].source, SourceKind::Cell);
    assert_eq!(set.len(), 3);
    assert_eq!(set.vectors().len(), set.metadata().len());
}

/// Rejects any batch holding the painting course.
struct BrokenEncoder;

#[async_trait]
impl Encoder for BrokenEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("Painting") || t.contains("landscapes")) {
            return Err(Error::Persistence("backend unavailable".to_string()));
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model(&self) -> &str {
        "broken"
    }
}

#[tokio::test]
async fn test_encoder_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "courses.csv", COURSES);
    let prefix = dir.path().join("courses");
    let mut job = embed_job(&csv, &prefix);
    job.embed.batch_size = 2;

    let err = pipeline::run_embed(job, Arc::new(BrokenEncoder)).await.unwrap_err();
    assert!(matches!(err, Error::Encoding { batch: 1, .. }));

    let store = VectorStore::new(&prefix);
    assert!(!store.embeddings_path().exists());
    assert!(!store.metadata_path().exists());
    assert!(!store.manifest_path().exists());
}

#[tokio::test]
async fn test_neighbors_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "courses.csv", COURSES);
    let prefix = dir.path().join("courses");
    pipeline::run_embed(embed_job(&csv, &prefix), Arc::new(HashingEncoder::new(64)))
        .await
        .unwrap();

    let set = VectorStore::new(&prefix).load(true).unwrap();
    let engine = SimilarityEngine::new(NeighborConfig {
        top_k: 3,
        threshold: -2.0,
        ..Default::default()
    })
    .unwrap();
    let first = engine.embedding_neighbors(&set).unwrap();
    let second = engine.embedding_neighbors(&set).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4 * 3);
    assert!(first.iter().all(|c| c.source != c.target));
}

#[tokio::test]
async fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let job = embed_job(&dir.path().join("absent.csv"), &dir.path().join("out"));
    let err = pipeline::run_embed(job, Arc::new(HashingEncoder::default())).await.unwrap_err();
    assert!(matches!(err, Error::InputFile { .. }));
}

#[tokio::test]
async fn test_stats_counts() {
    let store = MemoryGraphStore::new();
    store
        .merge_nodes(&[
            simgraph_core::GraphNode::new("Course", "title", "A"),
            simgraph_core::GraphNode::new("Course", "title", "B"),
        ])
        .await
        .unwrap();
    let summary = pipeline::stats(&store, &["Course".to_string()], &[RelationshipKind::SimilarTo])
        .await
        .unwrap();
    assert_eq!(summary.nodes, vec![("Course".to_string(), 2)]);
    assert_eq!(summary.edges, vec![("SIMILAR_TO".to_string(), 0)]);
}
