use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use simgraph::pipeline::{self, AttributeGraphJob, EmbedJob, IntegrationJob, VectorGraphJob};
use simgraph_core::config::{DEFAULT_DIMENSION, DEFAULT_EMBED_BATCH_SIZE, DEFAULT_WRITE_BATCH_SIZE};
use simgraph_core::{
    AttributeGroup, EmbedConfig, ExtractConfig, ExtractMode, LabelDelimiter, NeighborConfig, PersistConfig,
    RelationshipKind, SharedLabelScore,
};
use simgraph_embed::{Encoder, HashingEncoder, HttpEncoder};
use simgraph_graph::{
    AttributeGraphOptions, EntityMapping, GraphStore, GroupLink, IntegrationOptions, StoreConfig, StoreKind,
    VectorGraphOptions,
};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Build weighted similarity graphs from tabular records
#[derive(Parser, Debug)]
#[command(name = "simgraph", version)]
#[command(about = "Build weighted similarity graphs from tabular records", long_about = None)]
struct Cli {
    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract texts from a CSV file, encode them and save vectors + metadata
    Embed(EmbedArgs),
    /// Select vector neighbors from saved embeddings and write a SIMILAR_TO graph
    BuildGraph(BuildGraphArgs),
    /// Parse categorical columns and write a shared-label graph
    BuildAttributeGraph(AttributeGraphArgs),
    /// Link a profile graph to a course graph through skill and knowledge labels
    Integrate(IntegrateArgs),
    /// Show the shape of saved embeddings without loading them
    Inspect {
        #[arg(long)]
        embeddings_prefix: PathBuf,
    },
    /// Count nodes and relationships in the graph store
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncoderKind {
    Hashing,
    Http,
}

#[derive(Args, Debug)]
struct EmbedArgs {
    #[arg(short, long)]
    input: PathBuf,

    /// Writes PREFIX_embeddings.npy, PREFIX_metadata.csv and PREFIX_manifest.json
    #[arg(short, long)]
    output_prefix: PathBuf,

    /// Text columns; auto-detected when omitted
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// row or cell
    #[arg(long, default_value = "row")]
    mode: ExtractMode,

    #[arg(long, default_value_t = DEFAULT_EMBED_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long)]
    normalize: bool,

    /// Truncate each text to this many characters
    #[arg(long)]
    max_chars: Option<usize>,

    /// Keep only the first N texts
    #[arg(long)]
    sample: Option<usize>,

    #[arg(long, value_enum, default_value = "hashing")]
    encoder: EncoderKind,

    /// Embedding endpoint for the http encoder
    #[arg(long, env = "SIMGRAPH_ENCODER_URL")]
    encoder_url: Option<String>,

    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    dimension: usize,

    /// Model name recorded in the manifest (http encoder)
    #[arg(long, default_value = "all-MiniLM-L6-v2")]
    model: String,

    #[arg(long, default_value_t = 60)]
    encoder_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// memory (dry run, discarded on exit) or neo4j
    #[arg(long, default_value = "memory")]
    store: StoreKind,

    #[arg(long, env = "NEO4J_URI", default_value = "http://localhost:7474")]
    uri: String,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    user: String,

    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "NEO4J_DATABASE", default_value = "neo4j")]
    database: String,

    #[arg(long, default_value_t = 60)]
    store_timeout_secs: u64,
}

impl StoreArgs {
    fn connect(&self) -> anyhow::Result<Arc<dyn GraphStore>> {
        let config = StoreConfig {
            kind: self.store,
            uri: self.uri.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            timeout: Duration::from_secs(self.store_timeout_secs),
        };
        info!(?config, "connecting to graph store");
        if config.kind == StoreKind::Memory {
            warn!("memory store selected, the graph is discarded on exit");
        }
        config.connect().context("graph store connection failed")
    }
}

#[derive(Args, Debug)]
struct EntityArgs {
    /// Dataset column holding each entity's natural key
    #[arg(long)]
    key_column: Option<String>,

    /// Dataset columns copied onto entity nodes
    #[arg(long, value_delimiter = ',')]
    property_columns: Vec<String>,

    #[arg(long)]
    key_property: Option<String>,

    #[arg(long)]
    label: Option<String>,
}

impl EntityArgs {
    fn mapping(&self, default: EntityMapping) -> EntityMapping {
        EntityMapping {
            label: self.label.clone().unwrap_or(default.label),
            key_property: self.key_property.clone().unwrap_or(default.key_property),
            key_column: self.key_column.clone().or(default.key_column),
            property_columns: self.property_columns.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct BuildGraphArgs {
    #[arg(long)]
    embeddings_prefix: PathBuf,

    /// Source CSV of the embeddings, for natural keys and properties
    #[arg(long)]
    dataset: Option<PathBuf>,

    #[command(flatten)]
    entity: EntityArgs,

    /// Column of comma-separated skills linked as Skill nodes
    #[arg(long)]
    skills_column: Option<String>,

    #[arg(long, default_value = "comma")]
    skills_delimiter: LabelDelimiter,

    #[arg(long, default_value_t = 5)]
    top_k: usize,

    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// Write both directions of each similar pair
    #[arg(long)]
    both_directions: bool,

    /// Store each vector on its node as `embedding`
    #[arg(long)]
    store_embedding: bool,

    /// Load embeddings that have no manifest
    #[arg(long)]
    allow_missing_manifest: bool,

    /// Delete the nodes of the written labels first
    #[arg(long)]
    clear: bool,

    #[arg(long, default_value_t = DEFAULT_WRITE_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct AttributeGraphArgs {
    #[arg(long)]
    dataset: PathBuf,

    /// `name=column`, repeatable; categorical columns are detected when omitted
    #[arg(long = "group")]
    groups: Vec<AttributeGroup>,

    #[command(flatten)]
    entity: EntityArgs,

    #[arg(long, default_value = "lines")]
    delimiter: LabelDelimiter,

    #[arg(long, default_value = "count")]
    score: SharedLabelScore,

    #[arg(long, default_value_t = 2.0)]
    threshold: f32,

    /// Neighbors kept per entity; all above the threshold when omitted
    #[arg(long)]
    top_k: Option<usize>,

    /// Skip label nodes and membership edges
    #[arg(long)]
    no_label_nodes: bool,

    /// Write both directions of each shared-label pair
    #[arg(long)]
    both_directions: bool,

    #[arg(long)]
    clear: bool,

    #[arg(long, default_value_t = DEFAULT_WRITE_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct IntegrateArgs {
    #[arg(long)]
    courses: PathBuf,

    #[arg(long)]
    profiles: PathBuf,

    #[arg(long, default_value = "course_title")]
    course_key_column: String,

    /// Course columns searched for skill and knowledge names
    #[arg(long, value_delimiter = ',', default_value = "course_title,description")]
    match_columns: Vec<String>,

    #[arg(long, default_value = "profile_title")]
    profile_key_column: String,

    #[arg(long, default_value = "skills=key_skills")]
    skills: AttributeGroup,

    #[arg(long, default_value = "knowledge=key_knowledge")]
    knowledge: AttributeGroup,

    #[arg(long, default_value = "lines")]
    delimiter: LabelDelimiter,

    /// Skip RELEVANT_COURSE and TAUGHT_IN
    #[arg(long)]
    skip_skills: bool,

    /// Skip TEACHES_KNOWLEDGE and COVERED_IN
    #[arg(long)]
    skip_knowledge: bool,

    #[arg(long, default_value_t = DEFAULT_WRITE_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Node labels to count, repeatable
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Relationship types to count, repeatable
    #[arg(long = "relationship")]
    relationships: Vec<String>,

    #[command(flatten)]
    store: StoreArgs,
}

const STATS_LABELS: &[&str] = &["Course", "Profile", "Skill", "Knowledge", "Deliverable"];

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr);
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(builder.with_env_filter(EnvFilter::from_default_env()).finish())?;
        return Ok(());
    }
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing::subscriber::set_global_default(builder.with_max_level(level).finish())?;
    Ok(())
}

fn print_summary<T: Serialize + Display>(summary: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn encoder(args: &EmbedArgs) -> anyhow::Result<Arc<dyn Encoder>> {
    Ok(match args.encoder {
        EncoderKind::Hashing => Arc::new(HashingEncoder::new(args.dimension)),
        EncoderKind::Http => {
            let Some(url) = &args.encoder_url else {
                bail!("--encoder-url (or SIMGRAPH_ENCODER_URL) is required for the http encoder");
            };
            Arc::new(HttpEncoder::new(
                url.clone(),
                args.model.clone(),
                args.dimension,
                Duration::from_secs(args.encoder_timeout_secs),
            )?)
        }
    })
}

async fn embed(args: EmbedArgs, json: bool) -> anyhow::Result<()> {
    if args.mode == ExtractMode::Categorical {
        bail!("categorical mode builds attribute sets; use build-attribute-graph");
    }
    let encoder = encoder(&args)?;
    info!(input = %args.input.display(), model = encoder.model(), "embedding dataset");
    let job = EmbedJob {
        input: args.input,
        output_prefix: args.output_prefix,
        extract: ExtractConfig {
            mode: args.mode,
            columns: args.columns,
            max_chars: args.max_chars,
            ..Default::default()
        },
        embed: EmbedConfig {
            batch_size: args.batch_size,
            normalize: args.normalize,
            sample: args.sample,
        },
    };
    let summary = pipeline::run_embed(job, encoder).await?;
    print_summary(&summary, json)
}

async fn build_graph(args: BuildGraphArgs, json: bool) -> anyhow::Result<()> {
    let store = args.store.connect()?;
    let defaults = VectorGraphOptions::default();
    let job = VectorGraphJob {
        embeddings_prefix: args.embeddings_prefix,
        dataset: args.dataset,
        require_manifest: !args.allow_missing_manifest,
        neighbors: NeighborConfig {
            top_k: args.top_k,
            threshold: args.threshold,
            ..Default::default()
        },
        options: VectorGraphOptions {
            entity: args.entity.mapping(defaults.entity),
            store_embedding: args.store_embedding,
            skills_column: args.skills_column,
            skills_delimiter: args.skills_delimiter,
            ..VectorGraphOptions::default()
        },
        persist: PersistConfig {
            clear: args.clear,
            batch_size: args.batch_size,
            both_directions: args.both_directions,
        },
    };
    let summary = pipeline::run_vector_graph(job, store).await?;
    print_summary(&summary, json)
}

async fn build_attribute_graph(args: AttributeGraphArgs, json: bool) -> anyhow::Result<()> {
    let store = args.store.connect()?;
    let defaults = AttributeGraphOptions::default();
    let job = AttributeGraphJob {
        dataset: args.dataset,
        extract: ExtractConfig {
            mode: ExtractMode::Categorical,
            groups: args.groups,
            delimiter: args.delimiter,
            ..Default::default()
        },
        top_k: args.top_k,
        threshold: args.threshold,
        options: AttributeGraphOptions {
            entity: args.entity.mapping(defaults.entity),
            label_nodes: !args.no_label_nodes,
            score: args.score,
        },
        persist: PersistConfig {
            clear: args.clear,
            batch_size: args.batch_size,
            both_directions: args.both_directions,
        },
    };
    let summary = pipeline::run_attribute_graph(job, store).await?;
    print_summary(&summary, json)
}

async fn integrate(args: IntegrateArgs, json: bool) -> anyhow::Result<()> {
    if args.skip_skills && args.skip_knowledge {
        bail!("--skip-skills and --skip-knowledge together leave nothing to link");
    }
    let store = args.store.connect()?;
    let defaults = IntegrationOptions::default();

    let mut groups = Vec::new();
    let mut links = Vec::new();
    if !args.skip_skills {
        links.push(GroupLink::skills(args.skills.name.clone()));
        groups.push(args.skills);
    }
    if !args.skip_knowledge {
        links.push(GroupLink::knowledge(args.knowledge.name.clone()));
        groups.push(args.knowledge);
    }

    let job = IntegrationJob {
        courses: args.courses,
        profiles: args.profiles,
        extract: ExtractConfig {
            mode: ExtractMode::Categorical,
            groups,
            delimiter: args.delimiter,
            ..Default::default()
        },
        options: IntegrationOptions {
            course: defaults.course.with_key_column(args.course_key_column),
            match_columns: args.match_columns,
            profile: defaults.profile.with_key_column(args.profile_key_column),
            links,
        },
        persist: PersistConfig {
            batch_size: args.batch_size,
            ..Default::default()
        },
    };
    let summary = pipeline::run_integration(job, store).await?;
    print_summary(&summary, json)
}

async fn stats(args: StatsArgs, json: bool) -> anyhow::Result<()> {
    let store = args.store.connect()?;
    let defaults = args.labels.is_empty() && args.relationships.is_empty();
    let labels = if defaults {
        STATS_LABELS.iter().map(|s| s.to_string()).collect()
    } else {
        args.labels
    };
    let kinds: Vec<RelationshipKind> = if defaults {
        vec![
            RelationshipKind::SimilarTo,
            RelationshipKind::HasSkill,
            RelationshipKind::SharesSkillsWith,
            RelationshipKind::RequiresKnowledge,
            RelationshipKind::SharesKnowledgeWith,
            RelationshipKind::ProducesDeliverable,
            RelationshipKind::RelevantCourse,
            RelationshipKind::TeachesKnowledge,
            RelationshipKind::TaughtIn,
            RelationshipKind::CoveredIn,
        ]
    } else {
        args.relationships.iter().map(|r| RelationshipKind::parse(r)).collect()
    };
    let summary = pipeline::stats(store.as_ref(), &labels, &kinds).await?;
    print_summary(&summary, json)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    info!("simgraph v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Embed(args) => embed(args, cli.json).await,
        Command::BuildGraph(args) => build_graph(args, cli.json).await,
        Command::BuildAttributeGraph(args) => build_attribute_graph(args, cli.json).await,
        Command::Integrate(args) => integrate(args, cli.json).await,
        Command::Inspect { embeddings_prefix } => {
            let summary = pipeline::inspect(embeddings_prefix)?;
            print_summary(&summary, cli.json)
        }
        Command::Stats(args) => stats(args, cli.json).await,
    }
}
