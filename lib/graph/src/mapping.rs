//! Mapping representations and neighbor candidates onto graph records
//!
//! Entities become nodes keyed by a natural key read from the source table.
//! Representations that resolve to the same key collapse into one node (the
//! first occurrence supplies its properties), and any edge whose endpoints
//! collapse onto the same node is dropped, so the plan never holds a
//! self-loop.

use ahash::AHashSet;
use serde_json::Value;
use simgraph_core::config::validate_identifier;
use simgraph_core::{
    AttributeTable, EmbeddingSet, Error, GraphEdge, GraphNode, LabelDelimiter, MetadataRecord,
    NeighborCandidate, NodeRef, PropertyMap, RelationshipKind, Result, SharedLabelScore, SourceKind,
    Table,
};
use simgraph_embed::parse_labels;
use simgraph_similarity::collapse_symmetric;
use tracing::{debug, warn};

/// How entities are labelled and keyed
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    pub label: String,
    pub key_property: String,
    /// Table column supplying the natural key
    pub key_column: Option<String>,
    /// Table columns copied onto entity nodes
    pub property_columns: Vec<String>,
}

impl EntityMapping {
    pub fn new(label: impl Into<String>, key_property: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key_property: key_property.into(),
            key_column: None,
            property_columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_property_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier("label", &self.label)?;
        validate_identifier("key property", &self.key_property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorGraphOptions {
    pub entity: EntityMapping,
    pub relationship: RelationshipKind,
    /// Copy each entity's vector onto its node as `embedding`
    pub store_embedding: bool,
    /// Column of delimited skills linked as `Skill` nodes
    pub skills_column: Option<String>,
    pub skills_delimiter: LabelDelimiter,
}

impl Default for VectorGraphOptions {
    fn default() -> Self {
        Self {
            entity: EntityMapping::new("Course", "title"),
            relationship: RelationshipKind::SimilarTo,
            store_embedding: false,
            skills_column: None,
            skills_delimiter: LabelDelimiter::Comma,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGraphOptions {
    pub entity: EntityMapping,
    /// Write one node per label plus membership edges
    pub label_nodes: bool,
    pub score: SharedLabelScore,
}

impl Default for AttributeGraphOptions {
    fn default() -> Self {
        Self {
            entity: EntityMapping::new("Profile", "title"),
            label_nodes: true,
            score: SharedLabelScore::Count,
        }
    }
}

/// Node label and relationship types used for one attribute group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSchema {
    pub group: String,
    pub node_label: String,
    pub membership: RelationshipKind,
    pub shared: RelationshipKind,
}

impl GroupSchema {
    pub const LABEL_KEY: &'static str = "name";

    pub fn for_group(group: &str) -> Self {
        let lowered = group.trim().to_ascii_lowercase();
        let (node_label, membership, shared) = match lowered.trim_end_matches('s') {
            "skill" => (
                "Skill".to_string(),
                RelationshipKind::HasSkill,
                RelationshipKind::SharesSkillsWith,
            ),
            "knowledge" => (
                "Knowledge".to_string(),
                RelationshipKind::RequiresKnowledge,
                RelationshipKind::SharesKnowledgeWith,
            ),
            "deliverable" => (
                "Deliverable".to_string(),
                RelationshipKind::ProducesDeliverable,
                RelationshipKind::Custom("SHARES_DELIVERABLES_WITH".to_string()),
            ),
            _ => {
                let ident = identifier(group);
                let upper = ident.to_ascii_uppercase();
                (
                    title_case(&ident),
                    RelationshipKind::Custom(format!("HAS_{upper}")),
                    RelationshipKind::Custom(format!("SHARES_{upper}_WITH")),
                )
            }
        };
        Self {
            group: group.to_string(),
            node_label,
            membership,
            shared,
        }
    }

    fn label_node(&self, name: &str) -> GraphNode {
        GraphNode::new(self.node_label.clone(), Self::LABEL_KEY, name)
    }
}

/// Neighbor candidates computed for one attribute group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNeighbors {
    pub group: String,
    pub candidates: Vec<NeighborCandidate>,
}

/// Everything one run writes: labels it owns, nodes, then edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphPlan {
    pub owned_labels: Vec<String>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphPlan {
    /// Distinct `(label, key_property)` pairs of the planned nodes, in first-seen order.
    pub fn node_keys(&self) -> Vec<(String, String)> {
        let mut seen = AHashSet::new();
        self.nodes
            .iter()
            .filter(|n| seen.insert((n.node.label.as_str(), n.node.key_property.as_str())))
            .map(|n| (n.node.label.clone(), n.node.key_property.clone()))
            .collect()
    }

    /// Entity nodes plus one edge per surviving vector neighbor.
    pub fn vector_graph(
        set: &EmbeddingSet,
        table: Option<&Table>,
        candidates: &[NeighborCandidate],
        options: &VectorGraphOptions,
        both_directions: bool,
    ) -> Result<Self> {
        options.entity.validate()?;
        validate_identifier("relationship", options.relationship.as_str())?;

        let entities = resolve_entities(set.metadata(), table, &options.entity, |i, meta| {
            let mut properties = PropertyMap::new();
            properties.insert("row_index".into(), Value::from(meta.row_index as u64));
            properties.insert("text".into(), Value::from(meta.text.clone()));
            if let Some(column) = &meta.column {
                properties.insert("column".into(), Value::from(column.clone()));
            }
            if options.store_embedding {
                properties.insert("embedding".into(), Value::from(set.vectors()[i].as_slice().to_vec()));
            }
            properties
        });

        let mut plan = GraphPlan {
            owned_labels: vec![options.entity.label.clone()],
            ..Default::default()
        };

        let candidates = directed(candidates, both_directions);
        let edges = neighbor_edges(&entities.refs, &candidates, &options.relationship, both_directions, |score| {
            ("score", Value::from(f64::from(score)))
        })?;

        if let (Some(column), Some(table)) = (&options.skills_column, table) {
            let schema = GroupSchema::for_group("skills");
            let mut labels = LabelNodes::default();
            let mut membership = Vec::new();
            for (node, row_index) in entities.nodes.iter().zip(&entities.rows) {
                let Some(value) = table.value(*row_index, column) else {
                    continue;
                };
                for skill in parse_labels(value, options.skills_delimiter) {
                    labels.add(&schema, &skill);
                    membership.push(GraphEdge::new(
                        node.node.clone(),
                        NodeRef::new(schema.node_label.clone(), GroupSchema::LABEL_KEY, skill),
                        schema.membership.clone(),
                    ));
                }
            }
            plan.owned_labels.push(schema.node_label.clone());
            plan.nodes.extend(entities.nodes);
            plan.nodes.extend(labels.nodes);
            plan.edges.extend(membership);
        } else {
            if options.skills_column.is_some() {
                warn!("skills column set but no dataset table given, skipping skills");
            }
            plan.nodes.extend(entities.nodes);
        }
        plan.edges.extend(edges);

        debug!(nodes = plan.nodes.len(), edges = plan.edges.len(), "vector graph planned");
        Ok(plan)
    }

    /// Entity nodes, label nodes with membership edges, and shared-label edges.
    pub fn attribute_graph(
        attributes: &AttributeTable,
        table: Option<&Table>,
        neighbors: &[GroupNeighbors],
        options: &AttributeGraphOptions,
        both_directions: bool,
    ) -> Result<Self> {
        options.entity.validate()?;
        let schemas: Vec<GroupSchema> = attributes.groups().iter().map(|g| GroupSchema::for_group(g)).collect();
        for schema in &schemas {
            validate_identifier("label", &schema.node_label)?;
            validate_identifier("relationship", schema.membership.as_str())?;
            validate_identifier("relationship", schema.shared.as_str())?;
        }

        let entities = resolve_entities(attributes.metadata(), table, &options.entity, |i, meta| {
            let mut properties = PropertyMap::new();
            properties.insert("row_index".into(), Value::from(meta.row_index as u64));
            for (group, labels) in attributes.sets()[i].groups() {
                properties.insert(format!("{group}_count"), Value::from(labels.len() as u64));
            }
            properties
        });

        let mut plan = GraphPlan {
            owned_labels: vec![options.entity.label.clone()],
            ..Default::default()
        };

        let mut labels = LabelNodes::default();
        let mut membership = Vec::new();
        if options.label_nodes {
            for (node, first) in entities.nodes.iter().zip(&entities.first_index) {
                let set = &attributes.sets()[*first];
                for schema in &schemas {
                    let Some(group_labels) = set.group(&schema.group) else {
                        continue;
                    };
                    for name in group_labels {
                        labels.add(schema, name);
                        membership.push(GraphEdge::new(
                            node.node.clone(),
                            NodeRef::new(schema.node_label.clone(), GroupSchema::LABEL_KEY, name.clone()),
                            schema.membership.clone(),
                        ));
                    }
                }
            }
            for schema in &schemas {
                if !plan.owned_labels.contains(&schema.node_label) {
                    plan.owned_labels.push(schema.node_label.clone());
                }
            }
        }

        let mut shared = Vec::new();
        for group in neighbors {
            let schema = schemas
                .iter()
                .find(|s| s.group == group.group)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown attribute group: {}", group.group)))?;
            let candidates = directed(&group.candidates, both_directions);
            let score = options.score;
            shared.extend(neighbor_edges(&entities.refs, &candidates, &schema.shared, both_directions, |s| {
                match score {
                    SharedLabelScore::Count => ("count", Value::from(s.round() as u64)),
                    SharedLabelScore::Jaccard => ("score", Value::from(f64::from(s))),
                }
            })?);
        }

        plan.nodes.extend(entities.nodes);
        plan.nodes.extend(labels.nodes);
        plan.edges.extend(membership);
        plan.edges.extend(shared);

        debug!(nodes = plan.nodes.len(), edges = plan.edges.len(), "attribute graph planned");
        Ok(plan)
    }
}

#[derive(Default)]
struct LabelNodes {
    seen: AHashSet<(String, String)>,
    nodes: Vec<GraphNode>,
}

impl LabelNodes {
    fn add(&mut self, schema: &GroupSchema, name: &str) {
        if self.seen.insert((schema.node_label.clone(), name.to_string())) {
            self.nodes.push(schema.label_node(name));
        }
    }
}

/// Entity nodes and the node each representation maps to
struct Entities {
    /// Node of representation `i`
    refs: Vec<NodeRef>,
    /// Distinct nodes, first occurrence order
    nodes: Vec<GraphNode>,
    /// Source row of each distinct node
    rows: Vec<usize>,
    /// Representation index that created each distinct node
    first_index: Vec<usize>,
}

fn resolve_entities<F>(
    metadata: &[MetadataRecord],
    table: Option<&Table>,
    entity: &EntityMapping,
    mut properties: F,
) -> Entities
where
    F: FnMut(usize, &MetadataRecord) -> PropertyMap,
{
    if let (Some(column), Some(table)) = (&entity.key_column, table) {
        if table.find_column(column).is_none() {
            warn!(column = %column, "key column not in dataset, falling back to row keys");
        }
    }

    let mut seen: AHashSet<String> = AHashSet::with_capacity(metadata.len());
    let mut entities = Entities {
        refs: Vec::with_capacity(metadata.len()),
        nodes: Vec::new(),
        rows: Vec::new(),
        first_index: Vec::new(),
    };

    for (i, meta) in metadata.iter().enumerate() {
        let key = entity_key(meta, table, entity.key_column.as_deref());
        let node_ref = NodeRef::new(entity.label.clone(), entity.key_property.clone(), key.clone());
        if seen.insert(key) {
            let mut node = GraphNode::new(entity.label.clone(), entity.key_property.clone(), node_ref.key.clone());
            node.properties = properties(i, meta);
            if let Some(table) = table {
                for column in &entity.property_columns {
                    if let Some(value) = table.value(meta.row_index, column) {
                        node.properties.insert(column.clone(), Value::from(value.trim()));
                    }
                }
            }
            entities.nodes.push(node);
            entities.rows.push(meta.row_index);
            entities.first_index.push(i);
        }
        entities.refs.push(node_ref);
    }

    let merged = metadata.len() - entities.nodes.len();
    if merged > 0 {
        debug!(merged, "representations sharing a natural key merged into one node");
    }
    entities
}

/// Natural key of one representation.
///
/// Cell-mode keys carry the column so cells of one record stay distinct.
pub fn entity_key(meta: &MetadataRecord, table: Option<&Table>, key_column: Option<&str>) -> String {
    let base = key_column
        .zip(table)
        .and_then(|(column, table)| table.value(meta.row_index, column))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("row-{}", meta.row_index));
    match (&meta.source, &meta.column) {
        (SourceKind::Cell, Some(column)) => format!("{base}:{column}"),
        _ => base,
    }
}

fn directed(candidates: &[NeighborCandidate], both_directions: bool) -> Vec<NeighborCandidate> {
    if both_directions {
        candidates.to_vec()
    } else {
        collapse_symmetric(candidates)
    }
}

fn neighbor_edges<F>(
    refs: &[NodeRef],
    candidates: &[NeighborCandidate],
    kind: &RelationshipKind,
    both_directions: bool,
    property: F,
) -> Result<Vec<GraphEdge>>
where
    F: Fn(f32) -> (&'static str, Value),
{
    let mut seen = AHashSet::with_capacity(candidates.len());
    let mut edges = Vec::with_capacity(candidates.len());
    let mut self_loops = 0usize;

    for c in candidates {
        let (Some(source), Some(target)) = (refs.get(c.source), refs.get(c.target)) else {
            return Err(Error::Input(format!(
                "neighbor ({}, {}) refers past the {} mapped representations",
                c.source,
                c.target,
                refs.len()
            )));
        };
        if source == target {
            self_loops += 1;
            continue;
        }
        let pair = if both_directions || source.key <= target.key {
            (source.key.clone(), target.key.clone())
        } else {
            (target.key.clone(), source.key.clone())
        };
        if !seen.insert(pair) {
            continue;
        }
        let (name, value) = property(c.score);
        edges.push(GraphEdge::new(source.clone(), target.clone(), kind.clone()).with_property(name, value));
    }

    if self_loops > 0 {
        debug!(self_loops, kind = %kind, "dropped edges between merged entities");
    }
    Ok(edges)
}

/// Title-case an identifier: `key_tools` -> `KeyTools`.
fn title_case(ident: &str) -> String {
    ident
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

/// Replace characters that cannot appear in a graph identifier.
fn identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
