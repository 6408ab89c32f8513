// Property-graph model - nodes keyed by a natural key, typed directed edges
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub type PropertyMap = serde_json::Map<String, Value>;

/// Address of a node in the store: label plus natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: String,
    pub key_property: String,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: impl Into<String>, key_property: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key_property: key_property.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node: NodeRef,
    pub properties: PropertyMap,
}

impl GraphNode {
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, key_property: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            node: NodeRef::new(label, key_property, key),
            properties: PropertyMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.node.label
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.node.key
    }
}

/// Relationship types written by the graph builders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    SimilarTo,
    SharesSkillsWith,
    SharesKnowledgeWith,
    HasSkill,
    RequiresKnowledge,
    ProducesDeliverable,
    /// Profile to course, by matching skills
    RelevantCourse,
    /// Profile to course, by matching knowledge areas
    TeachesKnowledge,
    /// Skill to a course that mentions it
    TaughtIn,
    /// Knowledge area to a course that mentions it
    CoveredIn,
    Custom(String),
}

impl RelationshipKind {
    pub fn as_str(&self) -> &str {
        match self {
            RelationshipKind::SimilarTo => "SIMILAR_TO",
            RelationshipKind::SharesSkillsWith => "SHARES_SKILLS_WITH",
            RelationshipKind::SharesKnowledgeWith => "SHARES_KNOWLEDGE_WITH",
            RelationshipKind::HasSkill => "HAS_SKILL",
            RelationshipKind::RequiresKnowledge => "REQUIRES_KNOWLEDGE",
            RelationshipKind::ProducesDeliverable => "PRODUCES_DELIVERABLE",
            RelationshipKind::RelevantCourse => "RELEVANT_COURSE",
            RelationshipKind::TeachesKnowledge => "TEACHES_KNOWLEDGE",
            RelationshipKind::TaughtIn => "TAUGHT_IN",
            RelationshipKind::CoveredIn => "COVERED_IN",
            RelationshipKind::Custom(name) => name,
        }
    }

    /// Parse a relationship type name, falling back to `Custom`.
    pub fn parse(name: &str) -> Self {
        match name {
            "SIMILAR_TO" => RelationshipKind::SimilarTo,
            "SHARES_SKILLS_WITH" => RelationshipKind::SharesSkillsWith,
            "SHARES_KNOWLEDGE_WITH" => RelationshipKind::SharesKnowledgeWith,
            "HAS_SKILL" => RelationshipKind::HasSkill,
            "REQUIRES_KNOWLEDGE" => RelationshipKind::RequiresKnowledge,
            "PRODUCES_DELIVERABLE" => RelationshipKind::ProducesDeliverable,
            "RELEVANT_COURSE" => RelationshipKind::RelevantCourse,
            "TEACHES_KNOWLEDGE" => RelationshipKind::TeachesKnowledge,
            "TAUGHT_IN" => RelationshipKind::TaughtIn,
            "COVERED_IN" => RelationshipKind::CoveredIn,
            other => RelationshipKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: RelationshipKind,
    pub properties: PropertyMap,
}

impl GraphEdge {
    #[inline]
    #[must_use]
    pub fn new(source: NodeRef, target: NodeRef, kind: RelationshipKind) -> Self {
        Self {
            source,
            target,
            kind,
            properties: PropertyMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Labels, property names and relationship types end up inside Cypher text,
/// so they are restricted to `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
