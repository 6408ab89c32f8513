//! Feature representations and their index-aligned metadata.

use crate::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The comparable form of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureRepresentation {
    /// Embedding of free text
    Dense(Vector),
    /// Named groups of categorical labels
    Attributes(AttributeSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationKind {
    Dense,
    Attributes,
}

impl FeatureRepresentation {
    pub fn kind(&self) -> RepresentationKind {
        match self {
            FeatureRepresentation::Dense(_) => RepresentationKind::Dense,
            FeatureRepresentation::Attributes(_) => RepresentationKind::Attributes,
        }
    }
}

/// Named sets of normalized labels, e.g. `skills` and `knowledge`.
///
/// Ordered containers keep iteration (and therefore graph writes) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group; an empty label list still registers the group.
    pub fn insert_group<I, S>(&mut self, group: impl Into<String>, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.groups.entry(group.into()).or_default();
        entry.extend(labels.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn with_group<I, S>(mut self, group: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_group(group, labels);
        self
    }

    pub fn group(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Labels of `group` present in both sets.
    pub fn shared_count(&self, other: &AttributeSet, group: &str) -> usize {
        match (self.group(group), other.group(group)) {
            (Some(a), Some(b)) => a.intersection(b).count(),
            _ => 0,
        }
    }

    /// Jaccard ratio of `group`; 0 when both sides are empty.
    pub fn jaccard(&self, other: &AttributeSet, group: &str) -> f32 {
        let (a, b) = match (self.group(group), other.group(group)) {
            (Some(a), Some(b)) => (a, b),
            _ => return 0.0,
        };
        let shared = a.intersection(b).count();
        let union = a.len() + b.len() - shared;
        if union == 0 {
            0.0
        } else {
            shared as f32 / union as f32
        }
    }

    /// Flat textual summary used as metadata text.
    pub fn describe(&self) -> String {
        self.groups
            .iter()
            .map(|(group, labels)| {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                format!("{}: {}", group, labels.join("; "))
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// What produced a representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Row,
    Cell,
    Attributes,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Row => "row",
            SourceKind::Cell => "cell",
            SourceKind::Attributes => "attributes",
        };
        f.write_str(s)
    }
}

/// Parallel entry describing representation `index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub index: usize,
    pub source: SourceKind,
    pub row_index: usize,
    pub column: Option<String>,
    pub text: String,
}

impl MetadataRecord {
    pub fn row(index: usize, row_index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            source: SourceKind::Row,
            row_index,
            column: None,
            text: text.into(),
        }
    }

    pub fn cell(index: usize, row_index: usize, column: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            source: SourceKind::Cell,
            row_index,
            column: Some(column.into()),
            text: text.into(),
        }
    }

    pub fn attributes(index: usize, row_index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            source: SourceKind::Attributes,
            row_index,
            column: None,
            text: text.into(),
        }
    }
}

/// A directed, scored neighbor pair between two entity positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborCandidate {
    pub source: usize,
    pub target: usize,
    pub score: f32,
}

impl NeighborCandidate {
    #[inline]
    pub fn new(source: usize, target: usize, score: f32) -> Self {
        Self {
            source,
            target,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_count_and_jaccard() {
        let p1 = AttributeSet::new().with_group("skills", ["python", "sql"]);
        let p2 = AttributeSet::new().with_group("skills", ["python", "java"]);
        let p3 = AttributeSet::new().with_group("skills", ["cad"]);

        assert_eq!(p1.shared_count(&p2, "skills"), 1);
        assert_eq!(p1.shared_count(&p3, "skills"), 0);
        assert!((p1.jaccard(&p2, "skills") - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(p1.shared_count(&p2, "knowledge"), 0);
    }

    #[test]
    fn test_empty_group_registered() {
        let set = AttributeSet::new().with_group("skills", Vec::<String>::new());
        assert!(set.group("skills").unwrap().is_empty());
        assert_eq!(set.jaccard(&set, "skills"), 0.0);
    }

    #[test]
    fn test_describe_is_ordered() {
        let set = AttributeSet::new()
            .with_group("skills", ["sql", "python"])
            .with_group("knowledge", ["networks"]);
        assert_eq!(set.describe(), "knowledge: networks | skills: python; sql");
    }
}
