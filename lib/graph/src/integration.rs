//! Linking a profile graph to a course graph
//!
//! Both graphs share label nodes: a skill or knowledge label links to every
//! course whose match text contains it (case-insensitive substring), and a
//! profile links to every course matching at least one of its labels, with
//! the number of distinct matching labels as an edge property.
//!
//! The plan only holds nodes that take part in an edge, written key-only, so
//! merging it into an existing store leaves the properties of the two source
//! graphs untouched. It owns no labels and never clears.

use crate::mapping::{entity_key, EntityMapping, GraphPlan, GroupSchema};
use ahash::{AHashMap, AHashSet};
use serde_json::Value;
use simgraph_core::{AttributeTable, GraphEdge, GraphNode, MetadataRecord, NodeRef, RelationshipKind, Result, Table};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Which attribute group links through which relationships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLink {
    pub group: String,
    /// Label node to course
    pub label_edge: RelationshipKind,
    /// Profile to course
    pub entity_edge: RelationshipKind,
    /// Edge property holding the number of matching labels
    pub count_property: String,
}

impl GroupLink {
    pub fn skills(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            label_edge: RelationshipKind::TaughtIn,
            entity_edge: RelationshipKind::RelevantCourse,
            count_property: "matching_skills".to_string(),
        }
    }

    pub fn knowledge(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            label_edge: RelationshipKind::CoveredIn,
            entity_edge: RelationshipKind::TeachesKnowledge,
            count_property: "matching_knowledge".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationOptions {
    pub course: EntityMapping,
    /// Course columns searched for label names
    pub match_columns: Vec<String>,
    pub profile: EntityMapping,
    pub links: Vec<GroupLink>,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            course: EntityMapping::new("Course", "title").with_key_column("course_title"),
            match_columns: vec!["course_title".to_string(), "description".to_string()],
            profile: EntityMapping::new("Profile", "title").with_key_column("profile_title"),
            links: vec![GroupLink::skills("skills"), GroupLink::knowledge("knowledge")],
        }
    }
}

/// Distinct courses with their lower-cased match text
struct Courses {
    refs: Vec<NodeRef>,
    texts: Vec<String>,
}

impl Courses {
    fn from_table(table: &Table, options: &IntegrationOptions) -> Result<Self> {
        let columns = table.resolve_columns(&options.match_columns)?;
        let mut seen = AHashSet::with_capacity(table.len());
        let mut courses = Courses {
            refs: Vec::new(),
            texts: Vec::new(),
        };
        for (i, record) in table.records().iter().enumerate() {
            let meta = MetadataRecord::row(i, record.row_index, "");
            let key = entity_key(&meta, Some(table), options.course.key_column.as_deref());
            if !seen.insert(key.clone()) {
                continue;
            }
            let text: Vec<String> = columns
                .iter()
                .filter_map(|c| table.value(record.row_index, c))
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
            courses.refs.push(NodeRef::new(
                options.course.label.clone(),
                options.course.key_property.clone(),
                key,
            ));
            courses.texts.push(text.join("\n"));
        }
        Ok(courses)
    }

    /// Indices of the courses mentioning `label`.
    fn mentioning(&self, label: &str) -> Vec<usize> {
        let needle = label.to_lowercase();
        self.texts
            .iter()
            .enumerate()
            .filter(|(_, text)| text.contains(needle.as_str()))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Default)]
struct Endpoints {
    seen: AHashSet<NodeRef>,
    nodes: Vec<GraphNode>,
}

impl Endpoints {
    fn add(&mut self, node: &NodeRef) {
        if self.seen.insert(node.clone()) {
            self.nodes.push(GraphNode::new(node.label.clone(), node.key_property.clone(), node.key.clone()));
        }
    }
}

impl GraphPlan {
    /// Label-to-course and profile-to-course edges between two existing graphs.
    pub fn integration(
        courses: &Table,
        profiles: &AttributeTable,
        profile_table: Option<&Table>,
        options: &IntegrationOptions,
    ) -> Result<Self> {
        options.course.validate()?;
        options.profile.validate()?;
        let courses = Courses::from_table(courses, options)?;

        // first occurrence of each profile key wins
        let mut seen = AHashSet::with_capacity(profiles.len());
        let distinct: Vec<(NodeRef, usize)> = profiles
            .metadata()
            .iter()
            .enumerate()
            .filter_map(|(i, meta)| {
                let key = entity_key(meta, profile_table, options.profile.key_column.as_deref());
                seen.insert(key.clone()).then(|| {
                    (
                        NodeRef::new(options.profile.label.clone(), options.profile.key_property.clone(), key),
                        i,
                    )
                })
            })
            .collect();

        let mut endpoints = Endpoints::default();
        let mut label_edges = Vec::new();
        let mut entity_edges = Vec::new();

        for link in &options.links {
            if !profiles.groups().contains(&link.group) {
                debug!(group = %link.group, "attribute group not present, link skipped");
                continue;
            }
            let schema = GroupSchema::for_group(&link.group);

            let labels: BTreeSet<&str> = distinct
                .iter()
                .filter_map(|(_, i)| profiles.sets()[*i].group(&link.group))
                .flat_map(|set| set.iter().map(String::as_str))
                .filter(|label| !label.is_empty())
                .collect();
            let matches: AHashMap<&str, Vec<usize>> =
                labels.iter().map(|label| (*label, courses.mentioning(label))).collect();

            for label in &labels {
                let label_ref = NodeRef::new(schema.node_label.clone(), GroupSchema::LABEL_KEY, *label);
                for &course in &matches[label] {
                    endpoints.add(&label_ref);
                    endpoints.add(&courses.refs[course]);
                    label_edges.push(GraphEdge::new(
                        label_ref.clone(),
                        courses.refs[course].clone(),
                        link.label_edge.clone(),
                    ));
                }
            }

            for (profile, i) in &distinct {
                let Some(set) = profiles.sets()[*i].group(&link.group) else {
                    continue;
                };
                let mut counts: BTreeMap<usize, u64> = BTreeMap::new();
                for label in set {
                    for &course in matches.get(label.as_str()).map(Vec::as_slice).unwrap_or_default() {
                        *counts.entry(course).or_default() += 1;
                    }
                }
                for (course, count) in counts {
                    endpoints.add(profile);
                    endpoints.add(&courses.refs[course]);
                    entity_edges.push(
                        GraphEdge::new(profile.clone(), courses.refs[course].clone(), link.entity_edge.clone())
                            .with_property(link.count_property.clone(), Value::from(count)),
                    );
                }
            }
        }

        info!(
            courses = courses.refs.len(),
            profiles = distinct.len(),
            label_edges = label_edges.len(),
            profile_edges = entity_edges.len(),
            "integration planned"
        );
        let mut plan = GraphPlan {
            owned_labels: Vec::new(),
            nodes: endpoints.nodes,
            edges: label_edges,
        };
        plan.edges.extend(entity_edges);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgraph_core::AttributeSet;

    const COURSES: &str = "\
course_title,description
Python for Analysts,Write scripts and query SQL databases
Network Defense,Firewalls and risk management
Watercolor,Brush techniques
Python for Analysts,Duplicate row
";

    fn profiles() -> (AttributeTable, Table) {
        let table = Table::from_csv_str("profile_title,key_skills,key_knowledge\nAnalyst,x,y\nAuditor,x,y\n").unwrap();
        let sets = vec![
            AttributeSet::new()
                .with_group("skills", ["python", "sql", "painting"])
                .with_group("knowledge", ["risk"]),
            AttributeSet::new()
                .with_group("skills", Vec::<&str>::new())
                .with_group("knowledge", ["risk", "firewalls"]),
        ];
        let metadata = (0..2).map(|i| MetadataRecord::attributes(i, i, "")).collect();
        let attributes =
            AttributeTable::new(sets, metadata, vec!["skills".to_string(), "knowledge".to_string()]).unwrap();
        (attributes, table)
    }

    fn edges_of<'a>(plan: &'a GraphPlan, kind: &RelationshipKind) -> Vec<(&'a str, &'a str)> {
        plan.edges
            .iter()
            .filter(|e| &e.kind == kind)
            .map(|e| (e.source.key.as_str(), e.target.key.as_str()))
            .collect()
    }

    #[test]
    fn test_labels_link_to_mentioning_courses() {
        let courses = Table::from_csv_str(COURSES).unwrap();
        let (attributes, table) = profiles();
        let plan = GraphPlan::integration(&courses, &attributes, Some(&table), &IntegrationOptions::default()).unwrap();

        assert_eq!(
            edges_of(&plan, &RelationshipKind::TaughtIn),
            vec![("python", "Python for Analysts"), ("sql", "Python for Analysts")]
        );
        assert_eq!(
            edges_of(&plan, &RelationshipKind::CoveredIn),
            vec![("firewalls", "Network Defense"), ("risk", "Network Defense")]
        );
        assert!(plan.owned_labels.is_empty());
    }

    #[test]
    fn test_profiles_carry_matching_counts() {
        let courses = Table::from_csv_str(COURSES).unwrap();
        let (attributes, table) = profiles();
        let plan = GraphPlan::integration(&courses, &attributes, Some(&table), &IntegrationOptions::default()).unwrap();

        let relevant: Vec<_> = plan
            .edges
            .iter()
            .filter(|e| e.kind == RelationshipKind::RelevantCourse)
            .collect();
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].source.key, "Analyst");
        assert_eq!(relevant[0].properties["matching_skills"], 2);

        let teaches = edges_of(&plan, &RelationshipKind::TeachesKnowledge);
        assert_eq!(teaches, vec![("Analyst", "Network Defense"), ("Auditor", "Network Defense")]);
        let auditor = plan
            .edges
            .iter()
            .find(|e| e.kind == RelationshipKind::TeachesKnowledge && e.source.key == "Auditor")
            .unwrap();
        assert_eq!(auditor.properties["matching_knowledge"], 2);
    }

    #[test]
    fn test_only_linked_nodes_are_planned() {
        let courses = Table::from_csv_str(COURSES).unwrap();
        let (attributes, table) = profiles();
        let plan = GraphPlan::integration(&courses, &attributes, Some(&table), &IntegrationOptions::default()).unwrap();

        let keys: BTreeSet<(&str, &str)> = plan.nodes.iter().map(|n| (n.label(), n.key())).collect();
        assert!(!keys.contains(&("Course", "Watercolor")));
        assert!(!keys.contains(&("Skill", "painting")));
        assert!(keys.contains(&("Profile", "Auditor")));
        assert_eq!(plan.nodes.len(), keys.len());
        assert!(plan.nodes.iter().all(|n| n.properties.is_empty()));
    }

    #[test]
    fn test_skipped_link_and_missing_match_columns() {
        let courses = Table::from_csv_str(COURSES).unwrap();
        let (attributes, table) = profiles();
        let options = IntegrationOptions {
            links: vec![GroupLink::knowledge("knowledge")],
            ..Default::default()
        };
        let plan = GraphPlan::integration(&courses, &attributes, Some(&table), &options).unwrap();
        assert!(edges_of(&plan, &RelationshipKind::TaughtIn).is_empty());

        let options = IntegrationOptions {
            match_columns: vec!["syllabus".to_string()],
            ..Default::default()
        };
        assert!(GraphPlan::integration(&courses, &attributes, Some(&table), &options).is_err());
    }
}
