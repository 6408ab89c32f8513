//! Feature extraction
//!
//! Turns table records into the inputs of a representation: composed texts
//! (row and cell mode, encoded later by the [`BatchEmbedder`](crate::BatchEmbedder))
//! or attribute sets (categorical mode, used directly).
//!
//! Column choice is resolved once, when the extractor is planned against a
//! table, and reused for every record.

use simgraph_core::config::ROW_SEPARATOR;
use simgraph_core::{
    AttributeGroup, AttributeSet, AttributeTable, ColumnClassification, Error, ExtractConfig,
    ExtractMode, LabelDelimiter, MetadataRecord, Record, Result, Table,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Leading glyphs stripped from line-delimited labels
const BULLETS: &[char] = &['•', '-', '*', '○', '·'];

/// Texts ready for encoding, aligned with their metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedTexts {
    pub texts: Vec<String>,
    pub metadata: Vec<MetadataRecord>,
}

impl PreparedTexts {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    fn push(&mut self, text: String, meta: MetadataRecord) {
        self.texts.push(text);
        self.metadata.push(meta);
    }

    /// Keep the first `n` items.
    pub fn truncate(&mut self, n: usize) {
        self.texts.truncate(n);
        self.metadata.truncate(n);
    }
}

/// Extractor bound to the resolved columns of one table
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractConfig,
    text_columns: Vec<(usize, String)>,
    groups: Vec<(usize, AttributeGroup)>,
}

impl FeatureExtractor {
    /// Resolve configured (or auto-detected) columns against `table`.
    pub fn plan(table: &Table, config: ExtractConfig) -> Result<Self> {
        config.validate()?;
        let classification = ColumnClassification::classify(table, config.delimiter.chars());
        for (column, kind) in classification.iter() {
            debug!(column, ?kind, "column classified");
        }

        let mut text_columns = Vec::new();
        let mut groups = Vec::new();

        match config.mode {
            ExtractMode::Row | ExtractMode::Cell => {
                let names = if config.columns.is_empty() {
                    let detected = classification.string_columns();
                    if detected.is_empty() {
                        warn!("no text-like columns detected, using all columns");
                        table.columns().to_vec()
                    } else {
                        detected
                    }
                } else {
                    table.resolve_columns(&config.columns)?
                };
                text_columns = index_columns(table, names);
                info!(columns = ?text_columns.iter().map(|(_, c)| c).collect::<Vec<_>>(), "text columns");
            }
            ExtractMode::Categorical => {
                let configured = if config.groups.is_empty() {
                    classification
                        .categorical_columns()
                        .into_iter()
                        .map(|c| AttributeGroup::new(c.clone(), c))
                        .collect()
                } else {
                    config.groups.clone()
                };
                for group in configured {
                    match table.find_column(&group.column) {
                        Some(idx) => groups.push((idx, group)),
                        None => warn!(group = %group.name, column = %group.column, "attribute column not found, skipping"),
                    }
                }
                if groups.is_empty() {
                    return Err(Error::Input("no usable attribute columns".to_string()));
                }
                info!(groups = ?groups.iter().map(|(_, g)| &g.name).collect::<Vec<_>>(), "attribute groups");
            }
        }

        Ok(Self {
            config,
            text_columns,
            groups,
        })
    }

    pub fn mode(&self) -> ExtractMode {
        self.config.mode
    }

    pub fn text_columns(&self) -> impl Iterator<Item = &str> {
        self.text_columns.iter().map(|(_, c)| c.as_str())
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|(_, g)| g.name.clone()).collect()
    }

    /// Composed text of one record in row mode, `None` when nothing is left.
    pub fn row_text(&self, record: &Record) -> Option<String> {
        let parts: Vec<String> = self
            .text_columns
            .iter()
            .filter_map(|(idx, name)| {
                let value = record.value(*idx)?.trim();
                (!value.is_empty()).then(|| format!("{name}: {value}"))
            })
            .collect();
        let text = truncate_chars(parts.join(ROW_SEPARATOR), self.config.max_chars);
        (!text.trim().is_empty()).then_some(text)
    }

    /// Non-empty cells of one record in cell mode, `(column, text)` in column order.
    pub fn cell_texts(&self, record: &Record) -> Vec<(String, String)> {
        self.text_columns
            .iter()
            .filter_map(|(idx, name)| {
                let value = record.value(*idx)?.trim();
                let text = truncate_chars(value.to_string(), self.config.max_chars);
                (!text.is_empty()).then(|| (name.clone(), text))
            })
            .collect()
    }

    /// Attribute set of one record; empty cells give empty groups.
    pub fn attributes(&self, record: &Record) -> AttributeSet {
        let mut set = AttributeSet::new();
        for (idx, group) in &self.groups {
            let labels = record
                .value(*idx)
                .map(|v| parse_labels(v, self.config.delimiter))
                .unwrap_or_default();
            set.insert_group(group.name.clone(), labels);
        }
        set
    }

    /// Prepare every text of the table, in record order.
    pub fn prepare_texts(&self, table: &Table) -> Result<PreparedTexts> {
        let mut prepared = PreparedTexts::default();
        match self.config.mode {
            ExtractMode::Row => {
                for record in table.records() {
                    if let Some(text) = self.row_text(record) {
                        let meta = MetadataRecord::row(prepared.len(), record.row_index, text.clone());
                        prepared.push(text, meta);
                    }
                }
            }
            ExtractMode::Cell => {
                for record in table.records() {
                    for (column, text) in self.cell_texts(record) {
                        let meta = MetadataRecord::cell(prepared.len(), record.row_index, column, text.clone());
                        prepared.push(text, meta);
                    }
                }
            }
            ExtractMode::Categorical => {
                return Err(Error::InvalidConfig(
                    "categorical extraction produces attribute sets, not texts".to_string(),
                ))
            }
        }
        debug!(texts = prepared.len(), records = table.len(), "texts prepared");
        Ok(prepared)
    }

    /// One attribute set per record, never omitted.
    pub fn extract_attributes(&self, table: &Table) -> Result<AttributeTable> {
        if self.config.mode != ExtractMode::Categorical {
            return Err(Error::InvalidConfig(
                "attribute extraction requires categorical mode".to_string(),
            ));
        }
        let mut sets = Vec::with_capacity(table.len());
        let mut metadata = Vec::with_capacity(table.len());
        for (index, record) in table.records().iter().enumerate() {
            let set = self.attributes(record);
            metadata.push(MetadataRecord::attributes(index, record.row_index, set.describe()));
            sets.push(set);
        }
        AttributeTable::new(sets, metadata, self.group_names())
    }
}

fn index_columns(table: &Table, names: Vec<String>) -> Vec<(usize, String)> {
    names
        .into_iter()
        .filter_map(|name| table.column_index(&name).map(|idx| (idx, name)))
        .collect()
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: String, max_chars: Option<usize>) -> String {
    match max_chars {
        Some(max) if max > 0 && text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}

/// Split a delimited cell into trimmed, lower-cased, unique labels.
pub fn parse_labels(value: &str, delimiter: LabelDelimiter) -> BTreeSet<String> {
    value
        .split(delimiter.chars())
        .map(|item| {
            let item = item.trim();
            match delimiter {
                LabelDelimiter::Lines => item.trim_start_matches(BULLETS).trim(),
                LabelDelimiter::Comma => item,
            }
        })
        .filter(|item| !item.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgraph_core::SourceKind;

    const COURSES: &str = "\
id,course_title,description,extracted_skills
1,Intro to Python,Learn the basics,\"Python, SQL\"
2,Java Fundamentals,,\"java, python\"
3,,,
";

    fn table() -> Table {
        Table::from_csv_str(COURSES).unwrap()
    }

    fn config(mode: ExtractMode, columns: &[&str]) -> ExtractConfig {
        ExtractConfig {
            mode,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_row_mode_composes_and_skips_empty() {
        let table = table();
        let extractor =
            FeatureExtractor::plan(&table, config(ExtractMode::Row, &["course_title", "description"])).unwrap();
        let prepared = extractor.prepare_texts(&table).unwrap();

        assert_eq!(prepared.len(), 2);
        assert_eq!(
            prepared.texts[0],
            "course_title: Intro to Python | description: Learn the basics"
        );
        assert_eq!(prepared.texts[1], "course_title: Java Fundamentals");
        assert_eq!(prepared.metadata[1].row_index, 1);
        assert_eq!(prepared.metadata[1].index, 1);
        assert_eq!(prepared.metadata[1].source, SourceKind::Row);
    }

    #[test]
    fn test_cell_mode_one_empty_one_populated() {
        let table = table();
        let extractor =
            FeatureExtractor::plan(&table, config(ExtractMode::Cell, &["course_title", "description"])).unwrap();
        let record = &table.records()[1];
        let cells = extractor.cell_texts(record);

        assert_eq!(cells, vec![("course_title".to_string(), "Java Fundamentals".to_string())]);

        let prepared = extractor.prepare_texts(&table).unwrap();
        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared.metadata[2].column.as_deref(), Some("course_title"));
        assert_eq!(prepared.metadata[2].row_index, 1);
    }

    #[test]
    fn test_truncation_counts_chars() {
        assert_eq!(truncate_chars("héllo wörld".to_string(), Some(5)), "héllo");
        assert_eq!(truncate_chars("short".to_string(), Some(50)), "short");
        assert_eq!(truncate_chars("unbounded".to_string(), None), "unbounded");
    }

    #[test]
    fn test_auto_detect_uses_schema_order() {
        let table = table();
        let extractor = FeatureExtractor::plan(&table, config(ExtractMode::Row, &[])).unwrap();
        let cols: Vec<&str> = extractor.text_columns().collect();
        assert_eq!(cols, vec!["course_title", "description", "extracted_skills"]);
    }

    #[test]
    fn test_categorical_mode_empty_field_gives_empty_set() {
        let table = table();
        let cfg = ExtractConfig {
            mode: ExtractMode::Categorical,
            groups: vec![AttributeGroup::new("skills", "extracted_skills")],
            ..Default::default()
        };
        let extractor = FeatureExtractor::plan(&table, cfg).unwrap();
        let attrs = extractor.extract_attributes(&table).unwrap();

        assert_eq!(attrs.len(), 3);
        let first: Vec<&str> = attrs.sets()[0].group("skills").unwrap().iter().map(String::as_str).collect();
        assert_eq!(first, vec!["python", "sql"]);
        assert!(attrs.sets()[2].group("skills").unwrap().is_empty());
        assert_eq!(attrs.metadata()[2].row_index, 2);
    }

    #[test]
    fn test_parse_line_labels_strips_bullets() {
        let labels = parse_labels("• Risk management\n- Threat analysis\n\n* risk management\r\n", LabelDelimiter::Lines);
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["risk management", "threat analysis"]);
    }

    #[test]
    fn test_missing_columns_is_input_error() {
        let table = table();
        let err = FeatureExtractor::plan(&table, config(ExtractMode::Row, &["nope"])).unwrap_err();
        assert!(matches!(err, Error::Input(_)));

        let cfg = ExtractConfig {
            mode: ExtractMode::Categorical,
            groups: vec![AttributeGroup::new("skills", "nope")],
            ..Default::default()
        };
        assert!(FeatureExtractor::plan(&table, cfg).is_err());
    }
}
