//! Tabular source data.
//!
//! A [`Table`] is a headered CSV loaded once per run. Every [`Record`] keeps
//! its original 0-based row index so representations can always be traced
//! back to the row that produced them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Number of non-missing values inspected per column when classifying.
pub const CLASSIFY_SAMPLE: usize = 100;

/// Label segments longer than this are treated as prose, not a label list.
const MAX_LABEL_LEN: usize = 48;

const MISSING_MARKERS: &[&str] = &["nan", "null", "none", "na", "n/a", "<na>", "#n/a"];

/// Whether a raw cell counts as missing (empty or a NaN-like marker).
#[inline]
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || MISSING_MARKERS
            .iter()
            .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}

/// One row of source data
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row_index: usize,
    values: Vec<String>,
}

impl Record {
    pub fn new(row_index: usize, values: Vec<String>) -> Self {
        Self { row_index, values }
    }

    /// Raw cell at a column position, `None` when missing.
    #[inline]
    pub fn value(&self, column: usize) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !is_missing(v))
    }
}

/// A headered table of string cells
#[derive(Debug, Clone)]
pub struct Table {
    source: Option<PathBuf>,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            source: None,
            columns,
            records,
        }
    }

    /// Load a CSV file. Rows whose field count differs from the header are skipped.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::input_file(path, "file not found"));
        }
        let file = std::fs::File::open(path).map_err(|e| Error::input_file(path, e.to_string()))?;
        let mut table = Self::from_reader(file).map_err(|e| match e {
            Error::Input(message) => Error::input_file(path, message),
            other => other,
        })?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    pub fn from_csv_str(data: &str) -> Result<Self> {
        Self::from_reader(data.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() {
            return Err(Error::Input("no columns in header".to_string()));
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (row_index, row) in rdr.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(row_index, error = %e, "skipping unreadable row");
                    skipped += 1;
                    continue;
                }
            };
            if row.len() != columns.len() {
                warn!(row_index, fields = row.len(), expected = columns.len(), "skipping malformed row");
                skipped += 1;
                continue;
            }
            records.push(Record::new(row_index, row.iter().map(String::from).collect()));
        }

        if records.is_empty() {
            return Err(Error::Input("empty dataset".to_string()));
        }
        debug!(rows = records.len(), skipped, columns = columns.len(), "table loaded");

        Ok(Self {
            source: None,
            columns,
            records,
        })
    }

    #[inline]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact column position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column position, exact match first then case-insensitive.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.column_index(name).or_else(|| {
            self.columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
        })
    }

    /// Record by its original row index.
    pub fn record(&self, row_index: usize) -> Option<&Record> {
        match self.records.binary_search_by_key(&row_index, |r| r.row_index) {
            Ok(pos) => self.records.get(pos),
            Err(_) => None,
        }
    }

    /// Cell value by original row index and column name.
    pub fn value(&self, row_index: usize, column: &str) -> Option<&str> {
        let col = self.find_column(column)?;
        self.record(row_index)?.value(col)
    }

    /// Resolve requested column names against the header.
    ///
    /// Unknown names are skipped with a warning; resolving none is an input error.
    pub fn resolve_columns(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(requested.len());
        for name in requested {
            match self.find_column(name) {
                Some(idx) => {
                    let column = self.columns[idx].clone();
                    if !resolved.contains(&column) {
                        resolved.push(column);
                    }
                }
                None => warn!(column = %name, "column not found, skipping"),
            }
        }
        if resolved.is_empty() {
            return Err(Error::Input(format!(
                "none of the requested columns exist: {}",
                requested.join(", ")
            )));
        }
        Ok(resolved)
    }
}

/// How a column participates in feature extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Free text, embedded as dense vectors
    Text,
    /// Delimited label lists, parsed into attribute sets
    Categorical,
    /// Numeric, boolean or empty columns
    Ignored,
}

/// Per-column classification, computed once and passed forward.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnClassification {
    columns: Vec<(String, ColumnKind)>,
}

impl ColumnClassification {
    /// Classify every column in schema order.
    pub fn classify(table: &Table, delimiters: &[char]) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let sample: Vec<&str> = table
                    .records()
                    .iter()
                    .filter_map(|r| r.value(idx))
                    .take(CLASSIFY_SAMPLE)
                    .collect();
                (name.clone(), classify_values(&sample, delimiters))
            })
            .collect();
        Self { columns }
    }

    pub fn kind(&self, column: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, kind)| *kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Every string-typed column (text or categorical), schema order.
    pub fn string_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, kind)| *kind != ColumnKind::Ignored)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, kind)| *kind == ColumnKind::Categorical)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn looks_scalar(value: &str) -> bool {
    let v = value.trim();
    v.parse::<f64>().is_ok() || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")
}

fn looks_like_label_list(value: &str, delimiters: &[char]) -> bool {
    if !value.contains(delimiters) {
        return false;
    }
    value
        .split(delimiters)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .all(|s| s.chars().count() <= MAX_LABEL_LEN)
}

fn classify_values(sample: &[&str], delimiters: &[char]) -> ColumnKind {
    if sample.is_empty() {
        return ColumnKind::Ignored;
    }
    let majority = sample.len() / 2;
    let scalar = sample.iter().filter(|v| looks_scalar(v)).count();
    if scalar > majority {
        return ColumnKind::Ignored;
    }
    let lists = sample
        .iter()
        .filter(|v| looks_like_label_list(v, delimiters))
        .count();
    if !delimiters.is_empty() && lists > majority {
        ColumnKind::Categorical
    } else {
        ColumnKind::Text
    }
}
