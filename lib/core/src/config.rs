//! Per-component run configuration.
//!
//! Each struct is built once from CLI flags, validated, and then handed to its
//! component by value or shared reference. Nothing here is mutated mid-run.

use crate::graph::is_valid_identifier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Embedding dimension of the reference sentence encoder
pub const DEFAULT_DIMENSION: usize = 384;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 100;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const ROW_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// One text per record, fields concatenated
    Row,
    /// One text per non-empty cell
    Cell,
    /// Attribute sets parsed from delimited columns
    Categorical,
}

impl FromStr for ExtractMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "row" => Ok(ExtractMode::Row),
            "cell" => Ok(ExtractMode::Cell),
            "categorical" => Ok(ExtractMode::Categorical),
            other => Err(Error::InvalidConfig(format!("unknown extraction mode: {other}"))),
        }
    }
}

/// How a categorical cell is split into labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelDelimiter {
    /// `python, sql, java`
    Comma,
    /// One label per line, optional bullet glyphs
    Lines,
}

impl LabelDelimiter {
    pub fn chars(&self) -> &'static [char] {
        match self {
            LabelDelimiter::Comma => &[','],
            LabelDelimiter::Lines => &['\n'],
        }
    }
}

impl FromStr for LabelDelimiter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "comma" => Ok(LabelDelimiter::Comma),
            "lines" | "newline" => Ok(LabelDelimiter::Lines),
            other => Err(Error::InvalidConfig(format!("unknown label delimiter: {other}"))),
        }
    }
}

/// A named attribute group sourced from one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub name: String,
    pub column: String,
}

impl AttributeGroup {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

impl FromStr for AttributeGroup {
    type Err = Error;

    /// `skills=key_skills`, or a bare column name used as its own group name.
    fn from_str(s: &str) -> Result<Self> {
        let (name, column) = match s.split_once('=') {
            Some((name, column)) => (name.trim(), column.trim()),
            None => (s.trim(), s.trim()),
        };
        if name.is_empty() || column.is_empty() {
            return Err(Error::InvalidConfig(format!("invalid attribute group: {s:?}")));
        }
        Ok(Self::new(name, column))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub mode: ExtractMode,
    /// Text columns; empty means auto-detect
    pub columns: Vec<String>,
    /// Attribute groups for categorical mode; empty means auto-detect
    pub groups: Vec<AttributeGroup>,
    pub delimiter: LabelDelimiter,
    pub max_chars: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Row,
            columns: Vec::new(),
            groups: Vec::new(),
            delimiter: LabelDelimiter::Comma,
            max_chars: None,
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == Some(0) {
            return Err(Error::InvalidConfig("max_chars must be positive when set".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedConfig {
    pub batch_size: usize,
    pub normalize: bool,
    /// Keep only the first N representations
    pub sample: Option<usize>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            normalize: false,
            sample: None,
        }
    }
}

impl EmbedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Score used by the attribute-set metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedLabelScore {
    Count,
    Jaccard,
}

impl FromStr for SharedLabelScore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(SharedLabelScore::Count),
            "jaccard" => Ok(SharedLabelScore::Jaccard),
            other => Err(Error::InvalidConfig(format!("unknown shared-label score: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborConfig {
    pub top_k: usize,
    pub threshold: f32,
    pub score: SharedLabelScore,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            score: SharedLabelScore::Count,
        }
    }
}

impl NeighborConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be positive".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(Error::InvalidConfig("threshold must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistConfig {
    /// Delete every node carrying one of the owned labels before writing
    pub clear: bool,
    pub batch_size: usize,
    /// Keep both directions of a symmetric pair instead of one edge per pair
    pub both_directions: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            clear: false,
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            both_directions: false,
        }
    }
}

impl PersistConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Reject labels, keys and relationship names that cannot be used as graph identifiers.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("invalid {kind} identifier: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_group() {
        let g: AttributeGroup = "skills=key_skills".parse().unwrap();
        assert_eq!(g, AttributeGroup::new("skills", "key_skills"));

        let bare: AttributeGroup = "extracted_skills".parse().unwrap();
        assert_eq!(bare.name, "extracted_skills");
        assert!("=x".parse::<AttributeGroup>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(EmbedConfig { batch_size: 0, ..Default::default() }.validate().is_err());
        assert!(NeighborConfig { top_k: 0, ..Default::default() }.validate().is_err());
        assert!(NeighborConfig { threshold: f32::NAN, ..Default::default() }.validate().is_err());
        assert!(PersistConfig::default().validate().is_ok());
        assert!(!PersistConfig::default().both_directions);
        assert!(validate_identifier("label", "Course").is_ok());
        assert!(validate_identifier("label", "Course Name").is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("CELL".parse::<ExtractMode>().unwrap(), ExtractMode::Cell);
        assert_eq!("lines".parse::<LabelDelimiter>().unwrap(), LabelDelimiter::Lines);
        assert_eq!("jaccard".parse::<SharedLabelScore>().unwrap(), SharedLabelScore::Jaccard);
        assert!("fuzzy".parse::<SharedLabelScore>().is_err());
    }
}
