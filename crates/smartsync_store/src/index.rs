//! Index specifications for soups.

use serde::{Deserialize, Serialize};

/// Type of an indexed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Text values.
    String,
    /// Integer values.
    Integer,
    /// Floating point values.
    Floating,
    /// Text values searchable by token.
    #[serde(rename = "full_text")]
    FullText,
}

/// An indexed path within the records of a soup.
///
/// String and numeric indexes are advisory for the bundled stores: every
/// path can be queried by exact, range or like queries. Match queries need
/// a [`IndexType::FullText`] index on their path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Dotted path into the record (e.g. `attributes.type`).
    pub path: String,
    /// Declared type of the values at `path`.
    #[serde(rename = "type")]
    pub index_type: IndexType,
}

impl IndexSpec {
    /// Creates a new index spec.
    pub fn new(path: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            path: path.into(),
            index_type,
        }
    }

    /// Creates a string index spec.
    pub fn string(path: impl Into<String>) -> Self {
        Self::new(path, IndexType::String)
    }

    /// Creates an integer index spec.
    pub fn integer(path: impl Into<String>) -> Self {
        Self::new(path, IndexType::Integer)
    }

    /// Creates a full-text index spec.
    pub fn full_text(path: impl Into<String>) -> Self {
        Self::new(path, IndexType::FullText)
    }
}
