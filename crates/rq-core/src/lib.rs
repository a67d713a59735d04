//! # rq-core — The "Model" of REQUIEM
//!
//! Everything the event explorer knows, and nothing it has to wait for.
//! This crate is synchronous and side-effect free: the query state reducer,
//! the field catalog sampler, the filter builder, the column configuration,
//! and the wire contracts of the remote search service.
//!
//! Documents returned by the service are kept as [`serde_json::Value`], a
//! recursive tagged value, so every traversal in here is a total match over
//! null / bool / number / string / array / object.

pub mod columns;
pub mod document;
pub mod fields;
pub mod filters;
pub mod state;
pub mod time;
pub mod wire;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use columns::{ColumnConfig, ColumnDefinition, DEFAULT_COLUMNS};
pub use document::SearchResult;
pub use fields::{build_field_catalog, flatten_document, FieldCatalog, FieldEntry, FieldSample};
pub use filters::{FieldFilter, FilterOperator, FilterPatch, FilterRow, FilterSet};
pub use state::{Mutation, QueryState, QueryStateStore};

/// A raw event document as stored by the search service.
pub type Document = serde_json::Value;

/// Store generation. Monotonically increasing, bumped by every mutation.
pub type Generation = u64;

// =============================================================================
// Errors
// =============================================================================

/// Rejected query state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid page size {0} (expected 25, 50 or 100)")]
    InvalidPageSize(usize),

    #[error("Invalid aggregation size {0} (expected 1..=100)")]
    InvalidAggregationSize(usize),

    #[error("Invalid timeline interval '{0}' (expected e.g. 1m, 1h, 1d)")]
    InvalidInterval(String),

    #[error("Filter '{0}' not found")]
    UnknownFilter(String),

    #[error("Page {0} is out of range")]
    PageOutOfRange(usize),
}

// =============================================================================
// Small shared types
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Allowed result page sizes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "usize", into = "usize")]
pub enum PageSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl PageSize {
    pub const fn get(self) -> usize {
        match self {
            Self::Small => 25,
            Self::Medium => 50,
            Self::Large => 100,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = StateError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            25 => Ok(Self::Small),
            50 => Ok(Self::Medium),
            100 => Ok(Self::Large),
            other => Err(StateError::InvalidPageSize(other)),
        }
    }
}

impl From<PageSize> for usize {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

/// Inclusive time bounds, as strings the search service understands
/// (RFC 3339 or epoch millis).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
}

impl TimeRange {
    pub fn new(gte: Option<String>, lte: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            gte: clean(gte),
            lte: clean(lte),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    /// The range as it goes on the wire: absent when unbounded.
    pub fn to_wire(&self) -> Option<TimeRange> {
        if self.is_empty() {
            None
        } else {
            Some(self.clone())
        }
    }
}

/// One facet value of the aggregated field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationBucket {
    pub key: String,
    pub count: u64,
}

/// One date-histogram slot of the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineBucket {
    pub timestamp: String,
    pub count: u64,
}

/// Stringify a scalar the way the explorer displays and filters on it.
///
/// Returns `None` for null, arrays and objects.
pub fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_accepts_only_known_sizes() {
        assert_eq!(PageSize::try_from(25), Ok(PageSize::Small));
        assert_eq!(PageSize::try_from(100).map(PageSize::get), Ok(100));
        assert_eq!(PageSize::try_from(30), Err(StateError::InvalidPageSize(30)));
    }

    #[test]
    fn test_time_range_blank_bounds_are_dropped() {
        let range = TimeRange::new(Some("  ".into()), None);
        assert!(range.is_empty());
        assert_eq!(range.to_wire(), None);

        let range = TimeRange::new(Some("2024-01-01T00:00:00Z".into()), None);
        let json = serde_json::to_value(range.to_wire()).unwrap();
        assert_eq!(json, serde_json::json!({ "gte": "2024-01-01T00:00:00Z" }));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&serde_json::json!(42)), Some("42".into()));
        assert_eq!(scalar_to_string(&serde_json::json!(true)), Some("true".into()));
        assert_eq!(scalar_to_string(&serde_json::json!(null)), None);
        assert_eq!(scalar_to_string(&serde_json::json!([1])), None);
    }
}
