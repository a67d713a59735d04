//! # Wire Contracts
//!
//! Request and response bodies of the remote search service
//! (`/search/query`, `/search/aggregate`, `/search/timeline`,
//! `/search/stats/{case_id}`).
//!
//! Requests derive `PartialEq`: the explorer diffs the request it would send
//! now against the one it sent last to decide whether a fetch is due.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filters::FieldFilter;
use crate::{scalar_to_string, AggregationBucket, SortOrder, TimeRange, TimelineBucket};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Malformed response: {0}")]
    Malformed(String),
}

// =============================================================================
// Search
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub case_id: String,
    pub size: usize,
    pub from: usize,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub field_filters: Vec<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<Value>,
    #[serde(deserialize_with = "deserialize_total")]
    pub total: u64,
    #[serde(default)]
    pub took: Option<u64>,
}

/// `total` is a plain count, or OpenSearch's `{ "value": n, ... }`.
fn deserialize_total<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object { value: u64 },
    }

    Ok(match Total::deserialize(deserializer)? {
        Total::Count(n) | Total::Object { value: n } => n,
    })
}

// =============================================================================
// Aggregate
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateRequest {
    pub case_id: String,
    pub field: String,
    pub size: usize,
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_filters: Vec<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

/// Accepts `{buckets}`, `{aggregations: {buckets}}`, `{aggregations: [..]}`
/// and a single named OpenSearch aggregation under `aggregations`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value")]
pub struct AggregateResponse {
    pub buckets: Vec<AggregationBucket>,
}

impl TryFrom<Value> for AggregateResponse {
    type Error = WireError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let raw = locate_buckets(&value)
            .ok_or_else(|| WireError::Malformed("no buckets in aggregation response".into()))?;
        let buckets = raw
            .iter()
            .map(parse_bucket)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { buckets })
    }
}

fn locate_buckets(value: &Value) -> Option<&Vec<Value>> {
    if let Some(buckets) = value.get("buckets").and_then(Value::as_array) {
        return Some(buckets);
    }
    match value.get("aggregations")? {
        Value::Array(buckets) => Some(buckets),
        Value::Object(map) => map
            .get("buckets")
            .and_then(Value::as_array)
            .or_else(|| {
                map.values()
                    .find_map(|named| named.get("buckets").and_then(Value::as_array))
            }),
        _ => None,
    }
}

fn parse_bucket(raw: &Value) -> Result<AggregationBucket, WireError> {
    let key = raw
        .get("key")
        .and_then(scalar_to_string)
        .ok_or_else(|| WireError::Malformed(format!("bucket without key: {}", raw)))?;
    let count = raw
        .get("count")
        .or_else(|| raw.get("doc_count"))
        .and_then(Value::as_u64)
        .ok_or_else(|| WireError::Malformed(format!("bucket without count: {}", raw)))?;
    Ok(AggregationBucket { key, count })
}

// =============================================================================
// Timeline
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineRequest {
    pub case_id: String,
    pub interval: String,
    pub time_field: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_filters: Vec<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TimelineResponse {
    #[serde(default)]
    pub interval: Option<String>,
    pub buckets: Vec<TimelineWireBucket>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TimelineWireBucket {
    #[serde(alias = "key_as_string")]
    pub timestamp: String,
    #[serde(alias = "doc_count")]
    pub count: u64,
}

impl From<TimelineWireBucket> for TimelineBucket {
    fn from(b: TimelineWireBucket) -> Self {
        TimelineBucket {
            timestamp: b.timestamp,
            count: b.count,
        }
    }
}

// =============================================================================
// Index stats
// =============================================================================

/// Size of one case's index, as reported by `GET /search/stats/{case_id}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub case_id: String,
    pub index_name: String,
    pub document_count: u64,
    pub size_bytes: u64,
    #[serde(default)]
    pub shard_count: u64,
    #[serde(default)]
    pub replica_count: u64,
}
