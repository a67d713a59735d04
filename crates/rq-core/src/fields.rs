//! # Field Catalog
//!
//! Schema sampling over the current result page. There is no schema
//! endpoint on the search service; the explorer learns which fields exist by
//! walking the documents it was just given.
//!
//! Path rules, shared by the catalog and the detail flattener:
//! - object members extend the path with `.key`;
//! - array elements stay on the array's own path (no `[i]` segments), so a
//!   sampled path is always a valid filter field;
//! - nulls are skipped entirely.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{scalar_to_string, Document};

/// One discovered field path and the first value seen for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSample {
    pub field: String,
    pub value: String,
}

/// One leaf of a single document, as shown by the detail inspector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldEntry {
    pub path: String,
    pub value: String,
}

// =============================================================================
// Catalog sampling (first occurrence wins)
// =============================================================================

/// Discover every scalar-bearing path of a page of documents.
///
/// The first value seen for a path, across the whole page, wins. Order is
/// discovery order, so running this twice over the same page yields the
/// same catalog.
pub fn build_field_catalog(docs: &[Document]) -> FieldCatalog {
    let mut sampler = Sampler::default();
    for doc in docs {
        sampler.walk("", doc);
    }
    FieldCatalog {
        samples: sampler.samples,
    }
}

#[derive(Default)]
struct Sampler {
    seen: HashSet<String>,
    samples: Vec<FieldSample>,
}

impl Sampler {
    fn record(&mut self, path: &str, value: String) {
        if path.is_empty() || self.seen.contains(path) {
            return;
        }
        self.seen.insert(path.to_string());
        self.samples.push(FieldSample {
            field: path.to_string(),
            value,
        });
    }

    fn walk(&mut self, path: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                if let Some(s) = scalar_to_string(value) {
                    self.record(path, s);
                }
            }
            Value::Array(items) => self.walk_array(path, items),
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = join_path(path, key);
                    self.walk(&child_path, child);
                }
            }
        }
    }

    /// Only the first scalar, the first object and the first nested array
    /// of an array contribute.
    fn walk_array(&mut self, path: &str, items: &[Value]) {
        let mut scalar_done = false;
        let mut object_done = false;
        let mut array_done = false;

        for item in items {
            match item {
                Value::Null => {}
                Value::Bool(_) | Value::Number(_) | Value::String(_) if !scalar_done => {
                    scalar_done = true;
                    self.walk(path, item);
                }
                Value::Object(_) if !object_done => {
                    object_done = true;
                    self.walk(path, item);
                }
                Value::Array(inner) if !array_done => {
                    array_done = true;
                    self.walk_array(path, inner);
                }
                _ => {}
            }
            if scalar_done && object_done && array_done {
                break;
            }
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

// =============================================================================
// Detail flattening (every leaf)
// =============================================================================

/// Flatten one document into every `(path, value)` leaf, without
/// de-duplication. Array elements are listed at the array's path.
pub fn flatten_document(doc: &Document) -> Vec<FieldEntry> {
    let mut out = Vec::new();
    flatten_into("", doc, &mut out);
    out
}

fn flatten_into(path: &str, value: &Value, out: &mut Vec<FieldEntry>) {
    match value {
        Value::Null => {}
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            if path.is_empty() {
                return;
            }
            if let Some(s) = scalar_to_string(value) {
                out.push(FieldEntry {
                    path: path.to_string(),
                    value: s,
                });
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(path, item, out);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(&join_path(path, key), child, out);
            }
        }
    }
}

/// First value found at `path` in a document, following the same array
/// rules as the catalog.
pub fn lookup_path(doc: &Document, path: &str) -> Option<String> {
    let mut sampler = Sampler::default();
    sampler.walk("", doc);
    sampler
        .samples
        .into_iter()
        .find(|s| s.field == path)
        .map(|s| s.value)
}

// =============================================================================
// Catalog
// =============================================================================

/// The field directory of the current result page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldCatalog {
    samples: Vec<FieldSample>,
}

impl FieldCatalog {
    pub fn samples(&self) -> &[FieldSample] {
        &self.samples
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(|s| s.field.as_str())
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields().map(str::to_string).collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.samples.iter().any(|s| s.field == field)
    }

    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.samples
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.value.as_str())
    }

    /// Case-insensitive substring search over field paths.
    pub fn search(&self, term: &str) -> Vec<&FieldSample> {
        let needle = term.trim().to_lowercase();
        self.samples
            .iter()
            .filter(|s| needle.is_empty() || s.field.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn first_field(&self) -> Option<&str> {
        self.samples.first().map(|s| s.field.as_str())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
