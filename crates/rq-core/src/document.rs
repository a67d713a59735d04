//! # Search Result Rows
//!
//! A hit as returned by the service plus the conveniences the default
//! columns display, derived once at ingestion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::lookup_path;
use crate::{scalar_to_string, Document};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub doc: Document,
    pub timestamp: Option<String>,
    pub parser: Option<String>,
    pub message: Option<String>,
    pub score: Option<f64>,
}

impl SearchResult {
    /// `offset` is the absolute position of the hit in the result set and
    /// only serves as a fallback id.
    pub fn from_hit(doc: Document, offset: usize) -> Self {
        let id = first_scalar(&doc, &["/_id", "/id", "/event/id"])
            .unwrap_or_else(|| format!("hit-{}", offset));
        let timestamp = first_scalar(&doc, &["/@timestamp", "/timestamp"]);
        let parser = first_scalar(&doc, &["/source/parser", "/parser"]);
        let message = first_scalar(&doc, &["/message"]);
        let score = ["/_score", "/score"]
            .iter()
            .filter_map(|p| doc.pointer(p))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            });

        Self {
            id,
            doc,
            timestamp,
            parser,
            message,
            score,
        }
    }

    /// Display value of a column: derived fields for the defaults, the
    /// document path otherwise.
    pub fn column_value(&self, field: &str) -> Option<String> {
        match field {
            "timestamp" => self.timestamp.clone(),
            "parser" => self.parser.clone(),
            "message" => self.message.clone(),
            "score" => self.score.map(|s| format!("{:.3}", s)),
            path => lookup_path(&self.doc, path),
        }
    }
}

fn first_scalar(doc: &Document, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| doc.pointer(p))
        .find_map(scalar_to_string)
}
