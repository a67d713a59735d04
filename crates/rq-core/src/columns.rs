//! # Column Configuration
//!
//! Ordered list of visible result columns. Two invariants hold after every
//! operation:
//! - the list is never empty;
//! - every entry is a default column or a field of the current catalog.

use serde::{Deserialize, Serialize};

/// `(field, label)` of the columns every result row can fill.
pub const DEFAULT_COLUMNS: [(&str, &str); 4] = [
    ("timestamp", "Timestamp"),
    ("parser", "Parser"),
    ("message", "Message"),
    ("score", "Score"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub field: String,
    pub label: String,
}

impl ColumnDefinition {
    pub fn for_field(field: &str) -> Self {
        let label = DEFAULT_COLUMNS
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| field.to_string());
        Self {
            field: field.to_string(),
            label,
        }
    }
}

pub fn is_default_column(field: &str) -> bool {
    DEFAULT_COLUMNS.iter().any(|(f, _)| *f == field)
}

fn default_visible() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|(f, _)| (*f).to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnConfig {
    visible: Vec<String>,
    /// Fields discovered on the current result page.
    available: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            visible: default_visible(),
            available: Vec::new(),
        }
    }
}

impl ColumnConfig {
    /// Start from a preferred column order. Entries that are not default
    /// columns cannot be validated yet and are dropped until a catalog
    /// arrives.
    pub fn with_visible<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();
        config.set_visible(fields);
        config
    }

    /// Replace the visible list, keeping first occurrences of known fields.
    /// Falls back to the defaults when nothing usable is left.
    pub fn set_visible<I, S>(&mut self, fields: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = std::mem::take(&mut self.visible);
        for field in fields {
            let field = field.into();
            if !self.visible.contains(&field) {
                self.visible.push(field);
            }
        }
        self.repair();
        before != self.visible
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn is_visible(&self, field: &str) -> bool {
        self.visible.iter().any(|f| f == field)
    }

    pub fn is_known(&self, field: &str) -> bool {
        is_default_column(field) || self.available.iter().any(|f| f == field)
    }

    pub fn definitions(&self) -> Vec<ColumnDefinition> {
        self.visible
            .iter()
            .map(|f| ColumnDefinition::for_field(f))
            .collect()
    }

    /// Defaults first, then discovered fields, without duplicates.
    pub fn choices(&self) -> Vec<ColumnDefinition> {
        let mut out: Vec<ColumnDefinition> = DEFAULT_COLUMNS
            .iter()
            .map(|(f, _)| ColumnDefinition::for_field(f))
            .collect();
        for field in &self.available {
            if !is_default_column(field) {
                out.push(ColumnDefinition::for_field(field));
            }
        }
        out
    }

    /// Hide a visible column (never the last one) or append a known one.
    /// Returns whether the list changed.
    pub fn toggle(&mut self, field: &str) -> bool {
        if let Some(idx) = self.visible.iter().position(|f| f == field) {
            if self.visible.len() == 1 {
                return false;
            }
            self.visible.remove(idx);
            return true;
        }
        if !self.is_known(field) {
            return false;
        }
        self.visible.push(field.to_string());
        true
    }

    /// Move `source` to the slot `target` occupies, shifting the columns in
    /// between. Both indices are taken before the removal, so moving left
    /// lands just before `target` and moving right lands just after it.
    pub fn reorder(&mut self, source: &str, target: &str) -> bool {
        if source == target {
            return false;
        }
        let (Some(from), Some(to)) = (
            self.visible.iter().position(|f| f == source),
            self.visible.iter().position(|f| f == target),
        ) else {
            return false;
        };
        let moved = self.visible.remove(from);
        self.visible.insert(to, moved);
        true
    }

    pub fn reset(&mut self) {
        self.visible = default_visible();
    }

    /// Replace the discovered field set and prune columns that no longer
    /// exist. Returns whether the visible list changed.
    pub fn reconcile(&mut self, available: Vec<String>) -> bool {
        self.available = available;
        let before = self.visible.clone();
        self.repair();
        before != self.visible
    }

    fn repair(&mut self) {
        let available = &self.available;
        self.visible
            .retain(|f| is_default_column(f) || available.iter().any(|a| a == f));
        if self.visible.is_empty() {
            self.visible = default_visible();
        }
    }
}
