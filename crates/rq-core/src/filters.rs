//! # Filter Builder
//!
//! Ordered structured filter rows and their rendering into the
//! `field_filters` payload of the search service.

use serde::{Deserialize, Serialize};

use crate::StateError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    Prefix,
    Wildcard,
    Exists,
    Missing,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 7] = [
        Self::Equals,
        Self::NotEquals,
        Self::Contains,
        Self::Prefix,
        Self::Wildcard,
        Self::Exists,
        Self::Missing,
    ];

    /// `exists` and `missing` ignore the row value.
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::Exists | Self::Missing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::Prefix => "prefix",
            Self::Wildcard => "wildcard",
            Self::Exists => "exists",
            Self::Missing => "missing",
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| format!("unknown filter operator '{}'", s.trim()))
    }
}

/// One editable filter row. Incomplete rows stay here for editing but are
/// left out of the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterRow {
    pub id: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterRow {
    pub fn is_complete(&self) -> bool {
        if self.field.trim().is_empty() {
            return false;
        }
        !self.operator.takes_value() || !self.value.trim().is_empty()
    }

    pub fn to_payload(&self) -> Option<FieldFilter> {
        if !self.is_complete() {
            return None;
        }
        Some(FieldFilter {
            field: self.field.trim().to_string(),
            operator: self.operator,
            value: self
                .operator
                .takes_value()
                .then(|| self.value.clone()),
        })
    }
}

/// Wire form of one filter. `value` is serialised as `null` for
/// `exists` / `missing`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Option<String>,
}

/// Partial update of a row; `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub field: Option<String>,
    pub operator: Option<FilterOperator>,
    pub value: Option<String>,
}

/// The ordered filter rows of one query state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterSet {
    rows: Vec<FilterRow>,
    next_seq: u64,
}

impl FilterSet {
    pub fn rows(&self) -> &[FilterRow] {
        &self.rows
    }

    pub fn get(&self, id: &str) -> Option<&FilterRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row and return its id.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> String {
        self.next_seq += 1;
        let id = format!("filter-{}", self.next_seq);
        self.rows.push(FilterRow {
            id: id.clone(),
            field: field.into(),
            operator,
            value: value.into(),
        });
        id
    }

    /// Quick filters always append a fresh `equals` row, so several of
    /// them stack.
    pub fn quick_filter(&mut self, field: impl Into<String>, value: impl Into<String>) -> String {
        self.add(field, FilterOperator::Equals, value)
    }

    pub fn update(&mut self, id: &str, patch: FilterPatch) -> Result<(), StateError> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StateError::UnknownFilter(id.to_string()))?;
        if let Some(field) = patch.field {
            row.field = field;
        }
        if let Some(operator) = patch.operator {
            row.operator = operator;
        }
        if let Some(value) = patch.value {
            row.value = value;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<FilterRow, StateError> {
        let idx = self
            .rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StateError::UnknownFilter(id.to_string()))?;
        Ok(self.rows.remove(idx))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Complete rows only, in row order.
    pub fn payload(&self) -> Vec<FieldFilter> {
        self.rows.iter().filter_map(FilterRow::to_payload).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_text() {
        for op in FilterOperator::ALL {
            assert_eq!(op.as_str().parse::<FilterOperator>(), Ok(op));
        }
        assert!("between".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn test_exists_and_missing_never_send_a_value() {
        let mut set = FilterSet::default();
        set.add("user.name", FilterOperator::Exists, "ignored");
        set.add("file.hash", FilterOperator::Missing, "");
        let payload = set.payload();
        assert_eq!(payload.len(), 2);
        assert!(payload.iter().all(|f| f.value.is_none()));

        let json = serde_json::to_value(&payload[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"field": "user.name", "operator": "exists", "value": null})
        );
    }

    #[test]
    fn test_incomplete_rows_stay_but_are_not_sent() {
        let mut set = FilterSet::default();
        set.add("", FilterOperator::Equals, "x");
        set.add("event.type", FilterOperator::Contains, "  ");
        set.add("event.type", FilterOperator::Equals, "file");
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.payload(),
            vec![FieldFilter {
                field: "event.type".into(),
                operator: FilterOperator::Equals,
                value: Some("file".into()),
            }]
        );
    }

    #[test]
    fn test_quick_filters_stack() {
        let mut set = FilterSet::default();
        let first = set.quick_filter("event.type", "file");
        let before = set.rows().to_vec();
        let second = set.quick_filter("event.type", "process");
        assert_ne!(first, second);
        assert_eq!(set.len(), before.len() + 1);
        assert_eq!(&set.rows()[..1], &before[..]);
        assert_eq!(set.rows()[1].operator, FilterOperator::Equals);
    }

    #[test]
    fn test_update_and_remove() {
        let mut set = FilterSet::default();
        let id = set.add("", FilterOperator::Equals, "");
        set.update(
            &id,
            FilterPatch {
                field: Some("host.name".into()),
                operator: Some(FilterOperator::Prefix),
                value: Some("WS-".into()),
            },
        )
        .unwrap();
        assert_eq!(set.payload()[0].operator, FilterOperator::Prefix);

        assert_eq!(
            set.update("filter-99", FilterPatch::default()),
            Err(StateError::UnknownFilter("filter-99".into()))
        );
        set.remove(&id).unwrap();
        assert!(set.is_empty());
        assert!(set.remove(&id).is_err());
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut set = FilterSet::default();
        let a = set.add("a", FilterOperator::Equals, "1");
        set.remove(&a).unwrap();
        let b = set.add("b", FilterOperator::Equals, "2");
        assert_ne!(a, b);
    }
}
