//! # Query State Store
//!
//! The single mutable source of truth of the explorer. Every change goes
//! through [`QueryState::apply`], a pure transition, and every accepted
//! transition bumps the store generation.
//!
//! Page reset rule: any mutation that changes the identity of the result
//! set (case, query, filters, time range, page size, sort) moves back to
//! page 0. Aggregation, timeline and column settings do not touch the
//! result set and leave the page alone.

use serde::{Deserialize, Serialize};

use crate::columns::ColumnConfig;
use crate::filters::{FilterOperator, FilterPatch, FilterSet};
use crate::time::is_valid_interval;
use crate::wire::{AggregateRequest, SearchRequest, TimelineRequest};
use crate::{Generation, PageSize, SortOrder, StateError, TimeRange};

pub const DEFAULT_SORT_FIELD: &str = "@timestamp";
pub const DEFAULT_AGGREGATION_SIZE: usize = 10;
pub const MAX_AGGREGATION_SIZE: usize = 100;
pub const TIMELINE_TIME_FIELD: &str = "@timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub case_id: Option<String>,
    pub query_text: String,
    pub filters: FilterSet,
    pub time_range: TimeRange,
    pub page: usize,
    pub page_size: PageSize,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub aggregation_field: Option<String>,
    pub aggregation_size: usize,
    pub timeline_interval: Option<String>,
    pub columns: ColumnConfig,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            case_id: None,
            query_text: String::new(),
            filters: FilterSet::default(),
            time_range: TimeRange::default(),
            page: 0,
            page_size: PageSize::default(),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::default(),
            aggregation_field: None,
            aggregation_size: DEFAULT_AGGREGATION_SIZE,
            timeline_interval: None,
            columns: ColumnConfig::default(),
        }
    }
}

/// Every way the query state can change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetCase(Option<String>),
    SetQuery(String),
    AddFilter {
        field: String,
        operator: FilterOperator,
        value: String,
    },
    AddBlankFilter,
    UpdateFilter {
        id: String,
        patch: FilterPatch,
    },
    RemoveFilter(String),
    ClearFilters,
    /// Append an `equals` row built from an observed value.
    QuickFilter {
        field: String,
        value: String,
    },
    SetTimeRange(TimeRange),
    SetPage(usize),
    SetPageSize(usize),
    SetSort {
        field: String,
        order: SortOrder,
    },
    SetAggregationField(Option<String>),
    SetAggregationSize(usize),
    SetTimelineInterval(Option<String>),
    ToggleColumn(String),
    ReorderColumn {
        source: String,
        target: String,
    },
    ResetColumns,
}

impl Mutation {
    pub fn resets_page(&self) -> bool {
        match self {
            Self::SetCase(_)
            | Self::SetQuery(_)
            | Self::AddFilter { .. }
            | Self::AddBlankFilter
            | Self::UpdateFilter { .. }
            | Self::RemoveFilter(_)
            | Self::ClearFilters
            | Self::QuickFilter { .. }
            | Self::SetTimeRange(_)
            | Self::SetPageSize(_)
            | Self::SetSort { .. } => true,
            Self::SetPage(_)
            | Self::SetAggregationField(_)
            | Self::SetAggregationSize(_)
            | Self::SetTimelineInterval(_)
            | Self::ToggleColumn(_)
            | Self::ReorderColumn { .. }
            | Self::ResetColumns => false,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl QueryState {
    /// Pure transition: the next state, or the reason the mutation is
    /// rejected.
    pub fn apply(mut self, mutation: Mutation) -> Result<Self, StateError> {
        if mutation.resets_page() {
            self.page = 0;
        }

        match mutation {
            Mutation::SetCase(case_id) => self.case_id = non_blank(case_id),
            Mutation::SetQuery(text) => self.query_text = text,
            Mutation::AddFilter {
                field,
                operator,
                value,
            } => {
                self.filters.add(field, operator, value);
            }
            Mutation::AddBlankFilter => {
                self.filters.add("", FilterOperator::Equals, "");
            }
            Mutation::UpdateFilter { id, patch } => self.filters.update(&id, patch)?,
            Mutation::RemoveFilter(id) => {
                self.filters.remove(&id)?;
            }
            Mutation::ClearFilters => self.filters.clear(),
            Mutation::QuickFilter { field, value } => {
                self.filters.quick_filter(field, value);
            }
            Mutation::SetTimeRange(range) => self.time_range = range,
            Mutation::SetPage(page) => {
                if page.checked_mul(self.page_size.get()).is_none() {
                    return Err(StateError::PageOutOfRange(page));
                }
                self.page = page;
            }
            Mutation::SetPageSize(size) => self.page_size = PageSize::try_from(size)?,
            Mutation::SetSort { field, order } => {
                self.sort_field = non_blank(Some(field))
                    .unwrap_or_else(|| DEFAULT_SORT_FIELD.to_string());
                self.sort_order = order;
            }
            Mutation::SetAggregationField(field) => self.aggregation_field = non_blank(field),
            Mutation::SetAggregationSize(size) => {
                if size == 0 || size > MAX_AGGREGATION_SIZE {
                    return Err(StateError::InvalidAggregationSize(size));
                }
                self.aggregation_size = size;
            }
            Mutation::SetTimelineInterval(interval) => {
                let interval = non_blank(interval);
                if let Some(iv) = &interval {
                    if !is_valid_interval(iv) {
                        return Err(StateError::InvalidInterval(iv.clone()));
                    }
                }
                self.timeline_interval = interval;
            }
            Mutation::ToggleColumn(field) => {
                self.columns.toggle(&field);
            }
            Mutation::ReorderColumn { source, target } => {
                self.columns.reorder(&source, &target);
            }
            Mutation::ResetColumns => self.columns.reset(),
        }

        Ok(self)
    }

    /// Query text as sent: blank means match-all.
    pub fn effective_query(&self) -> String {
        let trimmed = self.query_text.trim();
        if trimmed.is_empty() {
            "*".to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn from_offset(&self) -> usize {
        self.page.saturating_mul(self.page_size.get())
    }

    // -------------------------------------------------------------------------
    // Outgoing requests. These double as the dependency keys of the
    // executors: a fetch is due exactly when the request changes.
    // -------------------------------------------------------------------------

    pub fn search_request(&self) -> Option<SearchRequest> {
        let case_id = self.case_id.clone()?;
        Some(SearchRequest {
            query: self.effective_query(),
            case_id,
            size: self.page_size.get(),
            from: self.from_offset(),
            sort_by: self.sort_field.clone(),
            sort_order: self.sort_order,
            field_filters: self.filters.payload(),
            time_range: self.time_range.to_wire(),
        })
    }

    pub fn aggregate_request(&self) -> Option<AggregateRequest> {
        let case_id = self.case_id.clone()?;
        let field = self.aggregation_field.clone()?;
        Some(AggregateRequest {
            case_id,
            field,
            size: self.aggregation_size,
            query: self.effective_query(),
            field_filters: self.filters.payload(),
            time_range: self.time_range.to_wire(),
        })
    }

    pub fn timeline_request(&self) -> Option<TimelineRequest> {
        let case_id = self.case_id.clone()?;
        let interval = self.timeline_interval.clone()?;
        Some(TimelineRequest {
            case_id,
            interval,
            time_field: TIMELINE_TIME_FIELD.to_string(),
            query: self.effective_query(),
            field_filters: self.filters.payload(),
            time_range: self.time_range.to_wire(),
        })
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// `"26-50 / 137"`, or `"0-0 / N"` when the page is empty.
pub fn page_info(page: usize, page_size: usize, total: u64) -> String {
    let from = (page as u64).saturating_mul(page_size as u64);
    if total == 0 || from >= total {
        return format!("0-0 / {}", total);
    }
    let end = from.saturating_add(page_size as u64).min(total);
    format!("{}-{} / {}", from + 1, end, total)
}

pub fn can_next(page: usize, page_size: usize, total: u64) -> bool {
    (page as u64)
        .saturating_add(1)
        .saturating_mul(page_size as u64)
        < total
}

pub fn can_prev(page: usize) -> bool {
    page > 0
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct QueryStateStore {
    state: QueryState,
    generation: Generation,
}

impl QueryStateStore {
    pub fn new(initial: QueryState) -> Self {
        Self {
            state: initial,
            generation: 0,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Apply a mutation and bump the generation. A rejected mutation leaves
    /// state and generation untouched.
    pub fn dispatch(&mut self, mutation: Mutation) -> Result<Generation, StateError> {
        self.state = self.state.clone().apply(mutation)?;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Bump the generation without changing state, so fetches re-issued for
    /// the same request never share a tag with the ones they replace.
    pub fn invalidate(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    /// Column invariant repair after the discovered field set changed.
    pub fn reconcile_columns(&mut self, available: Vec<String>) -> bool {
        let changed = self.state.columns.reconcile(available);
        if changed {
            self.generation += 1;
        }
        changed
    }
}
