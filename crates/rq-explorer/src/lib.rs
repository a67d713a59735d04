//! # rq-explorer — The "Engine" of REQUIEM
//!
//! Keeps every panel of the event explorer (result page, field catalog,
//! aggregation buckets, timeline, detail inspector) consistent with one
//! frequently mutated [`QueryState`].
//!
//! The [`Explorer`] is owned by a single task. Mutations are synchronous:
//! each one updates the store, diffs the outgoing request of every executor
//! against the one it issued last, and cancels and re-issues only those
//! whose request changed. Responses come back through a channel as
//! [`FetchOutcome`]s and are applied with [`Explorer::apply`]; superseded
//! ones are dropped.

pub mod aggregation;
pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod inspector;
pub mod search;
pub mod timeline;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use rq_core::state::{can_next, can_prev, page_info};
use rq_core::{
    AggregationBucket, FieldCatalog, FilterOperator, FilterPatch, Generation, Mutation,
    QueryState, QueryStateStore, SearchResult, SortOrder, TimeRange, TimelineBucket,
};

pub use aggregation::AggregationExecutor;
pub use backend::SearchBackend;
pub use config::{ConfigError, ExplorerConfig};
pub use error::{ExplorerError, FetchError};
pub use executor::{FetchOutcome, Settled};
pub use http::HttpBackend;
pub use inspector::{EventDetailInspector, InspectedEvent};
pub use search::SearchExecutor;
pub use timeline::TimelineExecutor;

pub struct Explorer {
    store: QueryStateStore,
    backend: Arc<dyn SearchBackend>,
    tx: UnboundedSender<FetchOutcome>,
    rx: UnboundedReceiver<FetchOutcome>,
    search: SearchExecutor,
    aggregation: AggregationExecutor,
    timeline: TimelineExecutor,
    inspector: EventDetailInspector,
}

impl Explorer {
    /// Must be called from within a tokio runtime. Fetches start as soon as
    /// the state names a case.
    pub fn new(backend: Arc<dyn SearchBackend>, initial: QueryState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut explorer = Self {
            store: QueryStateStore::new(initial),
            backend,
            tx,
            rx,
            search: SearchExecutor::default(),
            aggregation: AggregationExecutor::default(),
            timeline: TimelineExecutor::default(),
            inspector: EventDetailInspector::default(),
        };
        explorer.sync();
        explorer
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply one mutation and refetch whatever it made stale.
    pub fn dispatch(&mut self, mutation: Mutation) -> Result<(), ExplorerError> {
        let previous_case = self.store.state().case_id.clone();
        self.store.dispatch(mutation)?;
        if self.store.state().case_id != previous_case {
            self.switch_case();
        }
        self.sync();
        Ok(())
    }

    /// Everything of the old case goes before the new case's first fetch
    /// is issued.
    fn switch_case(&mut self) {
        tracing::info!(case_id = ?self.store.state().case_id, "switching case");
        self.search.reset();
        self.aggregation.reset();
        self.timeline.reset();
        self.inspector.close();
        self.store.reconcile_columns(Vec::new());
    }

    fn sync(&mut self) {
        let generation = self.store.generation();
        let state = self.store.state();
        self.search.sync(state, generation, &self.backend, &self.tx);
        self.aggregation
            .sync(state, generation, &self.backend, &self.tx);
        self.timeline.sync(state, generation, &self.backend, &self.tx);
    }

    pub fn set_case(&mut self, case_id: Option<String>) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetCase(case_id))
    }

    pub fn set_query(&mut self, text: impl Into<String>) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetQuery(text.into()))
    }

    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::AddFilter {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    /// Append an empty row for the analyst to fill in. Returns its id.
    pub fn add_blank_filter(&mut self) -> Result<String, ExplorerError> {
        self.dispatch(Mutation::AddBlankFilter)?;
        Ok(self
            .state()
            .filters
            .rows()
            .last()
            .map(|row| row.id.clone())
            .unwrap_or_default())
    }

    pub fn update_filter(&mut self, id: &str, patch: FilterPatch) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::UpdateFilter {
            id: id.to_string(),
            patch,
        })
    }

    pub fn remove_filter(&mut self, id: &str) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::RemoveFilter(id.to_string()))
    }

    pub fn clear_filters(&mut self) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::ClearFilters)
    }

    pub fn set_time_range(&mut self, range: TimeRange) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetTimeRange(range))
    }

    pub fn set_page(&mut self, page: usize) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetPage(page))
    }

    /// No-op on the last page.
    pub fn next_page(&mut self) -> Result<bool, ExplorerError> {
        if !self.can_next() {
            return Ok(false);
        }
        self.set_page(self.state().page + 1)?;
        Ok(true)
    }

    /// No-op on the first page.
    pub fn prev_page(&mut self) -> Result<bool, ExplorerError> {
        if !self.can_prev() {
            return Ok(false);
        }
        self.set_page(self.state().page - 1)?;
        Ok(true)
    }

    pub fn set_page_size(&mut self, size: usize) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetPageSize(size))
    }

    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetSort {
            field: field.into(),
            order,
        })
    }

    pub fn set_aggregation_field(&mut self, field: Option<String>) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetAggregationField(field))
    }

    pub fn set_aggregation_size(&mut self, size: usize) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetAggregationSize(size))
    }

    pub fn set_timeline_interval(&mut self, interval: Option<String>) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::SetTimelineInterval(interval))
    }

    pub fn toggle_column(&mut self, field: &str) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::ToggleColumn(field.to_string()))
    }

    pub fn reorder_column(&mut self, source: &str, target: &str) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::ReorderColumn {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    pub fn reset_columns(&mut self) -> Result<(), ExplorerError> {
        self.dispatch(Mutation::ResetColumns)
    }

    /// Re-issue every fetch for the current state, e.g. after an error.
    pub fn refresh(&mut self) {
        self.store.invalidate();
        self.search.reset();
        self.aggregation.reset();
        self.timeline.reset();
        self.sync();
    }

    // =========================================================================
    // Quick filters
    // =========================================================================

    /// Filter on the sampled value of a catalog field.
    pub fn quick_filter_from_field(&mut self, field: &str) -> Result<(), ExplorerError> {
        let value = self
            .search
            .catalog()
            .value_of(field)
            .ok_or_else(|| ExplorerError::UnknownField(field.to_string()))?
            .to_string();
        self.quick_filter(field.to_string(), value)
    }

    /// Filter on one aggregation bucket of the aggregated field.
    pub fn quick_filter_from_bucket(&mut self, key: &str) -> Result<(), ExplorerError> {
        let field = self
            .aggregation
            .field()
            .ok_or(ExplorerError::NoAggregationField)?
            .to_string();
        let bucket = self
            .aggregation
            .bucket(key)
            .ok_or_else(|| ExplorerError::UnknownBucket(key.to_string()))?;
        let value = bucket.key.clone();
        self.quick_filter(field, value)
    }

    /// Filter on one entry of the inspected event, then close the inspector.
    pub fn quick_filter_from_inspector(&mut self, index: usize) -> Result<(), ExplorerError> {
        let selected = self.inspector.selected().ok_or(ExplorerError::NoInspector)?;
        let entry = selected
            .entries
            .get(index)
            .ok_or(ExplorerError::NoSuchEntry(index))?
            .clone();
        self.quick_filter(entry.path, entry.value)?;
        self.inspector.close();
        Ok(())
    }

    fn quick_filter(&mut self, field: String, value: String) -> Result<(), ExplorerError> {
        tracing::debug!(%field, %value, "quick filter");
        self.dispatch(Mutation::QuickFilter { field, value })
    }

    // =========================================================================
    // Inspector
    // =========================================================================

    pub fn inspect(&mut self, row: usize) -> Result<&InspectedEvent, ExplorerError> {
        let result = self
            .search
            .results()
            .get(row)
            .cloned()
            .ok_or(ExplorerError::NoSuchRow(row))?;
        Ok(self.inspector.open(result))
    }

    pub fn close_inspector(&mut self) {
        self.inspector.close();
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Next finished fetch, current or not.
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        self.rx.recv().await
    }

    /// Apply a finished fetch. Returns `false` when it was superseded and
    /// nothing changed.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        match outcome {
            FetchOutcome::Search { generation, result } => {
                match self.search.accept(generation, result) {
                    Settled::Stale => false,
                    Settled::Loaded => {
                        self.after_search();
                        true
                    }
                    Settled::Failed | Settled::Cancelled => true,
                }
            }
            FetchOutcome::Aggregation { generation, result } => {
                self.aggregation.accept(generation, result) != Settled::Stale
            }
            FetchOutcome::Timeline { generation, result } => {
                self.timeline.accept(generation, result) != Settled::Stale
            }
        }
    }

    /// A new catalog prunes stale columns and repairs the aggregation field.
    fn after_search(&mut self) {
        let catalog = self.search.catalog();
        let names = catalog.field_names();
        let repair = catalog.first_field().and_then(|first| {
            let current = self.store.state().aggregation_field.as_deref();
            match current {
                Some(field) if catalog.contains(field) => None,
                _ => Some(first.to_string()),
            }
        });

        self.store.reconcile_columns(names);
        if let Some(field) = repair {
            tracing::debug!(%field, "aggregation field repaired to first catalog field");
            if let Err(e) = self.dispatch(Mutation::SetAggregationField(Some(field))) {
                tracing::warn!("aggregation field repair rejected: {}", e);
            }
        }
    }

    /// Apply outcomes until no fetch is in flight.
    pub async fn settle(&mut self) {
        while self.is_loading() {
            match self.rx.recv().await {
                Some(outcome) => {
                    self.apply(outcome);
                }
                None => break,
            }
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn state(&self) -> &QueryState {
        self.store.state()
    }

    pub fn generation(&self) -> Generation {
        self.store.generation()
    }

    pub fn is_loading(&self) -> bool {
        self.search.is_loading() || self.aggregation.is_loading() || self.timeline.is_loading()
    }

    pub fn results(&self) -> &[SearchResult] {
        self.search.results()
    }

    pub fn total(&self) -> u64 {
        self.search.total()
    }

    pub fn took(&self) -> Option<u64> {
        self.search.took()
    }

    pub fn catalog(&self) -> &FieldCatalog {
        self.search.catalog()
    }

    pub fn buckets(&self) -> &[AggregationBucket] {
        self.aggregation.buckets()
    }

    pub fn timeline_buckets(&self) -> &[TimelineBucket] {
        self.timeline.buckets()
    }

    pub fn inspector(&self) -> Option<&InspectedEvent> {
        self.inspector.selected()
    }

    pub fn page_info(&self) -> String {
        let s = self.state();
        page_info(s.page, s.page_size.get(), self.total())
    }

    pub fn can_next(&self) -> bool {
        let s = self.state();
        can_next(s.page, s.page_size.get(), self.total())
    }

    pub fn can_prev(&self) -> bool {
        can_prev(self.state().page)
    }

    pub fn search_error(&self) -> Option<&str> {
        self.search.error()
    }

    pub fn aggregation_error(&self) -> Option<&str> {
        self.aggregation.error()
    }

    pub fn timeline_error(&self) -> Option<&str> {
        self.timeline.error()
    }

    pub fn dismiss_search_error(&mut self) {
        self.search.dismiss_error();
    }

    pub fn dismiss_aggregation_error(&mut self) {
        self.aggregation.dismiss_error();
    }

    pub fn dismiss_timeline_error(&mut self) {
        self.timeline.dismiss_error();
    }
}

impl Drop for Explorer {
    fn drop(&mut self) {
        self.search.reset();
        self.aggregation.reset();
        self.timeline.reset();
    }
}
