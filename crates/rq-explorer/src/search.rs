//! # Search Executor
//!
//! Keeps the current result page, the total and the field catalog in step
//! with the query state. A successful page replaces all three; a failure
//! clears the page and keeps the last catalog so filters can still be built.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use rq_core::wire::{SearchRequest, SearchResponse};
use rq_core::{build_field_catalog, FieldCatalog, Generation, QueryState, SearchResult};

use crate::backend::SearchBackend;
use crate::error::FetchError;
use crate::executor::{FetchOutcome, FetchSlot, Settled};

#[derive(Debug, Default)]
pub struct SearchExecutor {
    slot: FetchSlot<SearchRequest>,
    results: Vec<SearchResult>,
    total: u64,
    took: Option<u64>,
    catalog: FieldCatalog,
    error: Option<String>,
}

impl SearchExecutor {
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn took(&self) -> Option<u64> {
        self.took
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Issue a fetch if the outgoing request changed. Returns whether one
    /// was issued.
    pub(crate) fn sync(
        &mut self,
        state: &QueryState,
        generation: Generation,
        backend: &Arc<dyn SearchBackend>,
        tx: &UnboundedSender<FetchOutcome>,
    ) -> bool {
        let next = state.search_request();
        if !self.slot.is_due(&next) {
            return false;
        }
        let Some(request) = next else {
            self.slot.idle(None);
            self.clear();
            return false;
        };

        tracing::debug!(
            generation,
            case_id = %request.case_id,
            query = %request.query,
            from = request.from,
            size = request.size,
            "issuing search"
        );
        let backend = backend.clone();
        let tx = tx.clone();
        let body = request.clone();
        self.slot.launch(request, generation, async move {
            let result = backend.search(body).await;
            let _ = tx.send(FetchOutcome::Search { generation, result });
        });
        true
    }

    pub(crate) fn accept(
        &mut self,
        generation: Generation,
        result: Result<SearchResponse, FetchError>,
    ) -> Settled {
        if !self.slot.accept(generation) {
            tracing::debug!(generation, "discarding stale search response");
            return Settled::Stale;
        }
        let offset = self.slot.issued().map(|r| r.from).unwrap_or(0);

        match result {
            Ok(resp) => {
                self.catalog = build_field_catalog(&resp.hits);
                self.results = resp
                    .hits
                    .into_iter()
                    .enumerate()
                    .map(|(i, doc)| SearchResult::from_hit(doc, offset + i))
                    .collect();
                self.total = resp.total;
                self.took = resp.took;
                self.error = None;
                tracing::info!(
                    total = self.total,
                    hits = self.results.len(),
                    fields = self.catalog.len(),
                    "search loaded"
                );
                Settled::Loaded
            }
            Err(e) if e.is_cancellation() => {
                tracing::debug!(generation, "search cancelled");
                Settled::Cancelled
            }
            Err(e) => {
                tracing::warn!("search failed: {}", e);
                self.results.clear();
                self.total = 0;
                self.took = None;
                self.error = Some(e.to_string());
                Settled::Failed
            }
        }
    }

    /// Abort and drop everything, including the catalog. The next sync
    /// re-issues even if the request is unchanged.
    pub(crate) fn reset(&mut self) {
        self.slot.reset();
        self.clear();
    }

    fn clear(&mut self) {
        self.results.clear();
        self.total = 0;
        self.took = None;
        self.catalog = FieldCatalog::default();
        self.error = None;
    }
}
