//! # Aggregation Executor
//!
//! Top-N value counts of the selected field over the current query and
//! filters. Pagination and sort are not part of its request, so paging
//! through results never refetches the buckets.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use rq_core::wire::{AggregateRequest, AggregateResponse};
use rq_core::{AggregationBucket, Generation, QueryState};

use crate::backend::SearchBackend;
use crate::error::FetchError;
use crate::executor::{FetchOutcome, FetchSlot, Settled};

#[derive(Debug, Default)]
pub struct AggregationExecutor {
    slot: FetchSlot<AggregateRequest>,
    buckets: Vec<AggregationBucket>,
    error: Option<String>,
}

impl AggregationExecutor {
    pub fn buckets(&self) -> &[AggregationBucket] {
        &self.buckets
    }

    /// Field the displayed buckets were computed for.
    pub fn field(&self) -> Option<&str> {
        self.slot.issued().map(|r| r.field.as_str())
    }

    pub fn bucket(&self, key: &str) -> Option<&AggregationBucket> {
        self.buckets.iter().find(|b| b.key == key)
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

    pub(crate) fn sync(
        &mut self,
        state: &QueryState,
        generation: Generation,
        backend: &Arc<dyn SearchBackend>,
        tx: &UnboundedSender<FetchOutcome>,
    ) -> bool {
        let next = state.aggregate_request();
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
            field = %request.field,
            size = request.size,
            "issuing aggregation"
        );
        let backend = backend.clone();
        let tx = tx.clone();
        let body = request.clone();
        self.slot.launch(request, generation, async move {
            let result = backend.aggregate(body).await;
            let _ = tx.send(FetchOutcome::Aggregation { generation, result });
        });
        true
    }

    pub(crate) fn accept(
        &mut self,
        generation: Generation,
        result: Result<AggregateResponse, FetchError>,
    ) -> Settled {
        if !self.slot.accept(generation) {
            tracing::debug!(generation, "discarding stale aggregation response");
            return Settled::Stale;
        }
        match result {
            Ok(resp) => {
                self.buckets = resp.buckets;
                self.error = None;
                Settled::Loaded
            }
            Err(e) if e.is_cancellation() => Settled::Cancelled,
            Err(e) => {
                tracing::warn!("aggregation failed: {}", e);
                self.buckets.clear();
                self.error = Some(e.to_string());
                Settled::Failed
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.slot.reset();
        self.clear();
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.error = None;
    }
}
