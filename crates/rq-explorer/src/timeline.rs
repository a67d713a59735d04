//! # Timeline Executor
//!
//! Date histogram over `@timestamp`, fetched only while an interval is set.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use rq_core::wire::{TimelineRequest, TimelineResponse};
use rq_core::{Generation, QueryState, TimelineBucket};

use crate::backend::SearchBackend;
use crate::error::FetchError;
use crate::executor::{FetchOutcome, FetchSlot, Settled};

#[derive(Debug, Default)]
pub struct TimelineExecutor {
    slot: FetchSlot<TimelineRequest>,
    buckets: Vec<TimelineBucket>,
    error: Option<String>,
}

impl TimelineExecutor {
    pub fn buckets(&self) -> &[TimelineBucket] {
        &self.buckets
    }

    pub fn interval(&self) -> Option<&str> {
        self.slot.issued().map(|r| r.interval.as_str())
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
        let next = state.timeline_request();
        if !self.slot.is_due(&next) {
            return false;
        }
        let Some(request) = next else {
            self.slot.idle(None);
            self.clear();
            return false;
        };

        tracing::debug!(generation, interval = %request.interval, "issuing timeline");
        let backend = backend.clone();
        let tx = tx.clone();
        let body = request.clone();
        self.slot.launch(request, generation, async move {
            let result = backend.timeline(body).await;
            let _ = tx.send(FetchOutcome::Timeline { generation, result });
        });
        true
    }

    pub(crate) fn accept(
        &mut self,
        generation: Generation,
        result: Result<TimelineResponse, FetchError>,
    ) -> Settled {
        if !self.slot.accept(generation) {
            tracing::debug!(generation, "discarding stale timeline response");
            return Settled::Stale;
        }
        match result {
            Ok(resp) => {
                self.buckets = resp.buckets.into_iter().map(TimelineBucket::from).collect();
                self.error = None;
                Settled::Loaded
            }
            Err(e) if e.is_cancellation() => Settled::Cancelled,
            Err(e) => {
                tracing::warn!("timeline failed: {}", e);
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
