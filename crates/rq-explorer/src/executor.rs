//! # Fetch Slots
//!
//! Shared request lifecycle of the search, aggregation and timeline
//! executors. A slot remembers the last request it issued (its dependency
//! key), the store generation it was issued at, and the handle of the task
//! running it.
//!
//! Re-issuing aborts the previous task, which drops the in-flight HTTP
//! future. An outcome is only accepted when it carries the slot's current
//! generation; anything queued by an aborted task, or arriving late, is
//! rejected.

use std::future::Future;

use tokio::task::JoinHandle;

use rq_core::wire::{AggregateResponse, SearchResponse, TimelineResponse};
use rq_core::Generation;

use crate::error::FetchError;

/// A finished fetch, tagged with the generation it was issued at.
#[derive(Debug)]
pub enum FetchOutcome {
    Search {
        generation: Generation,
        result: Result<SearchResponse, FetchError>,
    },
    Aggregation {
        generation: Generation,
        result: Result<AggregateResponse, FetchError>,
    },
    Timeline {
        generation: Generation,
        result: Result<TimelineResponse, FetchError>,
    },
}

impl FetchOutcome {
    pub fn generation(&self) -> Generation {
        match self {
            Self::Search { generation, .. }
            | Self::Aggregation { generation, .. }
            | Self::Timeline { generation, .. } => *generation,
        }
    }
}

/// What accepting an outcome did to a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Superseded; nothing changed.
    Stale,
    Loaded,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct FetchSlot<R> {
    issued: Option<R>,
    generation: Generation,
    handle: Option<JoinHandle<()>>,
}

impl<R> Default for FetchSlot<R> {
    fn default() -> Self {
        Self {
            issued: None,
            generation: 0,
            handle: None,
        }
    }
}

impl<R: PartialEq> FetchSlot<R> {
    /// A fetch is due whenever the request differs from the last one issued.
    pub fn is_due(&self, next: &Option<R>) -> bool {
        self.issued != *next
    }

    pub fn issued(&self) -> Option<&R> {
        self.issued.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.handle.is_some()
    }

    pub fn launch<F>(&mut self, request: R, generation: Generation, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.issued = Some(request);
        self.generation = generation;
        self.handle = Some(tokio::spawn(task));
    }

    /// Abort the in-flight task, if any. The issued request is kept.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(generation = self.generation, "cancelled in-flight fetch");
        }
    }

    /// Abort and forget the issued request, so the next sync re-issues.
    pub fn reset(&mut self) {
        self.cancel();
        self.issued = None;
    }

    /// Record that nothing should be fetched for `next`.
    pub fn idle(&mut self, next: Option<R>) {
        self.cancel();
        self.issued = next;
    }

    /// Claim an outcome. Returns `false` for anything but the current fetch.
    pub fn accept(&mut self, generation: Generation) -> bool {
        if self.handle.is_none() || self.generation != generation {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_launch_aborts_previous_task() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut slot: FetchSlot<u32> = FetchSlot::default();

        let slow_tx = tx.clone();
        slot.launch(1, 1, async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = slow_tx.send(1u64);
        });
        slot.launch(2, 2, async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(2u64);
        });

        assert_eq!(rx.recv().await, Some(2));
        assert!(!slot.accept(1));
        assert!(slot.accept(2));
        assert!(!slot.is_loading());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_due_only_on_change() {
        let mut slot: FetchSlot<u32> = FetchSlot::default();
        assert!(!slot.is_due(&None));
        assert!(slot.is_due(&Some(7)));
        slot.launch(7, 3, async {});
        assert!(!slot.is_due(&Some(7)));
        slot.reset();
        assert!(slot.is_due(&Some(7)));
        assert!(!slot.accept(3));
    }
}
