//! # Search Backend
//!
//! The seam between the explorer and the remote query service. Requests are
//! passed by value so a fetch task owns everything it touches and can be
//! aborted at any await point.

use rq_core::wire::{
    AggregateRequest, AggregateResponse, SearchRequest, SearchResponse, TimelineRequest,
    TimelineResponse,
};

use crate::error::FetchError;

#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// One page of matching documents plus the total match count.
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, FetchError>;

    /// Top-N value counts of a single field over the same query.
    async fn aggregate(&self, request: AggregateRequest)
        -> Result<AggregateResponse, FetchError>;

    /// Date histogram of matching documents.
    async fn timeline(&self, request: TimelineRequest) -> Result<TimelineResponse, FetchError>;
}
