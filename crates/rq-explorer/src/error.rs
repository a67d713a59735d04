//! # Errors
//!
//! Two classes. [`FetchError`] is caught at the fetch boundary and turned
//! into a panel's error message; it never reaches the query state.
//! [`ExplorerError`] rejects an invalid user action and goes back to the
//! caller untouched.

use rq_core::wire::WireError;
use rq_core::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Search service returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Cancellations are expected and never shown to the analyst.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<WireError> for FetchError {
    fn from(e: WireError) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplorerError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Field '{0}' is not in the current field catalog")]
    UnknownField(String),

    #[error("No bucket '{0}' in the current aggregation")]
    UnknownBucket(String),

    #[error("No aggregation field selected")]
    NoAggregationField,

    #[error("No result row {0} on the current page")]
    NoSuchRow(usize),

    #[error("Inspector has no field entry {0}")]
    NoSuchEntry(usize),

    #[error("No event is being inspected")]
    NoInspector,
}
