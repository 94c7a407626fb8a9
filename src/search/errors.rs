//! Search error types.

use thiserror::Error;

use crate::util::{Cancelled, ConcurrencyError};

/// Errors that end a search call.
///
/// A source failing is not one of them: per-source failures are recorded
/// in the result's status and error maps.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search was cancelled")]
    Cancelled,

    #[error("invalid search token: {reason}")]
    InvalidToken { reason: String },

    #[error("failed to dispatch search")]
    Dispatch(#[source] ConcurrencyError),
}

impl SearchError {
    pub(crate) fn invalid_token(reason: impl Into<String>) -> Self {
        SearchError::InvalidToken {
            reason: reason.into(),
        }
    }
}

impl From<Cancelled> for SearchError {
    fn from(_: Cancelled) -> Self {
        SearchError::Cancelled
    }
}

impl From<ConcurrencyError> for SearchError {
    fn from(err: ConcurrencyError) -> Self {
        match err {
            ConcurrencyError::Cancelled(_) => SearchError::Cancelled,
            other => SearchError::Dispatch(other),
        }
    }
}
