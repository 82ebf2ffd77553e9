use thiserror::Error;

use crate::bypass::FetchError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Expected markup or pattern absent; an ordinary outcome for drifting markup.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unexpected JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
