use thiserror::Error;

/// Why a request through the bypass session (or a plain host fetch) produced nothing.
///
/// The `Display` text doubles as the session's `last_error` diagnostic.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("solver is not available")]
    SolverUnavailable,
    #[error("solver probe failed: {0}")]
    ProbeFailed(String),
    #[error("timeout - the server took too long to respond")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("solver error: {0}")]
    Solver(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("challenge page served for {url}")]
    Challenge { url: String },
    #[error("solver solution unusable: {0}")]
    IncompleteSolution(&'static str),
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl FetchError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}
