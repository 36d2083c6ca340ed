use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `dashboard-data`.
///
/// Empty datasets, unmatched join dates and superseded responses are not errors: they are
/// expressed as [`ChartFrame::no_data`](crate::render::ChartFrame::no_data),
/// [`AlignedSeriesPair::unmatched`](crate::transform::align::AlignedSeriesPair) and
/// [`FetchOutcome::Stale`](crate::coordinator::FetchOutcome::Stale) respectively.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("unsupported option symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("invalid URL: {0}")]
    Url(String),
}

impl DataError {
    /// Determine if an error was caused by the network or the HTTP layer, rather than by the
    /// content of a response or a caller mistake.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transport(&self) -> bool {
        match self {
            DataError::Transport(_) => true,
            DataError::Status { .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<url::ParseError> for DataError {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value.to_string())
    }
}
