use thiserror::Error;

/// Failure modes of one store-lookup request.
///
/// Only launch and query-submission problems are terminal for a request.
/// Challenge-clearance and results-readiness timeouts are absorbed by the
/// flow (the page may still be usable), and an extraction miss becomes an
/// empty result list rather than an error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to launch browser: {0}")]
    SessionLaunch(anyhow::Error),

    #[error("no locator strategy matched ({tried} tried)")]
    NoLocatorMatched { tried: usize },

    #[error("query submission via strategy \"{strategy}\" failed: {cause}")]
    QuerySubmission {
        strategy: String,
        cause: anyhow::Error,
    },

    #[error("no extraction strategy produced data ({tried} tried)")]
    NoDataExtracted { tried: usize },

    #[error("overall deadline exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str },

    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

/// Failure modes of the token-authenticated product search path.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("failed to read token from {path}: {source}")]
    TokenRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {path} is empty")]
    TokenEmpty { path: String },

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search API returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to parse search API response: {0}")]
    Deserialize(#[from] serde_json::Error),
}
