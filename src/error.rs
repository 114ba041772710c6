//! Error types for link resolution.
//!
//! [`ParseError`] covers everything a single parser can run into, network
//! failures included. [`PipelineError`] adds the failures that only exist
//! one level up: dispatch bugs and renderer failures.

use thiserror::Error;

/// Failure to turn a matched link into a [`ParseResult`](crate::ParseResult).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported link: {0}")]
    Unsupported(String),

    #[error("link expired or content removed: {0}")]
    Expired(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("redirect resolution failed: {0}")]
    Redirect(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of one pipeline request. Never affects other requests.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A keyword reached the dispatcher without a registered parser.
    #[error("no parser registered for keyword {0:?}")]
    UnknownKeyword(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("render failed: {0}")]
    Render(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
