use std::time::Duration;

use seo_common::http::UpstreamError;

/// Failure of one of the external collaborators (audit, search, text generation).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Other(String),
}

/// Why the report text could not be turned into a report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("no JSON found in response")]
    NoJsonFound,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),
}

/// Errors surfaced to callers of the analysis pipeline.
///
/// Competitor validation never produces one of these; it degrades to an empty
/// competitor list instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid analysis format: {0}")]
    InvalidAnalysisFormat(#[from] FormatError),

    #[error("text generation failed: {0}")]
    Upstream(String),

    #[error("text generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{service} unavailable: {message}")]
    DataSource {
        service: &'static str,
        message: String,
    },

    #[error("unknown failure: {0}")]
    Unknown(String),
}
