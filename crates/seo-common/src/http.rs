/// Shared HTTP plumbing for the upstream service clients.
///
/// Every client talks JSON over HTTPS and reports failures the same way, so the
/// error type and the response helpers live here instead of in each client.
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("upstream response missing {0}")]
    MissingField(&'static str),
}

/// Decode a successful response as `T`, or turn an error status into `UpstreamError`.
pub async fn parse_json_response<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    max_error_body_bytes: usize,
) -> Result<T, UpstreamError> {
    if resp.status().is_success() {
        let bytes = resp.bytes().await?;
        return Ok(serde_json::from_slice::<T>(&bytes)?);
    }
    Err(to_upstream_error(resp, max_error_body_bytes).await)
}

pub async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> UpstreamError {
    let status = resp.status();
    let body = read_limited_text(resp, max_error_body_bytes).await;
    match error_message(&body) {
        Some(message) => UpstreamError::Upstream { status, message },
        None => UpstreamError::UpstreamBody { status, body },
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// OpenAI-compatible hosts and Google APIs send `{"error": {"message": ...}}`;
/// SerpApi sends `{"error": "..."}`.
pub fn error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    match parsed.error {
        ErrorDetail::Text(message) => Some(message),
        ErrorDetail::Object { message } => {
            Some(message.unwrap_or_else(|| "unknown upstream error".to_string()))
        }
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

/// Read a `u64` environment variable, falling back to `default` when unset or invalid.
pub fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Object { message: Option<String> },
}
