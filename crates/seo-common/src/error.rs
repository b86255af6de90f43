/// Error types shared across the SEO service crates.
///
/// These errors cover client construction and configuration for the external
/// services (LLM host, PageSpeed Insights, SerpApi). Pipeline-level errors are
/// defined in `seo-pipeline` and wrap the per-request `UpstreamError` instead.
#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("missing configuration: {0} environment variable is required")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {name}={value}")]
    InvalidConfig { name: &'static str, value: String },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
