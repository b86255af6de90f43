use std::time::Duration;

use seo_pipeline::PipelineOptions;

use crate::error::AppError;

/// Server configuration loaded explicitly from environment variables.
///
/// Upstream client settings (`OPENAI_*`, `PAGESPEED_*`, `SERPAPI_*`) are read
/// by the clients themselves; this covers the server and pipeline knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL. `None` disables the audit/search cache.
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub validation_timeout: Option<Duration>,
    pub analysis_timeout: Option<Duration>,
    /// Requests per second across all tools. `None` disables rate limiting.
    pub rate_limit_rps: Option<u32>,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Optional:
    /// - `REDIS_URL`
    /// - `SEO_CACHE_TTL_SECS` (default: 3600)
    /// - `VALIDATION_TIMEOUT_SECS` (default: 60, 0 disables)
    /// - `ANALYSIS_TIMEOUT_SECS` (default: 180, 0 disables)
    /// - `RATE_LIMIT_RPS`
    /// - `MCP_TCP_LISTEN_ADDR`
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            cache_ttl_secs: parse_var("SEO_CACHE_TTL_SECS")?.unwrap_or(3600),
            validation_timeout: timeout_var("VALIDATION_TIMEOUT_SECS", 60)?,
            analysis_timeout: timeout_var("ANALYSIS_TIMEOUT_SECS", 180)?,
            rate_limit_rps: parse_var::<u32>("RATE_LIMIT_RPS")?.filter(|&n| n > 0),
            tcp_listen_addr: std::env::var("MCP_TCP_LISTEN_ADDR").ok(),
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            validation_timeout: self.validation_timeout,
            analysis_timeout: self.analysis_timeout,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} must be a non-negative integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn timeout_var(name: &str, default_secs: u64) -> Result<Option<Duration>, AppError> {
    let secs = parse_var::<u64>(name)?.unwrap_or(default_secs);
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_is_none() {
        let value: Option<u64> = parse_var("SEO_SERVER_TEST_UNSET_VARIABLE").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn zero_timeout_disables() {
        assert_eq!(timeout_var("SEO_SERVER_TEST_UNSET_TIMEOUT", 0).unwrap(), None);
        assert_eq!(
            timeout_var("SEO_SERVER_TEST_UNSET_TIMEOUT", 5).unwrap(),
            Some(Duration::from_secs(5))
        );
    }
}
