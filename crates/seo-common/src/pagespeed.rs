/// Client for the PageSpeed Insights v5 API.
///
/// Requests all five Lighthouse categories and returns the response body as
/// opaque JSON. The pipeline hands that JSON to the language model verbatim.
use std::time::Duration;

use crate::error::CommonError;
use crate::http::{env_u64, parse_json_response, UpstreamError};
use crate::retry::RetryPolicy;

const CATEGORIES: [&str; 5] = ["PERFORMANCE", "ACCESSIBILITY", "BEST_PRACTICES", "SEO", "PWA"];

#[derive(Clone, Debug)]
pub struct PageSpeedConfig {
    pub base_url: String,
    /// Optional; PageSpeed Insights accepts keyless requests at a low quota.
    pub api_key: Option<String>,
    /// `mobile` or `desktop`.
    pub strategy: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_error_body_bytes: usize,
}

impl PageSpeedConfig {
    pub fn from_env() -> Result<Self, CommonError> {
        let strategy = std::env::var("PAGESPEED_STRATEGY").unwrap_or_else(|_| "mobile".to_string());
        if !matches!(strategy.as_str(), "mobile" | "desktop") {
            return Err(CommonError::InvalidConfig {
                name: "PAGESPEED_STRATEGY",
                value: strategy,
            });
        }

        let base_url = std::env::var("PAGESPEED_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/pagespeedonline/v5".to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var("PAGESPEED_API_KEY").ok().filter(|k| !k.is_empty()),
            strategy,
            // Lighthouse runs regularly take 30s+ on heavy pages.
            timeout: Duration::from_secs(env_u64("PAGESPEED_TIMEOUT_SECS", 90)),
            retry: RetryPolicy::from_env("PAGESPEED"),
            max_error_body_bytes: 8 * 1024,
        })
    }
}

#[derive(Clone)]
pub struct PageSpeedClient {
    config: PageSpeedConfig,
    http: reqwest::Client,
}

impl PageSpeedClient {
    pub fn new(config: PageSpeedConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("seo-analyzer/pagespeed")
            .build()?;
        Ok(Self { config, http })
    }

    pub async fn run_pagespeed(&self, url: &str) -> Result<serde_json::Value, UpstreamError> {
        let endpoint = format!("{}/runPagespeed", self.config.base_url);
        let query = self.query_params(url);
        self.config
            .retry
            .run("pagespeed", || {
                let endpoint = endpoint.clone();
                let query = query.clone();
                async move {
                    let resp = self
                        .http
                        .get(&endpoint)
                        .query(&query)
                        .timeout(self.config.timeout)
                        .send()
                        .await?;
                    parse_json_response(resp, self.config.max_error_body_bytes).await
                }
            })
            .await
    }

    fn query_params(&self, url: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("url", url.to_string()),
            ("strategy", self.config.strategy.clone()),
        ];
        params.extend(CATEGORIES.iter().map(|c| ("category", c.to_string())));
        if let Some(key) = &self.config.api_key {
            params.push(("key", key.clone()));
        }
        params
    }
}
