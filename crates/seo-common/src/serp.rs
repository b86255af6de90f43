/// Client for SerpApi's Google search endpoint.
///
/// Only the organic results are consumed. Each result keeps its untyped extra
/// fields (sitelinks, rich snippets, ...) so callers can pass them through.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;
use crate::http::{env_u64, parse_json_response, UpstreamError};
use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct SerpApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub num_results: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_error_body_bytes: usize,
}

impl SerpApiConfig {
    pub fn from_env() -> Result<Self, CommonError> {
        let api_key = std::env::var("SERPAPI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(CommonError::MissingConfig("SERPAPI_API_KEY"))?;

        let base_url =
            std::env::var("SERPAPI_BASE_URL").unwrap_or_else(|_| "https://serpapi.com".to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            num_results: env_u64("SERPAPI_NUM_RESULTS", 10).clamp(1, 100) as u32,
            timeout: Duration::from_secs(env_u64("SERPAPI_TIMEOUT_SECS", 30)),
            retry: RetryPolicy::from_env("SERPAPI"),
            max_error_body_bytes: 8 * 1024,
        })
    }
}

#[derive(Clone)]
pub struct SerpApiClient {
    config: SerpApiConfig,
    http: reqwest::Client,
}

impl SerpApiClient {
    pub fn new(config: SerpApiConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("seo-analyzer/serpapi")
            .build()?;
        Ok(Self { config, http })
    }

    /// Run a Google search and return the organic results in rank order.
    pub async fn organic_results(
        &self,
        query: &str,
        location: &str,
    ) -> Result<Vec<OrganicResult>, UpstreamError> {
        let endpoint = format!("{}/search.json", self.config.base_url);
        let params = [
            ("engine", "google".to_string()),
            ("q", query.to_string()),
            ("location", location.to_string()),
            ("num", self.config.num_results.to_string()),
            ("api_key", self.config.api_key.clone()),
        ];
        let params = &params;
        let response: SearchResponse = self
            .config
            .retry
            .run("serpapi", || {
                let endpoint = endpoint.clone();
                async move {
                    let resp = self
                        .http
                        .get(&endpoint)
                        .query(params)
                        .timeout(self.config.timeout)
                        .send()
                        .await?;
                    parse_json_response(resp, self.config.max_error_body_bytes).await
                }
            })
            .await?;
        Ok(response.into_ranked())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
}

impl SearchResponse {
    fn into_ranked(self) -> Vec<OrganicResult> {
        let mut results = self.organic_results;
        results.sort_by_key(|r| r.position);
        results
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicResult {
    pub position: u32,
    pub link: String,
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_organic_results_in_rank_order() {
        let body = r#"{
            "search_metadata": {"status": "Success"},
            "organic_results": [
                {"position": 2, "title": "Beta Inc", "link": "https://beta.example", "displayed_link": "beta.example"},
                {"position": 1, "title": "Acme Corp", "link": "https://acme.example", "snippet": "Widgets since 1950"}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let results = response.into_ranked();
        assert_eq!(results[0].title, "Acme Corp");
        assert_eq!(results[0].snippet.as_deref(), Some("Widgets since 1950"));
        assert_eq!(results[1].position, 2);
        assert_eq!(results[1].extra["displayed_link"], "beta.example");
    }

    #[test]
    fn missing_organic_results_is_empty() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"search_information": {"organic_results_state": "Fully empty"}}"#)
                .unwrap();
        assert!(response.into_ranked().is_empty());
    }
}
