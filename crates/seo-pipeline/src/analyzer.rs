/// Public entry point: `analyze(url, query, location)`.
///
/// Resolves the performance audit and the search results (concurrently, they
/// are independent), then hands both to the two-stage orchestrator.
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::DataSourceCache;
use crate::clients::{PerformanceAuditClient, SearchResultsClient, TextGenerationClient};
use crate::error::AnalysisError;
use crate::model::{ComprehensiveAnalysis, Competitor, SearchResult};
use crate::orchestrator::AnalysisOrchestrator;
use crate::validator::CompetitorValidator;

/// Per-call limits on the language-model passes. `None` waits indefinitely
/// (the HTTP client's own timeout still applies).
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub validation_timeout: Option<Duration>,
    pub analysis_timeout: Option<Duration>,
}

pub struct SeoAnalyzer {
    audits: Arc<dyn PerformanceAuditClient>,
    search: Arc<dyn SearchResultsClient>,
    orchestrator: AnalysisOrchestrator,
    cache: Arc<DataSourceCache>,
}

impl SeoAnalyzer {
    pub fn new(
        audits: Arc<dyn PerformanceAuditClient>,
        search: Arc<dyn SearchResultsClient>,
        llm: Arc<dyn TextGenerationClient>,
        options: PipelineOptions,
    ) -> Self {
        let validator =
            CompetitorValidator::new(Arc::clone(&llm)).with_timeout(options.validation_timeout);
        let orchestrator =
            AnalysisOrchestrator::new(llm, validator).with_timeout(options.analysis_timeout);
        Self {
            audits,
            search,
            orchestrator,
            cache: Arc::new(DataSourceCache::disabled()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<DataSourceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn analyze(
        &self,
        url: &str,
        query: &str,
        location: &str,
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        let url = normalize_target_url(url)?;
        let query = required("query", query)?;
        let location = required("location", location)?;
        info!(url = %url, query, location, "starting analysis");

        let (audit, results) =
            futures::try_join!(self.fetch_audit(&url), self.fetch_search(query, location))?;

        self.orchestrator
            .analyze(&url, query, location, &audit, &results)
            .await
    }

    /// Run only the competitor validation stage for a query.
    pub async fn validate_competitors(
        &self,
        query: &str,
        location: &str,
    ) -> Result<Vec<Competitor>, AnalysisError> {
        let query = required("query", query)?;
        let location = required("location", location)?;
        let results = self.fetch_search(query, location).await?;
        Ok(self
            .orchestrator
            .validator()
            .validate(query, location, &results)
            .await)
    }

    async fn fetch_audit(&self, url: &str) -> Result<serde_json::Value, AnalysisError> {
        if let Some(cached) = self.cache.get_audit(url).await {
            info!(url, "performance audit cache hit");
            return Ok(cached);
        }
        let audit = self.audits.audit(url).await.map_err(|e| {
            warn!(error = %e, url, "performance audit failed");
            AnalysisError::DataSource {
                service: "performance audit",
                message: e.to_string(),
            }
        })?;
        self.cache.set_audit(url, &audit).await;
        Ok(audit)
    }

    async fn fetch_search(
        &self,
        query: &str,
        location: &str,
    ) -> Result<Vec<SearchResult>, AnalysisError> {
        if let Some(cached) = self.cache.get_search_results(query, location).await {
            info!(query, location, "search results cache hit");
            return Ok(cached);
        }
        let results = self.search.search(query, location).await.map_err(|e| {
            warn!(error = %e, query, location, "search failed");
            AnalysisError::DataSource {
                service: "search results",
                message: e.to_string(),
            }
        })?;
        if !results.is_empty() {
            self.cache.set_search_results(query, location, &results).await;
        }
        Ok(results)
    }
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, AnalysisError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AnalysisError::InvalidInput(format!("{name} must not be empty")));
    }
    Ok(value)
}

/// Trim the URL, default the scheme to https and lowercase it.
fn normalize_target_url(url: &str) -> Result<String, AnalysisError> {
    let url = required("url", url)?;
    let with_scheme = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    let Some((scheme, rest)) = with_scheme.split_once("://") else {
        return Err(AnalysisError::InvalidInput(format!("invalid url: {url}")));
    };
    let scheme = scheme.to_ascii_lowercase();
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if !matches!(scheme.as_str(), "http" | "https") || host.is_empty() || host.contains(char::is_whitespace) {
        return Err(AnalysisError::InvalidInput(format!("invalid url: {url}")));
    }
    Ok(format!("{scheme}://{rest}"))
}
