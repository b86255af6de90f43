/// MCP server exposing the SEO analysis pipeline.
///
/// Tools:
/// - `analyze_site`: full report for a URL, query and location
/// - `validate_competitors`: competitor validation only, for inspecting stage 1
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use seo_pipeline::model::Competitor;
use seo_pipeline::{ComprehensiveAnalysis, SeoAnalyzer};

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct SeoAnalysisServer {
    analyzer: Arc<SeoAnalyzer>,
    limiter: Option<RateLimiter>,
    tool_router: ToolRouter<SeoAnalysisServer>,
}

impl SeoAnalysisServer {
    pub fn new(analyzer: Arc<SeoAnalyzer>, limiter: Option<RateLimiter>) -> Self {
        Self {
            analyzer,
            limiter,
            tool_router: Self::tool_router(),
        }
    }

    async fn gate(&self) -> Result<(), String> {
        if let Some(limiter) = &self.limiter {
            limiter.check().await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AnalyzeSiteParams {
    /// Website to analyze, e.g. "https://acme.example". The scheme defaults to https.
    url: String,
    /// Search query the site should rank for, e.g. "industrial widgets".
    query: String,
    /// Location the search is run from, e.g. "Denver, Colorado, United States".
    location: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ValidateCompetitorsParams {
    query: String,
    location: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct CompetitorsResponse {
    competitors: Vec<Competitor>,
}

#[tool_router]
impl SeoAnalysisServer {
    #[tool(description = "Run a comprehensive SEO and competitive analysis for a website: technical SEO scores from a PageSpeed audit, keywords, analysis of validated business competitors ranking for the query, and content gaps.")]
    async fn analyze_site(
        &self,
        Parameters(params): Parameters<AnalyzeSiteParams>,
    ) -> Result<Json<ComprehensiveAnalysis>, String> {
        self.gate().await?;
        info!(url = %params.url, query = %params.query, "analyze_site tool invoked");

        let analysis = self
            .analyzer
            .analyze(&params.url, &params.query, &params.location)
            .await
            .inspect_err(|e| warn!(error = %e, url = %params.url, "analysis failed"))
            .map_err(|e| format!("analysis failed: {e}"))?;
        Ok(Json(analysis))
    }

    #[tool(description = "Search for a query in a location and return only the results that are genuine businesses offering it (no blogs, listicles or directories).")]
    async fn validate_competitors(
        &self,
        Parameters(params): Parameters<ValidateCompetitorsParams>,
    ) -> Result<Json<CompetitorsResponse>, String> {
        self.gate().await?;
        let competitors = self
            .analyzer
            .validate_competitors(&params.query, &params.location)
            .await
            .map_err(|e| format!("competitor validation failed: {e}"))?;
        Ok(Json(CompetitorsResponse { competitors }))
    }
}

#[tool_handler]
impl ServerHandler for SeoAnalysisServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "seo-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SEO analysis MCP server. Use analyze_site with a URL, a target search query and a \
location to get a structured report (technicalSeo, keywords, competitors, contentGaps, and \
groundingChunks when the model cited sources). Use validate_competitors to see which search \
results count as business competitors for a query."
                    .to_string(),
            ),
        }
    }
}
