/// Collaborator interfaces consumed by the pipeline, and their production
/// implementations on top of the `seo-common` HTTP clients.
///
/// The pipeline only ever holds `Arc<dyn ...>` handles so tests can swap in
/// fakes without network access.
use async_trait::async_trait;
use seo_common::http::UpstreamError;
use seo_common::openai::OpenAiClient;
use seo_common::pagespeed::PageSpeedClient;
use seo_common::serp::SerpApiClient;

use crate::error::ClientError;
use crate::model::SearchResult;

/// Site performance audit (performance, accessibility, best practices, SEO, PWA).
#[async_trait]
pub trait PerformanceAuditClient: Send + Sync {
    /// Raw audit data; treated as opaque JSON by the pipeline.
    async fn audit(&self, url: &str) -> Result<serde_json::Value, ClientError>;
}

/// Organic search results for a query as seen from a location.
#[async_trait]
pub trait SearchResultsClient: Send + Sync {
    async fn search(&self, query: &str, location: &str) -> Result<Vec<SearchResult>, ClientError>;
}

/// Single-shot text completion.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, ClientError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Present only when the service reported grounding metadata.
    pub citations: Option<Vec<Citation>>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citation {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[async_trait]
impl PerformanceAuditClient for PageSpeedClient {
    async fn audit(&self, url: &str) -> Result<serde_json::Value, ClientError> {
        Ok(self.run_pagespeed(url).await?)
    }
}

#[async_trait]
impl SearchResultsClient for SerpApiClient {
    async fn search(&self, query: &str, location: &str) -> Result<Vec<SearchResult>, ClientError> {
        let organic = self.organic_results(query, location).await?;
        Ok(organic
            .into_iter()
            .map(|r| SearchResult {
                rank: r.position,
                url: r.link,
                title: r.title,
                snippet: r.snippet,
                extra: r.extra,
            })
            .collect())
    }
}

#[async_trait]
impl TextGenerationClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, ClientError> {
        let response = self.chat_completions(self.prompt_request(prompt)).await?;
        let message = response
            .first_message()
            .ok_or(UpstreamError::MissingField("choices[0].message"))?;
        let text = message
            .content
            .clone()
            .ok_or(UpstreamError::MissingField("choices[0].message.content"))?;

        let citations = message.annotations.as_ref().map(|annotations| {
            annotations
                .iter()
                .filter(|a| a.kind == "url_citation")
                .filter_map(|a| a.url_citation.as_ref())
                .map(|c| Citation {
                    uri: c.url.clone(),
                    title: c.title.clone(),
                })
                .collect()
        });

        Ok(Generation { text, citations })
    }
}
