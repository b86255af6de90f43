/// Stage 1: competitor validation.
///
/// Best effort. Whatever goes wrong (transport error, timeout, no JSON, bad
/// JSON), the caller gets an empty list and the analysis continues without
/// competitor grounding.
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::clients::TextGenerationClient;
use crate::error::{ClientError, FormatError};
use crate::json_extract::{parse_embedded, JsonParse};
use crate::model::{urls_match, Competitor, SearchResult};
use crate::prompts;

#[derive(Debug, thiserror::Error)]
enum ValidationFailure {
    #[error("failed to build prompt: {0}")]
    Prompt(#[from] serde_json::Error),

    #[error("text generation failed: {0}")]
    Generation(#[from] ClientError),

    #[error("text generation timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// The model may answer with a bare array or wrap it in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateList {
    Bare(Vec<Candidate>),
    Wrapped { competitors: Vec<Candidate> },
}

impl CandidateList {
    fn into_vec(self) -> Vec<Candidate> {
        match self {
            CandidateList::Bare(list) | CandidateList::Wrapped { competitors: list } => list,
        }
    }
}

/// Only the URL is read back; rank and title are re-taken from the search result.
/// Entries without one are skipped rather than failing the whole list.
#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Clone)]
pub struct CompetitorValidator {
    llm: Arc<dyn TextGenerationClient>,
    timeout: Option<Duration>,
}

impl CompetitorValidator {
    pub fn new(llm: Arc<dyn TextGenerationClient>) -> Self {
        Self { llm, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Select the genuine business competitors among `results`.
    ///
    /// Never fails. The returned competitors are a subsequence of `results`
    /// (matched by URL) with empty `analysis`.
    pub async fn validate(
        &self,
        query: &str,
        location: &str,
        results: &[SearchResult],
    ) -> Vec<Competitor> {
        if results.is_empty() {
            info!(query, location, "no search results to validate");
            return Vec::new();
        }

        match self.try_validate(query, location, results).await {
            Ok(competitors) => {
                info!(
                    query,
                    location,
                    candidates = results.len(),
                    validated = competitors.len(),
                    "competitor validation complete"
                );
                competitors
            }
            Err(e) => {
                warn!(
                    error = %e,
                    query,
                    location,
                    "competitor validation failed, continuing without competitors"
                );
                Vec::new()
            }
        }
    }

    async fn try_validate(
        &self,
        query: &str,
        location: &str,
        results: &[SearchResult],
    ) -> Result<Vec<Competitor>, ValidationFailure> {
        let prompt = prompts::competitor_validation_prompt(query, location, results)?;

        let generation = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.llm.generate(&prompt))
                .await
                .map_err(|_| ValidationFailure::TimedOut(limit))??,
            None => self.llm.generate(&prompt).await?,
        };

        let candidates = match parse_embedded::<CandidateList>(&generation.text) {
            JsonParse::Parsed(list) => list.into_vec(),
            JsonParse::NotFound => return Err(FormatError::NoJsonFound.into()),
            JsonParse::ParseError(reason) => return Err(FormatError::MalformedJson(reason).into()),
        };

        Ok(ground_candidates(candidates, results))
    }
}

/// Keep candidates that name a real search result, in the model's order,
/// first occurrence only.
fn ground_candidates(candidates: Vec<Candidate>, results: &[SearchResult]) -> Vec<Competitor> {
    let mut grounded: Vec<Competitor> = Vec::with_capacity(candidates.len());
    for url in candidates.into_iter().filter_map(|c| c.url) {
        if url.trim().is_empty() {
            continue;
        }
        let Some(result) = results.iter().find(|r| urls_match(&r.url, &url)) else {
            warn!(url = %url, "validated competitor not in search results, dropping");
            continue;
        };
        if grounded.iter().any(|c| urls_match(&c.url, &result.url)) {
            continue;
        }
        grounded.push(Competitor::from_result(result));
    }
    grounded
}
