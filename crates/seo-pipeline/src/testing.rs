/// Fakes for the external collaborators.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::{
    Generation, PerformanceAuditClient, SearchResultsClient, TextGenerationClient,
};
use crate::error::ClientError;
use crate::model::SearchResult;

pub fn search_result(rank: u32, url: &str, title: &str) -> SearchResult {
    SearchResult {
        rank,
        url: url.to_string(),
        title: title.to_string(),
        snippet: None,
        extra: serde_json::Map::new(),
    }
}

/// Replays scripted responses in order and records every prompt it was given.
pub struct FakeTextGeneration {
    responses: Mutex<VecDeque<Result<Generation, ClientError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeTextGeneration {
    pub fn new(
        responses: impl IntoIterator<Item = Result<Generation, ClientError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn replying<'a>(texts: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Self::new(texts.into_iter().map(|t| Ok(Generation::text(t))))
    }

    pub fn delayed(
        responses: impl IntoIterator<Item = Result<Generation, ClientError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationClient for FakeTextGeneration {
    async fn generate(&self, prompt: &str) -> Result<Generation, ClientError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Other("no scripted response left".to_string())))
    }
}

pub struct FakeAudit {
    pub result: Result<serde_json::Value, String>,
    pub calls: AtomicUsize,
}

impl FakeAudit {
    pub fn ok(value: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(value),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerformanceAuditClient for FakeAudit {
    async fn audit(&self, _url: &str) -> Result<serde_json::Value, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ClientError::Other)
    }
}

pub struct FakeSearch {
    pub result: Result<Vec<SearchResult>, String>,
}

impl FakeSearch {
    pub fn ok(results: Vec<SearchResult>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(results),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
        })
    }
}

#[async_trait]
impl SearchResultsClient for FakeSearch {
    async fn search(&self, _query: &str, _location: &str) -> Result<Vec<SearchResult>, ClientError> {
        self.result.clone().map_err(ClientError::Other)
    }
}
