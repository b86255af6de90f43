/// Stage 2: the strategic analysis pass and reconciliation.
///
/// Unlike competitor validation this stage is all-or-nothing: a transport
/// failure, timeout or unusable response fails the whole request with a typed
/// `AnalysisError`.
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clients::{Citation, Generation, TextGenerationClient};
use crate::error::{AnalysisError, FormatError};
use crate::json_extract::{parse_embedded, JsonParse};
use crate::model::{
    urls_match, AnalysisPayload, ComprehensiveAnalysis, Competitor, GroundingChunk,
    ModelCompetitor, SearchResult, WebSource, NO_ANALYSIS_PLACEHOLDER,
};
use crate::prompts;
use crate::validator::CompetitorValidator;

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    llm: Arc<dyn TextGenerationClient>,
    validator: CompetitorValidator,
    timeout: Option<Duration>,
}

impl AnalysisOrchestrator {
    pub fn new(llm: Arc<dyn TextGenerationClient>, validator: CompetitorValidator) -> Self {
        Self {
            llm,
            validator,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validator(&self) -> &CompetitorValidator {
        &self.validator
    }

    pub async fn analyze(
        &self,
        url: &str,
        query: &str,
        location: &str,
        performance_audit: &serde_json::Value,
        search_results: &[SearchResult],
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        let validated = self.validator.validate(query, location, search_results).await;
        if validated.is_empty() {
            warn!(
                url,
                query,
                location,
                "no validated competitors, competitor sections will be ungrounded"
            );
        }

        let prompt = prompts::analysis_prompt(url, query, location, performance_audit, &validated)
            .map_err(|e| AnalysisError::Unknown(format!("failed to build analysis prompt: {e}")))?;

        let generation = self.generate(&prompt).await?;

        let payload = match parse_embedded::<AnalysisPayload>(&generation.text) {
            JsonParse::Parsed(payload) => payload,
            JsonParse::NotFound => return Err(FormatError::NoJsonFound.into()),
            JsonParse::ParseError(reason) => return Err(FormatError::MalformedJson(reason).into()),
        };

        let mut technical_seo = payload.technical_seo;
        if !technical_seo.normalize() {
            warn!(url, "metric scores unreadable, keeping reported overall score and statuses");
        }

        let competitors = reconcile_competitors(&validated, &payload.competitors);
        let grounding_chunks = grounding_chunks(generation.citations);

        info!(
            url,
            overall_score = technical_seo.overall_score,
            keywords = payload.keywords.len(),
            competitors = competitors.len(),
            content_gaps = payload.content_gaps.len(),
            citations = grounding_chunks.as_ref().map_or(0, Vec::len),
            "analysis complete"
        );

        Ok(ComprehensiveAnalysis {
            technical_seo,
            keywords: payload.keywords,
            competitors,
            content_gaps: payload.content_gaps,
            grounding_chunks,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, AnalysisError> {
        let call = self.llm.generate(prompt);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AnalysisError::Timeout(limit))?,
            None => call.await,
        };
        result.map_err(|e| AnalysisError::Upstream(e.to_string()))
    }
}

/// Rebuild the competitor list from the validated list.
///
/// Length, order, rank, url and title come from `validated`; only `analysis`
/// is taken from the model's entry with the same URL.
pub fn reconcile_competitors(validated: &[Competitor], model: &[ModelCompetitor]) -> Vec<Competitor> {
    validated
        .iter()
        .map(|v| {
            let analysis = model
                .iter()
                .find(|m| urls_match(&m.url, &v.url))
                .and_then(|m| m.analysis.as_deref())
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(NO_ANALYSIS_PLACEHOLDER);
            Competitor {
                rank: v.rank,
                url: v.url.clone(),
                title: v.title.clone(),
                analysis: analysis.to_string(),
            }
        })
        .collect()
}

/// Citations with a non-empty URI, or `None` when there are none to report.
pub fn grounding_chunks(citations: Option<Vec<Citation>>) -> Option<Vec<GroundingChunk>> {
    let chunks: Vec<GroundingChunk> = citations?
        .into_iter()
        .filter_map(|c| {
            let uri = c.uri.filter(|u| !u.trim().is_empty())?;
            Some(GroundingChunk {
                web: WebSource {
                    title: c.title.unwrap_or_else(|| uri.clone()),
                    uri,
                },
            })
        })
        .collect();
    (!chunks.is_empty()).then_some(chunks)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ClientError;
    use crate::model::MetricStatus;
    use crate::testing::{search_result, FakeTextGeneration};

    fn scenario_results() -> Vec<SearchResult> {
        vec![
            search_result(1, "a.com", "Acme Corp"),
            search_result(2, "b.com", "10 Best Widgets (blog)"),
            search_result(3, "c.com", "Beta Inc"),
        ]
    }

    const VALIDATION_REPLY: &str = r#"[{"rank": 1, "url": "a.com", "title": "Acme Corp"}, {"rank": 3, "url": "c.com", "title": "Beta Inc"}]"#;

    fn report_json(competitors: serde_json::Value) -> String {
        json!({
            "technicalSeo": {
                "performance": {"metric": "72/100", "status": "warning", "recommendation": "Defer offscreen images"},
                "accessibility": {"metric": "91/100", "status": "good", "recommendation": "Keep contrast ratios"},
                "bestPractices": {"metric": "100/100", "status": "good", "recommendation": "None"},
                "seo": {"metric": "85/100", "status": "warning", "recommendation": "Add meta descriptions"},
                "pwa": {"metric": "30/100", "status": "bad", "recommendation": "Add a web app manifest"},
                "overallScore": 50
            },
            "keywords": [
                {"keyword": "industrial widgets", "type": "Primary", "notes": "head term"},
                {"keyword": "widget repair denver", "type": "Secondary", "notes": "local intent"}
            ],
            "competitors": competitors,
            "contentGaps": [{"topic": "Widget sizing guide", "recommendation": "Publish a sizing calculator"}]
        })
        .to_string()
    }

    fn competitor(rank: u32, url: &str, title: &str) -> Competitor {
        Competitor {
            rank,
            url: url.to_string(),
            title: title.to_string(),
            analysis: String::new(),
        }
    }

    fn model_competitor(url: &str, analysis: Option<&str>) -> ModelCompetitor {
        ModelCompetitor {
            url: url.to_string(),
            analysis: analysis.map(str::to_string),
        }
    }

    fn orchestrator(llm: Arc<FakeTextGeneration>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(llm.clone(), CompetitorValidator::new(llm))
    }

    #[tokio::test]
    async fn scenario_keeps_validated_competitors_even_when_model_drifts() {
        // The model omits c.com and renames a.com.
        let report = report_json(json!([
            {"rank": 1, "url": "a.com", "title": "ACME Widgets International", "analysis": "Dominant local brand"},
            {"rank": 2, "url": "b.com", "title": "10 Best Widgets (blog)", "analysis": "Listicle"}
        ]));
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, report.as_str()]);

        let analysis = orchestrator(llm.clone())
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap();

        assert_eq!(
            analysis.competitors,
            vec![
                Competitor {
                    rank: 1,
                    url: "a.com".to_string(),
                    title: "Acme Corp".to_string(),
                    analysis: "Dominant local brand".to_string(),
                },
                Competitor {
                    rank: 3,
                    url: "c.com".to_string(),
                    title: "Beta Inc".to_string(),
                    analysis: NO_ANALYSIS_PLACEHOLDER.to_string(),
                },
            ]
        );
        assert_eq!(analysis.keywords.len(), 2);
        assert_eq!(analysis.content_gaps[0].topic, "Widget sizing guide");
        assert!(analysis.grounding_chunks.is_none());
    }

    #[tokio::test]
    async fn analysis_prompt_sees_only_validated_competitors() {
        let report = report_json(json!([]));
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, report.as_str()]);

        orchestrator(llm.clone())
            .analyze("https://target.example", "widgets", "Denver", &json!({"audit": 1}), &scenario_results())
            .await
            .unwrap();

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("b.com"));
        assert!(prompts[1].contains("c.com"));
        assert!(!prompts[1].contains("b.com"));
        assert!(prompts[1].contains("{\"audit\":1}"));
    }

    #[tokio::test]
    async fn fenced_report_is_extracted() {
        let fenced = format!("Here you go:\n```json\n{}\n```", report_json(json!([])));
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, fenced.as_str()]);

        let analysis = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap();

        // (72 + 91 + 100 + 85 + 30) / 5 = 75.6
        assert_eq!(analysis.technical_seo.overall_score, 76);
        assert_eq!(analysis.technical_seo.performance.status, MetricStatus::Warning);
        assert_eq!(analysis.technical_seo.pwa.status, MetricStatus::Bad);
        assert_eq!(analysis.competitors.len(), 2);
    }

    #[tokio::test]
    async fn fractional_overall_score_is_accepted() {
        let mut report: serde_json::Value = serde_json::from_str(&report_json(json!([]))).unwrap();
        report["technicalSeo"]["overallScore"] = json!(94.6);
        let text = report.to_string();
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, text.as_str()]);

        let analysis = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap();

        // Recomputed from the metric scores.
        assert_eq!(analysis.technical_seo.overall_score, 76);
    }

    #[tokio::test]
    async fn validation_failure_still_produces_report() {
        let report = report_json(json!([{"url": "a.com", "analysis": "should be ignored"}]));
        let llm = FakeTextGeneration::new([
            Err(ClientError::Other("quota exceeded".to_string())),
            Ok(Generation::text(report)),
        ]);

        let analysis = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap();

        assert!(analysis.competitors.is_empty());
        assert_eq!(analysis.keywords.len(), 2);
    }

    #[tokio::test]
    async fn report_without_json_fails_loudly() {
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, "I'm unable to analyze that site."]);
        let err = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidAnalysisFormat(FormatError::NoJsonFound)
        ));
    }

    #[tokio::test]
    async fn report_with_broken_json_is_malformed() {
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, "```json\n{\"technicalSeo\": {,}}\n```"]);
        let err = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidAnalysisFormat(FormatError::MalformedJson(_))
        ));
    }

    #[tokio::test]
    async fn report_missing_technical_seo_is_malformed() {
        let llm = FakeTextGeneration::replying([VALIDATION_REPLY, r#"{"keywords": []}"#]);
        let err = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidAnalysisFormat(FormatError::MalformedJson(_))
        ));
    }

    #[tokio::test]
    async fn transport_failure_carries_upstream_message() {
        let llm = FakeTextGeneration::new([
            Ok(Generation::text(VALIDATION_REPLY)),
            Err(ClientError::Other("401 invalid api key".to_string())),
        ]);
        let err = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap_err();
        match err {
            AnalysisError::Upstream(message) => assert!(message.contains("401 invalid api key")),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_report_times_out() {
        let llm = FakeTextGeneration::delayed(
            [Ok(Generation::text("[]")), Ok(Generation::text(report_json(json!([]))))],
            Duration::from_millis(200),
        );
        let err = AnalysisOrchestrator::new(llm.clone(), CompetitorValidator::new(llm))
            .with_timeout(Some(Duration::from_millis(20)))
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(_)));
    }

    #[tokio::test]
    async fn citations_become_grounding_chunks() {
        let llm = FakeTextGeneration::new([
            Ok(Generation::text(VALIDATION_REPLY)),
            Ok(Generation {
                text: report_json(json!([])),
                citations: Some(vec![
                    Citation {
                        uri: Some("https://source.example/widgets".to_string()),
                        title: Some("Widget market report".to_string()),
                    },
                    Citation {
                        uri: Some(String::new()),
                        title: Some("empty".to_string()),
                    },
                    Citation {
                        uri: None,
                        title: Some("missing".to_string()),
                    },
                ]),
            }),
        ]);
        let analysis = orchestrator(llm)
            .analyze("https://target.example", "widgets", "Denver", &json!({}), &scenario_results())
            .await
            .unwrap();
        let chunks = analysis.grounding_chunks.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].web.uri, "https://source.example/widgets");
        assert_eq!(chunks[0].web.title, "Widget market report");
    }

    #[test]
    fn reconcile_preserves_validated_order_and_identity() {
        let validated = vec![
            competitor(5, "e.com", "Echo LLC"),
            competitor(1, "a.com", "Acme Corp"),
            competitor(3, "c.com", "Beta Inc"),
        ];
        let model = vec![
            model_competitor("c.com", Some("Beta analysis")),
            model_competitor("z.com", Some("Invented")),
            model_competitor("a.com", Some("Acme analysis")),
        ];

        let reconciled = reconcile_competitors(&validated, &model);

        assert_eq!(reconciled.len(), validated.len());
        for (r, v) in reconciled.iter().zip(&validated) {
            assert_eq!((r.rank, &r.url, &r.title), (v.rank, &v.url, &v.title));
        }
        assert_eq!(reconciled[0].analysis, NO_ANALYSIS_PLACEHOLDER);
        assert_eq!(reconciled[1].analysis, "Acme analysis");
        assert_eq!(reconciled[2].analysis, "Beta analysis");
    }

    #[test]
    fn reconcile_uses_placeholder_for_blank_analysis() {
        let validated = vec![competitor(1, "a.com", "Acme Corp")];
        let reconciled = reconcile_competitors(&validated, &[model_competitor("a.com", Some("  "))]);
        assert_eq!(reconciled[0].analysis, NO_ANALYSIS_PLACEHOLDER);
        let reconciled = reconcile_competitors(&validated, &[model_competitor("a.com", None)]);
        assert_eq!(reconciled[0].analysis, NO_ANALYSIS_PLACEHOLDER);
    }

    #[test]
    fn reconcile_with_no_validated_competitors_is_empty() {
        let reconciled = reconcile_competitors(&[], &[model_competitor("a.com", Some("text"))]);
        assert!(reconciled.is_empty());
    }

    #[test]
    fn grounding_chunks_are_omitted_when_absent_or_empty() {
        assert_eq!(grounding_chunks(None), None);
        assert_eq!(grounding_chunks(Some(vec![])), None);
        let only_blank = vec![Citation {
            uri: Some("  ".to_string()),
            title: None,
        }];
        assert_eq!(grounding_chunks(Some(only_blank)), None);
    }

    #[test]
    fn grounding_chunk_without_title_uses_uri() {
        let chunks = grounding_chunks(Some(vec![Citation {
            uri: Some("https://source.example".to_string()),
            title: None,
        }]))
        .unwrap();
        assert_eq!(chunks[0].web.title, "https://source.example");
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn url() -> impl Strategy<Value = String> {
            "[a-e]\\.com/?"
        }

        fn validated() -> impl Strategy<Value = Vec<Competitor>> {
            prop::collection::vec((1u32..20, url(), "[A-Za-z ]{0,12}"), 0..6).prop_map(|rows| {
                rows.into_iter()
                    .map(|(rank, url, title)| Competitor {
                        rank,
                        url,
                        title,
                        analysis: String::new(),
                    })
                    .collect()
            })
        }

        fn model() -> impl Strategy<Value = Vec<ModelCompetitor>> {
            prop::collection::vec((url(), prop::option::of("[a-z ]{0,10}")), 0..8).prop_map(|rows| {
                rows.into_iter()
                    .map(|(url, analysis)| ModelCompetitor { url, analysis })
                    .collect()
            })
        }

        proptest! {
            /// Length, order, rank, url and title always come from the validated list.
            #[test]
            fn reconcile_keeps_validated_identity(v in validated(), m in model()) {
                let reconciled = reconcile_competitors(&v, &m);
                prop_assert_eq!(reconciled.len(), v.len());
                for (r, v) in reconciled.iter().zip(&v) {
                    prop_assert_eq!((r.rank, &r.url, &r.title), (v.rank, &v.url, &v.title));
                    prop_assert!(!r.analysis.trim().is_empty());
                }
            }

            /// An entry with no matching model URL gets the placeholder verbatim.
            #[test]
            fn reconcile_uses_placeholder_without_match(v in validated(), m in model()) {
                let reconciled = reconcile_competitors(&v, &m);
                for r in &reconciled {
                    if !m.iter().any(|mc| urls_match(&mc.url, &r.url)) {
                        prop_assert_eq!(r.analysis.as_str(), NO_ANALYSIS_PLACEHOLDER);
                    }
                }
            }
        }
    }
}
