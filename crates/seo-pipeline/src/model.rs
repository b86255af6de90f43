use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Substituted when the report pass says nothing about a validated competitor.
pub const NO_ANALYSIS_PLACEHOLDER: &str = "No specific analysis generated for this competitor.";

/// Scores at or above this are `good`.
pub const GOOD_THRESHOLD: f64 = 90.0;
/// Scores at or above this (and below `GOOD_THRESHOLD`) are `warning`.
pub const WARNING_THRESHOLD: f64 = 50.0;

/// One organic search result, in the order the search engine ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: u32,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Provider-specific fields carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A validated business competitor. `rank`, `url` and `title` always come from
/// the search result it was validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Competitor {
    pub rank: u32,
    pub url: String,
    pub title: String,
    pub analysis: String,
}

impl Competitor {
    pub fn from_result(result: &SearchResult) -> Self {
        Self {
            rank: result.rank,
            url: result.url.clone(),
            title: result.title.clone(),
            analysis: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    #[serde(alias = "Good")]
    Good,
    #[serde(alias = "Warning")]
    Warning,
    #[serde(alias = "Bad")]
    Bad,
}

impl MetricStatus {
    /// Classify a 0–100 score.
    pub fn from_score(score: f64) -> Self {
        if score >= GOOD_THRESHOLD {
            MetricStatus::Good
        } else if score >= WARNING_THRESHOLD {
            MetricStatus::Warning
        } else {
            MetricStatus::Bad
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TechnicalSeoMetric {
    /// Score text as reported, e.g. `"92/100"`.
    pub metric: String,
    pub status: MetricStatus,
    #[serde(default)]
    pub recommendation: String,
}

impl TechnicalSeoMetric {
    /// The score carried by `metric`, if it holds one in 0–100.
    ///
    /// Accepts `"92/100"` (the number directly before `/100`, anywhere in the
    /// text), a bare `"92"` or `"92%"`. Other text yields `None`, so counts
    /// such as `"3 render-blocking resources"` are never taken for a score.
    pub fn score(&self) -> Option<f64> {
        let text = self.metric.trim();
        let score = match out_of_hundred(text) {
            Some(score) => score,
            None => text.strip_suffix('%').unwrap_or(text).trim_end().parse::<f64>().ok()?,
        };
        (0.0..=100.0).contains(&score).then_some(score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSeo {
    pub performance: TechnicalSeoMetric,
    pub accessibility: TechnicalSeoMetric,
    pub best_practices: TechnicalSeoMetric,
    pub seo: TechnicalSeoMetric,
    pub pwa: TechnicalSeoMetric,
    #[serde(deserialize_with = "lenient_score")]
    pub overall_score: i64,
}

impl TechnicalSeo {
    fn metrics_mut(&mut self) -> [&mut TechnicalSeoMetric; 5] {
        [
            &mut self.performance,
            &mut self.accessibility,
            &mut self.best_practices,
            &mut self.seo,
            &mut self.pwa,
        ]
    }

    /// Category scores in report order, when every metric carries one.
    pub fn scores(&self) -> Option<[f64; 5]> {
        Some([
            self.performance.score()?,
            self.accessibility.score()?,
            self.best_practices.score()?,
            self.seo.score()?,
            self.pwa.score()?,
        ])
    }

    /// Recompute `overall_score` and every `status` from the metric scores.
    ///
    /// Returns `false` and leaves the model's values alone when any metric has
    /// no readable score.
    pub fn normalize(&mut self) -> bool {
        let Some(scores) = self.scores() else {
            return false;
        };
        self.overall_score = overall_score(scores);
        for (metric, score) in self.metrics_mut().into_iter().zip(scores) {
            metric.status = MetricStatus::from_score(score);
        }
        true
    }
}

/// The number written immediately before the first `/100` in `text`.
fn out_of_hundred(text: &str) -> Option<f64> {
    let slash = text.find("/100")?;
    if text[slash + 4..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let head = text[..slash].trim_end();
    let start = head
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    head[start..].parse::<f64>().ok()
}

/// Accepts `94`, `94.6` or `"94.6"` and rounds to the nearest integer.
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let value = match RawScore::deserialize(deserializer)? {
        RawScore::Int(n) => return Ok(n),
        RawScore::Float(f) => f,
        RawScore::Text(text) => text.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("overallScore is not a number: {text:?}"))
        })?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom("overallScore is not finite"));
    }
    Ok(value.round() as i64)
}

/// Rounded mean of the five category scores.
pub fn overall_score(scores: [f64; 5]) -> i64 {
    (scores.iter().sum::<f64>() / scores.len() as f64).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum KeywordType {
    #[serde(alias = "primary")]
    Primary,
    #[serde(alias = "secondary")]
    Secondary,
    #[serde(rename = "LSI", alias = "lsi", alias = "Lsi")]
    Lsi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Keyword {
    pub keyword: String,
    #[serde(rename = "type")]
    pub kind: KeywordType,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentGap {
    pub topic: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WebSource {
    pub uri: String,
    pub title: String,
}

/// A web page the model consulted while writing the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroundingChunk {
    pub web: WebSource,
}

/// The finished report handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveAnalysis {
    pub technical_seo: TechnicalSeo,
    pub keywords: Vec<Keyword>,
    pub competitors: Vec<Competitor>,
    pub content_gaps: Vec<ContentGap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

/// The report as the model wrote it, before reconciliation.
///
/// Competitor rank and title are deliberately not read: only `url` (to match
/// against the validated list) and `analysis` are taken from the model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub technical_seo: TechnicalSeo,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub competitors: Vec<ModelCompetitor>,
    #[serde(default)]
    pub content_gaps: Vec<ContentGap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelCompetitor {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub analysis: Option<String>,
}

/// URL equality tolerant of surrounding whitespace and one trailing slash.
pub fn urls_match(a: &str, b: &str) -> bool {
    fn canonical(url: &str) -> &str {
        let url = url.trim();
        url.strip_suffix('/').unwrap_or(url)
    }
    canonical(a) == canonical(b)
}
