/// Prompt text for the two language-model passes.
///
/// Both prompts ask for bare JSON, but the response is still run through
/// `json_extract` because models add prose and fences regardless.
use serde::Serialize;

use crate::model::{Competitor, SearchResult, GOOD_THRESHOLD, WARNING_THRESHOLD};

#[derive(Serialize)]
struct ResultView<'a> {
    rank: u32,
    url: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    snippet: Option<&'a str>,
}

#[derive(Serialize)]
struct CompetitorView<'a> {
    rank: u32,
    url: &'a str,
    title: &'a str,
}

/// Stage 1: narrow raw search results down to genuine business competitors.
pub fn competitor_validation_prompt(
    query: &str,
    location: &str,
    results: &[SearchResult],
) -> Result<String, serde_json::Error> {
    let view: Vec<ResultView<'_>> = results
        .iter()
        .map(|r| ResultView {
            rank: r.rank,
            url: &r.url,
            title: &r.title,
            snippet: r.snippet.as_deref(),
        })
        .collect();
    let results_json = serde_json::to_string_pretty(&view)?;

    Ok(format!(
        "You are a market analyst. Below are the organic Google search results for the query \
\"{query}\" in \"{location}\".\n\n\
SEARCH RESULTS:\n{results_json}\n\n\
TASK:\n\
1. Select the 3 to 5 results that are genuine businesses offering \"{query}\" as a service or product.\n\
2. Exclude informational content: blog posts, \"top 10\"/\"best of\" listicles, news articles, \
directories, review aggregators, marketplaces and forums.\n\
3. For each selected result return ONLY its \"rank\", \"url\" and \"title\", copied exactly as they \
appear in the search results above. Do not invent or modify any value.\n\
4. If fewer than 3 results qualify, return an empty array: []\n\n\
OUTPUT:\n\
Respond with the raw JSON array only, no commentary and no markdown code fences. Example:\n\
[{{\"rank\": 1, \"url\": \"https://example.com\", \"title\": \"Example Co\"}}]"
    ))
}

/// Stage 2: the full strategic report, scoped to the validated competitors.
pub fn analysis_prompt(
    url: &str,
    query: &str,
    location: &str,
    performance_audit: &serde_json::Value,
    competitors: &[Competitor],
) -> Result<String, serde_json::Error> {
    let audit_json = serde_json::to_string(performance_audit)?;
    let view: Vec<CompetitorView<'_>> = competitors
        .iter()
        .map(|c| CompetitorView {
            rank: c.rank,
            url: &c.url,
            title: &c.title,
        })
        .collect();
    let competitors_json = serde_json::to_string_pretty(&view)?;
    let good = GOOD_THRESHOLD as u32;
    let warning = WARNING_THRESHOLD as u32;

    Ok(format!(
        "You are a senior SEO strategist. Produce a comprehensive SEO and competitive analysis for \
the website {url}, targeting the search query \"{query}\" in \"{location}\".\n\n\
PERFORMANCE AUDIT (PageSpeed Insights / Lighthouse, raw JSON):\n{audit_json}\n\n\
VALIDATED COMPETITORS (genuine businesses ranking for the query; these are the ONLY competitors \
you may reference):\n{competitors_json}\n\n\
INSTRUCTIONS:\n\
1. Technical SEO: for each of performance, accessibility, bestPractices, seo and pwa, read the \
category score from the audit on a 0-100 scale. Report it in \"metric\" as \"<score>/100\". Set \
\"status\" to \"good\" if the score is {good} or higher, \"warning\" if it is {warning} or higher, \
otherwise \"bad\". Give one concrete, prioritized \"recommendation\" drawn from the audit findings. \
Set \"overallScore\" to the average of the five scores rounded to the nearest integer.\n\
2. Keywords: extract 8 to 12 keywords for the query, each typed \"Primary\", \"Secondary\" or \
\"LSI\", with short \"notes\" on intent or usage. Base them on the target site and the validated \
competitors only.\n\
3. Competitors: for every validated competitor above, write an \"analysis\" of its positioning, \
strengths and weaknesses relative to {url}. Use the competitor's \"url\" exactly as given. Do not \
add, remove or reorder competitors.\n\
4. Content gaps: identify 3 to 6 topics the validated competitors cover that {url} does not, each \
with a concrete \"recommendation\".\n\n\
OUTPUT:\n\
Respond with a single JSON object and nothing else (no commentary, no markdown fences), matching \
this schema:\n\
{{\n\
  \"technicalSeo\": {{\n\
    \"performance\": {{\"metric\": \"<score>/100\", \"status\": \"good|warning|bad\", \"recommendation\": \"...\"}},\n\
    \"accessibility\": {{\"metric\": \"<score>/100\", \"status\": \"good|warning|bad\", \"recommendation\": \"...\"}},\n\
    \"bestPractices\": {{\"metric\": \"<score>/100\", \"status\": \"good|warning|bad\", \"recommendation\": \"...\"}},\n\
    \"seo\": {{\"metric\": \"<score>/100\", \"status\": \"good|warning|bad\", \"recommendation\": \"...\"}},\n\
    \"pwa\": {{\"metric\": \"<score>/100\", \"status\": \"good|warning|bad\", \"recommendation\": \"...\"}},\n\
    \"overallScore\": 0\n\
  }},\n\
  \"keywords\": [{{\"keyword\": \"...\", \"type\": \"Primary|Secondary|LSI\", \"notes\": \"...\"}}],\n\
  \"competitors\": [{{\"rank\": 0, \"url\": \"...\", \"title\": \"...\", \"analysis\": \"...\"}}],\n\
  \"contentGaps\": [{{\"topic\": \"...\", \"recommendation\": \"...\"}}]\n\
}}"
    ))
}
