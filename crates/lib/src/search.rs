//! Web-search client (Tavily HTTP API).
//!
//! Returns a bounded ranked list; the `search_or_empty` wrapper degrades to
//! an empty list on any provider failure so callers never see search errors.

use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Results retained per query; the rest of the provider ranking is dropped.
const MAX_RESULTS: usize = 3;

/// Client for the Tavily search API.
#[derive(Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search api error: {0}")]
    Api(String),
}

/// One ranked search hit. Transient, never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

fn bounded_results(data: SearchResponse) -> Vec<SearchResult> {
    let mut results = data.results.unwrap_or_default();
    results.truncate(MAX_RESULTS);
    results
}

impl TavilyClient {
    pub fn new(base_url: Option<String>, api_key: String) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// POST /search — ranked results for the query, at most three.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: MAX_RESULTS,
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SearchError::Api(format!("{} {}", status, body)));
        }
        let data: SearchResponse = res.json().await?;
        Ok(bounded_results(data))
    }

    /// Like `search`, but logs provider failures and returns an empty list.
    /// No retry, no caching; rate limits are the provider client's problem.
    pub async fn search_or_empty(&self, query: &str) -> Vec<SearchResult> {
        match self.search(query).await {
            Ok(results) => results,
            Err(e) => {
                log::warn!("search failed, continuing without results: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_are_bounded_to_three() {
        let data: SearchResponse = serde_json::from_str(
            r#"{"results":[
                {"title":"a","url":"https://a","content":"1"},
                {"title":"b","url":"https://b","content":"2"},
                {"title":"c","url":"https://c","content":"3"},
                {"title":"d","url":"https://d","content":"4"}
            ]}"#,
        )
        .expect("parse");
        let results = bounded_results(data);
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].title, "c");
    }

    #[test]
    fn missing_results_field_is_empty() {
        let data: SearchResponse = serde_json::from_str(r#"{"answer":null}"#).expect("parse");
        assert!(bounded_results(data).is_empty());
    }

    #[test]
    fn partial_result_fields_default() {
        let data: SearchResponse =
            serde_json::from_str(r#"{"results":[{"url":"https://a"}]}"#).expect("parse");
        let results = bounded_results(data);
        assert_eq!(results[0].title, "");
        assert_eq!(results[0].url, "https://a");
    }
}
