//! SerpAPI web search client.
//!
//! Returns the top organic result snippets joined into one grounding context
//! block for the LLM.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const SERPAPI_URL: &str = "https://serpapi.com";

/// Snippets taken from the top of the organic results.
pub const MAX_RESULTS: usize = 5;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("search network error: {0}")]
    NetworkError(String),

    #[error("search provider error: {0}")]
    ProviderError(String),

    #[error("search configuration error: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

pub struct SerpApiClient {
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

impl SerpApiClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<String>,
        http: reqwest::Client,
    ) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SearchError::InvalidConfiguration(
                "SerpAPI key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            endpoint: endpoint.unwrap_or_else(|| SERPAPI_URL.to_string()),
            http,
        })
    }

    /// Search the web and return concatenated top-result snippets, or `None`
    /// when the query produced no organic results.
    pub async fn search(&self, query: &str) -> Result<Option<String>, SearchError> {
        let url = format!("{}/search", self.endpoint.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("engine", "google"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(format!("SerpAPI request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SearchError::AuthenticationFailed(
                "SerpAPI rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ProviderError(format!(
                "SerpAPI returned {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ProviderError(format!("invalid SerpAPI response: {e}")))?;

        let snippets: Vec<String> = parsed
            .organic_results
            .into_iter()
            .take(MAX_RESULTS)
            .filter_map(|result| {
                let snippet = result.snippet?;
                Some(match result.title {
                    Some(title) => format!("{title}: {snippet}"),
                    None => snippet,
                })
            })
            .collect();

        debug!("SerpAPI returned {} usable snippets", snippets.len());

        if snippets.is_empty() {
            Ok(None)
        } else {
            Ok(Some(snippets.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let result = SerpApiClient::new("", None, reqwest::Client::new());
        assert!(matches!(result, Err(SearchError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_response_parsing_skips_snippetless_results() {
        let raw = r#"{"organic_results":[
            {"title":"A","snippet":"first"},
            {"title":"B"},
            {"snippet":"third"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let snippets: Vec<String> = parsed
            .organic_results
            .into_iter()
            .take(MAX_RESULTS)
            .filter_map(|r| {
                let snippet = r.snippet?;
                Some(match r.title {
                    Some(title) => format!("{title}: {snippet}"),
                    None => snippet,
                })
            })
            .collect();
        assert_eq!(snippets, vec!["A: first", "third"]);
    }
}
