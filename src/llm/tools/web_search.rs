//! 网络搜索服务，研究单元据此收集资料

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResearchError, ResearchResult};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// 可插拔的搜索服务
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// 用于费用记录的标识
    fn cost_id(&self) -> String {
        format!("search:{}", self.name().to_lowercase())
    }

    /// 每次查询的固定费用（美元）
    fn cost_per_query(&self) -> f64;

    async fn search(&self, query: &str, max_results: u32) -> ResearchResult<Vec<SearchResult>>;
}

/// Tavily搜索
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    cost_per_query: f64,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, cost_per_query: f64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            cost_per_query,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "Tavily"
    }

    fn cost_per_query(&self) -> f64 {
        self.cost_per_query
    }

    async fn search(&self, query: &str, max_results: u32) -> ResearchResult<Vec<SearchResult>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": false,
        });

        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::Search(format!("Tavily request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Search(format!(
                "Tavily API error ({}): {}",
                status.as_u16(),
                err_body
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ResearchError::Search(format!("failed to parse Tavily response: {}", e)))?;

        Ok(parse_tavily_results(&data))
    }
}

fn parse_tavily_results(data: &Value) -> Vec<SearchResult> {
    let field = |item: &Value, key: &str| {
        item.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    data.get("results")
        .and_then(|r| r.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| SearchResult {
                    title: field(item, "title"),
                    url: field(item, "url"),
                    snippet: field(item, "content"),
                })
                .filter(|result| !result.url.is_empty() || !result.snippet.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tavily_results() {
        let data = json!({
            "query": "rust async",
            "results": [
                {"title": "Tokio", "url": "https://tokio.rs", "content": "An async runtime"},
                {"title": "", "url": "", "content": ""},
                {"title": "No url", "content": "snippet only"}
            ]
        });

        let results = parse_tavily_results(&data);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://tokio.rs");
        assert_eq!(results[0].snippet, "An async runtime");
        assert_eq!(results[1].url, "");
    }

    #[test]
    fn test_parse_tavily_missing_results() {
        assert!(parse_tavily_results(&json!({"error": "bad key"})).is_empty());
    }

    #[test]
    fn test_cost_id() {
        let tavily = TavilySearch::new("key", 0.008);
        assert_eq!(tavily.cost_id(), "search:tavily");
        assert_eq!(tavily.cost_per_query(), 0.008);
    }
}
