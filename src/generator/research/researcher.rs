use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::ResearchResult,
    generator::{context::ResearchContext, prompts, research::ResearchUnitExecutor},
    llm::{client::generate_object, tools::web_search::SearchProvider},
    types::ResearchUnitTask,
    utils::token_budget::{count_tokens, fit_template, fit_template_parts, trim_text},
};

pub const QUERIES_COST_LABEL: &str = "research-unit:queries";
pub const SEARCH_COST_LABEL: &str = "research-unit:search";
pub const RESEARCH_UNIT_COST_LABEL: &str = "research-unit";

/// 研究单元的搜索查询
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchQueries {
    /// Focused web search queries for the topic.
    pub queries: Vec<String>,
}

/// 搜索 + 提炼的研究单元，没有搜索服务时只依赖模型自身知识
pub struct SearchResearcher {
    search: Option<Arc<dyn SearchProvider>>,
    max_results: u32,
}

impl SearchResearcher {
    pub fn new(search: Arc<dyn SearchProvider>, max_results: u32) -> Self {
        Self {
            search: Some(search),
            max_results,
        }
    }

    pub fn model_only() -> Self {
        Self {
            search: None,
            max_results: 0,
        }
    }

    async fn plan_queries(
        &self,
        context: &ResearchContext,
        topic: &str,
        date: &str,
    ) -> ResearchResult<Vec<String>> {
        let max_queries = context.config.max_search_queries;
        let prompt = fit_template(
            |topic| prompts::search_queries_prompt(topic, max_queries, date),
            topic,
            context.config.research_model_max_tokens,
            0,
        );
        let response = generate_object::<SearchQueries>(
            context.model.as_ref(),
            context.research_request(prompt),
        )
        .await?;
        context.record_llm_cost(
            &context.config.research_model,
            response.usage,
            QUERIES_COST_LABEL,
        );

        let mut queries: Vec<String> = response
            .object
            .queries
            .into_iter()
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty())
            .collect();
        queries.truncate(max_queries);
        if queries.is_empty() {
            queries.push(topic.to_string());
        }
        Ok(queries)
    }

    /// 执行搜索，返回整理后的结果文本和来源
    async fn gather(
        &self,
        context: &ResearchContext,
        search: &dyn SearchProvider,
        queries: &[String],
    ) -> ResearchResult<(String, Vec<String>)> {
        let mut findings = String::new();
        let mut sources: Vec<String> = Vec::new();

        for query in queries {
            context.check_cancelled()?;
            match context.guard(search.search(query, self.max_results)).await {
                Ok(results) => {
                    context.record_api_cost(
                        &search.cost_id(),
                        search.cost_per_query(),
                        SEARCH_COST_LABEL,
                    );
                    debug!("🌐 {} 返回{}条结果: {}", search.name(), results.len(), query);
                    findings.push_str(&format!("### Query: {}\n", query));
                    for result in results {
                        findings.push_str(&format!(
                            "- {} ({})\n  {}\n",
                            result.title, result.url, result.snippet
                        ));
                        if !result.url.is_empty() && !sources.contains(&result.url) {
                            sources.push(result.url);
                        }
                    }
                    findings.push('\n');
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("⚠️ 搜索失败 [{}]: {}", query, e);
                    findings.push_str(&format!("### Query: {}\nSearch failed: {}\n\n", query, e));
                }
            }
        }

        Ok((findings, sources))
    }
}

#[async_trait]
impl ResearchUnitExecutor for SearchResearcher {
    async fn execute(
        &self,
        context: &ResearchContext,
        task: ResearchUnitTask,
    ) -> ResearchResult<String> {
        context.check_cancelled()?;
        debug!("🔬 研究单元#{} 开始: {}", task.ordinal, task.topic);
        let date = prompts::today();

        let (findings, sources) = match &self.search {
            Some(search) => {
                let queries = self.plan_queries(context, &task.topic, &date).await?;
                self.gather(context, search.as_ref(), &queries).await?
            }
            None => (String::new(), Vec::new()),
        };

        let prompt = fit_template_parts(
            |topic, findings| prompts::research_summary_prompt(topic, findings, &date),
            &task.topic,
            count_tokens(&findings),
            |budget| trim_text(&findings, budget),
            context.config.research_model_max_tokens,
            0,
        );
        let response = context
            .model
            .generate_text(context.research_request(prompt))
            .await?;
        context.record_llm_cost(
            &context.config.research_model,
            response.usage,
            RESEARCH_UNIT_COST_LABEL,
        );

        let mut note = format!("## {}\n\n{}", task.topic, response.text.trim());
        if !sources.is_empty() {
            note.push_str("\n\nSources:\n");
            for url in &sources {
                note.push_str(&format!("- {}\n", url));
            }
        }
        Ok(note)
    }
}
