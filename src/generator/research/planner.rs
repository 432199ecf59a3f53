use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::ResearchResult,
    generator::{
        context::ResearchContext,
        prompts,
        research::{ResearchPlan, ResearchPlanner, SupervisorState},
    },
    llm::client::generate_object,
    types::ResearchBrief,
    utils::token_budget::{count_tokens, fit_template_parts, join_recent},
};

pub const SUPERVISOR_COST_LABEL: &str = "supervisor";

const NOTES_SEPARATOR: &str = "\n\n---\n\n";
const NO_FINDINGS: &str = "No findings yet.";

/// 监督者的规划决策
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SupervisorDecision {
    /// True when the findings already answer the research brief.
    pub research_complete: bool,
    /// Standalone research topics to delegate in this round.
    #[serde(default)]
    pub topics: Vec<String>,
}

/// 由研究模型做规划
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelResearchPlanner;

impl ModelResearchPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResearchPlanner for ModelResearchPlanner {
    async fn plan_next_research_units(
        &self,
        context: &ResearchContext,
        brief: &ResearchBrief,
        state: &SupervisorState,
    ) -> ResearchResult<ResearchPlan> {
        let config = &context.config;
        let date = prompts::today();
        let notes_tokens = if state.notes.is_empty() {
            count_tokens(NO_FINDINGS)
        } else {
            count_tokens(&state.notes.join(NOTES_SEPARATOR))
        };
        let prompt = fit_template_parts(
            |research_brief, notes| {
                prompts::planner_prompt(
                    research_brief,
                    state.iteration_count,
                    config.max_researcher_iterations,
                    config.max_concurrent_research_units,
                    notes,
                    &date,
                )
            },
            &brief.research_brief,
            notes_tokens,
            |budget| {
                if state.notes.is_empty() {
                    NO_FINDINGS.to_string()
                } else {
                    // 最近几轮的笔记优先保留
                    join_recent(&state.notes, NOTES_SEPARATOR, budget)
                }
            },
            config.research_model_max_tokens,
            0,
        );

        let response = generate_object::<SupervisorDecision>(
            context.model.as_ref(),
            context.research_request(prompt),
        )
        .await?;
        context.record_llm_cost(&config.research_model, response.usage, SUPERVISOR_COST_LABEL);

        let decision = response.object;
        let mut topics: Vec<String> = decision
            .topics
            .into_iter()
            .map(|topic| topic.trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();
        if topics.len() > config.max_concurrent_research_units {
            warn!(
                "⚠️ 模型给出{}个研究主题，只保留前{}个",
                topics.len(),
                config.max_concurrent_research_units
            );
            topics.truncate(config.max_concurrent_research_units);
        }
        debug!(
            "🧭 规划结果: complete={} topics={:?}",
            decision.research_complete, topics
        );

        if decision.research_complete || topics.is_empty() {
            return Ok(ResearchPlan::complete());
        }
        Ok(ResearchPlan::with_topics(topics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::generator::test_support::{ScriptedModel, TestHarness};
    use serde_json::json;

    fn brief() -> ResearchBrief {
        ResearchBrief {
            research_brief: "How do heat pumps perform in cold climates?".to_string(),
            title: "Cold-climate heat pumps".to_string(),
        }
    }

    #[tokio::test]
    async fn test_topics_beyond_limit_are_dropped() {
        let model = ScriptedModel::new().with_object(
            "SupervisorDecision",
            json!({"research_complete": false, "topics": ["a", " ", "b", "c", "d"]}),
        );
        let harness = TestHarness::new(
            RuntimeConfig {
                max_concurrent_research_units: 2,
                ..Default::default()
            },
            model,
        );

        let plan = ModelResearchPlanner
            .plan_next_research_units(&harness.context, &brief(), &SupervisorState::new())
            .await
            .unwrap();

        let topics: Vec<_> = plan.tasks.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(topics, vec!["a", "b"]);
        assert_eq!(plan.tasks[1].ordinal, 1);
        assert_eq!(harness.costs.entries_with_label(SUPERVISOR_COST_LABEL).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_topics_mean_complete() {
        let model = ScriptedModel::new().with_object(
            "SupervisorDecision",
            json!({"research_complete": false, "topics": []}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model);

        let plan = ModelResearchPlanner
            .plan_next_research_units(&harness.context, &brief(), &SupervisorState::new())
            .await
            .unwrap();
        assert!(plan.is_finished());
        assert!(plan.research_complete);
    }

    #[tokio::test]
    async fn test_prompt_includes_existing_notes() {
        let model = ScriptedModel::new().with_object(
            "SupervisorDecision",
            json!({"research_complete": true}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model.clone());
        let state = SupervisorState {
            notes: vec!["COP drops below -15C".to_string()],
            iteration_count: 1,
            is_complete: false,
        };

        ModelResearchPlanner
            .plan_next_research_units(&harness.context, &brief(), &state)
            .await
            .unwrap();

        let prompts = model.prompts_for("SupervisorDecision");
        assert!(prompts[0].contains("COP drops below -15C"));
        assert!(prompts[0].contains("planning round 2"));
    }

    #[tokio::test]
    async fn test_oversized_brief_stays_within_research_budget() {
        let model = ScriptedModel::new().with_object(
            "SupervisorDecision",
            json!({"research_complete": true}),
        );
        let harness = TestHarness::new(
            RuntimeConfig {
                research_model_max_tokens: 1000,
                ..Default::default()
            },
            model.clone(),
        );
        let brief = ResearchBrief {
            research_brief: "Compare heat pump efficiency across climates. ".repeat(300),
            title: "Heat pumps".to_string(),
        };
        let state = SupervisorState {
            notes: vec!["LATEST-NOTE COP stays above 2 at -20C".to_string()],
            iteration_count: 1,
            is_complete: false,
        };

        ModelResearchPlanner
            .plan_next_research_units(&harness.context, &brief, &state)
            .await
            .unwrap();

        let prompt = &model.prompts_for("SupervisorDecision")[0];
        assert!(count_tokens(prompt) <= 1000);
        assert!(prompt.contains("LATEST-NOTE COP stays above 2 at -20C"));
        assert!(prompt.contains("Compare heat pump efficiency"));
    }

    #[tokio::test]
    async fn test_newest_notes_survive_tight_budget() {
        let model = ScriptedModel::new().with_object(
            "SupervisorDecision",
            json!({"research_complete": false, "topics": ["next"]}),
        );
        let harness = TestHarness::new(
            RuntimeConfig {
                research_model_max_tokens: 2000,
                ..Default::default()
            },
            model.clone(),
        );
        let notes: Vec<String> = (0..6)
            .map(|round| format!("ROUND{} {}", round, "observed figure ".repeat(200)))
            .collect();
        let state = SupervisorState {
            notes,
            iteration_count: 3,
            is_complete: false,
        };

        ModelResearchPlanner
            .plan_next_research_units(&harness.context, &brief(), &state)
            .await
            .unwrap();

        let prompt = &model.prompts_for("SupervisorDecision")[0];
        assert!(count_tokens(prompt) <= 2000);
        assert!(prompt.contains("ROUND5"));
        assert!(!prompt.contains("ROUND0"));
        assert!(prompt.find("ROUND4") < prompt.find("ROUND5"));
    }
}
