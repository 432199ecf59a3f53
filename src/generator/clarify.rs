use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::ResearchResult,
    generator::{context::ResearchContext, prompts},
    llm::client::generate_object,
    types::ChatMessage,
};

pub const CLARIFY_COST_LABEL: &str = "clarify";

/// 是否需要向用户追问
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyWithUser {
    /// Whether the user needs to be asked a clarifying question.
    pub need_clarification: bool,
    /// A question to ask the user to clarify the report scope.
    #[serde(default)]
    pub question: String,
}

/// 澄清步骤的结果，需要追问时流水线就此结束
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationResult {
    NeedsClarification { clarification_message: String },
    Proceed,
}

impl ClarificationResult {
    pub fn needs_clarification(&self) -> bool {
        matches!(self, ClarificationResult::NeedsClarification { .. })
    }
}

/// 判断是否需要在研究开始前向用户追问
///
/// `allow_clarification`为false时不调用模型，也不产生费用。
pub async fn clarify_with_user(
    context: &ResearchContext,
    messages: &[ChatMessage],
) -> ResearchResult<ClarificationResult> {
    if !context.config.allow_clarification {
        debug!("⏭️ 已关闭澄清步骤，直接开始研究");
        return Ok(ClarificationResult::Proceed);
    }
    context.check_cancelled()?;

    let date = prompts::today();
    let prompt = prompts::conversation_prompt(
        messages,
        context.config.research_model_max_tokens,
        |conversation| prompts::clarify_prompt(conversation, &date),
    );

    let response =
        generate_object::<ClarifyWithUser>(context.model.as_ref(), context.research_request(prompt))
            .await?;
    context.record_llm_cost(
        &context.config.research_model,
        response.usage,
        CLARIFY_COST_LABEL,
    );

    let decision = response.object;
    let question = decision.question.trim();
    if decision.need_clarification && !question.is_empty() {
        info!("❓ 需要向用户澄清: {}", question);
        Ok(ClarificationResult::NeedsClarification {
            clarification_message: question.to_string(),
        })
    } else {
        Ok(ClarificationResult::Proceed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::generator::test_support::{ScriptedModel, TestHarness};
    use crate::utils::token_budget::count_tokens;
    use serde_json::json;

    #[tokio::test]
    async fn test_bypass_makes_no_model_call() {
        let model = ScriptedModel::new();
        let harness = TestHarness::new(
            RuntimeConfig {
                allow_clarification: false,
                ..Default::default()
            },
            model.clone(),
        );

        let result = clarify_with_user(&harness.context, &[ChatMessage::user("anything")])
            .await
            .unwrap();

        assert_eq!(result, ClarificationResult::Proceed);
        assert!(model.prompts_for("ClarifyWithUser").is_empty());
        assert!(harness.costs.entries_with_label(CLARIFY_COST_LABEL).is_empty());
    }

    #[tokio::test]
    async fn test_question_ends_with_clarification() {
        let model = ScriptedModel::new().with_object(
            "ClarifyWithUser",
            json!({"need_clarification": true, "question": "Which region?"}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model.clone());

        let result = clarify_with_user(&harness.context, &[ChatMessage::user("market size")])
            .await
            .unwrap();

        assert_eq!(
            result,
            ClarificationResult::NeedsClarification {
                clarification_message: "Which region?".to_string()
            }
        );
        assert_eq!(harness.costs.entries_with_label(CLARIFY_COST_LABEL).len(), 1);
    }

    #[tokio::test]
    async fn test_blank_question_proceeds() {
        let model = ScriptedModel::new().with_object(
            "ClarifyWithUser",
            json!({"need_clarification": true, "question": "  "}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model);

        let result = clarify_with_user(&harness.context, &[ChatMessage::user("x")])
            .await
            .unwrap();
        assert_eq!(result, ClarificationResult::Proceed);
    }

    #[tokio::test]
    async fn test_long_conversation_is_truncated_to_budget() {
        let model = ScriptedModel::new().with_object(
            "ClarifyWithUser",
            json!({"need_clarification": false, "question": ""}),
        );
        let harness = TestHarness::new(
            RuntimeConfig {
                research_model_max_tokens: 8_000,
                ..Default::default()
            },
            model.clone(),
        );

        // 约50,000 token的对话
        let messages: Vec<ChatMessage> = (0..100)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user("market research question detail ".repeat(62))
                } else {
                    ChatMessage::assistant("previous answer with many facts ".repeat(62))
                }
            })
            .collect();
        assert!(crate::utils::token_budget::count_message_tokens(&messages) >= 50_000);

        clarify_with_user(&harness.context, &messages).await.unwrap();

        let prompts = model.prompts_for("ClarifyWithUser");
        assert_eq!(prompts.len(), 1);
        assert!(count_tokens(&prompts[0]) <= 8_000);
    }
}
