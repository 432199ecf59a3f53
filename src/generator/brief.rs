use tracing::info;

use crate::{
    error::{ResearchError, ResearchResult},
    generator::{context::ResearchContext, events::ProgressKind, prompts},
    llm::client::generate_object,
    types::{ChatMessage, ResearchBrief},
};

pub const BRIEF_COST_LABEL: &str = "brief";

const BRIEF_TITLE: &str = "Writing research brief";
const DEFAULT_REPORT_TITLE: &str = "Research Report";

/// 把对话浓缩为研究简报与报告标题
pub async fn write_research_brief(
    context: &ResearchContext,
    messages: &[ChatMessage],
) -> ResearchResult<ResearchBrief> {
    context.check_cancelled()?;
    context.emit(context.event(BRIEF_TITLE, ProgressKind::Writing));

    let date = prompts::today();
    let prompt = prompts::conversation_prompt(
        messages,
        context.config.research_model_max_tokens,
        |conversation| prompts::brief_prompt(conversation, &date),
    );

    let response =
        generate_object::<ResearchBrief>(context.model.as_ref(), context.research_request(prompt))
            .await?;
    context.record_llm_cost(
        &context.config.research_model,
        response.usage,
        BRIEF_COST_LABEL,
    );

    let mut brief = response.object;
    if brief.research_brief.trim().is_empty() {
        return Err(ResearchError::MalformedOutput(
            "research brief is empty".to_string(),
        ));
    }
    if brief.title.trim().is_empty() {
        brief.title = DEFAULT_REPORT_TITLE.to_string();
    }

    info!("📝 研究简报已生成: {}", brief.title);
    context.emit(
        context
            .event(BRIEF_TITLE, ProgressKind::Completed)
            .with_message(brief.research_brief.clone()),
    );
    Ok(brief)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::generator::test_support::{ScriptedModel, TestHarness};
    use serde_json::json;

    #[tokio::test]
    async fn test_brief_emits_writing_then_completed() {
        let model = ScriptedModel::new().with_object(
            "ResearchBrief",
            json!({"research_brief": "I want to compare EV batteries.", "title": "EV batteries"}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model);

        let brief = write_research_brief(&harness.context, &[ChatMessage::user("EV batteries?")])
            .await
            .unwrap();

        assert_eq!(brief.title, "EV batteries");
        let events = harness.progress.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ProgressKind::Writing);
        assert_eq!(events[1].kind, ProgressKind::Completed);
        assert_eq!(
            events[1].message.as_deref(),
            Some("I want to compare EV batteries.")
        );
        assert_eq!(harness.costs.entries_with_label(BRIEF_COST_LABEL).len(), 1);
    }

    #[tokio::test]
    async fn test_blank_title_gets_default() {
        let model = ScriptedModel::new().with_object(
            "ResearchBrief",
            json!({"research_brief": "Brief", "title": ""}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model);

        let brief = write_research_brief(&harness.context, &[ChatMessage::user("x")])
            .await
            .unwrap();
        assert_eq!(brief.title, "Research Report");
    }

    #[tokio::test]
    async fn test_empty_brief_is_malformed() {
        let model = ScriptedModel::new().with_object(
            "ResearchBrief",
            json!({"research_brief": " ", "title": "T"}),
        );
        let harness = TestHarness::new(RuntimeConfig::default(), model);

        let result = write_research_brief(&harness.context, &[ChatMessage::user("x")]).await;
        assert!(matches!(result, Err(ResearchError::MalformedOutput(_))));
    }
}
