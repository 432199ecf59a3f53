use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::ResearchResult,
    generator::{
        context::ResearchContext,
        events::ProgressKind,
        outlet::DocumentStore,
        prompts,
    },
    llm::{
        client::StreamDelta,
        tools::save_document::{SaveDocumentTool, ToolInvocation},
    },
    types::ResearchBrief,
    utils::token_budget::{count_tokens, fit_template_parts, trim_text},
};

pub mod types;

pub use types::DocumentToolResult;

pub const FINAL_REPORT_COST_LABEL: &str = "final-report";

const REPORT_TITLE: &str = "Writing final report";
const SAVED_MESSAGE: &str = "A document was created and is now visible to the user.";

/// 流式增量的简单统计
#[derive(Debug, Default)]
struct DeltaStats {
    text_chars: usize,
    tool_calls: usize,
}

impl DeltaStats {
    fn observe(&mut self, delta: StreamDelta) {
        match delta {
            StreamDelta::Text(text) => self.text_chars += text.chars().count(),
            StreamDelta::ToolCall { tool_name } => {
                self.tool_calls += 1;
                debug!("   🔧 {} 调用中...", tool_name);
            }
            StreamDelta::ToolResult { tool_name, success } => {
                debug!("   🔧 {} 完成 success={}", tool_name, success);
            }
        }
    }
}

/// 根据笔记生成最终报告，报告由模型调用`createTextDocument`工具保存
///
/// 模型没有调用工具、或工具执行失败时返回`DocumentToolResult::Error`；
/// 模型调用本身失败（包括取消）时返回`Err`。
pub async fn generate_final_report(
    context: &ResearchContext,
    notes: &str,
    brief: &ResearchBrief,
    documents: Arc<dyn DocumentStore>,
) -> ResearchResult<DocumentToolResult> {
    context.check_cancelled()?;
    context.emit(context.event(REPORT_TITLE, ProgressKind::Writing));

    let date = prompts::today();
    let prompt = fit_template_parts(
        |research_brief, findings| {
            prompts::final_report_prompt(research_brief, &brief.title, findings, &date)
        },
        &brief.research_brief,
        count_tokens(notes),
        |budget| trim_text(notes, budget),
        context.config.final_report_model_max_tokens,
        count_tokens(prompts::FINAL_REPORT_SYSTEM_PROMPT),
    );
    let request = context
        .report_request(prompt)
        .with_system_prompt(prompts::FINAL_REPORT_SYSTEM_PROMPT);

    let tool = SaveDocumentTool::new(documents);
    let (deltas, mut receiver) = mpsc::unbounded_channel();
    let mut stats = DeltaStats::default();

    let stream = context.model.stream_text(request, tool.clone(), deltas);
    tokio::pin!(stream);
    let output = loop {
        tokio::select! {
            result = &mut stream => break result,
            Some(delta) = receiver.recv() => stats.observe(delta),
        }
    };
    while let Ok(delta) = receiver.try_recv() {
        stats.observe(delta);
    }
    let output = output?;

    context.record_llm_cost(
        &context.config.final_report_model,
        output.usage,
        FINAL_REPORT_COST_LABEL,
    );
    debug!(
        "📄 报告流结束: 文本{}字符，工具调用{}次",
        stats.text_chars, stats.tool_calls
    );

    let result = match tool.invocation().await {
        ToolInvocation::Succeeded(saved) => {
            info!("📄 最终报告已保存: {} ({})", saved.title, saved.document_id);
            DocumentToolResult::Success {
                document_id: saved.document_id,
                title: saved.title,
                result: SAVED_MESSAGE.to_string(),
                date: saved.date,
            }
        }
        ToolInvocation::Failed(error) => {
            warn!("❌ 保存报告失败: {}", error);
            DocumentToolResult::Error { error }
        }
        ToolInvocation::NotInvoked => {
            warn!("⚠️ 模型没有调用{}工具", SaveDocumentTool::TOOL_NAME);
            DocumentToolResult::error(format!(
                "{} tool was not called",
                SaveDocumentTool::TOOL_NAME
            ))
        }
    };
    Ok(result)
}
