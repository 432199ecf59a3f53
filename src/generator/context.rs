use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::RuntimeConfig,
    error::{ResearchError, ResearchResult},
    generator::{
        cost::CostSink,
        events::{ProgressEvent, ProgressKind, ProgressSink},
    },
    llm::client::{GenerateRequest, ModelInvoker, types::TokenUsage},
    types::ResearchInput,
    utils::threads::cancellable,
};

/// 贯穿各阶段的共享上下文，流水线本身不持有持久状态
#[derive(Clone)]
pub struct ResearchContext {
    /// 运行配置
    pub config: Arc<RuntimeConfig>,
    /// 模型调用适配器
    pub model: Arc<dyn ModelInvoker>,
    /// 进度事件写入端
    pub progress: Arc<dyn ProgressSink>,
    /// 费用记录
    pub costs: Arc<dyn CostSink>,
    /// 取消信号
    pub cancel: CancellationToken,
    pub request_id: String,
    pub message_id: String,
    pub tool_call_id: String,
}

impl ResearchContext {
    pub fn new(
        input: &ResearchInput,
        config: RuntimeConfig,
        model: Arc<dyn ModelInvoker>,
        progress: Arc<dyn ProgressSink>,
        costs: Arc<dyn CostSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            model,
            progress,
            costs,
            cancel,
            request_id: input.request_id.clone(),
            message_id: input.message_id.clone(),
            tool_call_id: input.tool_call_id.clone(),
        }
    }

    /// 构造带本次tool_call_id的进度事件
    pub fn event(&self, title: impl Into<String>, kind: ProgressKind) -> ProgressEvent {
        ProgressEvent::new(self.tool_call_id.clone(), title, kind)
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.write(event);
    }

    pub fn record_llm_cost(&self, model_id: &str, usage: TokenUsage, label: &str) {
        debug!("💰 [{}] {} 输入{} 输出{}", label, model_id, usage.input_tokens, usage.output_tokens);
        self.costs.add_llm_cost(model_id, usage, label);
    }

    pub fn record_api_cost(&self, tool_id: &str, cost_usd: f64, label: &str) {
        debug!("💰 [{}] {} ${:.4}", label, tool_id, cost_usd);
        self.costs.add_api_cost(tool_id, cost_usd, label);
    }

    pub fn check_cancelled(&self) -> ResearchResult<()> {
        if self.cancel.is_cancelled() {
            Err(ResearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 在取消信号下执行future
    pub async fn guard<F, T>(&self, future: F) -> ResearchResult<T>
    where
        F: Future<Output = ResearchResult<T>>,
    {
        cancellable(&self.cancel, future).await
    }

    /// 研究阶段（澄清、简报、监督者、研究单元）的模型请求
    pub fn research_request(&self, prompt: impl Into<String>) -> GenerateRequest {
        GenerateRequest::new(
            self.config.research_model.clone(),
            prompt,
            self.config.research_model_max_tokens,
            self.cancel.clone(),
        )
    }

    /// 最终报告阶段的模型请求，输出上限独立于研究阶段
    pub fn report_request(&self, prompt: impl Into<String>) -> GenerateRequest {
        GenerateRequest::new(
            self.config.final_report_model.clone(),
            prompt,
            self.config.final_report_model_max_tokens,
            self.cancel.clone(),
        )
    }
}
