//! LLM客户端 - 流水线各阶段调用模型的统一接口

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::LLMConfig,
    error::{ResearchError, ResearchResult},
    llm::tools::{
        save_document::{SaveDocumentTool, ToolInvocation},
        submit::SubmitTool,
    },
    utils::threads::cancellable,
};

mod providers;
pub mod types;
pub mod utils;

use providers::ProviderClient;
use types::TokenUsage;
use utils::{estimate_token_usage, resolve_model};

const DEFAULT_PREAMBLE: &str = "You are a careful research assistant.";

/// 一次模型调用请求
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// 逻辑模型标识，`provider:model`或裸模型名
    pub model_id: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    /// 输出token上限
    pub max_output_tokens: usize,
    pub cancel: CancellationToken,
}

impl GenerateRequest {
    pub fn new(
        model_id: impl Into<String>,
        prompt: impl Into<String>,
        max_output_tokens: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: None,
            prompt: prompt.into(),
            max_output_tokens,
            cancel,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct TextResponse {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct StructuredResponse<T> {
    pub object: T,
    pub usage: TokenUsage,
}

/// 工具调用流中的增量事件
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    Text(String),
    ToolCall { tool_name: String },
    ToolResult { tool_name: String, success: bool },
}

/// 工具调用流结束后的汇总，工具的执行结果从工具自身的`ToolInvocation`读取
#[derive(Debug, Clone)]
pub struct ToolStreamOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// 模型调用适配器
///
/// 适配器只负责调用与回报usage，费用记录由调用方完成；
/// 调用失败原样返回，不做备选模型切换。
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// 自由文本生成
    async fn generate_text(&self, request: GenerateRequest) -> ResearchResult<TextResponse>;

    /// 按JSON schema生成结构化对象
    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: Value,
    ) -> ResearchResult<StructuredResponse<Value>>;

    /// 以`createTextDocument`为唯一工具的流式生成
    async fn stream_text(
        &self,
        request: GenerateRequest,
        tool: SaveDocumentTool,
        deltas: UnboundedSender<StreamDelta>,
    ) -> ResearchResult<ToolStreamOutput>;
}

/// 按类型`T`派生schema并生成结构化对象
pub async fn generate_object<T>(
    invoker: &dyn ModelInvoker,
    request: GenerateRequest,
) -> ResearchResult<StructuredResponse<T>>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))?;
    let response = invoker.generate_structured(request, schema).await?;
    let object = serde_json::from_value::<T>(response.object).map_err(|e| {
        ResearchError::MalformedOutput(format!(
            "object does not match {}: {}",
            std::any::type_name::<T>(),
            e
        ))
    })?;

    Ok(StructuredResponse {
        object,
        usage: response.usage,
    })
}

/// 基于rig的模型调用实现
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> ResearchResult<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { config, client })
    }

    fn preamble(request: &GenerateRequest) -> &str {
        request.system_prompt.as_deref().unwrap_or(DEFAULT_PREAMBLE)
    }

    /// provider未回报usage时按文本估算
    fn usage_or_estimate(usage: TokenUsage, prompt: &str, output: &str) -> TokenUsage {
        if usage.total_tokens() == 0 {
            estimate_token_usage(prompt, output)
        } else {
            usage
        }
    }
}

#[async_trait]
impl ModelInvoker for LLMClient {
    async fn generate_text(&self, request: GenerateRequest) -> ResearchResult<TextResponse> {
        let resolved = resolve_model(&self.config, &request.model_id)?;
        let agent = self.client.create_agent(
            &resolved.model,
            Self::preamble(&request),
            request.max_output_tokens,
            self.config.temperature,
        );

        debug!("🤖 generate_text via {}", request.model_id);
        let (text, usage) = cancellable(&request.cancel, async {
            agent
                .prompt_with_usage(&request.prompt, 1)
                .await
                .map_err(|e| ResearchError::model(e.to_string()))
        })
        .await?;

        let usage = Self::usage_or_estimate(usage, &request.prompt, &text);
        Ok(TextResponse { text, usage })
    }

    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: Value,
    ) -> ResearchResult<StructuredResponse<Value>> {
        let resolved = resolve_model(&self.config, &request.model_id)?;
        let submit = SubmitTool::new(schema);
        let preamble = format!(
            "{}\n\nDeliver your answer by calling the `{}` tool exactly once with arguments matching its schema. Do not answer in plain text.",
            Self::preamble(&request),
            SubmitTool::TOOL_NAME
        );
        let agent = self.client.create_agent_with_tool(
            &resolved.model,
            &preamble,
            request.max_output_tokens,
            self.config.temperature,
            submit.clone(),
        );

        debug!("🤖 generate_structured via {}", request.model_id);
        let outcome = cancellable(&request.cancel, async {
            Ok(agent.prompt_with_usage(&request.prompt, 2).await)
        })
        .await?;

        match (outcome, submit.take_submission()) {
            (Ok((_, usage)), Some(object)) => {
                let usage = Self::usage_or_estimate(usage, &request.prompt, &object.to_string());
                Ok(StructuredResponse { object, usage })
            }
            (Ok((text, usage)), None) => {
                // 部分模型会直接以文本返回JSON
                let object = parse_json_text(&text).ok_or_else(|| {
                    ResearchError::MalformedOutput(
                        "model answered without calling the submit tool".to_string(),
                    )
                })?;
                let usage = Self::usage_or_estimate(usage, &request.prompt, &text);
                Ok(StructuredResponse { object, usage })
            }
            (Err(e), Some(object)) => {
                warn!("⚠️ 结构化输出已提交，但对话结束时出错: {}", e);
                let usage = estimate_token_usage(&request.prompt, &object.to_string());
                Ok(StructuredResponse { object, usage })
            }
            (Err(e), None) => Err(ResearchError::model(e.to_string())),
        }
    }

    async fn stream_text(
        &self,
        request: GenerateRequest,
        tool: SaveDocumentTool,
        deltas: UnboundedSender<StreamDelta>,
    ) -> ResearchResult<ToolStreamOutput> {
        let resolved = resolve_model(&self.config, &request.model_id)?;
        let observed = tool.clone().with_delta_sender(deltas.clone());
        let agent = self.client.create_agent_with_tool(
            &resolved.model,
            Self::preamble(&request),
            request.max_output_tokens,
            self.config.temperature,
            observed,
        );

        debug!("🤖 stream_text via {}", request.model_id);
        let outcome = cancellable(&request.cancel, async {
            Ok(agent.prompt_with_usage(&request.prompt, 3).await)
        })
        .await?;

        let (text, usage) = match outcome {
            Ok((text, usage)) => {
                let usage = Self::usage_or_estimate(usage, &request.prompt, &text);
                (text, usage)
            }
            Err(e) => match tool.invocation().await {
                // 文档已保存，只是后续轮次出错
                ToolInvocation::Succeeded(_) => {
                    warn!("⚠️ 文档已保存，但对话结束时出错: {}", e);
                    (String::new(), estimate_token_usage(&request.prompt, ""))
                }
                _ => return Err(ResearchError::model(e.to_string())),
            },
        };

        if !text.is_empty() {
            let _ = deltas.send(StreamDelta::Text(text.clone()));
        }

        Ok(ToolStreamOutput { text, usage })
    }
}

/// 解析可能被```json代码块包裹的JSON文本
fn parse_json_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str::<Value>(body.trim())
        .ok()
        .filter(Value::is_object)
}
