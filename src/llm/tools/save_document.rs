//! 文档保存工具 - 最终报告阶段模型唯一可用的工具

use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc::UnboundedSender};
use tracing::{info, warn};

use crate::generator::outlet::{DocumentStore, SavedDocument};
use crate::llm::client::StreamDelta;

/// 工具在一次运行中的调用结果
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolInvocation {
    #[default]
    NotInvoked,
    Succeeded(SavedDocument),
    Failed(String),
}

/// 文档保存参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaveDocumentArgs {
    pub title: String,
    pub content: String,
}

/// 文档保存结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocumentOutput {
    pub document_id: String,
    pub title: String,
    pub date: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SaveDocumentError(pub String);

/// 文档保存工具，每次运行只接受一次成功的保存
#[derive(Clone)]
pub struct SaveDocumentTool {
    store: Arc<dyn DocumentStore>,
    invocation: Arc<Mutex<ToolInvocation>>,
    deltas: Option<UnboundedSender<StreamDelta>>,
}

impl SaveDocumentTool {
    pub const TOOL_NAME: &'static str = "createTextDocument";

    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            invocation: Arc::new(Mutex::new(ToolInvocation::NotInvoked)),
            deltas: None,
        }
    }

    /// 调用与结果同时推送到增量事件流
    pub fn with_delta_sender(mut self, deltas: UnboundedSender<StreamDelta>) -> Self {
        self.deltas = Some(deltas);
        self
    }

    /// 当前的调用结果（所有克隆共享同一状态）
    pub async fn invocation(&self) -> ToolInvocation {
        self.invocation.lock().await.clone()
    }

    fn notify(&self, delta: StreamDelta) {
        if let Some(deltas) = &self.deltas {
            let _ = deltas.send(delta);
        }
    }

    /// 保存文档，已成功保存过时拒绝
    pub async fn save(
        &self,
        args: SaveDocumentArgs,
    ) -> Result<SaveDocumentOutput, SaveDocumentError> {
        self.notify(StreamDelta::ToolCall {
            tool_name: Self::TOOL_NAME.to_string(),
        });

        let mut invocation = self.invocation.lock().await;
        if let ToolInvocation::Succeeded(saved) = &*invocation {
            warn!("⚠️ 重复调用{}，文档{}已保存", Self::TOOL_NAME, saved.document_id);
            self.notify(StreamDelta::ToolResult {
                tool_name: Self::TOOL_NAME.to_string(),
                success: false,
            });
            return Err(SaveDocumentError(format!(
                "document already saved as {}; {} may only be called once",
                saved.document_id,
                Self::TOOL_NAME
            )));
        }

        info!("   🔧 tool called...{}@{}", Self::TOOL_NAME, args.title);
        let result = self.store.save_document(&args.title, &args.content).await;

        let outcome = match result {
            Ok(saved) => {
                let output = SaveDocumentOutput {
                    document_id: saved.document_id.clone(),
                    title: saved.title.clone(),
                    date: saved.date.to_rfc3339(),
                    message: format!("Document \"{}\" was created and saved.", saved.title),
                };
                *invocation = ToolInvocation::Succeeded(saved);
                Ok(output)
            }
            Err(e) => {
                let message = e.to_string();
                *invocation = ToolInvocation::Failed(message.clone());
                Err(SaveDocumentError(message))
            }
        };

        self.notify(StreamDelta::ToolResult {
            tool_name: Self::TOOL_NAME.to_string(),
            success: outcome.is_ok(),
        });
        outcome
    }
}

impl Tool for SaveDocumentTool {
    const NAME: &'static str = Self::TOOL_NAME;

    type Error = SaveDocumentError;
    type Args = SaveDocumentArgs;
    type Output = SaveDocumentOutput;

    async fn definition(&self, _prompt: String) -> rig::completion::ToolDefinition {
        rig::completion::ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Create and save the final research report as a markdown document. Call this exactly once with the report title and the complete markdown content.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the report"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full report content in markdown"
                    }
                },
                "required": ["title", "content"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.save(args).await
    }
}
