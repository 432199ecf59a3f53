//! 结构化输出提交工具，参数即调用方要求的JSON schema

use rig::tool::Tool;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("submit tool error: {0}")]
pub struct SubmitToolError(String);

#[derive(Debug, Clone)]
pub struct SubmitTool {
    parameters: Value,
    submission: Arc<Mutex<Option<Value>>>,
}

impl SubmitTool {
    pub const TOOL_NAME: &'static str = "submit";

    pub fn new(schema: Value) -> Self {
        Self {
            parameters: tool_parameters(schema),
            submission: Arc::new(Mutex::new(None)),
        }
    }

    /// 取出模型提交的对象（只保留最后一次提交）
    pub fn take_submission(&self) -> Option<Value> {
        match self.submission.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        }
    }
}

/// schemars生成的根schema带有`$schema`/`title`元信息，工具参数只需要对象结构
fn tool_parameters(schema: Value) -> Value {
    match schema {
        Value::Object(mut map) => {
            map.remove("$schema");
            map.remove("title");
            Value::Object(map)
        }
        other => other,
    }
}

impl Tool for SubmitTool {
    const NAME: &'static str = Self::TOOL_NAME;

    type Error = SubmitToolError;
    type Args = Value;
    type Output = String;

    async fn definition(&self, _prompt: String) -> rig::completion::ToolDefinition {
        rig::completion::ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Submit the final structured answer.".to_string(),
            parameters: self.parameters.clone(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        if !args.is_object() {
            return Err(SubmitToolError("arguments must be a JSON object".to_string()));
        }
        debug!("   🔧 tool called...{}", Self::NAME);

        if let Ok(mut slot) = self.submission.lock() {
            *slot = Some(args);
        }
        Ok("Submitted.".to_string())
    }
}
