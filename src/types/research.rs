use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::message::ChatMessage;

/// 一次流水线调用的输入，构造后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchInput {
    pub request_id: String,
    pub message_id: String,
    pub tool_call_id: String,
    pub messages: Vec<ChatMessage>,
}

impl ResearchInput {
    /// 以单条用户消息构造输入，各关联id自动生成
    pub fn from_user_request(request: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            message_id: uuid::Uuid::new_v4().to_string(),
            tool_call_id: uuid::Uuid::new_v4().to_string(),
            messages: vec![ChatMessage::user(request)],
        }
    }
}

/// 研究简报：对用户需求的正式重述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchBrief {
    /// A detailed research question/brief that will guide the research.
    pub research_brief: String,
    /// A short title for the final report.
    pub title: String,
}

/// 监督者派发给研究单元的一个子任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchUnitTask {
    pub topic: String,
    pub ordinal: usize,
}

impl ResearchUnitTask {
    pub fn new(topic: impl Into<String>, ordinal: usize) -> Self {
        Self {
            topic: topic.into(),
            ordinal,
        }
    }
}
