use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// 进度事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Started,
    Writing,
    Completed,
}

impl std::fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressKind::Started => write!(f, "started"),
            ProgressKind::Writing => write!(f, "writing"),
            ProgressKind::Completed => write!(f, "completed"),
        }
    }
}

/// 推送给事件流的轻量进度通知，尽力投递
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub tool_call_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(tool_call_id: impl Into<String>, title: impl Into<String>, kind: ProgressKind) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            title: title.into(),
            kind,
            timestamp: Utc::now(),
            status: None,
            message: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 进度事件写入端，无确认、无背压
pub trait ProgressSink: Send + Sync {
    fn write(&self, event: ProgressEvent);
}

/// 把进度事件转发到tracing日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn write(&self, event: ProgressEvent) {
        let icon = match event.kind {
            ProgressKind::Started => "🚀",
            ProgressKind::Writing => "✍️",
            ProgressKind::Completed => "✅",
        };
        match (&event.status, &event.message) {
            (Some(status), _) => info!("{} {} [{}]", icon, event.title, status),
            (None, Some(message)) => {
                let preview: String = message.chars().take(120).collect();
                info!("{} {}: {}", icon, event.title, preview)
            }
            (None, None) => info!("{} {}", icon, event.title),
        }
    }
}

/// 把进度事件转发到无界channel，供嵌入方消费
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn write(&self, event: ProgressEvent) {
        // 接收端已关闭时丢弃
        let _ = self.sender.send(event);
    }
}
