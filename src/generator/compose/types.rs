use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 最终报告阶段的结果，工具调用约定被违反时以`Error`返回而不是抛错
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentToolResult {
    Success {
        #[serde(rename = "documentId")]
        document_id: String,
        title: String,
        result: String,
        date: DateTime<Utc>,
    },
    Error {
        error: String,
    },
}

impl DocumentToolResult {
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Success { document_id, .. } => Some(document_id),
            Self::Error { .. } => None,
        }
    }
}

impl Display for DocumentToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success {
                document_id, title, ..
            } => write!(f, "{} ({})", title, document_id),
            Self::Error { error } => write!(f, "error: {}", error),
        }
    }
}
