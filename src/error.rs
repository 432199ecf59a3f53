use thiserror::Error;

/// 深度研究流水线的统一错误类型
#[derive(Error, Debug)]
pub enum ResearchError {
    /// 配置错误（非法的模型标识、预算为0等），属于调用方缺陷，不重试
    #[error("configuration error: {0}")]
    Config(String),

    /// 模型服务调用失败（provider错误、限流等），原样上抛
    #[error("model call failed: {0}")]
    Model(String),

    /// 模型返回的结构化数据不符合schema
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// 运行被取消（外部abort或超时）
    #[error("research run was cancelled")]
    Cancelled,

    /// 搜索服务错误
    #[error("search failed: {0}")]
    Search(String),

    /// 文档持久化错误
    #[error("document storage failed: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResearchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// 是否为取消，供上层区分"被中止"与"真正失败"
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type ResearchResult<T> = Result<T, ResearchError>;
