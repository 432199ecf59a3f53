use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::ResearchError;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 深度研究流水线的运行配置，由调用方提供，运行期间不可变
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 是否允许在研究开始前向用户追问
    pub allow_clarification: bool,

    /// 澄清、简报、监督者与研究单元使用的模型
    pub research_model: String,

    /// 研究阶段的token预算，同时作为提示词截断预算与输出上限
    pub research_model_max_tokens: usize,

    /// 最终报告使用的模型
    pub final_report_model: String,

    /// 最终报告阶段的token预算，与研究阶段相互独立
    pub final_report_model_max_tokens: usize,

    /// 每轮监督者迭代中同时执行的研究单元上限
    pub max_concurrent_research_units: usize,

    /// 监督者迭代次数的硬上限
    pub max_researcher_iterations: usize,

    /// 每个研究单元最多发起的搜索查询数
    pub max_search_queries: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allow_clarification: true,
            research_model: String::from("openai:gpt-4.1-mini"),
            research_model_max_tokens: 8192,
            final_report_model: String::from("openai:gpt-4.1"),
            final_report_model_max_tokens: 16384,
            max_concurrent_research_units: 3,
            max_researcher_iterations: 4,
            max_search_queries: 2,
        }
    }
}

impl RuntimeConfig {
    /// 校验配置，失败属于调用方缺陷，立即终止本次运行
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.research_model.trim().is_empty() {
            return Err(ResearchError::config("research_model must not be empty"));
        }
        if self.final_report_model.trim().is_empty() {
            return Err(ResearchError::config("final_report_model must not be empty"));
        }
        if self.research_model_max_tokens == 0 {
            return Err(ResearchError::config(
                "research_model_max_tokens must be greater than 0",
            ));
        }
        if self.final_report_model_max_tokens == 0 {
            return Err(ResearchError::config(
                "final_report_model_max_tokens must be greater than 0",
            ));
        }
        if self.max_concurrent_research_units == 0 {
            return Err(ResearchError::config(
                "max_concurrent_research_units must be at least 1",
            ));
        }
        if self.max_researcher_iterations == 0 {
            return Err(ResearchError::config(
                "max_researcher_iterations must be at least 1",
            ));
        }
        if self.max_search_queries == 0 {
            return Err(ResearchError::config("max_search_queries must be at least 1"));
        }
        Ok(())
    }
}

/// 应用程序配置（仅CLI使用，流水线核心只依赖`RuntimeConfig`）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 研究流水线配置
    pub research: RuntimeConfig,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 搜索服务配置
    pub search: SearchConfig,

    /// 报告输出路径
    pub output_path: PathBuf,

    /// 整体超时时间（秒），超时即取消本次运行
    pub timeout_seconds: Option<u64>,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 温度
    pub temperature: f64,
}

/// 搜索服务配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API KEY，为空时研究单元只依赖模型自身知识
    pub tavily_api_key: Option<String>,

    /// 每次查询返回的结果数
    pub max_results: u32,

    /// 每次查询的固定费用（美元）
    pub cost_per_query: f64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("DEEP_RESEARCH_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            temperature: 0.1,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok().filter(|key| !key.is_empty()),
            max_results: 5,
            cost_per_query: 0.008,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            research: RuntimeConfig::default(),
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            output_path: PathBuf::from("./research.docs"),
            timeout_seconds: None,
            verbose: false,
        }
    }
}
