use crate::config::{Config, LLMProvider};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "deep-research.toml";

/// deep-research - 多阶段、带工具调用的深度研究报告生成器
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(
    about = "Turns a research request into a structured report: clarification, research brief, supervised parallel research units and a final report saved as a markdown document."
)]
#[command(version)]
pub struct Args {
    /// 研究需求
    pub prompt: Option<String>,

    /// 从文件读取研究需求
    #[arg(long, conflicts_with = "prompt")]
    pub prompt_file: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 报告输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 关闭澄清步骤
    #[arg(long)]
    pub no_clarification: bool,

    /// 研究阶段使用的模型（provider:model）
    #[arg(long)]
    pub research_model: Option<String>,

    /// 最终报告使用的模型（provider:model）
    #[arg(long)]
    pub final_report_model: Option<String>,

    /// 研究阶段token预算
    #[arg(long)]
    pub research_max_tokens: Option<usize>,

    /// 最终报告token预算
    #[arg(long)]
    pub final_report_max_tokens: Option<usize>,

    /// 每轮并发研究单元上限
    #[arg(long)]
    pub max_concurrent_research_units: Option<usize>,

    /// 监督者最大迭代次数
    #[arg(long)]
    pub max_researcher_iterations: Option<usize>,

    /// 每个研究单元最多的搜索查询数
    #[arg(long)]
    pub max_search_queries: Option<usize>,

    /// LLM Provider (openai, deepseek, openrouter, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Tavily API KEY
    #[arg(long)]
    pub tavily_api_key: Option<String>,

    /// 整体超时时间（秒）
    #[arg(long)]
    pub timeout_seconds: Option<u64>,
}

impl Args {
    /// 将CLI参数转换为配置，CLI参数覆盖配置文件
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);
                if default_config_path.exists() {
                    Config::from_file(&default_config_path).with_context(|| {
                        format!("无法读取默认配置文件 {:?}", default_config_path)
                    })?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        config.verbose = config.verbose || self.verbose;
        if self.timeout_seconds.is_some() {
            config.timeout_seconds = self.timeout_seconds;
        }

        // 覆盖研究配置
        let research = &mut config.research;
        if self.no_clarification {
            research.allow_clarification = false;
        }
        if let Some(model) = self.research_model {
            research.research_model = model;
        }
        if let Some(model) = self.final_report_model {
            research.final_report_model = model;
        }
        if let Some(max_tokens) = self.research_max_tokens {
            research.research_model_max_tokens = max_tokens;
        }
        if let Some(max_tokens) = self.final_report_max_tokens {
            research.final_report_model_max_tokens = max_tokens;
        }
        if let Some(units) = self.max_concurrent_research_units {
            research.max_concurrent_research_units = units;
        }
        if let Some(iterations) = self.max_researcher_iterations {
            research.max_researcher_iterations = iterations;
        }
        if let Some(queries) = self.max_search_queries {
            research.max_search_queries = queries;
        }

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(e) => bail!("{}", e),
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(tavily_api_key) = self.tavily_api_key {
            config.search.tavily_api_key = Some(tavily_api_key).filter(|key| !key.is_empty());
        }

        Ok(config)
    }

    /// 读取研究需求（命令行参数或文件）
    pub fn read_prompt(&self) -> Result<String> {
        let prompt = match (&self.prompt, &self.prompt_file) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("无法读取研究需求文件 {:?}", path))?,
            (None, None) => bail!("请提供研究需求，或使用 --prompt-file 指定文件"),
        };

        let prompt = prompt.trim();
        if prompt.is_empty() {
            bail!("研究需求不能为空");
        }
        Ok(prompt.to_string())
    }
}
