//! LLM Provider支持模块

use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::{Prompt, PromptError},
    tool::Tool,
};

use crate::{
    config::{LLMConfig, LLMProvider},
    error::{ResearchError, ResearchResult},
    llm::client::types::TokenUsage,
};

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    DeepSeek(rig::providers::deepseek::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &LLMConfig) -> ResearchResult<Self> {
        match config.provider {
            LLMProvider::OpenAI => {
                let client = rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            LLMProvider::DeepSeek => {
                let client = rig::providers::deepseek::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::DeepSeek(client))
            }
            LLMProvider::OpenRouter => {
                let client = rig::providers::openrouter::Client::builder(&config.api_key).build();
                Ok(ProviderClient::OpenRouter(client))
            }
            LLMProvider::Anthropic => {
                let client = rig::providers::anthropic::ClientBuilder::new(&config.api_key)
                    .build()
                    .map_err(|e| ResearchError::config(format!("anthropic client: {}", e)))?;
                Ok(ProviderClient::Anthropic(client))
            }
            LLMProvider::Ollama => {
                let client = rig::providers::ollama::Client::builder().build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }

    /// 创建不带工具的Agent
    pub fn create_agent(
        &self,
        model: &str,
        system_prompt: &str,
        max_tokens: usize,
        temperature: f64,
    ) -> ProviderAgent {
        let max_tokens = max_tokens as u64;
        match self {
            ProviderClient::OpenAI(client) => {
                let agent = client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder()
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build();
                ProviderAgent::OpenAI(agent)
            }
            ProviderClient::DeepSeek(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build();
                ProviderAgent::DeepSeek(agent)
            }
            ProviderClient::OpenRouter(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build();
                ProviderAgent::OpenRouter(agent)
            }
            ProviderClient::Anthropic(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build();
                ProviderAgent::Anthropic(agent)
            }
            ProviderClient::Ollama(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build();
                ProviderAgent::Ollama(agent)
            }
        }
    }

    /// 创建只挂载一个工具的Agent
    pub fn create_agent_with_tool<T>(
        &self,
        model: &str,
        system_prompt: &str,
        max_tokens: usize,
        temperature: f64,
        tool: T,
    ) -> ProviderAgent
    where
        T: Tool + 'static,
    {
        let max_tokens = max_tokens as u64;
        match self {
            ProviderClient::OpenAI(client) => {
                let agent = client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder()
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .tool(tool)
                    .build();
                ProviderAgent::OpenAI(agent)
            }
            ProviderClient::DeepSeek(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .tool(tool)
                    .build();
                ProviderAgent::DeepSeek(agent)
            }
            ProviderClient::OpenRouter(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .tool(tool)
                    .build();
                ProviderAgent::OpenRouter(agent)
            }
            ProviderClient::Anthropic(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .tool(tool)
                    .build();
                ProviderAgent::Anthropic(agent)
            }
            ProviderClient::Ollama(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .tool(tool)
                    .build();
                ProviderAgent::Ollama(agent)
            }
        }
    }
}

/// 统一的Agent枚举
pub enum ProviderAgent {
    OpenAI(Agent<rig::providers::openai::CompletionModel>),
    DeepSeek(Agent<rig::providers::deepseek::CompletionModel>),
    OpenRouter(Agent<rig::providers::openrouter::CompletionModel>),
    Anthropic(Agent<rig::providers::anthropic::completion::CompletionModel>),
    Ollama(Agent<rig::providers::ollama::CompletionModel<reqwest::Client>>),
}

impl ProviderAgent {
    /// 执行多轮对话，返回最终文本与累计usage
    pub async fn prompt_with_usage(
        &self,
        prompt: &str,
        max_turns: usize,
    ) -> Result<(String, TokenUsage), PromptError> {
        let response = match self {
            ProviderAgent::OpenAI(agent) => {
                agent
                    .prompt(prompt)
                    .multi_turn(max_turns)
                    .extended_details()
                    .await?
            }
            ProviderAgent::DeepSeek(agent) => {
                agent
                    .prompt(prompt)
                    .multi_turn(max_turns)
                    .extended_details()
                    .await?
            }
            ProviderAgent::OpenRouter(agent) => {
                agent
                    .prompt(prompt)
                    .multi_turn(max_turns)
                    .extended_details()
                    .await?
            }
            ProviderAgent::Anthropic(agent) => {
                agent
                    .prompt(prompt)
                    .multi_turn(max_turns)
                    .extended_details()
                    .await?
            }
            ProviderAgent::Ollama(agent) => {
                agent
                    .prompt(prompt)
                    .multi_turn(max_turns)
                    .extended_details()
                    .await?
            }
        };

        Ok((response.output, response.total_usage.into()))
    }
}
