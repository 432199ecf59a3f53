use crate::{
    config::{LLMConfig, LLMProvider},
    error::ResearchError,
    llm::client::types::TokenUsage,
    utils::token_budget::count_tokens,
};

/// 解析后的模型标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub provider: LLMProvider,
    pub model: String,
}

/// 将逻辑模型标识（`provider:model`或裸模型名）解析为当前配置下可调用的模型
pub fn resolve_model(llm_config: &LLMConfig, model_id: &str) -> Result<ResolvedModel, ResearchError> {
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return Err(ResearchError::config("model id must not be empty"));
    }

    let Some((prefix, model)) = model_id.split_once(':') else {
        return Ok(ResolvedModel {
            provider: llm_config.provider,
            model: model_id.to_string(),
        });
    };

    let provider = prefix
        .parse::<LLMProvider>()
        .map_err(|e| ResearchError::config(format!("invalid model id '{}': {}", model_id, e)))?;
    if provider != llm_config.provider {
        return Err(ResearchError::config(format!(
            "model id '{}' targets provider '{}' but '{}' is configured",
            model_id, provider, llm_config.provider
        )));
    }
    if model.trim().is_empty() {
        return Err(ResearchError::config(format!(
            "model id '{}' has no model name",
            model_id
        )));
    }

    Ok(ResolvedModel {
        provider,
        model: model.to_string(),
    })
}

/// 估算token使用情况（provider未返回usage时的兜底）
pub fn estimate_token_usage(input_text: &str, output_text: &str) -> TokenUsage {
    TokenUsage::new(count_tokens(input_text), count_tokens(output_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_config() -> LLMConfig {
        LLMConfig {
            provider: LLMProvider::OpenAI,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_bare_model_uses_configured_provider() {
        let resolved = resolve_model(&openai_config(), "gpt-4.1").unwrap();
        assert_eq!(resolved.provider, LLMProvider::OpenAI);
        assert_eq!(resolved.model, "gpt-4.1");
    }

    #[test]
    fn test_resolve_prefixed_model() {
        let resolved = resolve_model(&openai_config(), "openai:gpt-4.1-mini").unwrap();
        assert_eq!(resolved.model, "gpt-4.1-mini");
    }

    #[test]
    fn test_resolve_keeps_slashes_in_model_name() {
        let config = LLMConfig {
            provider: LLMProvider::OpenRouter,
            ..Default::default()
        };
        let resolved = resolve_model(&config, "openrouter:anthropic/claude-sonnet-4").unwrap();
        assert_eq!(resolved.model, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_resolve_rejects_invalid_ids() {
        let config = openai_config();
        for id in ["", "   ", "nope:gpt-4", "anthropic:claude-sonnet-4", "openai:"] {
            assert!(
                matches!(resolve_model(&config, id), Err(ResearchError::Config(_))),
                "{} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_estimate_token_usage() {
        let usage = estimate_token_usage("abcdefgh", "abcd");
        assert_eq!(usage, TokenUsage::new(2, 1));
    }
}
