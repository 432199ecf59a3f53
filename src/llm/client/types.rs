use serde::{Deserialize, Serialize};

/// 一次模型调用的token使用情况
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// 按模型系列估算费用（美元），价格为每百万token
    pub fn estimate_cost(&self, model_name: &str) -> f64 {
        let (input_price, output_price) = price_per_million(model_name);
        (self.input_tokens as f64 * input_price + self.output_tokens as f64 * output_price)
            / 1_000_000.0
    }
}

impl From<rig::completion::Usage> for TokenUsage {
    fn from(usage: rig::completion::Usage) -> Self {
        Self::new(usage.input_tokens as usize, usage.output_tokens as usize)
    }
}

fn price_per_million(model_name: &str) -> (f64, f64) {
    let name = model_name.to_lowercase();
    if name.contains("mini") || name.contains("haiku") || name.contains("flash") {
        (0.4, 1.6)
    } else if name.contains("deepseek") {
        (0.27, 1.1)
    } else if name.contains("ollama") {
        (0.0, 0.0)
    } else if name.contains("opus") {
        (15.0, 75.0)
    } else if name.contains("sonnet") || name.contains("claude") {
        (3.0, 15.0)
    } else {
        (2.0, 8.0)
    }
}
