use serde::{Deserialize, Serialize};

/// Token估算器，整个流水线共用同一套切分规则，保证预算在不同运行之间可比
pub struct TokenEstimator {
    model_rules: TokenCalculationRules,
}

/// Token计算规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCalculationRules {
    /// 英文字符的平均token比例（字符数/token数）
    pub english_char_per_token: f64,
    /// 中日韩字符的平均token比例
    pub cjk_char_per_token: f64,
}

impl Default for TokenCalculationRules {
    fn default() -> Self {
        Self {
            // 基于GPT系列模型的经验值
            english_char_per_token: 4.0,
            cjk_char_per_token: 1.5,
        }
    }
}

/// Token估算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimation {
    /// 估算的token数量
    pub estimated_tokens: usize,
    /// 文本字符数
    pub character_count: usize,
    /// 中日韩字符数
    pub cjk_char_count: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self {
            model_rules: TokenCalculationRules::default(),
        }
    }

    pub fn with_rules(model_rules: TokenCalculationRules) -> Self {
        Self { model_rules }
    }

    /// 估算文本的token数量
    ///
    /// 结果只依赖字符分类计数：对任意前缀单调不减，且对拼接满足次可加性
    /// `count(a + b) <= count(a) + count(b)`，截断算法依赖这两条性质。
    pub fn estimate_tokens(&self, text: &str) -> TokenEstimation {
        let mut character_count = 0;
        let mut cjk_char_count = 0;
        for c in text.chars() {
            character_count += 1;
            if is_cjk_char(c) {
                cjk_char_count += 1;
            }
        }
        let other_char_count = character_count - cjk_char_count;

        let cjk_tokens =
            (cjk_char_count as f64 / self.model_rules.cjk_char_per_token).ceil() as usize;
        let other_tokens =
            (other_char_count as f64 / self.model_rules.english_char_per_token).ceil() as usize;

        TokenEstimation {
            estimated_tokens: cjk_tokens + other_tokens,
            character_count,
            cjk_char_count,
        }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.estimate_tokens(text).estimated_tokens
    }

    /// 估算多个文本片段的总token数量
    pub fn estimate_total_tokens(&self, texts: &[&str]) -> usize {
        texts.iter().map(|text| self.count_tokens(text)).sum()
    }

    /// 检查文本是否超过token限制
    pub fn exceeds_limit(&self, text: &str, limit: usize) -> bool {
        self.count_tokens(text) > limit
    }
}

/// 判断是否为中日韩字符
fn is_cjk_char(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF |  // CJK统一汉字
        0x3400..=0x4DBF |  // CJK扩展A
        0x3040..=0x30FF |  // 平假名、片假名
        0xAC00..=0xD7AF |  // 韩文音节
        0x20000..=0x2A6DF | // CJK扩展B
        0x2A700..=0x2EBEF | // CJK扩展C-F
        0x30000..=0x3134F   // CJK扩展G
    )
}
