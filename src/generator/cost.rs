use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use crate::llm::client::types::TokenUsage;

const MICROS_PER_USD: f64 = 1_000_000.0;

/// 一次付费操作的用量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostUsage {
    Tokens(TokenUsage),
    FlatFee { usd: f64 },
}

/// 费用条目，只追加不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub model_or_tool_id: String,
    pub usage: CostUsage,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl CostEntry {
    /// 估算该条目的费用（美元）
    pub fn estimated_cost_usd(&self) -> f64 {
        match self.usage {
            CostUsage::Tokens(usage) => usage.estimate_cost(&self.model_or_tool_id),
            CostUsage::FlatFee { usd } => usd,
        }
    }
}

/// 费用记录服务，研究单元并发写入
pub trait CostSink: Send + Sync {
    fn add_llm_cost(&self, model_id: &str, usage: TokenUsage, label: &str);

    fn add_api_cost(&self, tool_id: &str, cost_usd: f64, label: &str);
}

/// 只追加的费用账本
#[derive(Default)]
pub struct CostAccumulator {
    entries: RwLock<Vec<CostEntry>>,
    /// 累计输入token
    input_tokens: AtomicUsize,
    /// 累计输出token
    output_tokens: AtomicUsize,
    /// 累计固定费用（微美元）
    flat_fee_micros: AtomicU64,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, entry: CostEntry) {
        debug!(
            "💰 {} <- {} ({:?})",
            entry.label, entry.model_or_tool_id, entry.usage
        );
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<CostEntry> {
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn entries_with_label(&self, label: &str) -> Vec<CostEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.label == label)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_usage(&self) -> TokenUsage {
        TokenUsage::new(
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    pub fn total_flat_fees_usd(&self) -> f64 {
        self.flat_fee_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_USD
    }

    /// 全部条目的估算费用（美元）
    pub fn estimated_cost_usd(&self) -> f64 {
        self.entries()
            .iter()
            .map(CostEntry::estimated_cost_usd)
            .sum()
    }
}

impl CostSink for CostAccumulator {
    fn add_llm_cost(&self, model_id: &str, usage: TokenUsage, label: &str) {
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
        self.append(CostEntry {
            model_or_tool_id: model_id.to_string(),
            usage: CostUsage::Tokens(usage),
            label: label.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn add_api_cost(&self, tool_id: &str, cost_usd: f64, label: &str) {
        let micros = (cost_usd.max(0.0) * MICROS_PER_USD).round() as u64;
        self.flat_fee_micros.fetch_add(micros, Ordering::Relaxed);
        self.append(CostEntry {
            model_or_tool_id: tool_id.to_string(),
            usage: CostUsage::FlatFee { usd: cost_usd },
            label: label.to_string(),
            timestamp: Utc::now(),
        });
    }
}
