use anyhow::Result;
use clap::Parser;
use deep_research::{
    cli::Args,
    generator::{
        cost::CostAccumulator,
        events::LogProgressSink,
        outlet::DiskDocumentStore,
        research::SearchResearcher,
        workflow::{PipelineServices, RunOptions, run_deep_research_pipeline},
    },
    llm::{client::LLMClient, tools::web_search::TavilySearch},
    types::ResearchInput,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let prompt = args.read_prompt()?;
    let config = args.into_config()?;

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let model = Arc::new(LLMClient::new(config.llm.clone())?);
    let documents = Arc::new(DiskDocumentStore::new(config.output_path.clone()));
    let researcher = match &config.search.tavily_api_key {
        Some(api_key) => SearchResearcher::new(
            Arc::new(TavilySearch::new(api_key, config.search.cost_per_query)),
            config.search.max_results,
        ),
        None => {
            warn!("⚠️ 未配置Tavily API KEY，研究单元只依赖模型自身知识");
            SearchResearcher::model_only()
        }
    };
    let services = PipelineServices::new(model, documents).with_researcher(Arc::new(researcher));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 收到中断信号，正在取消研究");
                cancel.cancel();
            }
        });
    }
    if let Some(seconds) = config.timeout_seconds {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            warn!("⏰ 超过{}秒，正在取消研究", seconds);
            cancel.cancel();
        });
    }

    let costs = Arc::new(CostAccumulator::new());
    let result = run_deep_research_pipeline(
        &ResearchInput::from_user_request(prompt),
        config.research.clone(),
        Arc::new(LogProgressSink),
        &services,
        RunOptions::new(costs.clone(), cancel),
    )
    .await;

    print_cost_summary(&costs);
    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    info!("📁 报告目录: {}", config.output_path.display());
    Ok(())
}

fn print_cost_summary(costs: &CostAccumulator) {
    let usage = costs.total_usage();
    info!(
        "💰 Token用量: 输入 {} / 输出 {} / 合计 {}，预估费用 ${:.4}",
        usage.input_tokens,
        usage.output_tokens,
        usage.total_tokens(),
        costs.estimated_cost_usd()
    );

    let mut by_label: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for entry in costs.entries() {
        let slot = by_label.entry(entry.label.clone()).or_default();
        slot.0 += 1;
        slot.1 += entry.estimated_cost_usd();
    }
    for (label, (count, usd)) in by_label {
        info!("   - {}: {}次调用, ${:.4}", label, count, usd);
    }
}
