use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::RuntimeConfig,
    error::ResearchResult,
    generator::{
        brief::write_research_brief,
        clarify::{ClarificationResult, clarify_with_user},
        compose::{DocumentToolResult, generate_final_report},
        context::ResearchContext,
        cost::CostSink,
        events::{ProgressKind, ProgressSink},
        outlet::DocumentStore,
        research::{
            ModelResearchPlanner, ResearchPlanner, ResearchUnitExecutor, SearchResearcher,
            run_supervisor,
        },
    },
    llm::client::ModelInvoker,
    types::ResearchInput,
};

const DEEP_RESEARCH_TITLE: &str = "Deep research";

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<String, Instant>,
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        self.phase_durations
            .push((phase_name.to_string(), duration));
        Some(duration)
    }

    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 按结束顺序排列的各阶段耗时
    pub fn get_phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒",
            self.get_total_duration().as_secs_f64()
        );
        for (phase, duration) in &self.phase_durations {
            report.push_str(&format!("\n- {}: {:.3}秒", phase, duration.as_secs_f64()));
        }
        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const CLARIFY: &'static str = "clarify";
    pub const BRIEF: &'static str = "brief";
    pub const RESEARCH: &'static str = "research";
    pub const REPORT: &'static str = "report";
}

/// 流水线的最终输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelineResult {
    ClarifyingQuestion(String),
    Report(DocumentToolResult),
}

/// 流水线依赖的协作者
#[derive(Clone)]
pub struct PipelineServices {
    pub model: Arc<dyn ModelInvoker>,
    pub documents: Arc<dyn DocumentStore>,
    pub planner: Arc<dyn ResearchPlanner>,
    pub researcher: Arc<dyn ResearchUnitExecutor>,
}

impl PipelineServices {
    /// 默认使用模型规划与仅依赖模型知识的研究单元
    pub fn new(model: Arc<dyn ModelInvoker>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            model,
            documents,
            planner: Arc::new(ModelResearchPlanner::new()),
            researcher: Arc::new(SearchResearcher::model_only()),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn ResearchPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_researcher(mut self, researcher: Arc<dyn ResearchUnitExecutor>) -> Self {
        self.researcher = researcher;
        self
    }
}

/// 单次运行的费用记录与取消信号
#[derive(Clone)]
pub struct RunOptions {
    pub costs: Arc<dyn CostSink>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(costs: Arc<dyn CostSink>, cancel: CancellationToken) -> Self {
        Self { costs, cancel }
    }
}

/// 深度研究流水线：澄清 -> 简报 -> 监督者研究 -> 最终报告
///
/// 严格单向推进，不重试。需要澄清时直接返回问题；取消以`ResearchError::Cancelled`上抛。
pub async fn run_deep_research_pipeline(
    input: &ResearchInput,
    config: RuntimeConfig,
    progress: Arc<dyn ProgressSink>,
    services: &PipelineServices,
    options: RunOptions,
) -> ResearchResult<PipelineResult> {
    config.validate()?;

    let context = ResearchContext::new(
        input,
        config,
        services.model.clone(),
        progress,
        options.costs,
        options.cancel,
    );
    let mut timing = TimingScope::new();
    info!(
        "🔬 开始深度研究 request={} message={}",
        context.request_id, context.message_id
    );

    timing.start_phase(TimingKeys::CLARIFY);
    let clarification = clarify_with_user(&context, &input.messages).await?;
    timing.end_phase(TimingKeys::CLARIFY);
    if let ClarificationResult::NeedsClarification {
        clarification_message,
    } = clarification
    {
        info!("⏱️ {}", timing.generate_timing_report());
        return Ok(PipelineResult::ClarifyingQuestion(clarification_message));
    }

    timing.start_phase(TimingKeys::BRIEF);
    let brief = write_research_brief(&context, &input.messages).await?;
    timing.end_phase(TimingKeys::BRIEF);

    timing.start_phase(TimingKeys::RESEARCH);
    context.emit(context.event(DEEP_RESEARCH_TITLE, ProgressKind::Started));
    let state = run_supervisor(
        &context,
        &brief,
        services.planner.as_ref(),
        services.researcher.as_ref(),
    )
    .await?;
    timing.end_phase(TimingKeys::RESEARCH);

    timing.start_phase(TimingKeys::REPORT);
    let report = generate_final_report(
        &context,
        &state.joined_notes(),
        &brief,
        services.documents.clone(),
    )
    .await?;
    timing.end_phase(TimingKeys::REPORT);

    context.emit(
        context
            .event(DEEP_RESEARCH_TITLE, ProgressKind::Completed)
            .with_status(report.status()),
    );
    info!("⏱️ {}", timing.generate_timing_report());
    info!("🎉 深度研究完成: {}", report);

    Ok(PipelineResult::Report(report))
}
