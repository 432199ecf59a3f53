use tracing::{info, warn};

use crate::{
    error::ResearchResult,
    generator::{
        context::ResearchContext,
        events::ProgressKind,
        research::{ResearchPlanner, ResearchUnitExecutor},
    },
    types::ResearchBrief,
    utils::threads::do_parallel_with_limit,
};

/// 监督者循环的状态，只由监督者修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorState {
    /// 按迭代顺序只追加的研究笔记
    pub notes: Vec<String>,
    pub iteration_count: usize,
    pub is_complete: bool,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joined_notes(&self) -> String {
        self.notes.join("\n")
    }
}

/// 监督者循环
///
/// 每轮先规划，再以`max_concurrent_research_units`为上限并发执行研究单元，
/// 全部完成后才进入下一轮。迭代次数不超过`max_researcher_iterations`。
/// 单个研究单元失败会被记为一条笔记，取消则直接上抛。
pub async fn run_supervisor(
    context: &ResearchContext,
    brief: &ResearchBrief,
    planner: &dyn ResearchPlanner,
    researcher: &dyn ResearchUnitExecutor,
) -> ResearchResult<SupervisorState> {
    let max_iterations = context.config.max_researcher_iterations;
    let max_units = context.config.max_concurrent_research_units;
    let mut state = SupervisorState::new();

    while state.iteration_count < max_iterations {
        context.check_cancelled()?;

        let plan = planner
            .plan_next_research_units(context, brief, &state)
            .await?;
        if plan.is_finished() {
            info!(
                "🏁 监督者判断研究已充分，共{}轮，{}条笔记",
                state.iteration_count,
                state.notes.len()
            );
            state.is_complete = true;
            break;
        }

        let mut tasks = plan.tasks;
        if tasks.len() > max_units {
            warn!(
                "⚠️ 规划了{}个研究单元，超过上限{}，多余的将被丢弃",
                tasks.len(),
                max_units
            );
            tasks.truncate(max_units);
        }

        let round = state.iteration_count + 1;
        let topics: Vec<&str> = tasks.iter().map(|task| task.topic.as_str()).collect();
        info!("🔎 第{}轮研究，派发{}个研究单元", round, tasks.len());
        context.emit(
            context
                .event(
                    format!("Research round {}: {} units", round, tasks.len()),
                    ProgressKind::Writing,
                )
                .with_message(topics.join("\n")),
        );

        let units = tasks.into_iter().map(|task| async move {
            let topic = task.topic.clone();
            let result = context.guard(researcher.execute(context, task)).await;
            (topic, result)
        });
        let results = do_parallel_with_limit(units.collect(), max_units).await;

        for (topic, result) in results {
            match result {
                Ok(note) => state.notes.push(note),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("❌ 研究单元失败 [{}]: {}", topic, e);
                    state
                        .notes
                        .push(format!("research unit failed: {}: {}", topic, e));
                }
            }
        }

        state.iteration_count += 1;
    }

    if !state.is_complete {
        info!("⏱️ 已达到最大迭代次数{}，结束研究", max_iterations);
    }
    Ok(state)
}
