use async_trait::async_trait;

use crate::{
    error::ResearchResult,
    generator::context::ResearchContext,
    types::{ResearchBrief, ResearchUnitTask},
};

pub mod planner;
pub mod researcher;
pub mod supervisor;

pub use planner::ModelResearchPlanner;
pub use researcher::SearchResearcher;
pub use supervisor::{SupervisorState, run_supervisor};

/// 一轮规划的结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResearchPlan {
    /// 模型判断研究已经充分
    pub research_complete: bool,
    pub tasks: Vec<ResearchUnitTask>,
}

impl ResearchPlan {
    pub fn complete() -> Self {
        Self {
            research_complete: true,
            tasks: Vec::new(),
        }
    }

    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            research_complete: false,
            tasks: topics
                .into_iter()
                .enumerate()
                .map(|(ordinal, topic)| ResearchUnitTask::new(topic, ordinal))
                .collect(),
        }
    }

    /// 没有可派发的任务即视为研究完成
    pub fn is_finished(&self) -> bool {
        self.research_complete || self.tasks.is_empty()
    }
}

/// 监督者的规划步骤：根据简报和已有笔记决定下一轮的研究单元
#[async_trait]
pub trait ResearchPlanner: Send + Sync {
    async fn plan_next_research_units(
        &self,
        context: &ResearchContext,
        brief: &ResearchBrief,
        state: &SupervisorState,
    ) -> ResearchResult<ResearchPlan>;
}

/// 执行单个研究单元，返回一条提炼后的笔记
#[async_trait]
pub trait ResearchUnitExecutor: Send + Sync {
    async fn execute(
        &self,
        context: &ResearchContext,
        task: ResearchUnitTask,
    ) -> ResearchResult<String>;
}
