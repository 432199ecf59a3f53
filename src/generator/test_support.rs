//! 单元测试用的脚本化协作者

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    config::RuntimeConfig,
    error::{ResearchError, ResearchResult},
    generator::{
        context::ResearchContext,
        cost::CostAccumulator,
        events::{ProgressEvent, ProgressKind, ProgressSink},
        research::{ResearchPlan, ResearchPlanner, ResearchUnitExecutor, SupervisorState},
    },
    llm::{
        client::{
            GenerateRequest, ModelInvoker, StreamDelta, StructuredResponse, TextResponse,
            ToolStreamOutput, types::TokenUsage,
        },
        tools::save_document::{SaveDocumentArgs, SaveDocumentTool},
    },
    types::{ResearchBrief, ResearchInput, ResearchUnitTask},
    utils::token_budget::count_tokens,
};

const TEXT_KEY: &str = "text";

/// 最终报告阶段模型的行为
#[derive(Debug, Clone)]
pub enum ReportBehavior {
    Save { title: String, content: String },
    PlainText,
    /// 直到取消才返回
    Hang,
}

impl ReportBehavior {
    pub fn save(title: &str, content: &str) -> Self {
        Self::Save {
            title: title.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Default)]
struct ScriptState {
    /// schema title -> 依次返回的对象，最后一个重复使用
    objects: HashMap<String, VecDeque<Value>>,
    texts: VecDeque<String>,
    report: Option<ReportBehavior>,
    prompts: Vec<(String, String)>,
    stream_requests: Vec<GenerateRequest>,
}

/// 按schema title返回预设结果的模型
#[derive(Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, title: &str, object: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .objects
            .entry(title.to_string())
            .or_default()
            .push_back(object);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.state.lock().unwrap().texts.push_back(text.to_string());
        self
    }

    pub fn with_report(self, behavior: ReportBehavior) -> Self {
        self.state.lock().unwrap().report = Some(behavior);
        self
    }

    pub fn prompts_for(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .prompts
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn text_prompts(&self) -> Vec<String> {
        self.prompts_for(TEXT_KEY)
    }

    pub fn stream_requests(&self) -> Vec<GenerateRequest> {
        self.state.lock().unwrap().stream_requests.clone()
    }

    fn usage(prompt: &str) -> TokenUsage {
        TokenUsage::new(count_tokens(prompt), 16)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn generate_text(&self, request: GenerateRequest) -> ResearchResult<TextResponse> {
        let text = {
            let mut state = self.state.lock().unwrap();
            state
                .prompts
                .push((TEXT_KEY.to_string(), request.prompt.clone()));
            match state.texts.len() {
                0 => None,
                1 => state.texts.front().cloned(),
                _ => state.texts.pop_front(),
            }
        };
        let text = text.ok_or_else(|| ResearchError::model("no scripted text"))?;
        Ok(TextResponse {
            usage: Self::usage(&request.prompt),
            text,
        })
    }

    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: Value,
    ) -> ResearchResult<StructuredResponse<Value>> {
        let title = schema["title"].as_str().unwrap_or_default().to_string();
        let object = {
            let mut state = self.state.lock().unwrap();
            state.prompts.push((title.clone(), request.prompt.clone()));
            state.objects.get_mut(&title).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        let object = object
            .ok_or_else(|| ResearchError::model(format!("no scripted object for {}", title)))?;
        Ok(StructuredResponse {
            usage: Self::usage(&request.prompt),
            object,
        })
    }

    async fn stream_text(
        &self,
        request: GenerateRequest,
        tool: SaveDocumentTool,
        deltas: UnboundedSender<StreamDelta>,
    ) -> ResearchResult<ToolStreamOutput> {
        let behavior = {
            let mut state = self.state.lock().unwrap();
            state.stream_requests.push(request.clone());
            state
                .report
                .clone()
                .unwrap_or_else(|| ReportBehavior::save("Research Report", "# Report"))
        };
        let usage = Self::usage(&request.prompt);

        match behavior {
            ReportBehavior::Save { title, content } => {
                let tool = tool.with_delta_sender(deltas.clone());
                // 工具失败时结果记录在工具内
                let _ = tool.save(SaveDocumentArgs { title, content }).await;
                let _ = deltas.send(StreamDelta::Text("Saved.".to_string()));
                Ok(ToolStreamOutput {
                    text: "Saved.".to_string(),
                    usage,
                })
            }
            ReportBehavior::PlainText => {
                let text = "# Report\n\nHere is the report as text.".to_string();
                let _ = deltas.send(StreamDelta::Text(text.clone()));
                Ok(ToolStreamOutput { text, usage })
            }
            ReportBehavior::Hang => {
                request.cancel.cancelled().await;
                Err(ResearchError::Cancelled)
            }
        }
    }
}

/// 记录所有进度事件
#[derive(Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.title).collect()
    }

    pub fn kinds(&self) -> Vec<ProgressKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn write(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// 组装好的测试上下文
pub struct TestHarness {
    pub context: ResearchContext,
    pub costs: Arc<CostAccumulator>,
    pub progress: Arc<RecordingProgressSink>,
}

impl TestHarness {
    pub fn new(config: RuntimeConfig, model: ScriptedModel) -> Self {
        let costs = Arc::new(CostAccumulator::new());
        let progress = Arc::new(RecordingProgressSink::default());
        let context = ResearchContext::new(
            &ResearchInput::from_user_request("test request"),
            config,
            Arc::new(model),
            progress.clone(),
            costs.clone(),
            CancellationToken::new(),
        );
        Self {
            context,
            costs,
            progress,
        }
    }
}

/// 按脚本返回规划结果，脚本用尽后返回"完成"
pub struct ScriptedPlanner {
    plans: Mutex<VecDeque<ResearchPlan>>,
    repeat: Option<ResearchPlan>,
    seen_note_counts: Mutex<Vec<usize>>,
}

impl ScriptedPlanner {
    pub fn always(topics: &[&str]) -> Self {
        Self {
            plans: Mutex::new(VecDeque::new()),
            repeat: Some(ResearchPlan::with_topics(topics.iter().copied())),
            seen_note_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn sequence(plans: Vec<ResearchPlan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            repeat: None,
            seen_note_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen_note_counts.lock().unwrap().len()
    }

    pub fn seen_note_counts(&self) -> Vec<usize> {
        self.seen_note_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResearchPlanner for ScriptedPlanner {
    async fn plan_next_research_units(
        &self,
        _context: &ResearchContext,
        _brief: &ResearchBrief,
        state: &SupervisorState,
    ) -> ResearchResult<ResearchPlan> {
        self.seen_note_counts.lock().unwrap().push(state.notes.len());
        if let Some(plan) = &self.repeat {
            return Ok(plan.clone());
        }
        Ok(self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ResearchPlan::complete))
    }
}

/// 返回固定笔记并统计并发峰值的研究单元
pub struct FixedNoteResearcher {
    note: String,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FixedNoteResearcher {
    pub fn new(note: &str) -> Self {
        Self {
            note: note.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay_ms(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchUnitExecutor for FixedNoteResearcher {
    async fn execute(
        &self,
        _context: &ResearchContext,
        _task: ResearchUnitTask,
    ) -> ResearchResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.note.clone())
    }
}
