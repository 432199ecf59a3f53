pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, RuntimeConfig};
pub use error::{ResearchError, ResearchResult};
pub use generator::compose::DocumentToolResult;
pub use generator::cost::{CostAccumulator, CostSink};
pub use generator::events::{ProgressEvent, ProgressKind, ProgressSink};
pub use generator::outlet::{DiskDocumentStore, DocumentStore};
pub use generator::workflow::{
    PipelineResult, PipelineServices, RunOptions, run_deep_research_pipeline,
};
pub use llm::client::{LLMClient, ModelInvoker};
pub use types::ResearchInput;
