//! 批处理流水线
//!
//! `worker` 处理单个模型，`coordinator` 负责并发调度，`output` 决定写出位置。

pub mod coordinator;
pub mod output;
pub mod worker;

pub use coordinator::{BatchReport, ModelOutcome, run_batch};
pub use output::OutputLayout;
pub use worker::{ModelCardStatus, PipelineContext, PipelineError, ProcessedModel, process_model};
