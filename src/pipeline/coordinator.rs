//! 批处理协调器
//!
//! 每个条目一个任务，信号量限制同时运行的数量。单个条目失败不影响其他条目；
//! 只有规范化失败会让整个批次以失败结束。

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{AppError, Result};
use crate::models::ModelEntry;

use super::worker::{PipelineContext, PipelineError, ProcessedModel, process_model};

/// 单个条目的处理结果
#[derive(Debug)]
pub struct ModelOutcome {
    /// 条目在输入中的位置
    pub index: usize,
    pub entry: ModelEntry,
    pub result: std::result::Result<ProcessedModel, PipelineError>,
}

/// 批处理报告，顺序与输入一致
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ModelOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProcessedModel> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PipelineError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn fatal(&self) -> Option<&PipelineError> {
        self.failed().find(|e| e.is_fatal())
    }

    /// 存在致命错误时转为 `Err`
    pub fn into_result(self) -> Result<Self> {
        if let Some(fatal) = self.fatal() {
            return Err(AppError::Normalization(fatal.to_string()));
        }
        Ok(self)
    }
}

/// 以至多 `concurrency` 个并发处理全部条目
///
/// 规范化标识相同的条目只处理第一个，其余记为 `Duplicate`，
/// 保证不同任务不会写同一个输出文件。
pub async fn run_batch(
    ctx: Arc<PipelineContext>,
    entries: Vec<ModelEntry>,
    concurrency: usize,
) -> BatchReport {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    tracing::info!(models = entries.len(), concurrency = concurrency.max(1), "开始批处理");

    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut pending = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if let Some(first) = claimed.get(&entry.key()) {
            let duplicate = PipelineError::Duplicate {
                reference: entry.uri.clone(),
                first: first.clone(),
            };
            pending.push((index, entry, Err(duplicate)));
            continue;
        }
        claimed.insert(entry.key(), entry.uri.clone());

        let ctx = Arc::clone(&ctx);
        let permits = Arc::clone(&permits);
        let task_entry = entry.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|e| PipelineError::Aborted {
                reference: task_entry.uri.clone(),
                reason: e.to_string(),
            })?;
            ctx.metrics.record_started();
            process_model(&ctx, &task_entry).await
        });
        pending.push((index, entry, Ok(handle)));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (index, entry, task) in pending {
        let result = match task {
            Ok(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Aborted {
                    reference: entry.uri.clone(),
                    reason: e.to_string(),
                }),
            },
            Err(duplicate) => Err(duplicate),
        };

        ctx.metrics.record_outcome(result.is_ok());
        if let Err(e) = &result {
            tracing::error!(reference = %e.reference(), fatal = e.is_fatal(), error = %e, "模型处理失败");
        }
        outcomes.push(ModelOutcome {
            index,
            entry,
            result,
        });
    }

    ctx.metrics.log_summary();
    BatchReport { outcomes }
}
