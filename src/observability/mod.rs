//! 可观测性模块
//!
//! 提供批处理计数器和结构化日志初始化。

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};

// ===== Batch Metrics =====

/// 批处理指标
#[derive(Clone, Default)]
pub struct BatchMetrics {
    pub models_total: Arc<AtomicU64>,
    pub models_succeeded: Arc<AtomicU64>,
    pub models_failed: Arc<AtomicU64>,
    pub modelcards_found: Arc<AtomicU64>,
    pub skeleton_records: Arc<AtomicU64>,
    pub hub_failures: Arc<AtomicU64>,
    pub ambiguous_archives: Arc<AtomicU64>,
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub models_total: u64,
    pub models_succeeded: u64,
    pub models_failed: u64,
    pub modelcards_found: u64,
    pub skeleton_records: u64,
    pub hub_failures: u64,
    pub ambiguous_archives: u64,
}

impl BatchMetrics {
    /// 记录一个模型开始处理
    pub fn record_started(&self) {
        self.models_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录处理结果
    pub fn record_outcome(&self, success: bool) {
        let counter = if success {
            &self.models_succeeded
        } else {
            &self.models_failed
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_modelcard(&self) {
        self.modelcards_found.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skeleton(&self) {
        self.skeleton_records.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_hub_failure(&self) {
        self.hub_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_ambiguous(&self) {
        self.ambiguous_archives.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            models_total: self.models_total.load(Ordering::SeqCst),
            models_succeeded: self.models_succeeded.load(Ordering::SeqCst),
            models_failed: self.models_failed.load(Ordering::SeqCst),
            modelcards_found: self.modelcards_found.load(Ordering::SeqCst),
            skeleton_records: self.skeleton_records.load(Ordering::SeqCst),
            hub_failures: self.hub_failures.load(Ordering::SeqCst),
            ambiguous_archives: self.ambiguous_archives.load(Ordering::SeqCst),
        }
    }

    /// 输出一行汇总日志
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            total = s.models_total,
            succeeded = s.models_succeeded,
            failed = s.models_failed,
            modelcards = s.modelcards_found,
            skeletons = s.skeleton_records,
            hub_failures = s.hub_failures,
            ambiguous = s.ambiguous_archives,
            "批处理完成"
        );
    }
}

// ===== Structured Logging =====

/// 初始化结构化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了 `log_dir` 时按天滚动写入文件，
/// 返回的 guard 必须在进程生命周期内持有。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("日志级别无效: {}", e)))?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "modelcar-catalog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true);

    let result = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| AppError::Internal(format!("日志初始化失败: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = BatchMetrics::default();
        metrics.record_started();
        metrics.record_started();
        metrics.record_outcome(true);
        metrics.record_outcome(false);
        metrics.record_skeleton();
        metrics.record_hub_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.models_total, 2);
        assert_eq!(snapshot.models_succeeded, 1);
        assert_eq!(snapshot.models_failed, 1);
        assert_eq!(snapshot.skeleton_records, 1);
        assert_eq!(snapshot.hub_failures, 1);
        assert_eq!(snapshot.modelcards_found, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = BatchMetrics::default();
        let clone = metrics.clone();
        clone.record_ambiguous();
        assert_eq!(metrics.snapshot().ambiguous_archives, 1);
    }
}
