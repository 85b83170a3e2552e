//! 迁移模块
//!
//! 读取三种历史形态（current / legacy / mixed）的持久化记录，
//! 并在内存中升级为规范形态。

pub mod normalize;
pub mod timestamp;

pub use normalize::{PersistedShape, SchemaNormalizer, ShapeKind};
pub use timestamp::{RawTimestamp, TimestampError};

/// 规范化错误
///
/// 记录不符合任何已知形态，意味着数据损坏或未知的新格式，属于致命错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("记录不符合任何已知形态: {}", attempts.join("; "))]
    UnknownShape { attempts: Vec<String> },

    #[error("字段 {field} 的时间戳无效: {source}")]
    Timestamp {
        field: String,
        #[source]
        source: TimestampError,
    },
}
