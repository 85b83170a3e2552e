//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 镜像引用无法解析
    #[error("镜像引用无效: {0}")]
    Reference(String),

    /// 镜像仓库 / 镜像布局错误
    #[error("镜像仓库错误: {0}")]
    Registry(String),

    /// 外部模型中心 API 错误
    #[error("模型中心错误: {0}")]
    Hub(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 内容摘要校验失败
    #[error("摘要不匹配: 期望 {expected}, 实际 {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// 持久化记录无法识别
    #[error("记录格式无法识别: {0}")]
    Normalization(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(e.to_string())
        } else {
            AppError::Hub(e.to_string())
        }
    }
}

impl From<crate::migration::NormalizationError> for AppError {
    fn from(e: crate::migration::NormalizationError) -> Self {
        AppError::Normalization(e.to_string())
    }
}

impl From<crate::registry::ReferenceError> for AppError {
    fn from(e: crate::registry::ReferenceError) -> Self {
        AppError::Reference(e.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
