use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 流水线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 并发处理的模型数量上限
    pub concurrency: usize,
    /// 每个模型的输出根目录
    pub output_dir: PathBuf,
    /// 模型索引文件
    pub models_index: PathBuf,
    /// 版本索引文件列表
    pub version_indexes: Vec<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            output_dir: PathBuf::from("output"),
            models_index: PathBuf::from("data/models-index.yaml"),
            version_indexes: Vec::new(),
        }
    }
}

/// 模型卡字段抽取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 日期格式（chrono strftime 语法），按顺序匹配
    pub date_formats: Vec<String>,
    /// 视为空值的占位符（不区分大小写）
    pub placeholder_tokens: Vec<String>,
    /// 单个标量字段最大长度（字符）
    pub max_field_length: usize,
    /// 列表元素最大长度（字符）
    pub max_list_item_length: usize,
    /// markdown 文档最大字节数
    pub max_document_bytes: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_formats: [
                "%m/%d/%Y",
                "%Y-%m-%d",
                "%B %d, %Y",
                "%b %d, %Y",
                "%d %B %Y",
                "%Y/%m/%d",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            placeholder_tokens: [
                "n/a",
                "na",
                "tbd",
                "unknown",
                "none",
                "null",
                "todo",
                "-",
                "more information needed",
                "[more information needed]",
                "not specified",
                "coming soon",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_field_length: 2000,
            max_list_item_length: 128,
            max_document_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Hugging Face 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    /// 是否启用外部增强
    pub enabled: bool,
    /// API 地址
    pub base_url: String,
    /// 访问令牌
    pub token: Option<String>,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://huggingface.co".into(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// 镜像来源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// OCI image layout 目录的根路径
    pub layout_root: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            layout_root: PathBuf::from("images"),
        }
    }
}

/// 目录（catalog）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// 目录来源名称
    pub source: String,
    /// 聚合目录输出路径
    pub output_path: PathBuf,
    /// 需要合并的静态目录
    pub static_catalogs: Vec<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: "Red Hat".into(),
            output_path: PathBuf::from("data/models-catalog.yaml"),
            static_catalogs: Vec::new(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件路径
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 流水线配置
    pub pipeline: PipelineConfig,
    /// 字段抽取配置
    pub extraction: ExtractionConfig,
    /// Hugging Face 配置
    pub huggingface: HuggingFaceConfig,
    /// 镜像来源配置
    pub registry: RegistryConfig,
    /// 目录配置
    pub catalog: CatalogConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 创建离线配置（不访问外部 API）
    pub fn offline() -> Self {
        let mut config = Self::default();
        config.huggingface.enabled = false;
        config
    }
}
