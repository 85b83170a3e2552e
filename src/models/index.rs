//! 模型索引与版本索引
//!
//! 模型索引列出需要处理的镜像引用 / Hugging Face 仓库；版本索引按集合
//! 版本列出模型，可作为额外的引用来源。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::registry::ImageReference;

const HF_URL_PREFIXES: [&str; 3] = [
    "https://huggingface.co/",
    "http://huggingface.co/",
    "hf://",
];

/// 模型条目类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// ModelCar 容器镜像
    Oci,
    /// 仅来自 Hugging Face 的模型
    Hf,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Oci => write!(f, "oci"),
            ModelKind::Hf => write!(f, "hf"),
        }
    }
}

/// 模型索引中的单个条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl ModelEntry {
    pub fn oci(uri: &str) -> Self {
        Self {
            kind: ModelKind::Oci,
            uri: uri.to_string(),
            labels: Vec::new(),
        }
    }

    pub fn hf(uri: &str) -> Self {
        Self {
            kind: ModelKind::Hf,
            uri: uri.to_string(),
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// 规范化的模型标识，决定输出目录与去重
    ///
    /// oci 条目去掉协议前缀后按镜像引用重新格式化；hf 条目统一为
    /// `huggingface.co/<org>/<name>`。无法解析时退回去掉协议的原始 URI。
    pub fn key(&self) -> String {
        let parsed = match self.kind {
            ModelKind::Oci => ImageReference::parse(&self.uri).ok().map(|r| r.to_string()),
            ModelKind::Hf => self
                .hub_repo_id()
                .map(|repo| format!("huggingface.co/{}", repo)),
        };
        parsed.unwrap_or_else(|| {
            let trimmed = self.uri.trim();
            trimmed
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or(trimmed)
                .trim_matches('/')
                .to_string()
        })
    }

    /// Hugging Face 仓库 ID（`org/name`）
    pub fn hub_repo_id(&self) -> Option<String> {
        if self.kind != ModelKind::Hf {
            return None;
        }
        hub_repo_id_from_uri(&self.uri)
    }
}

/// 从 URL 或裸 ID 中提取 `org/name`
pub fn hub_repo_id_from_uri(uri: &str) -> Option<String> {
    let mut rest = uri.trim();
    for prefix in HF_URL_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    let segments: Vec<&str> = rest
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    match segments.as_slice() {
        [org, name, ..] => Some(format!("{}/{}", org, name)),
        [name] => Some(name.to_string()),
        [] => None,
    }
}

/// 模型索引文档：顶层列表或 `models:` 映射
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelIndexDocument {
    Wrapped { models: Vec<ModelEntry> },
    List(Vec<ModelEntry>),
}

impl ModelIndexDocument {
    pub fn into_entries(self) -> Vec<ModelEntry> {
        match self {
            ModelIndexDocument::Wrapped { models } => models,
            ModelIndexDocument::List(models) => models,
        }
    }
}

/// 解析模型索引
pub fn parse_models_index(content: &str) -> Result<Vec<ModelEntry>> {
    let document: ModelIndexDocument = serde_yaml::from_str(content)?;
    Ok(document.into_entries())
}

/// 读取模型索引文件
pub fn load_models_index(path: &Path) -> Result<Vec<ModelEntry>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Io(format!("读取模型索引失败 {}: {}", path.display(), e)))?;
    parse_models_index(&content)
}

/// 版本索引中的模型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionIndexModel {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_path: Option<String>,
}

/// 某一集合版本的模型列表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionIndex {
    pub version: String,
    #[serde(default)]
    pub models: Vec<VersionIndexModel>,
}

impl VersionIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Io(format!("读取版本索引失败 {}: {}", path.display(), e)))?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// 转换为 oci 类型的模型条目
    pub fn to_model_entries(&self) -> Vec<ModelEntry> {
        self.models
            .iter()
            .map(|model| ModelEntry::oci(&model.url))
            .collect()
    }
}

/// 追加条目，按规范化标识去重，保持首次出现的顺序
pub fn merge_entries(primary: Vec<ModelEntry>, extra: Vec<ModelEntry>) -> Vec<ModelEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(primary.len() + extra.len());
    for entry in primary.into_iter().chain(extra) {
        if seen.insert(entry.key()) {
            merged.push(entry);
        }
    }
    merged
}
