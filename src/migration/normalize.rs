//! 持久化记录的形态识别与升级
//!
//! 记录可能是三种历史形态之一：
//! - current：结构化制品，整数时间戳
//! - legacy：制品为纯 URI 字符串
//! - mixed：时间戳为数字或字符串
//!
//! 解码按固定顺序尝试，第一个成功的形态胜出，随后在内存中升级为规范形态。
//! 规范化不会回写源文件。

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::extraction::dates::DateParser;
use crate::migration::NormalizationError;
use crate::migration::timestamp::RawTimestamp;
use crate::models::metadata::{CustomProperty, ExtractedMetadata, OciArtifact};

/// 历史记录的通用形态，按制品类型 `A` 和时间戳类型 `T` 参数化
#[derive(Debug, Clone, Deserialize)]
#[serde(
    rename_all = "camelCase",
    deny_unknown_fields,
    bound(deserialize = "A: Deserialize<'de>, T: Deserialize<'de> + Default")
)]
pub struct PersistedRecord<A, T> {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub license_link: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub validated_on: Vec<String>,
    #[serde(default)]
    pub create_time_since_epoch: T,
    #[serde(default)]
    pub last_update_time_since_epoch: T,
    #[serde(default)]
    pub artifacts: Vec<A>,
}

/// legacy 形态：制品为 URI 字符串
pub type LegacyRecord = PersistedRecord<String, Option<i64>>;

/// mixed 形态：时间戳为数字或字符串，制品可为任一写法
pub type MixedRecord = PersistedRecord<MixedArtifact, RawTimestamp>;

/// mixed 形态中的制品
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MixedArtifact {
    Uri(String),
    Structured(MixedStructuredArtifact),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MixedStructuredArtifact {
    pub uri: String,
    #[serde(default)]
    pub create_time_since_epoch: RawTimestamp,
    #[serde(default)]
    pub last_update_time_since_epoch: RawTimestamp,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, CustomProperty>,
}

/// 已识别的形态
#[derive(Debug, Clone)]
pub enum PersistedShape {
    Current(ExtractedMetadata),
    Legacy(LegacyRecord),
    Mixed(MixedRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Current,
    Legacy,
    Mixed,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Current => write!(f, "current"),
            ShapeKind::Legacy => write!(f, "legacy"),
            ShapeKind::Mixed => write!(f, "mixed"),
        }
    }
}

impl PersistedShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            PersistedShape::Current(_) => ShapeKind::Current,
            PersistedShape::Legacy(_) => ShapeKind::Legacy,
            PersistedShape::Mixed(_) => ShapeKind::Mixed,
        }
    }
}

type Decoder = fn(&str) -> std::result::Result<PersistedShape, serde_yaml::Error>;

fn decode_current(text: &str) -> std::result::Result<PersistedShape, serde_yaml::Error> {
    serde_yaml::from_str(text).map(PersistedShape::Current)
}

fn decode_legacy(text: &str) -> std::result::Result<PersistedShape, serde_yaml::Error> {
    serde_yaml::from_str(text).map(PersistedShape::Legacy)
}

fn decode_mixed(text: &str) -> std::result::Result<PersistedShape, serde_yaml::Error> {
    serde_yaml::from_str(text).map(PersistedShape::Mixed)
}

/// 候选解码器，按顺序尝试
const DECODERS: [(ShapeKind, Decoder); 3] = [
    (ShapeKind::Current, decode_current),
    (ShapeKind::Legacy, decode_legacy),
    (ShapeKind::Mixed, decode_mixed),
];

/// 模式规范化器
#[derive(Debug, Clone, Default)]
pub struct SchemaNormalizer {
    dates: DateParser,
}

impl SchemaNormalizer {
    pub fn new(dates: DateParser) -> Self {
        Self { dates }
    }

    /// 识别记录形态
    pub fn decode(&self, text: &str) -> std::result::Result<PersistedShape, NormalizationError> {
        let mut attempts = Vec::with_capacity(DECODERS.len());
        for (kind, decoder) in DECODERS {
            match decoder(text) {
                Ok(shape) => return Ok(shape),
                Err(e) => attempts.push(format!("{}: {}", kind, e)),
            }
        }
        Err(NormalizationError::UnknownShape { attempts })
    }

    /// 解码并升级为规范形态
    pub fn normalize(
        &self,
        text: &str,
    ) -> std::result::Result<ExtractedMetadata, NormalizationError> {
        let shape = self.decode(text)?;
        self.upgrade(shape)
    }

    /// 将任一形态升级为规范形态
    pub fn upgrade(
        &self,
        shape: PersistedShape,
    ) -> std::result::Result<ExtractedMetadata, NormalizationError> {
        match shape {
            PersistedShape::Current(metadata) => Ok(metadata),
            PersistedShape::Legacy(record) => {
                let artifacts = record
                    .artifacts
                    .iter()
                    .map(|uri| OciArtifact::from_uri(uri))
                    .collect();
                assemble(record, artifacts, |_, ts| Ok(*ts))
            }
            PersistedShape::Mixed(record) => {
                let mut artifacts = Vec::with_capacity(record.artifacts.len());
                for artifact in &record.artifacts {
                    artifacts.push(self.upgrade_artifact(artifact)?);
                }
                assemble(record, artifacts, |field, ts| self.coerce(field, ts))
            }
        }
    }

    /// 读取并规范化文件；文件不存在时返回 `None`
    pub async fn load(&self, path: &Path) -> Result<Option<ExtractedMetadata>> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Io(format!(
                    "读取记录失败 {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let metadata = self.normalize(&text).map_err(|e| {
            AppError::Normalization(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(metadata))
    }

    fn upgrade_artifact(
        &self,
        artifact: &MixedArtifact,
    ) -> std::result::Result<OciArtifact, NormalizationError> {
        match artifact {
            MixedArtifact::Uri(uri) => Ok(OciArtifact::from_uri(uri)),
            MixedArtifact::Structured(structured) => Ok(OciArtifact {
                uri: structured.uri.clone(),
                create_time_since_epoch: self
                    .coerce("artifacts.createTimeSinceEpoch", &structured.create_time_since_epoch)?,
                last_update_time_since_epoch: self.coerce(
                    "artifacts.lastUpdateTimeSinceEpoch",
                    &structured.last_update_time_since_epoch,
                )?,
                custom_properties: structured.custom_properties.clone(),
            }),
        }
    }

    fn coerce(
        &self,
        field: &str,
        raw: &RawTimestamp,
    ) -> std::result::Result<Option<i64>, NormalizationError> {
        raw.normalize(&self.dates)
            .map_err(|source| NormalizationError::Timestamp {
                field: field.to_string(),
                source,
            })
    }
}

fn assemble<A, T, F>(
    record: PersistedRecord<A, T>,
    artifacts: Vec<OciArtifact>,
    timestamp: F,
) -> std::result::Result<ExtractedMetadata, NormalizationError>
where
    F: Fn(&str, &T) -> std::result::Result<Option<i64>, NormalizationError>,
{
    Ok(ExtractedMetadata {
        create_time_since_epoch: timestamp(
            "createTimeSinceEpoch",
            &record.create_time_since_epoch,
        )?,
        last_update_time_since_epoch: timestamp(
            "lastUpdateTimeSinceEpoch",
            &record.last_update_time_since_epoch,
        )?,
        name: record.name,
        provider: record.provider,
        description: record.description,
        readme: record.readme,
        language: record.language,
        license: record.license,
        license_link: record.license_link,
        tags: record.tags,
        tasks: record.tasks,
        validated_on: record.validated_on,
        artifacts,
    })
}
