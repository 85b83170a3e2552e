//! 模型元数据记录
//!
//! `ExtractedMetadata` 是持久化的规范形态；`CandidateSet` 是各个数据源
//! （模型卡、Hugging Face、镜像仓库）在合并前的候选值集合。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 字段来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// 模型卡（镜像中的 markdown 文档）
    Modelcard,
    /// 外部模型中心 API
    Huggingface,
    /// 镜像仓库 / 索引条目
    Registry,
    /// 文档化的默认值
    Generated,
    /// 无来源
    #[default]
    None,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Modelcard => write!(f, "modelcard"),
            Source::Huggingface => write!(f, "huggingface"),
            Source::Registry => write!(f, "registry"),
            Source::Generated => write!(f, "generated"),
            Source::None => write!(f, "none"),
        }
    }
}

/// 带来源的候选值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateField<T> {
    pub value: T,
    pub source: Source,
}

impl<T> CandidateField<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }
}

/// 单一数据源给出的全部候选字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    pub name: Option<CandidateField<String>>,
    pub provider: Option<CandidateField<String>>,
    pub description: Option<CandidateField<String>>,
    pub readme: Option<CandidateField<String>>,
    pub license: Option<CandidateField<String>>,
    pub license_link: Option<CandidateField<String>>,
    pub language: Option<CandidateField<Vec<String>>>,
    pub tags: Option<CandidateField<Vec<String>>>,
    pub tasks: Option<CandidateField<Vec<String>>>,
    pub validated_on: Option<CandidateField<Vec<String>>>,
    pub create_time: Option<CandidateField<i64>>,
    pub last_update_time: Option<CandidateField<i64>>,
}

impl CandidateSet {
    /// 空候选集（骨架记录的输入）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 是否没有任何候选值
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 列出已填充的字段
    pub fn populated_fields(&self) -> Vec<MetadataField> {
        let mut fields = Vec::new();
        let checks = [
            (MetadataField::Name, self.name.is_some()),
            (MetadataField::Provider, self.provider.is_some()),
            (MetadataField::Description, self.description.is_some()),
            (MetadataField::Readme, self.readme.is_some()),
            (MetadataField::License, self.license.is_some()),
            (MetadataField::LicenseLink, self.license_link.is_some()),
            (MetadataField::Language, self.language.is_some()),
            (MetadataField::Tags, self.tags.is_some()),
            (MetadataField::Tasks, self.tasks.is_some()),
            (MetadataField::ValidatedOn, self.validated_on.is_some()),
            (MetadataField::CreateTime, self.create_time.is_some()),
            (MetadataField::LastUpdateTime, self.last_update_time.is_some()),
        ];
        for (field, present) in checks {
            if present {
                fields.push(field);
            }
        }
        fields
    }

    /// 将所有候选值标记为指定来源
    pub fn relabel(mut self, source: Source) -> Self {
        macro_rules! relabel {
            ($($field:ident),*) => {
                $(if let Some(candidate) = self.$field.as_mut() {
                    candidate.source = source;
                })*
            };
        }
        relabel!(
            name, provider, description, readme, license, license_link, language, tags, tasks,
            validated_on, create_time, last_update_time
        );
        self
    }

    /// 用另一个候选集补齐缺失字段，已有字段保持不变
    pub fn or_fill(mut self, other: CandidateSet) -> Self {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() {
                    self.$field = other.$field;
                })*
            };
        }
        fill!(
            name, provider, description, readme, license, license_link, language, tags, tasks,
            validated_on, create_time, last_update_time
        );
        self
    }
}

/// 元数据字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Name,
    Provider,
    Description,
    Readme,
    Language,
    License,
    LicenseLink,
    Tags,
    Tasks,
    ValidatedOn,
    CreateTime,
    LastUpdateTime,
    Artifacts,
}

impl MetadataField {
    pub const ALL: [MetadataField; 13] = [
        MetadataField::Name,
        MetadataField::Provider,
        MetadataField::Description,
        MetadataField::Readme,
        MetadataField::Language,
        MetadataField::License,
        MetadataField::LicenseLink,
        MetadataField::Tags,
        MetadataField::Tasks,
        MetadataField::ValidatedOn,
        MetadataField::CreateTime,
        MetadataField::LastUpdateTime,
        MetadataField::Artifacts,
    ];

    /// 持久化文档中使用的键名
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Name => "name",
            MetadataField::Provider => "provider",
            MetadataField::Description => "description",
            MetadataField::Readme => "readme",
            MetadataField::Language => "language",
            MetadataField::License => "license",
            MetadataField::LicenseLink => "licenseLink",
            MetadataField::Tags => "tags",
            MetadataField::Tasks => "tasks",
            MetadataField::ValidatedOn => "validatedOn",
            MetadataField::CreateTime => "createTimeSinceEpoch",
            MetadataField::LastUpdateTime => "lastUpdateTimeSinceEpoch",
            MetadataField::Artifacts => "artifacts",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型化的自定义属性
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CustomProperty {
    #[serde(rename = "metadataType")]
    pub metadata_type: String,
    pub string_value: String,
}

impl CustomProperty {
    pub const STRING_TYPE: &'static str = "MetadataStringValue";

    /// 创建字符串属性
    pub fn string(value: &str) -> Self {
        Self {
            metadata_type: Self::STRING_TYPE.to_string(),
            string_value: value.to_string(),
        }
    }
}

/// OCI 制品
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OciArtifact {
    pub uri: String,
    pub create_time_since_epoch: Option<i64>,
    pub last_update_time_since_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, CustomProperty>,
}

impl OciArtifact {
    /// 只有 URI 的制品
    pub fn from_uri(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            create_time_since_epoch: None,
            last_update_time_since_epoch: None,
            custom_properties: BTreeMap::new(),
        }
    }
}

/// 规范的模型元数据记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ExtractedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_link: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validated_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time_since_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time_since_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<OciArtifact>,
}

impl ExtractedMetadata {
    /// 骨架记录：所有字段为空
    pub fn skeleton() -> Self {
        Self::default()
    }
}

/// 合并结果：元数据 + 逐字段来源
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichmentRecord {
    pub metadata: ExtractedMetadata,
    pub sources: BTreeMap<MetadataField, Source>,
}

impl EnrichmentRecord {
    /// 骨架记录，全部字段来源为 none
    pub fn skeleton() -> Self {
        Self {
            metadata: ExtractedMetadata::skeleton(),
            sources: MetadataField::ALL
                .iter()
                .map(|field| (*field, Source::None))
                .collect(),
        }
    }

    /// 查询字段来源
    pub fn source_of(&self, field: MetadataField) -> Source {
        self.sources.get(&field).copied().unwrap_or_default()
    }

    /// 生成溯源文档（字段名 -> 来源）
    pub fn provenance(&self) -> ProvenanceDocument {
        ProvenanceDocument {
            sources: self
                .sources
                .iter()
                .map(|(field, source)| (field.as_str().to_string(), *source))
                .collect(),
        }
    }
}

/// 持久化的溯源文档
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProvenanceDocument {
    pub sources: BTreeMap<String, Source>,
}
