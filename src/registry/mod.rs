//! 镜像仓库模块
//!
//! 镜像解析与 blob 获取由 `ImageSource` 协作者负责，本模块只定义其接口、
//! 描述符类型，以及从已解析镜像推导出的候选字段。

pub mod layout;
pub mod reference;

pub use layout::OciLayoutSource;
pub use reference::{ImageReference, ReferenceError};

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::extraction::validation::FieldValidator;
use crate::models::{CandidateField, CandidateSet, OciArtifact, Source};

pub const ANNOTATION_VENDOR: &str = "org.opencontainers.image.vendor";
pub const ANNOTATION_DESCRIPTION: &str = "org.opencontainers.image.description";
pub const ANNOTATION_LICENSES: &str = "org.opencontainers.image.licenses";
pub const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";
pub const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

/// 内容寻址的 blob 描述符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub digest: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// 已解析的镜像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub reference: ImageReference,
    pub manifest_digest: String,
    /// 按清单顺序排列的层
    pub layers: Vec<BlobDescriptor>,
    /// 清单注解
    pub annotations: BTreeMap<String, String>,
    /// 镜像配置中的标签
    pub labels: BTreeMap<String, String>,
    /// 镜像配置中的 `created`
    pub created: Option<String>,
}

impl ResolvedImage {
    /// 先查清单注解，再查配置标签
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .or_else(|| self.labels.get(key))
            .map(String::as_str)
    }

    /// 镜像创建时间（秒）
    pub fn created_epoch(&self) -> Option<i64> {
        self.created
            .as_deref()
            .or_else(|| self.annotation(ANNOTATION_CREATED))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.timestamp())
    }

    /// 该引用对应的制品
    pub fn artifact(&self) -> OciArtifact {
        let created = self.created_epoch();
        OciArtifact {
            create_time_since_epoch: created,
            last_update_time_since_epoch: created,
            ..OciArtifact::from_uri(&self.reference.artifact_uri())
        }
    }
}

/// 镜像来源协作者
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// 解析引用，读取清单和配置
    async fn resolve(&self, reference: &ImageReference) -> Result<ResolvedImage>;

    /// 获取 blob 内容
    async fn fetch_blob(&self, image: &ResolvedImage, descriptor: &BlobDescriptor)
    -> Result<Vec<u8>>;
}

/// 从镜像元数据推导候选字段，来源均为 registry
pub fn registry_candidates(image: &ResolvedImage, validator: &FieldValidator) -> CandidateSet {
    let field = |value: Option<String>| value.map(|v| CandidateField::new(v, Source::Registry));
    let annotation = |key: &str| image.annotation(key).and_then(|raw| validator.validate(raw));
    let created = image.created_epoch();

    CandidateSet {
        name: field(
            image
                .reference
                .model_name()
                .and_then(|name| validator.validate(&name)),
        ),
        provider: field(annotation(ANNOTATION_VENDOR)),
        description: field(annotation(ANNOTATION_DESCRIPTION)),
        license: field(annotation(ANNOTATION_LICENSES)),
        create_time: created.map(|ts| CandidateField::new(ts, Source::Registry)),
        last_update_time: created.map(|ts| CandidateField::new(ts, Source::Registry)),
        ..CandidateSet::empty()
    }
}
