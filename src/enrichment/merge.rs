//! 合并引擎
//!
//! 逐字段按优先级选择：modelcard > huggingface > registry > generated。
//! 标签取并集，制品始终来自镜像仓库。本模块不做任何 I/O。

use crate::extraction::validation::dedupe;
use crate::models::{
    CandidateField, CandidateSet, EnrichmentRecord, ExtractedMetadata, MetadataField, OciArtifact,
    Source,
};

/// 许可证标识 → 许可证链接
const LICENSE_LINKS: &[(&str, &str)] = &[
    ("apache-2.0", "https://www.apache.org/licenses/LICENSE-2.0"),
    ("mit", "https://opensource.org/licenses/MIT"),
    ("llama2", "https://ai.meta.com/llama/license/"),
    ("llama3", "https://llama.meta.com/llama3/license/"),
    (
        "llama3.1",
        "https://github.com/meta-llama/llama-models/blob/main/models/llama3_1/LICENSE",
    ),
    (
        "llama3.2",
        "https://github.com/meta-llama/llama-models/blob/main/models/llama3_2/LICENSE.txt",
    ),
    (
        "llama3.3",
        "https://github.com/meta-llama/llama-models/blob/main/models/llama3_3/LICENSE",
    ),
    ("gemma", "https://ai.google.dev/gemma/terms"),
    ("bsd-3-clause", "https://opensource.org/licenses/BSD-3-Clause"),
    ("cc-by-4.0", "https://creativecommons.org/licenses/by/4.0/"),
    ("cc-by-sa-4.0", "https://creativecommons.org/licenses/by-sa/4.0/"),
    ("cc-by-nc-4.0", "https://creativecommons.org/licenses/by-nc/4.0/"),
    (
        "openrail",
        "https://www.licenses.ai/blog/2022/8/26/bigscience-open-rail-m-license",
    ),
    ("gpl-3.0", "https://www.gnu.org/licenses/gpl-3.0.html"),
];

/// 已知许可证的链接
pub fn license_link_for(license: &str) -> Option<&'static str> {
    let key: String = license
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    LICENSE_LINKS
        .iter()
        .find(|(id, _)| *id == key)
        .map(|(_, link)| *link)
}

/// 默认描述
pub fn default_description(name: &str) -> String {
    format!("{} model packaged as a ModelCar container image.", name)
}

/// 镜像仓库侧的输入
#[derive(Debug, Clone, Default)]
pub struct RegistryInput {
    /// 从镜像元数据推导出的候选值
    pub candidates: CandidateSet,
    /// 索引条目上的标签
    pub labels: Vec<String>,
    /// 每个镜像引用一个制品
    pub artifacts: Vec<OciArtifact>,
    /// 没有任何来源提供名称时使用的生成名称
    pub fallback_name: Option<String>,
}

/// 合并引擎
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentEngine;

impl EnrichmentEngine {
    pub fn new() -> Self {
        Self
    }

    /// 合并三类候选值为一条记录
    pub fn merge(
        &self,
        modelcard: &CandidateSet,
        hub: &CandidateSet,
        registry: &RegistryInput,
    ) -> EnrichmentRecord {
        let tiers = [
            (Source::Modelcard, modelcard),
            (Source::Huggingface, hub),
            (Source::Registry, &registry.candidates),
        ];
        let mut record = EnrichmentRecord::skeleton();
        let metadata = &mut record.metadata;
        let sources = &mut record.sources;

        let mut scalar = |field: MetadataField,
                          get: fn(&CandidateSet) -> &Option<CandidateField<String>>|
         -> Option<String> {
            let (value, source) = choose(&tiers, get)?;
            sources.insert(field, source);
            Some(value)
        };

        metadata.name = scalar(MetadataField::Name, |s| &s.name);
        metadata.provider = scalar(MetadataField::Provider, |s| &s.provider);
        metadata.description = scalar(MetadataField::Description, |s| &s.description);
        metadata.readme = scalar(MetadataField::Readme, |s| &s.readme);
        metadata.license = scalar(MetadataField::License, |s| &s.license);
        metadata.license_link = scalar(MetadataField::LicenseLink, |s| &s.license_link);

        let mut list = |field: MetadataField,
                        get: fn(&CandidateSet) -> &Option<CandidateField<Vec<String>>>|
         -> Vec<String> {
            match choose(&tiers, get) {
                Some((value, source)) => {
                    sources.insert(field, source);
                    value
                }
                None => Vec::new(),
            }
        };

        metadata.language = list(MetadataField::Language, |s| &s.language);
        metadata.tasks = list(MetadataField::Tasks, |s| &s.tasks);
        metadata.validated_on = list(MetadataField::ValidatedOn, |s| &s.validated_on);

        let mut timestamp = |field: MetadataField,
                             get: fn(&CandidateSet) -> &Option<CandidateField<i64>>|
         -> Option<i64> {
            let (value, source) = choose(&tiers, get)?;
            sources.insert(field, source);
            Some(value)
        };

        metadata.create_time_since_epoch = timestamp(MetadataField::CreateTime, |s| &s.create_time);
        metadata.last_update_time_since_epoch =
            timestamp(MetadataField::LastUpdateTime, |s| &s.last_update_time);

        // 标签：并集，去重保序；来源取贡献者中优先级最高者
        let mut tags = Vec::new();
        let mut tag_source = Source::None;
        let contributions = tiers
            .iter()
            .map(|(source, set)| {
                (
                    *source,
                    set.tags.as_ref().map(|t| t.value.clone()).unwrap_or_default(),
                )
            })
            .chain(std::iter::once((Source::Registry, registry.labels.clone())));
        for (source, values) in contributions {
            if !values.is_empty() && tag_source == Source::None {
                tag_source = source;
            }
            tags.extend(values);
        }
        metadata.tags = dedupe(tags);
        if !metadata.tags.is_empty() {
            sources.insert(MetadataField::Tags, tag_source);
        }

        metadata.artifacts = registry.artifacts.clone();
        if !metadata.artifacts.is_empty() {
            sources.insert(MetadataField::Artifacts, Source::Registry);
        }

        apply_generated_defaults(&mut record, registry.fallback_name.as_deref());
        record
    }
}

/// 按层级取第一个存在的候选值，来源按层级标记
fn choose<T: Clone>(
    tiers: &[(Source, &CandidateSet); 3],
    get: fn(&CandidateSet) -> &Option<CandidateField<T>>,
) -> Option<(T, Source)> {
    tiers
        .iter()
        .find_map(|(source, set)| get(set).as_ref().map(|field| (field.value.clone(), *source)))
}

fn apply_generated_defaults(record: &mut EnrichmentRecord, fallback_name: Option<&str>) {
    let metadata = &mut record.metadata;

    if metadata.name.is_none() {
        if let Some(name) = fallback_name.filter(|n| !n.trim().is_empty()) {
            metadata.name = Some(name.trim().to_string());
            record.sources.insert(MetadataField::Name, Source::Generated);
        }
    }

    if metadata.description.is_none() {
        if let Some(name) = &metadata.name {
            metadata.description = Some(default_description(name));
            record
                .sources
                .insert(MetadataField::Description, Source::Generated);
        }
    }

    if metadata.license_link.is_none() {
        if let Some(link) = metadata.license.as_deref().and_then(license_link_for) {
            metadata.license_link = Some(link.to_string());
            record
                .sources
                .insert(MetadataField::LicenseLink, Source::Generated);
        }
    }
}
