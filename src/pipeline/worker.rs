//! 单个模型的处理流程
//!
//! 定位 → 抽取 → 增强 → 持久化。每个实例只拥有一个引用，协作者以只读
//! 共享句柄的形式传入。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::config::AppConfig;
use crate::error::AppError;
use crate::enrichment::{EnrichmentEngine, HubClient, RegistryInput, fetch_hub_candidates};
use crate::extraction::{
    ExtractionOutcome, FieldExtractor, MarkdownExtractor, ModelCardFields, fetch_modelcard_layer,
};
use crate::migration::SchemaNormalizer;
use crate::models::{CandidateSet, EnrichmentRecord, ExtractedMetadata, ModelEntry, ModelKind};
use crate::observability::BatchMetrics;
use crate::registry::{ImageReference, ImageSource, registry_candidates};

use super::output::OutputLayout;

/// 单个模型的失败原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// 引用无法解析或镜像无法打开
    #[error("无法解析 {reference}: {reason}")]
    Resolution { reference: String, reason: String },

    /// 层获取失败
    #[error("获取失败 {reference}: {reason}")]
    Fetch { reference: String, reason: String },

    /// 已有记录不符合任何已知形态
    #[error("记录规范化失败 {reference}: {reason}")]
    Normalization { reference: String, reason: String },

    /// 写入失败
    #[error("写入失败 {reference}: {reason}")]
    Persistence { reference: String, reason: String },

    /// 任务异常终止
    #[error("任务中止 {reference}: {reason}")]
    Aborted { reference: String, reason: String },

    /// 与批次中更早的条目指向同一模型
    #[error("重复条目 {reference}: 与 {first} 写入同一记录")]
    Duplicate { reference: String, first: String },
}

impl PipelineError {
    /// 只有规范化失败会让整个批次失败
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Normalization { .. })
    }

    pub fn reference(&self) -> &str {
        match self {
            PipelineError::Resolution { reference, .. }
            | PipelineError::Fetch { reference, .. }
            | PipelineError::Normalization { reference, .. }
            | PipelineError::Persistence { reference, .. }
            | PipelineError::Aborted { reference, .. }
            | PipelineError::Duplicate { reference, .. } => reference,
        }
    }
}

/// 模型卡抽取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCardStatus {
    Found { filename: String },
    /// 镜像中没有 modelcard 层
    NoLayer,
    Absent,
    Ambiguous,
    Malformed,
    /// hf 条目不经过镜像
    NotApplicable,
}

impl ModelCardStatus {
    pub fn is_skeleton(&self) -> bool {
        matches!(
            self,
            ModelCardStatus::NoLayer
                | ModelCardStatus::Absent
                | ModelCardStatus::Ambiguous
                | ModelCardStatus::Malformed
        )
    }
}

/// 处理成功的模型
#[derive(Debug, Clone)]
pub struct ProcessedModel {
    pub uri: String,
    pub path: PathBuf,
    pub record: EnrichmentRecord,
    pub modelcard: ModelCardStatus,
}

/// 各流水线实例共享的只读协作者
#[derive(Clone)]
pub struct PipelineContext {
    pub images: Arc<dyn ImageSource>,
    pub hub: Option<Arc<dyn HubClient>>,
    pub extractor: FieldExtractor,
    pub markdown: MarkdownExtractor,
    pub normalizer: SchemaNormalizer,
    pub engine: EnrichmentEngine,
    pub layout: OutputLayout,
    pub metrics: BatchMetrics,
}

impl PipelineContext {
    pub fn new(
        config: &AppConfig,
        images: Arc<dyn ImageSource>,
        hub: Option<Arc<dyn HubClient>>,
    ) -> Self {
        let extractor = FieldExtractor::from_config(&config.extraction);
        Self {
            images,
            hub,
            normalizer: SchemaNormalizer::new(extractor.dates().clone()),
            extractor,
            markdown: MarkdownExtractor::new(config.extraction.max_document_bytes),
            engine: EnrichmentEngine::new(),
            layout: OutputLayout::new(&config.pipeline.output_dir),
            metrics: BatchMetrics::default(),
        }
    }
}

/// 处理单个条目
pub async fn process_model(
    ctx: &PipelineContext,
    entry: &ModelEntry,
) -> Result<ProcessedModel, PipelineError> {
    let (modelcard, hub, registry, status) = match entry.kind {
        ModelKind::Oci => gather_oci(ctx, entry).await?,
        ModelKind::Hf => gather_hf(ctx, entry).await?,
    };

    let key = entry.key();
    let prior = load_prior(ctx, &entry.uri, &key).await?;
    let mut record = ctx.engine.merge(&modelcard, &hub, &registry);
    if let Some(prior) = prior {
        carry_over_artifact_properties(&prior, &mut record.metadata);
    }

    let path = ctx
        .layout
        .write_record(&key, &record)
        .await
        .map_err(|e| PipelineError::Persistence {
            reference: entry.uri.clone(),
            reason: e.to_string(),
        })?;

    tracing::info!(
        reference = %entry.uri,
        kind = %entry.kind,
        name = record.metadata.name.as_deref().unwrap_or("-"),
        path = %path.display(),
        "模型记录已写出"
    );

    Ok(ProcessedModel {
        uri: entry.uri.clone(),
        path,
        record,
        modelcard: status,
    })
}

type Gathered = (CandidateSet, CandidateSet, RegistryInput, ModelCardStatus);

async fn gather_oci(ctx: &PipelineContext, entry: &ModelEntry) -> Result<Gathered, PipelineError> {
    let resolution = |reason: String| PipelineError::Resolution {
        reference: entry.uri.clone(),
        reason,
    };

    let reference = ImageReference::parse(&entry.uri).map_err(|e| resolution(e.to_string()))?;
    let image = ctx
        .images
        .resolve(&reference)
        .await
        .map_err(|e| resolution(e.to_string()))?;

    let layer = fetch_modelcard_layer(ctx.images.as_ref(), &image)
        .await
        .map_err(|e| PipelineError::Fetch {
            reference: entry.uri.clone(),
            reason: e.to_string(),
        })?;

    let (fields, status) = match layer {
        None => (ModelCardFields::default(), ModelCardStatus::NoLayer),
        Some(layer) => {
            match ctx
                .markdown
                .extract(&layer.bytes, &layer.descriptor.media_type)
            {
                ExtractionOutcome::Found(document) => {
                    ctx.metrics.record_modelcard();
                    let fields = ctx.extractor.extract(&document.text());
                    tracing::debug!(
                        reference = %entry.uri,
                        file = %document.filename,
                        fields = fields.candidates.populated_fields().len(),
                        "模型卡已抽取"
                    );
                    (
                        fields,
                        ModelCardStatus::Found {
                            filename: document.filename,
                        },
                    )
                }
                ExtractionOutcome::Absent => {
                    tracing::warn!(reference = %entry.uri, "modelcard 层中没有 markdown 文档");
                    (ModelCardFields::default(), ModelCardStatus::Absent)
                }
                ExtractionOutcome::Ambiguous { first, second } => {
                    ctx.metrics.record_ambiguous();
                    tracing::warn!(
                        reference = %entry.uri,
                        first = %first,
                        second = %second,
                        "modelcard 层包含多个 markdown 文档，视为缺失"
                    );
                    (ModelCardFields::default(), ModelCardStatus::Ambiguous)
                }
                ExtractionOutcome::Malformed(reason) => {
                    tracing::warn!(reference = %entry.uri, reason = %reason, "modelcard 层无法解码");
                    (ModelCardFields::default(), ModelCardStatus::Malformed)
                }
            }
        }
    };
    if status.is_skeleton() {
        ctx.metrics.record_skeleton();
    }

    let hub = match &fields.hub_repo {
        Some(repo) => hub_candidates_or_empty(ctx, &entry.uri, repo).await,
        None => CandidateSet::empty(),
    };

    let registry = RegistryInput {
        candidates: registry_candidates(&image, ctx.extractor.validator()),
        labels: entry.labels.clone(),
        artifacts: vec![image.artifact()],
        fallback_name: None,
    };

    Ok((fields.candidates, hub, registry, status))
}

async fn gather_hf(ctx: &PipelineContext, entry: &ModelEntry) -> Result<Gathered, PipelineError> {
    let repo = entry
        .hub_repo_id()
        .ok_or_else(|| PipelineError::Resolution {
            reference: entry.uri.clone(),
            reason: "无法识别 Hugging Face 仓库".to_string(),
        })?;

    let hub = hub_candidates_or_empty(ctx, &entry.uri, &repo).await;
    let registry = RegistryInput {
        labels: entry.labels.clone(),
        fallback_name: repo.rsplit('/').next().map(str::to_string),
        ..RegistryInput::default()
    };

    Ok((CandidateSet::empty(), hub, registry, ModelCardStatus::NotApplicable))
}

/// 外部 API 失败时该来源视为完全缺失
async fn hub_candidates_or_empty(ctx: &PipelineContext, reference: &str, repo: &str) -> CandidateSet {
    let Some(client) = &ctx.hub else {
        return CandidateSet::empty();
    };
    match fetch_hub_candidates(client.as_ref(), repo, &ctx.extractor).await {
        Ok(candidates) => candidates,
        Err(e) => {
            ctx.metrics.record_hub_failure();
            tracing::warn!(reference = %reference, repo = %repo, error = %e, "模型中心查询失败");
            CandidateSet::empty()
        }
    }
}

async fn load_prior(
    ctx: &PipelineContext,
    reference: &str,
    key: &str,
) -> Result<Option<ExtractedMetadata>, PipelineError> {
    ctx.normalizer
        .load(&ctx.layout.metadata_path(key))
        .await
        .map_err(|e| match e {
            AppError::Normalization(reason) => PipelineError::Normalization {
                reference: reference.to_string(),
                reason,
            },
            other => PipelineError::Persistence {
                reference: reference.to_string(),
                reason: other.to_string(),
            },
        })
}

/// 同一 URI 的制品沿用上次记录中的自定义属性
pub fn carry_over_artifact_properties(prior: &ExtractedMetadata, metadata: &mut ExtractedMetadata) {
    let previous: HashMap<&str, _> = prior
        .artifacts
        .iter()
        .filter(|artifact| !artifact.custom_properties.is_empty())
        .map(|artifact| (artifact.uri.as_str(), &artifact.custom_properties))
        .collect();

    for artifact in metadata.artifacts.iter_mut() {
        if artifact.custom_properties.is_empty() {
            if let Some(properties) = previous.get(artifact.uri.as_str()) {
                artifact.custom_properties = (*properties).clone();
            }
        }
    }
}
