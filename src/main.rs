use anyhow::Context;
use modelcar_catalog::catalog::CatalogBuilder;
use modelcar_catalog::config::loader::ConfigLoader;
use modelcar_catalog::enrichment::{HubClient, HuggingFaceClient};
use modelcar_catalog::migration::SchemaNormalizer;
use modelcar_catalog::models::index::{load_models_index, merge_entries};
use modelcar_catalog::models::VersionIndex;
use modelcar_catalog::observability::init_tracing;
use modelcar_catalog::pipeline::{PipelineContext, run_batch};
use modelcar_catalog::registry::OciLayoutSource;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("加载配置失败")?;
    ConfigLoader::validate(&config).context("配置校验失败")?;

    let _guard = init_tracing(&config.logging)?;
    info!("Starting modelcar-catalog...");

    let mut entries = load_models_index(&config.pipeline.models_index).with_context(|| {
        format!(
            "读取模型索引失败: {}",
            config.pipeline.models_index.display()
        )
    })?;
    for path in &config.pipeline.version_indexes {
        let index = VersionIndex::load(path)
            .with_context(|| format!("读取版本索引失败: {}", path.display()))?;
        entries = merge_entries(entries, index.to_model_entries());
    }
    info!("Loaded {} model entries", entries.len());

    let images = Arc::new(OciLayoutSource::new(&config.registry.layout_root));
    let hub: Option<Arc<dyn HubClient>> = if config.huggingface.enabled {
        let client = HuggingFaceClient::new(&config.huggingface)
            .context("创建 Hugging Face 客户端失败")?;
        Some(Arc::new(client))
    } else {
        info!("Hugging Face enrichment disabled");
        None
    };

    let ctx = Arc::new(PipelineContext::new(&config, images, hub));
    let normalizer: SchemaNormalizer = ctx.normalizer.clone();
    let report = run_batch(ctx, entries, config.pipeline.concurrency).await;

    let report = report
        .into_result()
        .context("批处理因记录规范化失败而终止")?;
    let failed = report.failed().count();
    info!(
        "Batch finished: {} succeeded, {} failed",
        report.succeeded().count(),
        failed
    );

    let builder = CatalogBuilder::new(&config.catalog.source, normalizer);
    let catalog = builder
        .run(
            &config.pipeline.output_dir,
            &config.catalog.static_catalogs,
            &config.catalog.output_path,
        )
        .await
        .context("生成模型目录失败")?;
    info!(
        "Catalog written to {} ({} models)",
        config.catalog.output_path.display(),
        catalog.models.len()
    );

    Ok(())
}
