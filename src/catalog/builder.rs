//! 目录构建器
//!
//! 读取所有模型记录（经规范化），投影为目录条目，合并静态目录并写出。

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::migration::SchemaNormalizer;
use crate::models::{
    CatalogArtifact, CatalogEntry, CustomProperty, ExtractedMetadata, ModelsCatalog, OciArtifact,
};
use crate::pipeline::output::{METADATA_FILE, MODELS_DIR};

/// 校验环境列表对应的自定义属性键
pub const VALIDATED_ON_PROPERTY: &str = "validated_on";

static STRING_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*(?:- )?string_value:)[ ]+(.*)$").expect("valid string_value regex")
});

/// 块标量头，例如 `|`、`|-`、`>+`、`|2-`
static BLOCK_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[|>](?:[1-9][-+]?|[-+][1-9]?)?$").expect("valid block indicator regex")
});

/// 目录构建器
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    source: String,
    normalizer: SchemaNormalizer,
}

impl CatalogBuilder {
    pub fn new(source: &str, normalizer: SchemaNormalizer) -> Self {
        Self {
            source: source.to_string(),
            normalizer,
        }
    }

    /// 按路径顺序读取 `<output_dir>/*/models/metadata.yaml`
    ///
    /// 任一记录无法规范化即返回错误。
    pub async fn collect_records(&self, output_dir: &Path) -> Result<Vec<ExtractedMetadata>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = match tokio::fs::read_dir(output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(MODELS_DIR).join(METADATA_FILE);
            if tokio::fs::try_exists(&path).await? {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(metadata) = self.normalizer.load(&path).await? {
                records.push(metadata);
            }
        }
        Ok(records)
    }

    /// 组装目录：生成条目按名称排序，静态条目随后，同名跳过
    pub fn build(&self, records: &[ExtractedMetadata], statics: Vec<ModelsCatalog>) -> ModelsCatalog {
        let mut catalog = ModelsCatalog::new(&self.source);

        let mut generated: Vec<CatalogEntry> = records.iter().filter_map(project).collect();
        generated.sort_by(|a, b| a.name.cmp(&b.name));

        let mut names: HashSet<String> = HashSet::new();
        for entry in generated {
            if names.insert(entry.name.clone()) {
                catalog.models.push(entry);
            } else {
                tracing::warn!(name = %entry.name, "重复的模型名称，已跳过");
            }
        }

        for static_catalog in statics {
            for entry in static_catalog.models {
                if names.insert(entry.name.clone()) {
                    catalog.models.push(entry);
                } else {
                    tracing::debug!(name = %entry.name, source = %static_catalog.source, "静态条目已存在");
                }
            }
        }

        catalog
    }

    /// 读取记录、合并静态目录并写出
    pub async fn run(
        &self,
        output_dir: &Path,
        static_catalogs: &[PathBuf],
        output_path: &Path,
    ) -> Result<ModelsCatalog> {
        let records = self.collect_records(output_dir).await?;
        let mut statics = Vec::with_capacity(static_catalogs.len());
        for path in static_catalogs {
            statics.push(load_static_catalog(path).await?);
        }

        let catalog = self.build(&records, statics);
        write_catalog(&catalog, output_path).await?;
        tracing::info!(
            models = catalog.models.len(),
            records = records.len(),
            path = %output_path.display(),
            "目录已写出"
        );
        Ok(catalog)
    }
}

/// 记录 → 目录条目；没有名称的记录不进入目录
pub fn project(metadata: &ExtractedMetadata) -> Option<CatalogEntry> {
    let Some(name) = metadata.name.clone() else {
        tracing::warn!(
            artifacts = ?metadata.artifacts.iter().map(|a| a.uri.as_str()).collect::<Vec<_>>(),
            "记录缺少名称，已跳过"
        );
        return None;
    };

    let mut custom_properties: BTreeMap<String, CustomProperty> = metadata
        .tags
        .iter()
        .map(|tag| (tag.clone(), CustomProperty::string("")))
        .collect();
    if !metadata.validated_on.is_empty() {
        custom_properties.insert(
            VALIDATED_ON_PROPERTY.to_string(),
            CustomProperty::string(&metadata.validated_on.join(", ")),
        );
    }

    Some(CatalogEntry {
        name,
        provider: metadata.provider.clone(),
        description: metadata.description.clone(),
        readme: metadata.readme.clone(),
        language: metadata.language.clone(),
        license: metadata.license.clone(),
        license_link: metadata.license_link.clone(),
        tasks: metadata.tasks.clone(),
        create_time_since_epoch: metadata.create_time_since_epoch.map(|ts| ts.to_string()),
        last_update_time_since_epoch: metadata
            .last_update_time_since_epoch
            .map(|ts| ts.to_string()),
        custom_properties,
        artifacts: metadata.artifacts.iter().map(project_artifact).collect(),
        extra: BTreeMap::new(),
    })
}

fn project_artifact(artifact: &OciArtifact) -> CatalogArtifact {
    CatalogArtifact {
        uri: artifact.uri.clone(),
        create_time_since_epoch: artifact.create_time_since_epoch.map(|ts| ts.to_string()),
        last_update_time_since_epoch: artifact
            .last_update_time_since_epoch
            .map(|ts| ts.to_string()),
        custom_properties: artifact.custom_properties.clone(),
    }
}

/// 读取静态目录
pub async fn load_static_catalog(path: &Path) -> Result<ModelsCatalog> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Io(format!("读取静态目录失败 {}: {}", path.display(), e)))?;
    serde_yaml::from_str(&text)
        .map_err(|e| AppError::Serialization(format!("{}: {}", path.display(), e)))
}

/// 序列化目录，`string_value` 一律使用双引号
///
/// 逐行扫描 serde_yaml 的输出。块标量（readme 等多行文本）的内容行原样保留，
/// 只有真正作为键出现的 `string_value` 会被改写；多行的 `string_value`
/// 折叠为一行双引号标量。
pub fn render_catalog(catalog: &ModelsCatalog) -> Result<String> {
    let yaml = serde_yaml::to_string(catalog)?;
    let mut rendered = String::with_capacity(yaml.len());
    let mut lines = yaml.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(threshold) = block_threshold(line) else {
            rendered.push_str(&quote_inline_string_value(line)?);
            rendered.push('\n');
            continue;
        };

        let mut block = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() || indentation(next) > threshold {
                block.push(*next);
                lines.next();
            } else {
                break;
            }
        }

        match STRING_VALUE_LINE.captures(line) {
            Some(caps) => {
                let value = parse_block_scalar(&caps[2], &block)?;
                rendered.push_str(&format!("{} {}\n", &caps[1], quote(&value)?));
            }
            None => {
                rendered.push_str(line);
                rendered.push('\n');
                for content in block {
                    rendered.push_str(content);
                    rendered.push('\n');
                }
            }
        }
    }
    Ok(rendered)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// 行尾打开块标量时，返回内容行必须超过的缩进
fn block_threshold(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let mut rest = trimmed.trim_start_matches(' ');
    let mut column = indentation(trimmed);
    let mut dashes = 0;
    while let Some(stripped) = rest.strip_prefix("- ") {
        rest = stripped;
        column += 2;
        dashes += 1;
    }

    match rest.split_once(": ") {
        // 键: 块头
        Some((_, value)) => BLOCK_INDICATOR.is_match(value).then_some(column),
        // 序列元素本身是块标量
        None if dashes > 0 && BLOCK_INDICATOR.is_match(rest) => Some(column - 2),
        None => None,
    }
}

fn parse_block_scalar(header: &str, block: &[&str]) -> Result<String> {
    let mut document = format!("value: {}\n", header);
    for line in block {
        document.push_str(line);
        document.push('\n');
    }
    let mut parsed: BTreeMap<String, String> = serde_yaml::from_str(&document)
        .map_err(|e| AppError::Serialization(format!("string_value 无法重写: {}", e)))?;
    Ok(parsed.remove("value").unwrap_or_default())
}

fn quote_inline_string_value(line: &str) -> Result<String> {
    let Some(caps) = STRING_VALUE_LINE.captures(line) else {
        return Ok(line.to_string());
    };
    let value: String = serde_yaml::from_str(&caps[2])
        .map_err(|e| AppError::Serialization(format!("string_value 无法重写: {}", e)))?;
    Ok(format!("{} {}", &caps[1], quote(&value)?))
}

/// JSON 字符串同时是合法的 YAML 双引号标量
fn quote(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// 写出目录文件
pub async fn write_catalog(catalog: &ModelsCatalog, path: &Path) -> Result<()> {
    let rendered = render_catalog(catalog)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, rendered).await?;
    Ok(())
}
