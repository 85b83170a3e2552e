//! 基于文件系统 OCI image layout 的镜像来源
//!
//! 目录结构：`<root>/[<registry>/]<repository>/{index.json, blobs/<alg>/<hex>}`，
//! 标签通过 `org.opencontainers.image.ref.name` 注解匹配。

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{ANNOTATION_REF_NAME, BlobDescriptor, ImageReference, ImageSource, ResolvedImage};
use crate::error::{AppError, Result};

const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Deserialize)]
struct ImageIndex {
    #[serde(default)]
    manifests: Vec<BlobDescriptor>,
}

/// 清单或嵌套索引
#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    config: Option<BlobDescriptor>,
    #[serde(default)]
    layers: Vec<BlobDescriptor>,
    #[serde(default)]
    manifests: Vec<BlobDescriptor>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageConfig {
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    config: Option<ContainerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

/// 本地 OCI image layout 镜像来源
#[derive(Debug, Clone)]
pub struct OciLayoutSource {
    root: PathBuf,
}

impl OciLayoutSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 定位引用对应的 layout 目录
    async fn layout_dir(&self, reference: &ImageReference) -> Result<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(registry) = &reference.registry {
            candidates.push(self.root.join(registry).join(&reference.repository));
        }
        candidates.push(self.root.join(&reference.repository));

        for dir in candidates {
            if tokio::fs::try_exists(dir.join("index.json")).await? {
                return Ok(dir);
            }
        }
        Err(AppError::NotFound(format!("镜像布局不存在: {}", reference)))
    }

    fn blob_path(dir: &Path, digest: &str) -> Result<PathBuf> {
        let (algorithm, hex) = digest
            .split_once(':')
            .filter(|(alg, hex)| !alg.is_empty() && !hex.is_empty() && !hex.contains(['/', '.']))
            .ok_or_else(|| AppError::Registry(format!("摘要格式无效: {}", digest)))?;
        Ok(dir.join("blobs").join(algorithm).join(hex))
    }

    /// 读取并校验 blob
    async fn read_blob(dir: &Path, descriptor: &BlobDescriptor) -> Result<Vec<u8>> {
        let path = Self::blob_path(dir, &descriptor.digest)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("blob 不存在: {}", descriptor.digest))
            }
            _ => AppError::from(e),
        })?;
        verify_digest(&descriptor.digest, &bytes)?;
        Ok(bytes)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        dir: &Path,
        descriptor: &BlobDescriptor,
    ) -> Result<T> {
        let bytes = Self::read_blob(dir, descriptor).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn select_manifest<'a>(
        reference: &ImageReference,
        manifests: &'a [BlobDescriptor],
    ) -> Option<&'a BlobDescriptor> {
        if let Some(digest) = &reference.digest {
            return manifests.iter().find(|m| &m.digest == digest);
        }

        let tag = reference.tag.as_deref().unwrap_or(DEFAULT_TAG);
        let tagged = manifests.iter().find(|m| {
            m.annotations
                .get(ANNOTATION_REF_NAME)
                .map(|name| name == tag || name.ends_with(&format!(":{}", tag)))
                .unwrap_or(false)
        });

        // 未标注的单清单布局
        tagged.or_else(|| match manifests {
            [only] if !only.annotations.contains_key(ANNOTATION_REF_NAME) => Some(only),
            _ => None,
        })
    }
}

/// 校验 sha256 摘要；其他算法不校验
pub fn verify_digest(digest: &str, bytes: &[u8]) -> Result<()> {
    let Some(expected) = digest.strip_prefix("sha256:") else {
        tracing::debug!(digest = %digest, "跳过非 sha256 摘要校验");
        return Ok(());
    };
    let actual = format!("{:x}", Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(AppError::DigestMismatch {
            expected: digest.to_string(),
            actual: format!("sha256:{}", actual),
        });
    }
    Ok(())
}

#[async_trait]
impl ImageSource for OciLayoutSource {
    async fn resolve(&self, reference: &ImageReference) -> Result<ResolvedImage> {
        let dir = self.layout_dir(reference).await?;
        let index: ImageIndex =
            serde_json::from_slice(&tokio::fs::read(dir.join("index.json")).await?)?;

        let selected = Self::select_manifest(reference, &index.manifests)
            .ok_or_else(|| AppError::NotFound(format!("清单不存在: {}", reference)))?
            .clone();

        let mut manifest_digest = selected.digest.clone();
        let mut manifest: ManifestDocument = Self::read_json(&dir, &selected).await?;
        if manifest.config.is_none() {
            // 多平台索引：取第一个清单
            let nested = manifest
                .manifests
                .first()
                .cloned()
                .ok_or_else(|| AppError::Registry(format!("清单为空: {}", reference)))?;
            manifest_digest = nested.digest.clone();
            manifest = Self::read_json(&dir, &nested).await?;
        }

        let config_descriptor = manifest
            .config
            .clone()
            .ok_or_else(|| AppError::Registry(format!("清单缺少 config: {}", reference)))?;
        let config: ImageConfig = Self::read_json(&dir, &config_descriptor).await?;

        tracing::debug!(
            reference = %reference,
            manifest = %manifest_digest,
            layers = manifest.layers.len(),
            "镜像已解析"
        );

        Ok(ResolvedImage {
            reference: reference.clone(),
            manifest_digest,
            layers: manifest.layers,
            annotations: manifest.annotations,
            labels: config
                .config
                .and_then(|c| c.labels)
                .unwrap_or_default(),
            created: config.created,
        })
    }

    async fn fetch_blob(
        &self,
        image: &ResolvedImage,
        descriptor: &BlobDescriptor,
    ) -> Result<Vec<u8>> {
        let dir = self.layout_dir(&image.reference).await?;
        Self::read_blob(&dir, descriptor).await
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::LayoutBuilder;
    use super::*;
    use serde_json::json;

    const LAYER: &str = "application/vnd.oci.image.layer.v1.tar";

    #[tokio::test]
    async fn test_resolve_and_fetch() {
        let root = tempfile::tempdir().unwrap();
        let layout = LayoutBuilder::new(root.path(), "rh/modelcar-granite");
        let layer = layout.blob(LAYER, b"layer-bytes");
        layout.image(
            "1.0",
            vec![layer.clone()],
            json!({ "org.opencontainers.image.vendor": "IBM" }),
            "2024-07-11T00:00:00Z",
        );

        let source = OciLayoutSource::new(root.path());
        let reference = ImageReference::parse("oci://quay.io/rh/modelcar-granite:1.0").unwrap();
        let image = source.resolve(&reference).await.unwrap();
        assert_eq!(image.layers, vec![layer.clone()]);
        assert_eq!(image.annotation("org.opencontainers.image.vendor"), Some("IBM"));
        assert_eq!(image.created_epoch(), Some(1720656000));

        let bytes = source.fetch_blob(&image, &layer).await.unwrap();
        assert_eq!(bytes, b"layer-bytes");
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let layout = LayoutBuilder::new(root.path(), "rh/model");
        layout.image("1.0", Vec::new(), json!({}), "2024-07-11T00:00:00Z");

        let source = OciLayoutSource::new(root.path());
        let reference = ImageReference::parse("rh/model:2.0").unwrap();
        assert!(matches!(
            source.resolve(&reference).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_layout_io_error_is_reported() {
        let root = tempfile::tempdir().unwrap();
        // 注册表目录位置上是一个普通文件
        std::fs::write(root.path().join("quay.io"), "").unwrap();

        let source = OciLayoutSource::new(root.path());
        let reference = ImageReference::parse("quay.io/rh/model:1.0").unwrap();
        assert!(matches!(
            source.resolve(&reference).await,
            Err(AppError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_layout_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let source = OciLayoutSource::new(root.path());
        let reference = ImageReference::parse("rh/absent:1.0").unwrap();
        assert!(matches!(
            source.resolve(&reference).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_digest_mismatch() {
        let result = verify_digest("sha256:00", b"data");
        assert!(matches!(result, Err(AppError::DigestMismatch { .. })));
        let digest = format!("sha256:{:x}", Sha256::digest(b"data"));
        assert!(verify_digest(&digest, b"data").is_ok());
    }
}
