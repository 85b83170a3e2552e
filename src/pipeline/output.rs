//! 输出路径布局
//!
//! 每个模型写入 `<root>/<dir name>/models/`。目录名由模型标识决定：可读部分
//! 之后附加标识的 sha256 前缀，不同标识不会落到同一目录。

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::EnrichmentRecord;

pub const MODELS_DIR: &str = "models";
pub const METADATA_FILE: &str = "metadata.yaml";
pub const PROVENANCE_FILE: &str = "enrichment.yaml";

const DIGEST_PREFIX_LEN: usize = 12;

/// 模型标识 → 目录名：`/ : @` 替换为 `_`，再附加摘要前缀
pub fn dir_name(key: &str) -> String {
    let readable: String = key
        .trim_matches('/')
        .chars()
        .map(|c| match c {
            '/' | ':' | '@' | '\\' => '_',
            other => other,
        })
        .collect();
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    format!("{}-{}", readable, &digest[..DIGEST_PREFIX_LEN])
}

/// 输出目录布局
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model_dir(&self, key: &str) -> PathBuf {
        self.root.join(dir_name(key)).join(MODELS_DIR)
    }

    pub fn metadata_path(&self, key: &str) -> PathBuf {
        self.model_dir(key).join(METADATA_FILE)
    }

    pub fn provenance_path(&self, key: &str) -> PathBuf {
        self.model_dir(key).join(PROVENANCE_FILE)
    }

    /// 写出记录与溯源文档，返回记录路径
    pub async fn write_record(&self, key: &str, record: &EnrichmentRecord) -> Result<PathBuf> {
        let dir = self.model_dir(key);
        tokio::fs::create_dir_all(&dir).await?;

        let metadata_path = dir.join(METADATA_FILE);
        write_atomic(&metadata_path, &serde_yaml::to_string(&record.metadata)?).await?;
        write_atomic(
            &dir.join(PROVENANCE_FILE),
            &serde_yaml::to_string(&record.provenance())?,
        )
        .await?;
        Ok(metadata_path)
    }
}

/// 先写临时文件再重命名
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("yaml.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedMetadata, MetadataField, Source};
    use std::collections::HashSet;

    #[test]
    fn test_dir_name_is_readable() {
        let name = dir_name("registry.redhat.io/rhelai1/modelcar-granite-7b-starter:1.4");
        assert!(name.starts_with("registry.redhat.io_rhelai1_modelcar-granite-7b-starter_1.4-"));
        assert_eq!(name.len(), "registry.redhat.io_rhelai1_modelcar-granite-7b-starter_1.4-".len() + 12);
    }

    #[test]
    fn test_similar_keys_get_distinct_dirs() {
        let keys = [
            "quay.io/rh/granite:1",
            "quay.io/rh_granite:1",
            "quay.io/rh/granite_1",
            "quay.io_rh/granite:1",
            "quay.io/rh/granite@1",
        ];
        let names: HashSet<_> = keys.iter().map(|k| dir_name(k)).collect();
        assert_eq!(names.len(), keys.len());
        assert_eq!(dir_name(keys[0]), dir_name("quay.io/rh/granite:1"));
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let mut record = EnrichmentRecord::skeleton();
        record.metadata.name = Some("granite".into());
        record.sources.insert(MetadataField::Name, Source::Registry);

        let key = "quay.io/a/b:1";
        let path = layout.write_record(key, &record).await.unwrap();
        assert_eq!(path, dir.path().join(dir_name(key)).join("models/metadata.yaml"));

        let text = std::fs::read_to_string(layout.metadata_path(key)).unwrap();
        let reread: ExtractedMetadata = serde_yaml::from_str(&text).unwrap();
        assert_eq!(reread, record.metadata);

        let provenance = std::fs::read_to_string(layout.provenance_path(key)).unwrap();
        assert!(provenance.contains("name: registry"));
        assert!(!layout.model_dir(key).join("metadata.yaml.tmp").exists());
    }
}
