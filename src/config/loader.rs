use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 搜索路径：
    /// 1. $MODELCAR_CONFIG 或 ./modelcar.toml
    /// 2. 环境变量（MODELCAR_ 前缀，`__` 分隔层级）
    pub fn load() -> Result<AppConfig, figment::Error> {
        let path = std::env::var_os("MODELCAR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        Self::load_from(&path)
    }

    /// 从指定路径加载配置
    pub fn load_from(path: &Path) -> Result<AppConfig, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("MODELCAR_").ignore(&["config"]).split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.pipeline.concurrency == 0 {
            return Err(ConfigValidationError::InvalidConcurrency);
        }

        if config.extraction.date_formats.is_empty() {
            return Err(ConfigValidationError::MissingDateFormats);
        }

        if config.extraction.max_field_length == 0 || config.extraction.max_list_item_length == 0 {
            return Err(ConfigValidationError::InvalidLengthBound);
        }

        if config.catalog.source.trim().is_empty() {
            return Err(ConfigValidationError::MissingCatalogSource);
        }

        if config.huggingface.enabled && config.huggingface.base_url.trim().is_empty() {
            return Err(ConfigValidationError::InvalidPath(
                "huggingface.base_url".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("并发数无效，必须大于 0")]
    InvalidConcurrency,

    #[error("未配置任何日期格式")]
    MissingDateFormats,

    #[error("字段长度上限无效，必须大于 0")]
    InvalidLengthBound,

    #[error("目录来源名称未配置")]
    MissingCatalogSource,

    #[error("配置路径无效: {0}")]
    InvalidPath(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("modelcar.toml")
}
