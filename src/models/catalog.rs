//! 目录（catalog）对外形态

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::migration::timestamp::deserialize_decimal_string;
use crate::models::metadata::CustomProperty;

/// 目录中的制品
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogArtifact {
    pub uri: String,
    #[serde(
        default,
        deserialize_with = "deserialize_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_time_since_epoch: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update_time_since_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, CustomProperty>,
}

/// 目录条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_time_since_epoch: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update_time_since_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, CustomProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<CatalogArtifact>,
    /// 静态目录中未识别的键，原样保留
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// 聚合目录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsCatalog {
    pub source: String,
    #[serde(default)]
    pub models: Vec<CatalogEntry>,
}

impl ModelsCatalog {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            models: Vec::new(),
        }
    }
}
