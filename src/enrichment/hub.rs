//! Hugging Face 模型中心客户端

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

use crate::config::config::HuggingFaceConfig;
use crate::error::{AppError, Result};
use crate::extraction::FieldExtractor;
use crate::models::{CandidateField, CandidateSet, Source};

/// 字符串或字符串列表
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn first(&self) -> Option<&str> {
        match self {
            StringOrList::One(value) => Some(value),
            StringOrList::Many(values) => values.first().map(String::as_str),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrList::One(value) => vec![value.clone()],
            StringOrList::Many(values) => values.clone(),
        }
    }
}

/// 模型卡中的结构化数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubCardData {
    pub license: Option<StringOrList>,
    pub license_name: Option<String>,
    pub license_link: Option<String>,
    pub language: Option<StringOrList>,
    pub tags: Option<StringOrList>,
    pub model_name: Option<String>,
}

/// `GET /api/models/{repo}` 响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubModelInfo {
    pub id: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub pipeline_tag: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
    #[serde(rename = "cardData")]
    pub card_data: Option<HubCardData>,
}

/// 模型中心协作者
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    /// 模型信息
    async fn model_info(&self, repo_id: &str) -> Result<HubModelInfo>;

    /// README 原文；不存在时返回 `None`
    async fn readme(&self, repo_id: &str) -> Result<Option<String>>;
}

/// 基于 reqwest 的 Hugging Face 客户端
pub struct HuggingFaceClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(config: &HuggingFaceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("modelcar-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl HubClient for HuggingFaceClient {
    async fn model_info(&self, repo_id: &str) -> Result<HubModelInfo> {
        let response = self
            .get(format!("{}/api/models/{}", self.base_url, repo_id))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("模型不存在: {}", repo_id)));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Hub(format!(
                "model info failed for {} ({}): {}",
                repo_id, status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    async fn readme(&self, repo_id: &str) -> Result<Option<String>> {
        let response = self
            .get(format!("{}/{}/raw/main/README.md", self.base_url, repo_id))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Hub(format!(
                "readme failed for {} ({})",
                repo_id,
                response.status()
            )));
        }

        let text = response.text().await?;
        Ok(if text.trim().is_empty() { None } else { Some(text) })
    }
}

fn hub_timestamp(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|dt| dt.timestamp())
}

/// `license:apache-2.0`、`region:us` 之类的机器标签不是描述性标签
fn is_descriptive_tag(tag: &str) -> bool {
    !tag.contains(':')
}

/// 将模型信息转换为候选集，来源均为 huggingface
pub fn hub_candidates(info: &HubModelInfo, extractor: &FieldExtractor) -> CandidateSet {
    let validator = extractor.validator();
    let hf = |value: String| CandidateField::new(value, Source::Huggingface);
    let card = info.card_data.clone().unwrap_or_default();
    let (org, repo) = match info.id.as_deref().and_then(|id| id.split_once('/')) {
        Some((org, repo)) => (Some(org), Some(repo)),
        None => (None, info.id.as_deref()),
    };

    let mut license = card
        .license
        .as_ref()
        .and_then(StringOrList::first)
        .and_then(|value| validator.validate(value));
    if license.as_deref().map(|l| l.eq_ignore_ascii_case("other")).unwrap_or(false) {
        if let Some(name) = card.license_name.as_deref().and_then(|n| validator.validate(n)) {
            license = Some(name);
        }
    }
    let license = license.or_else(|| {
        info.tags
            .iter()
            .find_map(|tag| tag.strip_prefix("license:"))
            .and_then(|value| validator.validate(value))
    });

    let mut tags: Vec<String> = info.tags.clone();
    if let Some(card_tags) = &card.tags {
        tags.extend(card_tags.to_vec());
    }
    let tags = validator.validate_items(tags.iter().filter(|tag| is_descriptive_tag(tag)));

    CandidateSet {
        name: card
            .model_name
            .as_deref()
            .or(repo)
            .and_then(|value| validator.validate(value))
            .map(hf),
        provider: info
            .author
            .as_deref()
            .or(org)
            .and_then(|value| validator.validate(value))
            .map(hf),
        license: license.map(hf),
        license_link: card
            .license_link
            .as_deref()
            .and_then(|value| validator.validate(value))
            .map(hf),
        language: card
            .language
            .as_ref()
            .and_then(|value| validator.validate_items(value.to_vec()))
            .map(|value| CandidateField::new(value, Source::Huggingface)),
        tags: tags.map(|value| CandidateField::new(value, Source::Huggingface)),
        tasks: info
            .pipeline_tag
            .as_deref()
            .and_then(|value| validator.validate_item(value))
            .map(|value| CandidateField::new(vec![value], Source::Huggingface)),
        create_time: hub_timestamp(info.created_at.as_deref())
            .map(|ts| CandidateField::new(ts, Source::Huggingface)),
        last_update_time: hub_timestamp(info.last_modified.as_deref())
            .map(|ts| CandidateField::new(ts, Source::Huggingface)),
        ..CandidateSet::empty()
    }
}

/// 查询模型中心并组合候选集
///
/// 结构化模型信息优先，README 中抽取的字段只补齐缺失项。README 获取失败
/// 不影响模型信息；模型信息获取失败则整体返回错误。
pub async fn fetch_hub_candidates(
    client: &dyn HubClient,
    repo_id: &str,
    extractor: &FieldExtractor,
) -> Result<CandidateSet> {
    let info = client.model_info(repo_id).await?;
    let mut candidates = hub_candidates(&info, extractor);

    match client.readme(repo_id).await {
        Ok(Some(readme)) => {
            let from_readme = extractor.extract(&readme).candidates;
            candidates = candidates.or_fill(from_readme.relabel(Source::Huggingface));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(repo = %repo_id, error = %e, "README 获取失败");
        }
    }

    Ok(candidates)
}
