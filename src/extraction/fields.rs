//! Field extractor
//!
//! Turns model-card markdown into modelcard-sourced candidates. The front
//! matter is read first; the body is scanned only for fields the front matter
//! did not supply. Every value goes through the validator.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashMap;

use super::dates::DateParser;
use super::validation::{FieldValidator, dedupe};
use crate::config::config::ExtractionConfig;
use crate::models::{CandidateField, CandidateSet, Source};

static KEY_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:[-*+]\s+)?(?:\*\*|__)?([A-Za-z][A-Za-z _-]{0,40}?)\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*?)\s*$",
    )
    .expect("valid key/value regex")
});

static TABLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|\s*([^|]+?)\s*\|\s*([^|]*?)\s*\|\s*$").expect("valid table row regex")
});

static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?[\s:|-]+\|?\s*$").expect("valid table separator regex"));

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid heading regex"));

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+\.)\s+(.+?)\s*$").expect("valid list item regex"));

static INLINE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").expect("valid inline link regex")
});

static HUB_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://huggingface\.co/([A-Za-z0-9][\w.-]*)/([A-Za-z0-9][\w.-]*)")
        .expect("valid hub link regex")
});

static DESCRIPTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(summary|description|overview)\b").expect("valid section regex")
});

static VALIDATED_ON_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^validated\s+on\b").expect("valid validated-on regex"));

static MODEL_CARD_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^model\s*card\s*(?:for|:|-)\s*").expect("valid title prefix regex")
});

/// Hub path segments that are not model repositories.
const NON_MODEL_NAMESPACES: [&str; 6] = ["datasets", "spaces", "docs", "blog", "papers", "collections"];

/// Fields recognised in model cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CardKey {
    Name,
    Provider,
    Description,
    License,
    LicenseName,
    LicenseLink,
    Language,
    Tags,
    Tasks,
    ValidatedOn,
    ReleaseDate,
    LastUpdated,
    BaseModel,
}

const ALIASES: &[(&str, CardKey)] = &[
    ("name", CardKey::Name),
    ("model_name", CardKey::Name),
    ("title", CardKey::Name),
    ("provider", CardKey::Provider),
    ("author", CardKey::Provider),
    ("developed_by", CardKey::Provider),
    ("model_developer", CardKey::Provider),
    ("organization", CardKey::Provider),
    ("description", CardKey::Description),
    ("summary", CardKey::Description),
    ("license", CardKey::License),
    ("license_name", CardKey::LicenseName),
    ("license_link", CardKey::LicenseLink),
    ("license_url", CardKey::LicenseLink),
    ("language", CardKey::Language),
    ("languages", CardKey::Language),
    ("tags", CardKey::Tags),
    ("tasks", CardKey::Tasks),
    ("task", CardKey::Tasks),
    ("pipeline_tag", CardKey::Tasks),
    ("validated_on", CardKey::ValidatedOn),
    ("release_date", CardKey::ReleaseDate),
    ("created", CardKey::ReleaseDate),
    ("date", CardKey::ReleaseDate),
    ("last_updated", CardKey::LastUpdated),
    ("updated", CardKey::LastUpdated),
    ("base_model", CardKey::BaseModel),
];

fn canonical_key(raw: &str) -> Option<CardKey> {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, key)| *key)
}

/// Raw, unvalidated value as found in the document.
#[derive(Debug, Clone, PartialEq)]
enum RawValue {
    Scalar(String),
    List(Vec<String>),
}

impl RawValue {
    fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => {
                let items: Vec<String> = items.iter().filter_map(yaml_scalar).collect();
                if items.is_empty() { None } else { Some(RawValue::List(items)) }
            }
            other => yaml_scalar(other).map(RawValue::Scalar),
        }
    }

    fn first(&self) -> Option<&str> {
        match self {
            RawValue::Scalar(value) => Some(value),
            RawValue::List(items) => items.first().map(String::as_str),
        }
    }
}

fn yaml_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First-wins collection of raw values.
#[derive(Debug, Default)]
struct RawFields(HashMap<CardKey, RawValue>);

impl RawFields {
    fn offer(&mut self, key: CardKey, value: RawValue) {
        self.0.entry(key).or_insert(value);
    }

    fn has(&self, key: CardKey) -> bool {
        self.0.contains_key(&key)
    }

    fn get(&self, key: CardKey) -> Option<&RawValue> {
        self.0.get(&key)
    }
}

/// Everything extracted from one model card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCardFields {
    pub candidates: CandidateSet,
    /// `org/name` of the upstream hub repository, when the card names one
    pub hub_repo: Option<String>,
}

/// Split a leading `---` block from the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.trim_start_matches('\u{feff}');
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    // Unterminated block: treat the whole document as body.
    (None, text)
}

/// Parses model-card text into candidates.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    validator: FieldValidator,
    dates: DateParser,
}

impl FieldExtractor {
    pub fn new(validator: FieldValidator, dates: DateParser) -> Self {
        Self { validator, dates }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            FieldValidator::from_config(config),
            DateParser::new(&config.date_formats),
        )
    }

    pub fn validator(&self) -> &FieldValidator {
        &self.validator
    }

    pub fn dates(&self) -> &DateParser {
        &self.dates
    }

    pub fn extract(&self, text: &str) -> ModelCardFields {
        let (front_matter, body) = split_front_matter(text);

        let mut raw = RawFields::default();
        if let Some(block) = front_matter {
            self.front_matter_pass(block, &mut raw);
        }
        self.body_pass(body, &mut raw);

        let hub_repo = raw
            .get(CardKey::BaseModel)
            .and_then(RawValue::first)
            .and_then(hub_repo_id)
            .or_else(|| first_hub_link(body));

        let mut candidates = self.to_candidates(&raw);
        let readme = text.trim();
        if !readme.is_empty() {
            candidates.readme = Some(modelcard(readme.to_string()));
        }

        ModelCardFields {
            candidates,
            hub_repo,
        }
    }

    fn front_matter_pass(&self, block: &str, raw: &mut RawFields) {
        let mapping = match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(mapping)) => mapping,
            Ok(_) => return,
            Err(e) => {
                tracing::debug!(error = %e, "front matter is not valid YAML");
                return;
            }
        };

        for (key, value) in &mapping {
            let Some(key) = key.as_str().and_then(canonical_key) else {
                continue;
            };
            if let Some(value) = RawValue::from_yaml(value) {
                raw.offer(key, value);
            }
        }
    }

    fn body_pass(&self, body: &str, raw: &mut RawFields) {
        let lines: Vec<&str> = body.lines().collect();
        let mut in_fence = false;
        let mut first_heading: Option<String> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                i += 1;
                continue;
            }
            if in_fence {
                i += 1;
                continue;
            }

            if let Some(caps) = HEADING.captures(line) {
                let level = caps[1].len();
                let title = caps[2].to_string();
                if level == 1 && first_heading.is_none() {
                    first_heading = Some(title.clone());
                }
                if VALIDATED_ON_HEADING.is_match(title.trim_matches(['*', '_']))
                    && !raw.has(CardKey::ValidatedOn)
                {
                    let items = list_items_after(&lines, i + 1);
                    if !items.is_empty() {
                        raw.offer(CardKey::ValidatedOn, RawValue::List(items));
                    }
                }
            } else if let Some(caps) = TABLE_ROW.captures(line) {
                if !TABLE_SEPARATOR.is_match(line) {
                    if let Some(key) = canonical_key(&self.validator.clean(&caps[1])) {
                        let value = caps[2].trim();
                        if !value.is_empty() {
                            raw.offer(key, RawValue::Scalar(value.to_string()));
                        }
                    }
                }
            } else if let Some(caps) = KEY_VALUE_LINE.captures(line) {
                if let Some(key) = canonical_key(&caps[1]) {
                    let value = caps[2].trim();
                    if !value.is_empty() {
                        raw.offer(key, RawValue::Scalar(value.to_string()));
                    } else if key == CardKey::ValidatedOn && !raw.has(key) {
                        // "Validated on:" followed by a list
                        let items = list_items_after(&lines, i + 1);
                        if !items.is_empty() {
                            raw.offer(key, RawValue::List(items));
                        }
                    }
                }
            }
            i += 1;
        }

        if let Some(title) = first_heading {
            let title = MODEL_CARD_PREFIX.replace(title.trim(), "").into_owned();
            raw.offer(CardKey::Name, RawValue::Scalar(title));
        }
        if !raw.has(CardKey::Description) {
            if let Some(paragraph) = description_paragraph(&lines) {
                raw.offer(CardKey::Description, RawValue::Scalar(paragraph));
            }
        }
    }

    fn to_candidates(&self, raw: &RawFields) -> CandidateSet {
        let scalar = |key| {
            raw.get(key)
                .and_then(RawValue::first)
                .and_then(|value| self.validator.validate(value))
        };
        let list = |key| {
            raw.get(key).and_then(|value| match value {
                RawValue::Scalar(text) => self.validator.validate_list(text),
                RawValue::List(items) => self.validator.validate_items(items),
            })
        };
        let date = |key| {
            raw.get(key)
                .and_then(RawValue::first)
                .and_then(|value| self.dates.parse_epoch(value))
        };

        // "[Apache 2.0](https://...)" supplies both license and link.
        let (mut license, linked) = match raw.get(CardKey::License).and_then(RawValue::first) {
            Some(value) => match INLINE_LINK.captures(value) {
                Some(caps) => (
                    self.validator.validate(&caps[1]),
                    self.validator.validate(&caps[2]),
                ),
                None => (self.validator.validate(value), None),
            },
            None => (None, None),
        };
        if license.as_deref().map(|l| l.eq_ignore_ascii_case("other")).unwrap_or(false) {
            if let Some(name) = scalar(CardKey::LicenseName) {
                license = Some(name);
            }
        }
        let license_link = scalar(CardKey::LicenseLink)
            .map(|link| match INLINE_LINK.captures(&link) {
                Some(caps) => caps[2].to_string(),
                None => link,
            })
            .or(linked);

        CandidateSet {
            name: scalar(CardKey::Name).map(modelcard),
            provider: scalar(CardKey::Provider).map(modelcard),
            description: scalar(CardKey::Description).map(modelcard),
            readme: None,
            license: license.map(modelcard),
            license_link: license_link.map(modelcard),
            language: list(CardKey::Language).map(modelcard),
            tags: list(CardKey::Tags).map(modelcard),
            tasks: list(CardKey::Tasks).map(modelcard),
            validated_on: list(CardKey::ValidatedOn).map(modelcard),
            create_time: date(CardKey::ReleaseDate).map(modelcard),
            last_update_time: date(CardKey::LastUpdated).map(modelcard),
        }
    }
}

fn modelcard<T>(value: T) -> CandidateField<T> {
    CandidateField::new(value, Source::Modelcard)
}

/// List items directly following line `start`, stopping at the next heading
/// or the first non-list line after the list has begun.
fn list_items_after(lines: &[&str], start: usize) -> Vec<String> {
    let mut items = Vec::new();
    for line in lines.iter().skip(start) {
        if HEADING.is_match(line) {
            break;
        }
        match LIST_ITEM.captures(line) {
            Some(caps) => items.push(caps[1].to_string()),
            None if line.trim().is_empty() => continue,
            None if items.is_empty() => continue,
            None => break,
        }
    }
    dedupe(items)
}

fn is_prose(line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.is_empty()
        || HEADING.is_match(trimmed)
        || trimmed.starts_with('|')
        || trimmed.starts_with("<!--")
        || trimmed.starts_with('<')
        || trimmed.starts_with("![")
        || trimmed.starts_with("[![")
        || trimmed.starts_with("```")
        || LIST_ITEM.is_match(trimmed)
        || KEY_VALUE_LINE
            .captures(trimmed)
            .map(|caps| canonical_key(&caps[1]).is_some())
            .unwrap_or(false))
}

/// Paragraph starting at or after `start`, joined into one line.
fn paragraph_from(lines: &[&str], start: usize) -> Option<String> {
    let begin = (start..lines.len()).find(|&i| {
        is_prose(lines[i]) || HEADING.is_match(lines[i])
    })?;
    if HEADING.is_match(lines[begin]) {
        return None;
    }
    let text: Vec<&str> = lines[begin..]
        .iter()
        .take_while(|line| is_prose(line))
        .map(|line| line.trim())
        .collect();
    Some(text.join(" "))
}

fn description_paragraph(lines: &[&str]) -> Option<String> {
    let section = lines.iter().position(|line| {
        HEADING
            .captures(line)
            .map(|caps| DESCRIPTION_HEADING.is_match(&caps[2]))
            .unwrap_or(false)
    });
    if let Some(index) = section {
        if let Some(paragraph) = paragraph_from(lines, index + 1) {
            return Some(paragraph);
        }
    }
    let begin = lines.iter().position(|line| is_prose(line))?;
    paragraph_from(lines, begin)
}

/// Normalise a hub repository reference to `org/name`.
pub fn hub_repo_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Some(caps) = HUB_LINK.captures(trimmed) {
        return repo_from_parts(&caps[1], &caps[2]);
    }
    let (org, name) = trimmed.split_once('/')?;
    if name.contains('/') {
        return None;
    }
    repo_from_parts(org, name)
}

fn repo_from_parts(org: &str, name: &str) -> Option<String> {
    let name = name.trim_end_matches(".git").trim_end_matches(['.', ',']);
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if !valid(org) || !valid(name) || NON_MODEL_NAMESPACES.contains(&org) {
        return None;
    }
    Some(format!("{}/{}", org, name))
}

fn first_hub_link(body: &str) -> Option<String> {
    HUB_LINK
        .captures_iter(body)
        .find_map(|caps| repo_from_parts(&caps[1], &caps[2]))
}
