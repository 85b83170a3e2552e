//! Field Validation Module
//!
//! Quality checks applied to every candidate value before it is allowed
//! into a record, regardless of which source produced it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::config::ExtractionConfig;

/// Characters stripped from both ends of a raw value.
const WRAPPING_CHARS: &[char] = &['"', '\'', '`', '*', '_', '~', '<', '>'];

static LIST_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:[,;|\n]|\s/\s)\s*").expect("valid list delimiter regex"));

/// Validator for candidate text values
#[derive(Debug, Clone)]
pub struct FieldValidator {
    /// Lower-cased placeholder tokens treated as "no value"
    placeholders: HashSet<String>,
    /// Maximum scalar length in characters
    max_field_length: usize,
    /// Maximum list element length in characters
    max_list_item_length: usize,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl FieldValidator {
    /// Create validator from extraction settings
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            placeholders: config
                .placeholder_tokens
                .iter()
                .map(|token| token.trim().to_lowercase())
                .collect(),
            max_field_length: config.max_field_length,
            max_list_item_length: config.max_list_item_length,
        }
    }

    /// Strip surrounding whitespace, quotes and markup characters.
    pub fn clean(&self, raw: &str) -> String {
        let mut value = raw.trim();
        loop {
            let stripped = value.trim_matches(WRAPPING_CHARS).trim();
            if stripped.len() == value.len() {
                break;
            }
            value = stripped;
        }
        value.to_string()
    }

    /// Whether a cleaned value is a known placeholder.
    pub fn is_placeholder(&self, value: &str) -> bool {
        self.placeholders.contains(&value.to_lowercase())
    }

    /// Clean and validate a scalar. `None` means the candidate is rejected.
    pub fn validate(&self, raw: &str) -> Option<String> {
        self.validate_bounded(raw, self.max_field_length)
    }

    /// Clean and validate a single list element.
    pub fn validate_item(&self, raw: &str) -> Option<String> {
        self.validate_bounded(raw, self.max_list_item_length)
    }

    fn validate_bounded(&self, raw: &str, max_length: usize) -> Option<String> {
        let value = self.clean(raw);
        if value.is_empty() || self.is_placeholder(&value) {
            return None;
        }
        if value.chars().count() > max_length {
            return None;
        }
        Some(value)
    }

    /// Split list-like text on common delimiters and validate each element.
    ///
    /// Duplicates are removed keeping the first occurrence; an empty result
    /// is reported as `None`.
    pub fn validate_list(&self, raw: &str) -> Option<Vec<String>> {
        let items: Vec<String> = LIST_DELIMITER
            .split(raw)
            .map(|item| item.trim_start_matches(['-', '*', '+']))
            .filter_map(|item| self.validate_item(item))
            .collect();
        non_empty(dedupe(items))
    }

    /// Validate an already-split list.
    pub fn validate_items<I, S>(&self, items: I) -> Option<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .filter_map(|item| self.validate_item(item.as_ref()))
            .collect();
        non_empty(dedupe(items))
    }
}

/// Remove duplicates keeping first-seen order (case-sensitive).
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("N/A")]
    #[case("n/a")]
    #[case("TBD")]
    #[case("Unknown")]
    #[case("  ")]
    #[case("\"\"")]
    #[case("**TBD**")]
    #[case("[More Information Needed]")]
    fn test_rejected_values(#[case] raw: &str) {
        assert_eq!(FieldValidator::default().validate(raw), None);
    }

    #[rstest]
    #[case("\"Apache 2.0\"", "Apache 2.0")]
    #[case("**IBM**", "IBM")]
    #[case("`granite-7b`", "granite-7b")]
    #[case("  Red Hat  ", "Red Hat")]
    fn test_cleaning(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            FieldValidator::default().validate(raw).as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn test_length_bound() {
        let mut config = ExtractionConfig::default();
        config.max_field_length = 5;
        let validator = FieldValidator::from_config(&config);
        assert_eq!(validator.validate("abcde").as_deref(), Some("abcde"));
        assert_eq!(validator.validate("abcdef"), None);
    }

    #[test]
    fn test_list_split_and_validate() {
        let validator = FieldValidator::default();
        assert_eq!(
            validator.validate_list("English, Japanese; N/A | English\nGerman"),
            Some(vec![
                "English".to_string(),
                "Japanese".to_string(),
                "German".to_string()
            ])
        );
        assert_eq!(validator.validate_list("TBD, unknown"), None);
    }

    #[test]
    fn test_custom_placeholder() {
        let mut config = ExtractionConfig::default();
        config.placeholder_tokens.push(" Pending ".into());
        let validator = FieldValidator::from_config(&config);
        assert_eq!(validator.validate("pending"), None);
        assert_eq!(validator.validate("Apache 2.0"), Some("Apache 2.0".to_string()));
    }
}
