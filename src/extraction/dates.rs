//! Date parsing for model-card fields and legacy timestamps.

use chrono::{DateTime, NaiveDate};

/// Parses free-form dates against an ordered list of strftime formats.
///
/// The first matching format wins. Results are whole seconds since the Unix
/// epoch at 00:00 UTC of the parsed day.
#[derive(Debug, Clone)]
pub struct DateParser {
    formats: Vec<String>,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(&crate::config::config::ExtractionConfig::default().date_formats)
    }
}

impl DateParser {
    pub fn new(formats: &[String]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    /// Parse into a calendar date.
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '*');
        if trimmed.is_empty() {
            return None;
        }

        for format in &self.formats {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Some(date);
            }
        }

        // Full timestamps are accepted in addition to the configured formats;
        // only the calendar day is kept.
        DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|dt| dt.naive_utc().date())
    }

    /// Parse into epoch seconds at UTC midnight.
    pub fn parse_epoch(&self, raw: &str) -> Option<i64> {
        self.parse_date(raw).map(date_to_epoch)
    }
}

/// Seconds since epoch at 00:00 UTC of `date`.
pub fn date_to_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}
