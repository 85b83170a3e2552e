//! Archive reader and markdown extractor
//!
//! A modelcard layer is a tar stream, optionally gzip-compressed. Exactly one
//! markdown entry makes a usable document; anything else degrades to absent.

use flate2::read::GzDecoder;
use std::io::{self, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The single markdown document found in a modelcard layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCardDocument {
    pub filename: String,
    pub raw_bytes: Vec<u8>,
}

impl ModelCardDocument {
    /// Document text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw_bytes).into_owned()
    }
}

/// Result of scanning a layer for its markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Found(ModelCardDocument),
    /// No markdown entry in the archive
    Absent,
    /// Two or more markdown entries; scanning stopped at the second
    Ambiguous { first: String, second: String },
    /// The archive could not be decoded
    Malformed(String),
}

impl ExtractionOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ExtractionOutcome::Found(_))
    }

    /// Everything but `Found` is treated as absent downstream.
    pub fn into_document(self) -> Option<ModelCardDocument> {
        match self {
            ExtractionOutcome::Found(document) => Some(document),
            _ => None,
        }
    }
}

/// Whether the layer bytes need gunzipping before tar decoding.
pub fn is_compressed(media_type: &str, bytes: &[u8]) -> bool {
    media_type.to_ascii_lowercase().contains("gzip") || bytes.starts_with(&GZIP_MAGIC)
}

/// Whether an archive entry name is a markdown document.
pub fn is_markdown(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Scans layer bytes and isolates the single markdown document.
#[derive(Debug, Clone)]
pub struct MarkdownExtractor {
    max_document_bytes: u64,
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new(crate::config::config::ExtractionConfig::default().max_document_bytes)
    }
}

impl MarkdownExtractor {
    pub fn new(max_document_bytes: u64) -> Self {
        Self { max_document_bytes }
    }

    /// Decode `bytes` according to `media_type` and apply the one-document policy.
    pub fn extract(&self, bytes: &[u8], media_type: &str) -> ExtractionOutcome {
        if is_compressed(media_type, bytes) {
            self.scan(GzDecoder::new(bytes))
        } else {
            self.scan(bytes)
        }
    }

    fn scan<R: Read>(&self, reader: R) -> ExtractionOutcome {
        let mut archive = tar::Archive::new(reader);
        let entries = match archive.entries() {
            Ok(entries) => entries,
            Err(e) => return ExtractionOutcome::Malformed(e.to_string()),
        };

        let mut found: Option<ModelCardDocument> = None;
        for entry in entries {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) => return ExtractionOutcome::Malformed(e.to_string()),
            };
            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(e) => return ExtractionOutcome::Malformed(e.to_string()),
            };

            if !entry.header().entry_type().is_file() || !is_markdown(&name) {
                // Drained without buffering.
                if let Err(e) = io::copy(&mut entry, &mut io::sink()) {
                    return ExtractionOutcome::Malformed(e.to_string());
                }
                continue;
            }

            if let Some(first) = found.take() {
                tracing::debug!(first = %first.filename, second = %name, "多个 markdown 文档");
                return ExtractionOutcome::Ambiguous {
                    first: first.filename,
                    second: name,
                };
            }

            if entry.size() > self.max_document_bytes {
                return ExtractionOutcome::Malformed(format!(
                    "{} exceeds {} bytes",
                    name, self.max_document_bytes
                ));
            }

            let mut raw_bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(e) = entry.read_to_end(&mut raw_bytes) {
                return ExtractionOutcome::Malformed(e.to_string());
            }
            found = Some(ModelCardDocument {
                filename: name,
                raw_bytes,
            });
        }

        match found {
            Some(document) => ExtractionOutcome::Found(document),
            None => ExtractionOutcome::Absent,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{gzip, tar_of};
    use super::*;

    const TAR: &str = "application/vnd.oci.image.layer.v1.tar";
    const TAR_GZ: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

    #[test]
    fn test_single_markdown_found() {
        let bytes = tar_of(&[("models/weights.bin", "0000"), ("README.md", "# Granite")]);
        match MarkdownExtractor::default().extract(&bytes, TAR) {
            ExtractionOutcome::Found(doc) => {
                assert_eq!(doc.filename, "README.md");
                assert_eq!(doc.text(), "# Granite");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_gzip_by_media_type() {
        let bytes = gzip(&tar_of(&[("card.MD", "hello")]));
        let outcome = MarkdownExtractor::default().extract(&bytes, TAR_GZ);
        assert!(outcome.is_found());
    }

    #[test]
    fn test_gzip_by_magic_bytes() {
        let bytes = gzip(&tar_of(&[("card.md", "hello")]));
        assert!(MarkdownExtractor::default().extract(&bytes, TAR).is_found());
    }

    #[test]
    fn test_no_markdown_is_absent() {
        let bytes = tar_of(&[("config.json", "{}")]);
        assert_eq!(
            MarkdownExtractor::default().extract(&bytes, TAR),
            ExtractionOutcome::Absent
        );
    }

    #[test]
    fn test_two_markdown_entries_are_ambiguous() {
        let bytes = tar_of(&[("a.md", "first"), ("b.md", "second"), ("c.txt", "x")]);
        let outcome = MarkdownExtractor::default().extract(&bytes, TAR);
        assert_eq!(
            outcome,
            ExtractionOutcome::Ambiguous {
                first: "a.md".into(),
                second: "b.md".into()
            }
        );
        assert_eq!(outcome.into_document(), None);
    }

    #[test]
    fn test_garbage_is_malformed_not_fatal() {
        let bytes = gzip(b"definitely not a tar archive, but long enough to be read as one? no");
        let outcome = MarkdownExtractor::default().extract(&bytes, TAR_GZ);
        assert!(!outcome.is_found());
        assert_eq!(outcome.into_document(), None);
    }

    #[test]
    fn test_oversized_document_rejected() {
        let bytes = tar_of(&[("README.md", "0123456789")]);
        let outcome = MarkdownExtractor::new(4).extract(&bytes, TAR);
        assert!(matches!(outcome, ExtractionOutcome::Malformed(_)));
    }
}
