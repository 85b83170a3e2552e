pub mod catalog;
pub mod index;
pub mod metadata;

pub use catalog::{CatalogArtifact, CatalogEntry, ModelsCatalog};
pub use index::{ModelEntry, ModelKind, VersionIndex};
pub use metadata::{
    CandidateField, CandidateSet, CustomProperty, EnrichmentRecord, ExtractedMetadata,
    MetadataField, OciArtifact, ProvenanceDocument, Source,
};
